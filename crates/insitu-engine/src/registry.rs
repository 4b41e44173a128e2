//! Producer/Channel Registry.
//!
//! Maps channel names to [`Producer`]s in first-registration order. A
//! channel's producer is bound once and never replaced.

use indexmap::IndexMap;
use insitu_core::RegistryError;

use crate::producer::Producer;

/// Channel name → producer map.
#[derive(Debug, Default)]
pub struct Registry {
    producers: IndexMap<String, Producer>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `producer` to `channel`.
    ///
    /// Fails if `channel` is empty or already bound; the existing producer
    /// is kept.
    pub fn set_producer(&mut self, channel: &str, mut producer: Producer) -> Result<(), RegistryError> {
        if channel.is_empty() {
            tracing::warn!("refusing to register a producer without a channel name");
            return Err(RegistryError::EmptyChannel);
        }
        if self.producers.contains_key(channel) {
            tracing::warn!(channel, "a producer is already registered for this channel");
            return Err(RegistryError::ProducerConflict {
                channel: channel.to_string(),
            });
        }
        producer.rename(channel);
        self.producers.insert(channel.to_string(), producer);
        tracing::debug!(channel, "producer registered");
        Ok(())
    }

    /// Producer bound to `channel`.
    pub fn get_producer(&self, channel: &str) -> Option<&Producer> {
        self.producers.get(channel)
    }

    /// Mutable producer bound to `channel`.
    pub fn get_producer_mut(&mut self, channel: &str) -> Option<&mut Producer> {
        self.producers.get_mut(channel)
    }

    /// True if `channel` has a producer.
    pub fn contains(&self, channel: &str) -> bool {
        self.producers.contains_key(channel)
    }

    /// Record that `channel`'s payload changed.
    pub fn mark_modified(&mut self, channel: &str) -> Result<(), RegistryError> {
        let producer = self.producers.get_mut(channel).ok_or_else(|| unknown(channel))?;
        producer.mark_modified();
        Ok(())
    }

    /// Mark `channel`'s producer as steerable: `results` writes its output
    /// back to the host.
    pub fn set_steerable(&mut self, channel: &str) -> Result<(), RegistryError> {
        let producer = self.producers.get_mut(channel).ok_or_else(|| unknown(channel))?;
        producer.set_steerable(true);
        Ok(())
    }

    /// Materialize every producer. Returns how many refreshed their
    /// output.
    pub fn update_all(&mut self, time: f64) -> usize {
        self.producers
            .values_mut()
            .map(|p| p.update(time))
            .filter(|&refreshed| refreshed)
            .count()
    }

    /// Registered channel names in registration order.
    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.producers.keys().map(String::as_str)
    }

    /// Steerable producers in registration order.
    pub fn steerable(&self) -> impl Iterator<Item = &Producer> {
        self.producers.values().filter(|p| p.is_steerable())
    }

    /// Number of registered producers.
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    /// True if no producer is registered.
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    /// Drop every producer.
    pub fn clear(&mut self) {
        self.producers.clear();
    }
}

fn unknown(channel: &str) -> RegistryError {
    RegistryError::UnknownChannel {
        channel: channel.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insitu_blueprint::ChannelType;
    use insitu_core::Node;

    fn producer(tag: i64) -> Producer {
        let mut p = Producer::new("", ChannelType::Mesh);
        p.set_payload(Node::Int(tag));
        p
    }

    #[test]
    fn set_producer_never_replaces() {
        let mut r = Registry::new();
        assert!(r.set_producer("ch1", producer(1)).is_ok());
        assert_eq!(
            r.set_producer("ch1", producer(2)),
            Err(RegistryError::ProducerConflict {
                channel: "ch1".into()
            })
        );
        assert_eq!(r.get_producer("ch1").map(Producer::payload), Some(&Node::Int(1)));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn empty_channel_is_rejected() {
        let mut r = Registry::new();
        assert_eq!(r.set_producer("", producer(1)), Err(RegistryError::EmptyChannel));
        assert!(r.is_empty());
    }

    #[test]
    fn producer_takes_the_channel_name() {
        let mut r = Registry::new();
        r.set_producer("grid", producer(1)).unwrap();
        assert_eq!(r.get_producer("grid").map(Producer::channel), Some("grid"));
    }

    #[test]
    fn mark_modified_unknown_channel() {
        let mut r = Registry::new();
        assert!(matches!(
            r.mark_modified("nope"),
            Err(RegistryError::UnknownChannel { .. })
        ));
    }

    #[test]
    fn update_all_materializes_modified_producers() {
        let mut r = Registry::new();
        r.set_producer("a", producer(1)).unwrap();
        r.set_producer("b", producer(2)).unwrap();
        assert_eq!(r.update_all(1.0), 2);
        assert_eq!(r.update_all(2.0), 0);
        r.mark_modified("b").unwrap();
        assert_eq!(r.update_all(3.0), 1);
        assert_eq!(r.get_producer("b").and_then(Producer::output_time), Some(3.0));
        assert_eq!(r.get_producer("a").and_then(Producer::output_time), Some(1.0));
    }

    #[test]
    fn channel_names_keep_registration_order() {
        let mut r = Registry::new();
        for name in ["z", "a", "m"] {
            r.set_producer(name, producer(0)).unwrap();
        }
        assert_eq!(r.channel_names().collect::<Vec<_>>(), ["z", "a", "m"]);
        r.set_steerable("a").unwrap();
        assert_eq!(r.steerable().map(Producer::channel).collect::<Vec<_>>(), ["a"]);
        r.clear();
        assert!(r.is_empty());
    }
}
