//! The [`StepStamp`] carried through every lifecycle call.

use std::fmt;

use crate::node::Node;

/// Timestep, cycle and simulation time of the step being processed.
///
/// Valid only while an `execute` or `results` call is in progress; the
/// dispatcher refreshes it from the envelope at the start of each call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepStamp {
    /// Simulation timestep index.
    pub timestep: i64,
    /// Simulation cycle. Equal to `timestep` unless the envelope sends both.
    pub cycle: i64,
    /// Simulation time.
    pub time: f64,
}

impl StepStamp {
    /// Create a stamp whose cycle equals its timestep.
    pub fn new(timestep: i64, time: f64) -> Self {
        Self {
            timestep,
            cycle: timestep,
            time,
        }
    }

    /// Replace the cycle.
    pub fn with_cycle(self, cycle: i64) -> Self {
        Self { cycle, ..self }
    }

    /// Read a stamp from a `state` node.
    ///
    /// `timestep` and `cycle` each stand in for the other when only one is
    /// sent; with neither, both come from `fallback`. `time` falls back the
    /// same way when absent or not numeric.
    pub fn from_state(state: Option<&Node>, fallback: StepStamp) -> Self {
        let Some(state) = state else {
            return fallback;
        };
        let timestep = state.child("timestep").and_then(Node::as_i64);
        let cycle = state.child("cycle").and_then(Node::as_i64);
        let time = state
            .child("time")
            .and_then(Node::as_number)
            .unwrap_or(fallback.time);
        Self {
            timestep: timestep.or(cycle).unwrap_or(fallback.timestep),
            cycle: cycle.or(timestep).unwrap_or(fallback.cycle),
            time,
        }
    }
}

impl fmt::Display for StepStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timestep {} (t={})", self.timestep, self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestep_and_cycle_are_kept_apart() {
        let mut state = Node::object();
        state.insert("cycle", 9i64);
        state.insert("timestep", 4i64);
        state.insert("time", 1i64);
        let s = StepStamp::from_state(Some(&state), StepStamp::default());
        assert_eq!(s, StepStamp::new(4, 1.0).with_cycle(9));
    }

    #[test]
    fn timestep_stands_in_for_cycle() {
        let mut state = Node::object();
        state.insert("timestep", 4i64);
        let s = StepStamp::from_state(Some(&state), StepStamp::new(1, 0.5).with_cycle(3));
        assert_eq!(s, StepStamp::new(4, 0.5));
    }

    #[test]
    fn cycle_is_used_without_timestep() {
        let mut state = Node::object();
        state.insert("cycle", 9i64);
        let s = StepStamp::from_state(Some(&state), StepStamp::default());
        assert_eq!(s, StepStamp::new(9, 0.0));
    }

    #[test]
    fn missing_state_keeps_fallback() {
        let fallback = StepStamp::new(2, 0.25);
        assert_eq!(StepStamp::from_state(None, fallback), fallback);
    }
}
