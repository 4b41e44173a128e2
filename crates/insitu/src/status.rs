//! C-compatible status codes returned by the protocol entry points.
//!
//! [`Status`] is a `repr(i32)` enum. `Ok` is 0 and every error is
//! negative. Hosts distinguish a rejected envelope from a failed results
//! pass from any other failure.

use std::fmt;

use insitu_engine::DispatchError;

/// Outcome of one protocol entry point.
///
/// Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// Success.
    Ok = 0,
    /// The envelope failed protocol validation.
    InvalidNode = -1,
    /// At least one pipeline's results hook failed.
    ResultsFailed = -2,
    /// Any other failure: call order, reentrancy, configuration, or a
    /// step with failed pipelines.
    GenericError = -3,
    /// A panic was caught at the entry point.
    Panicked = -128,
}

impl Status {
    /// The numeric code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// True for [`Status::Ok`].
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Status for a raw code, if it is one of ours.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            -1 => Some(Self::InvalidNode),
            -2 => Some(Self::ResultsFailed),
            -3 => Some(Self::GenericError),
            -128 => Some(Self::Panicked),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::InvalidNode => "invalid node",
            Self::ResultsFailed => "results failed",
            Self::GenericError => "generic error",
            Self::Panicked => "panicked",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

impl From<&DispatchError> for Status {
    fn from(e: &DispatchError) -> Self {
        match e {
            DispatchError::InvalidNode(_) => Status::InvalidNode,
            DispatchError::ResultsFailed { .. } => Status::ResultsFailed,
            DispatchError::Lifecycle(_)
            | DispatchError::Config(_)
            | DispatchError::DuplicatePipeline { .. } => Status::GenericError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insitu_core::{LifecycleError, SchemaError};

    #[test]
    fn codes_are_stable() {
        assert_eq!(Status::Ok.code(), 0);
        assert_eq!(Status::InvalidNode.code(), -1);
        assert_eq!(Status::ResultsFailed.code(), -2);
        assert_eq!(Status::GenericError.code(), -3);
        assert_eq!(Status::Panicked.code(), -128);
    }

    #[test]
    fn from_code_inverts_code() {
        for s in [
            Status::Ok,
            Status::InvalidNode,
            Status::ResultsFailed,
            Status::GenericError,
            Status::Panicked,
        ] {
            assert_eq!(Status::from_code(s.code()), Some(s));
        }
        assert_eq!(Status::from_code(-4), None);
    }

    #[test]
    fn dispatch_errors_map_to_statuses() {
        let invalid = DispatchError::InvalidNode(SchemaError::new("state", "required child is missing"));
        assert_eq!(Status::from(&invalid), Status::InvalidNode);
        let results = DispatchError::ResultsFailed {
            pipelines: vec!["slice".into()],
        };
        assert_eq!(Status::from(&results), Status::ResultsFailed);
        let lifecycle = DispatchError::Lifecycle(LifecycleError::NotInitialized);
        assert_eq!(Status::from(&lifecycle), Status::GenericError);
    }

    #[test]
    fn display_includes_the_code() {
        assert_eq!(Status::InvalidNode.to_string(), "invalid node (-1)");
    }
}
