use doorsync_core::Error;
use serde::Serialize;

/// Coarse classification of a failed device or fetch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorClass {
    Auth,
    Transport,
    Timeout,
    Rejected,
    InvalidResponse,
    Cleanup,
    Local,
}

impl ErrorClass {
    pub fn of(error: &Error) -> Self {
        match error {
            Error::Auth { .. } => Self::Auth,
            Error::Transport { .. } => Self::Transport,
            Error::Timeout { .. } => Self::Timeout,
            Error::DeviceRejected { .. } => Self::Rejected,
            Error::InvalidResponse(_) => Self::InvalidResponse,
            Error::ResourceCleanup { .. } => Self::Cleanup,
            Error::MalformedRecord { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::Config(_) => Self::Local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Error::auth("nope"), ErrorClass::Auth)]
    #[case(Error::timeout(5), ErrorClass::Timeout)]
    #[case(Error::transport("refused"), ErrorClass::Transport)]
    #[case(Error::rejected(400, "{}"), ErrorClass::Rejected)]
    #[case(Error::cleanup("/tmp/x", "busy"), ErrorClass::Cleanup)]
    #[case(Error::Config("bad".into()), ErrorClass::Local)]
    fn test_error_class(#[case] error: Error, #[case] expected: ErrorClass) {
        assert_eq!(ErrorClass::of(&error), expected);
    }
}
