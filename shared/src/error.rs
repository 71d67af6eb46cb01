use std::fmt;

/// Failures surfaced by the streaming core.
///
/// Authority violations and retirements of missing segments are not errors;
/// they are silent no-ops and never produce a value of this type.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// A creation request named a template the replication layer does not know.
    UnknownArchetype(String),
    /// The local node tried to use a primitive reserved for the authoritative node.
    NotAuthoritative,
    EmptyCatalog,
    InvalidWindow(u32),
    Config(String),
    /// A packet could not be encoded or decoded.
    Encoding(String),
    /// An encoded packet would not fit in one datagram.
    PacketTooLarge(usize),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::UnknownArchetype(name) => write!(f, "unknown archetype '{}'", name),
            StreamError::NotAuthoritative => write!(f, "node is not authoritative"),
            StreamError::EmptyCatalog => write!(f, "archetype catalog is empty"),
            StreamError::InvalidWindow(size) => {
                write!(f, "initial window must be at least 1 (got {})", size)
            }
            StreamError::Config(reason) => write!(f, "invalid configuration: {}", reason),
            StreamError::Encoding(reason) => write!(f, "packet encoding failed: {}", reason),
            StreamError::PacketTooLarge(size) => write!(
                f,
                "packet of {} bytes exceeds the {} byte datagram limit",
                size,
                crate::MAX_PACKET_SIZE
            ),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::Config(e.to_string())
    }
}

impl From<bincode::Error> for StreamError {
    fn from(e: bincode::Error) -> Self {
        StreamError::Encoding(e.to_string())
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        StreamError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_formatting() {
        let err = StreamError::UnknownArchetype("Spiral".to_string());
        assert_eq!(err.to_string(), "unknown archetype 'Spiral'");

        let err = StreamError::InvalidWindow(0);
        assert!(err.to_string().contains("got 0"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: StreamError = parse_err.into();
        assert!(matches!(err, StreamError::Config(_)));
    }
}
