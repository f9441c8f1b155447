use thiserror::Error;

/// Errors that can occur while exchanging messages over a session
#[derive(Error, Debug)]
pub enum Error {
    /// The session is not activated; the message was parked for retry
    #[error("session is not active")]
    InactiveSession,

    /// The transport failed to deliver a payload to the peer
    #[error("transport send failed: {0}")]
    TransportSend(String),

    /// The peer endpoint is gone or was never paired
    #[error("peer is unreachable")]
    PeerUnreachable,

    /// Inbound payload without a usable type tag
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A payload carried the right tag but its fields did not decode
    #[error("failed to decode `{tag}` payload: {source}")]
    Decode {
        tag: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A message serialized to something other than a JSON object
    #[error("message `{0}` does not encode to a key/value mapping")]
    NotAnObject(&'static str),

    /// The session is not supported on this device
    #[error("session not supported")]
    Unsupported,

    /// Connector was built outside of a tokio runtime
    #[error("no tokio runtime available")]
    MissingRuntime,
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;
