use framelink_identity::MalformedIdentity;
use thiserror::Error;

/// Failures on the message path between a frame and its host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The reply port was dropped without a reply being sent.
    #[error("reply channel closed before a reply was sent")]
    Closed,

    /// The receiving side of a bus is gone.
    #[error("no one is listening on the {0} bus")]
    Disconnected(&'static str),
}

/// Failures turning an origin or payload into a [`FrameKind`](crate::FrameKind).
#[derive(Debug, Error)]
pub enum OriginError {
    #[error("origin '{0}' is not a valid URL: {1}")]
    InvalidUrl(String, url::ParseError),

    #[error("origin '{0}' does not use an applet scheme")]
    UnexpectedScheme(String),

    #[error("origin '{0}' has no host component")]
    MissingHost(String),

    #[error("malformed identity in origin: {0}")]
    Identity(#[from] MalformedIdentity),

    #[error("invalid development payload: {0}")]
    DevPayload(String),
}
