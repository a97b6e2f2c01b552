//! Error types for the frame runtime.

use framelink_protocol::{OriginError, TransportError};
use thiserror::Error;

/// Errors surfaced to applet code.
#[derive(Debug, Error)]
pub enum ShimError {
    /// A capability was used before the frame received its config.
    #[error("'{request}' is not available while the frame is {state}")]
    NotReady {
        request: &'static str,
        state: &'static str,
    },

    /// The frame's applet is not installed; no capability is ever available.
    #[error("'{request}' is not available: applet '{applet_name}' is not installed")]
    NotInstalled {
        request: &'static str,
        applet_name: String,
    },

    #[error("frame runtime already started")]
    AlreadyStarted,

    #[error("invalid frame origin: {0}")]
    Origin(#[from] OriginError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The host answered with an error reply.
    #[error("host error: {0}")]
    Host(String),

    /// Applet code failed while answering the host.
    #[error("applet error: {0}")]
    Applet(String),

    #[error("unexpected reply: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ShimError>;
