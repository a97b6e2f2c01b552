//! Error types for the host.

use std::path::PathBuf;

use framelink_identity::{AgentKey, MalformedIdentity};
use framelink_protocol::{OriginError, TransportError};
use thiserror::Error;

/// A collaborator (store, UI, runtime) failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Why the sender of a message could not be authenticated.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("untrusted origin: {0}")]
    UntrustedOrigin(#[from] OriginError),

    /// A frame served from localhost, but the host does not trust
    /// self-reported identities.
    #[error("development frames are not trusted by this host (origin '{0}')")]
    DevModeDisabled(String),
}

/// Any failure while handling a request. Becomes an error reply.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request is valid but the caller may not make it.
    #[error("'{request}' can only be requested by an applet frame")]
    NotAnApplet { request: &'static str },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The signing delegate declined or failed.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("nonce must be {expected} bytes, got {found}")]
    InvalidNonce { expected: usize, found: usize },

    #[error("provenance {provenance} does not own the target cell")]
    ProvenanceMismatch { provenance: AgentKey },

    #[error("no signing key for agent {0}")]
    UnknownAgent(AgentKey),

    /// The runtime refused to sign, for example because the agent has not
    /// granted access to the target function.
    #[error("signing refused: {0}")]
    Refused(String),

    #[error("failed to encode call for signing: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures serving applet assets.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("invalid asset URL '{0}'")]
    InvalidUrl(String),

    #[error(transparent)]
    Origin(#[from] OriginError),

    #[error("malformed identity: {0}")]
    Identity(#[from] MalformedIdentity),

    /// No UI assets are installed for the frame named in the URL.
    #[error("no asset directory found for '{0}'")]
    NoAssetDirectory(String),

    #[error("path '{0}' escapes the asset directory")]
    PathTraversal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build response: {0}")]
    Http(#[from] http::Error),
}

/// Failures loading the host configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {error}", .path.display())]
    Io { path: PathBuf, error: std::io::Error },

    #[error("failed to parse config file {}: {error}", .path.display())]
    Parse {
        path: PathBuf,
        error: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, HandlerError>;
