//! Host side of the frame protocol.
//!
//! The [`Dispatcher`] receives [`Envelope`](framelink_protocol::Envelope)s
//! from sandboxed frames, works out who sent them from the origin alone and
//! answers each with exactly one [`Reply`](framelink_protocol::Reply).
//! Capabilities are carried out by [`Collaborators`] the embedding shell
//! provides; [`memory`] has in-memory versions of all of them.
//!
//! The [`AssetResolver`] serves frame UI files for the custom schemes and
//! injects the runtime shim into their entry document.

pub mod assets;
pub mod caller;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod memory;
pub mod notifications;
pub mod registry;
pub mod services;
pub mod signing;
pub mod subscriptions;

pub use assets::{content_type, inject_shim, AssetResolver};
pub use caller::Caller;
pub use config::HostConfig;
pub use dispatcher::{Dispatcher, RequestContext, ZOME_CALL_LOG_TARGET};
pub use error::{
    AssetError, ConfigError, DispatchError, HandlerError, Result, ServiceError, SigningError,
};
pub use registry::{FrameId, FrameRegistry};
pub use services::{
    AppletStorage, AssetRelationStore, Collaborators, HostUi, InstallationStore,
    NotificationStore, RuntimeClient,
};
pub use signing::{data_to_sign, verify_signature, KeystoreSigner, SigningDelegate, NONCE_LEN};
