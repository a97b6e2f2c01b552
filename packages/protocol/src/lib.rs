//! # framelink-protocol
//!
//! The wire between sandboxed applet frames and the host that brokers
//! their capabilities.
//!
//! A frame sends an [`Envelope`] (a [`RequestKind`] plus its claimed
//! [`FrameKind`]) together with a private [`ReplyPort`]; the host answers
//! with exactly one [`Reply`]. The host reaches frames through
//! [`ParentToAppletMessage`]s, either as requests with a port or as
//! broadcasts without one.
//!
//! All wire types serialize as internally tagged JSON:
//!
//! ```text
//! {"type": "search", "filter": "foo"}
//! {"type": "success", "result": [...]}
//! {"type": "error", "error": "applet not found"}
//! ```

mod channel;
mod config;
mod error;
mod frame;
mod parent;
mod request;
mod types;

pub use channel::{
    frame_channel, host_bus, reply_channel, FrameInbound, FrameInbox, FrameSender, HostBus,
    HostInbox, InboundMessage, PendingReply, ReplyPort,
};
pub use config::{AppletCredentials, AppletFrameConfig, CrossGroupFrameConfig, IframeConfig};
pub use error::{OriginError, TransportError};
pub use frame::{is_local_dev_origin, FrameKind, OriginSchemes, ViewSubType};
pub use parent::ParentToAppletMessage;
pub use request::{Envelope, Reply, RequestKind};
pub use types::{
    stringify_wal, AppletInfo, AssetInfo, AssetLocationAndInfo, AssetSource, AssetStoreContent,
    AsyncStatus, BlockType, CellId, CreatableResult, CreatableType, FrameNotification,
    GroupProfile, Hrl, OpenAssetMode, OpenViewRequest, PeerStatus, PeerStatusMap,
    ProfilesLocation, RecordInfo, SignedCall, UnsignedCall, Urgency, Wal, WalRelationAndTags,
    ZomeCallLogInfo,
};
