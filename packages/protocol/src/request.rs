//! Frame-to-host requests and the replies they get.

use std::collections::BTreeMap;

use framelink_identity::{AgentKey, AppletIdentity, DnaHash, RawHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::FrameKind;
use crate::types::{
    AssetSource, CreatableResult, CreatableType, FrameNotification, OpenViewRequest, UnsignedCall,
    Wal, ZomeCallLogInfo,
};

/// Every request a frame can make of its host.
///
/// The set is closed: adding a variant is backward compatible, removing
/// one is not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RequestKind {
    GetIframeConfig,
    SignZomeCall {
        request: UnsignedCall,
    },
    LogZomeCall {
        info: ZomeCallLogInfo,
    },
    OpenView {
        request: OpenViewRequest,
    },
    Search {
        filter: String,
    },
    NotifyFrame {
        notifications: Vec<FrameNotification>,
    },
    GetAppletInfo {
        applet_hash: AppletIdentity,
    },
    GetGroupProfile {
        group_hash: DnaHash,
    },
    AppletParticipants,
    UserSelectScreen,
    UserSelectAsset {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<AssetSource>,
    },
    TogglePocket,
    AssetToPocket {
        wal: Wal,
    },
    GetGlobalAssetInfo {
        wal: Wal,
    },
    AddTagsToAsset {
        wal: Wal,
        tags: Vec<String>,
    },
    RemoveTagsFromAsset {
        wal: Wal,
        tags: Vec<String>,
    },
    AddAssetRelation {
        src_wal: Wal,
        dst_wal: Wal,
        #[serde(default)]
        tags: Vec<String>,
    },
    RemoveAssetRelation {
        relation_hash: RawHash,
    },
    SubscribeToAssetStore {
        wal: Wal,
    },
    UnsubscribeFromAssetStore {
        wal: Wal,
    },
    UpdateCreatableTypes {
        value: BTreeMap<String, CreatableType>,
    },
    CreatableResult {
        dialog_id: String,
        result: CreatableResult,
    },
    RequestClose,
    SendRemoteSignal {
        payload: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to_agents: Option<Vec<AgentKey>>,
    },
    LocalStorageSetItem {
        key: String,
        value: String,
    },
    LocalStorageRemoveItem {
        key: String,
    },
    LocalStorageClear,
    GetLocalStorage,
    GetAppletIframeScript,
}

impl RequestKind {
    /// The wire tag, for logs.
    pub fn tag(&self) -> &'static str {
        match self {
            RequestKind::GetIframeConfig => "get-iframe-config",
            RequestKind::SignZomeCall { .. } => "sign-zome-call",
            RequestKind::LogZomeCall { .. } => "log-zome-call",
            RequestKind::OpenView { .. } => "open-view",
            RequestKind::Search { .. } => "search",
            RequestKind::NotifyFrame { .. } => "notify-frame",
            RequestKind::GetAppletInfo { .. } => "get-applet-info",
            RequestKind::GetGroupProfile { .. } => "get-group-profile",
            RequestKind::AppletParticipants => "applet-participants",
            RequestKind::UserSelectScreen => "user-select-screen",
            RequestKind::UserSelectAsset { .. } => "user-select-asset",
            RequestKind::TogglePocket => "toggle-pocket",
            RequestKind::AssetToPocket { .. } => "asset-to-pocket",
            RequestKind::GetGlobalAssetInfo { .. } => "get-global-asset-info",
            RequestKind::AddTagsToAsset { .. } => "add-tags-to-asset",
            RequestKind::RemoveTagsFromAsset { .. } => "remove-tags-from-asset",
            RequestKind::AddAssetRelation { .. } => "add-asset-relation",
            RequestKind::RemoveAssetRelation { .. } => "remove-asset-relation",
            RequestKind::SubscribeToAssetStore { .. } => "subscribe-to-asset-store",
            RequestKind::UnsubscribeFromAssetStore { .. } => "unsubscribe-from-asset-store",
            RequestKind::UpdateCreatableTypes { .. } => "update-creatable-types",
            RequestKind::CreatableResult { .. } => "creatable-result",
            RequestKind::RequestClose => "request-close",
            RequestKind::SendRemoteSignal { .. } => "send-remote-signal",
            RequestKind::LocalStorageSetItem { .. } => "local-storage-set-item",
            RequestKind::LocalStorageRemoveItem { .. } => "local-storage-remove-item",
            RequestKind::LocalStorageClear => "local-storage-clear",
            RequestKind::GetLocalStorage => "get-local-storage",
            RequestKind::GetAppletIframeScript => "get-applet-iframe-script",
        }
    }
}

/// A request together with the sender's claimed role.
///
/// The claim is advisory. The host derives the real role from the origin
/// the message arrived with and only reads the sub-type from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub request: RequestKind,
    pub sender: FrameKind,
}

impl Envelope {
    pub fn new(request: RequestKind, sender: FrameKind) -> Self {
        Self { request, sender }
    }
}

/// The single answer to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Reply {
    Success { result: Value },
    Error { error: String },
}

impl Reply {
    /// A successful reply. Serialization failures become error replies.
    pub fn success<T: Serialize>(result: &T) -> Self {
        match serde_json::to_value(result) {
            Ok(result) => Reply::Success { result },
            Err(e) => Reply::Error {
                error: format!("failed to serialize result: {}", e),
            },
        }
    }

    pub fn ok() -> Self {
        Reply::Success {
            result: Value::Null,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error {
            error: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }

    pub fn into_result(self) -> Result<Value, String> {
        match self {
            Reply::Success { result } => Ok(result),
            Reply::Error { error } => Err(error),
        }
    }
}
