use serde::{Deserialize, Serialize};

use crate::types::{AssetStoreContent, AsyncStatus, PeerStatusMap, RecordInfo, Wal};

/// Messages the host sends down to a frame.
///
/// Some expect an answer (`search`, `get-block-types`,
/// `get-applet-asset-info`, `on-before-unload`), the rest are broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ParentToAppletMessage {
    Search {
        filter: String,
    },
    GetBlockTypes,
    GetAppletAssetInfo {
        wal: Wal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record_info: Option<RecordInfo>,
    },
    OnBeforeUnload,
    PeerStatusUpdate {
        payload: PeerStatusMap,
    },
    LocaleChange {
        locale: String,
    },
    AssetStoreUpdate {
        wal_stringified: String,
        value: AsyncStatus<AssetStoreContent>,
    },
    RemoteSignalReceived {
        payload: Vec<u8>,
    },
}

impl ParentToAppletMessage {
    pub fn tag(&self) -> &'static str {
        match self {
            ParentToAppletMessage::Search { .. } => "search",
            ParentToAppletMessage::GetBlockTypes => "get-block-types",
            ParentToAppletMessage::GetAppletAssetInfo { .. } => "get-applet-asset-info",
            ParentToAppletMessage::OnBeforeUnload => "on-before-unload",
            ParentToAppletMessage::PeerStatusUpdate { .. } => "peer-status-update",
            ParentToAppletMessage::LocaleChange { .. } => "locale-change",
            ParentToAppletMessage::AssetStoreUpdate { .. } => "asset-store-update",
            ParentToAppletMessage::RemoteSignalReceived { .. } => "remote-signal-received",
        }
    }
}
