//! Collaborators the dispatcher consumes.
//!
//! The host owns these stores; frames never see them. Each trait is
//! narrow enough to be backed by the real runtime, a UI shell or, for
//! tests, the in-memory versions in [`crate::memory`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use framelink_identity::{AgentKey, AppletIdentity, DnaHash, RawHash};
use framelink_protocol::{
    AppletCredentials, AppletInfo, AssetLocationAndInfo, AssetSource, AssetStoreContent,
    CreatableResult, CreatableType, FrameNotification, GroupProfile, OpenViewRequest,
    UnsignedCall, Wal,
};

use crate::caller::Caller;
use crate::error::{ServiceError, SigningError};

/// Installation state. Read-only from the dispatcher's point of view.
#[async_trait]
pub trait InstallationStore: Send + Sync {
    async fn is_installed(&self, applet: &AppletIdentity) -> bool;

    /// A name for the applet, also for applets that are known but not
    /// installed.
    async fn display_name(&self, applet: &AppletIdentity) -> Option<String>;

    async fn credentials(&self, applet: &AppletIdentity)
        -> Result<AppletCredentials, ServiceError>;

    async fn groups_for(&self, applet: &AppletIdentity) -> Vec<DnaHash>;

    async fn group_profile(&self, group: &DnaHash) -> Option<GroupProfile>;

    async fn applet_info(&self, applet: &AppletIdentity) -> Option<AppletInfo>;

    /// Installed instances of one tool, across all groups.
    async fn applets_for_tool(&self, tool_compatibility_id: &str) -> Vec<AppletIdentity>;

    async fn participants(&self, applet: &AppletIdentity) -> Result<Vec<AgentKey>, ServiceError>;

    /// Where the applet's UI files are unpacked.
    async fn ui_asset_dir(&self, applet: &AppletIdentity) -> Option<PathBuf>;

    async fn tool_asset_dir(&self, tool_compatibility_id: &str) -> Option<PathBuf>;
}

/// The underlying runtime, holder of the keystore.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Sign `data_to_sign` with the call's provenance key. The runtime
    /// decides whether the agent has granted access to the function.
    async fn sign_call(
        &self,
        call: &UnsignedCall,
        data_to_sign: &[u8],
    ) -> Result<Vec<u8>, SigningError>;

    async fn send_remote_signal(
        &self,
        applet: &AppletIdentity,
        payload: Vec<u8>,
        to_agents: Vec<AgentKey>,
    ) -> Result<(), ServiceError>;
}

/// The host's own UI.
#[async_trait]
pub trait HostUi: Send + Sync {
    async fn open_view(&self, caller: &Caller, request: OpenViewRequest)
        -> Result<(), ServiceError>;

    /// Let the user pick a screen to share. Returns the source id.
    async fn select_screen(&self) -> Result<String, ServiceError>;

    async fn select_asset(&self, from: Option<AssetSource>) -> Result<Option<Wal>, ServiceError>;

    async fn toggle_pocket(&self) -> Result<(), ServiceError>;

    async fn add_to_pocket(&self, wal: Wal) -> Result<(), ServiceError>;

    async fn update_creatable_types(
        &self,
        applet: &AppletIdentity,
        types: BTreeMap<String, CreatableType>,
    ) -> Result<(), ServiceError>;

    async fn creatable_result(
        &self,
        dialog_id: &str,
        result: CreatableResult,
    ) -> Result<(), ServiceError>;

    async fn request_close(&self, caller: &Caller) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn store(
        &self,
        applet: &AppletIdentity,
        notifications: Vec<FrameNotification>,
    ) -> Result<(), ServiceError>;
}

/// Tags, relations and cached info of assets, keyed by
/// [`stringify_wal`](framelink_protocol::stringify_wal).
#[async_trait]
pub trait AssetRelationStore: Send + Sync {
    async fn asset_info(&self, wal_key: &str)
        -> Result<Option<AssetLocationAndInfo>, ServiceError>;

    async fn cache_asset_info(
        &self,
        wal_key: &str,
        info: AssetLocationAndInfo,
    ) -> Result<(), ServiceError>;

    async fn content(&self, wal: &Wal) -> Result<AssetStoreContent, ServiceError>;

    async fn add_tags(&self, wal: &Wal, tags: Vec<String>) -> Result<(), ServiceError>;

    async fn remove_tags(&self, wal: &Wal, tags: Vec<String>) -> Result<(), ServiceError>;

    /// Returns the hash naming the new relation.
    async fn add_relation(
        &self,
        src: &Wal,
        dst: &Wal,
        tags: Vec<String>,
    ) -> Result<RawHash, ServiceError>;

    /// Returns the two ends of the removed relation, if it existed.
    async fn remove_relation(&self, relation: &RawHash)
        -> Result<Option<(Wal, Wal)>, ServiceError>;
}

/// Per-applet mirror of a frame's `localStorage`.
#[async_trait]
pub trait AppletStorage: Send + Sync {
    async fn set_item(&self, scope: &str, key: String, value: String) -> Result<(), ServiceError>;

    async fn remove_item(&self, scope: &str, key: &str) -> Result<(), ServiceError>;

    async fn clear(&self, scope: &str) -> Result<(), ServiceError>;

    async fn items(&self, scope: &str) -> Result<BTreeMap<String, String>, ServiceError>;
}

/// Everything the dispatcher talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub installations: Arc<dyn InstallationStore>,
    pub runtime: Arc<dyn RuntimeClient>,
    pub ui: Arc<dyn HostUi>,
    pub notifications: Arc<dyn NotificationStore>,
    pub assets: Arc<dyn AssetRelationStore>,
    pub storage: Arc<dyn AppletStorage>,
}
