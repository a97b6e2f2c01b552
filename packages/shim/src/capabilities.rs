//! The functions applet code calls on its host.
//!
//! Each call checks the frame is ready, then makes one round trip. Nothing
//! is queued: a call made before the config arrived fails immediately.

use std::collections::BTreeMap;
use std::sync::Arc;

use framelink_identity::{AgentKey, AppletIdentity, DnaHash, RawHash};
use framelink_protocol::{
    AppletInfo, AssetLocationAndInfo, AssetSource, CreatableResult, CreatableType,
    FrameNotification, GroupProfile, IframeConfig, OpenViewRequest, RequestKind, SignedCall,
    UnsignedCall, Wal, ZomeCallLogInfo,
};

use crate::context::FrameRuntimeContext;
use crate::error::{Result, ShimError};

/// Capability surface of one frame.
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    context: &'a FrameRuntimeContext,
}

impl<'a> Capabilities<'a> {
    pub fn new(context: &'a FrameRuntimeContext) -> Self {
        Self { context }
    }

    /// The config the frame was started with.
    pub fn iframe_config(&self) -> Result<Arc<IframeConfig>> {
        self.context.ensure_ready("get-iframe-config")?;
        self.context.config().ok_or(ShimError::NotReady {
            request: "get-iframe-config",
            state: "ready",
        })
    }

    /// Have the host sign a call. The frame never sees key material.
    pub async fn sign_zome_call(&self, call: UnsignedCall) -> Result<SignedCall> {
        self.context
            .call(RequestKind::SignZomeCall { request: call })
            .await
    }

    pub async fn log_zome_call(&self, info: ZomeCallLogInfo) -> Result<()> {
        self.context.call(RequestKind::LogZomeCall { info }).await
    }

    pub async fn open_view(&self, request: OpenViewRequest) -> Result<()> {
        self.context.call(RequestKind::OpenView { request }).await
    }

    /// Search every applet the host is running.
    pub async fn search(&self, filter: &str) -> Result<Vec<Wal>> {
        self.context
            .call(RequestKind::Search {
                filter: filter.to_string(),
            })
            .await
    }

    pub async fn notify_frame(&self, notifications: Vec<FrameNotification>) -> Result<()> {
        self.context
            .call(RequestKind::NotifyFrame { notifications })
            .await
    }

    pub async fn applet_info(&self, applet_hash: &AppletIdentity) -> Result<Option<AppletInfo>> {
        self.context
            .call(RequestKind::GetAppletInfo {
                applet_hash: *applet_hash,
            })
            .await
    }

    pub async fn group_profile(&self, group_hash: &DnaHash) -> Result<Option<GroupProfile>> {
        self.context
            .call(RequestKind::GetGroupProfile {
                group_hash: *group_hash,
            })
            .await
    }

    pub async fn applet_participants(&self) -> Result<Vec<AgentKey>> {
        self.context.call(RequestKind::AppletParticipants).await
    }

    pub async fn user_select_screen(&self) -> Result<String> {
        self.context.call(RequestKind::UserSelectScreen).await
    }

    pub async fn user_select_asset(&self, from: Option<AssetSource>) -> Result<Option<Wal>> {
        self.context.call(RequestKind::UserSelectAsset { from }).await
    }

    pub async fn toggle_pocket(&self) -> Result<()> {
        self.context.call(RequestKind::TogglePocket).await
    }

    pub async fn asset_to_pocket(&self, wal: Wal) -> Result<()> {
        self.context.call(RequestKind::AssetToPocket { wal }).await
    }

    pub async fn asset_info(&self, wal: Wal) -> Result<Option<AssetLocationAndInfo>> {
        self.context
            .call(RequestKind::GetGlobalAssetInfo { wal })
            .await
    }

    pub async fn add_tags_to_asset(&self, wal: Wal, tags: Vec<String>) -> Result<()> {
        self.context
            .call(RequestKind::AddTagsToAsset { wal, tags })
            .await
    }

    pub async fn remove_tags_from_asset(&self, wal: Wal, tags: Vec<String>) -> Result<()> {
        self.context
            .call(RequestKind::RemoveTagsFromAsset { wal, tags })
            .await
    }

    pub async fn add_asset_relation(
        &self,
        src_wal: Wal,
        dst_wal: Wal,
        tags: Vec<String>,
    ) -> Result<RawHash> {
        self.context
            .call(RequestKind::AddAssetRelation {
                src_wal,
                dst_wal,
                tags,
            })
            .await
    }

    pub async fn remove_asset_relation(&self, relation_hash: RawHash) -> Result<()> {
        self.context
            .call(RequestKind::RemoveAssetRelation { relation_hash })
            .await
    }

    /// Updates arrive as [`FrameEvent::AssetStore`](crate::FrameEvent::AssetStore).
    pub async fn subscribe_to_asset_store(&self, wal: Wal) -> Result<()> {
        self.context
            .call(RequestKind::SubscribeToAssetStore { wal })
            .await
    }

    pub async fn unsubscribe_from_asset_store(&self, wal: Wal) -> Result<()> {
        self.context
            .call(RequestKind::UnsubscribeFromAssetStore { wal })
            .await
    }

    pub async fn update_creatable_types(
        &self,
        value: BTreeMap<String, CreatableType>,
    ) -> Result<()> {
        self.context
            .call(RequestKind::UpdateCreatableTypes { value })
            .await
    }

    pub async fn creatable_result(&self, dialog_id: &str, result: CreatableResult) -> Result<()> {
        self.context
            .call(RequestKind::CreatableResult {
                dialog_id: dialog_id.to_string(),
                result,
            })
            .await
    }

    pub async fn request_close(&self) -> Result<()> {
        self.context.call(RequestKind::RequestClose).await
    }

    /// Without `to_agents` the signal goes to every participant.
    pub async fn send_remote_signal(
        &self,
        payload: Vec<u8>,
        to_agents: Option<Vec<AgentKey>>,
    ) -> Result<()> {
        self.context
            .call(RequestKind::SendRemoteSignal { payload, to_agents })
            .await
    }

    pub async fn local_storage_set_item(&self, key: &str, value: &str) -> Result<()> {
        self.context
            .call(RequestKind::LocalStorageSetItem {
                key: key.to_string(),
                value: value.to_string(),
            })
            .await
    }

    pub async fn local_storage_remove_item(&self, key: &str) -> Result<()> {
        self.context
            .call(RequestKind::LocalStorageRemoveItem {
                key: key.to_string(),
            })
            .await
    }

    pub async fn local_storage_clear(&self) -> Result<()> {
        self.context.call(RequestKind::LocalStorageClear).await
    }

    pub async fn local_storage(&self) -> Result<BTreeMap<String, String>> {
        self.context.call(RequestKind::GetLocalStorage).await
    }

    pub async fn applet_iframe_script(&self) -> Result<String> {
        self.context.call(RequestKind::GetAppletIframeScript).await
    }
}
