//! In-memory collaborators, for embedding the host without a runtime and
//! for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use framelink_identity::{AgentKey, AppletIdentity, DnaHash, HashKind, RawHash};
use framelink_protocol::{
    stringify_wal, AppletCredentials, AppletInfo, AssetLocationAndInfo, AssetSource,
    AssetStoreContent, CreatableResult, CreatableType, FrameNotification, GroupProfile,
    OpenViewRequest, UnsignedCall, Wal, WalRelationAndTags,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::caller::Caller;
use crate::error::{ServiceError, SigningError};
use crate::services::{
    AppletStorage, AssetRelationStore, Collaborators, HostUi, InstallationStore,
    NotificationStore, RuntimeClient,
};
use crate::signing::KeystoreSigner;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One installed applet.
#[derive(Debug, Clone)]
pub struct InstalledApplet {
    pub applet_hash: AppletIdentity,
    pub tool_compatibility_id: String,
    pub info: AppletInfo,
    pub credentials: AppletCredentials,
    pub participants: Vec<AgentKey>,
    pub asset_dir: Option<PathBuf>,
}

#[derive(Default)]
struct Installations {
    installed: BTreeMap<AppletIdentity, InstalledApplet>,
    known_names: BTreeMap<AppletIdentity, String>,
    groups: BTreeMap<DnaHash, GroupProfile>,
    tool_dirs: BTreeMap<String, PathBuf>,
}

#[derive(Default)]
pub struct MemoryInstallations {
    state: Mutex<Installations>,
}

impl MemoryInstallations {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn install(&self, applet: InstalledApplet) {
        let mut state = self.state.lock().await;
        state
            .known_names
            .insert(applet.applet_hash, applet.info.applet_name.clone());
        state.installed.insert(applet.applet_hash, applet);
    }

    /// Remove an applet. Its name stays known.
    pub async fn uninstall(&self, applet: &AppletIdentity) -> bool {
        self.state.lock().await.installed.remove(applet).is_some()
    }

    /// Remember the name of an applet that is not installed locally.
    pub async fn know(&self, applet: AppletIdentity, name: impl Into<String>) {
        self.state.lock().await.known_names.insert(applet, name.into());
    }

    pub async fn add_group(&self, group: DnaHash, profile: GroupProfile) {
        self.state.lock().await.groups.insert(group, profile);
    }

    pub async fn set_tool_asset_dir(&self, tool_compatibility_id: &str, dir: PathBuf) {
        self.state
            .lock()
            .await
            .tool_dirs
            .insert(tool_compatibility_id.to_string(), dir);
    }
}

#[async_trait]
impl InstallationStore for MemoryInstallations {
    async fn is_installed(&self, applet: &AppletIdentity) -> bool {
        self.state.lock().await.installed.contains_key(applet)
    }

    async fn display_name(&self, applet: &AppletIdentity) -> Option<String> {
        self.state.lock().await.known_names.get(applet).cloned()
    }

    async fn credentials(
        &self,
        applet: &AppletIdentity,
    ) -> Result<AppletCredentials, ServiceError> {
        self.state
            .lock()
            .await
            .installed
            .get(applet)
            .map(|a| a.credentials.clone())
            .ok_or_else(|| ServiceError::new(format!("applet {} is not installed", applet)))
    }

    async fn groups_for(&self, applet: &AppletIdentity) -> Vec<DnaHash> {
        self.state
            .lock()
            .await
            .installed
            .get(applet)
            .map(|a| a.info.group_hashes.clone())
            .unwrap_or_default()
    }

    async fn group_profile(&self, group: &DnaHash) -> Option<GroupProfile> {
        self.state.lock().await.groups.get(group).cloned()
    }

    async fn applet_info(&self, applet: &AppletIdentity) -> Option<AppletInfo> {
        self.state
            .lock()
            .await
            .installed
            .get(applet)
            .map(|a| a.info.clone())
    }

    async fn applets_for_tool(&self, tool_compatibility_id: &str) -> Vec<AppletIdentity> {
        self.state
            .lock()
            .await
            .installed
            .values()
            .filter(|a| a.tool_compatibility_id == tool_compatibility_id)
            .map(|a| a.applet_hash)
            .collect()
    }

    async fn participants(&self, applet: &AppletIdentity) -> Result<Vec<AgentKey>, ServiceError> {
        self.state
            .lock()
            .await
            .installed
            .get(applet)
            .map(|a| a.participants.clone())
            .ok_or_else(|| ServiceError::new(format!("applet {} is not installed", applet)))
    }

    async fn ui_asset_dir(&self, applet: &AppletIdentity) -> Option<PathBuf> {
        self.state
            .lock()
            .await
            .installed
            .get(applet)
            .and_then(|a| a.asset_dir.clone())
    }

    async fn tool_asset_dir(&self, tool_compatibility_id: &str) -> Option<PathBuf> {
        self.state
            .lock()
            .await
            .tool_dirs
            .get(tool_compatibility_id)
            .cloned()
    }
}

/// A remote signal as handed to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSignal {
    pub applet: AppletIdentity,
    pub payload: Vec<u8>,
    pub to_agents: Vec<AgentKey>,
}

/// A runtime that signs with a [`KeystoreSigner`] and records signals.
#[derive(Default)]
pub struct MemoryRuntime {
    pub keystore: KeystoreSigner,
    signals: Mutex<Vec<SentSignal>>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent_signals(&self) -> Vec<SentSignal> {
        self.signals.lock().await.clone()
    }
}

#[async_trait]
impl RuntimeClient for MemoryRuntime {
    async fn sign_call(
        &self,
        call: &UnsignedCall,
        data_to_sign: &[u8],
    ) -> Result<Vec<u8>, SigningError> {
        self.keystore.sign(call, data_to_sign).await
    }

    async fn send_remote_signal(
        &self,
        applet: &AppletIdentity,
        payload: Vec<u8>,
        to_agents: Vec<AgentKey>,
    ) -> Result<(), ServiceError> {
        self.signals.lock().await.push(SentSignal {
            applet: *applet,
            payload,
            to_agents,
        });
        Ok(())
    }
}

/// Something a frame asked the host UI to do.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    OpenView {
        caller: Caller,
        request: OpenViewRequest,
    },
    SelectScreen,
    SelectAsset(Option<AssetSource>),
    TogglePocket,
    AddToPocket(Wal),
    UpdateCreatableTypes {
        applet: AppletIdentity,
        types: BTreeMap<String, CreatableType>,
    },
    CreatableResult {
        dialog_id: String,
        result: CreatableResult,
    },
    RequestClose(Caller),
}

/// A UI that records every request and answers selections from presets.
#[derive(Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
    screen: Mutex<Option<String>>,
    selected_asset: Mutex<Option<Wal>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<UiEvent> {
        self.events.lock().await.clone()
    }

    /// The source id returned for the next screen selection.
    pub async fn preset_screen(&self, source_id: impl Into<String>) {
        *self.screen.lock().await = Some(source_id.into());
    }

    pub async fn preset_asset(&self, wal: Option<Wal>) {
        *self.selected_asset.lock().await = wal;
    }

    async fn record(&self, event: UiEvent) {
        self.events.lock().await.push(event);
    }
}

#[async_trait]
impl HostUi for RecordingUi {
    async fn open_view(
        &self,
        caller: &Caller,
        request: OpenViewRequest,
    ) -> Result<(), ServiceError> {
        self.record(UiEvent::OpenView {
            caller: caller.clone(),
            request,
        })
        .await;
        Ok(())
    }

    async fn select_screen(&self) -> Result<String, ServiceError> {
        self.record(UiEvent::SelectScreen).await;
        self.screen
            .lock()
            .await
            .clone()
            .ok_or_else(|| ServiceError::new("no screen selected"))
    }

    async fn select_asset(&self, from: Option<AssetSource>) -> Result<Option<Wal>, ServiceError> {
        self.record(UiEvent::SelectAsset(from)).await;
        Ok(self.selected_asset.lock().await.clone())
    }

    async fn toggle_pocket(&self) -> Result<(), ServiceError> {
        self.record(UiEvent::TogglePocket).await;
        Ok(())
    }

    async fn add_to_pocket(&self, wal: Wal) -> Result<(), ServiceError> {
        self.record(UiEvent::AddToPocket(wal)).await;
        Ok(())
    }

    async fn update_creatable_types(
        &self,
        applet: &AppletIdentity,
        types: BTreeMap<String, CreatableType>,
    ) -> Result<(), ServiceError> {
        self.record(UiEvent::UpdateCreatableTypes {
            applet: *applet,
            types,
        })
        .await;
        Ok(())
    }

    async fn creatable_result(
        &self,
        dialog_id: &str,
        result: CreatableResult,
    ) -> Result<(), ServiceError> {
        self.record(UiEvent::CreatableResult {
            dialog_id: dialog_id.to_string(),
            result,
        })
        .await;
        Ok(())
    }

    async fn request_close(&self, caller: &Caller) -> Result<(), ServiceError> {
        self.record(UiEvent::RequestClose(caller.clone())).await;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryNotifications {
    stored: Mutex<BTreeMap<AppletIdentity, Vec<FrameNotification>>>,
}

impl MemoryNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn for_applet(&self, applet: &AppletIdentity) -> Vec<FrameNotification> {
        self.stored
            .lock()
            .await
            .get(applet)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotifications {
    async fn store(
        &self,
        applet: &AppletIdentity,
        notifications: Vec<FrameNotification>,
    ) -> Result<(), ServiceError> {
        self.stored
            .lock()
            .await
            .entry(*applet)
            .or_default()
            .extend(notifications);
        Ok(())
    }
}

struct Relation {
    src: Wal,
    dst: Wal,
    tags: Vec<String>,
    created_at: i64,
}

#[derive(Default)]
struct AssetState {
    tags: BTreeMap<String, BTreeSet<String>>,
    info: BTreeMap<String, AssetLocationAndInfo>,
    relations: BTreeMap<RawHash, Relation>,
}

#[derive(Default)]
pub struct MemoryAssetStore {
    state: Mutex<AssetState>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetRelationStore for MemoryAssetStore {
    async fn asset_info(
        &self,
        wal_key: &str,
    ) -> Result<Option<AssetLocationAndInfo>, ServiceError> {
        Ok(self.state.lock().await.info.get(wal_key).cloned())
    }

    async fn cache_asset_info(
        &self,
        wal_key: &str,
        info: AssetLocationAndInfo,
    ) -> Result<(), ServiceError> {
        self.state.lock().await.info.insert(wal_key.to_string(), info);
        Ok(())
    }

    async fn content(&self, wal: &Wal) -> Result<AssetStoreContent, ServiceError> {
        let key = stringify_wal(wal);
        let state = self.state.lock().await;
        let tags = state
            .tags
            .get(&key)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default();

        let mut content = AssetStoreContent {
            tags,
            ..Default::default()
        };
        for (hash, relation) in &state.relations {
            if stringify_wal(&relation.src) == key {
                content.linked_to.push(WalRelationAndTags {
                    relation_hash: *hash,
                    created_at: relation.created_at,
                    wal: relation.dst.clone(),
                    tags: relation.tags.clone(),
                });
            }
            if stringify_wal(&relation.dst) == key {
                content.linked_from.push(WalRelationAndTags {
                    relation_hash: *hash,
                    created_at: relation.created_at,
                    wal: relation.src.clone(),
                    tags: relation.tags.clone(),
                });
            }
        }
        Ok(content)
    }

    async fn add_tags(&self, wal: &Wal, tags: Vec<String>) -> Result<(), ServiceError> {
        self.state
            .lock()
            .await
            .tags
            .entry(stringify_wal(wal))
            .or_default()
            .extend(tags);
        Ok(())
    }

    async fn remove_tags(&self, wal: &Wal, tags: Vec<String>) -> Result<(), ServiceError> {
        if let Some(existing) = self.state.lock().await.tags.get_mut(&stringify_wal(wal)) {
            for tag in &tags {
                existing.remove(tag);
            }
        }
        Ok(())
    }

    async fn add_relation(
        &self,
        src: &Wal,
        dst: &Wal,
        tags: Vec<String>,
    ) -> Result<RawHash, ServiceError> {
        let mut core = [0u8; 32];
        core[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        core[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        let hash = RawHash::from_core(HashKind::Action, core);

        self.state.lock().await.relations.insert(
            hash,
            Relation {
                src: src.clone(),
                dst: dst.clone(),
                tags,
                created_at: now_millis(),
            },
        );
        Ok(hash)
    }

    async fn remove_relation(
        &self,
        relation: &RawHash,
    ) -> Result<Option<(Wal, Wal)>, ServiceError> {
        Ok(self
            .state
            .lock()
            .await
            .relations
            .remove(relation)
            .map(|r| (r.src, r.dst)))
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    scopes: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppletStorage for MemoryStorage {
    async fn set_item(&self, scope: &str, key: String, value: String) -> Result<(), ServiceError> {
        self.scopes
            .lock()
            .await
            .entry(scope.to_string())
            .or_default()
            .insert(key, value);
        Ok(())
    }

    async fn remove_item(&self, scope: &str, key: &str) -> Result<(), ServiceError> {
        if let Some(items) = self.scopes.lock().await.get_mut(scope) {
            items.remove(key);
        }
        Ok(())
    }

    async fn clear(&self, scope: &str) -> Result<(), ServiceError> {
        self.scopes.lock().await.remove(scope);
        Ok(())
    }

    async fn items(&self, scope: &str) -> Result<BTreeMap<String, String>, ServiceError> {
        Ok(self
            .scopes
            .lock()
            .await
            .get(scope)
            .cloned()
            .unwrap_or_default())
    }
}

/// Typed handles to a set of in-memory collaborators, for inspection.
#[derive(Clone)]
pub struct MemoryServices {
    pub installations: Arc<MemoryInstallations>,
    pub runtime: Arc<MemoryRuntime>,
    pub ui: Arc<RecordingUi>,
    pub notifications: Arc<MemoryNotifications>,
    pub assets: Arc<MemoryAssetStore>,
    pub storage: Arc<MemoryStorage>,
}

impl MemoryServices {
    pub fn new() -> Self {
        Self {
            installations: Arc::new(MemoryInstallations::new()),
            runtime: Arc::new(MemoryRuntime::new()),
            ui: Arc::new(RecordingUi::new()),
            notifications: Arc::new(MemoryNotifications::new()),
            assets: Arc::new(MemoryAssetStore::new()),
            storage: Arc::new(MemoryStorage::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            installations: self.installations.clone(),
            runtime: self.runtime.clone(),
            ui: self.ui.clone(),
            notifications: self.notifications.clone(),
            assets: self.assets.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl Default for MemoryServices {
    fn default() -> Self {
        Self::new()
    }
}
