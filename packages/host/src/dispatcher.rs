//! Routing frame requests to capabilities.
//!
//! Every inbound message goes through the same steps:
//!
//! 1. Authenticate: derive the caller from the origin the message arrived
//!    with. The envelope's own `sender` only contributes the view sub-type,
//!    except for localhost frames on a development host.
//! 2. Applets that are not installed get a `not-installed` config back,
//!    whatever they asked for.
//! 3. Route the request to its capability.
//! 4. Reply exactly once: handler failures become error replies.

use std::sync::Arc;

use framelink_identity::AppletIdentity;
use framelink_protocol::{
    is_local_dev_origin, stringify_wal, AppletFrameConfig, AsyncStatus, CrossGroupFrameConfig,
    Envelope, FrameInbox, FrameKind, HostInbox, IframeConfig, InboundMessage, OriginError,
    OriginSchemes, ParentToAppletMessage, Reply, RequestKind, Wal,
};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::caller::Caller;
use crate::config::HostConfig;
use crate::error::{DispatchError, Result};
use crate::notifications::validate_notifications;
use crate::registry::{FrameId, FrameRegistry};
use crate::services::Collaborators;
use crate::signing::SigningDelegate;

/// Target for zome call timing events.
pub const ZOME_CALL_LOG_TARGET: &str = "framelink::zome_calls";

fn json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Where a request came from.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Origin the message arrived with.
    pub origin: String,
    pub caller: Caller,
}

struct DispatcherInner {
    config: HostConfig,
    schemes: OriginSchemes,
    services: Collaborators,
    registry: FrameRegistry,
    signer: SigningDelegate,
    shim_script: Arc<str>,
}

/// The host's side of the protocol. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn new(
        config: HostConfig,
        services: Collaborators,
        shim_script: impl Into<Arc<str>>,
    ) -> Self {
        let registry = FrameRegistry::new(config.main_ui_origin.as_str());
        let signer = SigningDelegate::new(services.runtime.clone())
            .with_call_logging(config.zome_call_logging);
        if config.dev_mode && !config.trusts_dev_frames() {
            warn!("dev_mode is set but this host was built without the dev-mode feature");
        }
        Self {
            inner: Arc::new(DispatcherInner {
                schemes: config.schemes(),
                config,
                services,
                registry,
                signer,
                shim_script: shim_script.into(),
            }),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &FrameRegistry {
        &self.inner.registry
    }

    /// Host a new frame served from `origin`. Returns the frame's id and
    /// the inbox its shim reads host messages from.
    pub async fn attach_frame(&self, origin: &str, kind: FrameKind) -> (FrameId, FrameInbox) {
        let (sender, inbox) = framelink_protocol::frame_channel();
        let id = self.inner.registry.register(origin, kind, sender).await;
        (id, inbox)
    }

    /// Handle every message from `inbox`, each in its own task, until all
    /// buses are dropped.
    pub fn serve(self, mut inbox: HostInbox) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                let dispatcher = self.clone();
                tokio::spawn(async move { dispatcher.dispatch(message).await });
            }
            debug!("host inbox closed");
        })
    }

    /// Handle one message and reply to it.
    pub async fn dispatch(&self, message: InboundMessage) {
        let InboundMessage {
            origin,
            envelope,
            port,
        } = message;
        let request = envelope.request.tag();

        let reply = match self.handle(&origin, envelope).await {
            Ok(result) => Reply::Success { result },
            Err(e) => {
                warn!(origin = %origin, request, "request failed: {e}");
                Reply::error(e.to_string())
            }
        };

        if port.send(reply).is_err() {
            debug!(origin = %origin, request, "caller stopped waiting for the reply");
        }
    }

    /// Authenticate and route one request.
    pub async fn handle(&self, origin: &str, envelope: Envelope) -> Result<Value> {
        let caller = self.authenticate(origin, &envelope.sender)?;

        if let Caller::Applet { applet_hash, .. } = &caller {
            let installations = &self.inner.services.installations;
            if !installations.is_installed(applet_hash).await {
                info!(
                    applet = %applet_hash,
                    request = envelope.request.tag(),
                    "request from an applet that is not installed"
                );
                let name = installations
                    .display_name(applet_hash)
                    .await
                    .unwrap_or_else(|| applet_hash.to_b64());
                return json(IframeConfig::not_installed(name));
            }
        }

        let context = RequestContext {
            origin: origin.to_string(),
            caller,
        };
        self.route(&context, envelope.request).await
    }

    fn authenticate(
        &self,
        origin: &str,
        claimed: &FrameKind,
    ) -> std::result::Result<Caller, DispatchError> {
        let kind = if is_local_dev_origin(origin) {
            self.authenticate_dev(origin, claimed)?
        } else {
            let sub_type = claimed.sub_type().unwrap_or_default();
            FrameKind::from_origin(origin, &self.inner.schemes, sub_type)?
        };
        Caller::from_resolved(kind).ok_or_else(|| {
            DispatchError::UntrustedOrigin(OriginError::DevPayload(
                "unresolved development payload".into(),
            ))
        })
    }

    #[cfg(feature = "dev-mode")]
    fn authenticate_dev(
        &self,
        origin: &str,
        claimed: &FrameKind,
    ) -> std::result::Result<FrameKind, DispatchError> {
        if !self.inner.config.dev_mode {
            return Err(DispatchError::DevModeDisabled(origin.to_string()));
        }
        debug!(origin, "trusting self-reported frame identity");
        Ok(claimed.resolve_dev_payload()?)
    }

    #[cfg(not(feature = "dev-mode"))]
    fn authenticate_dev(
        &self,
        origin: &str,
        _claimed: &FrameKind,
    ) -> std::result::Result<FrameKind, DispatchError> {
        Err(DispatchError::DevModeDisabled(origin.to_string()))
    }

    async fn route(&self, context: &RequestContext, request: RequestKind) -> Result<Value> {
        let services = &self.inner.services;
        let caller = &context.caller;

        match request {
            RequestKind::GetIframeConfig => json(self.iframe_config(caller).await?),

            RequestKind::SignZomeCall { request } => {
                json(self.inner.signer.sign(caller, request).await?)
            }

            RequestKind::LogZomeCall { info } => {
                if self.inner.config.zome_call_logging {
                    info!(
                        target: ZOME_CALL_LOG_TARGET,
                        %caller,
                        zome = %info.zome_name,
                        function = %info.fn_name,
                        start_time = info.start_time,
                        duration_ms = info.duration_ms,
                        "zome call"
                    );
                }
                Ok(Value::Null)
            }

            RequestKind::OpenView { request } => {
                services.ui.open_view(caller, request).await?;
                Ok(Value::Null)
            }

            RequestKind::Search { filter } => json(self.inner.registry.search(&filter).await),

            RequestKind::NotifyFrame { notifications } => {
                let applet = caller.applet("notify-frame")?;
                validate_notifications(&notifications)?;
                services.notifications.store(applet, notifications).await?;
                Ok(Value::Null)
            }

            RequestKind::GetAppletInfo { applet_hash } => {
                json(services.installations.applet_info(&applet_hash).await)
            }

            RequestKind::GetGroupProfile { group_hash } => {
                json(services.installations.group_profile(&group_hash).await)
            }

            RequestKind::AppletParticipants => {
                let applet = caller.applet("applet-participants")?;
                json(services.installations.participants(applet).await?)
            }

            RequestKind::UserSelectScreen => json(services.ui.select_screen().await?),

            RequestKind::UserSelectAsset { from } => json(services.ui.select_asset(from).await?),

            RequestKind::TogglePocket => {
                services.ui.toggle_pocket().await?;
                Ok(Value::Null)
            }

            RequestKind::AssetToPocket { wal } => {
                services.ui.add_to_pocket(wal).await?;
                Ok(Value::Null)
            }

            RequestKind::GetGlobalAssetInfo { wal } => json(self.global_asset_info(&wal).await?),

            RequestKind::AddTagsToAsset { wal, tags } => {
                services.assets.add_tags(&wal, tags).await?;
                self.republish(&wal).await;
                Ok(Value::Null)
            }

            RequestKind::RemoveTagsFromAsset { wal, tags } => {
                services.assets.remove_tags(&wal, tags).await?;
                self.republish(&wal).await;
                Ok(Value::Null)
            }

            RequestKind::AddAssetRelation {
                src_wal,
                dst_wal,
                tags,
            } => {
                let relation = services.assets.add_relation(&src_wal, &dst_wal, tags).await?;
                self.republish(&src_wal).await;
                self.republish(&dst_wal).await;
                json(relation)
            }

            RequestKind::RemoveAssetRelation { relation_hash } => {
                if let Some((src, dst)) = services.assets.remove_relation(&relation_hash).await? {
                    self.republish(&src).await;
                    self.republish(&dst).await;
                }
                Ok(Value::Null)
            }

            RequestKind::SubscribeToAssetStore { wal } => {
                let key = stringify_wal(&wal);
                self.inner
                    .registry
                    .subscriptions()
                    .subscribe(&key, &context.origin)
                    .await;
                self.publish(&wal, vec![context.origin.clone()]).await;
                Ok(Value::Null)
            }

            RequestKind::UnsubscribeFromAssetStore { wal } => {
                let key = stringify_wal(&wal);
                self.inner
                    .registry
                    .subscriptions()
                    .unsubscribe(&key, &context.origin)
                    .await;
                Ok(Value::Null)
            }

            RequestKind::UpdateCreatableTypes { value } => {
                let applet = caller.applet("update-creatable-types")?;
                services.ui.update_creatable_types(applet, value).await?;
                Ok(Value::Null)
            }

            RequestKind::CreatableResult { dialog_id, result } => {
                services.ui.creatable_result(&dialog_id, result).await?;
                Ok(Value::Null)
            }

            RequestKind::RequestClose => {
                services.ui.request_close(caller).await?;
                Ok(Value::Null)
            }

            RequestKind::SendRemoteSignal { payload, to_agents } => {
                let applet = caller.applet("send-remote-signal")?;
                let to_agents = match to_agents {
                    Some(agents) => agents,
                    None => services.installations.participants(applet).await?,
                };
                services
                    .runtime
                    .send_remote_signal(applet, payload, to_agents)
                    .await?;
                Ok(Value::Null)
            }

            RequestKind::LocalStorageSetItem { key, value } => {
                services
                    .storage
                    .set_item(&caller.storage_scope(), key, value)
                    .await?;
                Ok(Value::Null)
            }

            RequestKind::LocalStorageRemoveItem { key } => {
                services
                    .storage
                    .remove_item(&caller.storage_scope(), &key)
                    .await?;
                Ok(Value::Null)
            }

            RequestKind::LocalStorageClear => {
                services.storage.clear(&caller.storage_scope()).await?;
                Ok(Value::Null)
            }

            RequestKind::GetLocalStorage => {
                json(services.storage.items(&caller.storage_scope()).await?)
            }

            RequestKind::GetAppletIframeScript => json(&*self.inner.shim_script),
        }
    }

    async fn iframe_config(&self, caller: &Caller) -> Result<IframeConfig> {
        let config = &self.inner.config;
        let installations = &self.inner.services.installations;

        match caller {
            Caller::Applet { applet_hash, .. } => {
                let credentials = installations.credentials(applet_hash).await?;
                let mut group_profiles = Vec::new();
                for group in installations.groups_for(applet_hash).await {
                    if let Some(profile) = installations.group_profile(&group).await {
                        group_profiles.push(profile);
                    }
                }
                Ok(IframeConfig::Applet(AppletFrameConfig {
                    app_port: config.app_port,
                    main_ui_origin: config.main_ui_origin.clone(),
                    applet_hash: *applet_hash,
                    credentials,
                    weave_protocol_version: config.weave_protocol_version.clone(),
                    host_version: config.host_version.clone(),
                    group_profiles,
                    zome_call_logging: config.zome_call_logging,
                }))
            }
            Caller::CrossGroup {
                tool_compatibility_id,
                ..
            } => {
                let instances = installations.applets_for_tool(tool_compatibility_id).await;
                if instances.is_empty() {
                    return Ok(IframeConfig::not_installed(tool_compatibility_id.clone()));
                }
                let mut applets = std::collections::BTreeMap::new();
                for applet in instances {
                    applets.insert(applet, installations.credentials(&applet).await?);
                }
                Ok(IframeConfig::CrossGroup(CrossGroupFrameConfig {
                    app_port: config.app_port,
                    main_ui_origin: config.main_ui_origin.clone(),
                    weave_protocol_version: config.weave_protocol_version.clone(),
                    host_version: config.host_version.clone(),
                    applets,
                    zome_call_logging: config.zome_call_logging,
                }))
            }
        }
    }

    /// Cached asset info, or ask the hosted applets and cache the answer.
    async fn global_asset_info(
        &self,
        wal: &Wal,
    ) -> Result<Option<framelink_protocol::AssetLocationAndInfo>> {
        let assets = &self.inner.services.assets;
        let key = stringify_wal(wal);
        if let Some(info) = assets.asset_info(&key).await? {
            return Ok(Some(info));
        }
        let found = self.inner.registry.resolve_asset_info(wal).await;
        if let Some(info) = &found {
            assets.cache_asset_info(&key, info.clone()).await?;
        }
        Ok(found)
    }

    /// Push the current content of an asset to everyone following it.
    async fn republish(&self, wal: &Wal) {
        let subscribers = self
            .inner
            .registry
            .subscriptions()
            .subscribers(&stringify_wal(wal))
            .await;
        if !subscribers.is_empty() {
            self.publish(wal, subscribers).await;
        }
    }

    async fn publish(&self, wal: &Wal, origins: Vec<String>) {
        let value = match self.inner.services.assets.content(wal).await {
            Ok(value) => AsyncStatus::Complete { value },
            Err(e) => AsyncStatus::Error {
                error: e.to_string(),
            },
        };
        let wal_stringified = stringify_wal(wal);
        for origin in origins {
            self.inner
                .registry
                .notify_origin(
                    &origin,
                    ParentToAppletMessage::AssetStoreUpdate {
                        wal_stringified: wal_stringified.clone(),
                        value: value.clone(),
                    },
                )
                .await;
        }
    }

    /// Forward a signal the runtime received to the applet's frames.
    pub async fn deliver_remote_signal(&self, applet: &AppletIdentity, payload: Vec<u8>) -> usize {
        self.inner
            .registry
            .remote_signal_received(applet, payload)
            .await
    }
}
