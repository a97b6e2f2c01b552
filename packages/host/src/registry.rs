//! The frames the host currently hosts.
//!
//! The registry is how the host reaches frames: broadcasts (locale, peer
//! status, asset store updates), fan-out requests (search, asset info)
//! and the before-unload handshake.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use framelink_identity::AppletIdentity;
use framelink_protocol::{
    AssetInfo, AssetLocationAndInfo, BlockType, FrameKind, FrameSender, ParentToAppletMessage,
    PeerStatusMap, PendingReply, Reply, TransportError, Wal,
};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::subscriptions::AssetSubscriptions;

/// Unique identifier for a hosted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(Uuid);

impl FrameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct HostedFrame {
    origin: String,
    kind: FrameKind,
    sender: FrameSender,
}

/// Live frames and the channels to reach them.
#[derive(Clone)]
pub struct FrameRegistry {
    /// Origin stamped on every host-to-frame message.
    main_ui_origin: Arc<str>,
    frames: Arc<Mutex<BTreeMap<FrameId, HostedFrame>>>,
    /// Asset store subscriptions, held while a frame of the origin lives.
    subscriptions: Arc<AssetSubscriptions>,
}

/// Drop frames whose receiving end is gone. Returns the origins no frame
/// is served from anymore.
fn prune_closed(frames: &mut BTreeMap<FrameId, HostedFrame>) -> BTreeSet<String> {
    let mut gone = BTreeSet::new();
    frames.retain(|id, frame| {
        let alive = !frame.sender.is_closed();
        if !alive {
            debug!(frame = %id, "pruning closed frame");
            gone.insert(frame.origin.clone());
        }
        alive
    });
    gone.retain(|origin| !frames.values().any(|frame| &frame.origin == origin));
    gone
}

impl FrameRegistry {
    pub fn new(main_ui_origin: impl Into<Arc<str>>) -> Self {
        Self {
            main_ui_origin: main_ui_origin.into(),
            frames: Arc::new(Mutex::new(BTreeMap::new())),
            subscriptions: Arc::new(AssetSubscriptions::new()),
        }
    }

    pub fn subscriptions(&self) -> &AssetSubscriptions {
        &self.subscriptions
    }

    async fn forget_origins(&self, origins: BTreeSet<String>) {
        for origin in origins {
            let dropped = self.subscriptions.forget_origin(&origin).await;
            if dropped > 0 {
                debug!(origin = %origin, dropped, "dropped asset store subscriptions");
            }
        }
    }

    pub fn main_ui_origin(&self) -> &str {
        &self.main_ui_origin
    }

    /// Start hosting a frame served from `origin`.
    pub async fn register(&self, origin: &str, kind: FrameKind, sender: FrameSender) -> FrameId {
        let id = FrameId::new();
        info!(frame = %id, origin, "frame registered");
        self.frames.lock().await.insert(
            id,
            HostedFrame {
                origin: origin.to_string(),
                kind,
                sender,
            },
        );
        id
    }

    pub async fn unregister(&self, id: FrameId) -> bool {
        let orphaned = {
            let mut frames = self.frames.lock().await;
            let Some(frame) = frames.remove(&id) else {
                return false;
            };
            info!(frame = %id, "frame unregistered");
            let shared = frames.values().any(|other| other.origin == frame.origin);
            if shared {
                BTreeSet::new()
            } else {
                BTreeSet::from([frame.origin])
            }
        };
        self.forget_origins(orphaned).await;
        true
    }

    pub async fn len(&self) -> usize {
        self.frames.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.frames.lock().await.is_empty()
    }

    pub async fn kind(&self, id: FrameId) -> Option<FrameKind> {
        self.frames.lock().await.get(&id).map(|f| f.kind.clone())
    }

    /// Senders of the frames matching `filter`. Frames whose receiving end
    /// is gone are pruned on the way.
    async fn senders<F>(&self, filter: F) -> Vec<(String, FrameSender)>
    where
        F: Fn(&HostedFrame) -> bool,
    {
        let (targets, orphaned) = {
            let mut frames = self.frames.lock().await;
            let orphaned = prune_closed(&mut frames);
            let targets = frames
                .values()
                .filter(|frame| filter(frame))
                .map(|frame| (frame.origin.clone(), frame.sender.clone()))
                .collect();
            (targets, orphaned)
        };
        self.forget_origins(orphaned).await;
        targets
    }

    /// One sender per applet, for requests any of its frames can answer.
    async fn one_per_applet(&self) -> Vec<(AppletIdentity, FrameSender)> {
        let mut seen = BTreeSet::new();
        let (targets, orphaned) = {
            let mut frames = self.frames.lock().await;
            let orphaned = prune_closed(&mut frames);
            let targets = frames
                .values()
                .filter_map(|frame| match &frame.kind {
                    FrameKind::Applet { applet_hash, .. } if seen.insert(*applet_hash) => {
                        Some((*applet_hash, frame.sender.clone()))
                    }
                    _ => None,
                })
                .collect();
            (targets, orphaned)
        };
        self.forget_origins(orphaned).await;
        targets
    }

    fn deliver(
        &self,
        targets: Vec<(String, FrameSender)>,
        message: ParentToAppletMessage,
    ) -> usize {
        targets
            .iter()
            .filter(
                |(origin, sender)| match sender.notify(&self.main_ui_origin, message.clone()) {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(origin = %origin, "dropping {}: {e}", message.tag());
                        false
                    }
                },
            )
            .count()
    }

    /// Send a message to every hosted frame. Returns how many got it.
    pub async fn broadcast(&self, message: ParentToAppletMessage) -> usize {
        let targets = self.senders(|_| true).await;
        self.deliver(targets, message)
    }

    /// Send a message to every frame served from `origin`.
    pub async fn notify_origin(&self, origin: &str, message: ParentToAppletMessage) -> usize {
        let targets = self.senders(|frame| frame.origin == origin).await;
        self.deliver(targets, message)
    }

    /// Send a message to every frame of one applet.
    pub async fn notify_applet(
        &self,
        applet: &AppletIdentity,
        message: ParentToAppletMessage,
    ) -> usize {
        let targets = self
            .senders(|frame| frame.kind.applet_hash() == Some(applet))
            .await;
        self.deliver(targets, message)
    }

    pub async fn set_locale(&self, locale: &str) -> usize {
        self.broadcast(ParentToAppletMessage::LocaleChange {
            locale: locale.to_string(),
        })
        .await
    }

    pub async fn peer_status_update(
        &self,
        applet: &AppletIdentity,
        payload: PeerStatusMap,
    ) -> usize {
        self.notify_applet(applet, ParentToAppletMessage::PeerStatusUpdate { payload })
            .await
    }

    pub async fn remote_signal_received(
        &self,
        applet: &AppletIdentity,
        payload: Vec<u8>,
    ) -> usize {
        self.notify_applet(applet, ParentToAppletMessage::RemoteSignalReceived { payload })
            .await
    }

    /// Ask every hosted applet to search and concatenate what they find.
    /// Applets that fail or go away are left out.
    pub async fn search(&self, filter: &str) -> Vec<Wal> {
        let mut tasks = JoinSet::new();
        for (applet, sender) in self.one_per_applet().await {
            let pending = sender.request(
                &self.main_ui_origin,
                ParentToAppletMessage::Search {
                    filter: filter.to_string(),
                },
            );
            tasks.spawn(async move { (applet, answer::<Vec<Wal>>(pending).await) });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(mut wals))) => results.append(&mut wals),
                Ok((applet, Err(e))) => debug!(%applet, "search failed: {e}"),
                Err(e) => warn!("search task failed: {e}"),
            }
        }
        results
    }

    /// Find which hosted applet can describe an asset.
    pub async fn resolve_asset_info(&self, wal: &Wal) -> Option<AssetLocationAndInfo> {
        let mut tasks = JoinSet::new();
        for (applet, sender) in self.one_per_applet().await {
            let pending = sender.request(
                &self.main_ui_origin,
                ParentToAppletMessage::GetAppletAssetInfo {
                    wal: wal.clone(),
                    record_info: None,
                },
            );
            tasks.spawn(async move { (applet, answer::<Option<AssetInfo>>(pending).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Ok((applet_hash, Ok(Some(asset_info)))) = joined {
                tasks.abort_all();
                return Some(AssetLocationAndInfo {
                    applet_hash,
                    asset_info,
                });
            }
        }
        None
    }

    /// The block types an applet offers, asked of any of its frames.
    pub async fn block_types(
        &self,
        applet: &AppletIdentity,
    ) -> Result<BTreeMap<String, BlockType>, TransportError> {
        let sender = self
            .senders(|frame| frame.kind.applet_hash() == Some(applet))
            .await
            .into_iter()
            .next()
            .map(|(_, sender)| sender)
            .ok_or(TransportError::Disconnected("frame"))?;
        let pending = sender.request(&self.main_ui_origin, ParentToAppletMessage::GetBlockTypes);
        answer(pending).await.map_err(|_| TransportError::Closed)
    }

    /// Run the frame's before-unload callbacks.
    ///
    /// Resolves once the frame acknowledges with `1`, which it sends after
    /// every callback has finished. There is no timeout; the UI decides how
    /// long to wait and may drop the future to force a reload.
    pub async fn request_teardown(&self, id: FrameId) -> Result<bool, TransportError> {
        let sender = self
            .frames
            .lock()
            .await
            .get(&id)
            .map(|frame| frame.sender.clone())
            .ok_or(TransportError::Disconnected("frame"))?;
        let reply = sender
            .request(&self.main_ui_origin, ParentToAppletMessage::OnBeforeUnload)?
            .await?;
        Ok(matches!(reply, Reply::Success { result } if result == 1))
    }
}

/// Await a frame's reply and decode its result.
async fn answer<T: DeserializeOwned>(
    pending: Result<PendingReply, TransportError>,
) -> Result<T, String> {
    let reply = pending.map_err(|e| e.to_string())?.await.map_err(|e| e.to_string())?;
    let value = reply.into_result()?;
    serde_json::from_value(value).map_err(|e| e.to_string())
}
