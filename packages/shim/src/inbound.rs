//! Messages from the host to the frame.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use framelink_protocol::{
    AssetInfo, BlockType, FrameInbound, FrameInbox, ParentToAppletMessage, RecordInfo, Reply,
    Wal,
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::context::{FrameEvent, FrameRuntimeContext};
use crate::error::ShimError;

/// What applet code answers when the host asks.
///
/// Every method has a default for applets that do not take part.
#[async_trait]
pub trait AppletServices: Send + Sync {
    async fn search(&self, _filter: &str) -> Result<Vec<Wal>, ShimError> {
        Ok(Vec::new())
    }

    async fn block_types(&self) -> Result<BTreeMap<String, BlockType>, ShimError> {
        Ok(BTreeMap::new())
    }

    async fn asset_info(
        &self,
        _wal: &Wal,
        _record_info: Option<RecordInfo>,
    ) -> Result<Option<AssetInfo>, ShimError> {
        Ok(None)
    }
}

/// Services of an applet that answers nothing.
pub struct NoServices;

#[async_trait]
impl AppletServices for NoServices {}

fn reply_from<T: serde::Serialize>(result: Result<T, ShimError>) -> Reply {
    match result {
        Ok(value) => Reply::success(&value),
        Err(e) => Reply::error(e.to_string()),
    }
}

/// Handle host messages until the host stops sending.
///
/// Broadcasts are applied in the order they arrive, so the last locale the
/// host sent is the one the frame ends on. Requests that expect an answer
/// run on their own task and may finish in any order.
pub fn serve_inbound(
    context: Arc<FrameRuntimeContext>,
    services: Arc<dyn AppletServices>,
    mut inbox: FrameInbox,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(inbound) = inbox.recv().await {
            if inbound.port.is_none() {
                handle_inbound(&context, services.as_ref(), inbound).await;
                continue;
            }
            let context = context.clone();
            let services = services.clone();
            tokio::spawn(async move {
                handle_inbound(&context, services.as_ref(), inbound).await
            });
        }
        debug!("frame inbox closed");
    })
}

/// Handle one host message.
///
/// Once the frame knows its trusted origin, messages from anywhere else are
/// dropped and a dropped request's port is closed without a reply. Before
/// that, only `on-before-unload` is answered: the host may tear down a frame
/// that never became ready and still waits for its ack.
pub async fn handle_inbound(
    context: &FrameRuntimeContext,
    services: &dyn AppletServices,
    inbound: FrameInbound,
) {
    let FrameInbound {
        origin,
        message,
        port,
    } = inbound;

    match context.trusted_origin() {
        Some(trusted) if trusted == origin => {}
        Some(trusted) => {
            warn!(
                origin = %origin,
                trusted = %trusted,
                "dropping {} from untrusted origin",
                message.tag()
            );
            return;
        }
        None if message == ParentToAppletMessage::OnBeforeUnload => {}
        None => {
            debug!(
                origin = %origin,
                state = %context.state(),
                "dropping {} before the frame is ready",
                message.tag()
            );
            return;
        }
    }

    let reply = match message {
        ParentToAppletMessage::Search { filter } => reply_from(services.search(&filter).await),
        ParentToAppletMessage::GetBlockTypes => reply_from(services.block_types().await),
        ParentToAppletMessage::GetAppletAssetInfo { wal, record_info } => {
            reply_from(services.asset_info(&wal, record_info).await)
        }
        ParentToAppletMessage::OnBeforeUnload => {
            let ran = context.before_unload().run_all().await;
            debug!(callbacks = ran, "before-unload callbacks done");
            Reply::success(&1)
        }
        ParentToAppletMessage::PeerStatusUpdate { payload } => {
            context.emit(FrameEvent::PeerStatus(payload));
            Reply::ok()
        }
        ParentToAppletMessage::LocaleChange { locale } => {
            context.set_locale(locale);
            Reply::ok()
        }
        ParentToAppletMessage::AssetStoreUpdate {
            wal_stringified,
            value,
        } => {
            context.emit(FrameEvent::AssetStore {
                wal_stringified,
                value,
            });
            Reply::ok()
        }
        ParentToAppletMessage::RemoteSignalReceived { payload } => {
            context.emit(FrameEvent::RemoteSignal(payload));
            Reply::ok()
        }
    };

    if let Some(port) = port {
        if port.send(reply).is_err() {
            debug!("host stopped waiting for the frame's answer");
        }
    }
}
