//! Everything a frame's runtime holds, owned in one place.

use std::future::Future;
use std::sync::Arc;

use framelink_protocol::{
    is_local_dev_origin, AssetStoreContent, AsyncStatus, Envelope, FrameKind, HostBus,
    IframeConfig, PeerStatusMap, RequestKind,
};
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::capabilities::Capabilities;
use crate::config::{FrameBootstrap, ShimConfig};
use crate::error::{Result, ShimError};
use crate::fallback::not_installed_html;
use crate::state::FrameState;
use crate::unload::{BeforeUnloadRegistry, UnloadId};

const EVENT_CAPACITY: usize = 64;

/// Something the host told the frame without asking for an answer.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    PeerStatus(PeerStatusMap),
    AssetStore {
        wal_stringified: String,
        value: AsyncStatus<AssetStoreContent>,
    },
    RemoteSignal(Vec<u8>),
    LocaleChanged(String),
}

/// The runtime state of one frame.
///
/// Created once when the frame loads and shared by reference with every
/// capability call and the inbound message loop.
pub struct FrameRuntimeContext {
    origin: String,
    kind: FrameKind,
    /// What envelopes name as their sender. Differs from `kind` only for
    /// development frames, which send their encoded payload.
    sender: FrameKind,
    bus: HostBus,
    state: watch::Sender<FrameState>,
    locale: watch::Sender<Option<String>>,
    events: broadcast::Sender<FrameEvent>,
    unload: BeforeUnloadRegistry,
}

impl FrameRuntimeContext {
    /// Derive the frame's kind from its origin and set up its runtime.
    ///
    /// Frames served from localhost take their kind from the development
    /// payload instead, when one is given.
    pub fn new(bootstrap: FrameBootstrap, config: &ShimConfig, bus: HostBus) -> Result<Self> {
        let (kind, sender) = match &bootstrap.dev_payload {
            Some(payload) if is_local_dev_origin(&bootstrap.origin) => {
                let sender = FrameKind::Dev {
                    payload: payload.clone(),
                };
                (sender.resolve_dev_payload()?, sender)
            }
            _ => {
                let schemes = config.schemes();
                let kind = FrameKind::from_origin(&bootstrap.origin, &schemes, bootstrap.sub_type)?;
                (kind.clone(), kind)
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            origin: bootstrap.origin,
            kind,
            sender,
            bus,
            state: watch::Sender::new(FrameState::Uninitialized),
            locale: watch::Sender::new(None),
            events,
            unload: BeforeUnloadRegistry::new(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn kind(&self) -> &FrameKind {
        &self.kind
    }

    pub fn state(&self) -> FrameState {
        self.state.borrow().clone()
    }

    /// Watch lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<FrameState> {
        self.state.subscribe()
    }

    /// Ask the host for this frame's config, exactly once.
    ///
    /// Leaves the frame `NotInstalled` or `Ready`. If the request itself
    /// fails the frame stays `AwaitingConfig` and no capability becomes
    /// available.
    pub async fn start(&self) -> Result<FrameState> {
        let started = self.state.send_if_modified(|state| {
            if *state == FrameState::Uninitialized {
                *state = FrameState::AwaitingConfig;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(ShimError::AlreadyStarted);
        }

        let config: IframeConfig = self.round_trip(RequestKind::GetIframeConfig).await?;
        let next = FrameState::from_config(config);
        match &next {
            FrameState::NotInstalled { applet_name } => {
                info!(origin = %self.origin, applet = %applet_name, "applet is not installed")
            }
            _ => debug!(origin = %self.origin, "frame ready"),
        }
        self.state.send_replace(next.clone());
        Ok(next)
    }

    /// The config the host sent, once ready.
    pub fn config(&self) -> Option<Arc<IframeConfig>> {
        match &*self.state.borrow() {
            FrameState::Ready { config } => Some(config.clone()),
            _ => None,
        }
    }

    /// The only origin host messages are accepted from.
    pub fn trusted_origin(&self) -> Option<String> {
        self.state.borrow().trusted_origin().map(str::to_string)
    }

    /// What to render instead of the applet when it is not installed.
    pub fn fallback_html(&self) -> Option<String> {
        match &*self.state.borrow() {
            FrameState::NotInstalled { applet_name } => Some(not_installed_html(applet_name)),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> Capabilities<'_> {
        Capabilities::new(self)
    }

    pub fn locale(&self) -> Option<String> {
        self.locale.borrow().clone()
    }

    pub fn watch_locale(&self) -> watch::Receiver<Option<String>> {
        self.locale.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<FrameEvent> {
        self.events.subscribe()
    }

    pub fn before_unload(&self) -> &BeforeUnloadRegistry {
        &self.unload
    }

    /// Register a callback to run when the host tears the frame down.
    pub async fn on_before_unload<F, Fut>(&self, callback: F) -> UnloadId
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.unload.register(callback).await
    }

    pub(crate) fn set_locale(&self, locale: String) {
        self.locale.send_replace(Some(locale.clone()));
        self.emit(FrameEvent::LocaleChanged(locale));
    }

    pub(crate) fn emit(&self, event: FrameEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Fail fast unless the frame is ready.
    pub(crate) fn ensure_ready(&self, request: &'static str) -> Result<()> {
        match &*self.state.borrow() {
            FrameState::Ready { .. } => Ok(()),
            FrameState::NotInstalled { applet_name } => Err(ShimError::NotInstalled {
                request,
                applet_name: applet_name.clone(),
            }),
            state => Err(ShimError::NotReady {
                request,
                state: state.name(),
            }),
        }
    }

    /// Make a capability call.
    pub(crate) async fn call<T: DeserializeOwned>(&self, request: RequestKind) -> Result<T> {
        self.ensure_ready(request.tag())?;
        self.round_trip(request).await
    }

    async fn round_trip<T: DeserializeOwned>(&self, request: RequestKind) -> Result<T> {
        let pending = self
            .bus
            .post(&self.origin, Envelope::new(request, self.sender.clone()))?;
        let value = pending.await?.into_result().map_err(ShimError::Host)?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelink_identity::AppletIdentity;
    use framelink_protocol::{host_bus, OriginSchemes, Reply, ViewSubType};

    fn applet_origin() -> (AppletIdentity, String) {
        let applet = AppletIdentity::from_core([1; 32]);
        let kind = FrameKind::Applet {
            applet_hash: applet,
            group_hash: None,
            sub_type: ViewSubType::Main,
        };
        (applet, kind.origin(&OriginSchemes::default()).unwrap())
    }

    #[test]
    fn kind_comes_from_origin() {
        let (applet, origin) = applet_origin();
        let (bus, _inbox) = host_bus();
        let context = FrameRuntimeContext::new(
            FrameBootstrap::new(origin).with_sub_type(ViewSubType::Block),
            &ShimConfig::default(),
            bus,
        )
        .unwrap();
        assert_eq!(context.kind().applet_hash(), Some(&applet));
        assert_eq!(context.kind().sub_type(), Some(ViewSubType::Block));
        assert_eq!(context.state(), FrameState::Uninitialized);
    }

    #[test]
    fn dev_payload_only_counts_on_localhost() {
        let (_, origin) = applet_origin();
        let inner = FrameKind::CrossGroup {
            tool_compatibility_id: "tool".into(),
            sub_type: ViewSubType::Main,
        };
        let FrameKind::Dev { payload } = FrameKind::dev(&inner).unwrap() else {
            unreachable!()
        };

        let (bus, _inbox) = host_bus();
        let dev = FrameRuntimeContext::new(
            FrameBootstrap::new("http://localhost:8888").with_dev_payload(payload.clone()),
            &ShimConfig::default(),
            bus.clone(),
        )
        .unwrap();
        assert_eq!(dev.kind(), &inner);

        let served = FrameRuntimeContext::new(
            FrameBootstrap::new(origin).with_dev_payload(payload),
            &ShimConfig::default(),
            bus.clone(),
        )
        .unwrap();
        assert!(served.kind().applet_hash().is_some());

        assert!(FrameRuntimeContext::new(
            FrameBootstrap::new("http://localhost:8888"),
            &ShimConfig::default(),
            bus,
        )
        .is_err());
    }

    #[tokio::test]
    async fn calls_fail_fast_before_config() {
        let (_, origin) = applet_origin();
        let (bus, mut inbox) = host_bus();
        let context =
            FrameRuntimeContext::new(FrameBootstrap::new(origin), &ShimConfig::default(), bus)
                .unwrap();

        let err = context.capabilities().search("foo").await.unwrap_err();
        assert!(matches!(
            err,
            ShimError::NotReady {
                request: "search",
                state: "uninitialized"
            }
        ));
        assert!(inbox.try_recv().is_none());
    }

    #[tokio::test]
    async fn start_only_once() {
        let (_, origin) = applet_origin();
        let (bus, mut inbox) = host_bus();
        let context = Arc::new(
            FrameRuntimeContext::new(FrameBootstrap::new(origin), &ShimConfig::default(), bus)
                .unwrap(),
        );

        let starting = tokio::spawn({
            let context = context.clone();
            async move { context.start().await }
        });
        let request = inbox.recv().await.unwrap();
        assert_eq!(request.envelope.request, RequestKind::GetIframeConfig);
        assert_eq!(context.state(), FrameState::AwaitingConfig);

        // Capability calls while waiting never reach the host.
        assert!(context.capabilities().toggle_pocket().await.is_err());
        assert!(inbox.try_recv().is_none());
        assert!(matches!(context.start().await, Err(ShimError::AlreadyStarted)));

        request
            .port
            .send(Reply::success(&IframeConfig::not_installed("Kanban")))
            .unwrap();
        let state = starting.await.unwrap().unwrap();
        assert_eq!(state.name(), "not-installed");
        assert!(context.fallback_html().unwrap().contains("Kanban"));
        assert!(matches!(
            context.capabilities().toggle_pocket().await,
            Err(ShimError::NotInstalled { .. })
        ));
    }
}
