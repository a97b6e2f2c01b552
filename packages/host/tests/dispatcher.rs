use std::collections::BTreeMap;

use framelink_host::memory::{InstalledApplet, MemoryServices, UiEvent};
use framelink_host::{data_to_sign, verify_signature, Dispatcher, HostConfig};
use framelink_identity::{AgentKey, AppletIdentity, DnaHash, HashKind, RawHash};
use framelink_protocol::{
    host_bus, stringify_wal, AppletCredentials, AppletInfo, AssetSource, AsyncStatus, CellId,
    CreatableResult, CreatableType, Envelope, FrameKind, FrameNotification, GroupProfile, Hrl,
    IframeConfig, OpenViewRequest, ParentToAppletMessage, ProfilesLocation, Reply, RequestKind,
    SignedCall, UnsignedCall, Urgency, ViewSubType, Wal, ZomeCallLogInfo,
};
use serde_json::{json, Value};

const SHIM: &str = "window.__framelink = true;";

fn applet_id(byte: u8) -> AppletIdentity {
    AppletIdentity::from_core([byte; 32])
}

fn group_id(byte: u8) -> DnaHash {
    DnaHash::from_core([byte; 32])
}

fn wal(byte: u8) -> Wal {
    Wal::new(Hrl(group_id(byte), RawHash::from_core(HashKind::Action, [byte; 32])))
}

fn installed(applet_hash: AppletIdentity, tool: &str, group: DnaHash) -> InstalledApplet {
    InstalledApplet {
        applet_hash,
        tool_compatibility_id: tool.to_string(),
        info: AppletInfo {
            applet_bundle_id: "bundle-notes".into(),
            applet_name: "Notes".into(),
            applet_icon: None,
            group_hashes: vec![group],
        },
        credentials: AppletCredentials {
            authentication_token: vec![7, 7, 7],
            profiles_location: ProfilesLocation {
                authentication_token: vec![8],
                profiles_role_name: "profiles".into(),
            },
        },
        participants: vec![AgentKey::from_core([9; 32])],
        asset_dir: None,
    }
}

fn applet_kind(applet_hash: AppletIdentity) -> FrameKind {
    FrameKind::Applet {
        applet_hash,
        group_hash: None,
        sub_type: ViewSubType::Main,
    }
}

struct Host {
    config: HostConfig,
    services: MemoryServices,
    dispatcher: Dispatcher,
}

impl Host {
    fn with_config(config: HostConfig) -> Self {
        let services = MemoryServices::new();
        let dispatcher = Dispatcher::new(config.clone(), services.collaborators(), SHIM);
        Self {
            config,
            services,
            dispatcher,
        }
    }

    fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    async fn with_applet(applet: AppletIdentity) -> Self {
        let host = Self::new();
        host.services
            .installations
            .install(installed(applet, "tool-notes", group_id(2)))
            .await;
        host.services
            .installations
            .add_group(
                group_id(2),
                GroupProfile {
                    name: "Friends".into(),
                    icon_src: "data:,".into(),
                },
            )
            .await;
        host
    }

    fn origin(&self, kind: &FrameKind) -> String {
        kind.origin(&self.config.schemes()).unwrap()
    }

    async fn ask(&self, kind: &FrameKind, request: RequestKind) -> Reply {
        let origin = self.origin(kind);
        self.ask_from(&origin, kind.clone(), request).await
    }

    async fn ask_from(&self, origin: &str, sender: FrameKind, request: RequestKind) -> Reply {
        let (bus, inbox) = host_bus();
        let serving = self.dispatcher.clone().serve(inbox);
        let reply = bus
            .post(origin, Envelope::new(request, sender))
            .unwrap()
            .await
            .unwrap();
        drop(bus);
        serving.await.unwrap();
        reply
    }
}

fn ok(reply: Reply) -> Value {
    match reply {
        Reply::Success { result } => result,
        Reply::Error { error } => panic!("expected success, got error: {error}"),
    }
}

fn err(reply: Reply) -> String {
    match reply {
        Reply::Error { error } => error,
        Reply::Success { result } => panic!("expected error, got {result}"),
    }
}

fn notification(timestamp: i64) -> FrameNotification {
    FrameNotification {
        title: "Mentioned".into(),
        body: "in #general".into(),
        notification_type: "mention".into(),
        icon_src: None,
        urgency: Urgency::High,
        timestamp,
        about_wal: None,
        from_agent: None,
    }
}

fn every_request(applet: AppletIdentity) -> Vec<RequestKind> {
    let agent = AgentKey::from_core([3; 32]);
    vec![
        RequestKind::GetIframeConfig,
        RequestKind::SignZomeCall {
            request: UnsignedCall {
                cell_id: CellId {
                    dna_hash: group_id(2),
                    agent_key: agent,
                },
                zome_name: "notes".into(),
                fn_name: "create".into(),
                payload: vec![],
                cap_secret: None,
                provenance: agent,
                nonce: vec![0; 32],
                expires_at: 0,
            },
        },
        RequestKind::LogZomeCall {
            info: ZomeCallLogInfo {
                fn_name: "create".into(),
                zome_name: "notes".into(),
                cell_id: CellId {
                    dna_hash: group_id(2),
                    agent_key: agent,
                },
                start_time: 1_700_000_000_000,
                duration_ms: 3.5,
            },
        },
        RequestKind::OpenView {
            request: OpenViewRequest::AppletMain {
                applet_hash: applet,
            },
        },
        RequestKind::Search {
            filter: "foo".into(),
        },
        RequestKind::NotifyFrame {
            notifications: vec![notification(1_700_000_000_000)],
        },
        RequestKind::GetAppletInfo {
            applet_hash: applet,
        },
        RequestKind::GetGroupProfile {
            group_hash: group_id(2),
        },
        RequestKind::AppletParticipants,
        RequestKind::UserSelectScreen,
        RequestKind::UserSelectAsset { from: None },
        RequestKind::TogglePocket,
        RequestKind::AssetToPocket { wal: wal(1) },
        RequestKind::GetGlobalAssetInfo { wal: wal(1) },
        RequestKind::AddTagsToAsset {
            wal: wal(1),
            tags: vec!["a".into()],
        },
        RequestKind::RemoveTagsFromAsset {
            wal: wal(1),
            tags: vec!["a".into()],
        },
        RequestKind::AddAssetRelation {
            src_wal: wal(1),
            dst_wal: wal(2),
            tags: vec![],
        },
        RequestKind::RemoveAssetRelation {
            relation_hash: RawHash::from_core(HashKind::Action, [0; 32]),
        },
        RequestKind::SubscribeToAssetStore { wal: wal(1) },
        RequestKind::UnsubscribeFromAssetStore { wal: wal(1) },
        RequestKind::UpdateCreatableTypes {
            value: BTreeMap::new(),
        },
        RequestKind::CreatableResult {
            dialog_id: "d1".into(),
            result: CreatableResult::Cancel,
        },
        RequestKind::RequestClose,
        RequestKind::SendRemoteSignal {
            payload: vec![1],
            to_agents: None,
        },
        RequestKind::LocalStorageSetItem {
            key: "k".into(),
            value: "v".into(),
        },
        RequestKind::LocalStorageRemoveItem { key: "k".into() },
        RequestKind::LocalStorageClear,
        RequestKind::GetLocalStorage,
        RequestKind::GetAppletIframeScript,
    ]
}

#[tokio::test]
async fn every_request_kind_gets_exactly_one_reply() {
    let applet = applet_id(1);
    let host = Host::with_applet(applet).await;
    let kind = applet_kind(applet);
    let origin = host.origin(&kind);

    let (bus, inbox) = host_bus();
    let serving = host.dispatcher.clone().serve(inbox);

    let requests = every_request(applet);
    assert_eq!(requests.len(), 29);
    let mut pending = Vec::new();
    for request in requests {
        let tag = request.tag();
        pending.push((tag, bus.post(&origin, Envelope::new(request, kind.clone())).unwrap()));
    }
    for (tag, reply) in pending {
        let reply = reply.await;
        assert!(reply.is_ok(), "{tag} was never answered");
    }

    drop(bus);
    serving.await.unwrap();
}

#[tokio::test]
async fn unknown_applet_gets_not_installed_config() {
    let host = Host::new();
    let applet = applet_id(5);
    host.services.installations.know(applet, "Kanban").await;

    for request in [RequestKind::GetIframeConfig, RequestKind::TogglePocket] {
        let result = ok(host.ask(&applet_kind(applet), request).await);
        let config: IframeConfig = serde_json::from_value(result).unwrap();
        assert_eq!(config, IframeConfig::not_installed("Kanban"));
    }
    assert!(host.services.ui.events().await.is_empty());

    let stranger = applet_id(6);
    let result = ok(host.ask(&applet_kind(stranger), RequestKind::GetIframeConfig).await);
    assert_eq!(result["type"], "not-installed");
    assert_eq!(result["applet_name"], stranger.to_b64());
}

#[tokio::test]
async fn installed_applet_config() {
    let applet = applet_id(1);
    let host = Host::with_applet(applet).await;

    let result = ok(host.ask(&applet_kind(applet), RequestKind::GetIframeConfig).await);
    let IframeConfig::Applet(config) = serde_json::from_value(result).unwrap() else {
        panic!("expected an applet config");
    };
    assert_eq!(config.applet_hash, applet);
    assert_eq!(config.main_ui_origin, host.config.main_ui_origin);
    assert_eq!(config.credentials.authentication_token, vec![7, 7, 7]);
    assert_eq!(config.group_profiles.len(), 1);
    assert_eq!(config.group_profiles[0].name, "Friends");
}

#[tokio::test]
async fn cross_group_config() {
    let host = Host::new();
    let kind = FrameKind::CrossGroup {
        tool_compatibility_id: "tool-notes".into(),
        sub_type: ViewSubType::Main,
    };

    let result = ok(host.ask(&kind, RequestKind::GetIframeConfig).await);
    assert_eq!(result["type"], "not-installed");

    for byte in [1, 2] {
        host.services
            .installations
            .install(installed(applet_id(byte), "tool-notes", group_id(byte)))
            .await;
    }
    let result = ok(host.ask(&kind, RequestKind::GetIframeConfig).await);
    let IframeConfig::CrossGroup(config) = serde_json::from_value(result).unwrap() else {
        panic!("expected a cross-group config");
    };
    assert_eq!(config.applets.len(), 2);
}

#[tokio::test]
async fn identity_comes_from_the_origin_not_the_payload() {
    let honest = applet_id(1);
    let host = Host::with_applet(honest).await;
    let impostor = applet_id(9);

    // The frame served from the honest applet's origin claims to be another
    // applet. Only the sub-type of the claim is used.
    let claimed = FrameKind::Applet {
        applet_hash: impostor,
        group_hash: None,
        sub_type: ViewSubType::Block,
    };
    let origin = host.origin(&applet_kind(honest));
    ok(host.ask_from(&origin, claimed, RequestKind::RequestClose).await);

    match &host.services.ui.events().await[..] {
        [UiEvent::RequestClose(caller)] => {
            assert_eq!(caller.applet("test").unwrap(), &honest);
            assert_eq!(caller.sub_type(), ViewSubType::Block);
        }
        other => panic!("unexpected events {other:?}"),
    }
}

#[tokio::test]
async fn untrusted_origins_get_error_replies() {
    let applet = applet_id(1);
    let host = Host::with_applet(applet).await;

    for origin in ["https://evil.example", "applet://not-a-hash", "nonsense"] {
        let error = err(
            host.ask_from(origin, applet_kind(applet), RequestKind::TogglePocket)
                .await,
        );
        assert!(error.contains("untrusted origin"), "{origin}: {error}");
    }
    assert!(host.services.ui.events().await.is_empty());
}

#[tokio::test]
async fn localhost_frames_need_dev_mode() {
    let applet = applet_id(1);
    let host = Host::with_applet(applet).await;
    let claimed = FrameKind::dev(&applet_kind(applet)).unwrap();

    let error = err(
        host.ask_from("http://localhost:8080", claimed, RequestKind::TogglePocket)
            .await,
    );
    assert!(error.contains("development frames are not trusted"));
}

#[cfg(feature = "dev-mode")]
#[tokio::test]
async fn dev_mode_trusts_reported_identity() {
    let applet = applet_id(1);
    let host = Host::with_config(HostConfig {
        dev_mode: true,
        ..HostConfig::default()
    });
    host.services
        .installations
        .install(installed(applet, "tool-notes", group_id(2)))
        .await;
    let claimed = FrameKind::dev(&applet_kind(applet)).unwrap();

    let result = ok(host
        .ask_from("http://127.0.0.1:5173", claimed, RequestKind::GetIframeConfig)
        .await);
    assert_eq!(result["type"], "applet");
    assert_eq!(result["applet_hash"], applet.to_b64());
}

#[tokio::test]
async fn signing_respects_grants() {
    let applet = applet_id(1);
    let host = Host::with_applet(applet).await;
    let kind = applet_kind(applet);
    let keystore = &host.services.runtime.keystore;
    let agent = keystore.add_agent([42; 32]).await;

    let call = UnsignedCall {
        cell_id: CellId {
            dna_hash: group_id(2),
            agent_key: agent,
        },
        zome_name: "notes".into(),
        fn_name: "create_note".into(),
        payload: vec![1, 2, 3],
        cap_secret: None,
        provenance: agent,
        nonce: vec![5; 32],
        expires_at: 1_700_000_000_000_000,
    };

    let error = err(
        host.ask(&kind, RequestKind::SignZomeCall { request: call.clone() })
            .await,
    );
    assert!(error.contains("signing refused"));

    keystore.grant(&agent, "notes", "create_note").await;
    let result = ok(host
        .ask(&kind, RequestKind::SignZomeCall { request: call.clone() })
        .await);
    let signed: SignedCall = serde_json::from_value(result).unwrap();
    assert_eq!(signed.call, call);
    let data = data_to_sign(&call).unwrap();
    assert!(verify_signature(&agent, &data, &signed.signature));

    let other_function = UnsignedCall {
        fn_name: "delete_note".into(),
        ..call.clone()
    };
    assert!(host
        .ask(&kind, RequestKind::SignZomeCall { request: other_function })
        .await
        .is_error());

    let short_nonce = UnsignedCall {
        nonce: vec![5; 8],
        ..call
    };
    let error = err(
        host.ask(&kind, RequestKind::SignZomeCall { request: short_nonce })
            .await,
    );
    assert!(error.contains("nonce"));
}

#[tokio::test]
async fn notifications_are_validated_and_stored() {
    let applet = applet_id(1);
    let host = Host::with_applet(applet).await;
    let kind = applet_kind(applet);

    let error = err(
        host.ask(
            &kind,
            RequestKind::NotifyFrame {
                notifications: vec![notification(1_700_000_000)],
            },
        )
        .await,
    );
    assert!(error.contains("millisecond"));
    assert!(host.services.notifications.for_applet(&applet).await.is_empty());

    ok(host
        .ask(
            &kind,
            RequestKind::NotifyFrame {
                notifications: vec![notification(1_700_000_000_000)],
            },
        )
        .await);
    assert_eq!(host.services.notifications.for_applet(&applet).await.len(), 1);
}

#[tokio::test]
async fn applet_only_requests_reject_cross_group_frames() {
    let host = Host::new();
    host.services
        .installations
        .install(installed(applet_id(1), "tool-notes", group_id(2)))
        .await;
    let kind = FrameKind::CrossGroup {
        tool_compatibility_id: "tool-notes".into(),
        sub_type: ViewSubType::Main,
    };

    let error = err(host.ask(&kind, RequestKind::AppletParticipants).await);
    assert!(error.contains("applet-participants"));
}

#[tokio::test]
async fn asset_store_subscribers_get_updates() {
    let applet = applet_id(1);
    let host = Host::with_applet(applet).await;
    let kind = applet_kind(applet);
    let origin = host.origin(&kind);
    let (_frame, mut inbox) = host.dispatcher.attach_frame(&origin, kind.clone()).await;
    let target = wal(4);

    ok(host
        .ask(&kind, RequestKind::SubscribeToAssetStore { wal: target.clone() })
        .await);
    let initial = inbox.try_recv().expect("initial content");
    assert!(initial.port.is_none());
    match initial.message {
        ParentToAppletMessage::AssetStoreUpdate {
            wal_stringified,
            value: AsyncStatus::Complete { value },
        } => {
            assert_eq!(wal_stringified, stringify_wal(&target));
            assert!(value.tags.is_empty());
        }
        other => panic!("unexpected {other:?}"),
    }

    ok(host
        .ask(
            &kind,
            RequestKind::AddTagsToAsset {
                wal: target.clone(),
                tags: vec!["urgent".into()],
            },
        )
        .await);
    match inbox.try_recv().expect("update").message {
        ParentToAppletMessage::AssetStoreUpdate {
            value: AsyncStatus::Complete { value },
            ..
        } => assert_eq!(value.tags, vec!["urgent".to_string()]),
        other => panic!("unexpected {other:?}"),
    }

    ok(host
        .ask(&kind, RequestKind::UnsubscribeFromAssetStore { wal: target.clone() })
        .await);
    ok(host
        .ask(
            &kind,
            RequestKind::RemoveTagsFromAsset {
                wal: target,
                tags: vec!["urgent".into()],
            },
        )
        .await);
    assert!(inbox.try_recv().is_none());
}

#[tokio::test]
async fn relations_notify_both_ends() {
    let applet = applet_id(1);
    let host = Host::with_applet(applet).await;
    let kind = applet_kind(applet);
    let origin = host.origin(&kind);
    let (_frame, mut inbox) = host.dispatcher.attach_frame(&origin, kind.clone()).await;

    for target in [wal(1), wal(2)] {
        ok(host
            .ask(&kind, RequestKind::SubscribeToAssetStore { wal: target })
            .await);
    }
    while inbox.try_recv().is_some() {}

    let result = ok(host
        .ask(
            &kind,
            RequestKind::AddAssetRelation {
                src_wal: wal(1),
                dst_wal: wal(2),
                tags: vec!["depends-on".into()],
            },
        )
        .await);
    let relation_hash: RawHash = serde_json::from_value(result).unwrap();
    assert_eq!(relation_hash.kind(), Some(HashKind::Action));

    let mut updated = Vec::new();
    while let Some(inbound) = inbox.try_recv() {
        if let ParentToAppletMessage::AssetStoreUpdate { wal_stringified, .. } = inbound.message {
            updated.push(wal_stringified);
        }
    }
    assert_eq!(updated, vec![stringify_wal(&wal(1)), stringify_wal(&wal(2))]);

    ok(host
        .ask(&kind, RequestKind::RemoveAssetRelation { relation_hash })
        .await);
    assert!(inbox.try_recv().is_some());
}

#[tokio::test]
async fn search_fans_out_to_hosted_applets() {
    let searcher = applet_id(1);
    let host = Host::with_applet(searcher).await;
    let answering = applet_id(2);
    host.services
        .installations
        .install(installed(answering, "tool-tasks", group_id(2)))
        .await;

    let answering_kind = applet_kind(answering);
    let origin = host.origin(&answering_kind);
    let (_frame, mut inbox) = host.dispatcher.attach_frame(&origin, answering_kind).await;
    let main_ui_origin = host.config.main_ui_origin.clone();
    tokio::spawn(async move {
        while let Some(inbound) = inbox.recv().await {
            assert_eq!(inbound.origin, main_ui_origin);
            if let (ParentToAppletMessage::Search { filter }, Some(port)) =
                (inbound.message, inbound.port)
            {
                let found = if filter == "foo" { vec![wal(8)] } else { vec![] };
                port.send(Reply::success(&found)).unwrap();
            }
        }
    });

    let result = ok(host
        .ask(&applet_kind(searcher), RequestKind::Search { filter: "foo".into() })
        .await);
    let found: Vec<Wal> = serde_json::from_value(result).unwrap();
    assert_eq!(found, vec![wal(8)]);
}

#[tokio::test]
async fn local_storage_is_scoped_per_applet() {
    let first = applet_id(1);
    let host = Host::with_applet(first).await;
    let second = applet_id(2);
    host.services
        .installations
        .install(installed(second, "tool-tasks", group_id(2)))
        .await;

    ok(host
        .ask(
            &applet_kind(first),
            RequestKind::LocalStorageSetItem {
                key: "theme".into(),
                value: "dark".into(),
            },
        )
        .await);

    let mine = ok(host.ask(&applet_kind(first), RequestKind::GetLocalStorage).await);
    assert_eq!(mine, json!({ "theme": "dark" }));
    let theirs = ok(host.ask(&applet_kind(second), RequestKind::GetLocalStorage).await);
    assert_eq!(theirs, json!({}));

    ok(host.ask(&applet_kind(first), RequestKind::LocalStorageClear).await);
    let mine = ok(host.ask(&applet_kind(first), RequestKind::GetLocalStorage).await);
    assert_eq!(mine, json!({}));
}

#[tokio::test]
async fn remote_signals_default_to_participants() {
    let applet = applet_id(1);
    let host = Host::with_applet(applet).await;

    ok(host
        .ask(
            &applet_kind(applet),
            RequestKind::SendRemoteSignal {
                payload: vec![1, 2],
                to_agents: None,
            },
        )
        .await);

    let sent = host.services.runtime.sent_signals().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_agents, vec![AgentKey::from_core([9; 32])]);
}

#[tokio::test]
async fn ui_requests_are_forwarded() {
    let applet = applet_id(1);
    let host = Host::with_applet(applet).await;
    let kind = applet_kind(applet);

    host.services.ui.preset_screen("screen:1").await;
    assert_eq!(ok(host.ask(&kind, RequestKind::UserSelectScreen).await), json!("screen:1"));

    host.services.ui.preset_asset(Some(wal(3))).await;
    let picked = ok(host
        .ask(
            &kind,
            RequestKind::UserSelectAsset {
                from: Some(AssetSource::Pocket),
            },
        )
        .await);
    assert_eq!(serde_json::from_value::<Option<Wal>>(picked).unwrap(), Some(wal(3)));

    let mut types = BTreeMap::new();
    types.insert(
        "note".to_string(),
        CreatableType {
            label: "Note".into(),
            icon_src: "data:,".into(),
            width: None,
            height: None,
        },
    );
    ok(host
        .ask(&kind, RequestKind::UpdateCreatableTypes { value: types.clone() })
        .await);

    let events = host.services.ui.events().await;
    assert_eq!(
        events,
        vec![
            UiEvent::SelectScreen,
            UiEvent::SelectAsset(Some(AssetSource::Pocket)),
            UiEvent::UpdateCreatableTypes { applet, types },
        ]
    );
}

#[tokio::test]
async fn iframe_script_is_served() {
    let applet = applet_id(1);
    let host = Host::with_applet(applet).await;
    let result = ok(host
        .ask(&applet_kind(applet), RequestKind::GetAppletIframeScript)
        .await);
    assert_eq!(result, json!(SHIM));
}

#[tokio::test]
async fn closed_callers_do_not_stop_the_dispatcher() {
    let applet = applet_id(1);
    let host = Host::with_applet(applet).await;
    let kind = applet_kind(applet);
    let origin = host.origin(&kind);

    let (bus, inbox) = host_bus();
    let serving = host.dispatcher.clone().serve(inbox);
    drop(bus.post(&origin, Envelope::new(RequestKind::TogglePocket, kind.clone())).unwrap());
    let reply = bus
        .post(&origin, Envelope::new(RequestKind::GetAppletIframeScript, kind))
        .unwrap()
        .await
        .unwrap();
    assert!(reply.is_success());
    drop(bus);
    serving.await.unwrap();
}
