//! Payload types carried inside requests and replies.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use framelink_identity::{AgentKey, AppletIdentity, DnaHash, RawHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A locator for a record: the DNA it lives in and the record's hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hrl(pub DnaHash, pub RawHash);

/// A "weave asset locator": an [`Hrl`] plus optional applet-defined context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wal {
    pub hrl: Hrl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl Wal {
    pub fn new(hrl: Hrl) -> Self {
        Self { hrl, context: None }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// A stable string key for a [`Wal`].
///
/// The JSON always spells out `context`, as `null` when absent, and object
/// keys come out sorted, so equal locators give equal keys.
pub fn stringify_wal(wal: &Wal) -> String {
    let canonical = serde_json::json!({
        "hrl": [wal.hrl.0.to_b64(), wal.hrl.1.to_b64()],
        "context": wal.context.clone().unwrap_or(Value::Null),
    });
    STANDARD.encode(canonical.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// A notification an applet asks the host to show or record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameNotification {
    pub title: String,
    pub body: String,
    pub notification_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_src: Option<String>,
    pub urgency: Urgency,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about_wal: Option<Wal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_agent: Option<AgentKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupProfile {
    pub name: String,
    pub icon_src: String,
}

/// What the host knows about an installed applet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppletInfo {
    pub applet_bundle_id: String,
    pub applet_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applet_icon: Option<String>,
    pub group_hashes: Vec<DnaHash>,
}

/// Credentials an applet's UI uses to reach its backing runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilesLocation {
    pub authentication_token: Vec<u8>,
    pub profiles_role_name: String,
}

/// How an applet describes one of its own assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub name: String,
    pub icon_src: String,
}

/// An [`AssetInfo`] together with the applet that owns the asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLocationAndInfo {
    pub applet_hash: AppletIdentity,
    pub asset_info: AssetInfo,
}

/// Minimal record metadata passed to an applet's asset resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInfo {
    pub role_name: String,
    pub integrity_zome_name: String,
    pub entry_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalRelationAndTags {
    pub relation_hash: RawHash,
    pub created_at: i64,
    pub wal: Wal,
    pub tags: Vec<String>,
}

/// What the asset store holds for one asset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetStoreContent {
    pub tags: Vec<String>,
    pub linked_to: Vec<WalRelationAndTags>,
    pub linked_from: Vec<WalRelationAndTags>,
}

/// The state of a value that is loaded asynchronously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum AsyncStatus<T> {
    Pending,
    Complete { value: T },
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatus {
    pub status: String,
    pub last_seen: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz_utc_offset: Option<i32>,
}

/// Per-agent status, keyed by agent key.
pub type PeerStatusMap = BTreeMap<AgentKey, PeerStatus>;

/// A block an applet can render inside another view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockType {
    pub label: String,
    pub icon_src: String,
    pub view: String,
}

/// An asset type an applet can create from a dialog in the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatableType {
    pub label: String,
    pub icon_src: String,
    #[serde(default)]
    pub width: Option<String>,
    #[serde(default)]
    pub height: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CreatableResult {
    Success { wal: Wal },
    Cancel,
    Error { error: String },
}

/// Where the host should let the user pick an asset from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetSource {
    Search,
    Pocket,
    Create,
}

/// Which view an applet wants the host to open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OpenViewRequest {
    AppletMain {
        applet_hash: AppletIdentity,
    },
    AppletBlock {
        applet_hash: AppletIdentity,
        block: String,
        #[serde(default)]
        context: Value,
    },
    CrossGroupMain {
        applet_bundle_id: String,
    },
    CrossGroupBlock {
        applet_bundle_id: String,
        block: String,
        #[serde(default)]
        context: Value,
    },
    Asset {
        wal: Wal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<OpenAssetMode>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpenAssetMode {
    Front,
    Side,
    Window,
}

/// A cell is one agent's instance of one DNA.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId {
    pub dna_hash: DnaHash,
    pub agent_key: AgentKey,
}

/// A call into an applet's backend, as produced by applet code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedCall {
    pub cell_id: CellId,
    pub zome_name: String,
    pub fn_name: String,
    pub payload: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_secret: Option<Vec<u8>>,
    pub provenance: AgentKey,
    pub nonce: Vec<u8>,
    /// Microseconds since the Unix epoch.
    pub expires_at: i64,
}

/// An [`UnsignedCall`] plus the provenance's signature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCall {
    #[serde(flatten)]
    pub call: UnsignedCall,
    pub signature: Vec<u8>,
}

/// Timing for a zome call, reported by applets that have logging turned on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZomeCallLogInfo {
    pub fn_name: String,
    pub zome_name: String,
    pub cell_id: CellId,
    pub start_time: i64,
    pub duration_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelink_identity::HashKind;

    fn hrl(byte: u8) -> Hrl {
        Hrl(
            DnaHash::from_core([byte; 32]),
            RawHash::from_core(HashKind::Entry, [byte; 32]),
        )
    }

    #[test]
    fn stringify_wal_is_stable() {
        let a = Wal::new(hrl(1)).with_context(serde_json::json!({"b": 1, "a": 2}));
        let b = Wal::new(hrl(1)).with_context(serde_json::json!({"a": 2, "b": 1}));
        assert_eq!(stringify_wal(&a), stringify_wal(&b));
    }

    #[test]
    fn stringify_wal_spells_out_null_context() {
        let wal = Wal::new(hrl(2));
        let decoded = STANDARD.decode(stringify_wal(&wal)).unwrap();
        let json: Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(json["context"], Value::Null);
        assert!(json.as_object().unwrap().contains_key("context"));
    }

    #[test]
    fn stringify_wal_distinguishes_context() {
        let plain = Wal::new(hrl(3));
        let with = Wal::new(hrl(3)).with_context(serde_json::json!("x"));
        assert_ne!(stringify_wal(&plain), stringify_wal(&with));
    }

    #[test]
    fn async_status_tagging() {
        let status: AsyncStatus<u32> = AsyncStatus::Complete { value: 3 };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["value"], 3);
    }

    #[test]
    fn signed_call_flattens() {
        let call = UnsignedCall {
            cell_id: CellId {
                dna_hash: DnaHash::from_core([1; 32]),
                agent_key: AgentKey::from_core([2; 32]),
            },
            zome_name: "posts".into(),
            fn_name: "create".into(),
            payload: vec![1, 2],
            cap_secret: None,
            provenance: AgentKey::from_core([2; 32]),
            nonce: vec![0; 32],
            expires_at: 10,
        };
        let signed = SignedCall {
            call,
            signature: vec![9; 64],
        };
        let json = serde_json::to_value(&signed).unwrap();
        assert_eq!(json["fn_name"], "create");
        assert_eq!(json["signature"].as_array().unwrap().len(), 64);
    }
}
