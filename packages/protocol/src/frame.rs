//! What role a frame plays, derived from its origin.
//!
//! Applet frames are served from `applet://<folded identity>` and
//! cross-group frames from `cross-group://<folded tool compatibility id>`.
//! The host reads the origin the browser attached to a message, never a
//! value the frame wrote itself, so the identity cannot be spoofed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use framelink_identity::{
    decode_hash, encode, fold_case, unfold_case, AppletIdentity, DnaHash, ESCAPE_MARKER,
    URL_ESCAPED_MARKER,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::OriginError;

/// Origins served from these hosts are a developer's local machine.
const LOCAL_DEV_ORIGINS: [&str; 2] = ["http://localhost", "http://127.0.0.1"];

/// Which view of an applet a frame renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewSubType {
    #[default]
    Main,
    Block,
    Asset,
    Creatable,
}

impl ViewSubType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewSubType::Main => "main",
            ViewSubType::Block => "block",
            ViewSubType::Asset => "asset",
            ViewSubType::Creatable => "creatable",
        }
    }
}

impl std::str::FromStr for ViewSubType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(ViewSubType::Main),
            "block" => Ok(ViewSubType::Block),
            "asset" => Ok(ViewSubType::Asset),
            "creatable" => Ok(ViewSubType::Creatable),
            other => Err(format!("unknown view sub-type '{}'", other)),
        }
    }
}

/// URL schemes the host registers for applet content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginSchemes {
    pub applet: String,
    pub cross_group: String,
}

impl Default for OriginSchemes {
    fn default() -> Self {
        Self {
            applet: "applet".to_string(),
            cross_group: "cross-group".to_string(),
        }
    }
}

/// The authenticated role of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FrameKind {
    Applet {
        applet_hash: AppletIdentity,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_hash: Option<DnaHash>,
        sub_type: ViewSubType,
    },
    CrossGroup {
        tool_compatibility_id: String,
        sub_type: ViewSubType,
    },
    /// A frame served from a local dev server. The payload is the base64 of
    /// the JSON of the frame's real kind and is only trusted by hosts built
    /// and configured for development.
    Dev { payload: String },
}

impl FrameKind {
    /// Derive the kind from a frame's origin.
    ///
    /// An applet origin may carry the group as a second host label:
    /// `applet://<folded applet>.<folded group>`.
    pub fn from_origin(
        origin: &str,
        schemes: &OriginSchemes,
        sub_type: ViewSubType,
    ) -> Result<Self, OriginError> {
        let url = Url::parse(origin).map_err(|e| OriginError::InvalidUrl(origin.to_string(), e))?;
        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(OriginError::MissingHost(origin.to_string())),
        };
        let host = host.replace(URL_ESCAPED_MARKER, &ESCAPE_MARKER.to_string());

        if url.scheme() == schemes.applet {
            let mut labels = host.splitn(2, '.');
            let applet = labels.next().unwrap_or_default();
            let applet_hash = decode_hash::<AppletIdentity>(applet)?;
            let group_hash = labels.next().map(decode_hash::<DnaHash>).transpose()?;
            Ok(FrameKind::Applet {
                applet_hash,
                group_hash,
                sub_type,
            })
        } else if url.scheme() == schemes.cross_group {
            Ok(FrameKind::CrossGroup {
                tool_compatibility_id: unfold_case(&host)?,
                sub_type,
            })
        } else {
            Err(OriginError::UnexpectedScheme(origin.to_string()))
        }
    }

    /// The origin a frame of this kind is served from. Dev frames have none.
    pub fn origin(&self, schemes: &OriginSchemes) -> Option<String> {
        match self {
            FrameKind::Applet {
                applet_hash,
                group_hash,
                ..
            } => {
                let mut host = encode(applet_hash).to_url_host();
                if let Some(group) = group_hash {
                    host.push('.');
                    let group = fold_case(&group.to_b64());
                    host.push_str(&group.replace(ESCAPE_MARKER, URL_ESCAPED_MARKER));
                }
                Some(format!("{}://{}", schemes.applet, host))
            }
            FrameKind::CrossGroup {
                tool_compatibility_id,
                ..
            } => Some(format!(
                "{}://{}",
                schemes.cross_group,
                fold_case(tool_compatibility_id).replace(ESCAPE_MARKER, URL_ESCAPED_MARKER)
            )),
            FrameKind::Dev { .. } => None,
        }
    }

    /// Wrap a kind as a development payload.
    pub fn dev(inner: &FrameKind) -> Result<Self, OriginError> {
        if matches!(inner, FrameKind::Dev { .. }) {
            return Err(OriginError::DevPayload("development payloads cannot nest".into()));
        }
        let json = serde_json::to_vec(inner).map_err(|e| OriginError::DevPayload(e.to_string()))?;
        Ok(FrameKind::Dev {
            payload: STANDARD.encode(json),
        })
    }

    /// Unwrap a development payload. Other kinds are returned as they are.
    pub fn resolve_dev_payload(&self) -> Result<FrameKind, OriginError> {
        let FrameKind::Dev { payload } = self else {
            return Ok(self.clone());
        };
        let json = STANDARD
            .decode(payload)
            .map_err(|e| OriginError::DevPayload(e.to_string()))?;
        let inner: FrameKind =
            serde_json::from_slice(&json).map_err(|e| OriginError::DevPayload(e.to_string()))?;
        if matches!(inner, FrameKind::Dev { .. }) {
            return Err(OriginError::DevPayload("development payloads cannot nest".into()));
        }
        Ok(inner)
    }

    pub fn sub_type(&self) -> Option<ViewSubType> {
        match self {
            FrameKind::Applet { sub_type, .. } | FrameKind::CrossGroup { sub_type, .. } => {
                Some(*sub_type)
            }
            FrameKind::Dev { .. } => None,
        }
    }

    pub fn applet_hash(&self) -> Option<&AppletIdentity> {
        match self {
            FrameKind::Applet { applet_hash, .. } => Some(applet_hash),
            _ => None,
        }
    }
}

/// Whether an origin belongs to a local development server.
pub fn is_local_dev_origin(origin: &str) -> bool {
    LOCAL_DEV_ORIGINS.iter().any(|prefix| {
        origin
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(':') || rest.starts_with('/'))
    })
}
