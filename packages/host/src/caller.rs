use framelink_identity::{AppletIdentity, DnaHash};
use framelink_protocol::{FrameKind, ViewSubType};

use crate::error::HandlerError;

/// An authenticated sender.
///
/// Unlike a [`FrameKind`] this can never be a development payload: by the
/// time a `Caller` exists the payload has been resolved or rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Applet {
        applet_hash: AppletIdentity,
        group_hash: Option<DnaHash>,
        sub_type: ViewSubType,
    },
    CrossGroup {
        tool_compatibility_id: String,
        sub_type: ViewSubType,
    },
}

impl Caller {
    pub(crate) fn from_resolved(kind: FrameKind) -> Option<Self> {
        match kind {
            FrameKind::Applet {
                applet_hash,
                group_hash,
                sub_type,
            } => Some(Caller::Applet {
                applet_hash,
                group_hash,
                sub_type,
            }),
            FrameKind::CrossGroup {
                tool_compatibility_id,
                sub_type,
            } => Some(Caller::CrossGroup {
                tool_compatibility_id,
                sub_type,
            }),
            FrameKind::Dev { .. } => None,
        }
    }

    /// The applet behind the caller, for requests only applets may make.
    pub fn applet(&self, request: &'static str) -> Result<&AppletIdentity, HandlerError> {
        match self {
            Caller::Applet { applet_hash, .. } => Ok(applet_hash),
            Caller::CrossGroup { .. } => Err(HandlerError::NotAnApplet { request }),
        }
    }

    pub fn sub_type(&self) -> ViewSubType {
        match self {
            Caller::Applet { sub_type, .. } | Caller::CrossGroup { sub_type, .. } => *sub_type,
        }
    }

    /// Key under which the caller's local storage is kept.
    pub fn storage_scope(&self) -> String {
        match self {
            Caller::Applet { applet_hash, .. } => applet_hash.to_b64(),
            Caller::CrossGroup {
                tool_compatibility_id,
                ..
            } => format!("cross-group/{}", tool_compatibility_id),
        }
    }
}

impl std::fmt::Display for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Caller::Applet { applet_hash, .. } => write!(f, "applet {}", applet_hash),
            Caller::CrossGroup {
                tool_compatibility_id,
                ..
            } => write!(f, "cross-group {}", tool_compatibility_id),
        }
    }
}
