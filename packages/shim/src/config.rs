use framelink_protocol::{OriginSchemes, ViewSubType};
use serde::{Deserialize, Serialize};

/// Schemes the host serves frames from. Must match the host's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    pub applet_scheme: String,
    pub cross_group_scheme: String,
}

impl Default for ShimConfig {
    fn default() -> Self {
        let schemes = OriginSchemes::default();
        Self {
            applet_scheme: schemes.applet,
            cross_group_scheme: schemes.cross_group,
        }
    }
}

impl ShimConfig {
    pub fn schemes(&self) -> OriginSchemes {
        OriginSchemes {
            applet: self.applet_scheme.clone(),
            cross_group: self.cross_group_scheme.clone(),
        }
    }
}

/// What a frame knows about itself when it loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBootstrap {
    /// The origin the frame is served from.
    pub origin: String,
    pub sub_type: ViewSubType,
    /// Encoded frame kind, handed to frames served from localhost during
    /// development. Ignored for any other origin.
    pub dev_payload: Option<String>,
}

impl FrameBootstrap {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            sub_type: ViewSubType::Main,
            dev_payload: None,
        }
    }

    pub fn with_sub_type(mut self, sub_type: ViewSubType) -> Self {
        self.sub_type = sub_type;
        self
    }

    pub fn with_dev_payload(mut self, payload: impl Into<String>) -> Self {
        self.dev_payload = Some(payload.into());
        self
    }
}
