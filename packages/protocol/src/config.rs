//! The one-time configuration a frame receives before exposing capabilities.

use std::collections::BTreeMap;

use framelink_identity::AppletIdentity;
use serde::{Deserialize, Serialize};

use crate::types::{GroupProfile, ProfilesLocation};

/// Per-applet credentials handed to a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppletCredentials {
    pub authentication_token: Vec<u8>,
    pub profiles_location: ProfilesLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppletFrameConfig {
    pub app_port: u16,
    /// The only origin the frame accepts host messages from.
    pub main_ui_origin: String,
    pub applet_hash: AppletIdentity,
    #[serde(flatten)]
    pub credentials: AppletCredentials,
    pub weave_protocol_version: String,
    pub host_version: String,
    pub group_profiles: Vec<GroupProfile>,
    pub zome_call_logging: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossGroupFrameConfig {
    pub app_port: u16,
    pub main_ui_origin: String,
    pub weave_protocol_version: String,
    pub host_version: String,
    /// Every installed instance of the tool, across groups.
    pub applets: BTreeMap<AppletIdentity, AppletCredentials>,
    pub zome_call_logging: bool,
}

/// What the host answers to `get-iframe-config`.
///
/// Terminal for a frame: once received it never changes. A frame whose
/// applet is uninstalled while open must be recreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum IframeConfig {
    Applet(AppletFrameConfig),
    CrossGroup(CrossGroupFrameConfig),
    NotInstalled { applet_name: String },
}

impl IframeConfig {
    pub fn not_installed(applet_name: impl Into<String>) -> Self {
        IframeConfig::NotInstalled {
            applet_name: applet_name.into(),
        }
    }

    /// The trusted parent origin, absent for frames that are not installed.
    pub fn main_ui_origin(&self) -> Option<&str> {
        match self {
            IframeConfig::Applet(config) => Some(&config.main_ui_origin),
            IframeConfig::CrossGroup(config) => Some(&config.main_ui_origin),
            IframeConfig::NotInstalled { .. } => None,
        }
    }

    pub fn is_installed(&self) -> bool {
        !matches!(self, IframeConfig::NotInstalled { .. })
    }
}
