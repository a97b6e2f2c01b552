//! Host configuration.

use std::fs;
use std::path::Path;

use framelink_protocol::OriginSchemes;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the host side of the protocol.
///
/// Every field has a default, so a config file only lists what it changes:
///
/// ```json
/// { "main_ui_origin": "moss://admin.main", "app_port": 8888 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Scheme serving single-applet frames.
    pub applet_scheme: String,
    /// Scheme serving cross-group frames.
    pub cross_group_scheme: String,
    /// Origin of the host's own UI. Frames only accept messages from it.
    pub main_ui_origin: String,
    /// Port of the runtime's app interface, handed to frames.
    pub app_port: u16,
    pub weave_protocol_version: String,
    pub host_version: String,
    /// Ask frames to report their zome call timings, and log signatures.
    pub zome_call_logging: bool,
    /// Trust self-reported identities from localhost frames. Has no effect
    /// unless the crate is built with the `dev-mode` feature.
    pub dev_mode: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            applet_scheme: "applet".to_string(),
            cross_group_scheme: "cross-group".to_string(),
            main_ui_origin: "framelink://main".to_string(),
            app_port: 8888,
            weave_protocol_version: "0.13".to_string(),
            host_version: env!("CARGO_PKG_VERSION").to_string(),
            zome_call_logging: false,
            dev_mode: false,
        }
    }
}

impl HostConfig {
    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let config: HostConfig =
            serde_json::from_str(&text).map_err(|error| ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.applet_scheme.is_empty() || self.cross_group_scheme.is_empty() {
            return Err(ConfigError::Invalid("schemes must not be empty".into()));
        }
        if self.applet_scheme == self.cross_group_scheme {
            return Err(ConfigError::Invalid(format!(
                "applet and cross-group frames cannot share the '{}' scheme",
                self.applet_scheme
            )));
        }
        if self.main_ui_origin.is_empty() {
            return Err(ConfigError::Invalid("main_ui_origin must be set".into()));
        }
        Ok(())
    }

    pub fn schemes(&self) -> OriginSchemes {
        OriginSchemes {
            applet: self.applet_scheme.clone(),
            cross_group: self.cross_group_scheme.clone(),
        }
    }

    /// Whether self-reported identities are honored.
    pub fn trusts_dev_frames(&self) -> bool {
        cfg!(feature = "dev-mode") && self.dev_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"main_ui_origin": "moss://admin.main", "dev_mode": true}}"#).unwrap();

        let config = HostConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.main_ui_origin, "moss://admin.main");
        assert_eq!(config.applet_scheme, "applet");
        assert!(config.dev_mode);
        assert_eq!(config.trusts_dev_frames(), cfg!(feature = "dev-mode"));
    }

    #[test]
    fn missing_file() {
        let err = HostConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = HostConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn shared_scheme_rejected() {
        let config = HostConfig {
            cross_group_scheme: "applet".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
