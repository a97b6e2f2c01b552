use std::sync::Arc;

use framelink_protocol::IframeConfig;

/// Lifecycle of a frame.
///
/// `Uninitialized -> AwaitingConfig -> (NotInstalled | Ready)`. Both end
/// states are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FrameState {
    /// Loaded, config not yet requested.
    #[default]
    Uninitialized,
    /// Waiting for the host's answer to `get-iframe-config`.
    AwaitingConfig,
    /// The host does not know this applet. Applet code never runs.
    NotInstalled { applet_name: String },
    /// The only state in which capabilities may be used.
    Ready { config: Arc<IframeConfig> },
}

impl FrameState {
    pub fn name(&self) -> &'static str {
        match self {
            FrameState::Uninitialized => "uninitialized",
            FrameState::AwaitingConfig => "awaiting-config",
            FrameState::NotInstalled { .. } => "not-installed",
            FrameState::Ready { .. } => "ready",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, FrameState::Ready { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FrameState::NotInstalled { .. } | FrameState::Ready { .. })
    }

    /// The state a config answer leads to.
    pub fn from_config(config: IframeConfig) -> Self {
        match config {
            IframeConfig::NotInstalled { applet_name } => FrameState::NotInstalled { applet_name },
            config => FrameState::Ready {
                config: Arc::new(config),
            },
        }
    }

    /// The origin host messages must come from. Only known once ready.
    pub fn trusted_origin(&self) -> Option<&str> {
        match self {
            FrameState::Ready { config } => config.main_ui_origin(),
            _ => None,
        }
    }
}

impl std::fmt::Display for FrameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
