//! Frame side of the protocol.
//!
//! A frame builds one [`FrameRuntimeContext`] when it loads. The context
//! derives the frame's identity from its origin, asks the host for its
//! config once, and from then on exposes [`Capabilities`] to applet code.
//! [`serve_inbound`] answers what the host asks of the frame: searches,
//! block types, asset info and teardown.
//!
//! ```ignore
//! let context = Arc::new(FrameRuntimeContext::new(bootstrap, &ShimConfig::default(), bus)?);
//! serve_inbound(context.clone(), Arc::new(MyApplet), inbox);
//! match context.start().await? {
//!     FrameState::Ready { .. } => run_applet(&context).await,
//!     _ => render(context.fallback_html()),
//! }
//! ```

pub mod capabilities;
pub mod config;
pub mod context;
pub mod error;
pub mod fallback;
pub mod inbound;
pub mod state;
pub mod unload;

pub use capabilities::Capabilities;
pub use config::{FrameBootstrap, ShimConfig};
pub use context::{FrameEvent, FrameRuntimeContext};
pub use error::{Result, ShimError};
pub use fallback::not_installed_html;
pub use inbound::{handle_inbound, serve_inbound, AppletServices, NoServices};
pub use state::FrameState;
pub use unload::{BeforeUnloadRegistry, UnloadId};
