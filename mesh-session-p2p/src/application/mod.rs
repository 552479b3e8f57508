mod config;
mod liveness;
mod mesh_loop;
pub mod runtime;
#[cfg(feature = "native")]
mod session;

pub use config::MeshConfig;
pub use liveness::{LivenessAction, LivenessConfig, LivenessMonitor};
pub use mesh_loop::MeshLoop;
#[cfg(feature = "native")]
pub use runtime::MeshRuntime;
pub use runtime::{MeshCommand, MeshSnapshot};
#[cfg(feature = "native")]
pub use session::MeshSession;
