mod command;
#[cfg(feature = "native")]
mod mesh_runtime;
mod snapshot;

pub use command::MeshCommand;
#[cfg(feature = "native")]
pub use mesh_runtime::MeshRuntime;
pub use snapshot::MeshSnapshot;
