mod channel;
mod ice_server;
mod pending_peers;
mod registry;

pub use channel::{Channel, ChannelId, ChannelStatus};
pub(crate) use channel::elapsed;
pub use ice_server::IceServer;
pub use mesh_session_core::{EndpointId, ParticipantTable, RemoteParticipant, RoomState, Transform};
pub use pending_peers::PendingPeers;
pub use registry::{ChannelRegistry, PutOutcome};
