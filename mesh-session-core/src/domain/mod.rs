mod endpoint_id;
mod participant_table;
mod room;
mod transform;

pub use endpoint_id::EndpointId;
pub use participant_table::ParticipantTable;
pub use room::{RoomState, RoomTransition};
pub use transform::{RemoteParticipant, Timestamp, Transform, Vec3};
