use mesh_session_core::{EndpointId, Transform};

/// Fire-and-forget requests from the application to the mesh loop
#[derive(Debug, Clone, PartialEq)]
pub enum MeshCommand {
    CreateRoom,
    JoinRoom(EndpointId),
    LeaveRoom,
    BroadcastPosition(Transform),
    /// Leave the room and stop the loop
    Shutdown,
}

impl MeshCommand {
    /// Position updates are latest-wins and may be dropped under backpressure
    pub fn is_droppable(&self) -> bool {
        matches!(self, MeshCommand::BroadcastPosition(_))
    }
}
