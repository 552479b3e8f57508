use crate::application::MeshLoop;
use crate::infrastructure::Transport;
use mesh_session_core::{EndpointId, ParticipantTable, RoomState};

/// Snapshot of mesh state (read-only, cheap enough to clone every frame)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshSnapshot {
    pub local_id: Option<EndpointId>,
    /// The endpoint is open and the loop is running
    pub connected: bool,
    pub room_id: Option<EndpointId>,
    pub room_state: RoomState,
    pub participants: ParticipantTable,
    /// Peers with an open channel
    pub peer_count: usize,
    /// Announced peers we are still dialing, sorted
    pub pending_peers: Vec<EndpointId>,
}

impl MeshSnapshot {
    pub fn capture<T: Transport>(mesh_loop: &MeshLoop<T>) -> Self {
        Self {
            local_id: Some(mesh_loop.local_id().clone()),
            connected: true,
            room_id: mesh_loop.room_id(),
            room_state: mesh_loop.room_state().clone(),
            participants: mesh_loop.participants().clone(),
            peer_count: mesh_loop.connected_peers().len(),
            pending_peers: mesh_loop.pending_peers().sorted(),
        }
    }

    /// The loop stopped; identity is kept for display
    pub fn disconnected(local_id: Option<EndpointId>) -> Self {
        Self {
            local_id,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::LivenessConfig;
    use crate::infrastructure::MemoryNetwork;

    #[test]
    fn test_capture_reflects_loop_state() {
        let network = MemoryNetwork::new();
        let transport = network
            .open_as(EndpointId::parse("alice").unwrap())
            .unwrap();
        let mut mesh_loop = MeshLoop::new(transport, LivenessConfig::default());
        mesh_loop.create_room().unwrap();

        let snapshot = MeshSnapshot::capture(&mesh_loop);
        assert!(snapshot.connected);
        assert_eq!(snapshot.room_id, snapshot.local_id);
        assert_eq!(snapshot.room_state, RoomState::Hosting);
        assert_eq!(snapshot.peer_count, 0);
        assert!(snapshot.pending_peers.is_empty());
    }

    #[test]
    fn test_default_is_disconnected() {
        let snapshot = MeshSnapshot::default();
        assert!(!snapshot.connected);
        assert!(snapshot.local_id.is_none());
        assert!(snapshot.participants.is_empty());
    }
}
