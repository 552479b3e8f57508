use crate::domain::{EndpointId, RemoteParticipant, Timestamp, Transform};
use std::collections::HashMap;

/// Remote participants keyed by endpoint ID, read by the rendering layer every frame.
///
/// Updates are last-write-wins per peer. The channel carrying them is ordered,
/// so no sequence numbers are needed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticipantTable {
    participants: HashMap<EndpointId, RemoteParticipant>,
}

impl ParticipantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a participant at the origin (no-op if already known)
    pub fn seed(&mut self, id: EndpointId) {
        self.participants
            .entry(id)
            .or_insert_with(RemoteParticipant::at_origin);
    }

    /// Overwrite a participant's transform unconditionally
    pub fn apply(&mut self, id: EndpointId, transform: Transform, timestamp: Timestamp) {
        self.participants.insert(
            id,
            RemoteParticipant {
                transform,
                last_update: Some(timestamp),
            },
        );
    }

    pub fn remove(&mut self, id: &EndpointId) -> Option<RemoteParticipant> {
        self.participants.remove(id)
    }

    pub fn get(&self, id: &EndpointId) -> Option<&RemoteParticipant> {
        self.participants.get(id)
    }

    pub fn contains(&self, id: &EndpointId) -> bool {
        self.participants.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EndpointId, &RemoteParticipant)> {
        self.participants.iter()
    }

    pub fn ids(&self) -> Vec<EndpointId> {
        self.participants.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }
}
