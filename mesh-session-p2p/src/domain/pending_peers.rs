use mesh_session_core::EndpointId;
use std::collections::HashSet;

/// Identities announced to us (via `room-peers` / `new-peer`) that we have not
/// reached yet. Entries leave the set once a channel to them opens, or when the
/// connect attempt fails.
///
/// This is a ledger for snapshots and diagnostics. Whether to dial is decided
/// by the channel registry alone, which already holds a connecting entry for
/// every pending peer.
#[derive(Debug, Default)]
pub struct PendingPeers {
    peers: HashSet<EndpointId>,
}

impl PendingPeers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the identity was not pending yet
    pub fn insert(&mut self, id: EndpointId) -> bool {
        self.peers.insert(id)
    }

    pub fn remove(&mut self, id: &EndpointId) -> bool {
        self.peers.remove(id)
    }

    pub fn contains(&self, id: &EndpointId) -> bool {
        self.peers.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointId> {
        self.peers.iter()
    }

    pub fn sorted(&self) -> Vec<EndpointId> {
        let mut peers: Vec<EndpointId> = self.peers.iter().cloned().collect();
        peers.sort();
        peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn clear(&mut self) {
        self.peers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_idempotent() {
        let mut pending = PendingPeers::new();
        let peer = EndpointId::parse("carol").unwrap();

        assert!(pending.insert(peer.clone()));
        assert!(!pending.insert(peer.clone()));
        assert_eq!(pending.len(), 1);

        assert!(pending.insert(EndpointId::parse("bob").unwrap()));
        assert_eq!(
            pending.sorted(),
            vec![EndpointId::parse("bob").unwrap(), peer.clone()]
        );

        assert!(pending.remove(&peer));
        assert_eq!(pending.len(), 1);
    }
}
