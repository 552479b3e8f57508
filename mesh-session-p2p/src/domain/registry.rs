use crate::domain::{Channel, ChannelId};
use mesh_session_core::EndpointId;
use std::collections::HashMap;

/// Result of offering a channel to the registry
#[derive(Debug)]
pub enum PutOutcome {
    /// No live entry existed; the channel is now registered
    Inserted,
    /// Same channel was already registered; its record was refreshed
    Updated,
    /// The channel won a duplicate race; the returned loser must be closed
    Replaced(Channel),
    /// The channel lost a duplicate race (or is keyed by our own ID) and must be closed
    Rejected(Channel),
}

/// Connection registry: the single source of truth for who we exchange data with.
///
/// Holds at most one channel per remote identity. When two channels to the same
/// remote compete (both sides dialed at once), the channel initiated by the
/// smaller of the two identities wins. Both ends evaluate the same rule, so both
/// keep the same channel.
#[derive(Debug)]
pub struct ChannelRegistry {
    local_id: EndpointId,
    channels: HashMap<EndpointId, Channel>,
}

impl ChannelRegistry {
    pub fn new(local_id: EndpointId) -> Self {
        Self {
            local_id,
            channels: HashMap::new(),
        }
    }

    pub fn local_id(&self) -> &EndpointId {
        &self.local_id
    }

    /// Register a channel, enforcing the one-channel-per-identity invariant
    pub fn put(&mut self, channel: Channel) -> PutOutcome {
        if channel.remote == self.local_id {
            return PutOutcome::Rejected(channel);
        }

        let Some(existing) = self.channels.get(&channel.remote) else {
            self.channels.insert(channel.remote.clone(), channel);
            return PutOutcome::Inserted;
        };

        if existing.id == channel.id {
            self.channels.insert(channel.remote.clone(), channel);
            return PutOutcome::Updated;
        }

        if existing.is_live() && !self.prefers(&channel, existing) {
            return PutOutcome::Rejected(channel);
        }

        match self.channels.insert(channel.remote.clone(), channel) {
            Some(replaced) => PutOutcome::Replaced(replaced),
            None => PutOutcome::Inserted,
        }
    }

    /// Whether `candidate` beats `existing` in a duplicate race
    fn prefers(&self, candidate: &Channel, existing: &Channel) -> bool {
        let preferred = std::cmp::min(&self.local_id, &candidate.remote);
        candidate.initiator == *preferred && existing.initiator != *preferred
    }

    pub fn get(&self, id: &EndpointId) -> Option<&Channel> {
        self.channels.get(id)
    }

    pub fn get_mut(&mut self, id: &EndpointId) -> Option<&mut Channel> {
        self.channels.get_mut(id)
    }

    /// Find the registered channel with this handle (rejected duplicates are not found)
    pub fn find_channel(&self, channel: ChannelId) -> Option<&Channel> {
        self.channels.values().find(|c| c.id == channel)
    }

    pub fn find_channel_mut(&mut self, channel: ChannelId) -> Option<&mut Channel> {
        self.channels.values_mut().find(|c| c.id == channel)
    }

    pub fn remove(&mut self, id: &EndpointId) -> Option<Channel> {
        self.channels.remove(id)
    }

    /// Remove the entry only if it is still this exact channel
    pub fn remove_channel(&mut self, channel: ChannelId) -> Option<Channel> {
        let remote = self.find_channel(channel)?.remote.clone();
        self.channels.remove(&remote)
    }

    /// A connecting, open or recovering channel exists for this identity
    pub fn is_live(&self, id: &EndpointId) -> bool {
        self.channels.get(id).map(Channel::is_live).unwrap_or(false)
    }

    pub fn is_open(&self, id: &EndpointId) -> bool {
        self.channels.get(id).map(Channel::is_open).unwrap_or(false)
    }

    pub fn values(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn ids(&self) -> Vec<EndpointId> {
        self.channels.keys().cloned().collect()
    }

    /// Identities with an open channel
    pub fn open_ids(&self) -> Vec<EndpointId> {
        self.channels
            .values()
            .filter(|c| c.is_open())
            .map(|c| c.remote.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Remove every entry, returning them so the caller can close the channels
    pub fn drain(&mut self) -> Vec<Channel> {
        self.channels.drain().map(|(_, channel)| channel).collect()
    }
}
