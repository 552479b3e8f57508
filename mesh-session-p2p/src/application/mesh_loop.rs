use crate::application::liveness::{LivenessAction, LivenessConfig, LivenessMonitor};
use crate::domain::{Channel, ChannelId, ChannelRegistry, PendingPeers, PutOutcome};
use crate::infrastructure::error::Result;
use crate::infrastructure::{LinkState, MeshMessage, Transport, TransportEvent};
use instant::Instant;
use mesh_session_core::{EndpointId, ParticipantTable, RoomState, Timestamp, Transform};

/// Mesh event loop: sole owner of the registry, pending set, participant
/// table and room state.
///
/// Every mutation happens inside `poll_at` or one of the room operations, so
/// transport callbacks and liveness repairs never race each other.
pub struct MeshLoop<T: Transport> {
    transport: T,
    registry: ChannelRegistry,
    pending: PendingPeers,
    participants: ParticipantTable,
    room: RoomState,
    liveness: LivenessMonitor,
}

impl<T: Transport> MeshLoop<T> {
    pub fn new(transport: T, liveness: LivenessConfig) -> Self {
        let local_id = transport.local_id().clone();
        tracing::info!("🎯 MeshLoop initialized for endpoint {}", local_id);

        Self {
            transport,
            registry: ChannelRegistry::new(local_id),
            pending: PendingPeers::new(),
            participants: ParticipantTable::new(),
            room: RoomState::Idle,
            liveness: LivenessMonitor::new(liveness),
        }
    }

    pub fn local_id(&self) -> &EndpointId {
        self.registry.local_id()
    }

    pub fn room_state(&self) -> &RoomState {
        &self.room
    }

    /// Current room identifier, if any
    pub fn room_id(&self) -> Option<EndpointId> {
        self.room.room_id(self.local_id())
    }

    pub fn participants(&self) -> &ParticipantTable {
        &self.participants
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn pending_peers(&self) -> &PendingPeers {
        &self.pending
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    /// Identities we hold an open channel to
    pub fn connected_peers(&self) -> Vec<EndpointId> {
        self.registry.open_ids()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Host a room under our own identity
    pub fn create_room(&mut self) -> Result<EndpointId> {
        let transition = self.room.create()?;
        let room = self.local_id().clone();

        if transition.changed() {
            tracing::info!("🏠 Hosting room {}", room);
        }
        Ok(room)
    }

    /// Join the room identified by `room`.
    ///
    /// Returns once the connect is issued; the join completes when the channel
    /// opens, and peer discovery continues from there.
    pub fn join_room(&mut self, room: &EndpointId) -> Result<()> {
        self.join_room_at(room, Instant::now())
    }

    pub fn join_room_at(&mut self, room: &EndpointId, now: Instant) -> Result<()> {
        let local = self.local_id().clone();
        let transition = self.room.join(room.clone(), &local)?;

        if *room == local {
            tracing::debug!("Join of own room {} treated as hosting", room);
            return Ok(());
        }
        if !transition.changed() {
            tracing::debug!("Already {}", self.room);
            return Ok(());
        }

        tracing::info!("🚪 Joining room {}", room);

        if let Some(channel) = self.registry.get(room).filter(|c| c.is_open()).map(|c| c.id) {
            // Already meshed with the room's owner: the join completes right away
            self.room.channel_opened(room);
            self.send_message(channel, &MeshMessage::JoinRoom {
                peer_id: self.local_id().clone(),
            });
            return Ok(());
        }

        self.connect_if_absent(room, now);
        Ok(())
    }

    /// Leave the room: close every channel and forget all peers. Idempotent.
    pub fn leave_room(&mut self) {
        let transition = self.room.leave();

        let channels = self.registry.drain();
        for channel in &channels {
            self.transport.close(channel.id);
        }
        self.pending.clear();
        self.participants.clear();
        self.liveness.clear();

        if transition.changed() {
            tracing::info!(
                "👋 Left room ({} -> {}), closed {} channels",
                transition.from,
                transition.to,
                channels.len()
            );
        }
    }

    /// Send our transform to every open channel. Channels that are not open
    /// skip this update. Returns the number of peers reached.
    pub fn broadcast_position(&mut self, transform: Transform) -> usize {
        let message = MeshMessage::Position {
            position: transform.position,
            heading: transform.heading,
            timestamp: Timestamp::now(),
        };
        let data = match message.encode() {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("❌ Failed to encode position: {}", e);
                return 0;
            }
        };

        let targets: Vec<ChannelId> = self
            .registry
            .values()
            .filter(|c| c.is_open())
            .map(|c| c.id)
            .collect();

        let mut sent = 0;
        for channel in targets {
            match self.transport.send(channel, data.clone()) {
                Ok(()) => sent += 1,
                Err(e) => tracing::trace!("Position not sent on {}: {}", channel, e),
            }
        }
        sent
    }

    /// Dial `remote` unless it is us or a channel to it is already live
    pub fn connect(&mut self, remote: &EndpointId) -> Option<ChannelId> {
        self.connect_at(remote, Instant::now())
    }

    pub fn connect_at(&mut self, remote: &EndpointId, now: Instant) -> Option<ChannelId> {
        self.connect_if_absent(remote, now)
    }

    /// Process transport events and liveness (call this regularly)
    pub fn poll(&mut self) -> usize {
        self.poll_at(Instant::now())
    }

    /// Like [`MeshLoop::poll`], with an explicit clock for deterministic tests
    pub fn poll_at(&mut self, now: Instant) -> usize {
        let _span = tracing::debug_span!("mesh_loop", local = %self.local_id()).entered();
        let mut processed = 0;

        for event in self.transport.poll_events() {
            processed += 1;
            self.handle_event(event, now);
        }

        for action in self.liveness.tick(&self.registry, now) {
            processed += 1;
            self.apply_liveness(action, now);
        }

        processed
    }

    fn connect_if_absent(&mut self, remote: &EndpointId, now: Instant) -> Option<ChannelId> {
        if remote == self.local_id() {
            tracing::debug!("Ignoring connect to own endpoint {}", remote);
            return None;
        }
        if self.registry.is_live(remote) {
            tracing::debug!("Channel to {} already live, not dialing", remote);
            return None;
        }

        match self.transport.connect(remote) {
            Ok(channel) => {
                tracing::debug!("📞 Connecting to {} on {}", remote, channel);
                let local = self.local_id().clone();
                self.register(Channel::outbound(channel, local, remote.clone(), now));
                Some(channel)
            }
            Err(e) => {
                tracing::warn!("❌ Connect to {} failed: {}", remote, e);
                self.pending.remove(remote);
                if self.room.join_failed(remote) {
                    tracing::warn!("❌ Could not join room {}", remote);
                }
                None
            }
        }
    }

    /// Offer a channel to the registry, closing whichever side loses
    fn register(&mut self, channel: Channel) {
        match self.registry.put(channel) {
            PutOutcome::Inserted | PutOutcome::Updated => {}
            PutOutcome::Replaced(old) => {
                tracing::debug!("🔀 Channel {} to {} lost the duplicate race", old.id, old.remote);
                self.transport.close(old.id);
            }
            PutOutcome::Rejected(new) => {
                tracing::debug!("🔀 Dropping duplicate channel {} to {}", new.id, new.remote);
                self.transport.close(new.id);
            }
        }
    }

    fn handle_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Incoming { channel, remote } => {
                if matches!(self.room, RoomState::Left) {
                    tracing::debug!("Rejecting channel {} from {}: left the room", channel, remote);
                    self.transport.close(channel);
                    return;
                }
                tracing::debug!("📥 Incoming channel {} from {}", channel, remote);
                self.register(Channel::inbound(channel, remote, now));
            }
            TransportEvent::Opened { channel, remote } => self.on_opened(channel, remote, now),
            TransportEvent::Closed { channel, remote } => {
                if self.registry.remove_channel(channel).is_some() {
                    tracing::info!("👋 Peer {} closed channel {}", remote, channel);
                    self.forget_peer(&remote);
                }
            }
            TransportEvent::StateChanged {
                channel,
                remote,
                state,
            } => self.on_state_changed(channel, remote, state, now),
            TransportEvent::ConnectFailed {
                channel,
                remote,
                reason,
            } => self.on_connect_failed(channel, &remote, &reason),
            TransportEvent::Message {
                channel,
                from,
                data,
            } => self.on_message(channel, from, &data, now),
            TransportEvent::Error(e) => {
                tracing::warn!("⚠️  Transport error: {}", e);
            }
        }
    }

    fn on_opened(&mut self, channel: ChannelId, remote: EndpointId, now: Instant) {
        let Some(entry) = self.registry.find_channel_mut(channel) else {
            // A duplicate we already dropped
            tracing::trace!("Ignoring open of unregistered channel {}", channel);
            return;
        };
        entry.mark_open(now);

        tracing::info!("✅ Channel {} to {} open", channel, remote);
        self.pending.remove(&remote);
        self.liveness.forget(&remote);
        self.participants.seed(remote.clone());

        if self.room.channel_opened(&remote) {
            tracing::info!("✅ Joined room {}", remote);
            self.send_message(channel, &MeshMessage::JoinRoom {
                peer_id: self.local_id().clone(),
            });
        }
    }

    fn on_state_changed(&mut self, channel: ChannelId, remote: EndpointId, state: LinkState, now: Instant) {
        let Some(entry) = self.registry.find_channel_mut(channel) else {
            return;
        };

        match state {
            LinkState::Disconnected => {
                tracing::warn!("🔴 Channel {} to {} disconnected, waiting for recovery", channel, remote);
                entry.mark_disconnected(now);
            }
            LinkState::Recovered => {
                tracing::info!("🟢 Channel {} to {} recovered", channel, remote);
                entry.mark_recovered(now);
            }
            LinkState::Failed => {
                tracing::warn!("💀 Channel {} to {} failed", channel, remote);
                self.registry.remove_channel(channel);
                self.transport.close(channel);
                self.forget_peer(&remote);
            }
        }
    }

    fn on_connect_failed(&mut self, channel: ChannelId, remote: &EndpointId, reason: &str) {
        tracing::warn!("❌ Connect to {} failed: {}", remote, reason);

        self.registry.remove_channel(channel);
        self.pending.remove(remote);
        if self.room.join_failed(remote) {
            tracing::warn!("❌ Could not join room {}", remote);
        }
    }

    /// Peer left for good: drop everything we know about it
    fn forget_peer(&mut self, remote: &EndpointId) {
        self.participants.remove(remote);
        self.pending.remove(remote);
        self.liveness.forget(remote);
        if self.room.join_failed(remote) {
            tracing::warn!("❌ Could not join room {}", remote);
        }
    }

    fn on_message(&mut self, channel: ChannelId, from: EndpointId, data: &[u8], now: Instant) {
        let Some(entry) = self
            .registry
            .get_mut(&from)
            .filter(|c| c.id == channel && c.is_live())
        else {
            tracing::trace!("Dropping frame from {} on stale channel {}", from, channel);
            return;
        };
        entry.touch(now);

        let message = match MeshMessage::decode(data) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("❌ Malformed message from {}: {}", from, e);
                return;
            }
        };

        if message.is_probe() {
            tracing::trace!("📥 {} from {}", message.kind(), from);
        } else if !matches!(message, MeshMessage::Position { .. }) {
            tracing::debug!("📥 {} from {}", message.kind(), from);
        }

        match message {
            MeshMessage::JoinRoom { peer_id } => self.on_join_request(channel, peer_id),
            MeshMessage::RoomPeers { peers } => {
                for peer in peers {
                    self.discover(peer, now);
                }
            }
            MeshMessage::NewPeer { peer_id } => self.discover(peer_id, now),
            MeshMessage::Position {
                position,
                heading,
                timestamp,
            } => {
                self.participants
                    .apply(from, Transform::new(position, heading), timestamp);
            }
            MeshMessage::Ping { timestamp } => {
                self.send_message(channel, &MeshMessage::Pong { timestamp });
            }
            MeshMessage::Pong { .. } => {
                if let Some(entry) = self.registry.find_channel_mut(channel) {
                    entry.pong_received(now);
                    entry.mark_recovered(now);
                }
            }
        }
    }

    fn on_join_request(&mut self, channel: ChannelId, joiner: EndpointId) {
        if self.room.adopt_as_host() {
            tracing::info!("🏠 Join request while idle, hosting room {}", self.local_id());
        }
        if !self.room.is_active() {
            tracing::debug!("Ignoring join request from {} while {}", joiner, self.room);
            return;
        }

        let mut peers = vec![self.local_id().clone()];
        peers.extend(self.registry.ids());
        tracing::info!("🤝 {} joined, sharing {} peers", joiner, peers.len());
        self.send_message(channel, &MeshMessage::RoomPeers { peers });

        let announcement = MeshMessage::NewPeer { peer_id: joiner };
        let others: Vec<ChannelId> = self
            .registry
            .values()
            .filter(|c| c.is_open() && c.id != channel)
            .map(|c| c.id)
            .collect();
        for other in others {
            self.send_message(other, &announcement);
        }
    }

    /// Handle an identity announced through `room-peers` or `new-peer`
    fn discover(&mut self, peer: EndpointId, now: Instant) {
        if !self.room.is_active() {
            return;
        }
        if peer == *self.local_id() || self.registry.is_live(&peer) {
            return;
        }

        tracing::debug!("🔍 Discovered {}", peer);
        self.pending.insert(peer.clone());
        self.connect_if_absent(&peer, now);
    }

    fn apply_liveness(&mut self, action: LivenessAction, now: Instant) {
        match action {
            LivenessAction::Ping(channel) => {
                self.send_message(channel, &MeshMessage::Ping {
                    timestamp: Timestamp::now(),
                });
                if let Some(entry) = self.registry.find_channel_mut(channel) {
                    entry.ping_sent(now);
                }
            }
            LivenessAction::Suspect { remote, channel } => {
                tracing::warn!("🔴 No pong from {} on {}, waiting for recovery", remote, channel);
                if let Some(entry) = self.registry.find_channel_mut(channel) {
                    entry.mark_disconnected(now);
                }
            }
            LivenessAction::Expire { remote, channel } => {
                tracing::warn!("⏰ Channel {} to {} did not recover, reconnecting", channel, remote);
                self.registry.remove_channel(channel);
                self.transport.close(channel);
                self.participants.remove(&remote);
                self.liveness.mark_lost(remote);
            }
            LivenessAction::Abandon { remote, channel } => {
                tracing::warn!("⏰ Connect to {} timed out", remote);
                self.registry.remove_channel(channel);
                self.transport.close(channel);
                self.pending.remove(&remote);
                if self.room.join_failed(&remote) {
                    tracing::warn!("❌ Could not join room {}", remote);
                }
            }
            LivenessAction::Reconnect(remote) => {
                tracing::info!("🔄 Reconnecting to {}", remote);
                self.connect_if_absent(&remote, now);
            }
        }
    }

    /// Send on a channel; failures on channels that are going away are expected
    fn send_message(&mut self, channel: ChannelId, message: &MeshMessage) {
        let data = match message.encode() {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("❌ Failed to encode {}: {}", message.kind(), e);
                return;
            }
        };

        if let Err(e) = self.transport.send(channel, data) {
            tracing::debug!("{} not sent on {}: {}", message.kind(), channel, e);
        } else if message.is_probe() {
            tracing::trace!("📤 {} on {}", message.kind(), channel);
        } else {
            tracing::debug!("📤 {} on {}", message.kind(), channel);
        }
    }
}

impl<T: Transport> Drop for MeshLoop<T> {
    fn drop(&mut self) {
        for channel in self.registry.drain() {
            self.transport.close(channel.id);
        }
    }
}
