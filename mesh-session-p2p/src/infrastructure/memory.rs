use crate::domain::ChannelId;
use crate::infrastructure::error::{MeshError, Result};
use crate::infrastructure::transport::{LinkState, Transport, TransportEvent};
use mesh_session_core::EndpointId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// In-process signalling hub: endpoints opened on the same network can dial
/// each other by ID. Used by tests and demos, and supports fault injection.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    hub: Arc<Mutex<Hub>>,
}

#[derive(Default)]
struct Hub {
    unavailable: bool,
    /// Last issued channel handle
    next_channel: u64,
    endpoints: HashMap<EndpointId, EndpointState>,
    /// Live links only; a link is dropped as soon as both ends know it is gone
    links: HashMap<ChannelId, Link>,
}

#[derive(Default)]
struct EndpointState {
    inbox: VecDeque<TransportEvent>,
    /// Frames to and from this endpoint are silently dropped
    unresponsive: bool,
    /// Transport is down: links are disconnected and new dials fail
    offline: bool,
}

struct Link {
    initiator: EndpointId,
    acceptor: EndpointId,
    state: LinkPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkPhase {
    Pending,
    Open,
    Disconnected,
}

impl Link {
    fn other_end(&self, id: &EndpointId) -> &EndpointId {
        if *id == self.initiator {
            &self.acceptor
        } else {
            &self.initiator
        }
    }

    fn touches(&self, id: &EndpointId) -> bool {
        self.initiator == *id || self.acceptor == *id
    }
}

impl Hub {
    fn push(&mut self, to: &EndpointId, event: TransportEvent) {
        if let Some(endpoint) = self.endpoints.get_mut(to) {
            endpoint.inbox.push_back(event);
        }
    }

    fn is_unresponsive(&self, id: &EndpointId) -> bool {
        self.endpoints
            .get(id)
            .map(|e| e.unresponsive)
            .unwrap_or(true)
    }

    /// Issued at some point and since closed
    fn is_retired(&self, channel: ChannelId) -> bool {
        channel.0 <= self.next_channel && !self.links.contains_key(&channel)
    }

    /// Move every link of `id` in phase `from` to `to`, notifying both ends
    fn transition_links(
        &mut self,
        id: &EndpointId,
        from: LinkPhase,
        to: LinkPhase,
        state: LinkState,
    ) {
        let affected: Vec<(ChannelId, EndpointId, EndpointId)> = self
            .links
            .iter_mut()
            .filter(|(_, link)| link.touches(id) && link.state == from)
            .map(|(channel, link)| {
                link.state = to;
                (*channel, link.initiator.clone(), link.acceptor.clone())
            })
            .collect();

        for (channel, initiator, acceptor) in affected {
            self.notify_both(channel, initiator, acceptor, state);
        }
    }

    /// Drop every link of `id`, reporting a terminal failure to both ends
    fn fail_links(&mut self, id: &EndpointId) {
        let failed: Vec<ChannelId> = self
            .links
            .iter()
            .filter(|(_, link)| link.touches(id))
            .map(|(channel, _)| *channel)
            .collect();

        for channel in failed {
            if let Some(link) = self.links.remove(&channel) {
                self.notify_both(channel, link.initiator, link.acceptor, LinkState::Failed);
            }
        }
    }

    fn notify_both(
        &mut self,
        channel: ChannelId,
        initiator: EndpointId,
        acceptor: EndpointId,
        state: LinkState,
    ) {
        self.push(
            &initiator,
            TransportEvent::StateChanged {
                channel,
                remote: acceptor.clone(),
                state,
            },
        );
        self.push(
            &acceptor,
            TransportEvent::StateChanged {
                channel,
                remote: initiator,
                state,
            },
        );
    }

    /// Close a link on behalf of `closer`, telling the other end
    fn close_link(&mut self, channel: ChannelId, closer: &EndpointId) {
        let Some(link) = self.links.remove(&channel) else {
            return;
        };
        let other = link.other_end(closer).clone();
        self.push(
            &other,
            TransportEvent::Closed {
                channel,
                remote: closer.clone(),
            },
        );
    }

    fn remove_endpoint(&mut self, id: &EndpointId) {
        if self.endpoints.remove(id).is_none() {
            return;
        }

        let channels: Vec<ChannelId> = self
            .links
            .iter()
            .filter(|(_, link)| link.touches(id))
            .map(|(channel, _)| *channel)
            .collect();

        for channel in channels {
            self.close_link(channel, id);
        }
        tracing::debug!("🔌 Memory endpoint {} closed", id);
    }
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn hub(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Simulate the signalling service going down (or coming back)
    pub fn set_available(&self, available: bool) {
        self.hub().unavailable = !available;
    }

    /// Open an endpoint with a freshly generated ID
    pub fn open(&self) -> Result<MemoryTransport> {
        let mut id = EndpointId::generate();
        while self.contains(&id) {
            id = EndpointId::generate();
        }
        self.open_as(id)
    }

    /// Open an endpoint under a chosen ID (handy for readable test scenarios)
    pub fn open_as(&self, id: EndpointId) -> Result<MemoryTransport> {
        let mut hub = self.hub();

        if hub.unavailable {
            return Err(MeshError::TransportUnavailable(
                "signalling service unreachable".to_string(),
            ));
        }
        if hub.endpoints.contains_key(&id) {
            return Err(MeshError::TransportUnavailable(format!(
                "endpoint ID {} is already taken",
                id
            )));
        }

        hub.endpoints.insert(id.clone(), EndpointState::default());
        tracing::debug!("🔌 Memory endpoint {} opened", id);

        Ok(MemoryTransport {
            id,
            hub: self.hub.clone(),
        })
    }

    pub fn contains(&self, id: &EndpointId) -> bool {
        self.hub().endpoints.contains_key(id)
    }

    pub fn endpoint_count(&self) -> usize {
        self.hub().endpoints.len()
    }

    /// Links that are pending, open or disconnected
    pub fn link_count(&self) -> usize {
        self.hub().links.len()
    }

    /// Take the transport of `id` down: its open links report a transient
    /// disconnect and new dials to or from it fail until [`MemoryNetwork::recover`]
    pub fn disconnect(&self, id: &EndpointId) {
        let mut hub = self.hub();
        if let Some(endpoint) = hub.endpoints.get_mut(id) {
            endpoint.offline = true;
        }
        hub.transition_links(
            id,
            LinkPhase::Open,
            LinkPhase::Disconnected,
            LinkState::Disconnected,
        );
    }

    /// Heal links previously broken with [`MemoryNetwork::disconnect`]
    pub fn recover(&self, id: &EndpointId) {
        let mut hub = self.hub();
        if let Some(endpoint) = hub.endpoints.get_mut(id) {
            endpoint.offline = false;
        }
        hub.transition_links(
            id,
            LinkPhase::Disconnected,
            LinkPhase::Open,
            LinkState::Recovered,
        );
    }

    /// Terminal failure of every link of `id`
    pub fn fail(&self, id: &EndpointId) {
        self.hub().fail_links(id);
    }

    /// Silently drop all frames to and from `id` (links still look open)
    pub fn set_unresponsive(&self, id: &EndpointId, unresponsive: bool) {
        if let Some(endpoint) = self.hub().endpoints.get_mut(id) {
            endpoint.unresponsive = unresponsive;
        }
    }

    /// Endpoint leaves the hub, closing its links
    pub fn shutdown(&self, id: &EndpointId) {
        self.hub().remove_endpoint(id);
    }

    /// Endpoint vanishes without closing anything (process crash, tab closed)
    pub fn crash(&self, id: &EndpointId) {
        self.hub().endpoints.remove(id);
        tracing::debug!("💥 Memory endpoint {} crashed", id);
    }
}

/// Endpoint on a [`MemoryNetwork`]
pub struct MemoryTransport {
    id: EndpointId,
    hub: Arc<Mutex<Hub>>,
}

impl MemoryTransport {
    fn hub(&self) -> MutexGuard<'_, Hub> {
        self.hub.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn local_id(&self) -> &EndpointId {
        &self.id
    }

    fn connect(&mut self, remote: &EndpointId) -> Result<ChannelId> {
        if *remote == self.id {
            return Err(MeshError::SelfConnect(remote.clone()));
        }

        let local = self.id.clone();
        let mut hub = self.hub();
        hub.next_channel += 1;
        let channel = ChannelId(hub.next_channel);

        let reachable = |id: &EndpointId| {
            hub.endpoints
                .get(id)
                .map(|e| !e.offline)
                .unwrap_or(false)
        };
        if !reachable(&local) || !reachable(remote) {
            hub.push(
                &local,
                TransportEvent::ConnectFailed {
                    channel,
                    remote: remote.clone(),
                    reason: format!("peer {} is unavailable", remote),
                },
            );
            return Ok(channel);
        }

        hub.links.insert(
            channel,
            Link {
                initiator: local.clone(),
                acceptor: remote.clone(),
                state: LinkPhase::Pending,
            },
        );
        hub.push(
            remote,
            TransportEvent::Incoming {
                channel,
                remote: local,
            },
        );

        Ok(channel)
    }

    fn send(&mut self, channel: ChannelId, data: Vec<u8>) -> Result<()> {
        let mut hub = self.hub();
        if hub.is_retired(channel) {
            return Err(MeshError::ChannelClosed(channel));
        }
        let link = hub
            .links
            .get(&channel)
            .ok_or(MeshError::UnknownChannel(channel))?;

        match link.state {
            LinkPhase::Open => {}
            // Frames on a broken link are lost, like on a real data channel
            LinkPhase::Disconnected => return Ok(()),
            LinkPhase::Pending => {
                return Err(MeshError::SendFailed(format!("channel {} not open", channel)))
            }
        }

        let to = link.other_end(&self.id).clone();
        if hub.is_unresponsive(&self.id) || hub.is_unresponsive(&to) {
            return Ok(());
        }

        tracing::trace!("📤 {} → {} on {} ({} bytes)", self.id, to, channel, data.len());
        hub.push(
            &to,
            TransportEvent::Message {
                channel,
                from: self.id.clone(),
                data,
            },
        );
        Ok(())
    }

    fn close(&mut self, channel: ChannelId) {
        let id = self.id.clone();
        self.hub().close_link(channel, &id);
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut hub = self.hub();
        let (queued, unresponsive): (Vec<TransportEvent>, bool) =
            match hub.endpoints.get_mut(&self.id) {
                Some(endpoint) => (endpoint.inbox.drain(..).collect(), endpoint.unresponsive),
                None => return Vec::new(),
            };

        let mut events = Vec::with_capacity(queued.len());
        for event in queued {
            match event {
                // A hung endpoint never answers the handshake
                TransportEvent::Incoming { .. } if unresponsive => {}
                TransportEvent::Incoming { channel, remote } => {
                    // Accept: open both ends, unless the dialer gave up meanwhile
                    let accepted = match hub.links.get_mut(&channel) {
                        Some(link) if link.state == LinkPhase::Pending => {
                            link.state = LinkPhase::Open;
                            true
                        }
                        _ => false,
                    };
                    if !accepted {
                        continue;
                    }

                    hub.push(
                        &remote,
                        TransportEvent::Opened {
                            channel,
                            remote: self.id.clone(),
                        },
                    );
                    events.push(TransportEvent::Incoming {
                        channel,
                        remote: remote.clone(),
                    });
                    events.push(TransportEvent::Opened { channel, remote });
                }
                other => events.push(other),
            }
        }

        events
    }
}

impl Drop for MemoryTransport {
    /// Destroying the endpoint closes all of its links
    fn drop(&mut self) {
        let id = self.id.clone();
        self.hub().remove_endpoint(&id);
    }
}
