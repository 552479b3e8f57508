use crate::domain::ChannelId;
use crate::infrastructure::error::Result;
use mesh_session_core::EndpointId;

/// Low-level link state changes reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Transient: the link may heal on its own
    Disconnected,
    /// A previously disconnected link is healthy again
    Recovered,
    /// Terminal: the peer is considered gone
    Failed,
}

/// Events emitted by a transport, drained by the mesh loop
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A remote dialed us; an `Opened` for the same channel follows
    Incoming {
        channel: ChannelId,
        remote: EndpointId,
    },
    /// Channel is ready for traffic on our side
    Opened {
        channel: ChannelId,
        remote: EndpointId,
    },
    /// Channel closed by the remote (or by the transport on its behalf)
    Closed {
        channel: ChannelId,
        remote: EndpointId,
    },
    StateChanged {
        channel: ChannelId,
        remote: EndpointId,
        state: LinkState,
    },
    /// An outbound connect could not be established
    ConnectFailed {
        channel: ChannelId,
        remote: EndpointId,
        reason: String,
    },
    Message {
        channel: ChannelId,
        from: EndpointId,
        data: Vec<u8>,
    },
    /// Endpoint-level error not tied to a channel
    Error(String),
}

/// Identity & transport endpoint (allows mocking in tests).
///
/// Implementations are poll-driven: nothing is delivered until `poll_events`
/// is called, which keeps every state mutation on the caller's thread.
pub trait Transport {
    /// Identity assigned when the endpoint was opened
    fn local_id(&self) -> &EndpointId;

    /// Start an outbound channel to `remote`. Completion arrives later as
    /// `Opened` or `ConnectFailed`.
    fn connect(&mut self, remote: &EndpointId) -> Result<ChannelId>;

    /// Send a frame on an open channel
    fn send(&mut self, channel: ChannelId, data: Vec<u8>) -> Result<()>;

    /// Close a channel (no-op if already closed)
    fn close(&mut self, channel: ChannelId);

    /// Drain pending events
    fn poll_events(&mut self) -> Vec<TransportEvent>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn local_id(&self) -> &EndpointId {
        (**self).local_id()
    }

    fn connect(&mut self, remote: &EndpointId) -> Result<ChannelId> {
        (**self).connect(remote)
    }

    fn send(&mut self, channel: ChannelId, data: Vec<u8>) -> Result<()> {
        (**self).send(channel, data)
    }

    fn close(&mut self, channel: ChannelId) {
        (**self).close(channel)
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        (**self).poll_events()
    }
}
