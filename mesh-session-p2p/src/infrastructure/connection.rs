use crate::domain::{ChannelId, IceServer};
use crate::infrastructure::error::{MeshError, Result};
use crate::infrastructure::transport::{LinkState, Transport, TransportEvent};
use instant::Duration;
use matchbox_socket::{
    PeerId as SocketPeerId, PeerState, RtcIceServerConfig, WebRtcSocket, WebRtcSocketBuilder,
};
use mesh_session_core::EndpointId;
use std::collections::HashMap;
use tracing::Instrument;

/// Where and how to reach the matchbox signalling server
#[derive(Debug, Clone)]
pub struct SignallingConfig {
    /// e.g. `wss://match.example.com`
    pub server: String,
    /// Prefix of the per-endpoint inbox rooms
    pub namespace: String,
    pub ice_servers: Vec<IceServer>,
    /// How long `open` waits for the server to assign a socket id
    pub open_timeout: Duration,
}

impl SignallingConfig {
    /// Room every endpoint listens in, and which dialers join to reach it
    pub fn inbox_room(&self, id: &EndpointId) -> String {
        format!(
            "{}/{}-{}",
            self.server.trim_end_matches('/'),
            self.namespace,
            id
        )
    }
}

/// Frames exchanged on the matchbox data channel.
///
/// Matchbox only knows anonymous socket ids, so both sides introduce
/// themselves with `Hello` before any payload flows.
#[derive(Debug, Clone, PartialEq)]
enum Frame {
    Hello(EndpointId),
    Data(Vec<u8>),
    Bye,
}

const FRAME_HELLO: u8 = 0;
const FRAME_DATA: u8 = 1;
const FRAME_BYE: u8 = 2;

impl Frame {
    fn encode(&self) -> Box<[u8]> {
        let mut bytes = Vec::new();
        match self {
            Frame::Hello(id) => {
                bytes.push(FRAME_HELLO);
                bytes.extend_from_slice(id.as_str().as_bytes());
            }
            Frame::Data(payload) => {
                bytes.push(FRAME_DATA);
                bytes.extend_from_slice(payload);
            }
            Frame::Bye => bytes.push(FRAME_BYE),
        }
        bytes.into_boxed_slice()
    }

    fn decode(packet: &[u8]) -> Option<Self> {
        let (&tag, rest) = packet.split_first()?;
        match tag {
            FRAME_HELLO => {
                let id = std::str::from_utf8(rest).ok()?;
                EndpointId::parse(id).ok().map(Frame::Hello)
            }
            FRAME_DATA => Some(Frame::Data(rest.to_vec())),
            FRAME_BYE => Some(Frame::Bye),
            _ => None,
        }
    }
}

/// Socket we opened in a remote's inbox room
struct OutboundLink {
    socket: WebRtcSocket,
    remote: EndpointId,
    /// Socket id of the inbox owner, known once its `Hello` arrives
    owner: Option<SocketPeerId>,
}

/// Remote that joined our inbox room and introduced itself
struct InboundLink {
    peer: SocketPeerId,
    remote: EndpointId,
}

/// Infrastructure adapter: WebRTC channels via a Matchbox signalling server.
///
/// Each endpoint listens in its own inbox room. Dialing a remote opens a
/// second socket inside the remote's inbox room; the `Hello` handshake tells
/// the owner apart from other dialers sitting in the same room.
pub struct MatchboxTransport {
    config: SignallingConfig,
    local_id: EndpointId,
    inbox: WebRtcSocket,
    outbound: HashMap<ChannelId, OutboundLink>,
    inbound: HashMap<ChannelId, InboundLink>,
    next_channel: u64,
    events: Vec<TransportEvent>,
}

impl MatchboxTransport {
    /// Open an endpoint under a freshly generated identity
    pub async fn open(config: SignallingConfig) -> Result<Self> {
        Self::open_as(EndpointId::generate(), config).await
    }

    /// Open an endpoint under a chosen identity
    pub async fn open_as(local_id: EndpointId, config: SignallingConfig) -> Result<Self> {
        tracing::info!("Connecting to signalling server: {}", config.server);
        tracing::info!("Configured with {} ICE servers", config.ice_servers.len());

        for (i, server) in config.ice_servers.iter().enumerate() {
            if server.requires_auth() {
                tracing::info!(
                    "  ICE Server {}: {} (with auth)",
                    i + 1,
                    server.urls.join(", ")
                );
            } else {
                tracing::info!("  ICE Server {}: {}", i + 1, server.urls.join(", "));
            }
        }

        let mut inbox = build_socket(&config.inbox_room(&local_id), &config.ice_servers);
        wait_for_socket_id(&mut inbox, config.open_timeout).await?;

        tracing::info!("✅ Endpoint {} listening", local_id);

        Ok(Self {
            config,
            local_id,
            inbox,
            outbound: HashMap::new(),
            inbound: HashMap::new(),
            next_channel: 0,
            events: Vec::new(),
        })
    }

    fn allocate_channel(&mut self) -> ChannelId {
        self.next_channel += 1;
        ChannelId(self.next_channel)
    }

    fn poll_inbox(&mut self) {
        for (peer, state) in self.inbox.update_peers() {
            match state {
                PeerState::Connected => {
                    tracing::debug!("Socket {} joined our inbox", peer);
                    send_frame(&mut self.inbox, peer, &Frame::Hello(self.local_id.clone()));
                }
                PeerState::Disconnected => {
                    if let Some((&channel, link)) =
                        self.inbound.iter().find(|(_, link)| link.peer == peer)
                    {
                        self.events.push(TransportEvent::StateChanged {
                            channel,
                            remote: link.remote.clone(),
                            state: LinkState::Disconnected,
                        });
                    }
                }
            }
        }

        let packets = self.inbox.channel_mut(0).receive();
        for (peer, packet) in packets {
            let Some(frame) = Frame::decode(&packet) else {
                tracing::warn!("Dropping malformed frame from socket {}", peer);
                continue;
            };

            let existing = self
                .inbound
                .iter()
                .find(|(_, link)| link.peer == peer)
                .map(|(&channel, link)| (channel, link.remote.clone()));

            match (frame, existing) {
                (Frame::Hello(remote), None) => {
                    if remote == self.local_id {
                        continue;
                    }
                    let channel = self.allocate_channel();
                    tracing::debug!("📥 Incoming channel {} from {}", channel, remote);
                    self.inbound.insert(
                        channel,
                        InboundLink {
                            peer,
                            remote: remote.clone(),
                        },
                    );
                    self.events.push(TransportEvent::Incoming {
                        channel,
                        remote: remote.clone(),
                    });
                    self.events.push(TransportEvent::Opened { channel, remote });
                }
                (Frame::Data(data), Some((channel, from))) => {
                    self.events
                        .push(TransportEvent::Message { channel, from, data });
                }
                (Frame::Bye, Some((channel, remote))) => {
                    self.inbound.remove(&channel);
                    self.events.push(TransportEvent::Closed { channel, remote });
                }
                (frame, _) => {
                    tracing::trace!("Ignoring {:?} from socket {}", frame, peer);
                }
            }
        }
    }

    fn poll_outbound(&mut self) {
        let mut closed = Vec::new();

        for (&channel, link) in self.outbound.iter_mut() {
            for (peer, state) in link.socket.update_peers() {
                match state {
                    PeerState::Connected => {
                        send_frame(&mut link.socket, peer, &Frame::Hello(self.local_id.clone()));
                    }
                    PeerState::Disconnected if link.owner == Some(peer) => {
                        self.events.push(TransportEvent::StateChanged {
                            channel,
                            remote: link.remote.clone(),
                            state: LinkState::Disconnected,
                        });
                    }
                    PeerState::Disconnected => {}
                }
            }

            let packets = link.socket.channel_mut(0).receive();
            for (peer, packet) in packets {
                match Frame::decode(&packet) {
                    Some(Frame::Hello(id)) if id == link.remote && link.owner.is_none() => {
                        link.owner = Some(peer);
                        self.events.push(TransportEvent::Opened {
                            channel,
                            remote: link.remote.clone(),
                        });
                    }
                    Some(Frame::Data(data)) if link.owner == Some(peer) => {
                        self.events.push(TransportEvent::Message {
                            channel,
                            from: link.remote.clone(),
                            data,
                        });
                    }
                    Some(Frame::Bye) if link.owner == Some(peer) => {
                        closed.push(channel);
                        self.events.push(TransportEvent::Closed {
                            channel,
                            remote: link.remote.clone(),
                        });
                    }
                    // Other dialers share the inbox room; they are not our remote
                    _ => {}
                }
            }
        }

        for channel in closed {
            self.outbound.remove(&channel);
        }
    }
}

impl Transport for MatchboxTransport {
    fn local_id(&self) -> &EndpointId {
        &self.local_id
    }

    fn connect(&mut self, remote: &EndpointId) -> Result<ChannelId> {
        if *remote == self.local_id {
            return Err(MeshError::SelfConnect(remote.clone()));
        }

        let channel = self.allocate_channel();
        let room = self.config.inbox_room(remote);
        tracing::debug!("📞 Dialing {} via {} on {}", remote, room, channel);

        self.outbound.insert(
            channel,
            OutboundLink {
                socket: build_socket(&room, &self.config.ice_servers),
                remote: remote.clone(),
                owner: None,
            },
        );

        Ok(channel)
    }

    fn send(&mut self, channel: ChannelId, data: Vec<u8>) -> Result<()> {
        let frame = Frame::Data(data);

        if let Some(link) = self.outbound.get_mut(&channel) {
            let owner = link.owner.ok_or_else(|| {
                MeshError::SendFailed(format!("channel {} not open", channel))
            })?;
            send_frame(&mut link.socket, owner, &frame);
            return Ok(());
        }

        if let Some(link) = self.inbound.get(&channel) {
            send_frame(&mut self.inbox, link.peer, &frame);
            return Ok(());
        }

        Err(MeshError::UnknownChannel(channel))
    }

    fn close(&mut self, channel: ChannelId) {
        if let Some(mut link) = self.outbound.remove(&channel) {
            if let Some(owner) = link.owner {
                send_frame(&mut link.socket, owner, &Frame::Bye);
            }
            // Dropping the socket ends its message loop
            return;
        }

        if let Some(link) = self.inbound.remove(&channel) {
            send_frame(&mut self.inbox, link.peer, &Frame::Bye);
        }
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.poll_inbox();
        self.poll_outbound();
        std::mem::take(&mut self.events)
    }
}

fn send_frame(socket: &mut WebRtcSocket, peer: SocketPeerId, frame: &Frame) {
    socket.channel_mut(0).send(frame.encode(), peer);
}

/// Build a socket for `room_url` and spawn its message loop
fn build_socket(room_url: &str, ice_servers: &[IceServer]) -> WebRtcSocket {
    let (socket, loop_fut) = WebRtcSocketBuilder::new(room_url)
        .ice_server(build_ice_server_config(ice_servers))
        .add_channel(matchbox_socket::ChannelConfig::reliable())
        .build();

    let matchbox_span = tracing::info_span!("matchbox::webrtc_loop", room = room_url);

    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_futures::spawn_local(
        async move {
            let _ = loop_fut.await;
        }
        .instrument(matchbox_span),
    );

    #[cfg(not(target_arch = "wasm32"))]
    {
        #[cfg(feature = "native")]
        tokio::spawn(
            async move {
                let _ = loop_fut.await;
            }
            .instrument(matchbox_span),
        );

        #[cfg(not(feature = "native"))]
        compile_error!("Non-WASM builds require the 'native' feature to be enabled");
    }

    socket
}

/// Build ICE server configuration for Matchbox
fn build_ice_server_config(ice_servers: &[IceServer]) -> RtcIceServerConfig {
    // Matchbox takes a single ICE server entry
    let Some(first) = ice_servers.first() else {
        return RtcIceServerConfig::default();
    };

    RtcIceServerConfig {
        urls: first.urls.clone(),
        username: first.username.clone(),
        credential: first.credential.clone(),
    }
}

/// Wait until the signalling server assigned the socket an id
async fn wait_for_socket_id(socket: &mut WebRtcSocket, timeout: Duration) -> Result<()> {
    let start = instant::Instant::now();

    loop {
        socket.update_peers();

        if socket.id().is_some() {
            return Ok(());
        }

        if start.elapsed() > timeout {
            return Err(MeshError::TransportUnavailable(
                "Timeout waiting for signalling server".to_string(),
            ));
        }

        platform_sleep(10).await;
    }
}

/// Platform-agnostic sleep function
#[cfg(target_arch = "wasm32")]
async fn platform_sleep(millis: u32) {
    use gloo_timers::future::TimeoutFuture;
    TimeoutFuture::new(millis).await;
}

#[cfg(not(target_arch = "wasm32"))]
async fn platform_sleep(millis: u32) {
    #[cfg(feature = "native")]
    tokio::time::sleep(Duration::from_millis(millis as u64)).await;

    #[cfg(not(feature = "native"))]
    compile_error!("Non-WASM builds require the 'native' feature to be enabled");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SignallingConfig {
        SignallingConfig {
            server: "ws://localhost:3536/".to_string(),
            namespace: "mesh".to_string(),
            ice_servers: IceServer::default_stun_servers(),
            open_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_inbox_room_url() {
        let id = EndpointId::parse("k7m2xq9a").unwrap();
        assert_eq!(config().inbox_room(&id), "ws://localhost:3536/mesh-k7m2xq9a");
    }

    #[test]
    fn test_frame_decoding() {
        let id = EndpointId::parse("alice").unwrap();
        assert_eq!(
            Frame::decode(&Frame::Hello(id.clone()).encode()),
            Some(Frame::Hello(id))
        );
        assert_eq!(Frame::decode(&[FRAME_BYE]), Some(Frame::Bye));
        assert_eq!(
            Frame::decode(&[FRAME_DATA, b'{', b'}']),
            Some(Frame::Data(b"{}".to_vec()))
        );
    }

    #[test]
    fn test_malformed_frames_rejected() {
        assert_eq!(Frame::decode(&[]), None);
        assert_eq!(Frame::decode(&[42, 1, 2]), None);
        // Hello without an identity
        assert_eq!(Frame::decode(&[FRAME_HELLO]), None);
    }

    #[test]
    fn test_build_ice_server_config_stun_only() {
        let servers = vec![IceServer::stun("stun:stun.l.google.com:19302")];

        let config = build_ice_server_config(&servers);
        assert_eq!(config.urls, vec!["stun:stun.l.google.com:19302"]);
        assert!(config.username.is_none());
        assert!(config.credential.is_none());
    }

    #[test]
    fn test_build_ice_server_config_with_turn() {
        let servers = vec![IceServer::turn(
            "turn:turn.example.com:3478",
            "user",
            "pass",
        )];

        let config = build_ice_server_config(&servers);
        assert_eq!(config.urls, vec!["turn:turn.example.com:3478"]);
        assert_eq!(config.username, Some("user".to_string()));
        assert_eq!(config.credential, Some("pass".to_string()));
    }

    #[test]
    fn test_build_ice_server_config_empty() {
        let config = build_ice_server_config(&[]);
        assert!(!config.urls.is_empty());
    }
}
