pub mod connection;
pub mod error;
pub mod memory;
pub mod message;
pub mod transport;

pub use connection::{MatchboxTransport, SignallingConfig};
pub use memory::{MemoryNetwork, MemoryTransport};
pub use message::MeshMessage;
pub use transport::{LinkState, Transport, TransportEvent};
