//! Three sessions meshing over the in-process network, no signalling server needed.

use mesh_session_p2p::{EndpointId, MemoryNetwork, MeshConfig, MeshSession};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let network = MemoryNetwork::new();
    let names = ["alice", "bob", "carol"];
    let mut sessions = Vec::new();
    for name in names {
        let transport = network.open_as(EndpointId::parse(name)?);
        sessions.push(MeshSession::from_transport(transport, MeshConfig::default()));
    }

    let room = sessions[0].create_room().ok_or("alice is not connected")?;
    for guest in &sessions[1..] {
        guest.join_room(&room);
    }

    tokio::time::sleep(Duration::from_secs(1)).await;

    for (i, session) in sessions.iter().enumerate() {
        session.broadcast_position([i as f32, 0.0, 0.0], 0.0);
    }

    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("\n📊 Mesh state:");
    for (name, session) in names.iter().zip(&sessions) {
        let snapshot = session.snapshot();
        println!("   {}: {} peers", name, snapshot.peer_count);
        for (id, participant) in snapshot.participants.iter() {
            println!("      {} at {:?}", id, participant.position());
        }
    }

    for session in sessions {
        session.close().await;
    }
    Ok(())
}
