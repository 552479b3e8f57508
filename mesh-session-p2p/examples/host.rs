use mesh_session_p2p::{MeshConfig, MeshSession};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let server = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "wss://match.konnektoren.help".to_string());

    let session = MeshSession::open(MeshConfig::new(server)).await;
    if !session.is_connected() {
        eprintln!("❌ Could not open session: {:?}", session.last_error());
        return Ok(());
    }

    let Some(room) = session.create_room() else {
        eprintln!("❌ Could not create room");
        return Ok(());
    };
    println!("✅ Room created: {}", room);
    println!("📋 Share this room ID with guests!");

    // Walk in a circle, report the mesh every 5 seconds
    let mut interval = tokio::time::interval(Duration::from_millis(100));
    let mut tick_count: u32 = 0;

    loop {
        interval.tick().await;
        tick_count += 1;

        let angle = tick_count as f32 * 0.05;
        session.broadcast_position([angle.cos() * 5.0, 0.0, angle.sin() * 5.0], angle);

        if tick_count % 50 == 0 {
            let snapshot = session.snapshot();
            println!("🏠 Room {} has {} peers", room, snapshot.peer_count);
            for (id, participant) in snapshot.participants.iter() {
                println!("   {} at {:?}", id, participant.position());
            }
        }
    }
}
