use mesh_session_p2p::{EndpointId, MeshConfig, MeshSession, RoomState};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let room = std::env::args()
        .nth(1)
        .expect("Usage: cargo run --example guest <room_id> [signalling_server]");
    let room = EndpointId::parse(&room)?;
    let server = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "wss://match.konnektoren.help".to_string());

    let session = MeshSession::open(MeshConfig::new(server)).await;
    if !session.is_connected() {
        eprintln!("❌ Could not open session: {:?}", session.last_error());
        return Ok(());
    }

    println!("🚪 Joining room {}", room);
    session.join_room(&room);

    let mut updates = session.subscribe().ok_or("session closed")?;
    let joined = matches!(
        tokio::time::timeout(
            Duration::from_secs(30),
            updates.wait_for(|s| matches!(s.room_state, RoomState::Member { .. })),
        )
        .await,
        Ok(Ok(_))
    );
    if !joined {
        eprintln!("❌ Timeout: never joined {}", room);
        session.close().await;
        return Ok(());
    }
    println!("✅ Joined room {}", room);

    let mut interval = tokio::time::interval(Duration::from_millis(100));
    let mut tick_count: u32 = 0;

    loop {
        interval.tick().await;
        tick_count += 1;

        session.broadcast_position([tick_count as f32 * 0.1, 0.0, 0.0], 0.0);

        if tick_count % 50 == 0 {
            let snapshot = session.snapshot();
            println!(
                "📡 {} peers, {} participants",
                snapshot.peer_count,
                snapshot.participants.len()
            );
        }
    }
}
