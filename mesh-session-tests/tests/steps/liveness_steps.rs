use cucumber::{given, then, when};
use instant::Duration;
use mesh_session_tests::MeshWorld;

#[given(expr = "a grace period of {int} ms")]
async fn grace_period(world: &mut MeshWorld, ms: u64) {
    world.liveness.grace_period = Duration::from_millis(ms);
}

#[when(expr = "the transport of {word} reports disconnected")]
async fn transport_disconnected(world: &mut MeshWorld, name: String) {
    world.network.disconnect(&MeshWorld::id(&name));
}

#[when(expr = "the transport of {word} recovers")]
async fn transport_recovers(world: &mut MeshWorld, name: String) {
    world.network.recover(&MeshWorld::id(&name));
}

#[when(expr = "the channels of {word} fail")]
async fn channels_fail(world: &mut MeshWorld, name: String) {
    world.network.fail(&MeshWorld::id(&name));
}

#[when(expr = "{int} ms pass")]
async fn time_passes(world: &mut MeshWorld, ms: u64) {
    world.advance(Duration::from_millis(ms));
}

#[then(expr = "{word} is not connected to {word}")]
async fn not_connected(world: &mut MeshWorld, name: String, peer: String) {
    assert!(!world
        .node(&name)
        .registry()
        .is_open(&MeshWorld::id(&peer)));
}

#[then(expr = "{word} still holds its channel to {word}")]
async fn still_holds(world: &mut MeshWorld, name: String, peer: String) {
    assert!(world
        .node(&name)
        .registry()
        .get(&MeshWorld::id(&peer))
        .is_some());
}

#[then(expr = "{word} will try to reach {word} again")]
async fn will_retry(world: &mut MeshWorld, name: String, peer: String) {
    assert!(world
        .node(&name)
        .liveness()
        .is_candidate(&MeshWorld::id(&peer)));
}

#[then(expr = "{word} gave up on {word}")]
async fn gave_up(world: &mut MeshWorld, name: String, peer: String) {
    assert!(!world
        .node(&name)
        .liveness()
        .is_candidate(&MeshWorld::id(&peer)));
}
