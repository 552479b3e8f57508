use cucumber::{then, when};
use mesh_session_p2p::Transform;
use mesh_session_tests::MeshWorld;

#[when(expr = "{word} broadcasts position {float}, {float}, {float} with heading {float}")]
async fn broadcasts(world: &mut MeshWorld, name: String, x: f32, y: f32, z: f32, heading: f32) {
    let reached = world
        .node_mut(&name)
        .broadcast_position(Transform::new([x, y, z], heading));
    world.last_broadcast_reach = Some(reached);
}

#[when("the messages are delivered")]
async fn delivered(world: &mut MeshWorld) {
    world.tick(1);
}

#[then(expr = "the broadcast reached {int} peer(s)")]
async fn broadcast_reached(world: &mut MeshWorld, count: usize) {
    assert_eq!(world.last_broadcast_reach, Some(count));
}

#[then(expr = "{word} sees {word} at {float}, {float}, {float} with heading {float}")]
async fn sees_at(
    world: &mut MeshWorld,
    observer: String,
    peer: String,
    x: f32,
    y: f32,
    z: f32,
    heading: f32,
) {
    let participants = world.node(&observer).participants();
    let participant = participants
        .get(&MeshWorld::id(&peer))
        .unwrap_or_else(|| panic!("{} does not see {}", observer, peer));

    assert_eq!(participant.position(), [x, y, z]);
    assert_eq!(participant.heading(), heading);
}

#[then(expr = "{word} sees {word}")]
async fn sees(world: &mut MeshWorld, observer: String, peer: String) {
    assert!(world
        .node(&observer)
        .participants()
        .contains(&MeshWorld::id(&peer)));
}

#[then(expr = "{word} does not see {word}")]
async fn does_not_see(world: &mut MeshWorld, observer: String, peer: String) {
    assert!(!world
        .node(&observer)
        .participants()
        .contains(&MeshWorld::id(&peer)));
}
