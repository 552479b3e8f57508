use cucumber::{given, then, when};
use mesh_session_core::RoomState;
use mesh_session_tests::{parse_names, MeshWorld};

// ===== Given Steps =====

#[given(regex = r"^endpoints? (.+) (?:is|are) open$")]
async fn endpoints_open(world: &mut MeshWorld, list: String) {
    for name in parse_names(&list) {
        world.open(&name);
    }
}

fn create(world: &mut MeshWorld, name: &str) {
    let room = world.node_mut(name).create_room().unwrap();
    assert_eq!(room, MeshWorld::id(name));
}

fn join(world: &mut MeshWorld, guest: &str, host: &str) {
    let now = world.now;
    world
        .node_mut(guest)
        .join_room_at(&MeshWorld::id(host), now)
        .unwrap();
}

fn connect(world: &mut MeshWorld, from: &str, to: &str) {
    let now = world.now;
    world.node_mut(from).connect_at(&MeshWorld::id(to), now);
}

#[given(expr = "{word} has created a room")]
async fn has_created_room(world: &mut MeshWorld, name: String) {
    create(world, &name);
}

#[given(expr = "{word} has joined the room of {word}")]
async fn has_joined(world: &mut MeshWorld, guest: String, host: String) {
    join(world, &guest, &host);
    world.settle();
}

// ===== When Steps =====

#[when(expr = "{word} creates a room")]
async fn create_room(world: &mut MeshWorld, name: String) {
    create(world, &name);
}

#[when(expr = "{word} joins the room of {word}")]
async fn joins_room(world: &mut MeshWorld, guest: String, host: String) {
    join(world, &guest, &host);
}

#[when(expr = "{word} connects to {word}")]
async fn connects_to(world: &mut MeshWorld, from: String, to: String) {
    connect(world, &from, &to);
}

#[when(expr = "{word} and {word} connect to each other in the same tick")]
async fn connect_each_other(world: &mut MeshWorld, a: String, b: String) {
    connect(world, &a, &b);
    connect(world, &b, &a);
    world.tick(1);
}

#[when(expr = "{word} leaves the room")]
async fn leaves_room(world: &mut MeshWorld, name: String) {
    world.node_mut(&name).leave_room();
}

#[when("the mesh settles")]
async fn mesh_settles(world: &mut MeshWorld) {
    world.settle();
}

// ===== Then Steps =====

#[then(regex = r"^(\w+) is connected to (.+)$")]
async fn connected_to(world: &mut MeshWorld, name: String, list: String) {
    let mut expected: Vec<_> = parse_names(&list).iter().map(|n| MeshWorld::id(n)).collect();
    expected.sort();

    assert_eq!(world.peers_of(&name), expected, "registry of {}", name);
    for peer in &expected {
        assert!(
            world.node(&name).registry().is_open(peer),
            "{} should have an open channel to {}",
            name,
            peer
        );
    }
}

#[then(expr = "{word} has no connections")]
async fn no_connections(world: &mut MeshWorld, name: String) {
    assert!(world.node(&name).registry().is_empty());
}

#[then(expr = "every endpoint has {int} open channels")]
async fn every_endpoint_has(world: &mut MeshWorld, count: usize) {
    for (name, node) in &world.nodes {
        assert_eq!(node.connected_peers().len(), count, "open channels of {}", name);
        assert_eq!(node.registry().len(), count, "registry of {}", name);
    }
}

#[then(expr = "{word} and {word} share exactly one open channel")]
async fn share_one_channel(world: &mut MeshWorld, a: String, b: String) {
    let ab = world.node(&a).registry().get(&MeshWorld::id(&b));
    let ba = world.node(&b).registry().get(&MeshWorld::id(&a));

    let (ab, ba) = match (ab, ba) {
        (Some(ab), Some(ba)) => (ab, ba),
        other => panic!("missing channel between {} and {}: {:?}", a, b, other),
    };
    assert!(ab.is_open() && ba.is_open());
    assert_eq!(ab.id, ba.id);
}

#[then(expr = "{word} is a member of the room of {word}")]
async fn is_member(world: &mut MeshWorld, name: String, host: String) {
    assert_eq!(
        *world.node(&name).room_state(),
        RoomState::Member {
            room: MeshWorld::id(&host)
        }
    );
}

#[then(expr = "{word} is hosting")]
async fn is_hosting(world: &mut MeshWorld, name: String) {
    assert_eq!(*world.node(&name).room_state(), RoomState::Hosting);
}

#[then(expr = "{word} has left")]
async fn has_left(world: &mut MeshWorld, name: String) {
    let node = world.node(&name);
    assert_eq!(*node.room_state(), RoomState::Left);
    assert!(node.room_id().is_none());
}

#[then(expr = "{word} has no participants and no pending peers")]
async fn nothing_left(world: &mut MeshWorld, name: String) {
    let node = world.node(&name);
    assert!(node.participants().is_empty());
    assert!(node.pending_peers().is_empty());
}

#[then(expr = "{word} never registered itself")]
async fn never_registered_self(world: &mut MeshWorld, name: String) {
    assert!(world
        .node(&name)
        .registry()
        .get(&MeshWorld::id(&name))
        .is_none());
}
