/// End-to-end test for the ViewData pipeline: the server frames a payload
/// for one view's virtual channel, the client decodes and applies it with
/// that view's context active

use std::cell::RefCell;
use std::rc::Rc;

use polyview_client::{ClientTransport, ClientViewManager};
use polyview_server::{ServerTransport, ServerViewManager};
use polyview_shared::{
    Avatar, EntityId, HostMessage, Rot, Vec3, ViewMessage, World, WorldId,
};

const PLAYER: EntityId = EntityId::new(1);

struct NullTransport;

impl ClientTransport for NullTransport {
    fn send(&mut self, _message: HostMessage) {}
}

#[derive(Default)]
struct RecordingTransport {
    sent: Vec<ViewMessage>,
}

impl ServerTransport for RecordingTransport {
    fn send(&mut self, message: ViewMessage) {
        self.sent.push(message);
    }
}

#[test]
fn server_framed_view_data_reaches_the_client_view() {
    let mut world = World::new(WorldId::new(0));
    world
        .spawn(Avatar::new(PLAYER, Vec3::ZERO))
        .expect("spawn player");
    let mut server = ServerViewManager::new(world, PLAYER).expect("create server");
    server
        .register_world(World::new(WorldId::new(10)))
        .expect("register world");

    let view = server
        .create_view(WorldId::new(10), Vec3::ZERO, |_, _| {})
        .expect("create view");
    let camera = server.view(view).expect("view").player();

    server.send_view_data(
        view,
        &ViewMessage::SetPosition {
            entity: camera,
            position: Vec3::new(16.0, 72.0, -16.0),
            rotation: Rot::new(45.0, 0.0),
        },
    );

    let mut transport = RecordingTransport::default();
    server.flush_packets(&mut transport);
    assert_eq!(transport.sent.len(), 2);
    let ViewMessage::ViewData { view: addressed, payload } = &transport.sent[1] else {
        panic!("expected ViewData, got {:?}", transport.sent[1]);
    };
    assert_eq!(*addressed, view);

    // Client side: the replicated camera entity already exists in the
    // view's world, so the framed SetPosition lands on it
    let mut player_world = World::new(WorldId::new(0));
    player_world
        .spawn(Avatar::new(PLAYER, Vec3::ZERO))
        .expect("spawn player");
    let mut client =
        ClientViewManager::new(player_world, PLAYER, Box::new(NullTransport)).expect("create client");
    let mut view_world = World::new(WorldId::new(10));
    view_world
        .spawn(Avatar::new(camera, Vec3::ZERO))
        .expect("spawn camera");
    client.create_view(view, view_world).expect("create view");

    client.handle_view_data(view, payload);

    let applied = client
        .view(view)
        .expect("view")
        .world()
        .expect("world")
        .get(camera)
        .expect("avatar");
    assert_eq!(applied.position, Vec3::new(16.0, 72.0, -16.0));
    assert_eq!(applied.rotation, Rot::new(45.0, 0.0));
}
