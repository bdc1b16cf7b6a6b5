/// End-to-end tests for the optimistic main-view switch protocol, the
/// with_view context switch, and virtual channel delivery

use std::cell::RefCell;
use std::rc::Rc;

use polyview_client::{ClientTransport, ClientViewManager};
use polyview_shared::{
    encode_frame, Avatar, ByteWriter, EntityId, HostMessage, Rot, Serde, Vec3, ViewError, ViewId,
    ViewMessage, World, WorldId,
};

const PLAYER: EntityId = EntityId::new(1);
// Camera avatars are allocated sequentially from the client-side id range.
const CAMERA_0: EntityId = EntityId::new(0x0100_0000);
const CAMERA_1: EntityId = EntityId::new(0x0100_0001);

struct RecordingTransport {
    sent: Rc<RefCell<Vec<HostMessage>>>,
}

impl ClientTransport for RecordingTransport {
    fn send(&mut self, message: HostMessage) {
        self.sent.borrow_mut().push(message);
    }
}

fn manager_at(position: Vec3) -> (ClientViewManager, Rc<RefCell<Vec<HostMessage>>>) {
    let mut world = World::new(WorldId::new(0));
    world
        .spawn(Avatar::new(PLAYER, position))
        .expect("spawn player");
    let sent = Rc::new(RefCell::new(Vec::new()));
    let transport = Box::new(RecordingTransport { sent: sent.clone() });
    let manager = ClientViewManager::new(world, PLAYER, transport).expect("create manager");
    (manager, sent)
}

fn framed(message: &ViewMessage) -> Vec<u8> {
    let mut writer = ByteWriter::new();
    message.ser(&mut writer);
    let mut out = Vec::new();
    encode_frame(&writer.to_bytes(), &mut out);
    out
}

#[test]
fn optimistic_switch_then_matching_ack() {
    let (mut manager, sent) = manager_at(Vec3::new(0.0, 5.0, 0.0));
    let main = manager.main_view();
    let other = ViewId::new(1);
    manager
        .create_view(other, World::new(WorldId::new(10)))
        .expect("create view");

    manager.request_main_view_switch(other).expect("switch");

    // The outgoing main's authoritative position went out first
    assert_eq!(
        sent.borrow().as_slice(),
        &[HostMessage::PositionCorrection {
            position: Vec3::new(0.0, 5.0, 0.0),
            rotation: Rot::default(),
            on_ground: true,
        }]
    );

    // Locally the switch already happened; the server has not confirmed
    assert_eq!(manager.main_view(), other);
    assert_eq!(manager.active_view(), other);
    assert_eq!(manager.server_main_view(), main);
    assert_eq!(manager.switch_queue().len(), 1);

    // The player avatar traded places with the view's camera
    let new_main = manager.view(other).expect("view");
    assert_eq!(new_main.player(), Some(PLAYER));
    let player = new_main.world().expect("world").get(PLAYER).expect("avatar");
    assert_eq!(player.position, Vec3::ZERO);
    let old_main = manager.view(main).expect("view");
    assert_eq!(old_main.player(), Some(CAMERA_0));
    let camera = old_main
        .world()
        .expect("world")
        .get(CAMERA_0)
        .expect("avatar");
    assert_eq!(camera.position, Vec3::new(0.0, 5.0, 0.0));

    manager.acknowledge_main_view_switch(other).expect("ack");

    // Queue drained and the live transport handed over
    assert!(manager.switch_queue().is_empty());
    assert_eq!(manager.server_main_view(), other);
    assert!(manager.view(other).expect("view").has_transport());
    assert!(manager.view(main).expect("view").has_virtual_channel());
    assert_eq!(manager.main_view(), other);
}

#[test]
fn mismatched_ack_rewinds_then_applies_server_choice() {
    let (mut manager, sent) = manager_at(Vec3::new(1.0, 2.0, 3.0));
    let main = manager.main_view();
    let speculative = ViewId::new(1);
    let chosen = ViewId::new(2);
    manager
        .create_view(speculative, World::new(WorldId::new(10)))
        .expect("create view");
    manager
        .create_view(chosen, World::new(WorldId::new(20)))
        .expect("create view");

    manager.request_main_view_switch(speculative).expect("switch");

    // Speculative player movement in the optimistically promoted view
    manager
        .world_mut(speculative)
        .expect("world")
        .get_mut(PLAYER)
        .expect("avatar")
        .position = Vec3::new(50.0, 0.0, 50.0);

    // The server committed a different transition instead
    manager.acknowledge_main_view_switch(chosen).expect("ack");

    assert_eq!(manager.main_view(), chosen);
    assert_eq!(manager.server_main_view(), chosen);
    assert!(manager.switch_queue().is_empty());

    // End state matches a direct switch to the server's choice: the player
    // stands in the chosen view's world, its camera stands where the player
    // authoritatively was.
    let new_main = manager.view(chosen).expect("view");
    assert_eq!(new_main.player(), Some(PLAYER));
    assert_eq!(
        new_main
            .world()
            .expect("world")
            .get(PLAYER)
            .expect("avatar")
            .position,
        Vec3::ZERO
    );
    let old_main = manager.view(main).expect("view");
    assert_eq!(
        old_main
            .world()
            .expect("world")
            .get(CAMERA_1)
            .expect("avatar")
            .position,
        Vec3::new(1.0, 2.0, 3.0)
    );

    // The rewound view kept its camera; the speculative movement was
    // discarded in favor of the recorded authoritative position.
    let rewound = manager.view(speculative).expect("view");
    assert_eq!(rewound.player(), Some(CAMERA_0));
    assert_eq!(
        rewound
            .world()
            .expect("world")
            .get(CAMERA_0)
            .expect("avatar")
            .position,
        Vec3::new(1.0, 2.0, 3.0)
    );

    // Only the original request produced outbound traffic
    assert_eq!(sent.borrow().len(), 1);
    assert!(manager.view(chosen).expect("view").has_transport());
}

#[test]
fn rewind_inside_with_view_collapses_the_frame() {
    let (mut manager, _sent) = manager_at(Vec3::new(1.0, 2.0, 3.0));
    let old_main = manager.main_view();
    let speculative = ViewId::new(1);
    let chosen = ViewId::new(2);
    manager
        .create_view(speculative, World::new(WorldId::new(10)))
        .expect("create view");
    manager
        .create_view(chosen, World::new(WorldId::new(20)))
        .expect("create view");

    manager.request_main_view_switch(speculative).expect("switch");
    assert_eq!(manager.server_main_view(), old_main);

    // A pre-empting ack arrives while processing inbound data, i.e. inside
    // a frame for the view the server still considers main. The rewind
    // collapses that frame; it must not restore on the way out.
    manager
        .with_view(old_main, |inner| {
            inner.acknowledge_main_view_switch(chosen).expect("ack");
        })
        .expect("with_view");

    assert_eq!(manager.main_view(), chosen);
    assert_eq!(manager.active_view(), chosen);
    assert_eq!(manager.server_main_view(), chosen);
    assert_eq!(manager.engine_context().world, Some(WorldId::new(20)));
    assert_eq!(manager.engine_context().player, Some(PLAYER));

    // The stack really is empty again: operations gated on depth == 0 and
    // active == main work immediately
    manager.request_main_view_switch(speculative).expect("switch");
    assert_eq!(manager.main_view(), speculative);
}

#[test]
fn chained_switches_acknowledged_in_order() {
    let (mut manager, _sent) = manager_at(Vec3::ZERO);
    let first = ViewId::new(1);
    let second = ViewId::new(2);
    manager
        .create_view(first, World::new(WorldId::new(10)))
        .expect("create view");
    manager
        .create_view(second, World::new(WorldId::new(20)))
        .expect("create view");

    manager.request_main_view_switch(first).expect("switch");
    manager.request_main_view_switch(second).expect("switch");
    assert_eq!(manager.switch_queue().len(), 2);
    assert_eq!(manager.main_view(), second);

    manager.acknowledge_main_view_switch(first).expect("ack");
    assert_eq!(manager.switch_queue().len(), 1);
    assert_eq!(manager.server_main_view(), first);
    assert_eq!(manager.main_view(), second);

    manager.acknowledge_main_view_switch(second).expect("ack");
    assert!(manager.switch_queue().is_empty());
    assert_eq!(manager.server_main_view(), second);
    assert!(manager.view(second).expect("view").has_transport());
}

#[test]
fn with_view_installs_and_restores_context() {
    let (mut manager, _sent) = manager_at(Vec3::ZERO);
    let main = manager.main_view();
    let other = ViewId::new(1);
    manager
        .create_view(other, World::new(WorldId::new(10)))
        .expect("create view");

    manager.engine_context_mut().camera_position = Vec3::new(9.0, 9.0, 9.0);

    manager
        .with_view(other, |inner| {
            assert_eq!(inner.active_view(), other);
            assert_eq!(inner.engine_context().world, Some(WorldId::new(10)));
            assert_eq!(inner.engine_context().player, Some(CAMERA_0));
            inner.engine_context_mut().camera_position = Vec3::new(3.0, 3.0, 3.0);
        })
        .expect("with_view");

    // Back on the main view, with its context intact
    assert_eq!(manager.active_view(), main);
    assert_eq!(
        manager.engine_context().camera_position,
        Vec3::new(9.0, 9.0, 9.0)
    );

    // The nested view's context changes persisted across deactivation
    manager
        .with_view(other, |inner| {
            assert_eq!(
                inner.engine_context().camera_position,
                Vec3::new(3.0, 3.0, 3.0)
            );
        })
        .expect("with_view");
}

#[test]
fn with_view_nests_and_reenters() {
    let (mut manager, _sent) = manager_at(Vec3::ZERO);
    let main = manager.main_view();
    let first = ViewId::new(1);
    let second = ViewId::new(2);
    manager
        .create_view(first, World::new(WorldId::new(10)))
        .expect("create view");
    manager
        .create_view(second, World::new(WorldId::new(20)))
        .expect("create view");

    manager
        .with_view(first, |inner| {
            inner
                .with_view(second, |innermost| {
                    assert_eq!(innermost.active_view(), second);
                    // Re-entering the already-active view takes the fast path
                    innermost
                        .with_view(second, |same| {
                            assert_eq!(same.active_view(), second);
                        })
                        .expect("with_view");
                })
                .expect("with_view");
            assert_eq!(inner.active_view(), first);
        })
        .expect("with_view");
    assert_eq!(manager.active_view(), main);
}

#[test]
fn main_view_cannot_change_inside_with_view() {
    let (mut manager, _sent) = manager_at(Vec3::ZERO);
    let first = ViewId::new(1);
    let second = ViewId::new(2);
    manager
        .create_view(first, World::new(WorldId::new(10)))
        .expect("create view");
    manager
        .create_view(second, World::new(WorldId::new(20)))
        .expect("create view");

    let result = manager
        .with_view(first, |inner| inner.request_main_view_switch(second))
        .expect("with_view");
    assert!(matches!(result, Err(ViewError::InvariantViolation(_))));

    let result = manager
        .with_view(first, |inner| inner.swap_main_view(second))
        .expect("with_view");
    assert!(matches!(result, Err(ViewError::InvariantViolation(_))));
}

#[test]
fn destroy_view_preconditions() {
    let (mut manager, _sent) = manager_at(Vec3::ZERO);
    let main = manager.main_view();
    let first = ViewId::new(1);
    let second = ViewId::new(2);
    manager
        .create_view(first, World::new(WorldId::new(10)))
        .expect("create view");
    manager
        .create_view(second, World::new(WorldId::new(20)))
        .expect("create view");

    assert!(matches!(
        manager.destroy_view(main),
        Err(ViewError::InvariantViolation(_))
    ));

    let result = manager
        .with_view(first, |inner| inner.destroy_view(second))
        .expect("with_view");
    assert!(matches!(result, Err(ViewError::InvariantViolation(_))));

    manager.destroy_view(first).expect("destroy");
    assert!(matches!(
        manager.view(first),
        Err(ViewError::UnknownView(_))
    ));

    // In-flight data for the torn-down view must be dropped, not panic
    manager.handle_view_data(
        first,
        &framed(&ViewMessage::SetPosition {
            entity: CAMERA_0,
            position: Vec3::ZERO,
            rotation: Rot::default(),
        }),
    );
}

#[test]
fn duplicate_id_is_rejected() {
    let (mut manager, _sent) = manager_at(Vec3::ZERO);
    let other = ViewId::new(1);
    manager
        .create_view(other, World::new(WorldId::new(10)))
        .expect("create view");
    assert!(matches!(
        manager.create_view(other, World::new(WorldId::new(11))),
        Err(ViewError::DuplicateId(_))
    ));
}

#[test]
fn failed_create_leaves_invalid_placeholder() {
    let (mut manager, _sent) = manager_at(Vec3::ZERO);
    let first = ViewId::new(1);
    manager
        .create_view(first, World::new(WorldId::new(10)))
        .expect("create view");

    // The next camera id is already taken, so view construction fails
    let mut clashing = World::new(WorldId::new(20));
    clashing
        .spawn(Avatar::new(CAMERA_1, Vec3::ZERO))
        .expect("spawn");
    let broken = ViewId::new(2);
    assert!(matches!(
        manager.create_view(broken, clashing),
        Err(ViewError::World(_))
    ));

    // Later references fail predictably instead of reporting an unknown id
    assert!(matches!(
        manager.with_view(broken, |_| ()),
        Err(ViewError::InvalidView(_))
    ));
    assert!(matches!(
        manager.request_main_view_switch(broken),
        Err(ViewError::InvalidView(_))
    ));
}

#[test]
fn virtual_channel_applies_positions() {
    let (mut manager, _sent) = manager_at(Vec3::ZERO);
    let other = ViewId::new(1);
    manager
        .create_view(other, World::new(WorldId::new(10)))
        .expect("create view");

    let message = ViewMessage::SetPosition {
        entity: CAMERA_0,
        position: Vec3::new(4.0, 8.0, 12.0),
        rotation: Rot::new(90.0, -10.0),
    };
    manager.handle_view_data(other, &framed(&message));

    let avatar_position = manager
        .view(other)
        .expect("view")
        .world()
        .expect("world")
        .get(CAMERA_0)
        .expect("avatar")
        .position;
    assert_eq!(avatar_position, Vec3::new(4.0, 8.0, 12.0));
}

#[test]
fn virtual_channel_reassembles_split_frames() {
    let (mut manager, _sent) = manager_at(Vec3::ZERO);
    let other = ViewId::new(1);
    manager
        .create_view(other, World::new(WorldId::new(10)))
        .expect("create view");

    let bytes = framed(&ViewMessage::SetPosition {
        entity: CAMERA_0,
        position: Vec3::new(100.0, 64.0, -100.0),
        rotation: Rot::default(),
    });
    let (head, tail) = bytes.split_at(bytes.len() / 2);

    manager.handle_view_data(other, head);
    let untouched = manager
        .view(other)
        .expect("view")
        .world()
        .expect("world")
        .get(CAMERA_0)
        .expect("avatar")
        .position;
    assert_eq!(untouched, Vec3::ZERO);

    manager.handle_view_data(other, tail);
    let applied = manager
        .view(other)
        .expect("view")
        .world()
        .expect("world")
        .get(CAMERA_0)
        .expect("avatar")
        .position;
    assert_eq!(applied, Vec3::new(100.0, 64.0, -100.0));
}

#[test]
fn view_data_for_main_or_unknown_view_is_dropped() {
    let (mut manager, _sent) = manager_at(Vec3::new(5.0, 5.0, 5.0));
    let main = manager.main_view();
    let bytes = framed(&ViewMessage::SetPosition {
        entity: PLAYER,
        position: Vec3::ZERO,
        rotation: Rot::default(),
    });

    // The main view has no virtual channel; its data arrives unwrapped
    manager.handle_view_data(main, &bytes);
    assert_eq!(
        manager
            .view(main)
            .expect("view")
            .world()
            .expect("world")
            .get(PLAYER)
            .expect("avatar")
            .position,
        Vec3::new(5.0, 5.0, 5.0)
    );

    manager.handle_view_data(ViewId::new(9), &bytes);
}

#[test]
fn teleport_confirm_moves_player_and_replies() {
    let (mut manager, sent) = manager_at(Vec3::ZERO);
    let main = manager.main_view();

    manager
        .handle_teleport_confirm_request(7, Vec3::new(0.0, 70.0, 0.0), Rot::new(180.0, 0.0))
        .expect("confirm");

    let avatar_position = manager
        .view(main)
        .expect("view")
        .world()
        .expect("world")
        .get(PLAYER)
        .expect("avatar")
        .position;
    assert_eq!(avatar_position, Vec3::new(0.0, 70.0, 0.0));
    assert_eq!(
        manager.engine_context().camera_position,
        Vec3::new(0.0, 70.0, 0.0)
    );
    assert_eq!(manager.engine_context().camera_rotation, Rot::new(180.0, 0.0));
    assert_eq!(
        sent.borrow().last(),
        Some(&HostMessage::ConfirmTeleport { teleport: 7 })
    );
}

#[test]
fn swap_hooks_run_on_commit() {
    let (mut manager, _sent) = manager_at(Vec3::ZERO);
    let main = manager.main_view();
    let other = ViewId::new(1);
    manager
        .create_view(other, World::new(WorldId::new(10)))
        .expect("create view");

    let swaps = Rc::new(RefCell::new(Vec::new()));
    let record = swaps.clone();
    manager.register_swap_hook(move |old, new| record.borrow_mut().push((old, new)));

    manager.request_main_view_switch(other).expect("switch");
    manager.acknowledge_main_view_switch(other).expect("ack");

    assert_eq!(swaps.borrow().as_slice(), &[(main, other)]);
}

#[test]
fn reset_returns_to_a_single_detached_main_view() {
    let (mut manager, _sent) = manager_at(Vec3::ZERO);
    let other = ViewId::new(1);
    manager
        .create_view(other, World::new(WorldId::new(10)))
        .expect("create view");
    manager.request_main_view_switch(other).expect("switch");

    manager.reset();

    assert_eq!(manager.main_view(), ViewId::new(0));
    assert_eq!(manager.active_view(), ViewId::new(0));
    assert_eq!(manager.server_main_view(), ViewId::new(0));
    assert!(manager.switch_queue().is_empty());
    assert_eq!(manager.views().count(), 1);
    let fresh = manager.view(ViewId::new(0)).expect("view");
    assert!(fresh.is_valid());
    assert!(fresh.world().is_none());
}
