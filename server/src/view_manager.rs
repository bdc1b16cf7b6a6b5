use std::time::Duration;

use log::{debug, info};

use polyview_shared::{
    encode_frame, swap_avatars, Avatar, ByteWriter, EntityId, KeyGenerator, Rot, Serde,
    TicketError, Vec3, ViewError, ViewId, ViewMessage, World, WorldError, WorldId,
};

use crate::{
    error::ServerViewError,
    ticket::{Ticket, TicketKind, TicketLedger},
    transaction::PacketBuffer,
    transport::ServerTransport,
    view::ServerView,
};

// A freed view id stays quarantined long enough for in-flight references
// to drain before it can be reissued.
const VIEW_ID_RECYCLE_TTL: Duration = Duration::from_secs(60);

// View camera avatars are allocated server-side, above the id range used
// for regular entities.
const VIEW_ENTITY_BASE: u32 = 0x0200_0000;

/// Server half of the view protocol: allocates views and tickets, performs
/// the authoritative main-view swap, and batches outbound notifications so
/// the client observes them in a well-defined order.
pub struct ServerViewManager {
    worlds: Vec<World>,
    views: Vec<ServerView>,
    main: ViewId,
    view_ids: KeyGenerator<ViewId>,
    tickets: TicketLedger,
    outbound: PacketBuffer,
    next_camera: u32,
}

impl ServerViewManager {
    /// Creates the manager with view 0 as the main view for the player's
    /// avatar, which must already be spawned in `world`.
    pub fn new(world: World, player: EntityId) -> Result<Self, ServerViewError> {
        if !world.contains(player) {
            return Err(ViewError::InvariantViolation(
                "initial world must contain the player avatar",
            )
            .into());
        }
        let mut view_ids = KeyGenerator::new(VIEW_ID_RECYCLE_TTL);
        let main: ViewId = view_ids.generate();
        let main_view = ServerView::new(main, world.id(), player);
        Ok(Self {
            worlds: vec![world],
            views: vec![main_view],
            main,
            view_ids,
            tickets: TicketLedger::new(),
            outbound: PacketBuffer::new(),
            next_camera: VIEW_ENTITY_BASE,
        })
    }

    pub fn main_view(&self) -> ViewId {
        self.main
    }

    pub fn views(&self) -> impl Iterator<Item = &ServerView> {
        self.views.iter()
    }

    pub fn view(&self, view_id: ViewId) -> Result<&ServerView, ViewError> {
        self.views
            .iter()
            .find(|view| view.id == view_id)
            .ok_or(ViewError::UnknownView(view_id))
    }

    /// Registers another world region views can be created into.
    pub fn register_world(&mut self, world: World) -> Result<(), ServerViewError> {
        if self.worlds.iter().any(|known| known.id() == world.id()) {
            return Err(WorldError::DuplicateWorld(world.id()).into());
        }
        self.worlds.push(world);
        Ok(())
    }

    pub fn world(&self, world_id: WorldId) -> Result<&World, WorldError> {
        self.worlds
            .iter()
            .find(|world| world.id() == world_id)
            .ok_or(WorldError::UnknownWorld(world_id))
    }

    pub fn world_mut(&mut self, world_id: WorldId) -> Result<&mut World, WorldError> {
        self.worlds
            .iter_mut()
            .find(|world| world.id() == world_id)
            .ok_or(WorldError::UnknownWorld(world_id))
    }

    /// Allocates a new view into `world_id`, spawns its camera avatar at
    /// `spawn_position`, and runs `setup` against that avatar. External
    /// transition logic runs here so its side effects hit the speculative
    /// view's entity, not the real player, until the swap is confirmed.
    pub fn create_view(
        &mut self,
        world_id: WorldId,
        spawn_position: Vec3,
        setup: impl FnOnce(&mut World, EntityId),
    ) -> Result<ViewId, ServerViewError> {
        let camera = EntityId::new(self.next_camera);
        self.next_camera += 1;

        let world = self.world_mut(world_id)?;
        world.spawn(Avatar::new(camera, spawn_position))?;
        setup(world, camera);

        let view_id: ViewId = self.view_ids.generate();
        debug!("Created view {} into world {}", view_id, world_id);
        self.views.push(ServerView::new(view_id, world_id, camera));
        self.outbound.send(ViewMessage::ViewCreate {
            view: view_id,
            world: world_id,
        });
        Ok(view_id)
    }

    /// Tears a view down and recycles its id. Fails while the view is
    /// main or any ticket for it is live (a plain ticket's only guarantee
    /// is that this cannot happen underneath its holder).
    pub fn destroy_view(&mut self, view_id: ViewId) -> Result<(), ServerViewError> {
        if view_id == self.main {
            return Err(ViewError::InvariantViolation("cannot destroy the main view").into());
        }
        if self.tickets.any_live_for(view_id) {
            return Err(ViewError::InvariantViolation(
                "cannot destroy a view with live tickets",
            )
            .into());
        }
        let index = self
            .views
            .iter()
            .position(|view| view.id == view_id)
            .ok_or(ViewError::UnknownView(view_id))?;
        let view = self.views.remove(index);
        debug!("Destroyed view {}", view_id);
        let world = self.world_mut(view.world)?;
        let _ = world.remove(view.player);
        self.view_ids.recycle_key(&view_id);
        self.outbound.send(ViewMessage::ViewDestroy { view: view_id });
        Ok(())
    }

    /// Allocates a ticket of the given kind on a view. Callers wanting the
    /// strongest available claim fall back down the exclusive,
    /// fixed-location, plain order when a kind is unavailable.
    pub fn allocate_ticket(
        &mut self,
        view_id: ViewId,
        kind: TicketKind,
    ) -> Result<Ticket, ServerViewError> {
        if self.view(view_id).is_err() {
            return Err(TicketError::UnknownView(view_id).into());
        }
        let position = self.avatar_position(view_id)?;
        Ok(self.tickets.allocate(view_id, kind, position)?)
    }

    /// The exclusive-then-weaker fallback chain in one call. Never fails
    /// for a registered view: the weaker kinds always succeed.
    pub fn allocate_strongest_ticket(&mut self, view_id: ViewId) -> Result<Ticket, ServerViewError> {
        match self.allocate_ticket(view_id, TicketKind::Exclusive) {
            Ok(ticket) => Ok(ticket),
            Err(ServerViewError::Ticket(TicketError::ExclusiveAlreadyHeld(_))) => {
                self.allocate_ticket(view_id, TicketKind::FixedLocation)
            }
            Err(err) => Err(err),
        }
    }

    pub fn release_ticket(&mut self, ticket: &Ticket) -> Result<(), ServerViewError> {
        Ok(self.tickets.release(ticket)?)
    }

    /// Promotes `view_id` to the authoritative main view, consuming
    /// `ticket`, and notifies the client that the swap is committed.
    pub fn release_and_make_main_view(
        &mut self,
        view_id: ViewId,
        ticket: Ticket,
    ) -> Result<(), ServerViewError> {
        if ticket.view() != view_id || !self.tickets.is_live(&ticket) {
            return Err(TicketError::InvalidTicket {
                ticket: ticket.id(),
                view: view_id,
            }
            .into());
        }
        self.swap_main_view(view_id)?;
        self.tickets.release(&ticket)?;
        self.outbound
            .send(ViewMessage::TransferToViewAck { view: view_id });
        Ok(())
    }

    /// Applies the client's pre-switch position correction to the main
    /// view's avatar, keeping the server's last-known state for the
    /// outgoing main accurate.
    pub fn handle_position_correction(
        &mut self,
        position: Vec3,
        rotation: Rot,
        on_ground: bool,
    ) -> Result<(), ServerViewError> {
        let (world_id, player) = {
            let view = self.view(self.main)?;
            (view.world, view.player)
        };
        let world = self.world_mut(world_id)?;
        let avatar = world
            .get_mut(player)
            .ok_or(WorldError::UnknownEntity(player, world_id))?;
        avatar.position = position;
        avatar.rotation = rotation;
        avatar.on_ground = on_ground;
        Ok(())
    }

    /// Moves a view's avatar, honoring any fixed-location pin on the view.
    pub fn set_view_position(
        &mut self,
        view_id: ViewId,
        position: Vec3,
    ) -> Result<(), ServerViewError> {
        if let Some(pinned) = self.tickets.pinned_position(view_id) {
            if pinned != position {
                return Err(ViewError::InvariantViolation(
                    "view position is pinned by a fixed-location ticket",
                )
                .into());
            }
        }
        let (world_id, player) = {
            let view = self.view(view_id)?;
            (view.world, view.player)
        };
        let world = self.world_mut(world_id)?;
        let avatar = world
            .get_mut(player)
            .ok_or(WorldError::UnknownEntity(player, world_id))?;
        avatar.position = position;
        Ok(())
    }

    pub fn avatar_position(&self, view_id: ViewId) -> Result<Vec3, ServerViewError> {
        let view = self.view(view_id)?;
        let world = self.world(view.world)?;
        Ok(world
            .get(view.player)
            .ok_or(WorldError::UnknownEntity(view.player, view.world))?
            .position)
    }

    // ------------------------------------------------------------------
    // Outbound queue

    /// Opens a transaction: everything sent until `end_transaction` is
    /// flushed as one unit, in enqueue order.
    pub fn begin_transaction(&mut self) -> Result<(), ServerViewError> {
        Ok(self.outbound.begin_transaction()?)
    }

    pub fn end_transaction(&mut self) -> Result<(), ServerViewError> {
        Ok(self.outbound.end_transaction()?)
    }

    /// Enqueues a message to the client.
    pub fn send(&mut self, message: ViewMessage) {
        self.outbound.send(message);
    }

    /// Encodes and frames a message for one view's virtual channel and
    /// enqueues it as `ViewData`.
    pub fn send_view_data(&mut self, view_id: ViewId, message: &ViewMessage) {
        let mut writer = ByteWriter::new();
        message.ser(&mut writer);
        let mut payload = Vec::new();
        encode_frame(&writer.to_bytes(), &mut payload);
        self.outbound.send(ViewMessage::ViewData {
            view: view_id,
            payload,
        });
    }

    /// Hands everything queued (outside an open transaction) to the
    /// transport, preserving enqueue order.
    pub fn flush_packets(&mut self, transport: &mut dyn ServerTransport) {
        for message in self.outbound.flush() {
            transport.send(message);
        }
    }

    // ------------------------------------------------------------------
    // Internals

    /// Authoritative main-view swap, symmetric to the client's optimistic
    /// one: the player avatar and the view's camera avatar trade worlds
    /// and positions, and the views trade player references.
    fn swap_main_view(&mut self, new_main: ViewId) -> Result<(), ServerViewError> {
        let old_main = self.main;
        if new_main == old_main {
            return Ok(());
        }
        info!("Promoting view {} to main (was {})", new_main, old_main);

        let (old_world_id, old_player) = {
            let view = self.view(old_main)?;
            (view.world, view.player)
        };
        let (new_world_id, new_player) = {
            let view = self.view(new_main)?;
            (view.world, view.player)
        };

        if old_world_id == new_world_id {
            self.world_mut(old_world_id)?
                .swap_positions(old_player, new_player)?;
        } else {
            let (old_world, new_world) = self.two_worlds_mut(old_world_id, new_world_id)?;
            swap_avatars(old_world, new_world, old_player, new_player)?;
        }

        for view in &mut self.views {
            if view.id == old_main {
                view.player = new_player;
            } else if view.id == new_main {
                view.player = old_player;
            }
        }
        self.main = new_main;
        Ok(())
    }

    fn two_worlds_mut(
        &mut self,
        a: WorldId,
        b: WorldId,
    ) -> Result<(&mut World, &mut World), ServerViewError> {
        let index_a = self
            .worlds
            .iter()
            .position(|world| world.id() == a)
            .ok_or(WorldError::UnknownWorld(a))?;
        let index_b = self
            .worlds
            .iter()
            .position(|world| world.id() == b)
            .ok_or(WorldError::UnknownWorld(b))?;
        if index_a == index_b {
            return Err(ViewError::InvariantViolation(
                "distinct worlds required for a pairwise operation",
            )
            .into());
        }
        if index_a < index_b {
            let (left, right) = self.worlds.split_at_mut(index_b);
            Ok((&mut left[index_a], &mut right[0]))
        } else {
            let (left, right) = self.worlds.split_at_mut(index_a);
            Ok((&mut right[0], &mut left[index_b]))
        }
    }
}
