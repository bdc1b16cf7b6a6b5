use std::mem;

use log::{debug, error, info, warn};

use polyview_shared::{
    swap_avatars, Avatar, EngineContext, EntityId, HostMessage, Rot, TeleportId, Vec3, ViewError,
    ViewId, ViewMessage, World,
};

use crate::{transport::ClientTransport, view::ClientView, virtual_channel::VirtualChannel};

// Camera avatars are allocated client-side and must not collide with
// server-assigned entity ids.
const CLIENT_ENTITY_BASE: u32 = 0x0100_0000;

/// One optimistic main-view switch that the server has not yet confirmed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwitchQueueEntry {
    pub old_main: ViewId,
    pub new_main: ViewId,
    /// Where the outgoing main view's avatar stood, authoritatively, when
    /// the switch was applied. Used to realign that avatar on rewind.
    pub position: Vec3,
}

/// Hook run after every committed main-view swap with (old, new) ids.
/// External collaborators register these for swap side effects (e.g.
/// stopping world-bound audio).
pub type SwapHook = Box<dyn FnMut(ViewId, ViewId)>;

/// Owns the set of client views, arbitrates which one is active and which
/// is main, and runs the optimistic-apply/acknowledge/rewind protocol that
/// keeps the client's notion of "main view" consistent with the server's.
pub struct ClientViewManager {
    views: Vec<ClientView>,
    unused_views: Vec<ClientView>,
    main: ViewId,
    active: ViewId,
    /// The view the server still believes is main. Differs from `main`
    /// only between an optimistic switch and its acknowledgement; for that
    /// window it is the view with the live transport.
    server_main: ViewId,
    switch_queue: Vec<SwitchQueueEntry>,
    depth: u32,
    engine: EngineContext,
    swap_hooks: Vec<SwapHook>,
    next_camera: u32,
}

impl ClientViewManager {
    /// Creates the manager with view 0 as the initial main view, holding
    /// the session's world, player avatar and live transport. The world
    /// must already contain the player's avatar.
    pub fn new(
        world: World,
        player: EntityId,
        transport: Box<dyn ClientTransport>,
    ) -> Result<Self, ViewError> {
        if !world.contains(player) {
            return Err(ViewError::InvariantViolation(
                "initial world must contain the player avatar",
            ));
        }
        let main_id = ViewId::new(0);
        let mut main_view = ClientView::detached(main_id);
        let engine = EngineContext {
            world: Some(world.id()),
            player: Some(player),
            render_view_entity: Some(player),
            camera_position: world.get(player).map(|a| a.position).unwrap_or(Vec3::ZERO),
            camera_rotation: world.get(player).map(|a| a.rotation).unwrap_or_default(),
            ..EngineContext::default()
        };
        main_view.world = Some(world);
        main_view.player = Some(player);
        main_view.context = engine.clone();
        main_view.transport = Some(transport);
        Ok(Self {
            views: vec![main_view],
            unused_views: Vec::new(),
            main: main_id,
            active: main_id,
            server_main: main_id,
            switch_queue: Vec::new(),
            depth: 0,
            engine,
            swap_hooks: Vec::new(),
            next_camera: CLIENT_ENTITY_BASE,
        })
    }

    pub fn main_view(&self) -> ViewId {
        self.main
    }

    pub fn active_view(&self) -> ViewId {
        self.active
    }

    /// The view that owns the live transport (see struct docs).
    pub fn server_main_view(&self) -> ViewId {
        self.server_main
    }

    pub fn views(&self) -> impl Iterator<Item = &ClientView> {
        self.views.iter()
    }

    pub fn view(&self, view_id: ViewId) -> Result<&ClientView, ViewError> {
        self.views
            .iter()
            .find(|view| view.id == view_id)
            .ok_or(ViewError::UnknownView(view_id))
    }

    pub fn switch_queue(&self) -> &[SwitchQueueEntry] {
        &self.switch_queue
    }

    /// Mutable access to a view's world, for the world-model collaborator.
    pub fn world_mut(&mut self, view_id: ViewId) -> Result<&mut World, ViewError> {
        let index = self
            .index_of(view_id)
            .ok_or(ViewError::UnknownView(view_id))?;
        if !self.views[index].is_valid {
            return Err(ViewError::InvalidView(view_id));
        }
        self.views[index]
            .world
            .as_mut()
            .ok_or(ViewError::InvariantViolation("view holds no world"))
    }

    /// The live engine context, owned by the active view.
    pub fn engine_context(&self) -> &EngineContext {
        &self.engine
    }

    pub fn engine_context_mut(&mut self) -> &mut EngineContext {
        &mut self.engine
    }

    /// Registers a side-effect hook run after every committed swap.
    pub fn register_swap_hook(&mut self, hook: impl FnMut(ViewId, ViewId) + 'static) {
        self.swap_hooks.push(Box::new(hook));
    }

    /// Registers a new view holding `world`. On internal failure a
    /// placeholder invalid view is still registered for the id, so later
    /// references fail with `InvalidView` rather than `UnknownView`.
    pub fn create_view(&mut self, view_id: ViewId, world: World) -> Result<&ClientView, ViewError> {
        if self.index_of(view_id).is_some() {
            return Err(ViewError::DuplicateId(view_id));
        }
        match self.build_view(view_id, world) {
            Ok(view) => {
                let index = self.views.len();
                self.views.push(view);
                Ok(&self.views[index])
            }
            Err(err) => {
                error!("Creating view {}: {}", view_id, err);
                self.views.push(ClientView::invalid(view_id));
                Err(err)
            }
        }
    }

    fn build_view(&mut self, view_id: ViewId, mut world: World) -> Result<ClientView, ViewError> {
        let camera = EntityId::new(self.next_camera);
        self.next_camera += 1;
        world.spawn(Avatar::new(camera, Vec3::ZERO))?;

        let mut view = match self.unused_views.pop() {
            Some(pooled) => {
                debug!("Reusing pooled view instance for view {}", view_id);
                pooled
            }
            None => {
                debug!("Creating new view {}", view_id);
                ClientView::detached(view_id)
            }
        };
        view.rebind(view_id, world, camera);
        Ok(view)
    }

    /// Tears a view down: engine cleanup runs inside the view's context,
    /// its avatar is detached from its world, and the instance is returned
    /// to the pool for reuse.
    pub fn destroy_view(&mut self, view_id: ViewId) -> Result<(), ViewError> {
        debug!("Removing view {}", view_id);
        if self.active != self.main {
            return Err(ViewError::InvariantViolation(
                "main view must be active to destroy a view",
            ));
        }
        if view_id == self.main {
            return Err(ViewError::InvariantViolation("cannot destroy the main view"));
        }
        let view = self.view(view_id)?;
        if !view.is_valid {
            return Err(ViewError::InvalidView(view_id));
        }

        // Engine-side cleanup observes the dying view's world
        self.with_view(view_id, |manager| {
            manager.engine.render_view_entity = None;
            manager.engine.pointed_entity = None;
        })?;

        let index = self
            .index_of(view_id)
            .ok_or(ViewError::UnknownView(view_id))?;
        let mut view = self.views.remove(index);
        if let (Some(world), Some(player)) = (view.world.as_mut(), view.player) {
            let _ = world.remove(player);
        }
        view.world = None;
        view.player = None;
        view.channel = None;
        view.transport = None;
        view.is_valid = false;
        self.unused_views.push(view);
        Ok(())
    }

    /// The context-switch primitive: runs `body` with `view_id`'s engine
    /// context installed as the live one, then restores the previous
    /// context regardless of what `body` did.
    ///
    /// Re-entrant: if `view_id` is already active, `body` runs directly.
    /// Each slow-path frame restores exactly what it captured; the only
    /// exception is a `rewind_main_view` inside `body`, which collapses the
    /// switch stack and leaves nothing for the frame to undo.
    pub fn with_view<T>(
        &mut self,
        view_id: ViewId,
        body: impl FnOnce(&mut Self) -> T,
    ) -> Result<T, ViewError> {
        if view_id == self.active {
            return Ok(body(self));
        }
        let view = self.view(view_id)?;
        if !view.is_valid {
            return Err(ViewError::InvalidView(view_id));
        }

        let previous = self.active;
        self.capture_into(previous);
        self.restore_from(view_id);
        self.active = view_id;
        let depth_at_entry = self.depth;
        self.depth += 1;

        let output = body(self);

        if self.depth == depth_at_entry + 1 {
            self.depth = depth_at_entry;
            self.capture_into(view_id);
            self.active = previous;
            self.restore_from(previous);
        }
        Ok(output)
    }

    /// Optimistically switches the main view before the server confirms:
    /// sends the outgoing main's authoritative position, swaps locally, and
    /// queues the switch for acknowledgement.
    pub fn request_main_view_switch(&mut self, new_main: ViewId) -> Result<(), ViewError> {
        if self.active != self.main {
            return Err(ViewError::InvariantViolation(
                "cannot switch main view from inside a nested view",
            ));
        }
        if new_main == self.main {
            return Ok(());
        }

        // Bring the server up to date on the outgoing main view before it
        // stops being authoritative
        let correction = self.position_correction(self.main)?;
        self.send_to_server(correction);

        let old_main = self.main;
        self.swap_main_view(new_main)?;

        // The avatar left behind now stands at the outgoing main's
        // pre-switch authoritative position; record it for rewind.
        let position = self.avatar_position(old_main)?;
        self.switch_queue.push(SwitchQueueEntry {
            old_main,
            new_main,
            position,
        });
        Ok(())
    }

    /// The atomic view-identity swap: transfers the two avatars between
    /// their worlds, exchanges their positions, exchanges the views' player
    /// references, carries continuity state over, and reassigns main and
    /// active in one step. No intermediate state is observable.
    pub fn swap_main_view(&mut self, new_main: ViewId) -> Result<(), ViewError> {
        if self.depth > 0 {
            return Err(ViewError::InvariantViolation(
                "cannot change main view while inside with_view",
            ));
        }
        if self.active != self.main {
            return Err(ViewError::InvariantViolation(
                "main view must be active to swap",
            ));
        }
        {
            let view = self.view(new_main)?;
            if !view.is_valid {
                return Err(ViewError::InvalidView(new_main));
            }
        }
        let old_main = self.main;
        if new_main == old_main {
            return Ok(());
        }
        info!("Swapping main view {} with {}", old_main, new_main);

        // Capture all (possibly modified) live state into the outgoing main
        self.capture_into(old_main);

        {
            let (old_view, new_view) = self.two_views_mut(old_main, new_main)?;
            let (Some(old_world), Some(new_world)) =
                (old_view.world.as_mut(), new_view.world.as_mut())
            else {
                return Err(ViewError::InvariantViolation(
                    "swap requires both views to hold a world",
                ));
            };
            let (Some(main_player), Some(view_player)) = (old_view.player, new_view.player) else {
                return Err(ViewError::InvariantViolation(
                    "swap requires both views to hold an avatar",
                ));
            };

            swap_avatars(old_world, new_world, main_player, view_player)?;

            // The real player entity now lives in the incoming view's
            // world; the camera avatar stays behind in the old one.
            old_view.player = Some(view_player);
            new_view.player = Some(main_player);
            old_view.context.player = Some(view_player);
            new_view.context.player = Some(main_player);
            if new_view.context.render_view_entity == Some(view_player) {
                new_view.context.render_view_entity = Some(main_player);
            }
            if old_view.context.render_view_entity == Some(main_player) {
                old_view.context.render_view_entity = Some(view_player);
            }

            // User-visible continuity carries over to the new main view
            let outgoing = old_view.context.clone();
            new_view.context.copy_continuity_from(&outgoing);
        }

        self.main = new_main;
        self.active = new_main;
        self.restore_from(new_main);

        for hook in &mut self.swap_hooks {
            hook(old_main, new_main);
        }
        Ok(())
    }

    /// Handles the server's confirmation of a main-view switch. A
    /// confirmation that does not match the head of the switch queue means
    /// the server decided on a different target (an out-of-band transition
    /// pre-empted our speculation): all unconfirmed switches are rewound
    /// and the server's choice is applied as if we had requested it.
    pub fn acknowledge_main_view_switch(&mut self, view_id: ViewId) -> Result<(), ViewError> {
        info!("Ack for main view switch to {}", view_id);

        let expected = self.switch_queue.first().map(|entry| entry.new_main);
        if expected != Some(view_id) {
            self.rewind_main_view()?;
            self.swap_main_view(view_id)?;
        }
        if !self.switch_queue.is_empty() {
            self.switch_queue.remove(0);
        }

        // Hand the live transport to the newly acknowledged main view; the
        // stepping-down view takes over the virtual channel in exchange.
        let old_server_main = self.server_main;
        if old_server_main != view_id {
            let (old_view, new_view) = self.two_views_mut(old_server_main, view_id)?;
            mem::swap(&mut old_view.channel, &mut new_view.channel);
            mem::swap(&mut old_view.transport, &mut new_view.transport);
        }
        self.server_main = view_id;
        Ok(())
    }

    /// Rewinds every main-view switch the server has not confirmed, in
    /// reverse order, restoring each recorded avatar position along the
    /// way. Swaps are not commutative, so reverse replay is the only order
    /// that reproduces each intermediate entity/world pairing.
    ///
    /// Contract: may only be called while at most one `with_view` frame
    /// (for the server's main view) is on the stack. The frame in progress
    /// observes the collapsed depth and skips its own restoration.
    pub fn rewind_main_view(&mut self) -> Result<(), ViewError> {
        if self.switch_queue.is_empty() {
            return Ok(());
        }
        warn!(
            "Server pre-empted {} unconfirmed main view switch(es), rewinding",
            self.switch_queue.len()
        );

        // Store the active view's state and discard the with_view stack;
        // from here on the main view is active, with no pending unwinds.
        self.capture_into(self.active);
        self.depth = 0;
        self.active = self.main;
        self.restore_from(self.main);

        let queue = mem::take(&mut self.switch_queue);
        for entry in queue.iter().rev() {
            self.swap_main_view(entry.old_main)?;
            // Discard speculative movement of the avatar that had been
            // promoted: put it back at the recorded authoritative position.
            if let Some(index) = self.index_of(entry.new_main) {
                let view = &mut self.views[index];
                if let (Some(world), Some(player)) = (view.world.as_mut(), view.player) {
                    if let Some(avatar) = world.get_mut(player) {
                        avatar.position = entry.position;
                    }
                }
            }
        }
        Ok(())
    }

    /// Delivers inbound bytes addressed to a view. Data for an unknown or
    /// torn-down view is logged and dropped; a view can legitimately be
    /// destroyed while messages for it are still in flight. Data for the
    /// server's main view does not belong here and is dropped too.
    pub fn handle_view_data(&mut self, view_id: ViewId, data: &[u8]) {
        let Some(index) = self.index_of(view_id) else {
            warn!("Received data for unknown view {}", view_id);
            return;
        };
        if !self.views[index].is_valid {
            warn!("Received data for invalid view {}", view_id);
            return;
        }
        let Some(mut channel) = self.views[index].channel.take() else {
            warn!("Received data for main view {} via ViewData message", view_id);
            return;
        };

        let result = self.with_view(view_id, |manager| match channel.decode(data) {
            Ok(messages) => {
                for message in messages {
                    manager.apply_message(message);
                }
            }
            Err(err) => error!("Decoding data for view {}: {}", view_id, err),
        });
        if let Some(index) = self.index_of(view_id) {
            self.views[index].channel = Some(channel);
        }
        if let Err(err) = result {
            error!("Handling view data for view {}: {}", view_id, err);
        }
    }

    /// Applies one decoded message to the active view's world state. This
    /// is the dispatch stage of the virtual channel pipeline.
    fn apply_message(&mut self, message: ViewMessage) {
        match message {
            ViewMessage::SetPosition {
                entity,
                position,
                rotation,
            } => {
                if let Some(index) = self.index_of(self.active) {
                    let view = &mut self.views[index];
                    if let Some(world) = view.world.as_mut() {
                        if let Some(avatar) = world.get_mut(entity) {
                            avatar.position = position;
                            avatar.rotation = rotation;
                            return;
                        }
                    }
                }
                warn!(
                    "SetPosition for unknown entity {} in view {}",
                    entity, self.active
                );
            }
            other => {
                debug!("Ignoring non-spatial message in view {}: {:?}", self.active, other);
            }
        }
    }

    /// Applies a position-forcing confirm request to the main view's avatar
    /// and replies, completing the transition's acknowledgement round-trip.
    pub fn handle_teleport_confirm_request(
        &mut self,
        teleport: TeleportId,
        position: Vec3,
        rotation: Rot,
    ) -> Result<(), ViewError> {
        let index = self
            .index_of(self.main)
            .ok_or(ViewError::UnknownView(self.main))?;
        let view = &mut self.views[index];
        if let (Some(world), Some(player)) = (view.world.as_mut(), view.player) {
            if let Some(avatar) = world.get_mut(player) {
                avatar.position = position;
                avatar.rotation = rotation;
            }
        }
        // The forced position is seen through the main view's camera
        if self.active == self.main {
            self.engine.camera_position = position;
            self.engine.camera_rotation = rotation;
        }
        self.send_to_server(HostMessage::ConfirmTeleport { teleport });
        Ok(())
    }

    /// Ends the session: every view, including the old main, is
    /// invalidated and pooled, and a fresh detached main view takes over.
    pub fn reset(&mut self) {
        info!("Resetting view manager");
        let views = mem::take(&mut self.views);
        for mut view in views {
            view.is_valid = false;
            view.world = None;
            view.player = None;
            view.channel = None;
            view.transport = None;
            self.unused_views.push(view);
        }
        let main_id = ViewId::new(0);
        self.views.push(ClientView::detached(main_id));
        self.main = main_id;
        self.active = main_id;
        self.server_main = main_id;
        self.switch_queue.clear();
        self.depth = 0;
        self.engine = EngineContext::default();
    }

    // ------------------------------------------------------------------
    // Internals

    fn index_of(&self, view_id: ViewId) -> Option<usize> {
        self.views.iter().position(|view| view.id == view_id)
    }

    fn capture_into(&mut self, view_id: ViewId) {
        if let Some(index) = self.index_of(view_id) {
            self.views[index].context = self.engine.clone();
        }
    }

    fn restore_from(&mut self, view_id: ViewId) {
        if let Some(index) = self.index_of(view_id) {
            self.engine = self.views[index].context.clone();
        }
    }

    fn two_views_mut(
        &mut self,
        a: ViewId,
        b: ViewId,
    ) -> Result<(&mut ClientView, &mut ClientView), ViewError> {
        let index_a = self.index_of(a).ok_or(ViewError::UnknownView(a))?;
        let index_b = self.index_of(b).ok_or(ViewError::UnknownView(b))?;
        if index_a == index_b {
            return Err(ViewError::InvariantViolation(
                "distinct views required for a pairwise operation",
            ));
        }
        if index_a < index_b {
            let (left, right) = self.views.split_at_mut(index_b);
            Ok((&mut left[index_a], &mut right[0]))
        } else {
            let (left, right) = self.views.split_at_mut(index_a);
            Ok((&mut right[0], &mut left[index_b]))
        }
    }

    fn avatar_position(&self, view_id: ViewId) -> Result<Vec3, ViewError> {
        let view = self.view(view_id)?;
        let (Some(world), Some(player)) = (view.world.as_ref(), view.player) else {
            return Err(ViewError::InvariantViolation(
                "view holds no world or avatar",
            ));
        };
        world
            .get(player)
            .map(|avatar| avatar.position)
            .ok_or(ViewError::InvariantViolation(
                "view's avatar is missing from its world",
            ))
    }

    fn position_correction(&self, view_id: ViewId) -> Result<HostMessage, ViewError> {
        let view = self.view(view_id)?;
        let (Some(world), Some(player)) = (view.world.as_ref(), view.player) else {
            return Err(ViewError::InvariantViolation(
                "view holds no world or avatar",
            ));
        };
        let avatar = world.get(player).ok_or(ViewError::InvariantViolation(
            "view's avatar is missing from its world",
        ))?;
        Ok(HostMessage::PositionCorrection {
            position: avatar.position,
            rotation: avatar.rotation,
            on_ground: avatar.on_ground,
        })
    }

    fn send_to_server(&mut self, message: HostMessage) {
        if let Some(index) = self.index_of(self.server_main) {
            if let Some(transport) = self.views[index].transport.as_mut() {
                transport.send(message);
                return;
            }
        }
        warn!("No live transport to deliver outbound message");
    }
}
