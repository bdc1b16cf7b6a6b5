use polyview_shared::{EngineContext, EntityId, ViewId, World};

use crate::{transport::ClientTransport, virtual_channel::VirtualChannel};

/// One client-side viewpoint: a world, the avatar serving as its camera,
/// the engine context captured at its last deactivation, and either a
/// virtual channel or (for the server's main view) the live transport.
pub struct ClientView {
    pub(crate) id: ViewId,
    pub(crate) world: Option<World>,
    pub(crate) player: Option<EntityId>,
    pub(crate) context: EngineContext,
    pub(crate) channel: Option<VirtualChannel>,
    pub(crate) transport: Option<Box<dyn ClientTransport>>,
    pub(crate) is_valid: bool,
}

impl ClientView {
    /// A live view with no world attached yet (the initial main view)
    pub(crate) fn detached(id: ViewId) -> Self {
        Self {
            id,
            world: None,
            player: None,
            context: EngineContext::default(),
            channel: None,
            transport: None,
            is_valid: true,
        }
    }

    /// Placeholder registered when construction fails, so later references
    /// fail predictably with `InvalidView` instead of `UnknownView`.
    pub(crate) fn invalid(id: ViewId) -> Self {
        Self {
            is_valid: false,
            ..Self::detached(id)
        }
    }

    /// Rebinds a pooled instance for a new session of use.
    pub(crate) fn rebind(&mut self, id: ViewId, world: World, player: EntityId) {
        let world_id = world.id();
        self.id = id;
        self.player = Some(player);
        self.context = EngineContext {
            world: Some(world_id),
            player: Some(player),
            render_view_entity: Some(player),
            ..EngineContext::default()
        };
        self.world = Some(world);
        self.channel = Some(VirtualChannel::new());
        self.transport = None;
        self.is_valid = true;
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn world(&self) -> Option<&World> {
        self.world.as_ref()
    }

    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    /// Whether this view decodes inbound data through a virtual channel
    /// (true for every view except the server's main one).
    pub fn has_virtual_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Whether this view owns the live transport.
    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// The engine context captured at this view's last deactivation. Only
    /// meaningful while the view is not active.
    pub fn context(&self) -> &EngineContext {
        &self.context
    }
}

impl std::fmt::Debug for ClientView {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ClientView")
            .field("id", &self.id)
            .field("world", &self.world.as_ref().map(|w| w.id()))
            .field("player", &self.player)
            .field("is_valid", &self.is_valid)
            .field("has_channel", &self.channel.is_some())
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}
