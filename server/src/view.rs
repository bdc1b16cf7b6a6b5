use polyview_shared::{EntityId, ViewId, WorldId};

/// One server-side viewpoint: the world it looks into and the avatar
/// entity serving as its camera there.
#[derive(Clone, Debug)]
pub struct ServerView {
    pub(crate) id: ViewId,
    pub(crate) world: WorldId,
    pub(crate) player: EntityId,
    pub(crate) is_valid: bool,
}

impl ServerView {
    pub(crate) fn new(id: ViewId, world: WorldId, player: EntityId) -> Self {
        Self {
            id,
            world,
            player,
            is_valid: true,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn world(&self) -> WorldId {
        self.world
    }

    pub fn player(&self) -> EntityId {
        self.player
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }
}
