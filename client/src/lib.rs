//! # Polyview Client
//! Maintains several simultaneous views into the shared world, exactly one
//! of which is authoritative, and reconciles optimistic local main-view
//! switches with the server's decisions.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use polyview_shared::{
        EngineContext, EntityId, HostMessage, Rot, Vec3, ViewError, ViewId, ViewMessage, World,
        WorldId,
    };
}

mod transport;
mod view;
mod view_manager;
mod virtual_channel;

pub use transport::ClientTransport;
pub use view::ClientView;
pub use view_manager::{ClientViewManager, SwitchQueueEntry};
pub use virtual_channel::VirtualChannel;
