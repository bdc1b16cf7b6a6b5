//! # Polyview Server
//! Allocates views and tickets, drives the authoritative half of the
//! main-view transition protocol, and hands the live connection off
//! between views as transitions are committed.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use polyview_shared::{
        EntityId, HostMessage, Rot, TicketError, Vec3, ViewError, ViewId, ViewMessage, World,
        WorldError, WorldId,
    };
}

mod error;
mod ticket;
mod transaction;
mod transition;
mod transport;
mod view;
mod view_manager;

pub use error::ServerViewError;
pub use ticket::{Ticket, TicketKind};
pub use transition::{
    Teleporter, TransitionConfig, TransitionError, TransitionOrchestrator, TransitionOutcome,
    TransitionState,
};
pub use transport::ServerTransport;
pub use view::ServerView;
pub use view_manager::ServerViewManager;
