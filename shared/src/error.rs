use thiserror::Error;

use crate::{
    types::{TicketId, ViewId},
    world::error::WorldError,
};

/// Errors that can occur during view manager operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// A view with this id is already registered
    #[error("View id {0} is already taken")]
    DuplicateId(ViewId),

    /// No view with this id is registered
    #[error("Unknown view {0}")]
    UnknownView(ViewId),

    /// The view is registered but has been torn down or failed to construct
    #[error("View {0} is no longer valid")]
    InvalidView(ViewId),

    /// A nesting/active/main precondition was violated. This indicates
    /// misuse by the caller, not an environmental failure.
    #[error("View invariant violated: {0}")]
    InvariantViolation(&'static str),

    /// World state manipulation failed while operating on a view
    #[error("World error during view operation: {0}")]
    World(#[from] WorldError),
}

/// Errors that can occur during ticket allocation and release
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    /// Only one exclusive ticket may exist per view at a time
    #[error("An exclusive ticket is already held for view {0}")]
    ExclusiveAlreadyHeld(ViewId),

    /// The ticket does not correspond to the view, or was already released
    #[error("Ticket {ticket} does not grant rights on view {view}")]
    InvalidTicket { ticket: TicketId, view: ViewId },

    /// Tickets can only be allocated for registered views
    #[error("Cannot allocate ticket for unknown view {0}")]
    UnknownView(ViewId),
}
