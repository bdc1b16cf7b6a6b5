use thiserror::Error;

use polyview_shared::{TicketError, ViewError, WorldError};

/// Any error a server-side view operation can produce
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerViewError {
    /// View error
    #[error(transparent)]
    View(#[from] ViewError),

    /// Ticket error
    #[error(transparent)]
    Ticket(#[from] TicketError),

    /// World error
    #[error(transparent)]
    World(#[from] WorldError),
}
