use std::collections::HashMap;

use polyview_shared::{TicketError, TicketId, Vec3, ViewId};

/// Strength of a claim on a view's right to become or remain main.
/// Acquired in declining order: exclusive when available, then
/// fixed-location, then plain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TicketKind {
    /// Only one per view; the holder's "become main" request cannot be
    /// pre-empted.
    Exclusive,
    /// Many may coexist; each pins the view's world position while held.
    FixedLocation,
    /// Only guarantees the view will not be torn down or reused.
    Plain,
}

/// Capability granting its holder rights over one view's authoritative
/// status, as defined by its [`TicketKind`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    id: TicketId,
    view: ViewId,
    kind: TicketKind,
}

impl Ticket {
    pub(crate) fn new(id: TicketId, view: ViewId, kind: TicketKind) -> Self {
        Self { id, view, kind }
    }

    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn view(&self) -> ViewId {
        self.view
    }

    pub fn kind(&self) -> TicketKind {
        self.kind
    }
}

/// Bookkeeping for all live tickets.
pub(crate) struct TicketLedger {
    next_id: u32,
    live: HashMap<TicketId, (ViewId, TicketKind)>,
    pins: HashMap<TicketId, Vec3>,
}

impl TicketLedger {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            live: HashMap::new(),
            pins: HashMap::new(),
        }
    }

    /// Allocates a ticket of the requested kind. Exclusive allocation
    /// fails while another exclusive ticket is live for the view; the
    /// weaker kinds always succeed. `position` is recorded as the pin for
    /// fixed-location tickets.
    pub fn allocate(
        &mut self,
        view: ViewId,
        kind: TicketKind,
        position: Vec3,
    ) -> Result<Ticket, TicketError> {
        if kind == TicketKind::Exclusive
            && self
                .live
                .values()
                .any(|(held_view, held_kind)| *held_view == view && *held_kind == TicketKind::Exclusive)
        {
            return Err(TicketError::ExclusiveAlreadyHeld(view));
        }
        let id = TicketId::new(self.next_id);
        self.next_id += 1;
        self.live.insert(id, (view, kind));
        if kind == TicketKind::FixedLocation {
            self.pins.insert(id, position);
        }
        Ok(Ticket::new(id, view, kind))
    }

    /// Releases a ticket. Fails if the ticket does not match a live entry
    /// for its view (wrong view, or already released).
    pub fn release(&mut self, ticket: &Ticket) -> Result<(), TicketError> {
        match self.live.get(&ticket.id()) {
            Some((view, kind)) if *view == ticket.view() && *kind == ticket.kind() => {
                self.live.remove(&ticket.id());
                self.pins.remove(&ticket.id());
                Ok(())
            }
            _ => Err(TicketError::InvalidTicket {
                ticket: ticket.id(),
                view: ticket.view(),
            }),
        }
    }

    pub fn is_live(&self, ticket: &Ticket) -> bool {
        matches!(
            self.live.get(&ticket.id()),
            Some((view, kind)) if *view == ticket.view() && *kind == ticket.kind()
        )
    }

    pub fn any_live_for(&self, view: ViewId) -> bool {
        self.live.values().any(|(held_view, _)| *held_view == view)
    }

    /// The position pinned by a live fixed-location ticket, if any.
    pub fn pinned_position(&self, view: ViewId) -> Option<Vec3> {
        self.live.iter().find_map(|(id, (held_view, kind))| {
            if *held_view == view && *kind == TicketKind::FixedLocation {
                self.pins.get(id).copied()
            } else {
                None
            }
        })
    }
}
