use std::collections::HashMap;

use log::{debug, info, warn};
use thiserror::Error;

use polyview_shared::{EntityId, PortalId, Rot, TeleportId, ViewId, ViewMessage, World, WorldId};

use crate::{
    error::ServerViewError,
    ticket::{Ticket, TicketKind},
    view_manager::ServerViewManager,
};

/// Third-party teleport logic that positions an avatar in the destination
/// world. Runs against the speculative view's camera avatar, never the
/// real player.
pub trait Teleporter {
    /// Name matched against [`TransitionConfig::blocked_teleporters`].
    fn type_name(&self) -> &str;

    /// Place the avatar in the destination world.
    fn place_avatar(&self, world: &mut World, avatar: EntityId);
}

/// Errors that make a view-aware transition impossible
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// A disallowed third-party transition helper was detected. The caller
    /// recovers by running its non-view-aware fallback path.
    #[error("Transition helper '{0}' is not supported for view-aware transitions")]
    UnsupportedTransition(String),
}

/// Configuration for the transition orchestrator
#[derive(Clone, Debug)]
pub struct TransitionConfig {
    pub enabled: bool,
    /// Teleporter type names that must take the fallback path
    pub blocked_teleporters: Vec<String>,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocked_teleporters: Vec::new(),
        }
    }
}

/// Progress of one region-transition attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionState {
    Requested,
    TicketHeld,
    DestViewCreated,
    ClientNotified,
    Swapped,
    Confirmed,
    Aborted,
}

/// Whether the orchestrator performed the transition or the caller must
/// fall back to the plain, non-view-aware path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    Handled,
    NotHandled,
}

/// Performs a full region transition through the view manager: allocate a
/// destination view, run the teleport logic inside it, notify the client,
/// promote the view, and hold the outgoing main until the client confirms.
pub struct TransitionOrchestrator {
    config: TransitionConfig,
    state: TransitionState,
    /// Outgoing main views held until their transition is confirmed
    held_tickets: HashMap<ViewId, Ticket>,
    pending_confirm: Option<TeleportId>,
    next_teleport: TeleportId,
}

impl TransitionOrchestrator {
    pub fn new(config: TransitionConfig) -> Self {
        Self {
            config,
            state: TransitionState::Requested,
            held_tickets: HashMap::new(),
            pending_confirm: None,
            next_teleport: 0,
        }
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    /// Moves the player to `dest_world` through a speculative view.
    /// Returns `NotHandled` when transitions are disabled or the
    /// teleporter is disallowed; the caller then falls back to its
    /// unmodified transition path.
    pub fn transfer_to_world(
        &mut self,
        manager: &mut ServerViewManager,
        dest_world: WorldId,
        teleporter: &dyn Teleporter,
    ) -> Result<TransitionOutcome, ServerViewError> {
        self.state = TransitionState::Requested;
        if !self.config.enabled {
            self.state = TransitionState::Aborted;
            return Ok(TransitionOutcome::NotHandled);
        }
        if let Err(TransitionError::UnsupportedTransition(name)) = self.gate(teleporter) {
            debug!("Skipping view-aware transition for blocked teleporter {}", name);
            self.state = TransitionState::Aborted;
            return Ok(TransitionOutcome::NotHandled);
        }

        let old_main = manager.main_view();

        // Hold on to the outgoing main view until the client has finished
        // the transition. An exclusive ticket is preferred; for the few
        // seconds this takes, a weaker one does as well.
        let hold = manager.allocate_strongest_ticket(old_main)?;
        self.held_tickets.insert(old_main, hold);
        self.state = TransitionState::TicketHeld;

        // The view's avatar starts where the player currently stands; the
        // teleporter then positions it in the destination world.
        let player_position = manager.avatar_position(old_main)?;
        let dest_view = manager.create_view(dest_world, player_position, |world, avatar| {
            teleporter.place_avatar(world, avatar);
        })?;
        self.state = TransitionState::DestViewCreated;

        // The notification must reach the client before the authoritative
        // ack, so it goes first into the transaction batch.
        manager.begin_transaction()?;
        manager.send(ViewMessage::TransferToView {
            old_view: old_main,
            new_view: dest_view,
        });
        self.state = TransitionState::ClientNotified;

        let promote = manager.allocate_ticket(dest_view, TicketKind::Exclusive)?;
        manager.release_and_make_main_view(dest_view, promote)?;
        self.state = TransitionState::Swapped;
        manager.end_transaction()?;

        // Force an explicit confirmation round-trip; duplicate portal
        // triggers are discarded until it completes.
        let teleport = self.next_teleport;
        self.next_teleport += 1;
        self.pending_confirm = Some(teleport);
        let position = manager.avatar_position(dest_view)?;
        manager.send(ViewMessage::TeleportConfirmRequest {
            teleport,
            position,
            rotation: Rot::default(),
        });

        info!(
            "Transition of main view {} -> {} awaiting confirmation {}",
            old_main, dest_view, teleport
        );
        Ok(TransitionOutcome::Handled)
    }

    /// Whether a portal trigger should be acted on. Duplicates arriving
    /// while a transition awaits confirmation are debounced.
    pub fn handle_use_portal(&mut self, portal: PortalId) -> bool {
        if self.pending_confirm.is_some() {
            debug!(
                "Discarding portal trigger {} while a transition awaits confirmation",
                portal
            );
            return false;
        }
        true
    }

    /// Completes a transition attempt once the client has confirmed the
    /// forced position, releasing the hold on the outgoing main view.
    pub fn handle_confirm(
        &mut self,
        manager: &mut ServerViewManager,
        teleport: TeleportId,
    ) -> Result<(), ServerViewError> {
        if self.pending_confirm != Some(teleport) {
            warn!("Ignoring stale teleport confirmation {}", teleport);
            return Ok(());
        }
        self.pending_confirm = None;
        for (_, ticket) in self.held_tickets.drain() {
            manager.release_ticket(&ticket)?;
        }
        self.state = TransitionState::Confirmed;
        info!("Transition {} confirmed", teleport);
        Ok(())
    }

    /// Releases everything held by an abandoned session.
    pub fn abandon(&mut self, manager: &mut ServerViewManager) -> Result<(), ServerViewError> {
        self.pending_confirm = None;
        for (_, ticket) in self.held_tickets.drain() {
            manager.release_ticket(&ticket)?;
        }
        self.state = TransitionState::Aborted;
        Ok(())
    }

    fn gate(&self, teleporter: &dyn Teleporter) -> Result<(), TransitionError> {
        if self
            .config
            .blocked_teleporters
            .iter()
            .any(|name| name == teleporter.type_name())
        {
            return Err(TransitionError::UnsupportedTransition(
                teleporter.type_name().to_string(),
            ));
        }
        Ok(())
    }
}
