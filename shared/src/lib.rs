//! # Polyview Shared
//! Common functionality shared between polyview-server & polyview-client crates.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod engine_context;
mod error;
mod key_generator;
mod math;
mod messages;
mod types;
mod world;

pub use engine_context::EngineContext;
pub use error::{TicketError, ViewError};
pub use key_generator::KeyGenerator;
pub use math::{Rot, Vec3};
pub use messages::{
    codec::{ByteReader, ByteWriter, Serde, SerdeErr},
    frame::{encode_frame, FrameDecoder},
    view_message::{HostMessage, ViewMessage},
};
pub use types::{EntityId, PortalId, TeleportId, TicketId, ViewId, WorldId};
pub use world::{
    avatar::Avatar,
    error::WorldError,
    swap::swap_avatars,
    world::World,
};
