use crate::{
    math::{Rot, Vec3},
    messages::codec::{ByteReader, ByteWriter, Serde, SerdeErr},
    types::{EntityId, PortalId, TeleportId, ViewId, WorldId},
};

/// Messages sent by the server to the client. View-addressed payloads for a
/// non-authoritative view travel wrapped in [`ViewMessage::ViewData`] and
/// are decoded by that view's virtual channel.
///
/// Ordering requirement: `TransferToView` must be observed strictly before
/// any `ViewData` for the new id is meaningful as main-view data.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewMessage {
    /// A new view exists; the client should allocate its local counterpart
    ViewCreate { view: ViewId, world: WorldId },
    /// The view's session ended; tear down the local counterpart
    ViewDestroy { view: ViewId },
    /// Opaque framed payload addressed to one view
    ViewData { view: ViewId, payload: Vec<u8> },
    /// Advance notice of a main-view change, sent before the swap commits
    TransferToView { old_view: ViewId, new_view: ViewId },
    /// The server has committed the swap; `view` is now authoritative
    TransferToViewAck { view: ViewId },
    /// Reposition one entity in the addressed view's world
    SetPosition {
        entity: EntityId,
        position: Vec3,
        rotation: Rot,
    },
    /// Force an explicit client acknowledgement of a finished transition
    TeleportConfirmRequest {
        teleport: TeleportId,
        position: Vec3,
        rotation: Rot,
    },
}

impl Serde for ViewMessage {
    fn ser(&self, writer: &mut ByteWriter) {
        match self {
            ViewMessage::ViewCreate { view, world } => {
                writer.write_u8(0);
                view.ser(writer);
                world.ser(writer);
            }
            ViewMessage::ViewDestroy { view } => {
                writer.write_u8(1);
                view.ser(writer);
            }
            ViewMessage::ViewData { view, payload } => {
                writer.write_u8(2);
                view.ser(writer);
                writer.write_bytes(payload);
            }
            ViewMessage::TransferToView { old_view, new_view } => {
                writer.write_u8(3);
                old_view.ser(writer);
                new_view.ser(writer);
            }
            ViewMessage::TransferToViewAck { view } => {
                writer.write_u8(4);
                view.ser(writer);
            }
            ViewMessage::SetPosition {
                entity,
                position,
                rotation,
            } => {
                writer.write_u8(5);
                entity.ser(writer);
                position.ser(writer);
                rotation.ser(writer);
            }
            ViewMessage::TeleportConfirmRequest {
                teleport,
                position,
                rotation,
            } => {
                writer.write_u8(6);
                writer.write_u32(*teleport);
                position.ser(writer);
                rotation.ser(writer);
            }
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        match reader.read_u8()? {
            0 => Ok(ViewMessage::ViewCreate {
                view: ViewId::de(reader)?,
                world: WorldId::de(reader)?,
            }),
            1 => Ok(ViewMessage::ViewDestroy {
                view: ViewId::de(reader)?,
            }),
            2 => Ok(ViewMessage::ViewData {
                view: ViewId::de(reader)?,
                payload: reader.read_bytes()?,
            }),
            3 => Ok(ViewMessage::TransferToView {
                old_view: ViewId::de(reader)?,
                new_view: ViewId::de(reader)?,
            }),
            4 => Ok(ViewMessage::TransferToViewAck {
                view: ViewId::de(reader)?,
            }),
            5 => Ok(ViewMessage::SetPosition {
                entity: EntityId::de(reader)?,
                position: Vec3::de(reader)?,
                rotation: Rot::de(reader)?,
            }),
            6 => Ok(ViewMessage::TeleportConfirmRequest {
                teleport: reader.read_u32()?,
                position: Vec3::de(reader)?,
                rotation: Rot::de(reader)?,
            }),
            value => Err(SerdeErr::InvalidDiscriminant {
                value,
                type_name: "ViewMessage",
            }),
        }
    }
}

/// Messages sent by the client to the server
#[derive(Clone, Debug, PartialEq)]
pub enum HostMessage {
    /// Authoritative position of the outgoing main view's avatar, sent just
    /// before an optimistic main-view switch
    PositionCorrection {
        position: Vec3,
        rotation: Rot,
        on_ground: bool,
    },
    /// The player triggered a portal transition
    UsePortal { portal: PortalId },
    /// Acknowledges a [`ViewMessage::TeleportConfirmRequest`]
    ConfirmTeleport { teleport: TeleportId },
}

impl Serde for HostMessage {
    fn ser(&self, writer: &mut ByteWriter) {
        match self {
            HostMessage::PositionCorrection {
                position,
                rotation,
                on_ground,
            } => {
                writer.write_u8(0);
                position.ser(writer);
                rotation.ser(writer);
                writer.write_bool(*on_ground);
            }
            HostMessage::UsePortal { portal } => {
                writer.write_u8(1);
                writer.write_u32(*portal);
            }
            HostMessage::ConfirmTeleport { teleport } => {
                writer.write_u8(2);
                writer.write_u32(*teleport);
            }
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        match reader.read_u8()? {
            0 => Ok(HostMessage::PositionCorrection {
                position: Vec3::de(reader)?,
                rotation: Rot::de(reader)?,
                on_ground: reader.read_bool()?,
            }),
            1 => Ok(HostMessage::UsePortal {
                portal: reader.read_u32()?,
            }),
            2 => Ok(HostMessage::ConfirmTeleport {
                teleport: reader.read_u32()?,
            }),
            value => Err(SerdeErr::InvalidDiscriminant {
                value,
                type_name: "HostMessage",
            }),
        }
    }
}
