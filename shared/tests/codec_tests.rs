/// Tests for the byte codec and wire message serialization

use polyview_shared::{
    ByteReader, ByteWriter, HostMessage, Rot, Serde, SerdeErr, Vec3, ViewId, ViewMessage, WorldId,
};

#[test]
fn varint_round_trips_across_widths() {
    for value in [0u64, 1, 127, 128, 300, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
        let mut writer = ByteWriter::new();
        writer.write_varint(value);
        let bytes = writer.to_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_varint().unwrap(), value);
        assert!(reader.is_empty());
    }
}

#[test]
fn view_data_round_trips() {
    let message = ViewMessage::ViewData {
        view: ViewId::new(3),
        payload: vec![0xde, 0xad, 0xbe, 0xef],
    };
    let mut writer = ByteWriter::new();
    message.ser(&mut writer);
    let bytes = writer.to_bytes();
    let mut reader = ByteReader::new(&bytes);
    assert_eq!(ViewMessage::de(&mut reader).unwrap(), message);
}

#[test]
fn transfer_to_view_round_trips() {
    let message = ViewMessage::TransferToView {
        old_view: ViewId::new(0),
        new_view: ViewId::new(7),
    };
    let mut writer = ByteWriter::new();
    message.ser(&mut writer);
    let bytes = writer.to_bytes();
    let mut reader = ByteReader::new(&bytes);
    assert_eq!(ViewMessage::de(&mut reader).unwrap(), message);
}

#[test]
fn view_create_round_trips() {
    let message = ViewMessage::ViewCreate {
        view: ViewId::new(12),
        world: WorldId::new(1),
    };
    let mut writer = ByteWriter::new();
    message.ser(&mut writer);
    let bytes = writer.to_bytes();
    let mut reader = ByteReader::new(&bytes);
    assert_eq!(ViewMessage::de(&mut reader).unwrap(), message);
}

#[test]
fn position_correction_round_trips() {
    let message = HostMessage::PositionCorrection {
        position: Vec3::new(1.5, -64.0, 300.25),
        rotation: Rot::new(90.0, -12.5),
        on_ground: true,
    };
    let mut writer = ByteWriter::new();
    message.ser(&mut writer);
    let bytes = writer.to_bytes();
    let mut reader = ByteReader::new(&bytes);
    assert_eq!(HostMessage::de(&mut reader).unwrap(), message);
}

#[test]
fn truncated_input_yields_unexpected_end() {
    let message = ViewMessage::TransferToViewAck {
        view: ViewId::new(5),
    };
    let mut writer = ByteWriter::new();
    message.ser(&mut writer);
    let bytes = writer.to_bytes();

    // Drop the last byte; every prefix must fail cleanly, never panic
    let mut reader = ByteReader::new(&bytes[..bytes.len() - 1]);
    assert_eq!(ViewMessage::de(&mut reader), Err(SerdeErr::UnexpectedEnd));
}

#[test]
fn hostile_length_prefix_fails_cleanly() {
    // A ViewData whose payload length varint decodes to an absurd size
    // must fail like any other truncation, never panic
    let mut bytes = vec![2u8, 0, 0];
    bytes.extend_from_slice(&[0xff; 9]);
    bytes.push(0x01);
    let mut reader = ByteReader::new(&bytes);
    assert_eq!(ViewMessage::de(&mut reader), Err(SerdeErr::UnexpectedEnd));
}

#[test]
fn unknown_discriminant_is_rejected() {
    let bytes = [0xff, 0x00, 0x00];
    let mut reader = ByteReader::new(&bytes);
    assert_eq!(
        ViewMessage::de(&mut reader),
        Err(SerdeErr::InvalidDiscriminant {
            value: 0xff,
            type_name: "ViewMessage",
        })
    );
}
