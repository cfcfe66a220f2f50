use bytes::BytesMut;
use diana_core::{
    Console, ConsoleStatus, DriveType, GameType, MainView, ObjectKind, OrdnanceType, Provenance,
    ShipSystem, ShipType,
};
use diana_protocol::object_update::{ObjectFields, PositionFields};
use diana_protocol::*;
use proptest::prelude::*;
use tokio_util::codec::Decoder;

fn server_packets() -> Vec<Packet> {
    let ships = (0..SHIP_COUNT)
        .map(|i| ShipSettings {
            drive: DriveType::Warp,
            ship_type: ShipType::Battleship,
            name: format!("Ship {}", i),
        })
        .collect();

    vec![
        WelcomePacket::new("Welcome to eyes").into(),
        VersionPacket::new(2, 1, 1).into(),
        DifficultyPacket {
            difficulty: 3,
            game_type: GameType::Siege,
        }
        .into(),
        ConsoleStatusPacket {
            ship: 1,
            statuses: [ConsoleStatus::Available; Console::ALL.len()],
        }
        .into(),
        HeartbeatPacket.into(),
        ObjectUpdatePacket::new(vec![0x06, 0x20, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x80, 0x3f, 0x00])
            .into(),
        DestroyObjectPacket {
            kind: ObjectKind::Torpedo,
            object_id: 0x20,
        }
        .into(),
        IncomingMessagePacket {
            priority: 0,
            sender: "Tauron".into(),
            message: "Surrender!".into(),
        }
        .into(),
        IntelPacket {
            object_id: 5,
            intel_kind: 1,
            text: "Nothing to report".into(),
        }
        .into(),
        GameEvent::AllShipSettings { ships }.into(),
        GameEvent::JumpEnd.into(),
    ]
}

fn client_packets() -> Vec<Packet> {
    vec![
        ShipCommand::SetMainScreen {
            view: MainView::LongRange,
        }
        .into(),
        ShipCommand::ToggleShields.into(),
        ConsoleCommand::LoadTube {
            tube: 0,
            ordnance: OrdnanceType::Missile,
        }
        .into(),
        ControlCommand::EngSetEnergy {
            energy: 0.5,
            system: ShipSystem::Impulse,
        }
        .into(),
        CommsOutgoingPacket {
            recipient_type: 0,
            recipient: 1,
            message: 2,
            target: 3,
            argument: 4,
        }
        .into(),
    ]
}

fn encode_all(packets: &[Packet], provenance: Provenance) -> Vec<u8> {
    let mut wire = BytesMut::new();
    for packet in packets {
        frame::encode_into(packet, provenance, &mut wire).unwrap();
    }
    wire.to_vec()
}

#[test]
fn every_packet_survives_a_frame_roundtrip() {
    for (packets, provenance) in [
        (server_packets(), Provenance::Server),
        (client_packets(), Provenance::Client),
    ] {
        for packet in packets {
            let wire = frame::encode(&packet, provenance).unwrap();
            let (decoded, rest) = frame::decode(&wire, provenance).unwrap();
            assert_eq!(decoded, vec![packet]);
            assert!(rest.is_empty());
        }
    }
}

#[test]
fn object_update_records_decode_on_demand() {
    let wire = encode_all(&server_packets()[5..6], Provenance::Server);
    let (decoded, _) = frame::decode(&wire, Provenance::Server).unwrap();
    let Packet::ObjectUpdate(update) = &decoded[0] else {
        panic!("expected an object update");
    };

    let records = update.records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].object_id, 0x20);
    assert_eq!(
        records[0].fields,
        ObjectFields::Mine(PositionFields {
            x: Some(1.0),
            ..Default::default()
        })
    );
}

#[test]
fn unrecognised_variants_relay_byte_for_byte() {
    let mut wire = BytesMut::new();
    // ship command with an unassigned subtype
    frame::encode_into(
        &UndecodedPacket::new(ShipCommand::PACKET_TYPE, &[0x05, 0, 0, 0, 7, 0, 0, 0]).into(),
        Provenance::Client,
        &mut wire,
    )
    .unwrap();
    // toggle carrying a nonzero argument
    frame::encode_into(
        &UndecodedPacket::new(ShipCommand::PACKET_TYPE, &[0x03, 0, 0, 0, 1, 0, 0, 0]).into(),
        Provenance::Client,
        &mut wire,
    )
    .unwrap();

    let (decoded, rest) = frame::decode(&wire, Provenance::Client).unwrap();
    assert!(rest.is_empty());
    assert!(decoded.iter().all(|packet| matches!(packet, Packet::Undecoded(_))));
    assert_eq!(encode_all(&decoded, Provenance::Client), wire.to_vec());
}

#[test]
fn codec_matches_slice_decoder() {
    let wire = encode_all(&server_packets(), Provenance::Server);
    let mut buf = BytesMut::from(&wire[..]);
    let mut codec = FrameCodec::client();

    let mut via_codec = Vec::new();
    while let Some(packet) = codec.decode(&mut buf).unwrap() {
        via_codec.push(packet);
    }
    let (via_slice, _) = frame::decode(&wire, Provenance::Server).unwrap();
    assert_eq!(via_codec, via_slice);
}

proptest! {
    #[test]
    fn prop_chunked_stream_yields_each_packet_once(
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..16),
    ) {
        let packets = server_packets();
        let wire = encode_all(&packets, Provenance::Server);

        let mut cuts: Vec<usize> = cuts.iter().map(|cut| cut.index(wire.len() + 1)).collect();
        cuts.push(wire.len());
        cuts.sort_unstable();

        let mut pending = Vec::new();
        let mut received = Vec::new();
        let mut last = 0;
        for cut in cuts {
            pending.extend_from_slice(&wire[last..cut]);
            last = cut;
            let (decoded, rest) = frame::decode(&pending, Provenance::Server).unwrap();
            received.extend(decoded);
            pending = rest.to_vec();
        }

        prop_assert!(pending.is_empty());
        prop_assert_eq!(received, packets);
    }

    #[test]
    fn prop_strings_roundtrip(text in "\\PC{0,40}") {
        let packet: Packet = IncomingMessagePacket {
            priority: 1,
            sender: text.clone(),
            message: text,
        }
        .into();
        let wire = frame::encode(&packet, Provenance::Server).unwrap();
        let (decoded, _) = frame::decode(&wire, Provenance::Server).unwrap();
        prop_assert_eq!(decoded, vec![packet]);
    }
}
