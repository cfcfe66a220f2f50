//! Packet-type registry
//!
//! A process-wide table from packet-type id to decoder, built on first use
//! and read-only afterwards.

use std::collections::HashMap;
use std::sync::OnceLock;

use diana_core::Provenance;

use crate::error::Result;
use crate::packets::{descriptors, Decoded, Packet, PacketBody, UndecodedPacket};

type DecodeFn = fn(&[u8]) -> Result<Decoded<Packet>>;

/// Everything the frame layer needs to know about one packet type
#[derive(Clone, Copy)]
pub struct PacketDescriptor {
    pub packet_type: u32,
    pub name: &'static str,
    pub origin: Provenance,
    decode: DecodeFn,
}

impl PacketDescriptor {
    pub(crate) fn of<T>() -> Self
    where
        T: PacketBody + Into<Packet>,
    {
        Self {
            packet_type: T::PACKET_TYPE,
            name: T::NAME,
            origin: T::ORIGIN,
            decode: decode_as::<T>,
        }
    }

    /// Interpret a payload of this packet type
    pub fn decode(&self, payload: &[u8]) -> Result<Decoded<Packet>> {
        (self.decode)(payload)
    }
}

fn decode_as<T>(payload: &[u8]) -> Result<Decoded<Packet>>
where
    T: PacketBody + Into<Packet>,
{
    Ok(T::read_body(payload)?.map(Into::into))
}

impl std::fmt::Debug for PacketDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketDescriptor")
            .field("packet_type", &format_args!("{:#010x}", self.packet_type))
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish()
    }
}

static REGISTRY: OnceLock<HashMap<u32, PacketDescriptor>> = OnceLock::new();

/// All known packet types, keyed by id
pub fn registry() -> &'static HashMap<u32, PacketDescriptor> {
    REGISTRY.get_or_init(|| {
        descriptors()
            .into_iter()
            .map(|descriptor| (descriptor.packet_type, descriptor))
            .collect()
    })
}

pub fn lookup(packet_type: u32) -> Option<&'static PacketDescriptor> {
    registry().get(&packet_type)
}

/// Decode one payload, falling back to [`Packet::Undecoded`]
///
/// Unknown ids and unrecognised variants are kept verbatim. Only structural
/// errors inside a recognised layout are returned as `Err`.
pub fn decode_packet(packet_type: u32, payload: &[u8]) -> Result<Packet> {
    let Some(descriptor) = lookup(packet_type) else {
        tracing::debug!(
            "Unknown packet type {:#010x} ({} bytes), keeping raw payload",
            packet_type,
            payload.len()
        );
        return Ok(UndecodedPacket::new(packet_type, payload).into());
    };

    match descriptor.decode(payload)? {
        Decoded::Packet(packet) => Ok(packet),
        Decoded::Unrecognized => {
            tracing::debug!(
                "Unrecognised {} variant ({} bytes), keeping raw payload",
                descriptor.name,
                payload.len()
            );
            Ok(UndecodedPacket::new(packet_type, payload).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GameEvent, HeartbeatPacket, ShipCommand};

    #[test]
    fn test_registry_has_every_packet_type() {
        assert_eq!(registry().len(), 14);
        let heartbeat = lookup(HeartbeatPacket::PACKET_TYPE).unwrap();
        assert_eq!(heartbeat.name, "heartbeat");
        assert_eq!(heartbeat.origin, Provenance::Server);
        assert_eq!(lookup(ShipCommand::PACKET_TYPE).unwrap().origin, Provenance::Client);
        assert!(lookup(0x1234_5678).is_none());
    }

    #[test]
    fn test_known_packet_decodes() {
        assert_eq!(
            decode_packet(GameEvent::PACKET_TYPE, &[0x06, 0, 0, 0]),
            Ok(Packet::GameEvent(GameEvent::GameEnd))
        );
    }

    #[test]
    fn test_fallbacks_keep_payload() {
        let unknown = decode_packet(0x1234_5678, &[9, 9]).unwrap();
        assert_eq!(unknown, Packet::Undecoded(UndecodedPacket::new(0x1234_5678, &[9, 9])));

        let unrecognised = decode_packet(GameEvent::PACKET_TYPE, &[0x07, 0, 0, 0]).unwrap();
        assert_eq!(
            unrecognised,
            Packet::Undecoded(UndecodedPacket::new(GameEvent::PACKET_TYPE, &[0x07, 0, 0, 0]))
        );
    }

    #[test]
    fn test_structural_errors_propagate() {
        assert!(decode_packet(HeartbeatPacket::PACKET_TYPE, &[1]).is_err());
    }
}
