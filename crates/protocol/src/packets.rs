//! # Packet Definitions
//!
//! Every message that can travel inside a frame is a variant of [`Packet`].
//! Each variant wraps a type implementing [`PacketBody`], which knows its
//! 32-bit packet-type id and how to read and write its payload.
//!
//! Payloads that cannot be interpreted (unknown id, or a container packet with
//! an unknown subtype) are kept verbatim as [`UndecodedPacket`] so they can be
//! relayed byte-for-byte.

use bytes::{BufMut, Bytes, BytesMut};
use diana_core::Provenance;
use serde::Serialize;

use crate::commands::{ConsoleCommand, ControlCommand, ShipCommand};
use crate::error::Result;
use crate::events::GameEvent;
use crate::messages::*;
use crate::registry::PacketDescriptor;

/// Result of interpreting a payload that is structurally sound
///
/// `Unrecognized` is the soft failure: the packet type is known but the
/// payload matches none of its variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Packet(T),
    Unrecognized,
}

impl<T> Decoded<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Self::Packet(packet) => Decoded::Packet(f(packet)),
            Self::Unrecognized => Decoded::Unrecognized,
        }
    }

    pub fn packet(self) -> Option<T> {
        match self {
            Self::Packet(packet) => Some(packet),
            Self::Unrecognized => None,
        }
    }
}

/// A message body that can be carried in a frame
pub trait PacketBody: Sized {
    /// Packet-type id in the frame header
    const PACKET_TYPE: u32;

    /// Human-readable name, used in logs
    const NAME: &'static str;

    /// Side of the connection that sends this packet
    const ORIGIN: Provenance;

    /// Append the payload to `buf`
    fn write_body(&self, buf: &mut BytesMut) -> Result<()>;

    /// Interpret a complete payload
    fn read_body(payload: &[u8]) -> Result<Decoded<Self>>;
}

/// Payload kept as raw bytes because no decoder recognised it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndecodedPacket {
    pub packet_type: u32,
    pub payload: Bytes,
}

impl UndecodedPacket {
    pub fn new(packet_type: u32, payload: &[u8]) -> Self {
        Self {
            packet_type,
            payload: Bytes::copy_from_slice(payload),
        }
    }
}

macro_rules! packets {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// Any message that can appear in a frame
        #[derive(Debug, Clone, PartialEq, Serialize)]
        pub enum Packet {
            $($variant($ty),)*
            Undecoded(UndecodedPacket),
        }

        impl Packet {
            /// Packet-type id written to the frame header
            pub fn packet_type(&self) -> u32 {
                match self {
                    $(Self::$variant(_) => <$ty as PacketBody>::PACKET_TYPE,)*
                    Self::Undecoded(raw) => raw.packet_type,
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => <$ty as PacketBody>::NAME,)*
                    Self::Undecoded(_) => "undecoded",
                }
            }

            /// Append the payload (without frame header) to `buf`
            pub fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
                match self {
                    $(Self::$variant(body) => body.write_body(buf),)*
                    Self::Undecoded(raw) => {
                        buf.put_slice(&raw.payload);
                        Ok(())
                    }
                }
            }
        }

        $(
            impl From<$ty> for Packet {
                fn from(body: $ty) -> Self {
                    Self::$variant(body)
                }
            }
        )*

        /// One descriptor per registered packet type
        pub(crate) fn descriptors() -> Vec<PacketDescriptor> {
            vec![$(PacketDescriptor::of::<$ty>(),)*]
        }
    };
}

packets! {
    Welcome(WelcomePacket),
    Version(VersionPacket),
    Difficulty(DifficultyPacket),
    ConsoleStatus(ConsoleStatusPacket),
    Heartbeat(HeartbeatPacket),
    ObjectUpdate(ObjectUpdatePacket),
    DestroyObject(DestroyObjectPacket),
    IncomingMessage(IncomingMessagePacket),
    Intel(IntelPacket),
    GameEvent(GameEvent),
    ShipCommand(ShipCommand),
    ConsoleCommand(ConsoleCommand),
    ControlCommand(ControlCommand),
    CommsOutgoing(CommsOutgoingPacket),
}

impl From<UndecodedPacket> for Packet {
    fn from(raw: UndecodedPacket) -> Self {
        Self::Undecoded(raw)
    }
}

/// Leading subtype code of a container payload, if there is room for one
pub(crate) fn subtype_of(payload: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Accept `payload` only if it is exactly `expected`
pub(crate) fn exact<T>(payload: &[u8], expected: &[u8], value: T) -> Decoded<T> {
    if payload == expected {
        Decoded::Packet(value)
    } else {
        Decoded::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtype_of_needs_four_bytes() {
        assert_eq!(subtype_of(&[]), None);
        assert_eq!(subtype_of(&[1, 0, 0]), None);
        assert_eq!(subtype_of(&[0x0a, 0, 0, 0, 9]), Some(0x0a));
    }

    #[test]
    fn test_undecoded_writes_payload_verbatim() {
        let packet = Packet::from(UndecodedPacket::new(0x1234_5678, &[1, 2, 3]));
        let mut buf = BytesMut::new();
        packet.write_body(&mut buf).unwrap();
        assert_eq!(&buf[..], &[1, 2, 3]);
        assert_eq!(packet.packet_type(), 0x1234_5678);
        assert_eq!(packet.name(), "undecoded");
    }

    #[test]
    fn test_packet_type_comes_from_body() {
        let packet = Packet::from(HeartbeatPacket);
        assert_eq!(packet.packet_type(), HeartbeatPacket::PACKET_TYPE);
        assert_eq!(packet.name(), "heartbeat");
    }
}
