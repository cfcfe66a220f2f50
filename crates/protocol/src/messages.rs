//! # Flat Message Structures
//!
//! Messages whose payload has a single fixed layout. Layouts use the
//! [`crate::format`] grammar and are parsed once per process.
//!
//! Server-origin:
//! ```text
//! 0x6d04b3da  welcome           raw ASCII
//! 0xe548e74a  version           IfIII
//! 0x3de66711  difficulty        II
//! 0x19c6e2d4  console status    I[B]
//! 0xf5821226  heartbeat         (empty)
//! 0x80803df9  object update     record stream, see object_update
//! 0xcc5a3e30  destroy object    BI
//! 0xd672c35f  incoming message  Iuu
//! 0xee665279  intel             IBu
//! ```
//! Client-origin:
//! ```text
//! 0x574c4c4b  comms outgoing    IIIII
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use diana_core::{Console, ConsoleStatus, GameType, ObjectKind, Provenance};
use serde::{Serialize, Serializer};

use crate::error::{ProtocolError, Result};
use crate::format::{layout, Value, Values};
use crate::object_update::{self, ObjectRecord};
use crate::packets::{Decoded, PacketBody};

// ============================================================================
// CONNECTION SETUP
// ============================================================================

/// Greeting sent by the server as soon as a client connects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WelcomePacket {
    pub message: String,
}

impl WelcomePacket {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl PacketBody for WelcomePacket {
    const PACKET_TYPE: u32 = 0x6d04b3da;
    const NAME: &'static str = "welcome";
    const ORIGIN: Provenance = Provenance::Server;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        if !self.message.is_ascii() {
            return Err(ProtocolError::InvalidData(
                "Welcome message must be ASCII".into(),
            ));
        }
        buf.put_slice(self.message.as_bytes());
        Ok(())
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        if !payload.is_ascii() {
            return Err(ProtocolError::InvalidData(
                "Welcome message is not ASCII".into(),
            ));
        }
        let message = String::from_utf8(payload.to_vec())
            .map_err(|e| ProtocolError::InvalidData(format!("Invalid welcome text: {}", e)))?;
        Ok(Decoded::Packet(Self { message }))
    }
}

/// Server protocol version
///
/// # Packet Format
/// ```text
/// {I unknown=0}{f legacy "major.minor"}{I major}{I minor}{I patch}
/// ```
/// The legacy float is derived from major and minor on write and ignored on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionPacket {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl VersionPacket {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Version as the single float older clients expect, e.g. 2.1 for 2.1.x
    pub fn legacy_version(&self) -> f32 {
        format!("{}.{}", self.major, self.minor)
            .parse()
            .unwrap_or_default()
    }
}

impl PacketBody for VersionPacket {
    const PACKET_TYPE: u32 = 0xe548e74a;
    const NAME: &'static str = "version";
    const ORIGIN: Provenance = Provenance::Server;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        layout!("IfIII")?.encode(
            &[
                Value::U32(0),
                Value::F32(self.legacy_version()),
                Value::U32(self.major),
                Value::U32(self.minor),
                Value::U32(self.patch),
            ],
            buf,
        )
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        let mut values = Values::from(layout!("IfIII")?.decode(payload)?);
        let _unknown = values.u32()?;
        let _legacy = values.f32()?;
        Ok(Decoded::Packet(Self {
            major: values.u32()?,
            minor: values.u32()?,
            patch: values.u32()?,
        }))
    }
}

/// Difficulty and scenario chosen for the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DifficultyPacket {
    pub difficulty: u32,
    pub game_type: GameType,
}

impl PacketBody for DifficultyPacket {
    const PACKET_TYPE: u32 = 0x3de66711;
    const NAME: &'static str = "difficulty";
    const ORIGIN: Provenance = Provenance::Server;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        layout!("II")?.encode(
            &[Value::U32(self.difficulty), Value::U32(self.game_type.as_u32())],
            buf,
        )
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        let mut values = Values::from(layout!("II")?.decode(payload)?);
        let difficulty = values.u32()?;
        let raw = values.u32()?;
        let game_type = GameType::from_u32(raw).ok_or(ProtocolError::InvalidEnumValue {
            field: "game type",
            value: raw,
        })?;
        Ok(Decoded::Packet(Self {
            difficulty,
            game_type,
        }))
    }
}

/// Which consoles on a ship are taken
///
/// # Packet Format
/// ```text
/// {I ship}{B status} x 10, one per console in wire order
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleStatusPacket {
    pub ship: u32,
    pub statuses: [ConsoleStatus; Console::ALL.len()],
}

impl ConsoleStatusPacket {
    pub fn status(&self, console: Console) -> ConsoleStatus {
        self.statuses[console as usize]
    }
}

impl PacketBody for ConsoleStatusPacket {
    const PACKET_TYPE: u32 = 0x19c6e2d4;
    const NAME: &'static str = "console status";
    const ORIGIN: Provenance = Provenance::Server;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        let statuses = self
            .statuses
            .iter()
            .map(|status| vec![Value::U8(status.as_u8())])
            .collect();
        layout!("I[B]")?.encode(&[Value::U32(self.ship), Value::Group(statuses)], buf)
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        let mut values = Values::from(layout!("I[B]")?.decode(payload)?);
        let ship = values.u32()?;
        let statuses = values
            .group()?
            .into_iter()
            .map(|mut record| {
                let raw = record.u8()?;
                ConsoleStatus::from_u8(raw).ok_or(ProtocolError::InvalidEnumValue {
                    field: "console status",
                    value: raw.into(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let found = statuses.len();
        let statuses = statuses.try_into().map_err(|_| ProtocolError::WrongCount {
            what: "console statuses",
            expected: Console::ALL.len(),
            found,
        })?;
        Ok(Decoded::Packet(Self { ship, statuses }))
    }
}

/// Keep-alive with no payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeartbeatPacket;

impl PacketBody for HeartbeatPacket {
    const PACKET_TYPE: u32 = 0xf5821226;
    const NAME: &'static str = "heartbeat";
    const ORIGIN: Provenance = Provenance::Server;

    fn write_body(&self, _buf: &mut BytesMut) -> Result<()> {
        Ok(())
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        if !payload.is_empty() {
            return Err(ProtocolError::InvalidData("Payload in heartbeat".into()));
        }
        Ok(Decoded::Packet(Self))
    }
}

// ============================================================================
// WORLD STATE
// ============================================================================

/// Bulk state update for simulation entities
///
/// The payload is kept as received and re-encoded verbatim. Records are
/// decoded on demand with [`records`](Self::records), so a layout this
/// decoder does not understand never breaks the surrounding stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUpdatePacket {
    pub raw: Bytes,
}

impl ObjectUpdatePacket {
    pub fn new(raw: impl Into<Bytes>) -> Self {
        Self { raw: raw.into() }
    }

    /// Decode every record, failing on the first structural error
    pub fn records(&self) -> Result<Vec<ObjectRecord>> {
        object_update::decode_records(&self.raw)
    }

    /// Decode every record, treating any structural error as "no records"
    pub fn records_or_empty(&self) -> Vec<ObjectRecord> {
        self.records().unwrap_or_else(|e| {
            tracing::warn!("Discarding undecodable object update ({} bytes): {}", self.raw.len(), e);
            Vec::new()
        })
    }
}

impl Serialize for ObjectUpdatePacket {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records_or_empty())
    }
}

impl PacketBody for ObjectUpdatePacket {
    const PACKET_TYPE: u32 = 0x80803df9;
    const NAME: &'static str = "object update";
    const ORIGIN: Provenance = Provenance::Server;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_slice(&self.raw);
        Ok(())
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        Ok(Decoded::Packet(Self::new(Bytes::copy_from_slice(payload))))
    }
}

/// An entity left the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DestroyObjectPacket {
    pub kind: ObjectKind,
    pub object_id: u32,
}

impl PacketBody for DestroyObjectPacket {
    const PACKET_TYPE: u32 = 0xcc5a3e30;
    const NAME: &'static str = "destroy object";
    const ORIGIN: Provenance = Provenance::Server;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        layout!("BI")?.encode(&[Value::U8(self.kind.as_u8()), Value::U32(self.object_id)], buf)
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        let mut values = Values::from(layout!("BI")?.decode(payload)?);
        let raw = values.u8()?;
        let kind = ObjectKind::from_u8(raw).ok_or(ProtocolError::InvalidEnumValue {
            field: "object type",
            value: raw.into(),
        })?;
        Ok(Decoded::Packet(Self {
            kind,
            object_id: values.u32()?,
        }))
    }
}

// ============================================================================
// COMMUNICATION
// ============================================================================

/// Text message arriving at the comms console
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncomingMessagePacket {
    pub priority: u32,
    pub sender: String,
    pub message: String,
}

impl PacketBody for IncomingMessagePacket {
    const PACKET_TYPE: u32 = 0xd672c35f;
    const NAME: &'static str = "incoming message";
    const ORIGIN: Provenance = Provenance::Server;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        layout!("Iuu")?.encode(
            &[
                Value::U32(self.priority),
                Value::from(self.sender.as_str()),
                Value::from(self.message.as_str()),
            ],
            buf,
        )
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        let mut values = Values::from(layout!("Iuu")?.decode(payload)?);
        Ok(Decoded::Packet(Self {
            priority: values.u32()?,
            sender: values.string()?,
            message: values.string()?,
        }))
    }
}

/// Science intel about a scanned object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntelPacket {
    pub object_id: u32,
    pub intel_kind: u8,
    pub text: String,
}

impl PacketBody for IntelPacket {
    const PACKET_TYPE: u32 = 0xee665279;
    const NAME: &'static str = "intel";
    const ORIGIN: Provenance = Provenance::Server;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        layout!("IBu")?.encode(
            &[
                Value::U32(self.object_id),
                Value::U8(self.intel_kind),
                Value::from(self.text.as_str()),
            ],
            buf,
        )
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        let mut values = Values::from(layout!("IBu")?.decode(payload)?);
        Ok(Decoded::Packet(Self {
            object_id: values.u32()?,
            intel_kind: values.u8()?,
            text: values.string()?,
        }))
    }
}

/// Canned comms message sent by a client
///
/// All fields are opaque codes chosen by the comms console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommsOutgoingPacket {
    pub recipient_type: u32,
    pub recipient: u32,
    pub message: u32,
    pub target: u32,
    pub argument: u32,
}

impl PacketBody for CommsOutgoingPacket {
    const PACKET_TYPE: u32 = 0x574c4c4b;
    const NAME: &'static str = "comms outgoing";
    const ORIGIN: Provenance = Provenance::Client;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        layout!("IIIII")?.encode(
            &[
                Value::U32(self.recipient_type),
                Value::U32(self.recipient),
                Value::U32(self.message),
                Value::U32(self.target),
                Value::U32(self.argument),
            ],
            buf,
        )
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        let mut values = Values::from(layout!("IIIII")?.decode(payload)?);
        Ok(Decoded::Packet(Self {
            recipient_type: values.u32()?,
            recipient: values.u32()?,
            message: values.u32()?,
            target: values.u32()?,
            argument: values.u32()?,
        }))
    }
}
