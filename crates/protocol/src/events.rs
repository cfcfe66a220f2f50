//! Server game events
//!
//! Packet type `0xf754c8fe` is a container: a u32 subtype code followed by
//! the variant body. Start, end and jump notifications carry no fields and
//! are recognised only by their exact bytes.

use bytes::BytesMut;
use diana_core::{DriveType, Provenance, ShipType};
use serde::Serialize;

use crate::error::{ProtocolError, Result};
use crate::format::{layout, Value, Values};
use crate::packets::{exact, subtype_of, Decoded, PacketBody};

/// Number of player ships in a roster broadcast
pub const SHIP_COUNT: usize = 8;

const GAME_START_BYTES: [u8; 12] = [0x00, 0, 0, 0, 0x0a, 0, 0, 0, 0, 0, 0, 0];
const GAME_END_BYTES: [u8; 4] = [0x06, 0, 0, 0];
const JUMP_START_BYTES: [u8; 4] = [0x0c, 0, 0, 0];
const JUMP_END_BYTES: [u8; 4] = [0x0d, 0, 0, 0];

/// One player ship in the roster broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipSettings {
    pub drive: DriveType,
    pub ship_type: ShipType,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GameEvent {
    GameStart,
    GameEnd,
    Skybox { skybox: u32 },
    Popup { message: String },
    AutonomousDamcon { enabled: bool },
    JumpStart,
    JumpEnd,
    /// Exactly [`SHIP_COUNT`] entries
    AllShipSettings { ships: Vec<ShipSettings> },
    Dmx { flag: String, state: u32 },
}

impl GameEvent {
    pub const GAME_START: u32 = 0x00;
    pub const GAME_END: u32 = 0x06;
    pub const SKYBOX: u32 = 0x09;
    pub const POPUP: u32 = 0x0a;
    pub const AUTONOMOUS_DAMCON: u32 = 0x0b;
    pub const JUMP_START: u32 = 0x0c;
    pub const JUMP_END: u32 = 0x0d;
    pub const ALL_SHIP_SETTINGS: u32 = 0x0f;
    pub const DMX: u32 = 0x10;

    pub fn subtype(&self) -> u32 {
        match self {
            Self::GameStart => Self::GAME_START,
            Self::GameEnd => Self::GAME_END,
            Self::Skybox { .. } => Self::SKYBOX,
            Self::Popup { .. } => Self::POPUP,
            Self::AutonomousDamcon { .. } => Self::AUTONOMOUS_DAMCON,
            Self::JumpStart => Self::JUMP_START,
            Self::JumpEnd => Self::JUMP_END,
            Self::AllShipSettings { .. } => Self::ALL_SHIP_SETTINGS,
            Self::Dmx { .. } => Self::DMX,
        }
    }
}

fn wrong_ship_count(found: usize) -> ProtocolError {
    ProtocolError::WrongCount {
        what: "ship settings",
        expected: SHIP_COUNT,
        found,
    }
}

fn read_ship(mut record: Values) -> Result<ShipSettings> {
    let drive = record.u32()?;
    let ship_type = record.u32()?;
    Ok(ShipSettings {
        drive: DriveType::from_u32(drive).ok_or(ProtocolError::InvalidEnumValue {
            field: "drive type",
            value: drive,
        })?,
        ship_type: ShipType::from_u32(ship_type).ok_or(ProtocolError::InvalidEnumValue {
            field: "ship type",
            value: ship_type,
        })?,
        name: record.string()?,
    })
}

impl PacketBody for GameEvent {
    const PACKET_TYPE: u32 = 0xf754c8fe;
    const NAME: &'static str = "game event";
    const ORIGIN: Provenance = Provenance::Server;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        let subtype = Value::U32(self.subtype());
        match self {
            Self::GameStart => buf.extend_from_slice(&GAME_START_BYTES),
            Self::GameEnd => buf.extend_from_slice(&GAME_END_BYTES),
            Self::JumpStart => buf.extend_from_slice(&JUMP_START_BYTES),
            Self::JumpEnd => buf.extend_from_slice(&JUMP_END_BYTES),
            Self::Skybox { skybox } => layout!("II")?.encode(&[subtype, Value::U32(*skybox)], buf)?,
            Self::Popup { message } => {
                layout!("Iu")?.encode(&[subtype, Value::from(message.as_str())], buf)?
            }
            Self::AutonomousDamcon { enabled } => {
                layout!("IB")?.encode(&[subtype, Value::U8(u8::from(*enabled))], buf)?
            }
            Self::AllShipSettings { ships } => {
                if ships.len() != SHIP_COUNT {
                    return Err(wrong_ship_count(ships.len()));
                }
                let records = ships
                    .iter()
                    .map(|ship| {
                        vec![
                            Value::U32(ship.drive.as_u32()),
                            Value::U32(ship.ship_type.as_u32()),
                            Value::from(ship.name.as_str()),
                        ]
                    })
                    .collect();
                layout!("I[IIu]")?.encode(&[subtype, Value::Group(records)], buf)?
            }
            Self::Dmx { flag, state } => layout!("IuI")?.encode(
                &[subtype, Value::from(flag.as_str()), Value::U32(*state)],
                buf,
            )?,
        }
        Ok(())
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        let Some(subtype) = subtype_of(payload) else {
            return Ok(Decoded::Unrecognized);
        };

        let event = match subtype {
            Self::GAME_START => return Ok(exact(payload, &GAME_START_BYTES, Self::GameStart)),
            Self::GAME_END => return Ok(exact(payload, &GAME_END_BYTES, Self::GameEnd)),
            Self::JUMP_START => return Ok(exact(payload, &JUMP_START_BYTES, Self::JumpStart)),
            Self::JUMP_END => return Ok(exact(payload, &JUMP_END_BYTES, Self::JumpEnd)),
            Self::SKYBOX => {
                let mut values = Values::from(layout!("II")?.decode(payload)?);
                values.u32()?;
                Self::Skybox {
                    skybox: values.u32()?,
                }
            }
            Self::POPUP => {
                let mut values = Values::from(layout!("Iu")?.decode(payload)?);
                values.u32()?;
                Self::Popup {
                    message: values.string()?,
                }
            }
            Self::AUTONOMOUS_DAMCON => {
                let mut values = Values::from(layout!("IB")?.decode(payload)?);
                values.u32()?;
                Self::AutonomousDamcon {
                    enabled: values.u8()? != 0,
                }
            }
            Self::ALL_SHIP_SETTINGS => {
                let mut values = Values::from(layout!("I[IIu]")?.decode(payload)?);
                values.u32()?;
                let records = values.group()?;
                if records.len() != SHIP_COUNT {
                    return Err(wrong_ship_count(records.len()));
                }
                Self::AllShipSettings {
                    ships: records.into_iter().map(read_ship).collect::<Result<_>>()?,
                }
            }
            Self::DMX => {
                let mut values = Values::from(layout!("IuI")?.decode(payload)?);
                values.u32()?;
                Self::Dmx {
                    flag: values.string()?,
                    state: values.u32()?,
                }
            }
            _ => return Ok(Decoded::Unrecognized),
        };
        Ok(Decoded::Packet(event))
    }
}
