//! # Client Command Containers
//!
//! Three packet types carry a 4-byte subtype code followed by a variant body.
//!
//! ```text
//! 0x4c821d3c  ship command     {I subtype}{I argument} for most variants
//! 0x69cc01d9  console command  {I subtype}{I}{I}{I}{I}
//! 0x0351a5ac  control command  {I subtype}{f ...}
//! ```
//!
//! Zero-argument ship commands are matched by exact byte pattern
//! (`<subtype> 00000000`). Anything else under these ids decodes as
//! [`Decoded::Unrecognized`].

use bytes::BytesMut;
use diana_core::{Console, DriveType, MainView, OrdnanceType, Provenance, ShipSystem, ShipType};
use serde::Serialize;

use crate::error::{ProtocolError, Result};
use crate::format::{layout, Format, Value, Values};
use crate::packets::{exact, subtype_of, Decoded, PacketBody};

/// Wire value meaning "nothing selected" in target fields
pub const NO_TARGET: u32 = 1;

fn target_to_wire(target: Option<u32>) -> u32 {
    target.unwrap_or(NO_TARGET)
}

/// Object id `1` cannot be told apart from "no target"
fn target_from_wire(value: u32) -> Option<u32> {
    (value != NO_TARGET).then_some(value)
}

/// Decode a whole container payload and step past the subtype word
fn body(format: Result<&'static Format>, payload: &[u8]) -> Result<Values> {
    let mut values = Values::from(format?.decode(payload)?);
    values.u32()?;
    Ok(values)
}

fn enum_value<T>(field: &'static str, value: u32, convert: impl FnOnce(u32) -> Option<T>) -> Result<T> {
    convert(value).ok_or(ProtocolError::InvalidEnumValue { field, value })
}

/// The exact payload of a zero-argument ship command
fn toggle_bytes(subtype: u32) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes[..4].copy_from_slice(&subtype.to_le_bytes());
    bytes
}

// ============================================================================
// SHIP COMMANDS
// ============================================================================

/// Bridge orders sent by a client console
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ShipCommand {
    HelmSetWarp { factor: u32 },
    SetMainScreen { view: MainView },
    SetWeaponsTarget { target: Option<u32> },
    ToggleAutoBeams,
    ToggleShields,
    HelmRequestDock,
    ToggleRedAlert,
    SetBeamFrequency { frequency: u32 },
    ToggleAutoDamcon,
    SetShip { ship: u32 },
    SetConsole { console: Console, selected: bool },
    Ready,
    ScienceSelect { target: Option<u32> },
    CaptainSelect { target: Option<u32> },
    GameMasterSelect { target: Option<u32> },
    ScienceScan { target: u32 },
    SetShipSettings {
        drive: DriveType,
        ship_type: ShipType,
        name: String,
    },
    HelmToggleReverse,
    Ready2,
    TogglePerspective,
    ClimbDive { direction: i32 },
}

impl ShipCommand {
    pub const HELM_SET_WARP: u32 = 0x00;
    pub const SET_MAIN_SCREEN: u32 = 0x01;
    pub const SET_WEAPONS_TARGET: u32 = 0x02;
    pub const TOGGLE_AUTO_BEAMS: u32 = 0x03;
    pub const TOGGLE_SHIELDS: u32 = 0x04;
    pub const HELM_REQUEST_DOCK: u32 = 0x07;
    pub const TOGGLE_RED_ALERT: u32 = 0x0a;
    pub const SET_BEAM_FREQUENCY: u32 = 0x0b;
    pub const TOGGLE_AUTO_DAMCON: u32 = 0x0c;
    pub const SET_SHIP: u32 = 0x0d;
    pub const SET_CONSOLE: u32 = 0x0e;
    pub const READY: u32 = 0x0f;
    pub const SCIENCE_SELECT: u32 = 0x10;
    pub const CAPTAIN_SELECT: u32 = 0x11;
    pub const GAME_MASTER_SELECT: u32 = 0x12;
    pub const SCIENCE_SCAN: u32 = 0x13;
    pub const SET_SHIP_SETTINGS: u32 = 0x16;
    pub const HELM_TOGGLE_REVERSE: u32 = 0x18;
    pub const READY2: u32 = 0x19;
    pub const TOGGLE_PERSPECTIVE: u32 = 0x1a;
    pub const CLIMB_DIVE: u32 = 0x1b;

    /// Subtype code written after the packet-type id
    pub fn subtype(&self) -> u32 {
        match self {
            Self::HelmSetWarp { .. } => Self::HELM_SET_WARP,
            Self::SetMainScreen { .. } => Self::SET_MAIN_SCREEN,
            Self::SetWeaponsTarget { .. } => Self::SET_WEAPONS_TARGET,
            Self::ToggleAutoBeams => Self::TOGGLE_AUTO_BEAMS,
            Self::ToggleShields => Self::TOGGLE_SHIELDS,
            Self::HelmRequestDock => Self::HELM_REQUEST_DOCK,
            Self::ToggleRedAlert => Self::TOGGLE_RED_ALERT,
            Self::SetBeamFrequency { .. } => Self::SET_BEAM_FREQUENCY,
            Self::ToggleAutoDamcon => Self::TOGGLE_AUTO_DAMCON,
            Self::SetShip { .. } => Self::SET_SHIP,
            Self::SetConsole { .. } => Self::SET_CONSOLE,
            Self::Ready => Self::READY,
            Self::ScienceSelect { .. } => Self::SCIENCE_SELECT,
            Self::CaptainSelect { .. } => Self::CAPTAIN_SELECT,
            Self::GameMasterSelect { .. } => Self::GAME_MASTER_SELECT,
            Self::ScienceScan { .. } => Self::SCIENCE_SCAN,
            Self::SetShipSettings { .. } => Self::SET_SHIP_SETTINGS,
            Self::HelmToggleReverse => Self::HELM_TOGGLE_REVERSE,
            Self::Ready2 => Self::READY2,
            Self::TogglePerspective => Self::TOGGLE_PERSPECTIVE,
            Self::ClimbDive { .. } => Self::CLIMB_DIVE,
        }
    }
}

impl PacketBody for ShipCommand {
    const PACKET_TYPE: u32 = 0x4c821d3c;
    const NAME: &'static str = "ship command";
    const ORIGIN: Provenance = Provenance::Client;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        let subtype = Value::U32(self.subtype());
        match self {
            Self::HelmSetWarp { factor } => layout!("II")?.encode(&[subtype, Value::U32(*factor)], buf),
            Self::SetMainScreen { view } => layout!("II")?.encode(&[subtype, Value::U32(view.as_u32())], buf),
            Self::SetWeaponsTarget { target }
            | Self::ScienceSelect { target }
            | Self::CaptainSelect { target }
            | Self::GameMasterSelect { target } => {
                layout!("II")?.encode(&[subtype, Value::U32(target_to_wire(*target))], buf)
            }
            Self::SetBeamFrequency { frequency } => {
                layout!("II")?.encode(&[subtype, Value::U32(*frequency)], buf)
            }
            Self::SetShip { ship } => layout!("II")?.encode(&[subtype, Value::U32(*ship)], buf),
            Self::SetConsole { console, selected } => layout!("III")?.encode(
                &[subtype, Value::U32(console.as_u32()), Value::U32(u32::from(*selected))],
                buf,
            ),
            Self::ScienceScan { target } => layout!("II")?.encode(&[subtype, Value::U32(*target)], buf),
            Self::SetShipSettings {
                drive,
                ship_type,
                name,
            } => layout!("IIIu")?.encode(
                &[
                    subtype,
                    Value::U32(drive.as_u32()),
                    Value::U32(ship_type.as_u32()),
                    Value::from(name.as_str()),
                ],
                buf,
            ),
            Self::ClimbDive { direction } => layout!("Ii")?.encode(&[subtype, Value::I32(*direction)], buf),
            Self::ToggleAutoBeams
            | Self::ToggleShields
            | Self::HelmRequestDock
            | Self::ToggleRedAlert
            | Self::ToggleAutoDamcon
            | Self::Ready
            | Self::HelmToggleReverse
            | Self::Ready2
            | Self::TogglePerspective => layout!("II")?.encode(&[subtype, Value::U32(0)], buf),
        }
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        let Some(subtype) = subtype_of(payload) else {
            return Ok(Decoded::Unrecognized);
        };
        let toggle = |command: Self| Ok(exact(payload, &toggle_bytes(subtype), command));

        let command = match subtype {
            Self::HELM_SET_WARP => Self::HelmSetWarp {
                factor: body(layout!("II"), payload)?.u32()?,
            },
            Self::SET_MAIN_SCREEN => {
                let raw = body(layout!("II"), payload)?.u32()?;
                Self::SetMainScreen {
                    view: enum_value("main view", raw, MainView::from_u32)?,
                }
            }
            Self::SET_WEAPONS_TARGET => Self::SetWeaponsTarget {
                target: target_from_wire(body(layout!("II"), payload)?.u32()?),
            },
            Self::SET_BEAM_FREQUENCY => Self::SetBeamFrequency {
                frequency: body(layout!("II"), payload)?.u32()?,
            },
            Self::SET_SHIP => Self::SetShip {
                ship: body(layout!("II"), payload)?.u32()?,
            },
            Self::SET_CONSOLE => {
                let mut values = body(layout!("III"), payload)?;
                Self::SetConsole {
                    console: enum_value("console", values.u32()?, Console::from_u32)?,
                    selected: values.u32()? != 0,
                }
            }
            Self::SCIENCE_SELECT => Self::ScienceSelect {
                target: target_from_wire(body(layout!("II"), payload)?.u32()?),
            },
            Self::CAPTAIN_SELECT => Self::CaptainSelect {
                target: target_from_wire(body(layout!("II"), payload)?.u32()?),
            },
            Self::GAME_MASTER_SELECT => Self::GameMasterSelect {
                target: target_from_wire(body(layout!("II"), payload)?.u32()?),
            },
            Self::SCIENCE_SCAN => Self::ScienceScan {
                target: body(layout!("II"), payload)?.u32()?,
            },
            Self::SET_SHIP_SETTINGS => {
                let mut values = body(layout!("IIIu"), payload)?;
                Self::SetShipSettings {
                    drive: enum_value("drive type", values.u32()?, DriveType::from_u32)?,
                    ship_type: enum_value("ship type", values.u32()?, ShipType::from_u32)?,
                    name: values.string()?,
                }
            }
            Self::CLIMB_DIVE => Self::ClimbDive {
                direction: body(layout!("Ii"), payload)?.i32()?,
            },
            Self::TOGGLE_AUTO_BEAMS => return toggle(Self::ToggleAutoBeams),
            Self::TOGGLE_SHIELDS => return toggle(Self::ToggleShields),
            Self::HELM_REQUEST_DOCK => return toggle(Self::HelmRequestDock),
            Self::TOGGLE_RED_ALERT => return toggle(Self::ToggleRedAlert),
            Self::TOGGLE_AUTO_DAMCON => return toggle(Self::ToggleAutoDamcon),
            Self::READY => return toggle(Self::Ready),
            Self::HELM_TOGGLE_REVERSE => return toggle(Self::HelmToggleReverse),
            Self::READY2 => return toggle(Self::Ready2),
            Self::TOGGLE_PERSPECTIVE => return toggle(Self::TogglePerspective),
            _ => return Ok(Decoded::Unrecognized),
        };
        Ok(Decoded::Packet(command))
    }
}

// ============================================================================
// CONSOLE COMMANDS
// ============================================================================

/// Engineering and weapons orders with a fixed five-word body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConsoleCommand {
    EngSendDamcon { team: u32, x: u32, y: u32, z: u32 },
    LoadTube { tube: u32, ordnance: OrdnanceType },
    EngSetCoolant { system: ShipSystem, coolant: u32 },
}

impl ConsoleCommand {
    pub const ENG_SEND_DAMCON: u32 = 0x00;
    pub const LOAD_TUBE: u32 = 0x02;
    pub const ENG_SET_COOLANT: u32 = 0x04;

    pub fn subtype(&self) -> u32 {
        match self {
            Self::EngSendDamcon { .. } => Self::ENG_SEND_DAMCON,
            Self::LoadTube { .. } => Self::LOAD_TUBE,
            Self::EngSetCoolant { .. } => Self::ENG_SET_COOLANT,
        }
    }

    fn words(&self) -> [u32; 4] {
        match self {
            Self::EngSendDamcon { team, x, y, z } => [*team, *x, *y, *z],
            Self::LoadTube { tube, ordnance } => [*tube, ordnance.as_u32(), 0, 0],
            Self::EngSetCoolant { system, coolant } => [system.as_u32(), *coolant, 0, 0],
        }
    }
}

impl PacketBody for ConsoleCommand {
    const PACKET_TYPE: u32 = 0x69cc01d9;
    const NAME: &'static str = "console command";
    const ORIGIN: Provenance = Provenance::Client;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        let mut values = vec![Value::U32(self.subtype())];
        values.extend(self.words().into_iter().map(Value::U32));
        layout!("IIIII")?.encode(&values, buf)
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        let Some(subtype) = subtype_of(payload) else {
            return Ok(Decoded::Unrecognized);
        };
        if !matches!(
            subtype,
            Self::ENG_SEND_DAMCON | Self::LOAD_TUBE | Self::ENG_SET_COOLANT
        ) {
            return Ok(Decoded::Unrecognized);
        }

        let mut values = body(layout!("IIIII"), payload)?;
        let words = [values.u32()?, values.u32()?, values.u32()?, values.u32()?];
        let command = match subtype {
            Self::ENG_SEND_DAMCON => Self::EngSendDamcon {
                team: words[0],
                x: words[1],
                y: words[2],
                z: words[3],
            },
            Self::LOAD_TUBE => Self::LoadTube {
                tube: words[0],
                ordnance: enum_value("ordnance type", words[1], OrdnanceType::from_u32)?,
            },
            _ => Self::EngSetCoolant {
                system: enum_value("ship system", words[0], ShipSystem::from_u32)?,
                coolant: words[1],
            },
        };
        Ok(Decoded::Packet(command))
    }
}

// ============================================================================
// CONTROL COMMANDS
// ============================================================================

/// Continuous helm and engineering controls
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ControlCommand {
    HelmSetImpulse { impulse: f32 },
    HelmSetSteering { rudder: f32 },
    EngSetEnergy { energy: f32, system: ShipSystem },
    HelmJump { bearing: f32, distance: f32 },
}

impl ControlCommand {
    pub const HELM_SET_IMPULSE: u32 = 0x00;
    pub const HELM_SET_STEERING: u32 = 0x01;
    pub const ENG_SET_ENERGY: u32 = 0x04;
    pub const HELM_JUMP: u32 = 0x05;

    pub fn subtype(&self) -> u32 {
        match self {
            Self::HelmSetImpulse { .. } => Self::HELM_SET_IMPULSE,
            Self::HelmSetSteering { .. } => Self::HELM_SET_STEERING,
            Self::EngSetEnergy { .. } => Self::ENG_SET_ENERGY,
            Self::HelmJump { .. } => Self::HELM_JUMP,
        }
    }
}

impl PacketBody for ControlCommand {
    const PACKET_TYPE: u32 = 0x0351a5ac;
    const NAME: &'static str = "control command";
    const ORIGIN: Provenance = Provenance::Client;

    fn write_body(&self, buf: &mut BytesMut) -> Result<()> {
        let subtype = Value::U32(self.subtype());
        match self {
            Self::HelmSetImpulse { impulse } => layout!("If")?.encode(&[subtype, Value::F32(*impulse)], buf),
            Self::HelmSetSteering { rudder } => layout!("If")?.encode(&[subtype, Value::F32(*rudder)], buf),
            Self::EngSetEnergy { energy, system } => layout!("IfI")?.encode(
                &[subtype, Value::F32(*energy), Value::U32(system.as_u32())],
                buf,
            ),
            Self::HelmJump { bearing, distance } => layout!("Iff")?.encode(
                &[subtype, Value::F32(*bearing), Value::F32(*distance)],
                buf,
            ),
        }
    }

    fn read_body(payload: &[u8]) -> Result<Decoded<Self>> {
        let Some(subtype) = subtype_of(payload) else {
            return Ok(Decoded::Unrecognized);
        };

        let command = match subtype {
            Self::HELM_SET_IMPULSE => Self::HelmSetImpulse {
                impulse: body(layout!("If"), payload)?.f32()?,
            },
            Self::HELM_SET_STEERING => Self::HelmSetSteering {
                rudder: body(layout!("If"), payload)?.f32()?,
            },
            Self::ENG_SET_ENERGY => {
                let mut values = body(layout!("IfI"), payload)?;
                Self::EngSetEnergy {
                    energy: values.f32()?,
                    system: enum_value("ship system", values.u32()?, ShipSystem::from_u32)?,
                }
            }
            Self::HELM_JUMP => {
                let mut values = body(layout!("Iff"), payload)?;
                Self::HelmJump {
                    bearing: values.f32()?,
                    distance: values.f32()?,
                }
            }
            _ => return Ok(Decoded::Unrecognized),
        };
        Ok(Decoded::Packet(command))
    }
}
