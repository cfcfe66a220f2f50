//! # Object Update Records
//!
//! The object update payload is a sequence of records, ended by a `0x00`
//! tag byte or by the end of the payload:
//!
//! ```text
//! {B kind}{I object id}{B mask}... {field}...
//! ```
//!
//! The number of mask bytes is fixed per kind. Each mask bit gates one field;
//! fields follow in bit order, low bit of the first mask first. Fields whose
//! meaning is unknown are skipped by width and not exposed. A set bit with no
//! known field at all is a hard error, as is an unknown kind tag, and either
//! aborts the whole payload.

use diana_core::{
    DriveType, EliteAbilities, MainView, ObjectKind, OrdnanceType, ShipSystem, TubeStatus,
};
use serde::Serialize;

use crate::error::{ProtocolError, Result};
use crate::format::Reader;

/// Tag byte that ends the record list early
pub const END_OF_RECORDS: u8 = 0x00;

const MAX_MASKS: usize = 6;
const SYSTEMS: usize = ShipSystem::ALL.len();

/// Field storage that can absorb a newer partial update
pub trait Sparse {
    /// Overwrite with whatever `newer` carries
    fn merge(&mut self, newer: Self);

    /// Nothing stored
    fn is_unset(&self) -> bool;
}

impl<T> Sparse for Option<T> {
    fn merge(&mut self, newer: Self) {
        if newer.is_some() {
            *self = newer;
        }
    }

    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

impl<T: Sparse, const N: usize> Sparse for [T; N] {
    fn merge(&mut self, newer: Self) {
        for (slot, value) in self.iter_mut().zip(newer) {
            slot.merge(value);
        }
    }

    fn is_unset(&self) -> bool {
        self.iter().all(Sparse::is_unset)
    }
}

macro_rules! sparse_fields {
    ($(#[$meta:meta])* pub struct $name:ident { $($(#[$field_meta:meta])* pub $field:ident: $ty:ty,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                #[serde(skip_serializing_if = "Sparse::is_unset")]
                pub $field: $ty,
            )*
        }

        impl Sparse for $name {
            fn merge(&mut self, newer: Self) {
                $(self.$field.merge(newer.$field);)*
            }

            fn is_unset(&self) -> bool {
                true $(&& self.$field.is_unset())*
            }
        }
    };
}

// ============================================================================
// PER-KIND FIELDS
// ============================================================================

sparse_fields! {
    /// The ship a client is crewing
    pub struct PlayerVesselFields {
        pub weapons_target: Option<u32>,
        pub impulse: Option<f32>,
        pub rudder: Option<f32>,
        pub top_speed: Option<f32>,
        pub turn_rate: Option<f32>,
        pub auto_beams: Option<bool>,
        pub warp: Option<u8>,
        pub energy: Option<f32>,
        pub shields_state: Option<i16>,
        pub index: Option<u32>,
        pub vessel_type: Option<u32>,
        pub x: Option<f32>,
        pub y: Option<f32>,
        pub z: Option<f32>,
        pub pitch: Option<f32>,
        pub roll: Option<f32>,
        pub heading: Option<f32>,
        pub speed: Option<f32>,
        pub name: Option<String>,
        pub shields: Option<f32>,
        pub shields_max: Option<f32>,
        pub shields_aft: Option<f32>,
        pub shields_aft_max: Option<f32>,
        pub docked: Option<u32>,
        pub red_alert: Option<bool>,
        pub main_view: Option<MainView>,
        pub beam_frequency: Option<u8>,
        pub coolant_available: Option<u8>,
        pub science_target: Option<u32>,
        pub captain_target: Option<u32>,
        pub drive_type: Option<DriveType>,
        pub scan_target: Option<u32>,
        pub scan_progress: Option<f32>,
        pub reverse: Option<bool>,
    }
}

sparse_fields! {
    /// Ordnance stores and tube state, indexed by tube
    pub struct WeaponsConsoleFields {
        pub missiles: Option<u8>,
        pub nukes: Option<u8>,
        pub mines: Option<u8>,
        pub emps: Option<u8>,
        pub load_times: [Option<f32>; 6],
        pub tube_status: [Option<TubeStatus>; 6],
        pub tube_contents: [Option<OrdnanceType>; 6],
    }
}

sparse_fields! {
    /// Per-system engineering readouts, indexed in [`ShipSystem::ALL`] order
    pub struct EngineeringConsoleFields {
        pub heat: [Option<f32>; SYSTEMS],
        pub energy: [Option<f32>; SYSTEMS],
        pub coolant: [Option<u8>; SYSTEMS],
    }
}

impl EngineeringConsoleFields {
    pub fn heat(&self, system: ShipSystem) -> Option<f32> {
        self.heat[system as usize]
    }

    pub fn energy(&self, system: ShipSystem) -> Option<f32> {
        self.energy[system as usize]
    }

    pub fn coolant(&self, system: ShipSystem) -> Option<u8> {
        self.coolant[system as usize]
    }
}

sparse_fields! {
    /// Any ship not crewed by a client
    pub struct OtherShipFields {
        pub name: Option<String>,
        pub rudder: Option<f32>,
        pub max_impulse: Option<f32>,
        pub max_turn_rate: Option<f32>,
        pub iff_friendly: Option<bool>,
        pub vessel_type: Option<u32>,
        pub x: Option<f32>,
        pub y: Option<f32>,
        pub z: Option<f32>,
        pub pitch: Option<f32>,
        pub roll: Option<f32>,
        pub heading: Option<f32>,
        pub speed: Option<f32>,
        pub surrendered: Option<bool>,
        pub shields: Option<f32>,
        pub shields_max: Option<f32>,
        pub shields_aft: Option<f32>,
        pub shields_aft_max: Option<f32>,
        pub elite: Option<EliteAbilities>,
        pub elite_active: Option<EliteAbilities>,
        pub scanned: Option<bool>,
        pub iff_side: Option<u32>,
        /// Indexed in [`ShipSystem::ALL`] order
        pub system_damage: [Option<f32>; SYSTEMS],
        pub shield_frequencies: [Option<f32>; 5],
    }
}

impl OtherShipFields {
    pub fn damage(&self, system: ShipSystem) -> Option<f32> {
        self.system_damage[system as usize]
    }
}

sparse_fields! {
    pub struct BaseFields {
        pub name: Option<String>,
        pub shields: Option<f32>,
        pub shields_aft: Option<f32>,
        pub index: Option<u32>,
        pub vessel_type: Option<u32>,
        pub x: Option<f32>,
        pub y: Option<f32>,
        pub z: Option<f32>,
    }
}

sparse_fields! {
    /// Mines, torpedoes, black holes and asteroids
    pub struct PositionFields {
        pub x: Option<f32>,
        pub y: Option<f32>,
        pub z: Option<f32>,
    }
}

sparse_fields! {
    /// Anomalies and monsters
    pub struct NamedPositionFields {
        pub x: Option<f32>,
        pub y: Option<f32>,
        pub z: Option<f32>,
        pub name: Option<String>,
    }
}

sparse_fields! {
    pub struct NebulaFields {
        pub x: Option<f32>,
        pub y: Option<f32>,
        pub z: Option<f32>,
        pub red: Option<f32>,
        pub green: Option<f32>,
        pub blue: Option<f32>,
    }
}

sparse_fields! {
    pub struct WhaleFields {
        pub name: Option<String>,
        pub x: Option<f32>,
        pub y: Option<f32>,
        pub z: Option<f32>,
        pub pitch: Option<f32>,
        pub roll: Option<f32>,
        pub heading: Option<f32>,
    }
}

sparse_fields! {
    pub struct DroneFields {
        pub x: Option<f32>,
        pub y: Option<f32>,
        pub z: Option<f32>,
        pub heading: Option<f32>,
    }
}

/// Decoded fields of one record, by object kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectFields {
    PlayerVessel(PlayerVesselFields),
    WeaponsConsole(WeaponsConsoleFields),
    EngineeringConsole(EngineeringConsoleFields),
    OtherShip(OtherShipFields),
    Base(BaseFields),
    Mine(PositionFields),
    Anomaly(NamedPositionFields),
    Nebula(NebulaFields),
    Torpedo(PositionFields),
    Blackhole(PositionFields),
    Asteroid(PositionFields),
    Monster(NamedPositionFields),
    Whale(WhaleFields),
    Drone(DroneFields),
}

impl ObjectFields {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::PlayerVessel(_) => ObjectKind::PlayerVessel,
            Self::WeaponsConsole(_) => ObjectKind::WeaponsConsole,
            Self::EngineeringConsole(_) => ObjectKind::EngineeringConsole,
            Self::OtherShip(_) => ObjectKind::OtherShip,
            Self::Base(_) => ObjectKind::Base,
            Self::Mine(_) => ObjectKind::Mine,
            Self::Anomaly(_) => ObjectKind::Anomaly,
            Self::Nebula(_) => ObjectKind::Nebula,
            Self::Torpedo(_) => ObjectKind::Torpedo,
            Self::Blackhole(_) => ObjectKind::Blackhole,
            Self::Asteroid(_) => ObjectKind::Asteroid,
            Self::Monster(_) => ObjectKind::Monster,
            Self::Whale(_) => ObjectKind::Whale,
            Self::Drone(_) => ObjectKind::Drone,
        }
    }

    /// Fold a newer update in; an update of a different kind replaces everything
    pub fn merge(&mut self, newer: ObjectFields) {
        match (self, newer) {
            (Self::PlayerVessel(old), Self::PlayerVessel(new)) => old.merge(new),
            (Self::WeaponsConsole(old), Self::WeaponsConsole(new)) => old.merge(new),
            (Self::EngineeringConsole(old), Self::EngineeringConsole(new)) => old.merge(new),
            (Self::OtherShip(old), Self::OtherShip(new)) => old.merge(new),
            (Self::Base(old), Self::Base(new)) => old.merge(new),
            (Self::Mine(old), Self::Mine(new)) => old.merge(new),
            (Self::Anomaly(old), Self::Anomaly(new)) => old.merge(new),
            (Self::Nebula(old), Self::Nebula(new)) => old.merge(new),
            (Self::Torpedo(old), Self::Torpedo(new)) => old.merge(new),
            (Self::Blackhole(old), Self::Blackhole(new)) => old.merge(new),
            (Self::Asteroid(old), Self::Asteroid(new)) => old.merge(new),
            (Self::Monster(old), Self::Monster(new)) => old.merge(new),
            (Self::Whale(old), Self::Whale(new)) => old.merge(new),
            (Self::Drone(old), Self::Drone(new)) => old.merge(new),
            (slot, new) => *slot = new,
        }
    }
}

/// One entity mentioned in an object update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectRecord {
    pub object_id: u32,
    #[serde(flatten)]
    pub fields: ObjectFields,
}

impl ObjectRecord {
    pub fn kind(&self) -> ObjectKind {
        self.fields.kind()
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Number of mask bytes following the object id, `None` if the kind has no layout
pub fn mask_count(kind: ObjectKind) -> Option<usize> {
    let count = match kind {
        ObjectKind::PlayerVessel => 5,
        ObjectKind::WeaponsConsole => 3,
        ObjectKind::EngineeringConsole => 4,
        ObjectKind::OtherShip => 6,
        ObjectKind::Base | ObjectKind::Whale | ObjectKind::Drone => 2,
        ObjectKind::Mine
        | ObjectKind::Anomaly
        | ObjectKind::Nebula
        | ObjectKind::Torpedo
        | ObjectKind::Blackhole
        | ObjectKind::Asteroid
        | ObjectKind::Monster => 1,
        ObjectKind::Mesh => return None,
    };
    Some(count)
}

/// Bits with no known field, as (mask index, bits)
fn reserved_bits(kind: ObjectKind) -> &'static [(usize, u8)] {
    match kind {
        ObjectKind::PlayerVessel => &[(4, 0x80)],
        ObjectKind::WeaponsConsole => &[(2, 0x80)],
        ObjectKind::EngineeringConsole => &[(3, 0xff)],
        ObjectKind::OtherShip => &[(5, 0x80)],
        ObjectKind::Base => &[(1, 0xc0)],
        ObjectKind::Whale => &[(1, 0xe0)],
        ObjectKind::Drone => &[(1, 0xff)],
        _ => &[],
    }
}

/// Decode every record in an object update payload
pub fn decode_records(payload: &[u8]) -> Result<Vec<ObjectRecord>> {
    let mut reader = Reader::new(payload);
    let mut records = Vec::new();

    while let Some(tag) = reader.peek_u8() {
        if tag == END_OF_RECORDS {
            break;
        }
        records.push(read_record(&mut reader)?);
    }
    Ok(records)
}

fn read_record(reader: &mut Reader<'_>) -> Result<ObjectRecord> {
    let tag = reader.read_u8()?;
    let kind = ObjectKind::from_u8(tag).ok_or(ProtocolError::UnknownObjectType(tag))?;
    let object_id = reader.read_u32()?;
    let mut fields = Fields::read_masks(reader, kind)?;

    let fields = match kind {
        ObjectKind::PlayerVessel => ObjectFields::PlayerVessel(read_player_vessel(&mut fields)?),
        ObjectKind::WeaponsConsole => ObjectFields::WeaponsConsole(read_weapons(&mut fields)?),
        ObjectKind::EngineeringConsole => {
            ObjectFields::EngineeringConsole(read_engineering(&mut fields)?)
        }
        ObjectKind::OtherShip => ObjectFields::OtherShip(read_other_ship(&mut fields)?),
        ObjectKind::Base => ObjectFields::Base(read_base(&mut fields)?),
        ObjectKind::Mine => ObjectFields::Mine(read_position(&mut fields)?),
        ObjectKind::Torpedo => ObjectFields::Torpedo(read_position(&mut fields)?),
        ObjectKind::Blackhole => ObjectFields::Blackhole(read_position(&mut fields)?),
        ObjectKind::Asteroid => ObjectFields::Asteroid(read_position(&mut fields)?),
        ObjectKind::Anomaly => ObjectFields::Anomaly(read_named_position(&mut fields)?),
        ObjectKind::Monster => ObjectFields::Monster(read_named_position(&mut fields)?),
        ObjectKind::Nebula => ObjectFields::Nebula(read_nebula(&mut fields)?),
        ObjectKind::Whale => ObjectFields::Whale(read_whale(&mut fields)?),
        ObjectKind::Drone => ObjectFields::Drone(read_drone(&mut fields)?),
        ObjectKind::Mesh => return Err(ProtocolError::UnsupportedObjectType(kind)),
    };
    Ok(ObjectRecord { object_id, fields })
}

/// Mask-gated field reader for one record
///
/// Bits are addressed by flat index: bit `n` of mask `m` is `m * 8 + n`.
struct Fields<'r, 'a> {
    reader: &'r mut Reader<'a>,
    masks: [u8; MAX_MASKS],
}

impl<'r, 'a> Fields<'r, 'a> {
    fn read_masks(reader: &'r mut Reader<'a>, kind: ObjectKind) -> Result<Self> {
        let count = mask_count(kind).ok_or(ProtocolError::UnsupportedObjectType(kind))?;
        let mut masks = [0u8; MAX_MASKS];
        for mask in masks.iter_mut().take(count) {
            *mask = reader.read_u8()?;
        }

        for &(index, reserved) in reserved_bits(kind) {
            let bits = masks[index] & reserved;
            if bits != 0 {
                return Err(ProtocolError::ReservedBits {
                    kind,
                    mask_index: index + 1,
                    bits,
                });
            }
        }
        Ok(Self { reader, masks })
    }

    fn present(&self, bit: usize) -> bool {
        self.masks[bit / 8] & (1 << (bit % 8)) != 0
    }

    fn read<T>(
        &mut self,
        bit: usize,
        read: impl FnOnce(&mut Reader<'a>) -> Result<T>,
    ) -> Result<Option<T>> {
        if self.present(bit) {
            read(&mut *self.reader).map(Some)
        } else {
            Ok(None)
        }
    }

    fn skip(&mut self, bit: usize, width: usize) -> Result<()> {
        if self.present(bit) {
            self.reader.skip(width)?;
        }
        Ok(())
    }

    fn skip_all(&mut self, bits: std::ops::Range<usize>, width: usize) -> Result<()> {
        for bit in bits {
            self.skip(bit, width)?;
        }
        Ok(())
    }

    fn u8(&mut self, bit: usize) -> Result<Option<u8>> {
        self.read(bit, Reader::read_u8)
    }

    fn i16(&mut self, bit: usize) -> Result<Option<i16>> {
        self.read(bit, Reader::read_i16)
    }

    fn u32(&mut self, bit: usize) -> Result<Option<u32>> {
        self.read(bit, Reader::read_u32)
    }

    fn f32(&mut self, bit: usize) -> Result<Option<f32>> {
        self.read(bit, Reader::read_f32)
    }

    fn string(&mut self, bit: usize) -> Result<Option<String>> {
        self.read(bit, Reader::read_string)
    }

    /// Single byte, nonzero means true
    fn flag(&mut self, bit: usize) -> Result<Option<bool>> {
        Ok(self.u8(bit)?.map(|value| value != 0))
    }

    /// Four bytes, nonzero means true
    fn flag32(&mut self, bit: usize) -> Result<Option<bool>> {
        Ok(self.u32(bit)?.map(|value| value != 0))
    }

    fn elites(&mut self, bit: usize) -> Result<Option<EliteAbilities>> {
        Ok(self.u32(bit)?.map(EliteAbilities::from_field))
    }

    /// Single byte holding an enumeration
    fn enum_u8<T>(
        &mut self,
        bit: usize,
        field: &'static str,
        convert: impl FnOnce(u8) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.u8(bit)? {
            Some(raw) => convert(raw).map(Some).ok_or(ProtocolError::InvalidEnumValue {
                field,
                value: raw.into(),
            }),
            None => Ok(None),
        }
    }

    fn f32_array<const N: usize>(&mut self, first_bit: usize) -> Result<[Option<f32>; N]> {
        let mut values = [None; N];
        for (offset, value) in values.iter_mut().enumerate() {
            *value = self.f32(first_bit + offset)?;
        }
        Ok(values)
    }
}

fn read_player_vessel(f: &mut Fields<'_, '_>) -> Result<PlayerVesselFields> {
    let mut out = PlayerVesselFields::default();

    out.weapons_target = f.u32(0)?;
    out.impulse = f.f32(1)?;
    out.rudder = f.f32(2)?;
    out.top_speed = f.f32(3)?;
    out.turn_rate = f.f32(4)?;
    out.auto_beams = f.flag(5)?;
    out.warp = f.u8(6)?;
    out.energy = f.f32(7)?;

    out.shields_state = f.i16(8)?;
    out.index = f.u32(9)?;
    out.vessel_type = f.u32(10)?;
    out.x = f.f32(11)?;
    out.y = f.f32(12)?;
    out.z = f.f32(13)?;
    out.pitch = f.f32(14)?;
    out.roll = f.f32(15)?;

    out.heading = f.f32(16)?;
    out.speed = f.f32(17)?;
    f.skip(18, 2)?;
    out.name = f.string(19)?;
    out.shields = f.f32(20)?;
    out.shields_max = f.f32(21)?;
    out.shields_aft = f.f32(22)?;
    out.shields_aft_max = f.f32(23)?;

    out.docked = f.u32(24)?;
    out.red_alert = f.flag(25)?;
    f.skip(26, 4)?;
    out.main_view = f.enum_u8(27, "main view", |raw| MainView::from_u32(raw.into()))?;
    out.beam_frequency = f.u8(28)?;
    out.coolant_available = f.u8(29)?;
    out.science_target = f.u32(30)?;
    out.captain_target = f.u32(31)?;

    out.drive_type = f.enum_u8(32, "drive type", |raw| DriveType::from_u32(raw.into()))?;
    out.scan_target = f.u32(33)?;
    out.scan_progress = f.f32(34)?;
    out.reverse = f.flag(35)?;
    f.skip(36, 4)?;
    f.skip(37, 1)?;
    f.skip(38, 4)?;

    Ok(out)
}

fn read_weapons(f: &mut Fields<'_, '_>) -> Result<WeaponsConsoleFields> {
    let mut out = WeaponsConsoleFields::default();

    out.missiles = f.u8(0)?;
    out.nukes = f.u8(1)?;
    out.mines = f.u8(2)?;
    out.emps = f.u8(3)?;
    f.skip(4, 1)?;
    out.load_times = f.f32_array(5)?;

    for (tube, status) in out.tube_status.iter_mut().enumerate() {
        *status = f.enum_u8(11 + tube, "tube status", TubeStatus::from_u8)?;
    }
    for (tube, contents) in out.tube_contents.iter_mut().enumerate() {
        *contents = f.enum_u8(17 + tube, "ordnance type", |raw| {
            OrdnanceType::from_u32(raw.into())
        })?;
    }

    Ok(out)
}

/// Heat, energy and coolant each have their own mask, one bit per system
fn read_engineering(f: &mut Fields<'_, '_>) -> Result<EngineeringConsoleFields> {
    let mut out = EngineeringConsoleFields::default();

    out.heat = f.f32_array(0)?;
    out.energy = f.f32_array(8)?;
    for (system, coolant) in out.coolant.iter_mut().enumerate() {
        *coolant = f.u8(16 + system)?;
    }

    Ok(out)
}

fn read_other_ship(f: &mut Fields<'_, '_>) -> Result<OtherShipFields> {
    let mut out = OtherShipFields::default();

    out.name = f.string(0)?;
    f.skip(1, 4)?;
    out.rudder = f.f32(2)?;
    out.max_impulse = f.f32(3)?;
    out.max_turn_rate = f.f32(4)?;
    // the wire carries "is enemy"
    out.iff_friendly = f.flag32(5)?.map(|enemy| !enemy);
    out.vessel_type = f.u32(6)?;
    out.x = f.f32(7)?;

    out.y = f.f32(8)?;
    out.z = f.f32(9)?;
    out.pitch = f.f32(10)?;
    out.roll = f.f32(11)?;
    out.heading = f.f32(12)?;
    out.speed = f.f32(13)?;
    out.surrendered = f.flag(14)?;
    f.skip(15, 2)?;

    out.shields = f.f32(16)?;
    out.shields_max = f.f32(17)?;
    out.shields_aft = f.f32(18)?;
    out.shields_aft_max = f.f32(19)?;
    f.skip(20, 2)?;
    f.skip(21, 1)?;
    out.elite = f.elites(22)?;
    out.elite_active = f.elites(23)?;

    out.scanned = f.flag32(24)?;
    out.iff_side = f.u32(25)?;
    f.skip(26, 4)?;
    f.skip_all(27..31, 1)?;
    f.skip(31, 4)?;

    f.skip_all(32..34, 4)?;
    out.system_damage = f.f32_array(34)?;

    out.shield_frequencies = f.f32_array(42)?;

    Ok(out)
}

fn read_base(f: &mut Fields<'_, '_>) -> Result<BaseFields> {
    let mut out = BaseFields::default();

    out.name = f.string(0)?;
    out.shields = f.f32(1)?;
    out.shields_aft = f.f32(2)?;
    out.index = f.u32(3)?;
    out.vessel_type = f.u32(4)?;
    out.x = f.f32(5)?;
    out.y = f.f32(6)?;
    out.z = f.f32(7)?;

    f.skip_all(8..12, 4)?;
    f.skip_all(12..14, 1)?;

    Ok(out)
}

fn read_position(f: &mut Fields<'_, '_>) -> Result<PositionFields> {
    let out = PositionFields {
        x: f.f32(0)?,
        y: f.f32(1)?,
        z: f.f32(2)?,
    };
    f.skip_all(3..8, 4)?;
    Ok(out)
}

fn read_named_position(f: &mut Fields<'_, '_>) -> Result<NamedPositionFields> {
    let out = NamedPositionFields {
        x: f.f32(0)?,
        y: f.f32(1)?,
        z: f.f32(2)?,
        name: f.string(3)?,
    };
    f.skip_all(4..8, 4)?;
    Ok(out)
}

fn read_nebula(f: &mut Fields<'_, '_>) -> Result<NebulaFields> {
    let out = NebulaFields {
        x: f.f32(0)?,
        y: f.f32(1)?,
        z: f.f32(2)?,
        red: f.f32(3)?,
        green: f.f32(4)?,
        blue: f.f32(5)?,
    };
    f.skip_all(6..8, 4)?;
    Ok(out)
}

fn read_whale(f: &mut Fields<'_, '_>) -> Result<WhaleFields> {
    let mut out = WhaleFields::default();

    out.name = f.string(0)?;
    f.skip_all(1..3, 4)?;
    out.x = f.f32(3)?;
    out.y = f.f32(4)?;
    out.z = f.f32(5)?;
    out.pitch = f.f32(6)?;
    out.roll = f.f32(7)?;

    out.heading = f.f32(8)?;
    f.skip_all(9..13, 4)?;

    Ok(out)
}

/// Drone coordinates are interleaved with unknown words
fn read_drone(f: &mut Fields<'_, '_>) -> Result<DroneFields> {
    let mut out = DroneFields::default();

    f.skip(0, 4)?;
    out.x = f.f32(1)?;
    f.skip(2, 4)?;
    out.z = f.f32(3)?;
    f.skip(4, 4)?;
    out.y = f.f32(5)?;
    out.heading = f.f32(6)?;
    f.skip(7, 4)?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};
    use diana_core::EliteAbility;

    fn header(kind: ObjectKind, id: u32, masks: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u8(kind.as_u8());
        buf.put_u32_le(id);
        buf.put_slice(masks);
        buf
    }

    #[test]
    fn test_empty_and_terminated_payloads() {
        assert_eq!(decode_records(&[]).unwrap(), vec![]);
        assert_eq!(decode_records(&[0x00]).unwrap(), vec![]);
        // anything after the terminator is ignored
        assert_eq!(decode_records(&[0x00, 0x08, 0xff]).unwrap(), vec![]);
    }

    #[test]
    fn test_unknown_and_unsupported_kinds() {
        assert_eq!(
            decode_records(&[0x08, 1, 0, 0, 0]),
            Err(ProtocolError::UnknownObjectType(8))
        );
        assert_eq!(
            decode_records(&[0x0d, 1, 0, 0, 0, 0]),
            Err(ProtocolError::UnsupportedObjectType(ObjectKind::Mesh))
        );
    }

    #[test]
    fn test_reserved_bits_are_hard_errors() {
        let buf = header(ObjectKind::PlayerVessel, 1, &[0, 0, 0, 0, 0x80]);
        assert_eq!(
            decode_records(&buf),
            Err(ProtocolError::ReservedBits {
                kind: ObjectKind::PlayerVessel,
                mask_index: 5,
                bits: 0x80
            })
        );

        let buf = header(ObjectKind::Base, 2, &[0, 0x40]);
        assert!(matches!(
            decode_records(&buf),
            Err(ProtocolError::ReservedBits { kind: ObjectKind::Base, .. })
        ));

        let buf = header(ObjectKind::Drone, 3, &[0, 0x01]);
        assert!(decode_records(&buf).is_err());

        let buf = header(ObjectKind::EngineeringConsole, 4, &[0, 0, 0, 0x01]);
        assert!(decode_records(&buf).is_err());

        let cases = [
            (ObjectKind::WeaponsConsole, vec![0u8, 0, 0x80], 3, 0x80),
            (ObjectKind::OtherShip, vec![0, 0, 0, 0, 0, 0x80], 6, 0x80),
            (ObjectKind::Whale, vec![0, 0xe0], 2, 0xe0),
            (ObjectKind::Whale, vec![0, 0x20], 2, 0x20),
        ];
        for (kind, masks, mask_index, bits) in cases {
            let buf = header(kind, 5, &masks);
            assert_eq!(
                decode_records(&buf),
                Err(ProtocolError::ReservedBits {
                    kind,
                    mask_index,
                    bits
                }),
                "{:?}",
                kind
            );
        }
    }

    #[test]
    fn test_player_vessel_fields_in_bit_order() {
        let mut buf = header(ObjectKind::PlayerVessel, 1000, &[0x21, 0x08, 0x0c, 0x0c, 0x11]);
        buf.put_u32_le(1); // weapons target
        buf.put_u8(1); // auto beams
        buf.put_f32_le(150.0); // x
        buf.put_u16_le(0xffff); // skipped
        crate::format::write_string(&mut buf, "Artemis");
        buf.put_u32_le(0xdead_beef); // skipped
        buf.put_u8(MainView::Aft as u8);
        buf.put_u8(DriveType::Jump as u8);
        buf.put_u32_le(0); // skipped

        let records = decode_records(&buf).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].object_id, 1000);
        let ObjectFields::PlayerVessel(ship) = &records[0].fields else {
            panic!("expected a player vessel");
        };
        assert_eq!(ship.weapons_target, Some(1));
        assert_eq!(ship.auto_beams, Some(true));
        assert_eq!(ship.x, Some(150.0));
        assert_eq!(ship.y, None);
        assert_eq!(ship.name.as_deref(), Some("Artemis"));
        assert_eq!(ship.main_view, Some(MainView::Aft));
        assert_eq!(ship.drive_type, Some(DriveType::Jump));
        assert_eq!(ship.reverse, None);
    }

    #[test]
    fn test_weapons_enums_reject_out_of_range() {
        let mut buf = header(ObjectKind::WeaponsConsole, 5, &[0x01, 0x08, 0x02]);
        buf.put_u8(6);
        buf.put_u8(TubeStatus::Loaded as u8);
        buf.put_u8(OrdnanceType::Mine as u8);
        let records = decode_records(&buf).unwrap();
        let ObjectFields::WeaponsConsole(weapons) = &records[0].fields else {
            panic!("expected a weapons console");
        };
        assert_eq!(weapons.missiles, Some(6));
        assert_eq!(weapons.tube_status[0], Some(TubeStatus::Loaded));
        assert_eq!(weapons.tube_contents[0], Some(OrdnanceType::Mine));

        let mut buf = header(ObjectKind::WeaponsConsole, 5, &[0, 0, 0x02]);
        buf.put_u8(9);
        assert_eq!(
            decode_records(&buf),
            Err(ProtocolError::InvalidEnumValue {
                field: "ordnance type",
                value: 9
            })
        );
    }

    #[test]
    fn test_engineering_masks_are_independent() {
        let mut buf = header(ObjectKind::EngineeringConsole, 7, &[0x01, 0x02, 0x80, 0x00]);
        buf.put_f32_le(0.5); // heat, beams
        buf.put_f32_le(1.25); // energy, torpedoes
        buf.put_u8(3); // coolant, aft shields

        let records = decode_records(&buf).unwrap();
        let ObjectFields::EngineeringConsole(eng) = &records[0].fields else {
            panic!("expected an engineering console");
        };
        assert_eq!(eng.heat(ShipSystem::Beams), Some(0.5));
        assert_eq!(eng.heat(ShipSystem::Torpedoes), None);
        assert_eq!(eng.energy(ShipSystem::Torpedoes), Some(1.25));
        assert_eq!(eng.energy(ShipSystem::Beams), None);
        assert_eq!(eng.coolant(ShipSystem::AftShields), Some(3));
    }

    #[test]
    fn test_other_ship_transforms() {
        let mut buf = header(ObjectKind::OtherShip, 9, &[0x20, 0x40, 0x40, 0x01, 0x04, 0x02]);
        buf.put_u32_le(0); // iff: not an enemy
        buf.put_u8(1); // surrendered
        buf.put_u32_le(0x0000_0005); // elite bits
        buf.put_u32_le(1); // scanned
        buf.put_f32_le(0.3); // beam damage
        buf.put_f32_le(0.7); // aft shield damage

        let records = decode_records(&buf).unwrap();
        let ObjectFields::OtherShip(ship) = &records[0].fields else {
            panic!("expected another ship");
        };
        assert_eq!(ship.iff_friendly, Some(true));
        assert_eq!(ship.surrendered, Some(true));
        let elite = ship.elite.unwrap();
        assert!(elite.contains(EliteAbility::Stealth));
        assert!(elite.contains(EliteAbility::Cloak));
        assert_eq!(ship.scanned, Some(true));
        assert_eq!(ship.damage(ShipSystem::Beams), Some(0.3));
        assert_eq!(ship.damage(ShipSystem::FrontShields), None);
        assert_eq!(ship.damage(ShipSystem::AftShields), Some(0.7));
    }

    #[test]
    fn test_consecutive_records() {
        let mut buf = header(ObjectKind::Mine, 20, &[0x09]);
        buf.put_f32_le(1.0);
        buf.put_u32_le(0);
        buf.extend_from_slice(&header(ObjectKind::Drone, 21, &[0x22, 0x00]));
        buf.put_f32_le(2.0);
        buf.put_f32_le(3.0);
        buf.put_u8(END_OF_RECORDS);

        let records = decode_records(&buf).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].fields,
            ObjectFields::Mine(PositionFields {
                x: Some(1.0),
                ..Default::default()
            })
        );
        assert_eq!(
            records[1].fields,
            ObjectFields::Drone(DroneFields {
                x: Some(2.0),
                y: Some(3.0),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_truncated_record_aborts() {
        let mut buf = header(ObjectKind::Nebula, 30, &[0x08]);
        buf.put_u16_le(0);
        assert!(matches!(decode_records(&buf), Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut stored = ObjectFields::Base(BaseFields {
            name: Some("DS1".into()),
            x: Some(1.0),
            ..Default::default()
        });
        stored.merge(ObjectFields::Base(BaseFields {
            x: Some(2.0),
            ..Default::default()
        }));
        assert_eq!(
            stored,
            ObjectFields::Base(BaseFields {
                name: Some("DS1".into()),
                x: Some(2.0),
                ..Default::default()
            })
        );

        stored.merge(ObjectFields::Mine(PositionFields::default()));
        assert_eq!(stored.kind(), ObjectKind::Mine);
    }
}
