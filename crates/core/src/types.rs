//! Core type definitions
//!
//! Enumerations shared by the wire codec and its consumers. Every enum maps
//! one-to-one onto the numeric value carried on the wire; `from_*` returns
//! `None` for values outside the known range so callers can reject them.

use serde::{Deserialize, Serialize};

/// Which side of the connection a frame claims to come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provenance {
    Server = 1,
    Client = 2,
}

impl Provenance {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Server),
            2 => Some(Self::Client),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// The provenance of frames travelling the other way
    pub fn opposite(&self) -> Self {
        match self {
            Self::Server => Self::Client,
            Self::Client => Self::Server,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

/// Scenario selected when a game starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameType {
    Siege = 0,
    SingleFront = 1,
    DoubleFront = 2,
    DeepStrike = 3,
    Peacetime = 4,
    BorderWar = 5,
}

impl GameType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Siege),
            1 => Some(Self::SingleFront),
            2 => Some(Self::DoubleFront),
            3 => Some(Self::DeepStrike),
            4 => Some(Self::Peacetime),
            5 => Some(Self::BorderWar),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

/// Bridge stations a client can occupy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Console {
    MainScreen = 0,
    Helm = 1,
    Weapons = 2,
    Engineering = 3,
    Science = 4,
    Comms = 5,
    Data = 6,
    Observer = 7,
    CaptainMap = 8,
    GameMaster = 9,
}

impl Console {
    /// All consoles in wire order
    pub const ALL: [Console; 10] = [
        Self::MainScreen,
        Self::Helm,
        Self::Weapons,
        Self::Engineering,
        Self::Science,
        Self::Comms,
        Self::Data,
        Self::Observer,
        Self::CaptainMap,
        Self::GameMaster,
    ];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

/// Occupancy of a console as seen by the receiving client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsoleStatus {
    Available = 0,
    Yours = 1,
    Unavailable = 2,
}

impl ConsoleStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Available),
            1 => Some(Self::Yours),
            2 => Some(Self::Unavailable),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Simulation entity kinds, as tagged in object updates and destroy notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    PlayerVessel = 1,
    WeaponsConsole = 2,
    EngineeringConsole = 3,
    OtherShip = 4,
    Base = 5,
    Mine = 6,
    Anomaly = 7,
    Nebula = 9,
    Torpedo = 10,
    Blackhole = 11,
    Asteroid = 12,
    Mesh = 13,
    Monster = 14,
    Whale = 15,
    Drone = 16,
}

impl ObjectKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::PlayerVessel),
            2 => Some(Self::WeaponsConsole),
            3 => Some(Self::EngineeringConsole),
            4 => Some(Self::OtherShip),
            5 => Some(Self::Base),
            6 => Some(Self::Mine),
            7 => Some(Self::Anomaly),
            9 => Some(Self::Nebula),
            10 => Some(Self::Torpedo),
            11 => Some(Self::Blackhole),
            12 => Some(Self::Asteroid),
            13 => Some(Self::Mesh),
            14 => Some(Self::Monster),
            15 => Some(Self::Whale),
            16 => Some(Self::Drone),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlayerVessel => "player vessel",
            Self::WeaponsConsole => "weapons console",
            Self::EngineeringConsole => "engineering console",
            Self::OtherShip => "other ship",
            Self::Base => "base",
            Self::Mine => "mine",
            Self::Anomaly => "anomaly",
            Self::Nebula => "nebula",
            Self::Torpedo => "torpedo",
            Self::Blackhole => "blackhole",
            Self::Asteroid => "asteroid",
            Self::Mesh => "mesh",
            Self::Monster => "monster",
            Self::Whale => "whale",
            Self::Drone => "drone",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Faster-than-light drive fitted to a ship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveType {
    Warp = 0,
    Jump = 1,
}

impl DriveType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Warp),
            1 => Some(Self::Jump),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

/// Hull classes available to player ships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipType {
    LightCruiser = 0,
    Scout = 1,
    Battleship = 2,
    MissileCruiser = 3,
    Dreadnought = 4,
}

impl ShipType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::LightCruiser),
            1 => Some(Self::Scout),
            2 => Some(Self::Battleship),
            3 => Some(Self::MissileCruiser),
            4 => Some(Self::Dreadnought),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

/// What the main screen is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MainView {
    Forward = 0,
    Port = 1,
    Starboard = 2,
    Aft = 3,
    Tactical = 4,
    LongRange = 5,
    Status = 6,
}

impl MainView {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Forward),
            1 => Some(Self::Port),
            2 => Some(Self::Starboard),
            3 => Some(Self::Aft),
            4 => Some(Self::Tactical),
            5 => Some(Self::LongRange),
            6 => Some(Self::Status),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

/// Loading state of a torpedo tube
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TubeStatus {
    Unloaded = 0,
    Loaded = 1,
    Loading = 2,
    Unloading = 3,
}

impl TubeStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Unloaded),
            1 => Some(Self::Loaded),
            2 => Some(Self::Loading),
            3 => Some(Self::Unloading),
            _ => None,
        }
    }
}

/// Ordnance that can sit in a tube or in ship stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdnanceType {
    Missile = 0,
    Nuke = 1,
    Mine = 2,
    Emp = 3,
}

impl OrdnanceType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Missile),
            1 => Some(Self::Nuke),
            2 => Some(Self::Mine),
            3 => Some(Self::Emp),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

/// Ship systems as ordered in engineering updates and commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipSystem {
    Beams = 0,
    Torpedoes = 1,
    Sensors = 2,
    Maneuvering = 3,
    Impulse = 4,
    Warp = 5,
    FrontShields = 6,
    AftShields = 7,
}

impl ShipSystem {
    pub const ALL: [ShipSystem; 8] = [
        Self::Beams,
        Self::Torpedoes,
        Self::Sensors,
        Self::Maneuvering,
        Self::Impulse,
        Self::Warp,
        Self::FrontShields,
        Self::AftShields,
    ];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn as_u32(&self) -> u32 {
        *self as u32
    }
}

/// Special capabilities of elite enemy ships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EliteAbility {
    Stealth = 0x0001,
    LowVisibility = 0x0002,
    Cloak = 0x0004,
    Het = 0x0008,
    Warp = 0x0010,
    Teleport = 0x0020,
    Tractor = 0x0040,
    Drones = 0x0080,
    AntiMine = 0x0100,
    AntiTorpedo = 0x0200,
    ShieldDrain = 0x0400,
}

impl EliteAbility {
    pub const ALL: [EliteAbility; 11] = [
        Self::Stealth,
        Self::LowVisibility,
        Self::Cloak,
        Self::Het,
        Self::Warp,
        Self::Teleport,
        Self::Tractor,
        Self::Drones,
        Self::AntiMine,
        Self::AntiTorpedo,
        Self::ShieldDrain,
    ];

    pub fn bit(&self) -> u32 {
        *self as u32
    }
}

/// Set of elite abilities unpacked from a wire bitfield
///
/// Bits that do not correspond to a known ability are dropped. Serializes
/// as the list of ability names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<EliteAbility>", from = "Vec<EliteAbility>")]
pub struct EliteAbilities(u32);

impl EliteAbilities {
    pub fn from_field(field: u32) -> Self {
        let bits = EliteAbility::ALL
            .iter()
            .filter(|ability| field & ability.bit() != 0)
            .fold(0, |acc, ability| acc | ability.bit());
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, ability: EliteAbility) -> bool {
        self.0 & ability.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = EliteAbility> + '_ {
        EliteAbility::ALL.iter().copied().filter(|a| self.contains(*a))
    }
}

impl From<EliteAbilities> for Vec<EliteAbility> {
    fn from(abilities: EliteAbilities) -> Self {
        abilities.iter().collect()
    }
}

impl From<Vec<EliteAbility>> for EliteAbilities {
    fn from(abilities: Vec<EliteAbility>) -> Self {
        abilities.into_iter().collect()
    }
}

impl FromIterator<EliteAbility> for EliteAbilities {
    fn from_iter<T: IntoIterator<Item = EliteAbility>>(iter: T) -> Self {
        Self(iter.into_iter().fold(0, |acc, ability| acc | ability.bit()))
    }
}
