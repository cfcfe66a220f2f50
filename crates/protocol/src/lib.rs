//! # Diana Protocol Library
//!
//! Codec for the Artemis bridge simulator wire protocol.
//!
//! ## Architecture
//!
//! ### 1. Format Grammar ([`format`])
//! Compact format strings (`"IfIII"`, `"I[IIu]"`) describe payload layouts.
//! A format is parsed once into tokens and applied with an explicit cursor.
//!
//! ### 2. Frames ([`frame`], [`codec`])
//! A 24-byte header (magic `0xdeadbeef`, length, origin, packet type) wraps
//! every payload. [`frame::decode`] is incremental and resynchronises after
//! stream corruption; [`FrameCodec`] adapts it to `tokio_util::codec`.
//!
//! ### 3. Packets ([`packets`], [`registry`])
//! Every known packet type is a [`Packet`] variant. Container types
//! ([`GameEvent`], [`ShipCommand`], [`ConsoleCommand`], [`ControlCommand`])
//! dispatch on a subtype code. Payloads nobody recognises are kept as
//! [`UndecodedPacket`] and re-encode byte for byte.
//!
//! ### 4. Object Updates ([`object_update`])
//! Mask-driven per-entity records carried by [`ObjectUpdatePacket`].
//!
//! ## Usage Example
//!
//! ```rust
//! use diana_core::Provenance;
//! use diana_protocol::{frame, Packet, WelcomePacket};
//!
//! let packet = Packet::from(WelcomePacket::new("Welcome to eyes"));
//! let bytes = frame::encode(&packet, Provenance::Server).unwrap();
//!
//! let (packets, rest) = frame::decode(&bytes, Provenance::Server).unwrap();
//! assert_eq!(packets, vec![packet]);
//! assert!(rest.is_empty());
//! ```

pub mod codec;
pub mod commands;
pub mod error;
pub mod events;
pub mod format;
pub mod frame;
pub mod messages;
pub mod object_update;
pub mod packets;
pub mod registry;

pub use codec::FrameCodec;
pub use commands::{ConsoleCommand, ControlCommand, ShipCommand, NO_TARGET};
pub use error::{ProtocolError, Result};
pub use events::{GameEvent, ShipSettings, SHIP_COUNT};
pub use format::{Format, Value};
pub use messages::*;
pub use object_update::{ObjectFields, ObjectRecord};
pub use packets::{Decoded, Packet, PacketBody, UndecodedPacket};
pub use registry::{decode_packet, lookup, PacketDescriptor};
