//! # Diana Networking Layer
//!
//! Tokio transport for the Artemis protocol.
//!
//! ## Modules
//!
//! - [`client`] - Framed connection to an Artemis server
//! - [`proxy`] - Decoding relay between clients and a server

pub mod client;
pub mod proxy;

pub use client::Client;
pub use proxy::{Direction, Proxy, SharedTracker};
