//! Diana Core - shared error and enumeration types

mod error;
mod types;

pub use error::*;
pub use types::*;
