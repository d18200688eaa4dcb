//! Domain layer: models, ports and errors.
//!
//! Everything here is pure or behind an async trait; no adapter code.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{SpawnError, StoreError};
