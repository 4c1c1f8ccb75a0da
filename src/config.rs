//! Settings loader, schema and write-back.
//!
//! This module exposes the settings schema used to drive runtime
//! behavior, helpers to load it from disk/environment and to persist
//! changes made through engine commands (volume, mute, sequence policy).

mod load;
mod schema;

pub use schema::*;
