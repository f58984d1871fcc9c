//! Storage and entity layer of the radar hub station manager
//!
//! Records live as JSON values in an embedded ordered key-value store
//! ([`store`]). Each record type has a repository ([`repository`]) that owns
//! its key prefixes, ID sequence and secondary indexes. [`hub::RadarHub`]
//! wires them all to one store handle.

pub mod access;
pub mod clock;
pub mod config;
pub mod errors;
pub mod hub;
pub mod models;
pub mod repository;
pub mod sequence;
pub mod store;
pub mod window;

pub use errors::{ErrorKind, RadarHubError, Result};
pub use hub::RadarHub;
