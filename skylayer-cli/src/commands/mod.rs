//! CLI command implementations.

pub mod common;
pub mod config;
pub mod probe;
pub mod tile;
pub mod traverse;
