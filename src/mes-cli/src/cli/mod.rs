//! CLI argument definitions for mes
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod core;

pub use core::{Cli, CodecKind, Commands, MappingArgs};
