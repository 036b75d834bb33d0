//! Command handlers for mes CLI
//!
//! Each subcommand has its own module with handler functions.

pub mod archive;
pub mod configure;
pub mod section;
