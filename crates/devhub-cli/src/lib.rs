//! Command-line front end for devhub.
//!
//! `main.rs` is the composition root; everything it wires lives here so it
//! can be exercised from tests.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Only used by the binary
use dotenvy as _;
use tracing_subscriber as _;

#[cfg(test)]
use tempfile as _;

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;
pub mod server;
pub mod signals;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{Commands, SlotCommand};
pub use parser::Cli;
