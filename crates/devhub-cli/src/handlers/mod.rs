//! Command handlers. Each receives the composed `CliContext`.

pub mod paths;
pub mod run;
pub mod serve;
pub mod slot;
