//! Domain types shared between the runtime and its adapters.

mod process;
mod slot;

pub use process::{CommandSpec, ProcessSnapshot, ProcessStatus};
pub use slot::{RegistrySlot, unix_now};
