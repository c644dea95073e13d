//! Filesystem registry of named daemon slots.
//!
//! A slot records where a long-lived daemon is (PID, port) so that later
//! invocations can rediscover it instead of starting a duplicate. Each slot
//! has its own lock file; the lock serializes check-then-act sequences
//! across processes.

mod error;
mod lock;
mod store;
mod verify;

pub use error::RegistryError;
pub use lock::{FileLock, FileLockGuard, NamedLock};
#[cfg(test)]
pub(crate) use lock::RefusingLock;
pub use store::{LockedRegistry, SlotGuard};
pub use verify::pid_exists;
