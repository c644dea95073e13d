//! Liveness probe for supervised processes.

use async_trait::async_trait;

/// Answers "is this process actually serving?" as opposed to merely
/// being alive at the OS level.
///
/// Implementations must be cheap and bounded; they are polled at a short
/// fixed interval while a caller waits for readiness.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn is_up(&self) -> bool;
}
