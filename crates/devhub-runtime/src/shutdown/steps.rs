//! Ready-made drain steps.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use devhub_core::{DrainStep, DrainStepError};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::process::ProcessSupervisor;

/// Stops every supervised process. Always succeeds: `stop_all` escalates
/// to SIGKILL on its own.
pub struct SupervisorStep {
    supervisor: Arc<ProcessSupervisor>,
}

impl SupervisorStep {
    pub const fn new(supervisor: Arc<ProcessSupervisor>) -> Self {
        Self { supervisor }
    }
}

#[async_trait]
impl DrainStep for SupervisorStep {
    fn name(&self) -> &str {
        "process-supervisor"
    }

    async fn drain(&self) -> Result<(), DrainStepError> {
        self.supervisor.stop_all().await;
        Ok(())
    }
}

/// Triggers an HTTP server's graceful shutdown and waits for its task.
///
/// The server is expected to be serving with
/// `with_graceful_shutdown(cancel.cancelled_owned())`.
pub struct HttpListenerStep {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<anyhow::Result<()>>>>,
}

impl HttpListenerStep {
    pub fn new(cancel: CancellationToken, task: JoinHandle<anyhow::Result<()>>) -> Self {
        Self {
            cancel,
            task: Mutex::new(Some(task)),
        }
    }
}

#[async_trait]
impl DrainStep for HttpListenerStep {
    fn name(&self) -> &str {
        "http-listener"
    }

    async fn drain(&self) -> Result<(), DrainStepError> {
        self.cancel.cancel();

        let Some(task) = self.task.lock().await.take() else {
            debug!("HTTP listener already drained");
            return Ok(());
        };

        match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DrainStepError::failed(format!("{e:#}"))),
            Err(e) => Err(DrainStepError::failed(format!("listener task failed: {e}"))),
        }
    }
}

type StepFn = Box<dyn Fn() -> BoxFuture<'static, Result<(), DrainStepError>> + Send + Sync>;

/// A drain step from a closure, for subsystems without their own type.
pub struct FnStep {
    name: String,
    action: StepFn,
}

impl FnStep {
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DrainStepError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(move || action().boxed()),
        }
    }
}

#[async_trait]
impl DrainStep for FnStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn drain(&self) -> Result<(), DrainStepError> {
        (self.action)().await
    }
}
