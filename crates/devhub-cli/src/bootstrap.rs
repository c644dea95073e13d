//! CLI bootstrap - the composition root.
//!
//! The one place the supervisor, registry and shutdown coordinator are
//! constructed. Handlers receive them through `CliContext`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use devhub_core::{DrainPhase, ResolvedPaths, Settings};
use devhub_runtime::{
    CoordinatorConfig, LockedRegistry, ProcessSupervisor, ShutdownCoordinator, SupervisorConfig,
    SupervisorStep,
};

/// Resolved paths plus loaded settings.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub paths: ResolvedPaths,
    pub settings: Settings,
}

impl CliConfig {
    /// Resolve paths (explicit `data_dir` first) and load `settings.json`.
    pub fn resolve(data_dir: Option<&Path>) -> Result<Self> {
        let paths = ResolvedPaths::resolve_with_data_dir(data_dir)?;
        let settings = Settings::load(&paths.settings_file)?;
        Ok(Self { paths, settings })
    }
}

/// Fully composed context for command handlers.
pub struct CliContext {
    pub paths: ResolvedPaths,
    pub settings: Settings,
    pub supervisor: Arc<ProcessSupervisor>,
    pub registry: LockedRegistry,
    pub coordinator: Arc<ShutdownCoordinator>,
}

/// Wire everything together. The supervisor is registered as the
/// `Processes` drain step; handlers add their own steps.
pub fn bootstrap(config: CliConfig) -> CliContext {
    let CliConfig { paths, settings } = config;

    let supervisor = Arc::new(ProcessSupervisor::new(SupervisorConfig::from(&settings)));
    let registry = LockedRegistry::new(&paths.registry_root);
    let coordinator = Arc::new(ShutdownCoordinator::new(CoordinatorConfig::from(&settings)));

    coordinator.register(
        DrainPhase::Processes,
        Arc::new(SupervisorStep::new(Arc::clone(&supervisor))),
    );

    CliContext {
        paths,
        settings,
        supervisor,
        registry,
        coordinator,
    }
}
