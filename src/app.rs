//! Application assembly.

use crate::config::TasksConfig;
use crate::resources::{Connections, DB, FILES, REGISTRY};
use crate::{hooks, routes};
use lattice_core::{Application, Error, StaticFiles};
use std::sync::Arc;
use tracing::warn;

/// Build the service from its configuration.
///
/// Static files are read from `static_dir` up front; a missing directory
/// leaves `GET /` answering 404.
pub fn application(config: &TasksConfig) -> Result<Application, Error> {
    let files = if config.static_dir.is_dir() {
        StaticFiles::load(&config.static_dir)?
    } else {
        warn!(dir = %config.static_dir.display(), "Static directory not found");
        StaticFiles::new()
    };

    build_application(config, Connections::new(config.database.clone()), files)
}

/// Build the service with explicit collaborators
pub fn build_application(
    config: &TasksConfig,
    connections: Connections,
    files: StaticFiles,
) -> Result<Application, Error> {
    let mut builder = Application::builder();

    builder
        .instance(REGISTRY, Arc::new(connections))
        .singleton(DB, &[REGISTRY.name()], |deps| deps.get(REGISTRY)?.database())
        .instance(FILES, Arc::new(files));

    hooks::register(&mut builder, config.diagnostics);
    routes::register(&mut builder);

    builder.build()
}
