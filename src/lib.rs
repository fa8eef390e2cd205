//! # Lattice Tasks
//!
//! A small task-list HTTP service on the Lattice framework. Tasks live in a
//! document store reached through the [`store::DocumentStore`] interface; the
//! bundled [`store::MemoryStore`] keeps them in process memory.
//!
//! ```no_run
//! use lattice_tasks::{TasksConfig, application};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TasksConfig::load("config.toml")?;
//! let app = application(&config)?;
//! app.listen(config.address().parse()?).await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod hooks;
pub mod resources;
pub mod routes;
pub mod store;

pub use app::{application, build_application};
pub use config::TasksConfig;
pub use resources::{Connections, Db};
