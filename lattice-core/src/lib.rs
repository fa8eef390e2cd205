// Core library for the Lattice HTTP framework
// Request lifecycle, parameter binding and resource injection

pub mod application;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod hooks;
pub mod http;
pub mod logging;
pub mod params;
pub mod resources;
pub mod routing;
pub mod static_assets;

// Re-export commonly used types
pub use application::*;
pub use context::*;
pub use dispatcher::*;
pub use error::*;
pub use handler::*;
pub use hooks::*;
pub use http::*;
pub use params::*;
pub use resources::*;
pub use routing::{Route, RouteSpec, Router, Segment};
pub use static_assets::*;

pub use lattice_validation as validation;
