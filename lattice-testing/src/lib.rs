//! Testing utilities for Lattice applications.
//!
//! - **TestClient** - drives a dispatcher in-process, through the same outer
//!   boundary the HTTP server uses
//! - **Assertions** - response checks with readable failure messages
//! - **CallCounter** - side-effect counter for "was this ever called?"
//!
//! ## Quick Start
//!
//! ```
//! use lattice_core::{Application, Call, Route};
//! use lattice_testing::*;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut app = Application::builder();
//! app.route(Route::get("/hello").action(|_: (), call: Call| async move {
//!     call.response.with_json(&serde_json::json!({"message": "Hello"}))
//! }));
//!
//! let client = TestClient::from_app(&app.build().unwrap());
//! let response = client.get("/hello").await;
//!
//! assert_status(&response, 200);
//! assert_json(&response, &serde_json::json!({"message": "Hello"}));
//! # });
//! ```
//!
//! ## Side-effect counting
//!
//! ```
//! use lattice_testing::CallCounter;
//!
//! let counter = CallCounter::new();
//! let observer = counter.clone();
//! observer.hit();
//!
//! assert_eq!(counter.count(), 1);
//! ```

mod assertions;
mod mock;
mod test_client;

pub use assertions::*;
pub use mock::CallCounter;
pub use test_client::{TestClient, TestRequestBuilder, TestResponse};

// Re-export common testing utilities
pub use tokio::test as tokio_test;
