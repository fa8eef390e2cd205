//! Validation framework for Lattice
//!
//! Validators check a single parameter value against a type or shape rule.
//! They are pure and stateless: a failed check is reported, never raised, and
//! the parameter binder in `lattice-core` turns the report into a structured
//! bad-request error.
//!
//! # Examples
//!
//! ```
//! use lattice_validation::{ArrayList, Text, Validator};
//! use serde_json::json;
//!
//! let title = Text::new(128);
//! assert!(title.is_valid(&json!("Buy milk")));
//! assert!(!title.is_valid(&json!(42)));
//!
//! let tags = ArrayList::new(Text::new(16));
//! assert!(tags.is_valid(&json!(["home", "errand"])));
//! assert!(!tags.is_valid(&json!("home")));
//! ```
//!
//! ## Coercion
//!
//! Validators may also coerce the raw value once it passed. Query strings only
//! carry text, so `Boolean` and `Numeric` turn strings into typed JSON values:
//!
//! ```
//! use lattice_validation::{Boolean, Validator};
//! use serde_json::json;
//!
//! let flag = Boolean::loose();
//! assert_eq!(flag.coerce(json!("true")), json!(true));
//! assert_eq!(flag.coerce(json!("1")), json!(false));
//! ```

mod errors;
mod traits;
mod validators;

pub use errors::*;
pub use traits::*;
pub use validators::*;
