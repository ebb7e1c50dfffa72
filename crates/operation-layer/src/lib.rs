//! Cross-cutting behaviours that can be layered around an operation without touching its
//! body: input validation, timing/logging, result caching and error suppression.
//!
//! Layers are applied through [`Pipeline`], innermost first:
//!
//! ```
//! use operation_layer::{InvalidInput, Pipeline};
//!
//! #[derive(Debug, thiserror::Error)]
//! enum Error {
//!     #[error(transparent)]
//!     Invalid(#[from] InvalidInput),
//!     #[error("backend failed")]
//!     Backend,
//! }
//!
//! let shout = Pipeline::new("shout", |s: String| Ok::<_, Error>(s.to_uppercase()))
//!     .error_handler("shouting failed")
//!     .log()
//!     .validate();
//!
//! assert_eq!(shout.layers(), &["validate", "log", "error_handler"]);
//! assert_eq!(shout.call("hi".to_string()).unwrap(), Some("HI".to_string()));
//! assert!(shout.call("   ".to_string()).is_err());
//! ```

mod cache;
mod error;
mod input;
mod layers;
mod pipeline;

pub use cache::*;
pub use error::*;
pub use input::*;
pub use layers::*;
pub use pipeline::*;
