//! # Weft API
//!
//! The contract shared by the weft orchestrator and its execution units.
//!
//! A pool owns a fixed set of execution units, one thread each. Deploying a
//! function sends its [`FunctionDefinition`] to every unit; each unit
//! materializes it through its [`Materializer`] and stores it under a
//! [`FunctionId`]. Calls are routed round-robin to the units that accepted the
//! function and correlated back to the caller by [`CallId`].
//!
//! ## Module Organization
//!
//! - [`ids`]: opaque correlation identifiers
//! - [`function`]: definitions, materialization and the `Deployable` trait
//! - [`protocol`]: request/reply messages and their frame codec
//! - [`errors`]: error taxonomy
//! - [`types`]: common type aliases
//!
//! ## Usage Example
//!
//! ```rust
//! use weft_api::{deployable, Deployable};
//!
//! #[deployable]
//! fn add(a: i64, b: i64) -> i64 {
//!     a + b
//! }
//!
//! assert_eq!(AddFn::NAME, "add");
//! assert_eq!(AddFn::definition().arity, 2);
//! ```

pub mod errors;
pub mod function;
pub mod ids;
pub mod protocol;
pub mod types;

pub use errors::WeftError;
pub use function::{Deployable, Executable, FunctionDefinition, Materializer};
pub use ids::{CallId, FunctionId, PoolId, UnitId};
pub use protocol::{Frame, ProtocolError, UnitFault, UnitReply, UnitRequest};
pub use types::{BoxedFuture, Value, WeftResult};

// Re-export the attribute macro
pub use weft_api_derive::deployable;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
