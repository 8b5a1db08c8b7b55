// Weft: a pool of per-CPU execution units that functions are deployed onto
//
// A `PoolContext` spawns one execution unit per slot, each a dedicated thread
// with its own function registry. Deploying a function registers it on every
// unit; the returned `ThreadedFunction` spreads calls round-robin over the
// units that accepted it.
//
// ```rust
// use weft::{args, FunctionCatalog, PoolConfig, PoolContext};
// use weft_api::deployable;
//
// #[deployable]
// fn add(a: i64, b: i64) -> i64 {
//     a + b
// }
//
// # #[tokio::main]
// # async fn main() -> anyhow::Result<()> {
// let pool = PoolContext::create(PoolConfig::with_size(2), FunctionCatalog::new().with::<AddFn>()).await?;
// let add = pool.deploy::<AddFn>().await?;
// assert_eq!(add.call_as::<i64>(args![2, 3]).await?, 5);
// pool.destroy().await?;
// # Ok(())
// # }
// ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod handle;
pub mod logging;
pub mod mailbox;
pub mod pool;
pub mod proxy;
pub mod unit;

// Re-export commonly used types
pub use catalog::FunctionCatalog;
pub use config::{PoolConfig, UnitConfig};
pub use error::MailboxError;
pub use handle::ThreadedFunction;
pub use pool::PoolContext;
pub use weft_api::*;

/// Build a call's argument vector from serializable expressions.
///
/// ```rust
/// let args = weft::args![1, "two", [3.0, 4.0]];
/// assert_eq!(args.len(), 3);
/// assert!(weft::args![].is_empty());
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::__private::serde_json::json!($arg)),+]
    };
}

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
    pub use tracing;
}
