use crate::errors::WeftError;
use std::future::Future;
use std::pin::Pin;

// Type aliases for common types
pub type BoxedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type WeftResult<T> = Result<T, WeftError>;

/// Arguments and return values as they cross the unit boundary.
pub type Value = serde_json::Value;
