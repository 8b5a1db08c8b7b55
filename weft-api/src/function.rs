//! # Function Contract
//!
//! What a deployable function looks like on both sides of the unit boundary.
//!
//! ## Key Concepts
//! - [`FunctionDefinition`]: the text a unit materializes from; the
//!   orchestrator forwards it verbatim and never looks inside `body`.
//! - [`Materializer`]: the capability every unit provides for turning a
//!   definition back into something it can run.
//! - [`Executable`]: the materialized behavior stored in a unit's registry.
//! - [`Deployable`]: a function compiled into the host, usually generated by
//!   `#[deployable]`.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use crate::types::{BoxedFuture, Value};

/// Serialized representation of a function, sent to every unit on deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Declared name, kept as metadata on the handle.
    pub name: String,
    /// Declared parameter count, kept as metadata on the handle.
    pub arity: usize,
    /// The text the unit's materializer works from.
    pub body: String,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>, arity: usize, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arity,
            body: body.into(),
        }
    }

    /// Definition whose body is the name itself, the form catalog lookups use.
    pub fn named(name: impl Into<String>, arity: usize) -> Self {
        let name = name.into();
        Self {
            body: name.clone(),
            name,
            arity,
        }
    }
}

/// A materialized function. Errors are plain descriptions; they cross the
/// wire as text.
pub type Executable = Arc<dyn Fn(Vec<Value>) -> BoxedFuture<'static, Result<Value, String>> + Send + Sync>;

/// Turns a [`FunctionDefinition`] into an [`Executable`] inside a unit.
///
/// Called on the unit thread. An `Err` is reported back as a definition
/// failure for that unit only.
pub trait Materializer: Send + Sync + Debug + 'static {
    fn materialize(&self, definition: &FunctionDefinition) -> Result<Executable, String>;
}

/// A function compiled into the host that units can run by name.
pub trait Deployable: Send + Sync + 'static {
    /// Catalog key, also used as the definition body.
    const NAME: &'static str;
    /// Number of positional arguments.
    const ARITY: usize;

    /// Decode the arguments, run the function and encode its result.
    fn invoke(args: Vec<Value>) -> BoxedFuture<'static, Result<Value, String>>;

    fn definition() -> FunctionDefinition
    where
        Self: Sized,
    {
        FunctionDefinition::named(Self::NAME, Self::ARITY)
    }

    fn executable() -> Executable
    where
        Self: Sized,
    {
        Arc::new(Self::invoke)
    }
}
