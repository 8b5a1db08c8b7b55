//! # Function Catalog
//!
//! The materializer weft units use: a closed set of functions compiled into
//! the host and looked up by name.
//!
//! A [`FunctionDefinition`] is materialized by treating its `body` as a
//! catalog name. Arbitrary source text is never evaluated; a function can only
//! be deployed if the catalog every unit was created with contains it.
//!
//! ```rust
//! use weft::catalog::FunctionCatalog;
//! use weft_api::{deployable, Value};
//!
//! #[deployable]
//! fn double(x: i64) -> i64 {
//!     x * 2
//! }
//!
//! let catalog = FunctionCatalog::new()
//!     .with::<DoubleFn>()
//!     .with_fn("negate", 1, |args| {
//!         let x = args[0].as_i64().ok_or("expected an integer")?;
//!         Ok(Value::from(-x))
//!     });
//!
//! assert!(catalog.contains("double"));
//! assert!(catalog.contains("negate"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use weft_api::{BoxedFuture, Deployable, Executable, FunctionDefinition, Materializer, Value};

#[derive(Clone)]
struct CatalogEntry {
    arity: usize,
    executable: Executable,
}

/// Named functions units can materialize.
#[derive(Clone, Default)]
pub struct FunctionCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl FunctionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `Deployable` under its own name.
    pub fn insert<D: Deployable>(&mut self) {
        self.insert_executable(D::NAME, D::ARITY, D::executable());
    }

    /// Add a synchronous closure. It runs on the unit thread when called.
    pub fn insert_fn<F>(&mut self, name: impl Into<String>, arity: usize, function: F)
    where
        F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        let function = Arc::new(function);
        let executable: Executable = Arc::new(move |args: Vec<Value>| -> BoxedFuture<'static, Result<Value, String>> {
            let function = Arc::clone(&function);
            Box::pin(async move { function(args) })
        });
        self.insert_executable(name, arity, executable);
    }

    /// Add an asynchronous closure. Its future runs on the unit's runtime.
    pub fn insert_async<F, Fut>(&mut self, name: impl Into<String>, arity: usize, function: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let executable: Executable =
            Arc::new(move |args: Vec<Value>| -> BoxedFuture<'static, Result<Value, String>> {
                Box::pin(function(args))
            });
        self.insert_executable(name, arity, executable);
    }

    /// Add an already materialized executable. Replaces any entry with the same name.
    pub fn insert_executable(&mut self, name: impl Into<String>, arity: usize, executable: Executable) {
        self.entries
            .insert(name.into(), CatalogEntry { arity, executable });
    }

    pub fn with<D: Deployable>(mut self) -> Self {
        self.insert::<D>();
        self
    }

    pub fn with_fn<F>(mut self, name: impl Into<String>, arity: usize, function: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.insert_fn(name, arity, function);
        self
    }

    pub fn with_async<F, Fut>(mut self, name: impl Into<String>, arity: usize, function: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        self.insert_async(name, arity, function);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn arity(&self, name: &str) -> Option<usize> {
        self.entries.get(name).map(|entry| entry.arity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Definition of a catalog entry, ready to deploy.
    pub fn definition(&self, name: &str) -> Option<FunctionDefinition> {
        self.arity(name)
            .map(|arity| FunctionDefinition::named(name, arity))
    }
}

impl Materializer for FunctionCatalog {
    fn materialize(&self, definition: &FunctionDefinition) -> Result<Executable, String> {
        let key = definition.body.trim();
        if key.is_empty() {
            return Err("function body is empty".to_string());
        }

        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| format!("no function named `{}` in the catalog", key))?;

        if entry.arity != definition.arity {
            return Err(format!(
                "`{}` takes {} argument(s) but the definition declares {}",
                key, entry.arity, definition.arity
            ));
        }

        Ok(Arc::clone(&entry.executable))
    }
}

impl fmt::Debug for FunctionCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FunctionCatalog")
            .field("functions", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> FunctionCatalog {
        FunctionCatalog::new()
            .with_fn("add", 2, |args| {
                let a = args[0].as_i64().ok_or("a must be an integer")?;
                let b = args[1].as_i64().ok_or("b must be an integer")?;
                Ok(json!(a + b))
            })
            .with_async("echo", 1, |mut args| async move { Ok(args.remove(0)) })
    }

    #[tokio::test]
    async fn test_materializes_sync_and_async_entries() {
        let catalog = catalog();

        let add = catalog.materialize(&FunctionDefinition::named("add", 2)).unwrap();
        assert_eq!(add(vec![json!(2), json!(3)]).await, Ok(json!(5)));

        let echo = catalog.materialize(&FunctionDefinition::named("echo", 1)).unwrap();
        assert_eq!(echo(vec![json!("hi")]).await, Ok(json!("hi")));
    }

    #[test]
    fn test_unknown_name_is_a_definition_failure() {
        let err = catalog()
            .materialize(&FunctionDefinition::named("missing", 0))
            .err()
            .unwrap();
        assert!(err.contains("missing"));
    }

    #[test]
    fn test_empty_body_is_rejected() {
        let definition = FunctionDefinition::new("blank", 0, "   ");
        assert_eq!(
            catalog().materialize(&definition).err().unwrap(),
            "function body is empty"
        );
    }

    #[test]
    fn test_arity_must_match_the_entry() {
        let err = catalog()
            .materialize(&FunctionDefinition::named("add", 3))
            .err()
            .unwrap();
        assert!(err.contains("takes 2 argument(s)"));
    }

    #[test]
    fn test_definition_uses_the_entry_arity() {
        let catalog = catalog();
        assert_eq!(catalog.definition("add"), Some(FunctionDefinition::named("add", 2)));
        assert_eq!(catalog.definition("nope"), None);
        assert_eq!(catalog.len(), 2);
        assert!(format!("{:?}", catalog).contains("\"add\""));
    }
}
