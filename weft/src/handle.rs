//! # Threaded Function Handle
//!
//! What deployment hands back: a cheap, cloneable handle bound to the units
//! that accepted the function. Each call goes to the next unit in round-robin
//! order; clones share the rotation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::de::DeserializeOwned;

use weft_api::{CallId, FunctionId, UnitId, Value, WeftError, WeftResult};

use crate::proxy::UnitProxy;

struct Inner {
    function_id: FunctionId,
    name: String,
    arity: usize,
    /// Units that registered the function, in deployment order
    units: Vec<Arc<UnitProxy>>,
    next: AtomicUsize,
}

/// A deployed function, callable from any task.
#[derive(Clone)]
pub struct ThreadedFunction {
    inner: Arc<Inner>,
}

impl ThreadedFunction {
    pub(crate) fn new(
        function_id: FunctionId,
        name: String,
        arity: usize,
        units: Vec<Arc<UnitProxy>>,
    ) -> Self {
        debug_assert!(!units.is_empty());
        Self {
            inner: Arc::new(Inner {
                function_id,
                name,
                arity,
                units,
                next: AtomicUsize::new(0),
            }),
        }
    }

    /// Call the function on the next unit in rotation.
    ///
    /// Arguments are passed through as given; the deployed function decides
    /// what to do with a count that differs from its arity.
    ///
    /// # Errors
    /// * `CallFailed` - the function failed on the unit
    /// * `AlreadyDestroyed` - the pool has been destroyed
    /// * `Timeout` / `UnitStopped` - no reply arrived
    pub async fn call(&self, args: Vec<Value>) -> WeftResult<Value> {
        let unit = self.next_unit();
        unit.invoke(&self.inner.function_id, CallId::generate(), args).await
    }

    /// Call and decode the result into `R`.
    pub async fn call_as<R: DeserializeOwned>(&self, args: Vec<Value>) -> WeftResult<R> {
        let value = self.call(args).await?;
        serde_json::from_value(value).map_err(|e| {
            WeftError::CallFailed(format!(
                "result of {} could not be decoded: {}",
                self.inner.name, e
            ))
        })
    }

    fn next_unit(&self) -> &Arc<UnitProxy> {
        let units = &self.inner.units;
        let index = self.inner.next.fetch_add(1, Ordering::Relaxed) % units.len();
        &units[index]
    }

    pub fn function_id(&self) -> &FunctionId {
        &self.inner.function_id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn arity(&self) -> usize {
        self.inner.arity
    }

    /// The units this function is registered on, in rotation order.
    pub fn units(&self) -> Vec<UnitId> {
        self.inner.units.iter().map(|unit| unit.id().clone()).collect()
    }
}

impl fmt::Debug for ThreadedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadedFunction")
            .field("function_id", &self.inner.function_id)
            .field("name", &self.inner.name)
            .field("arity", &self.inner.arity)
            .field("units", &self.inner.units.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnitConfig;
    use crate::mailbox::{self, Mailbox};
    use serde_json::json;
    use weft_api::protocol::{self, UnitReply, UnitRequest};

    fn detached(name: &str) -> (Arc<UnitProxy>, Mailbox) {
        let (orchestrator_end, unit_end) = mailbox::duplex(None);
        let proxy = UnitProxy::attach(UnitId::from(name), orchestrator_end, None, UnitConfig::default());
        (Arc::new(proxy), unit_end)
    }

    /// Answer one invoke with the name of the unit that received it.
    async fn answer(unit_end: &Mailbox, name: &str) {
        let frame = unit_end.next_frame().await.unwrap();
        let UnitRequest::Invoke { call_id, .. } = protocol::decode_request(&frame).unwrap() else {
            panic!("expected an invoke request");
        };
        let reply = UnitReply::InvokeSucceeded {
            call_id,
            value: json!(name),
        };
        unit_end.post(protocol::encode_reply(&reply).unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn test_calls_rotate_across_units() {
        let (a, a_end) = detached("a");
        let (b, b_end) = detached("b");
        let function = ThreadedFunction::new(FunctionId::from("f1"), "who".to_string(), 0, vec![a, b]);
        let clone = function.clone();

        let mut served = Vec::new();
        for (handle, end, name) in [
            (&function, &a_end, "a"),
            (&clone, &b_end, "b"),
            (&function, &a_end, "a"),
        ] {
            let (value, ()) = tokio::join!(handle.call(vec![]), answer(end, name));
            served.push(value.unwrap());
        }

        assert_eq!(served, vec![json!("a"), json!("b"), json!("a")]);
        assert_eq!(function.units(), vec![UnitId::from("a"), UnitId::from("b")]);
    }

    #[tokio::test]
    async fn test_call_as_decodes_or_reports() {
        let (a, a_end) = detached("a");
        let function = ThreadedFunction::new(FunctionId::from("f1"), "who".to_string(), 0, vec![a]);

        let (name, ()) = tokio::join!(function.call_as::<String>(vec![]), answer(&a_end, "a"));
        assert_eq!(name.unwrap(), "a");

        let (number, ()) = tokio::join!(function.call_as::<u32>(vec![]), answer(&a_end, "a"));
        assert!(matches!(number, Err(WeftError::CallFailed(_))));
    }
}
