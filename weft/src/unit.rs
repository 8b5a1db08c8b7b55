//! # Execution Unit Module
//!
//! One execution unit is one dedicated OS thread hosting a private function
//! registry. It talks to the orchestrator only through its [`Mailbox`].
//!
//! ## Key Concepts
//! - Registry: `FunctionId -> Executable`, private to the unit
//! - Request handling: `register` materializes a definition, `invoke` runs a
//!   registered function and replies with its outcome
//! - Ordering: frames are accepted strictly in arrival order; replies to
//!   invokes are sent when each call completes, so they may overtake each other
//!
//! ## Design Principles
//! - Isolation: a unit shares no mutable state with the orchestrator
//! - Error handling: a failing or panicking function rejects only its own call;
//!   an unrecognized frame is logged and dropped without stopping the unit
//! - Controlled shutdown: stop signal, then the thread exits and is joined

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use flume::Sender;
use futures::FutureExt;
use tokio::sync::oneshot;
use tracing::{Instrument, debug, error, warn};

use weft_api::protocol::{self, UnitFault, UnitReply, UnitRequest};
use weft_api::{
    BoxedFuture, CallId, Executable, Frame, FunctionDefinition, FunctionId, Materializer, UnitId,
    Value, WeftError, WeftResult,
};

use crate::mailbox::Mailbox;
use crate::{log_error, log_lifecycle, log_protocol, unit_span};

/// What handling one request produced.
pub enum Dispatch {
    /// The reply is ready now.
    Reply(UnitReply),
    /// The reply is produced by running a function.
    Pending(BoxedFuture<'static, UnitReply>),
}

/// The state owned by one execution unit.
pub struct ExecutionUnit {
    id: UnitId,
    materializer: Arc<dyn Materializer>,
    registry: HashMap<FunctionId, Executable>,
}

impl ExecutionUnit {
    pub fn new(id: UnitId, materializer: Arc<dyn Materializer>) -> Self {
        Self {
            id,
            materializer,
            registry: HashMap::new(),
        }
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    /// Materialize `definition` and store it under `function_id`.
    pub fn register(
        &mut self,
        function_id: &FunctionId,
        definition: &FunctionDefinition,
    ) -> Result<(), UnitFault> {
        match self.registry.entry(function_id.clone()) {
            Entry::Occupied(_) => Err(UnitFault::DuplicateFunction(function_id.clone())),
            Entry::Vacant(slot) => {
                let executable = self
                    .materializer
                    .materialize(definition)
                    .map_err(UnitFault::Definition)?;
                slot.insert(executable);
                Ok(())
            }
        }
    }

    /// Start a call of a registered function.
    ///
    /// The returned future runs the function; a panic inside it is reported
    /// as an execution failure.
    pub fn invoke(
        &self,
        function_id: &FunctionId,
        args: Vec<Value>,
    ) -> Result<BoxedFuture<'static, Result<Value, UnitFault>>, UnitFault> {
        let executable = self
            .registry
            .get(function_id)
            .ok_or_else(|| UnitFault::FunctionNotFound(function_id.clone()))?;
        let executable = Arc::clone(executable);

        Ok(Box::pin(async move {
            match AssertUnwindSafe(async move { executable(args).await })
                .catch_unwind()
                .await
            {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(reason)) => Err(UnitFault::Execution(reason)),
                Err(panic) => Err(UnitFault::Execution(format!(
                    "function panicked: {}",
                    panic_message(panic.as_ref())
                ))),
            }
        }))
    }

    /// Handle one request.
    pub fn handle(&mut self, request: UnitRequest) -> Dispatch {
        match request {
            UnitRequest::Register {
                function_id,
                definition,
            } => match self.register(&function_id, &definition) {
                Ok(()) => {
                    debug!(unit = %self.id, function = %function_id, name = %definition.name, "function registered");
                    Dispatch::Reply(UnitReply::RegisterSucceeded { function_id })
                }
                Err(error) => {
                    warn!(unit = %self.id, function = %function_id, %error, "function registration failed");
                    Dispatch::Reply(UnitReply::RegisterFailed { function_id, error })
                }
            },
            UnitRequest::Invoke {
                function_id,
                call_id,
                args,
            } => match self.invoke(&function_id, args) {
                Ok(call) => Dispatch::Pending(Box::pin(async move {
                    match call.await {
                        Ok(value) => UnitReply::InvokeSucceeded { call_id, value },
                        Err(error) => UnitReply::InvokeFailed { call_id, error },
                    }
                })),
                Err(error) => {
                    error!(unit = %self.id, function = %function_id, call = %call_id, "invoke for a function this unit never registered");
                    Dispatch::Reply(UnitReply::InvokeFailed { call_id, error })
                }
            },
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}

/// Serve requests until stopped or until the orchestrator goes away.
pub async fn run(mut unit: ExecutionUnit, mailbox: Mailbox, mut stop_rx: oneshot::Receiver<()>) {
    let replies = mailbox.sender();

    loop {
        let frame = tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            frame = mailbox.next_frame() => match frame {
                Ok(frame) => frame,
                // Orchestrator end dropped
                Err(_) => break,
            },
        };

        let request = match protocol::decode_request(&frame) {
            Ok(request) => request,
            Err(e) => {
                log_error!(e, unit = %unit.id(), "rejected frame");
                continue;
            }
        };
        log_protocol!(request.kind(), "received", unit = %unit.id());

        match unit.handle(request) {
            Dispatch::Reply(reply) => send_reply(&replies, unit.id(), reply).await,
            Dispatch::Pending(call) => {
                let replies = replies.clone();
                let unit_id = unit.id().clone();
                let span = unit_span!(unit_id);
                tokio::spawn(
                    async move {
                        let reply = call.await;
                        send_reply(&replies, &unit_id, reply).await;
                    }
                    .instrument(span),
                );
            }
        }
    }
}

async fn send_reply(replies: &Sender<Frame>, unit_id: &UnitId, reply: UnitReply) {
    let kind = reply.kind();
    let frame = match protocol::encode_reply(&reply) {
        Ok(frame) => frame,
        Err(e) => {
            // Only the value of a successful call can fail to encode
            log_error!(e, unit = %unit_id);
            match reply {
                UnitReply::InvokeSucceeded { call_id, .. } => match failed_encode_reply(call_id, &e) {
                    Some(frame) => frame,
                    None => return,
                },
                _ => return,
            }
        }
    };

    if replies.send_async(frame).await.is_err() {
        debug!(unit = %unit_id, kind, "orchestrator gone, reply dropped");
    } else {
        log_protocol!(kind, "sent", unit = %unit_id);
    }
}

fn failed_encode_reply(call_id: CallId, error: &protocol::ProtocolError) -> Option<Frame> {
    protocol::encode_reply(&UnitReply::InvokeFailed {
        call_id,
        error: UnitFault::Execution(error.to_string()),
    })
    .ok()
}

/// Handle to a running unit thread.
#[derive(Debug)]
pub struct UnitThread {
    id: UnitId,
    stop_tx: Option<oneshot::Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl UnitThread {
    /// Spawn a unit thread serving the unit end of a link.
    pub fn spawn(
        id: UnitId,
        materializer: Arc<dyn Materializer>,
        mailbox: Mailbox,
        thread_name: String,
    ) -> WeftResult<Self> {
        let (stop_tx, stop_rx) = oneshot::channel();
        let dispatcher = crate::logging::current_subscriber();
        let unit = ExecutionUnit::new(id.clone(), materializer);
        let thread_id = id.clone();

        let thread_handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                tracing::dispatcher::with_default(&dispatcher, || {
                    Self::unit_thread_main(thread_id, unit, mailbox, stop_rx)
                })
            })
            .with_context(|| format!("failed to spawn thread for unit {}", id))?;

        log_lifecycle!(id, "started");

        Ok(Self {
            id,
            stop_tx: Some(stop_tx),
            thread_handle: Some(thread_handle),
        })
    }

    fn unit_thread_main(
        id: UnitId,
        unit: ExecutionUnit,
        mailbox: Mailbox,
        stop_rx: oneshot::Receiver<()>,
    ) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                log_error!(e, unit = %id, "unit runtime could not be built");
                return;
            }
        };

        runtime.block_on(run(unit, mailbox, stop_rx).instrument(unit_span!(id)));
        // Dropping the runtime cancels calls still in flight
        drop(runtime);
        log_lifecycle!(id, "stopped");
    }

    /// Signal the thread to stop without waiting for it.
    pub fn signal_stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Signal the thread to stop and join it off the async runtime.
    pub async fn stop(mut self, wait_timeout: Option<Duration>) -> WeftResult<()> {
        self.signal_stop();

        let Some(thread_handle) = self.thread_handle.take() else {
            return Ok(());
        };
        let join = tokio::task::spawn_blocking(move || thread_handle.join());

        let joined = match wait_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, join).await {
                Ok(joined) => joined,
                Err(_) => {
                    return Err(WeftError::Shutdown(format!(
                        "timed out after {:?} waiting for unit {} to stop",
                        timeout, self.id
                    )));
                }
            },
            None => join.await,
        };

        match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(panic)) => Err(WeftError::UnitPanicked {
                unit: self.id.clone(),
                reason: panic_message(panic.as_ref()),
            }),
            Err(e) => Err(WeftError::Shutdown(format!(
                "failed to join unit {}: {}",
                self.id, e
            ))),
        }
    }
}

impl Drop for UnitThread {
    fn drop(&mut self) {
        self.signal_stop();
    }
}
