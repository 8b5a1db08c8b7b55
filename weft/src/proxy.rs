//! # Unit Proxy
//!
//! The orchestrator-side stand-in for one execution unit. It turns the
//! unit's message protocol into awaitable operations.
//!
//! ## Correlation
//! Every outgoing request is recorded in a pending log before it is posted:
//! registrations keyed by [`FunctionId`], calls keyed by [`CallId`]. A reply
//! pump task drains the unit's reply channel and settles the matching entry.
//! Each entry settles at most once; a reply with no matching entry is logged
//! and dropped. When the unit goes away every outstanding entry is rejected
//! with `UnitStopped`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use flume::Receiver;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, trace, warn};

use weft_api::protocol::{self, UnitReply, UnitRequest};
use weft_api::{
    CallId, Frame, FunctionDefinition, FunctionId, Materializer, UnitId, Value, WeftError,
    WeftResult,
};

use crate::config::UnitConfig;
use crate::error::MailboxError;
use crate::mailbox::{self, Mailbox};
use crate::unit::UnitThread;
use crate::{log_error, log_protocol, unit_span};

type Settle<T> = oneshot::Sender<Result<T, WeftError>>;

/// Outstanding requests of one kind, keyed by their correlation id.
struct PendingLog<K, T> {
    state: Mutex<PendingState<K, T>>,
}

struct PendingState<K, T> {
    entries: HashMap<K, Settle<T>>,
    /// Set once the unit is gone; nothing new may be recorded
    closed: bool,
}

impl<K: Eq + Hash + Clone + fmt::Display, T> PendingLog<K, T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(PendingState {
                entries: HashMap::new(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PendingState<K, T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `key` as awaiting a reply.
    ///
    /// Returns `None` if the log is closed or `key` is already pending.
    fn record(&self, key: K) -> Option<oneshot::Receiver<Result<T, WeftError>>> {
        let mut state = self.lock();
        if state.closed || state.entries.contains_key(&key) {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        state.entries.insert(key, tx);
        Some(rx)
    }

    fn remove(&self, key: &K) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Settle the entry for `key`. Returns false if nothing was pending under it.
    fn settle(&self, key: &K, outcome: Result<T, WeftError>) -> bool {
        let Some(tx) = self.lock().entries.remove(key) else {
            return false;
        };
        // The waiter may have given up already
        let _ = tx.send(outcome);
        true
    }

    /// Reject everything outstanding and refuse new entries.
    fn close(&self, error: impl Fn() -> WeftError) -> usize {
        let entries: Vec<Settle<T>> = {
            let mut state = self.lock();
            state.closed = true;
            state.entries.drain().map(|(_, tx)| tx).collect()
        };
        let count = entries.len();
        for tx in entries {
            let _ = tx.send(Err(error()));
        }
        count
    }

    fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

/// Both pending logs of a unit.
struct Correlation {
    unit_id: UnitId,
    registrations: PendingLog<FunctionId, ()>,
    calls: PendingLog<CallId, Value>,
}

impl Correlation {
    fn new(unit_id: UnitId) -> Self {
        Self {
            unit_id,
            registrations: PendingLog::new(),
            calls: PendingLog::new(),
        }
    }

    fn deliver(&self, reply: UnitReply) {
        let kind = reply.kind();
        let settled = match reply {
            UnitReply::RegisterSucceeded { function_id } => {
                self.registrations.settle(&function_id, Ok(()))
            }
            UnitReply::RegisterFailed { function_id, error } => {
                self.registrations.settle(&function_id, Err(error.into()))
            }
            UnitReply::InvokeSucceeded { call_id, value } => self.calls.settle(&call_id, Ok(value)),
            UnitReply::InvokeFailed { call_id, error } => {
                self.calls.settle(&call_id, Err(error.into()))
            }
        };

        if settled {
            log_protocol!(kind, "settled", unit = %self.unit_id);
        } else {
            warn!(unit = %self.unit_id, kind, "reply matches no pending request, dropped");
        }
    }

    fn close(&self) {
        let unit_id = &self.unit_id;
        let rejected = self
            .registrations
            .close(|| WeftError::UnitStopped(unit_id.clone()))
            + self.calls.close(|| WeftError::UnitStopped(unit_id.clone()));
        if rejected > 0 {
            warn!(unit = %unit_id, rejected, "unit stopped with requests outstanding");
        }
    }
}

/// Drain the unit's replies until its end of the link is gone.
async fn reply_pump(replies: Receiver<Frame>, correlation: Arc<Correlation>) {
    while let Ok(frame) = replies.recv_async().await {
        match protocol::decode_reply(&frame) {
            Ok(reply) => correlation.deliver(reply),
            Err(e) => log_error!(e, unit = %correlation.unit_id, "rejected reply frame"),
        }
    }
    trace!(unit = %correlation.unit_id, "reply channel closed");
    correlation.close();
}

/// Orchestrator-side handle to one execution unit.
pub struct UnitProxy {
    id: UnitId,
    mailbox: Mailbox,
    correlation: Arc<Correlation>,
    config: UnitConfig,
    thread: Mutex<Option<UnitThread>>,
    pump: JoinHandle<()>,
    terminated: AtomicBool,
}

impl UnitProxy {
    /// Start a unit thread and connect a proxy to it.
    ///
    /// Must be called from within a tokio runtime; the reply pump runs on it.
    pub fn spawn(materializer: Arc<dyn Materializer>, config: UnitConfig) -> WeftResult<Self> {
        let id = UnitId::generate();
        let (orchestrator_end, unit_end) = mailbox::duplex(config.mailbox_capacity);
        let thread_name = format!("{}-{}", config.thread_name_prefix, id.short());
        let thread = UnitThread::spawn(id.clone(), materializer, unit_end, thread_name)?;

        Ok(Self::attach(id, orchestrator_end, Some(thread), config))
    }

    /// Connect a proxy to the orchestrator end of an existing link.
    ///
    /// # Parameters
    /// * `id` - Identity of the unit on the other end
    /// * `mailbox` - Orchestrator end of the link
    /// * `thread` - The unit thread, if this proxy owns it
    /// * `config` - Timeouts applied to requests
    pub fn attach(
        id: UnitId,
        mailbox: Mailbox,
        thread: Option<UnitThread>,
        config: UnitConfig,
    ) -> Self {
        let correlation = Arc::new(Correlation::new(id.clone()));
        let pump = tokio::spawn(
            reply_pump(mailbox.receiver(), Arc::clone(&correlation)).instrument(unit_span!(id)),
        );

        Self {
            id,
            mailbox,
            correlation,
            config,
            thread: Mutex::new(thread),
            pump,
            terminated: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Number of calls still awaiting a reply.
    pub fn pending_calls(&self) -> usize {
        self.correlation.calls.len()
    }

    /// Number of registrations still awaiting a reply.
    pub fn pending_registrations(&self) -> usize {
        self.correlation.registrations.len()
    }

    fn ensure_running(&self) -> WeftResult<()> {
        if self.is_terminated() {
            return Err(WeftError::AlreadyDestroyed(format!("unit {}", self.id)));
        }
        Ok(())
    }

    /// Ask the unit to materialize and store `definition` under `function_id`.
    ///
    /// Resolves once the unit has replied. A definition the unit cannot
    /// materialize fails with `DefinitionError`, a reused id with
    /// `DuplicateFunction`.
    pub async fn register(
        &self,
        function_id: FunctionId,
        definition: FunctionDefinition,
    ) -> WeftResult<()> {
        self.ensure_running()?;
        let frame = protocol::encode_request(&UnitRequest::Register {
            function_id: function_id.clone(),
            definition,
        })?;

        let Some(rx) = self.correlation.registrations.record(function_id.clone()) else {
            return Err(self.refused(&self.correlation.registrations, || {
                WeftError::DuplicateFunction(function_id.clone())
            }));
        };
        if let Err(e) = self.post(frame).await {
            self.correlation.registrations.remove(&function_id);
            return Err(e);
        }
        log_protocol!("register", "sent", unit = %self.id, function = %function_id);

        self.await_settled(
            &self.correlation.registrations,
            &function_id,
            rx,
            self.config.register_timeout,
        )
        .await
    }

    /// Invoke a function registered on this unit.
    ///
    /// `call_id` is minted by the caller and must not be pending already; the
    /// reply carrying it settles only this call.
    pub async fn invoke(
        &self,
        function_id: &FunctionId,
        call_id: CallId,
        args: Vec<Value>,
    ) -> WeftResult<Value> {
        self.ensure_running()?;
        let frame = protocol::encode_request(&UnitRequest::Invoke {
            function_id: function_id.clone(),
            call_id: call_id.clone(),
            args,
        })?;

        let Some(rx) = self.correlation.calls.record(call_id.clone()) else {
            return Err(self.refused(&self.correlation.calls, || {
                WeftError::CallFailed(format!("call {} is already pending", call_id))
            }));
        };
        if let Err(e) = self.post(frame).await {
            self.correlation.calls.remove(&call_id);
            return Err(e);
        }
        log_protocol!("invoke", "sent", unit = %self.id, function = %function_id, call = %call_id);

        self.await_settled(&self.correlation.calls, &call_id, rx, self.config.call_timeout)
            .await
    }

    async fn post(&self, frame: Frame) -> WeftResult<()> {
        match self.mailbox.post(frame).await {
            Ok(()) => Ok(()),
            Err(MailboxError::Closed) => Err(WeftError::UnitStopped(self.id.clone())),
        }
    }

    /// Why a request could not be recorded: the unit is gone, or the key is taken.
    fn refused<K, T>(
        &self,
        log: &PendingLog<K, T>,
        duplicate: impl FnOnce() -> WeftError,
    ) -> WeftError
    where
        K: Eq + Hash + Clone + fmt::Display,
    {
        if log.lock().closed {
            WeftError::UnitStopped(self.id.clone())
        } else {
            duplicate()
        }
    }

    async fn await_settled<K, T>(
        &self,
        log: &PendingLog<K, T>,
        key: &K,
        rx: oneshot::Receiver<Result<T, WeftError>>,
        wait: Option<Duration>,
    ) -> WeftResult<T>
    where
        K: Eq + Hash + Clone + fmt::Display,
    {
        let settled = match wait {
            Some(wait) => match tokio::time::timeout(wait, rx).await {
                Ok(settled) => settled,
                Err(_) => {
                    // A late reply for this key is now unmatched
                    log.remove(key);
                    debug!(unit = %self.id, request = %key, "gave up waiting after {:?}", wait);
                    return Err(WeftError::Timeout(wait));
                }
            },
            None => rx.await,
        };

        settled.unwrap_or_else(|_| Err(WeftError::UnitStopped(self.id.clone())))
    }

    /// Stop the unit and wait for its thread to exit.
    ///
    /// Requests still outstanding are rejected with `UnitStopped`. A second
    /// call fails with `AlreadyDestroyed`.
    pub async fn terminate(&self) -> WeftResult<()> {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return Err(WeftError::AlreadyDestroyed(format!("unit {}", self.id)));
        }

        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let stopped = match thread {
            Some(thread) => thread.stop(self.config.shutdown_timeout).await,
            None => Ok(()),
        };

        self.pump.abort();
        self.correlation.close();
        debug!(unit = %self.id, "unit proxy terminated");
        stopped
    }

    /// Signal the unit to stop without waiting for its thread.
    ///
    /// Outstanding requests are rejected with `UnitStopped` once the unit's
    /// reply channel closes.
    pub fn abandon(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(thread);
    }
}

impl fmt::Debug for UnitProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitProxy")
            .field("id", &self.id)
            .field("terminated", &self.is_terminated())
            .field("pending_calls", &self.pending_calls())
            .field("pending_registrations", &self.pending_registrations())
            .finish()
    }
}

impl Drop for UnitProxy {
    fn drop(&mut self) {
        // Dropping the thread handle signals the unit to stop
        let thread = self
            .thread
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(thread);
        self.pump.abort();
    }
}
