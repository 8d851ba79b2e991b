//! Handles for in-flight requests.
//!
//! # Design
//! Each request owns one atomic state that starts `PENDING` and moves exactly
//! once, either to `DELIVERED` (the completion won) or to `ABORTED` (the
//! caller won). Delivery and abort both go through a compare-exchange, so the
//! completion runs at most once and never after a successful `abort`.
//!
//! The request task checks the state before calling the transport, so an
//! abort that wins before the task first runs keeps the request from being
//! sent. A later abort cancels the task; the request may already be on the
//! wire, but its outcome is dropped.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::client::Outcome;

const PENDING: u8 = 0;
const DELIVERED: u8 = 1;
const ABORTED: u8 = 2;

#[derive(Debug)]
struct Inner {
    state: AtomicU8,
    task: Mutex<Option<AbortHandle>>,
}

/// Cancellation handle for one request. Cheap to clone; `Send + Sync`.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    inner: Arc<Inner>,
}

impl RequestHandle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(PENDING),
                task: Mutex::new(None),
            }),
        }
    }

    /// Abort the request.
    ///
    /// Returns `true` if this call prevented delivery, `false` if the outcome
    /// was already delivered or the request was already aborted.
    pub fn abort(&self) -> bool {
        let won = self
            .inner
            .state
            .compare_exchange(PENDING, ABORTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            let task = self.inner.task.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(task) = task.as_ref() {
                task.abort();
            }
        }
        won
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == ABORTED
    }

    pub fn is_finished(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) != PENDING
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == PENDING
    }

    /// Claim the right to deliver the outcome.
    pub(crate) fn claim(&self) -> bool {
        self.inner
            .state
            .compare_exchange(PENDING, DELIVERED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Register the task running this request.
    pub(crate) fn attach(&self, task: AbortHandle) {
        let mut slot = self.inner.task.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_aborted() {
            task.abort();
        }
        *slot = Some(task);
    }
}

/// A request whose outcome is awaited rather than passed to a callback.
#[derive(Debug)]
pub struct PendingRequest<T> {
    handle: RequestHandle,
    receiver: oneshot::Receiver<Outcome<T>>,
}

impl<T> PendingRequest<T> {
    pub(crate) fn new(handle: RequestHandle, receiver: oneshot::Receiver<Outcome<T>>) -> Self {
        Self { handle, receiver }
    }

    /// A handle that can abort this request from another thread.
    pub fn handle(&self) -> RequestHandle {
        self.handle.clone()
    }

    pub fn abort(&self) -> bool {
        self.handle.abort()
    }

    /// Wait for the outcome. `None` means the request was aborted.
    pub async fn outcome(self) -> Option<Outcome<T>> {
        self.receiver.await.ok()
    }
}
