//! Callback-to-future completion bridge
//!
//! Callback-style backends fire a request and report the result through
//! `onFinish`/`onCancel` handlers. This bridge converts that shape into
//! a single awaited result: the first handler invocation resolves the
//! future, every later invocation is ignored.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

enum Resolution<T> {
    Finished(T),
    Cancelled,
}

/// Resolver handed to a callback-style backend call.
///
/// Clonable so a host shim can wire `finish` and `cancel` to separate
/// native callbacks. Only the first resolution wins.
pub struct Completion<T> {
    tx: Arc<Mutex<Option<oneshot::Sender<Resolution<T>>>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> Completion<T> {
    /// Resolve with a result. Ignored after any prior resolution.
    pub fn finish(&self, value: T) {
        if let Some(tx) = self.tx.lock().unwrap().take() {
            let _ = tx.send(Resolution::Finished(value));
        }
    }

    /// Resolve as an explicit user cancellation. Ignored after any prior
    /// resolution.
    pub fn cancel(&self) {
        if let Some(tx) = self.tx.lock().unwrap().take() {
            let _ = tx.send(Resolution::Cancelled);
        }
    }
}

/// Why an awaited completion did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionError {
    /// The backend invoked the cancel handler.
    Cancelled,
    /// Every resolver handle was dropped without resolving. A held
    /// handle may legitimately pend forever (the backend owns the
    /// prompt lifecycle); a dropped one cannot resolve anymore.
    Abandoned,
}

/// The awaiting side of a completion pair.
pub struct CompletionFuture<T> {
    rx: oneshot::Receiver<Resolution<T>>,
}

impl<T> CompletionFuture<T> {
    /// Suspend until the backend resolves the request.
    pub async fn wait(self) -> Result<T, CompletionError> {
        match self.rx.await {
            Ok(Resolution::Finished(value)) => Ok(value),
            Ok(Resolution::Cancelled) => Err(CompletionError::Cancelled),
            Err(_) => Err(CompletionError::Abandoned),
        }
    }
}

/// Create a linked resolver/future pair for one backend request.
pub fn completion<T>() -> (Completion<T>, CompletionFuture<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Completion {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        CompletionFuture { rx },
    )
}
