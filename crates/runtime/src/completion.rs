use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Creates the channel that carries results from worker threads (or an async
/// transport) back to the thread that owns the mutable state.
///
/// Everything that crosses threads goes through here; the receiving side is
/// drained explicitly so all state mutation stays on one thread.
pub fn completion_channel<T>() -> (CompletionSender<T>, CompletionReceiver<T>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (CompletionSender { inner: tx }, CompletionReceiver { inner: rx })
}

#[derive(Debug)]
pub struct CompletionSender<T> {
    inner: Sender<T>,
}

impl<T> Clone for CompletionSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> CompletionSender<T> {
    /// Delivers a result. Returns `false` when the receiving side is gone, in
    /// which case the value is dropped.
    pub fn send(&self, value: T) -> bool {
        self.inner.send(value).is_ok()
    }
}

#[derive(Debug)]
pub struct CompletionReceiver<T> {
    inner: Receiver<T>,
}

impl<T> CompletionReceiver<T> {
    pub fn try_recv(&self) -> Option<T> {
        match self.inner.try_recv() {
            Ok(v) => Some(v),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Blocks for at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        match self.inner.recv_timeout(timeout) {
            Ok(v) => Some(v),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Takes everything that has arrived so far without blocking.
    pub fn drain(&self) -> Vec<T> {
        self.inner.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
