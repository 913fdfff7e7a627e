//! A cloneable handle for poking the widget from other tasks.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for poking the widget from other tasks.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct WidgetHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) idle_notify: Arc<tokio::sync::Notify>,
    pub(crate) is_running: Arc<AtomicBool>,
}

impl Default for WidgetHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            idle_notify: Arc::new(tokio::sync::Notify::new()),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Abort the in-flight send, if any.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Install a fresh token for a new send and mark it running.
    pub(crate) fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        self.is_running.store(true, Ordering::Release);
        token
    }

    /// Mark the send finished and wake waiters.
    pub(crate) fn end(&self) {
        self.is_running.store(false, Ordering::Release);
        self.idle_notify.notify_waiters();
    }

    /// Wait until no send is in flight.
    pub async fn wait_for_idle(&self) {
        let notified = self.idle_notify.notified();
        if !self.is_running.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    /// Whether a send is in flight.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }
}

/// Marks the handle idle when dropped, on every exit path of a send
pub(crate) struct RunningGuard {
    handle: WidgetHandle,
}

impl RunningGuard {
    pub(crate) fn enter(handle: &WidgetHandle) -> (Self, CancellationToken) {
        let token = handle.begin();
        let guard = Self {
            handle: handle.clone(),
        };
        (guard, token)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.handle.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_cancels_current_token() {
        let handle = WidgetHandle::new();
        let token = handle.begin();
        handle.clone().abort();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_begin_replaces_cancelled_token() {
        let handle = WidgetHandle::new();
        handle.abort();
        let token = handle.begin();
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_guard_marks_idle_on_drop() {
        let handle = WidgetHandle::new();
        {
            let (_guard, _token) = RunningGuard::enter(&handle);
            assert!(handle.is_running());
        }
        assert!(!handle.is_running());
        handle.wait_for_idle().await;
    }
}
