//! A cloneable handle for stopping a session from external code.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for stopping the session while an exchange is running.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) streaming: Arc<AtomicBool>,
    pub(crate) running: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            streaming: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the in-flight exchange and clear the streaming flag.
    ///
    /// Calling it again, or with nothing in flight, changes nothing further.
    pub fn stop(&self) {
        self.cancel.lock().cancel();
        self.streaming.store(false, Ordering::Release);
    }

    /// Whether the streaming indicator is on.
    ///
    /// This drops to `false` while the transport is reconnecting.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Whether an exchange is in flight (including reconnect waits).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The token of the current (or most recent) exchange.
    pub fn current_token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    /// Install a fresh token for a new exchange and mark it running.
    pub(crate) fn begin_exchange(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        self.running.store(true, Ordering::Release);
        self.streaming.store(true, Ordering::Release);
        token
    }

    pub(crate) fn set_streaming(&self, active: bool) {
        self.streaming.store(active, Ordering::Release);
    }

    pub(crate) fn finish_exchange(&self) {
        self.streaming.store(false, Ordering::Release);
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_idempotent() {
        let handle = SessionHandle::new();
        let token = handle.begin_exchange();
        assert!(handle.is_streaming());

        handle.stop();
        handle.stop();

        assert!(!handle.is_streaming());
        assert!(token.is_cancelled());
        assert!(handle.current_token().is_cancelled());
    }

    #[test]
    fn test_each_exchange_gets_fresh_token() {
        let handle = SessionHandle::new();
        let first = handle.begin_exchange();
        handle.stop();
        handle.finish_exchange();

        let second = handle.begin_exchange();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!handle.current_token().is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let handle = SessionHandle::new();
        let other = handle.clone();
        handle.begin_exchange();
        assert!(other.is_running());
        other.stop();
        assert!(!handle.is_streaming());
        handle.finish_exchange();
        assert!(!other.is_running());
    }
}
