//! Stop flag shared between the enforcement thread and the operator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};

/// A stop request that every polling loop observes.
///
/// Waits on the signal return as soon as [`trigger`](Self::trigger) is
/// called, so a pending retry or tick sleep never delays shutdown.
#[derive(Debug)]
pub struct ShutdownSignal {
    triggered: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            triggered: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    /// Request shutdown and wake every waiter.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Wait for `duration` or until shutdown is triggered.
    ///
    /// Returns `true` if shutdown was triggered.
    pub fn wait(&self, duration: Duration) -> bool {
        if self.is_shutdown() {
            return true;
        }

        let Ok(guard) = self.mutex.lock() else {
            return true;
        };

        match self
            .condvar
            .wait_timeout_while(guard, duration, |_| !self.is_shutdown())
        {
            Ok((_, timeout)) => !timeout.timed_out(),
            Err(_) => true,
        }
    }

    /// Like [`wait`](Self::wait), but reports shutdown as [`Error::Cancelled`].
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        if self.wait(duration) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Fail with [`Error::Cancelled`] if shutdown was already requested.
    pub fn check(&self) -> Result<()> {
        if self.is_shutdown() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_initial_state() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown());
        assert!(signal.check().is_ok());
    }

    #[test]
    fn test_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        assert!(signal.is_shutdown());
        assert!(matches!(signal.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_wait_timeout() {
        let signal = ShutdownSignal::new();
        let start = Instant::now();
        let interrupted = signal.wait(Duration::from_millis(50));

        assert!(!interrupted);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_interrupted() {
        let signal = Arc::new(ShutdownSignal::new());
        let waiter = Arc::clone(&signal);

        let handle = thread::spawn(move || {
            let start = Instant::now();
            let result = waiter.sleep(Duration::from_secs(10));
            (result, start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        signal.trigger();

        let (result, elapsed) = handle.join().unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_wait_already_shutdown() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        let start = Instant::now();
        assert!(signal.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
