use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Why a token stopped further work.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Interrupt {
    Cancelled,
    TimedOut,
}

/// Cancellation flag shared across a batch, plus an optional deadline that
/// is specific to one repository's sync.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Shares the cancel flag; the deadline starts now.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            deadline: timeout.map(|timeout| Instant::now() + timeout),
        }
    }

    pub fn interrupt(&self) -> Option<Interrupt> {
        if self.flag.load(Ordering::SeqCst) {
            return Some(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupt::TimedOut),
            _ => None,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt().is_some()
    }
}
