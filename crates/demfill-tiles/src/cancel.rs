//! Cooperative cancellation and run deadlines.

use crate::{DemError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest uninterrupted wait inside [`CancelToken::sleep`].
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Shared cancellation flag with an optional deadline.
///
/// Clones share the flag, so cancelling any clone cancels them all. Workers
/// poll [`is_cancelled`](Self::is_cancelled) between tiles; requests already
/// in flight run to completion or their own timeout.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that is never cancelled until [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire the token `timeout` from now.
    ///
    /// A timeout too far in the future to represent leaves the token without
    /// a deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Expire the token at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once cancelled or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.is_expired()
    }

    fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Time left before the deadline, or `None` without one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Sleep for `duration`, waking early on cancellation.
    ///
    /// Returns `false` if the token was cancelled or expired before the full
    /// duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let until = Instant::now().checked_add(duration);
        loop {
            if self.is_cancelled() {
                return false;
            }
            let left = match until {
                Some(until) => until.saturating_duration_since(Instant::now()),
                None => SLEEP_SLICE,
            };
            if left.is_zero() {
                return true;
            }
            std::thread::sleep(left.min(SLEEP_SLICE));
        }
    }

    /// `Err(Cancelled)` or `Err(DeadlineExceeded)` if the run must stop.
    pub fn check(&self) -> Result<()> {
        if self.flag.load(Ordering::SeqCst) {
            return Err(DemError::Cancelled);
        }
        if self.is_expired() {
            return Err(DemError::DeadlineExceeded);
        }
        Ok(())
    }
}
