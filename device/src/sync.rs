//! Timeline signals used to observe queue completion.
//!
//! A timeline signal is a monotonically increasing counter. Every submission to a queue is
//! assigned the next value, and the signal reaches that value once the submission has finished
//! executing. Waiting for a value is the host-side fence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, TimeoutSnafu};

pub trait TimelineSignal: Send + Sync + std::fmt::Debug {
    fn value(&self) -> u64;

    /// Advance the signal to `value`. Values lower than the current one are ignored.
    fn set(&self, value: u64);

    /// Block until the signal reaches `value`. A `timeout_ms` of 0 waits forever.
    fn wait(&self, value: u64, timeout_ms: u64) -> Result<()>;

    fn is_reached(&self, value: u64) -> bool {
        self.value() >= value
    }
}

/// Host timeline signal backed by an atomic counter and a condvar.
#[derive(Debug, Default)]
pub struct CpuTimelineSignal {
    value: AtomicU64,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl CpuTimelineSignal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimelineSignal for CpuTimelineSignal {
    fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    fn set(&self, value: u64) {
        let _guard = self.lock.lock();
        self.value.fetch_max(value, Ordering::AcqRel);
        self.condvar.notify_all();
    }

    fn wait(&self, target: u64, timeout_ms: u64) -> Result<()> {
        if self.is_reached(target) {
            return Ok(());
        }

        let deadline = (timeout_ms > 0).then(|| Instant::now() + Duration::from_millis(timeout_ms));
        let mut guard = self.lock.lock();
        while !self.is_reached(target) {
            match deadline {
                None => self.condvar.wait(&mut guard),
                Some(deadline) => {
                    if self.condvar.wait_until(&mut guard, deadline).timed_out() && !self.is_reached(target) {
                        return TimeoutSnafu { timeout_ms, target, current: self.value() }.fail();
                    }
                }
            }
        }
        Ok(())
    }
}
