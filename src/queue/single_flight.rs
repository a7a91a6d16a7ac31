use std::sync::atomic::{AtomicBool, Ordering};

/// Gate allowing at most one outstanding work item per queue.
///
/// Unlike a mutex this never blocks: a caller that loses the race is told so
/// and moves on.
#[derive(Debug)]
pub(crate) struct SingleFlight {
    available: AtomicBool,
}

impl SingleFlight {
    pub(crate) fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
        }
    }

    /// Take the gate if it is free.
    pub(crate) fn try_acquire(&self) -> bool {
        self.available
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release(&self) {
        self.available.store(true, Ordering::Release);
    }

    pub(crate) fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}
