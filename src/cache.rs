use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide leadership flag.
///
/// Exactly one writer (the election coordinator, which updates the flag
/// inline within the same handler invocation that changes the role) and any
/// number of readers. Reads never go through the coordinator mailbox, so
/// hot-path "am I leader" checks do not contend with election traffic.
#[derive(Debug, Clone, Default)]
pub struct LeadershipStatus {
    flag: Arc<AtomicBool>,
}

impl LeadershipStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous, non-blocking leadership check.
    pub fn is_leader(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, leader: bool) {
        self.flag.store(leader, Ordering::Release);
    }
}
