//! Cooperative stop flag shared between the batch driver, the signal
//! handler, and the repair loop. Setting the flag never interrupts work
//! already in flight; holders check it at their own safe points (between
//! files, between repair strategies). Forced process termination is the
//! separate, harder mechanism in `process_runner`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cheap-to-clone stop request shared across tasks
#[derive(Clone, Default)]
pub struct StopFlag {
    flag: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = StopFlag::new();
        let other = flag.clone();
        assert!(!other.is_set());
        flag.set();
        assert!(other.is_set());
        // Idempotent
        flag.set();
        assert!(flag.is_set());
    }
}
