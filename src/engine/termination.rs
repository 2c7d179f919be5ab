//! Planner termination conditions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Externally pollable stop flag with an optional wall-clock deadline.
///
/// Shared between a solver and its canceller: the solver polls
/// `is_satisfied` between iterations, any thread may call `terminate`.
pub struct TerminationCondition {
    terminated: AtomicBool,
    deadline: Option<Instant>,
}

impl TerminationCondition {
    /// Condition satisfied once `timeout` has elapsed from now.
    pub fn with_timeout(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            terminated: AtomicBool::new(false),
            deadline: Some(Instant::now() + timeout),
        })
    }

    /// Condition that only fires when explicitly terminated.
    pub fn unlimited() -> Arc<Self> {
        Arc::new(Self {
            terminated: AtomicBool::new(false),
            deadline: None,
        })
    }

    /// Trigger the condition. Idempotent, callable from any thread.
    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    pub fn is_satisfied(&self) -> bool {
        if self.terminated.load(Ordering::Acquire) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminate_fires() {
        let ptc = TerminationCondition::unlimited();
        assert!(!ptc.is_satisfied());
        ptc.terminate();
        assert!(ptc.is_satisfied());
        // Idempotent.
        ptc.terminate();
        assert!(ptc.is_satisfied());
    }

    #[test]
    fn test_deadline_fires() {
        let ptc = TerminationCondition::with_timeout(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(10));
        assert!(ptc.is_satisfied());
    }

    #[test]
    fn test_terminate_from_other_thread() {
        let ptc = TerminationCondition::unlimited();
        let clone = Arc::clone(&ptc);
        let handle = std::thread::spawn(move || clone.terminate());
        handle.join().unwrap();
        assert!(ptc.is_satisfied());
    }
}
