use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use taskpipe_core::{TaskStatus, WorkerId};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Assign a fresh id to a pool worker.
pub(crate) fn next_worker_id() -> WorkerId {
    NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Lifecycle of one server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Intake open, pools active, deadline not yet reached
    Running,
    /// Deadline passed: intake closed, queued work drained as too-late
    Draining,
    /// All pool workers have exited; public channel released. Terminal.
    Stopped,
}

/// Per-session task counters, reported once at shutdown.
#[derive(Debug, Default)]
pub struct SessionStats {
    admitted: AtomicU64,
    completed: AtomicU64,
    too_late: AtomicU64,
    failed: AtomicU64,
}

impl SessionStats {
    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_terminal(&self, status: TaskStatus) {
        match status {
            TaskStatus::Done => self.completed.fetch_add(1, Ordering::Relaxed),
            TaskStatus::TooLate => self.too_late.fetch_add(1, Ordering::Relaxed),
            TaskStatus::Failed => self.failed.fetch_add(1, Ordering::Relaxed),
            TaskStatus::Queued | TaskStatus::Executing => return,
        };
    }

    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn too_late(&self) -> u64 {
        self.too_late.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn log_summary(&self) {
        info!(
            admitted = self.admitted(),
            completed = self.completed(),
            too_late = self.too_late(),
            failed = self.failed(),
            "session summary"
        );
    }
}

/// Process-wide session state: the deadline, the broadcast shutdown
/// token, and the lifecycle state machine. Every pool worker holds a
/// reference; there is no free-standing global state besides this.
pub struct Session {
    deadline: Instant,
    shutdown: CancellationToken,
    state: Mutex<LifecycleState>,
    stats: SessionStats,
}

impl Session {
    pub fn new(budget: Duration) -> Self {
        Session {
            deadline: Instant::now() + budget,
            shutdown: CancellationToken::new(),
            state: Mutex::new(LifecycleState::Running),
            stats: SessionStats::default(),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Clone of the broadcast shutdown token. Cancellation wakes every
    /// blocked queue or channel operation.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// `Running -> Draining`. Returns false (and does nothing) if the
    /// session already left `Running`, so a repeated deadline event is a
    /// no-op.
    pub fn begin_drain(&self) -> bool {
        let mut state = self.state.lock();
        if *state != LifecycleState::Running {
            return false;
        }
        *state = LifecycleState::Draining;
        self.shutdown.cancel();
        true
    }

    /// `-> Stopped`, once all pool workers have exited. Returns true only
    /// on the first call; the public channel is released exactly once.
    pub fn mark_stopped(&self) -> bool {
        let mut state = self.state.lock();
        if *state == LifecycleState::Stopped {
            return false;
        }
        *state = LifecycleState::Stopped;
        true
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_is_idempotent() {
        let session = Session::new(Duration::from_secs(10));
        assert_eq!(session.state(), LifecycleState::Running);
        assert!(!session.is_shutting_down());

        assert!(session.begin_drain());
        assert_eq!(session.state(), LifecycleState::Draining);
        assert!(session.is_shutting_down());

        // A second deadline event changes nothing
        assert!(!session.begin_drain());
        assert_eq!(session.state(), LifecycleState::Draining);
    }

    #[test]
    fn test_stop_happens_once() {
        let session = Session::new(Duration::from_secs(10));
        session.begin_drain();

        assert!(session.mark_stopped());
        assert!(!session.mark_stopped());
        assert_eq!(session.state(), LifecycleState::Stopped);

        // Stopped is terminal
        assert!(!session.begin_drain());
        assert_eq!(session.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_stats_count_terminal_statuses() {
        let stats = SessionStats::default();
        stats.record_admitted();
        stats.record_admitted();
        stats.record_terminal(TaskStatus::Done);
        stats.record_terminal(TaskStatus::TooLate);
        stats.record_terminal(TaskStatus::Failed);
        stats.record_terminal(TaskStatus::Executing);

        assert_eq!(stats.admitted(), 2);
        assert_eq!(stats.completed(), 1);
        assert_eq!(stats.too_late(), 1);
        assert_eq!(stats.failed(), 1);
    }
}
