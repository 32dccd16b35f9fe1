use std::fmt;

/// Request identifier, assigned by the submitting client and unique within
/// that client's session.
pub type RequestId = i32;

/// Identifier of a server-side pool worker, assigned from a process-local
/// counter at spawn time.
pub type WorkerId = u64;

/// Identity of the client process/thread behind a submission. Names the
/// private response channel the client listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId {
    pub pid: i32,
    pub tid: u64,
}

impl ClientId {
    pub fn new(pid: i32, tid: u64) -> Self {
        ClientId { pid, tid }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.pid, self.tid)
    }
}

/// Task status in the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Admitted to the queue, waiting for a consumer
    Queued,
    /// Claimed by a consumer and currently executing
    Executing,
    /// Executed to completion, result populated
    Done,
    /// Abandoned because the session deadline arrived first
    TooLate,
    /// Could not be executed or reported
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Executing => "executing",
            TaskStatus::Done => "done",
            TaskStatus::TooLate => "too_late",
            TaskStatus::Failed => "failed",
        }
    }

    /// Terminal statuses are reported exactly once per admitted task.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::TooLate | TaskStatus::Failed
        )
    }
}

/// One unit of client-submitted work tracked through
/// `Queued -> Executing -> {Done, TooLate, Failed}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Client-assigned request identifier
    pub request_id: RequestId,

    /// Originating client; also names its private response channel
    pub client: ClientId,

    /// Simulated execution cost in workload units
    pub workload: i32,

    /// Populated only when the task reaches `Done`
    pub result: Option<i32>,

    /// Current lifecycle status
    pub status: TaskStatus,
}

impl Task {
    /// Create a task in `Queued` state, as admitted from a raw request.
    pub fn new(request_id: RequestId, client: ClientId, workload: i32) -> Self {
        Task {
            request_id,
            client,
            workload,
            result: None,
            status: TaskStatus::Queued,
        }
    }

    /// Mark the task as claimed by a consumer.
    pub fn begin(&mut self) {
        self.status = TaskStatus::Executing;
    }

    /// Mark the task as executed to completion.
    pub fn complete(&mut self, result: i32) {
        self.status = TaskStatus::Done;
        self.result = Some(result);
    }

    /// Abandon the task because the deadline arrived first. Any partial
    /// work is discarded, never reported.
    pub fn abandon(&mut self) {
        self.status = TaskStatus::TooLate;
        self.result = None;
    }

    /// Mark the task as failed (e.g. its response channel is unreachable).
    pub fn fail(&mut self) {
        self.status = TaskStatus::Failed;
        self.result = None;
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_lifecycle() {
        let mut task = Task::new(7, ClientId::new(100, 1), 3);
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.result, None);
        assert!(!task.is_terminal());

        task.begin();
        assert_eq!(task.status, TaskStatus::Executing);

        task.complete(6);
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.result, Some(6));
        assert!(task.is_terminal());
    }

    #[test]
    fn test_abandon_discards_result() {
        let mut task = Task::new(1, ClientId::new(100, 1), 5);
        task.begin();
        task.abandon();
        assert_eq!(task.status, TaskStatus::TooLate);
        assert_eq!(task.result, None);
        assert!(task.is_terminal());
    }

    #[test]
    fn test_client_id_display() {
        let client = ClientId::new(4242, 139881);
        assert_eq!(client.to_string(), "4242.139881");
    }
}
