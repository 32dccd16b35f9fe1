mod task;

pub use task::{ClientId, RequestId, Task, TaskStatus, WorkerId};

/// `result` value carried on the wire before execution has populated it.
pub const RESULT_UNSET: i32 = -1;
