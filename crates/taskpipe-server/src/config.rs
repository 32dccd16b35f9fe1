use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CAPACITY: usize = 1;
pub const DEFAULT_PRODUCERS: usize = 2;
pub const DEFAULT_CONSUMERS: usize = 4;
pub const DEFAULT_WORKLOAD_UNIT: Duration = Duration::from_millis(1000);

/// Validated startup parameters for one server session.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Wall-clock budget for the whole session
    pub budget: Duration,

    /// Capacity of the task queue (backpressure bound, not a batch size)
    pub capacity: usize,

    /// Filesystem path of the public request channel
    pub channel_path: PathBuf,

    /// Intake pool size
    pub producers: usize,

    /// Execution pool size
    pub consumers: usize,

    /// Simulated execution cost of one workload unit
    pub workload_unit: Duration,
}

impl ServerConfig {
    pub fn new(budget: Duration, channel_path: PathBuf) -> Self {
        ServerConfig {
            budget,
            capacity: DEFAULT_CAPACITY,
            channel_path,
            producers: DEFAULT_PRODUCERS,
            consumers: DEFAULT_CONSUMERS,
            workload_unit: DEFAULT_WORKLOAD_UNIT,
        }
    }
}
