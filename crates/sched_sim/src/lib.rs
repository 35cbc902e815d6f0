//! Time-stepped driver that replays a JSON workload against a scheduler
//! kernel and writes the execution log.

pub mod kernel_log;
pub mod simulator;
pub mod workload;

pub use kernel_log::{Capture, KernelLogger};
pub use simulator::{simulate, RunStats, SimError, Simulator, MAX_IDLE_RUN};
pub use workload::{
    Behavior, PriorityChange, ProcessSpec, SemaphoreSpec, SyncEvent, SyncOp, Workload,
    WorkloadError,
};
