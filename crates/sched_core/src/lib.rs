#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod mutex;
pub mod policy;
pub mod process;
pub mod ready;
pub mod scheduler;
pub mod semaphore;
pub mod waitlist;

pub use mutex::{Mutex, MutexId, MutexTable};
pub use policy::{Policy, WakeOrder};
pub use process::{Pcb, ProcState, ProcessTable};
pub use ready::{FeedbackQueues, ReadyQueue, Selected};
pub use sched_hal::{
    Errno, KernelOps, Pid, Priority, ProcessClass, DEFAULT_PRIORITY, IDLE_PID,
    LEVEL_SWITCH_TICKS, RR_QUANTUM_TICKS, TIMER_INTERRUPT_INTERVAL,
};
pub use scheduler::{Scheduler, Snapshot};
pub use semaphore::{Semaphore, SemaphoreId, SemaphoreTable};
pub use waitlist::WaitList;
