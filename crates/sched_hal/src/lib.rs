#![cfg_attr(not(test), no_std)]

use core::fmt;
use core::str::FromStr;

/// Process identifier assigned by the simulation driver.
pub type Pid = u32;

/// Scheduling priority. Lower values take precedence.
pub type Priority = i32;

/// Identifier reserved for the idle pseudo-process.
pub const IDLE_PID: Pid = 0;

/// Simulated time units between two timer interrupts.
pub const TIMER_INTERRUPT_INTERVAL: u64 = 10;

/// Timer ticks a process may hold the CPU under round-robin.
pub const RR_QUANTUM_TICKS: u32 = 4;

/// Timer ticks a feedback level may run before yielding to the other level.
pub const LEVEL_SWITCH_TICKS: u32 = 20;

/// Priority given to processes that do not declare one.
pub const DEFAULT_PRIORITY: Priority = 32;

/// Common error codes used by kernel interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    InvalidArg,
    NoRunningProcess,
    InvalidPid,
    DuplicatePid,
    UnknownSemaphore,
    UnknownMutex,
    AlreadyInitialized,
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Errno::InvalidArg => "invalid argument",
            Errno::NoRunningProcess => "no process is running",
            Errno::InvalidPid => "invalid process id",
            Errno::DuplicatePid => "process id already in use",
            Errno::UnknownSemaphore => "semaphore was never initialized",
            Errno::UnknownMutex => "mutex was never initialized",
            Errno::AlreadyInitialized => "primitive already initialized",
        };
        f.write_str(text)
    }
}

impl core::error::Error for Errno {}

/// Scheduling class used by the multilevel feedback discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ProcessClass {
    #[default]
    Foreground,
    Background,
}

impl ProcessClass {
    /// Returns the workload name of the class.
    pub const fn as_str(self) -> &'static str {
        match self {
            ProcessClass::Foreground => "Foreground",
            ProcessClass::Background => "Background",
        }
    }

    /// Returns the other class.
    pub const fn opposite(self) -> Self {
        match self {
            ProcessClass::Foreground => ProcessClass::Background,
            ProcessClass::Background => ProcessClass::Foreground,
        }
    }
}

impl fmt::Display for ProcessClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessClass {
    type Err = Errno;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Foreground" => Ok(ProcessClass::Foreground),
            "Background" => Ok(ProcessClass::Background),
            _ => Err(Errno::InvalidArg),
        }
    }
}

/// Events a simulated kernel answers on behalf of the driver.
///
/// Every method that can change CPU ownership returns the pid that must run
/// next, or [`IDLE_PID`] when nothing is runnable. Methods acting on "the
/// running process" are only valid while a real process holds the CPU.
pub trait KernelOps {
    /// Admits a newly arrived process.
    fn new_process_arrived(
        &mut self,
        pid: Pid,
        priority: Priority,
        class: ProcessClass,
    ) -> Result<Pid, Errno>;

    /// Retires the running process.
    fn syscall_exit(&mut self) -> Result<Pid, Errno>;

    /// Changes the priority of the running process.
    fn syscall_set_priority(&mut self, priority: Priority) -> Result<Pid, Errno>;

    /// Handles the periodic timer interrupt.
    fn timer_interrupt(&mut self) -> Result<Pid, Errno>;

    /// Creates a counting semaphore.
    fn syscall_init_semaphore(&mut self, id: u32, initial_value: i32) -> Result<(), Errno>;

    /// Performs P (wait) on a semaphore for the running process.
    fn syscall_semaphore_p(&mut self, id: u32) -> Result<Pid, Errno>;

    /// Performs V (signal) on a semaphore for the running process.
    fn syscall_semaphore_v(&mut self, id: u32) -> Result<Pid, Errno>;

    /// Creates an unlocked mutex.
    fn syscall_init_mutex(&mut self, id: u32) -> Result<(), Errno>;

    /// Locks a mutex for the running process.
    fn syscall_mutex_lock(&mut self, id: u32) -> Result<Pid, Errno>;

    /// Unlocks a mutex held by the running process.
    fn syscall_mutex_unlock(&mut self, id: u32) -> Result<Pid, Errno>;

    /// Returns the pid currently holding the CPU.
    fn running(&self) -> Pid;
}
