use core::fmt;
use core::str::FromStr;

use sched_hal::Errno;

/// Scheduling discipline, fixed for the lifetime of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Fcfs,
    RoundRobin,
    Priority,
    Multilevel,
}

impl Policy {
    /// Returns the workload name of the discipline.
    pub const fn as_str(self) -> &'static str {
        match self {
            Policy::Fcfs => "FCFS",
            Policy::RoundRobin => "RR",
            Policy::Priority => "Priority",
            Policy::Multilevel => "Multilevel",
        }
    }

    /// Returns the order in which blocked processes are released.
    pub const fn wake_order(self) -> WakeOrder {
        match self {
            Policy::Priority => WakeOrder::Ranked,
            _ => WakeOrder::Fifo,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = Errno;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FCFS" => Ok(Policy::Fcfs),
            "RR" => Ok(Policy::RoundRobin),
            "Priority" => Ok(Policy::Priority),
            "Multilevel" => Ok(Policy::Multilevel),
            _ => Err(Errno::InvalidArg),
        }
    }
}

/// Selection rule for wait lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOrder {
    /// Oldest waiter first.
    Fifo,
    /// Smallest `(priority, pid)` first.
    Ranked,
}
