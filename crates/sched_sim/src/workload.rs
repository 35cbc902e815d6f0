use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use sched_core::Policy;
use sched_hal::{Priority, ProcessClass, DEFAULT_PRIORITY};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// Errors raised while loading a workload description.
#[derive(Debug)]
pub enum WorkloadError {
    Io(io::Error),
    Json(serde_json::Error),
    /// Two behavior events of one process share a CPU time.
    DuplicateEventTime { process: usize, time: u64 },
    /// A behavior event is scheduled at or after the process finishes.
    EventAfterExit { process: usize, time: u64 },
    UnknownSemaphore { process: usize, id: u32 },
    UnknownMutex { process: usize, id: u32 },
    DuplicateSemaphore(u32),
    DuplicateMutex(u32),
}

impl fmt::Display for WorkloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadError::Io(err) => write!(f, "failed to read workload: {err}"),
            WorkloadError::Json(err) => write!(f, "malformed workload: {err}"),
            WorkloadError::DuplicateEventTime { process, time } => {
                write!(f, "process #{process} has two events at cpu time {time}")
            }
            WorkloadError::EventAfterExit { process, time } => write!(
                f,
                "process #{process} has an event at cpu time {time}, after it exits"
            ),
            WorkloadError::UnknownSemaphore { process, id } => {
                write!(f, "process #{process} uses undeclared semaphore {id}")
            }
            WorkloadError::UnknownMutex { process, id } => {
                write!(f, "process #{process} uses undeclared mutex {id}")
            }
            WorkloadError::DuplicateSemaphore(id) => write!(f, "semaphore {id} declared twice"),
            WorkloadError::DuplicateMutex(id) => write!(f, "mutex {id} declared twice"),
        }
    }
}

impl std::error::Error for WorkloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkloadError::Io(err) => Some(err),
            WorkloadError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkloadError {
    fn from(err: io::Error) -> Self {
        WorkloadError::Io(err)
    }
}

impl From<serde_json::Error> for WorkloadError {
    fn from(err: serde_json::Error) -> Self {
        WorkloadError::Json(err)
    }
}

/// A complete simulation run: the discipline, the processes and the
/// synchronization primitives they share.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Workload {
    #[serde(deserialize_with = "policy_from_name")]
    pub scheduling_algorithm: Policy,
    pub processes: Vec<ProcessSpec>,
    #[serde(default)]
    pub semaphores: Vec<SemaphoreSpec>,
    #[serde(default)]
    pub mutexes: Vec<u32>,
}

/// One process as described by the workload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessSpec {
    pub arrival: u64,
    pub total_cpu_time: u64,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default, rename = "priority_change")]
    pub priority_changes: Vec<PriorityChange>,
    #[serde(default, rename = "type", deserialize_with = "class_from_name")]
    pub class: ProcessClass,
    #[serde(default)]
    pub events: Vec<SyncEvent>,
}

/// Priority change requested after `arrival` units of the process's CPU time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PriorityChange {
    pub arrival: u64,
    pub new_priority: Priority,
}

/// Synchronization call kinds, named in snake case in the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOp {
    SemaphoreP,
    SemaphoreV,
    MutexLock,
    MutexUnlock,
}

/// Synchronization call issued after `arrival` units of CPU time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SyncEvent {
    pub arrival: u64,
    pub op: SyncOp,
    pub id: u32,
}

/// Semaphore declared by the workload and initialized before time 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SemaphoreSpec {
    pub id: u32,
    pub initial_value: i32,
}

/// Something a running process does on its own timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    SetPriority(Priority),
    Sync(SyncOp, u32),
}

fn default_priority() -> Priority {
    DEFAULT_PRIORITY
}

fn policy_from_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Policy, D::Error> {
    let name = String::deserialize(deserializer)?;
    name.parse()
        .map_err(|_| D::Error::custom(format!("unknown scheduling algorithm {name:?}")))
}

fn class_from_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ProcessClass, D::Error> {
    let name = String::deserialize(deserializer)?;
    name.parse()
        .map_err(|_| D::Error::custom(format!("unknown process type {name:?}")))
}

impl ProcessSpec {
    /// Merges priority changes and sync calls into one time-ordered list.
    pub fn timeline(&self) -> Vec<(u64, Behavior)> {
        let mut timeline: Vec<(u64, Behavior)> = self
            .priority_changes
            .iter()
            .map(|change| (change.arrival, Behavior::SetPriority(change.new_priority)))
            .chain(
                self.events
                    .iter()
                    .map(|event| (event.arrival, Behavior::Sync(event.op, event.id))),
            )
            .collect();
        timeline.sort_by_key(|(time, _)| *time);
        timeline
    }
}

impl Workload {
    /// Parses and validates a JSON workload.
    pub fn from_json(text: &str) -> Result<Self, WorkloadError> {
        let workload: Workload = serde_json::from_str(text)?;
        workload.validate()?;
        Ok(workload)
    }

    /// Reads a JSON workload from disk.
    pub fn load(path: &Path) -> Result<Self, WorkloadError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks that every process timeline can be replayed unambiguously.
    pub fn validate(&self) -> Result<(), WorkloadError> {
        let mut semaphores = BTreeSet::new();
        for sem in &self.semaphores {
            if !semaphores.insert(sem.id) {
                return Err(WorkloadError::DuplicateSemaphore(sem.id));
            }
        }
        let mut mutexes = BTreeSet::new();
        for id in &self.mutexes {
            if !mutexes.insert(*id) {
                return Err(WorkloadError::DuplicateMutex(*id));
            }
        }

        for (process, spec) in self.processes.iter().enumerate() {
            let mut times = BTreeSet::new();
            for (time, behavior) in spec.timeline() {
                if !times.insert(time) {
                    return Err(WorkloadError::DuplicateEventTime { process, time });
                }
                if time >= spec.total_cpu_time {
                    return Err(WorkloadError::EventAfterExit { process, time });
                }
                match behavior {
                    Behavior::Sync(SyncOp::SemaphoreP | SyncOp::SemaphoreV, id)
                        if !semaphores.contains(&id) =>
                    {
                        return Err(WorkloadError::UnknownSemaphore { process, id });
                    }
                    Behavior::Sync(SyncOp::MutexLock | SyncOp::MutexUnlock, id)
                        if !mutexes.contains(&id) =>
                    {
                        return Err(WorkloadError::UnknownMutex { process, id });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}
