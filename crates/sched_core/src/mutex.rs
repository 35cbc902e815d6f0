use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use sched_hal::{Errno, Pid};

use crate::waitlist::WaitList;

/// Mutex identifier chosen by the driver.
pub type MutexId = u32;

/// Sleeping mutex state. The mutex is locked exactly when it has an owner.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Mutex {
    owner: Option<Pid>,
    waiters: WaitList,
}

impl Mutex {
    /// Creates an unlocked mutex.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while some process owns the mutex.
    pub fn is_locked(&self) -> bool {
        self.owner.is_some()
    }

    /// Returns the owning pid, if any.
    pub fn owner(&self) -> Option<Pid> {
        self.owner
    }

    /// Returns the blocked processes.
    pub fn waiters(&self) -> &WaitList {
        &self.waiters
    }

    pub(crate) fn waiters_mut(&mut self) -> &mut WaitList {
        &mut self.waiters
    }

    /// Claims the mutex for `pid` if it is free.
    pub(crate) fn try_acquire(&mut self, pid: Pid) -> bool {
        if self.owner.is_some() {
            return false;
        }
        self.owner = Some(pid);
        true
    }

    /// Hands the mutex to `next`, or unlocks it when `next` is `None`.
    pub(crate) fn hand_off(&mut self, next: Option<Pid>) {
        self.owner = next;
    }
}

/// Table mapping driver ids to mutexes.
#[derive(Debug, Default)]
pub struct MutexTable {
    entries: BTreeMap<MutexId, Mutex>,
}

impl MutexTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Creates an unlocked mutex under `id`.
    pub fn init(&mut self, id: MutexId) -> Result<(), Errno> {
        if self.entries.contains_key(&id) {
            return Err(Errno::AlreadyInitialized);
        }
        self.entries.insert(id, Mutex::new());
        Ok(())
    }

    /// Returns a mutex by id.
    pub fn get(&self, id: MutexId) -> Result<&Mutex, Errno> {
        self.entries.get(&id).ok_or(Errno::UnknownMutex)
    }

    /// Returns a mutable mutex by id.
    pub fn get_mut(&mut self, id: MutexId) -> Result<&mut Mutex, Errno> {
        self.entries.get_mut(&id).ok_or(Errno::UnknownMutex)
    }

    /// Lists the mutexes currently held by `pid`.
    pub fn held_by(&self, pid: Pid) -> Vec<MutexId> {
        self.entries
            .iter()
            .filter(|(_, mutex)| mutex.owner == Some(pid))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Iterates mutexes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (MutexId, &Mutex)> {
        self.entries.iter().map(|(id, mutex)| (*id, mutex))
    }

    /// Returns the number of mutexes.
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}
