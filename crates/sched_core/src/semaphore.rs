use alloc::collections::BTreeMap;

use sched_hal::Errno;

use crate::waitlist::WaitList;

/// Semaphore identifier chosen by the driver.
pub type SemaphoreId = u32;

/// Counting semaphore state.
///
/// A negative `value` counts the processes parked in `waiters`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Semaphore {
    value: i32,
    waiters: WaitList,
}

/// Outcome of a P operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Proceed,
    Block,
}

impl Semaphore {
    /// Creates a semaphore with the given count.
    pub fn new(initial_value: i32) -> Self {
        Self {
            value: initial_value,
            waiters: WaitList::new(),
        }
    }

    /// Returns the current count.
    pub fn value(&self) -> i32 {
        self.value
    }

    /// Returns the blocked processes.
    pub fn waiters(&self) -> &WaitList {
        &self.waiters
    }

    pub(crate) fn waiters_mut(&mut self) -> &mut WaitList {
        &mut self.waiters
    }

    /// Decrements the count and reports whether the caller must block.
    pub(crate) fn p(&mut self) -> Acquire {
        self.value -= 1;
        if self.value < 0 {
            Acquire::Block
        } else {
            Acquire::Proceed
        }
    }

    /// Increments the count and reports whether a waiter must be released.
    pub(crate) fn v(&mut self) -> bool {
        self.value += 1;
        self.value <= 0
    }
}

/// Table mapping driver ids to semaphores.
#[derive(Debug, Default)]
pub struct SemaphoreTable {
    entries: BTreeMap<SemaphoreId, Semaphore>,
}

impl SemaphoreTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Creates a semaphore under `id`.
    pub fn init(&mut self, id: SemaphoreId, initial_value: i32) -> Result<(), Errno> {
        if self.entries.contains_key(&id) {
            return Err(Errno::AlreadyInitialized);
        }
        self.entries.insert(id, Semaphore::new(initial_value));
        Ok(())
    }

    /// Returns a semaphore by id.
    pub fn get(&self, id: SemaphoreId) -> Result<&Semaphore, Errno> {
        self.entries.get(&id).ok_or(Errno::UnknownSemaphore)
    }

    /// Returns a mutable semaphore by id.
    pub fn get_mut(&mut self, id: SemaphoreId) -> Result<&mut Semaphore, Errno> {
        self.entries.get_mut(&id).ok_or(Errno::UnknownSemaphore)
    }

    /// Iterates semaphores in id order.
    pub fn iter(&self) -> impl Iterator<Item = (SemaphoreId, &Semaphore)> {
        self.entries.iter().map(|(id, sem)| (*id, sem))
    }

    /// Returns the number of semaphores.
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}
