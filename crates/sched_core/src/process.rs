use alloc::collections::BTreeMap;

use sched_hal::{Errno, Pid, Priority, ProcessClass, IDLE_PID};

/// Process execution states in the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Ready,
    Running,
    Blocked,
}

/// Process control block for one schedulable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcb {
    pub pid: Pid,
    pub priority: Priority,
    pub class: ProcessClass,
    pub state: ProcState,
}

impl Pcb {
    /// Creates a control block in the ready state.
    pub fn new(pid: Pid, priority: Priority, class: ProcessClass) -> Self {
        Self {
            pid,
            priority,
            class,
            state: ProcState::Ready,
        }
    }

    /// Ordering key for the priority discipline. Smaller ranks run first.
    pub fn rank(&self) -> (Priority, Pid) {
        (self.priority, self.pid)
    }
}

/// Arena owning every live control block, keyed by pid.
///
/// Ready queues and wait lists only hold pids; the record itself lives here
/// until the process exits.
#[derive(Debug, Default)]
pub struct ProcessTable {
    entries: BTreeMap<Pid, Pcb>,
}

impl ProcessTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registers a new process.
    pub fn insert(&mut self, pcb: Pcb) -> Result<(), Errno> {
        if pcb.pid == IDLE_PID {
            return Err(Errno::InvalidPid);
        }
        if self.entries.contains_key(&pcb.pid) {
            return Err(Errno::DuplicatePid);
        }
        self.entries.insert(pcb.pid, pcb);
        Ok(())
    }

    /// Returns a control block by pid.
    pub fn get(&self, pid: Pid) -> Result<&Pcb, Errno> {
        self.entries.get(&pid).ok_or(Errno::InvalidPid)
    }

    /// Returns a mutable control block by pid.
    pub fn get_mut(&mut self, pid: Pid) -> Result<&mut Pcb, Errno> {
        self.entries.get_mut(&pid).ok_or(Errno::InvalidPid)
    }

    /// Forgets a process.
    pub fn remove(&mut self, pid: Pid) -> Result<Pcb, Errno> {
        self.entries.remove(&pid).ok_or(Errno::InvalidPid)
    }

    /// Updates the state tag of a process.
    pub fn set_state(&mut self, pid: Pid, state: ProcState) -> Result<(), Errno> {
        self.get_mut(pid)?.state = state;
        Ok(())
    }

    /// Returns the priority-discipline rank of a process.
    pub fn rank(&self, pid: Pid) -> Result<(Priority, Pid), Errno> {
        self.get(pid).map(Pcb::rank)
    }

    /// Returns the number of live processes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no process is alive.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates live processes in pid order.
    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcb_starts_ready() {
        let pcb = Pcb::new(3, 7, ProcessClass::Background);
        assert_eq!(pcb.pid, 3);
        assert_eq!(pcb.state, ProcState::Ready);
        assert_eq!(pcb.rank(), (7, 3));
    }

    #[test]
    fn table_rejects_idle_and_duplicate_pids() {
        let mut table = ProcessTable::new();
        assert_eq!(
            table.insert(Pcb::new(IDLE_PID, 0, ProcessClass::Foreground)),
            Err(Errno::InvalidPid)
        );
        table
            .insert(Pcb::new(1, 0, ProcessClass::Foreground))
            .expect("insert should succeed");
        assert_eq!(
            table.insert(Pcb::new(1, 5, ProcessClass::Foreground)),
            Err(Errno::DuplicatePid)
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn table_remove_forgets_process() {
        let mut table = ProcessTable::new();
        table
            .insert(Pcb::new(4, 1, ProcessClass::Foreground))
            .expect("insert should succeed");
        table
            .set_state(4, ProcState::Running)
            .expect("state update should succeed");
        let removed = table.remove(4).expect("remove should succeed");
        assert_eq!(removed.state, ProcState::Running);
        assert!(table.is_empty());
        assert_eq!(table.get(4), Err(Errno::InvalidPid));
        assert_eq!(table.remove(4), Err(Errno::InvalidPid));
    }
}
