use alloc::vec::Vec;

use log::{debug, trace};
use sched_hal::{
    Errno, KernelOps, Pid, Priority, ProcessClass, IDLE_PID, LEVEL_SWITCH_TICKS,
    RR_QUANTUM_TICKS,
};

use crate::mutex::{Mutex, MutexId, MutexTable};
use crate::policy::Policy;
use crate::process::{Pcb, ProcState, ProcessTable};
use crate::ready::ReadyQueue;
use crate::semaphore::{Acquire, Semaphore, SemaphoreId, SemaphoreTable};
use crate::waitlist::WaitList;

/// Point-in-time view of where every live process sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub running: Pid,
    pub ready: Vec<Pid>,
    pub blocked: Vec<Pid>,
}

/// Single-CPU scheduling engine.
///
/// Each event handler runs to completion and returns the pid that must hold
/// the CPU afterwards; [`IDLE_PID`] means the CPU is idle.
#[derive(Debug)]
pub struct Scheduler {
    policy: Policy,
    table: ProcessTable,
    running: Pid,
    ready: ReadyQueue,
    semaphores: SemaphoreTable,
    mutexes: MutexTable,
    quantum_ticks: u32,
    level_ticks: u32,
}

impl Scheduler {
    /// Creates an idle scheduler for a discipline.
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            table: ProcessTable::new(),
            running: IDLE_PID,
            ready: ReadyQueue::for_policy(policy),
            semaphores: SemaphoreTable::new(),
            mutexes: MutexTable::new(),
            quantum_ticks: 0,
            level_ticks: 0,
        }
    }

    /// Returns the active discipline.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Returns the active feedback level, if the discipline has levels.
    pub fn level(&self) -> Option<ProcessClass> {
        self.ready.feedback().map(|queues| queues.level())
    }

    /// Returns a process control block.
    pub fn process(&self, pid: Pid) -> Result<&Pcb, Errno> {
        self.table.get(pid)
    }

    /// Iterates live processes in pid order.
    pub fn processes(&self) -> impl Iterator<Item = &Pcb> {
        self.table.iter()
    }

    /// Returns a semaphore's state.
    pub fn semaphore(&self, id: SemaphoreId) -> Result<&Semaphore, Errno> {
        self.semaphores.get(id)
    }

    /// Returns a mutex's state.
    pub fn mutex(&self, id: MutexId) -> Result<&Mutex, Errno> {
        self.mutexes.get(id)
    }

    /// Timer ticks consumed by the running process in its current quantum.
    pub fn quantum_ticks(&self) -> u32 {
        self.quantum_ticks
    }

    /// Timer ticks spent on the active feedback level.
    pub fn level_ticks(&self) -> u32 {
        self.level_ticks
    }

    /// Captures the running, ready and blocked pids.
    pub fn snapshot(&self) -> Snapshot {
        let mut blocked: Vec<Pid> = self
            .semaphores
            .iter()
            .flat_map(|(_, sem)| sem.waiters().iter())
            .chain(self.mutexes.iter().flat_map(|(_, mutex)| mutex.waiters().iter()))
            .collect();
        blocked.sort_unstable();
        Snapshot {
            running: self.running,
            ready: self.ready.pids(),
            blocked,
        }
    }

    fn running_pid(&self) -> Result<Pid, Errno> {
        if self.running == IDLE_PID {
            return Err(Errno::NoRunningProcess);
        }
        Ok(self.running)
    }

    /// Installs the next ready process on an idle CPU.
    fn dispatch(&mut self) -> Result<Pid, Errno> {
        debug_assert_eq!(self.running, IDLE_PID);
        let Some(selected) = self.ready.select() else {
            debug!("cpu idle");
            return Ok(IDLE_PID);
        };
        self.quantum_ticks = 0;
        if selected.level_switched {
            self.level_ticks = 0;
            debug!("feedback level switched to {:?}", self.level());
        }
        self.table.set_state(selected.pid, ProcState::Running)?;
        self.running = selected.pid;
        debug!("dispatch pid {}", selected.pid);
        Ok(self.running)
    }

    /// Moves the running process back to its ready queue.
    fn preempt_running(&mut self, front: bool) -> Result<(), Errno> {
        let pid = self.running_pid()?;
        let pcb = self.table.get_mut(pid)?;
        pcb.state = ProcState::Ready;
        if front {
            self.ready.enqueue_front(pcb);
        } else {
            self.ready.enqueue(pcb);
        }
        self.running = IDLE_PID;
        debug!("preempt pid {}", pid);
        Ok(())
    }

    /// Parks the running process on a wait list and picks a successor.
    fn block_running(&mut self, pid: Pid, waiters: WaitListRef) -> Result<Pid, Errno> {
        self.table.set_state(pid, ProcState::Blocked)?;
        match waiters {
            WaitListRef::Semaphore(id) => self.semaphores.get_mut(id)?.waiters_mut().push(pid),
            WaitListRef::Mutex(id) => self.mutexes.get_mut(id)?.waiters_mut().push(pid),
        }
        self.running = IDLE_PID;
        debug!("block pid {} on {:?}", pid, waiters);
        self.dispatch()
    }

    /// Releases one waiter according to the discipline's wake order.
    fn take_waiter(&mut self, waiters: WaitListRef) -> Result<Option<Pid>, Errno> {
        let order = self.policy.wake_order();
        let table = &self.table;
        let rank = |pid: Pid| table.rank(pid).unwrap_or((Priority::MAX, pid));
        let list: &mut WaitList = match waiters {
            WaitListRef::Semaphore(id) => self.semaphores.get_mut(id)?.waiters_mut(),
            WaitListRef::Mutex(id) => self.mutexes.get_mut(id)?.waiters_mut(),
        };
        Ok(list.take(order, rank))
    }

    /// Files a woken process into the ready container.
    ///
    /// FCFS resumes it at the head of the line; every other discipline
    /// queues it like a fresh arrival.
    fn admit_woken(&mut self, pid: Pid) -> Result<(), Errno> {
        let pcb = self.table.get_mut(pid)?;
        pcb.state = ProcState::Ready;
        match self.policy {
            Policy::Fcfs => self.ready.enqueue_front(pcb),
            _ => self.ready.enqueue(pcb),
        }
        debug!("wake pid {}", pid);
        Ok(())
    }

    /// Fills an idle CPU or lets a better-ranked process preempt.
    fn reschedule_after_admission(&mut self) -> Result<Pid, Errno> {
        if self.running == IDLE_PID {
            return self.dispatch();
        }
        if self.policy == Policy::Priority {
            self.preempt_if_outranked()?;
        }
        Ok(self.running)
    }

    fn preempt_if_outranked(&mut self) -> Result<(), Errno> {
        let current = self.table.rank(self.running_pid()?)?;
        match self.ready.peek_rank() {
            Some(best) if best < current => {
                self.preempt_running(false)?;
                self.dispatch()?;
            }
            _ => {}
        }
        Ok(())
    }

    fn switch_level(&mut self, level: ProcessClass) {
        if let Some(queues) = self.ready.feedback_mut() {
            queues.set_level(level);
        }
        self.level_ticks = 0;
        self.quantum_ticks = 0;
        debug!("feedback level switched to {:?}", level);
    }

    fn round_robin_tick(&mut self) -> Result<(), Errno> {
        self.quantum_ticks += 1;
        trace!("quantum tick {} for pid {}", self.quantum_ticks, self.running);
        if self.quantum_ticks >= RR_QUANTUM_TICKS {
            self.preempt_running(false)?;
            self.dispatch()?;
        }
        Ok(())
    }

    // Level switching wins over an expiring quantum in the same tick.
    fn feedback_tick(&mut self) -> Result<(), Errno> {
        // Never reset while the other level has no work.
        self.level_ticks = self.level_ticks.saturating_add(1);
        let level = self.level().unwrap_or_default();
        trace!("level tick {} on {:?}", self.level_ticks, level);
        let other = level.opposite();
        let switch_due = self.level_ticks >= LEVEL_SWITCH_TICKS && self.ready.has_work(other);
        match level {
            ProcessClass::Foreground if switch_due => {
                self.preempt_running(false)?;
                self.switch_level(other);
                self.dispatch()?;
            }
            ProcessClass::Foreground => self.round_robin_tick()?,
            ProcessClass::Background if switch_due => {
                self.preempt_running(true)?;
                self.switch_level(other);
                self.dispatch()?;
            }
            ProcessClass::Background => {}
        }
        Ok(())
    }

    /// Unlocks every mutex an exiting process still holds.
    fn release_mutexes(&mut self, pid: Pid) -> Result<(), Errno> {
        for id in self.mutexes.held_by(pid) {
            let next = self.take_waiter(WaitListRef::Mutex(id))?;
            self.mutexes.get_mut(id)?.hand_off(next);
            debug!("mutex {} released by exiting pid {}", id, pid);
            if let Some(next) = next {
                self.admit_woken(next)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum WaitListRef {
    Semaphore(SemaphoreId),
    Mutex(MutexId),
}

impl KernelOps for Scheduler {
    fn new_process_arrived(
        &mut self,
        pid: Pid,
        priority: Priority,
        class: ProcessClass,
    ) -> Result<Pid, Errno> {
        self.table.insert(Pcb::new(pid, priority, class))?;
        self.ready.enqueue(self.table.get(pid)?);
        debug!("arrival pid {} priority {} {}", pid, priority, class);
        self.reschedule_after_admission()
    }

    fn syscall_exit(&mut self) -> Result<Pid, Errno> {
        let pid = self.running_pid()?;
        self.table.remove(pid)?;
        self.running = IDLE_PID;
        debug!("exit pid {}", pid);
        self.release_mutexes(pid)?;
        self.dispatch()
    }

    fn syscall_set_priority(&mut self, priority: Priority) -> Result<Pid, Errno> {
        let pid = self.running_pid()?;
        self.table.get_mut(pid)?.priority = priority;
        debug!("pid {} priority set to {}", pid, priority);
        if self.policy == Policy::Priority {
            self.preempt_if_outranked()?;
        }
        Ok(self.running)
    }

    fn timer_interrupt(&mut self) -> Result<Pid, Errno> {
        if self.running == IDLE_PID {
            return Ok(IDLE_PID);
        }
        match self.policy {
            Policy::Fcfs | Policy::Priority => {}
            Policy::RoundRobin => self.round_robin_tick()?,
            Policy::Multilevel => self.feedback_tick()?,
        }
        Ok(self.running)
    }

    fn syscall_init_semaphore(&mut self, id: u32, initial_value: i32) -> Result<(), Errno> {
        self.semaphores.init(id, initial_value)?;
        debug!("semaphore {} initialized to {}", id, initial_value);
        Ok(())
    }

    fn syscall_semaphore_p(&mut self, id: u32) -> Result<Pid, Errno> {
        let pid = self.running_pid()?;
        let sem = self.semaphores.get_mut(id)?;
        match sem.p() {
            Acquire::Proceed => Ok(pid),
            Acquire::Block => self.block_running(pid, WaitListRef::Semaphore(id)),
        }
    }

    fn syscall_semaphore_v(&mut self, id: u32) -> Result<Pid, Errno> {
        self.running_pid()?;
        if !self.semaphores.get_mut(id)?.v() {
            return Ok(self.running);
        }
        let Some(woken) = self.take_waiter(WaitListRef::Semaphore(id))? else {
            return Ok(self.running);
        };
        self.admit_woken(woken)?;
        self.reschedule_after_admission()
    }

    fn syscall_init_mutex(&mut self, id: u32) -> Result<(), Errno> {
        self.mutexes.init(id)?;
        debug!("mutex {} initialized", id);
        Ok(())
    }

    fn syscall_mutex_lock(&mut self, id: u32) -> Result<Pid, Errno> {
        let pid = self.running_pid()?;
        if self.mutexes.get_mut(id)?.try_acquire(pid) {
            debug!("mutex {} acquired by pid {}", id, pid);
            return Ok(pid);
        }
        self.block_running(pid, WaitListRef::Mutex(id))
    }

    fn syscall_mutex_unlock(&mut self, id: u32) -> Result<Pid, Errno> {
        self.running_pid()?;
        let next = self.take_waiter(WaitListRef::Mutex(id))?;
        self.mutexes.get_mut(id)?.hand_off(next);
        let Some(next) = next else {
            debug!("mutex {} unlocked", id);
            return Ok(self.running);
        };
        debug!("mutex {} handed to pid {}", id, next);
        self.admit_woken(next)?;
        self.reschedule_after_admission()
    }

    fn running(&self) -> Pid {
        self.running
    }
}
