use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::io::{self, Write};

use log::{debug, trace};
use sched_core::Scheduler;
use sched_hal::{
    Errno, KernelOps, Pid, Priority, ProcessClass, IDLE_PID, TIMER_INTERRUPT_INTERVAL,
};

use crate::kernel_log::Capture;
use crate::workload::{Behavior, ProcessSpec, SemaphoreSpec, SyncOp, Workload};

/// Consecutive idle time units after which a run is declared stuck.
pub const MAX_IDLE_RUN: u64 = 1000;

/// Fatal conditions detected while driving the kernel.
#[derive(Debug)]
pub enum SimError {
    /// The kernel rejected an event.
    Kernel { time: u64, source: Errno },
    /// The idle process held the CPU for [`MAX_IDLE_RUN`] units straight.
    IdleTooLong { time: u64 },
    /// The kernel kept an exiting process on the CPU.
    ExitingProcessContinued { time: u64, pid: Pid },
    /// The kernel switched to a pid the driver does not know.
    UnknownPid { time: u64, pid: Pid },
    Io(io::Error),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Kernel { time, source } => {
                write!(f, "kernel rejected event at {time}: {source}")
            }
            SimError::IdleTooLong { time } => write!(
                f,
                "idle process ran for {MAX_IDLE_RUN} units straight (at {time}); the kernel is likely stuck"
            ),
            SimError::ExitingProcessContinued { time, pid } => {
                write!(f, "attempted to continue exiting process {pid} at {time}")
            }
            SimError::UnknownPid { time, pid } => {
                write!(f, "attempted to switch to unknown pid {pid} at {time}")
            }
            SimError::Io(err) => write!(f, "failed to write log: {err}"),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Kernel { source, .. } => Some(source),
            SimError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SimError {
    fn from(err: io::Error) -> Self {
        SimError::Io(err)
    }
}

/// Totals reported once every process has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    pub finished_at: u64,
    pub processes: u32,
    pub context_switches: u64,
    pub idle_time: u64,
}

#[derive(Debug)]
struct ProcessRun {
    total_cpu_time: u64,
    elapsed_cpu_time: u64,
    timeline: VecDeque<(u64, Behavior)>,
}

/// Time-stepped driver that feeds a workload to a kernel and writes the
/// execution log.
///
/// Driver lines use a `:` delimiter. With kernel logs enabled, records the
/// engine logs during an event follow with a `#` delimiter.
pub struct Simulator<K, W> {
    kernel: K,
    out: W,
    semaphores: Vec<SemaphoreSpec>,
    mutexes: Vec<u32>,
    kernel_logs: bool,
    capture: Option<Capture>,
    elapsed: u64,
    current: Pid,
    processes: BTreeMap<Pid, ProcessRun>,
    arrivals: VecDeque<ProcessSpec>,
    next_pid: Pid,
    idle_run: u64,
    needs_spacing: bool,
    stats: RunStats,
}

impl<K: KernelOps, W: Write> Simulator<K, W> {
    /// Prepares a run. Kernel logs start disabled.
    pub fn new(workload: Workload, kernel: K, out: W) -> Self {
        let mut arrivals = workload.processes;
        arrivals.sort_by_key(|spec| spec.arrival);
        Self {
            kernel,
            out,
            semaphores: workload.semaphores,
            mutexes: workload.mutexes,
            kernel_logs: false,
            capture: None,
            elapsed: 0,
            current: IDLE_PID,
            processes: BTreeMap::new(),
            arrivals: arrivals.into(),
            next_pid: 1,
            idle_run: 0,
            needs_spacing: false,
            stats: RunStats::default(),
        }
    }

    /// Copies engine log records into the execution log.
    ///
    /// Records only arrive when a [`crate::KernelLogger`] is installed.
    pub fn with_kernel_logs(mut self, enabled: bool) -> Self {
        self.kernel_logs = enabled;
        self
    }

    /// Initializes the workload's primitives, then runs until every process
    /// has arrived and exited.
    pub fn run(mut self) -> Result<RunStats, SimError> {
        if self.kernel_logs {
            self.capture = Some(Capture::start());
        }
        self.init_primitives()?;

        while !self.processes.is_empty() || !self.arrivals.is_empty() {
            if self.current == IDLE_PID {
                self.idle_run += 1;
                self.stats.idle_time += 1;
            }
            if self.idle_run >= MAX_IDLE_RUN {
                return Err(SimError::IdleTooLong { time: self.elapsed });
            }

            self.advance_current()?;
            self.check_for_arrivals()?;

            if self.elapsed != 0 && self.elapsed % TIMER_INTERRUPT_INTERVAL == 0 {
                trace!("timer interrupt at {}", self.elapsed);
                let next = self.kernel.timer_interrupt();
                let next = self.accept(next)?;
                self.switch_process(next)?;
            }

            if self.needs_spacing {
                writeln!(self.out)?;
                self.needs_spacing = false;
            }
            self.elapsed += 1;
        }
        self.out.flush()?;
        self.stats.finished_at = self.elapsed;
        Ok(self.stats)
    }

    /// Returns the kernel being driven.
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    fn init_primitives(&mut self) -> Result<(), SimError> {
        for sem in std::mem::take(&mut self.semaphores) {
            let result = self.kernel.syscall_init_semaphore(sem.id, sem.initial_value);
            self.accept(result)?;
        }
        for id in std::mem::take(&mut self.mutexes) {
            let result = self.kernel.syscall_init_mutex(id);
            self.accept(result)?;
        }
        Ok(())
    }

    /// Writes what the kernel logged during the last event, then surfaces
    /// its result.
    fn accept<T>(&mut self, result: Result<T, Errno>) -> Result<T, SimError> {
        self.write_kernel_lines()?;
        result.map_err(|source| SimError::Kernel {
            time: self.elapsed,
            source,
        })
    }

    fn write_kernel_lines(&mut self) -> io::Result<()> {
        let lines = match &self.capture {
            Some(capture) => capture.drain(),
            None => return Ok(()),
        };
        for line in lines {
            self.write_line('#', format_args!("{line}"))?;
        }
        Ok(())
    }

    fn advance_current(&mut self) -> Result<(), SimError> {
        let pid = self.current;
        if pid == IDLE_PID {
            return Ok(());
        }
        let run = self.processes.get_mut(&pid).ok_or(SimError::UnknownPid {
            time: self.elapsed,
            pid,
        })?;
        run.elapsed_cpu_time += 1;

        if run.elapsed_cpu_time >= run.total_cpu_time {
            self.log(format_args!(
                "Process {pid} has finished execution and is exiting"
            ))?;
            let next = self.kernel.syscall_exit();
            let next = self.accept(next)?;
            if next == pid {
                return Err(SimError::ExitingProcessContinued {
                    time: self.elapsed,
                    pid,
                });
            }
            self.processes.remove(&pid);
            return self.switch_process(next);
        }

        // Events stop firing once the process loses the CPU; the rest wait
        // until it runs again.
        while self.current == pid {
            let Some(run) = self.processes.get_mut(&pid) else {
                break;
            };
            let now = run.elapsed_cpu_time;
            if !run.timeline.front().is_some_and(|(time, _)| *time <= now) {
                break;
            }
            let Some((_, behavior)) = run.timeline.pop_front() else {
                break;
            };
            self.perform(pid, behavior)?;
        }
        Ok(())
    }

    fn perform(&mut self, pid: Pid, behavior: Behavior) -> Result<(), SimError> {
        let next = match behavior {
            Behavior::SetPriority(priority) => {
                self.log(format_args!("Process {pid} set priority to {priority}"))?;
                self.kernel.syscall_set_priority(priority)
            }
            Behavior::Sync(SyncOp::SemaphoreP, id) => {
                self.log(format_args!("Process {pid} called p() on semaphore {id}"))?;
                self.kernel.syscall_semaphore_p(id)
            }
            Behavior::Sync(SyncOp::SemaphoreV, id) => {
                self.log(format_args!("Process {pid} called v() on semaphore {id}"))?;
                self.kernel.syscall_semaphore_v(id)
            }
            Behavior::Sync(SyncOp::MutexLock, id) => {
                self.log(format_args!("Process {pid} locked mutex {id}"))?;
                self.kernel.syscall_mutex_lock(id)
            }
            Behavior::Sync(SyncOp::MutexUnlock, id) => {
                self.log(format_args!("Process {pid} unlocked mutex {id}"))?;
                self.kernel.syscall_mutex_unlock(id)
            }
        };
        let next = self.accept(next)?;
        self.switch_process(next)
    }

    fn check_for_arrivals(&mut self) -> Result<(), SimError> {
        while self
            .arrivals
            .front()
            .is_some_and(|spec| spec.arrival == self.elapsed)
        {
            let Some(spec) = self.arrivals.pop_front() else {
                break;
            };
            let pid = self.next_pid;
            self.next_pid += 1;
            self.admit(pid, &spec)?;
        }
        Ok(())
    }

    fn admit(&mut self, pid: Pid, spec: &ProcessSpec) -> Result<(), SimError> {
        let priority: Priority = spec.priority;
        let class: ProcessClass = spec.class;
        self.processes.insert(
            pid,
            ProcessRun {
                total_cpu_time: spec.total_cpu_time,
                elapsed_cpu_time: 0,
                timeline: spec.timeline().into(),
            },
        );
        self.stats.processes += 1;
        self.log(format_args!(
            "{class} process {pid} arrived with priority {priority}"
        ))?;
        let next = self.kernel.new_process_arrived(pid, priority, class);
        let next = self.accept(next)?;
        self.switch_process(next)
    }

    fn switch_process(&mut self, next: Pid) -> Result<(), SimError> {
        if next != IDLE_PID {
            if !self.processes.contains_key(&next) {
                return Err(SimError::UnknownPid {
                    time: self.elapsed,
                    pid: next,
                });
            }
            self.idle_run = 0;
        }
        if next != self.current {
            debug!("switch {} -> {} at {}", self.current, next, self.elapsed);
            self.log(format_args!("Context switching to pid: {next}"))?;
            self.stats.context_switches += 1;
        }
        self.current = next;
        Ok(())
    }

    fn log(&mut self, message: fmt::Arguments<'_>) -> io::Result<()> {
        self.write_line(':', message)
    }

    fn write_line(&mut self, delimiter: char, message: fmt::Arguments<'_>) -> io::Result<()> {
        writeln!(
            self.out,
            "{:.3}s {} {}",
            self.elapsed as f64 / 1000.0,
            delimiter,
            message
        )?;
        self.needs_spacing = true;
        Ok(())
    }
}

/// Runs a workload against the built-in scheduler, writing the log to `out`.
pub fn simulate<W: Write>(workload: Workload, out: W) -> Result<RunStats, SimError> {
    let kernel = Scheduler::new(workload.scheduling_algorithm);
    Simulator::new(workload, kernel, out).run()
}
