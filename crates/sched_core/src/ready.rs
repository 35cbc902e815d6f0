use alloc::collections::{BinaryHeap, VecDeque};
use alloc::vec::Vec;
use core::cmp::Reverse;

use sched_hal::{Pid, Priority, ProcessClass};

use crate::policy::Policy;
use crate::process::Pcb;

/// Process picked by [`ReadyQueue::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selected {
    pub pid: Pid,
    /// True when the feedback level flipped to find work.
    pub level_switched: bool,
}

/// Foreground and background queues of the feedback discipline.
#[derive(Debug, Default)]
pub struct FeedbackQueues {
    foreground: VecDeque<Pid>,
    background: VecDeque<Pid>,
    level: ProcessClass,
}

impl FeedbackQueues {
    /// Creates empty queues with the foreground level active.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the active level.
    pub fn level(&self) -> ProcessClass {
        self.level
    }

    /// Forces the active level.
    pub fn set_level(&mut self, level: ProcessClass) {
        self.level = level;
    }

    /// Returns the queue for a level.
    pub fn queue(&self, class: ProcessClass) -> &VecDeque<Pid> {
        match class {
            ProcessClass::Foreground => &self.foreground,
            ProcessClass::Background => &self.background,
        }
    }

    fn queue_mut(&mut self, class: ProcessClass) -> &mut VecDeque<Pid> {
        match class {
            ProcessClass::Foreground => &mut self.foreground,
            ProcessClass::Background => &mut self.background,
        }
    }

    // Drains the active level first and only flips when it is empty.
    fn select(&mut self) -> Option<Selected> {
        let level = self.level;
        if let Some(pid) = self.queue_mut(level).pop_front() {
            return Some(Selected {
                pid,
                level_switched: false,
            });
        }
        let other = level.opposite();
        let pid = self.queue_mut(other).pop_front()?;
        self.level = other;
        Some(Selected {
            pid,
            level_switched: true,
        })
    }
}

/// Ready container, shaped by the active discipline.
#[derive(Debug)]
pub enum ReadyQueue {
    /// Arrival-ordered queue for FCFS and round-robin.
    Fifo(VecDeque<Pid>),
    /// Min-ordered by `(priority, pid)`.
    Ranked(BinaryHeap<Reverse<(Priority, Pid)>>),
    /// Two-level feedback queues.
    Feedback(FeedbackQueues),
}

impl ReadyQueue {
    /// Builds the container used by a discipline.
    pub fn for_policy(policy: Policy) -> Self {
        match policy {
            Policy::Fcfs | Policy::RoundRobin => ReadyQueue::Fifo(VecDeque::new()),
            Policy::Priority => ReadyQueue::Ranked(BinaryHeap::new()),
            Policy::Multilevel => ReadyQueue::Feedback(FeedbackQueues::new()),
        }
    }

    /// Files a process at the back of its queue.
    pub fn enqueue(&mut self, pcb: &Pcb) {
        match self {
            ReadyQueue::Fifo(queue) => queue.push_back(pcb.pid),
            ReadyQueue::Ranked(heap) => heap.push(Reverse(pcb.rank())),
            ReadyQueue::Feedback(queues) => queues.queue_mut(pcb.class).push_back(pcb.pid),
        }
    }

    /// Files a process at the front of its queue. Ranked queues ignore position.
    pub fn enqueue_front(&mut self, pcb: &Pcb) {
        match self {
            ReadyQueue::Fifo(queue) => queue.push_front(pcb.pid),
            ReadyQueue::Ranked(heap) => heap.push(Reverse(pcb.rank())),
            ReadyQueue::Feedback(queues) => queues.queue_mut(pcb.class).push_front(pcb.pid),
        }
    }

    /// Removes the next process to run.
    pub fn select(&mut self) -> Option<Selected> {
        match self {
            ReadyQueue::Fifo(queue) => queue.pop_front().map(|pid| Selected {
                pid,
                level_switched: false,
            }),
            ReadyQueue::Ranked(heap) => heap.pop().map(|Reverse((_, pid))| Selected {
                pid,
                level_switched: false,
            }),
            ReadyQueue::Feedback(queues) => queues.select(),
        }
    }

    /// Returns the best rank waiting in a ranked queue.
    pub fn peek_rank(&self) -> Option<(Priority, Pid)> {
        match self {
            ReadyQueue::Ranked(heap) => heap.peek().map(|Reverse(rank)| *rank),
            _ => None,
        }
    }

    /// Returns true when the feedback queue for `class` holds work.
    pub fn has_work(&self, class: ProcessClass) -> bool {
        match self {
            ReadyQueue::Feedback(queues) => !queues.queue(class).is_empty(),
            _ => false,
        }
    }

    /// Returns the feedback queues, if this is a feedback container.
    pub fn feedback(&self) -> Option<&FeedbackQueues> {
        match self {
            ReadyQueue::Feedback(queues) => Some(queues),
            _ => None,
        }
    }

    /// Mutable access to the feedback queues.
    pub fn feedback_mut(&mut self) -> Option<&mut FeedbackQueues> {
        match self {
            ReadyQueue::Feedback(queues) => Some(queues),
            _ => None,
        }
    }

    /// Returns the number of ready processes.
    pub fn len(&self) -> usize {
        match self {
            ReadyQueue::Fifo(queue) => queue.len(),
            ReadyQueue::Ranked(heap) => heap.len(),
            ReadyQueue::Feedback(queues) => queues.foreground.len() + queues.background.len(),
        }
    }

    /// Returns true when nothing is ready.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lists ready pids.
    ///
    /// FIFO queues list in dispatch order, ranked queues by ascending rank,
    /// feedback queues foreground first and then background.
    pub fn pids(&self) -> Vec<Pid> {
        match self {
            ReadyQueue::Fifo(queue) => queue.iter().copied().collect(),
            ReadyQueue::Ranked(heap) => {
                let mut ranks: Vec<(Priority, Pid)> =
                    heap.iter().map(|Reverse(rank)| *rank).collect();
                ranks.sort_unstable();
                ranks.into_iter().map(|(_, pid)| pid).collect()
            }
            ReadyQueue::Feedback(queues) => queues
                .foreground
                .iter()
                .chain(queues.background.iter())
                .copied()
                .collect(),
        }
    }
}
