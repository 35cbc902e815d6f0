use alloc::collections::VecDeque;

use sched_hal::{Pid, Priority};

use crate::policy::WakeOrder;

/// Processes blocked on one synchronization primitive, in arrival order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WaitList {
    queue: VecDeque<Pid>,
}

impl WaitList {
    /// Creates an empty wait list.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Parks a process at the tail.
    pub fn push(&mut self, pid: Pid) {
        self.queue.push_back(pid);
    }

    /// Releases one waiter.
    ///
    /// `rank` resolves a waiter to its `(priority, pid)` key; it is only
    /// consulted for [`WakeOrder::Ranked`].
    pub fn take<F>(&mut self, order: WakeOrder, rank: F) -> Option<Pid>
    where
        F: Fn(Pid) -> (Priority, Pid),
    {
        match order {
            WakeOrder::Fifo => self.queue.pop_front(),
            WakeOrder::Ranked => {
                let (index, _) = self
                    .queue
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, pid)| rank(**pid))?;
                self.queue.remove(index)
            }
        }
    }

    /// Returns the number of waiters.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true when nobody waits.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns true when `pid` is parked here.
    pub fn contains(&self, pid: Pid) -> bool {
        self.queue.contains(&pid)
    }

    /// Iterates waiters in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.queue.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_take_releases_oldest() {
        let mut waiters = WaitList::new();
        waiters.push(4);
        waiters.push(2);
        assert_eq!(waiters.take(WakeOrder::Fifo, |pid| (0, pid)), Some(4));
        assert_eq!(waiters.take(WakeOrder::Fifo, |pid| (0, pid)), Some(2));
        assert_eq!(waiters.take(WakeOrder::Fifo, |pid| (0, pid)), None);
    }

    #[test]
    fn ranked_take_removes_from_the_middle() {
        let mut waiters = WaitList::new();
        waiters.push(1);
        waiters.push(2);
        waiters.push(3);
        let priority = |pid: Pid| match pid {
            2 => (1, pid),
            _ => (5, pid),
        };
        assert_eq!(waiters.take(WakeOrder::Ranked, priority), Some(2));
        assert_eq!(waiters.iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(waiters.take(WakeOrder::Ranked, priority), Some(1));
        assert!(waiters.contains(3));
        assert_eq!(waiters.len(), 1);
    }
}
