use std::collections::BTreeSet;

use sched_core::{
    KernelOps, Pid, Policy, ProcState, ProcessClass, Scheduler, IDLE_PID, LEVEL_SWITCH_TICKS,
    RR_QUANTUM_TICKS,
};

const SEMAPHORES: [(u32, i32); 2] = [(1, 0), (2, 1)];
const MUTEXES: [u32; 2] = [1, 2];
const POLICIES: [Policy; 4] = [
    Policy::Fcfs,
    Policy::RoundRobin,
    Policy::Priority,
    Policy::Multilevel,
];

/// xorshift64* so every seed replays the same event stream.
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed })
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Arrival(Pid, i32, ProcessClass),
    Exit,
    SetPriority(i32),
    Timer,
    P(u32),
    V(u32),
    Lock(u32),
    Unlock(u32),
}

/// Replays events and checks the engine's invariants after each one.
struct Harness {
    sched: Scheduler,
    live: BTreeSet<Pid>,
    p_count: [i32; 2],
    v_count: [i32; 2],
    rr_streak: u32,
    level_streak: u32,
}

impl Harness {
    fn new(policy: Policy) -> Self {
        let mut sched = Scheduler::new(policy);
        for (id, value) in SEMAPHORES {
            sched
                .syscall_init_semaphore(id, value)
                .expect("semaphore init should succeed");
        }
        for id in MUTEXES {
            sched.syscall_init_mutex(id).expect("mutex init should succeed");
        }
        Self {
            sched,
            live: BTreeSet::new(),
            p_count: [0; 2],
            v_count: [0; 2],
            rr_streak: 0,
            level_streak: 0,
        }
    }

    fn ready_has_class(&self, class: ProcessClass) -> bool {
        self.sched.snapshot().ready.iter().any(|pid| {
            self.sched
                .process(*pid)
                .map(|pcb| pcb.class == class)
                .unwrap_or(false)
        })
    }

    fn apply(&mut self, event: Event) -> Pid {
        let before = self.sched.running();
        let ready_before = !self.sched.snapshot().ready.is_empty();
        let level_before = self.sched.level();
        let background_pending = self.ready_has_class(ProcessClass::Background);

        let result = match event {
            Event::Arrival(pid, priority, class) => {
                self.live.insert(pid);
                self.sched.new_process_arrived(pid, priority, class)
            }
            Event::Exit => {
                self.live.remove(&before);
                self.sched.syscall_exit()
            }
            Event::SetPriority(priority) => self.sched.syscall_set_priority(priority),
            Event::Timer => self.sched.timer_interrupt(),
            Event::P(id) => {
                self.p_count[id as usize - 1] += 1;
                self.sched.syscall_semaphore_p(id)
            }
            Event::V(id) => {
                self.v_count[id as usize - 1] += 1;
                self.sched.syscall_semaphore_v(id)
            }
            Event::Lock(id) => self.sched.syscall_mutex_lock(id),
            Event::Unlock(id) => self.sched.syscall_mutex_unlock(id),
        };
        let now = result.expect("well-formed event should succeed");
        assert_eq!(now, self.sched.running());

        if event == Event::Timer {
            if before != IDLE_PID && before == now && ready_before {
                self.rr_streak += 1;
            } else {
                self.rr_streak = 0;
            }
            if level_before == Some(ProcessClass::Foreground)
                && before != IDLE_PID
                && background_pending
            {
                self.level_streak += 1;
            } else {
                self.level_streak = 0;
            }
        } else if before != now {
            self.rr_streak = 0;
        }
        if self.sched.level() != Some(ProcessClass::Foreground) {
            self.level_streak = 0;
        }

        if self.sched.policy() == Policy::Fcfs && before != IDLE_PID {
            let may_leave = matches!(event, Event::Exit | Event::P(_) | Event::Lock(_));
            if !may_leave {
                assert_eq!(now, before, "FCFS replaced {before} on {event:?}");
            }
        }

        self.check();
        now
    }

    fn check(&self) {
        let snap = self.sched.snapshot();

        // Conservation: every live pid sits in exactly one place.
        let mut seen: Vec<Pid> = snap.ready.iter().chain(snap.blocked.iter()).copied().collect();
        if snap.running != IDLE_PID {
            seen.push(snap.running);
        }
        seen.sort_unstable();
        let expected: Vec<Pid> = self.live.iter().copied().collect();
        assert_eq!(seen, expected);

        if snap.running == IDLE_PID {
            assert!(snap.ready.is_empty(), "idle CPU with ready work {:?}", snap.ready);
        } else {
            let pcb = self.sched.process(snap.running).expect("running pid is live");
            assert_eq!(pcb.state, ProcState::Running);
        }
        for pid in &snap.ready {
            assert_eq!(self.sched.process(*pid).map(|pcb| pcb.state), Ok(ProcState::Ready));
        }
        for pid in &snap.blocked {
            assert_eq!(self.sched.process(*pid).map(|pcb| pcb.state), Ok(ProcState::Blocked));
        }

        for (index, (id, initial)) in SEMAPHORES.iter().enumerate() {
            let sem = self.sched.semaphore(*id).expect("semaphore exists");
            assert_eq!(sem.value(), initial + self.v_count[index] - self.p_count[index]);
            assert_eq!(sem.waiters().len() as i32, (-sem.value()).max(0));
        }

        for id in MUTEXES {
            let mutex = self.sched.mutex(id).expect("mutex exists");
            assert_eq!(mutex.is_locked(), mutex.owner().is_some());
            if let Some(owner) = mutex.owner() {
                assert!(self.live.contains(&owner));
                assert!(!mutex.waiters().contains(owner));
            } else {
                assert!(mutex.waiters().is_empty());
            }
        }

        match self.sched.policy() {
            Policy::Priority if snap.running != IDLE_PID => {
                let running = self.sched.process(snap.running).expect("live").rank();
                for pid in &snap.ready {
                    let rank = self.sched.process(*pid).expect("live").rank();
                    assert!(running <= rank, "{running:?} runs ahead of {rank:?}");
                }
            }
            Policy::RoundRobin => {
                assert!(self.sched.quantum_ticks() < RR_QUANTUM_TICKS);
                assert!(self.rr_streak < RR_QUANTUM_TICKS);
            }
            Policy::Multilevel => {
                assert!(self.level_streak < LEVEL_SWITCH_TICKS);
            }
            _ => {}
        }
    }

    fn holds(&self, pid: Pid, id: u32) -> bool {
        self.sched
            .mutex(id)
            .map(|mutex| mutex.owner() == Some(pid))
            .unwrap_or(false)
    }

    fn random_event(&self, rng: &mut Rng, next_pid: &mut Pid) -> Event {
        let running = self.sched.running();
        loop {
            let event = match rng.below(12) {
                0 | 1 if self.live.len() < 8 => {
                    let pid = *next_pid;
                    *next_pid += 1;
                    let class = if rng.below(2) == 0 {
                        ProcessClass::Foreground
                    } else {
                        ProcessClass::Background
                    };
                    Event::Arrival(pid, rng.below(6) as i32, class)
                }
                2..=5 => Event::Timer,
                6 if running != IDLE_PID => Event::Exit,
                7 if running != IDLE_PID => Event::SetPriority(rng.below(6) as i32),
                8 if running != IDLE_PID => Event::P(1 + rng.below(2) as u32),
                9 if running != IDLE_PID => Event::V(1 + rng.below(2) as u32),
                // Self-deadlock on a held mutex is legal but starves the stream.
                10 if running != IDLE_PID => {
                    let id = 1 + rng.below(2) as u32;
                    if self.holds(running, id) {
                        continue;
                    }
                    Event::Lock(id)
                }
                11 if running != IDLE_PID => {
                    let id = 1 + rng.below(2) as u32;
                    if !self.holds(running, id) {
                        continue;
                    }
                    Event::Unlock(id)
                }
                _ => continue,
            };
            return event;
        }
    }
}

#[test]
fn random_event_streams_preserve_invariants() {
    for policy in POLICIES {
        for seed in 1..=150u64 {
            let mut rng = Rng::new(seed.wrapping_mul(0x1000_0001) ^ policy as u64);
            let mut harness = Harness::new(policy);
            let mut next_pid = 1;
            for _ in 0..400 {
                let event = harness.random_event(&mut rng, &mut next_pid);
                harness.apply(event);
            }
        }
    }
}

#[test]
fn identical_event_streams_replay_identically() {
    for policy in POLICIES {
        let mut outputs = Vec::new();
        for _ in 0..2 {
            let mut rng = Rng::new(42);
            let mut harness = Harness::new(policy);
            let mut next_pid = 1;
            let mut trace = Vec::new();
            for _ in 0..300 {
                let event = harness.random_event(&mut rng, &mut next_pid);
                trace.push(harness.apply(event));
            }
            outputs.push(trace);
        }
        assert_eq!(outputs[0], outputs[1]);
    }
}

#[test]
fn priority_scenario_preempts_on_arrival() {
    let mut harness = Harness::new(Policy::Priority);
    assert_eq!(harness.apply(Event::Arrival(1, 5, ProcessClass::Foreground)), 1);
    assert_eq!(harness.apply(Event::Arrival(2, 1, ProcessClass::Foreground)), 2);
    assert_eq!(harness.sched.snapshot().ready, vec![1]);
}

#[test]
fn round_robin_scenario_keeps_arrival_order() {
    let mut harness = Harness::new(Policy::RoundRobin);
    assert_eq!(harness.apply(Event::Arrival(1, 0, ProcessClass::Foreground)), 1);
    for _ in 0..4 {
        assert_eq!(harness.apply(Event::Timer), 1);
    }
    assert_eq!(harness.apply(Event::Timer), 1);
    assert_eq!(harness.apply(Event::Arrival(2, 0, ProcessClass::Foreground)), 1);
    assert_eq!(harness.apply(Event::Timer), 1);
    assert_eq!(harness.apply(Event::Timer), 1);
    assert_eq!(harness.apply(Event::Timer), 2);
    assert_eq!(harness.sched.snapshot().ready, vec![1]);
}

#[test]
fn semaphore_scenario_blocks_then_wakes() {
    let mut harness = Harness::new(Policy::RoundRobin);
    harness.apply(Event::Arrival(1, 0, ProcessClass::Foreground));
    assert_eq!(harness.apply(Event::P(1)), IDLE_PID);
    assert_eq!(harness.sched.semaphore(1).map(|sem| sem.value()), Ok(-1));
    assert_eq!(harness.apply(Event::Arrival(2, 0, ProcessClass::Foreground)), 2);
    assert_eq!(harness.apply(Event::V(1)), 2);
    assert_eq!(harness.sched.semaphore(1).map(|sem| sem.value()), Ok(0));
    assert_eq!(harness.sched.snapshot().ready, vec![1]);
}

#[test]
fn mutex_scenario_transfers_ownership_directly() {
    let mut harness = Harness::new(Policy::RoundRobin);
    harness.apply(Event::Arrival(1, 0, ProcessClass::Foreground));
    harness.apply(Event::Arrival(2, 0, ProcessClass::Foreground));
    assert_eq!(harness.apply(Event::Lock(2)), 1);
    for _ in 0..4 {
        harness.apply(Event::Timer);
    }
    assert_eq!(harness.sched.running(), 2);
    assert_eq!(harness.apply(Event::Lock(2)), 1);
    assert_eq!(harness.apply(Event::Unlock(2)), 1);
    let mutex = harness.sched.mutex(2).expect("mutex exists");
    assert_eq!(mutex.owner(), Some(2));
}
