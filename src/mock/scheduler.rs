//! Virtual clock for driving timers deterministically in tests.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use crate::scheduler::{Scheduler, Task};

// Guards against timers that keep rescheduling themselves forever.
const MAX_TASKS_PER_RUN: usize = 10_000;

struct Timer {
    due: Duration,
    seq: u64,
    task: Task,
}

/// Virtual clock. Time only moves when the test advances it; timers due at
/// the same instant run in the order they were scheduled.
#[derive(Default)]
pub struct MockScheduler {
    now: Cell<Duration>,
    seq: Cell<u64>,
    timers: RefCell<Vec<Timer>>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.timers.borrow().iter().map(|t| t.due).min()
    }

    fn pop_due(&self, limit: Option<Duration>) -> Option<Timer> {
        let mut timers = self.timers.borrow_mut();
        let pos = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| limit.map_or(true, |l| t.due <= l))
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        Some(timers.remove(pos))
    }

    fn run(&self, timer: Timer) {
        if timer.due > self.now.get() {
            self.now.set(timer.due);
        }
        (timer.task)();
    }

    /// Moves the clock forward by `by`, running every timer that falls due
    /// on the way (including ones scheduled by those timers).
    /// Returns the number of timers run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now.get() + by;
        let mut ran = 0;
        while ran < MAX_TASKS_PER_RUN {
            let Some(timer) = self.pop_due(Some(target)) else { break };
            self.run(timer);
            ran += 1;
        }
        if self.now.get() < target {
            self.now.set(target);
        }
        ran
    }

    /// Runs timers until none are left, jumping the clock to each one.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while ran < MAX_TASKS_PER_RUN {
            let Some(timer) = self.pop_due(None) else { break };
            self.run(timer);
            ran += 1;
        }
        ran
    }
}

impl Scheduler for MockScheduler {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn set_timeout(&self, delay: Duration, task: Task) {
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        self.timers.borrow_mut().push(Timer {
            due: self.now.get() + delay,
            seq,
            task,
        });
    }
}

impl std::fmt::Debug for MockScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockScheduler")
            .field("now", &self.now.get())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_timers_fire_in_due_order() {
        let sched = MockScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (name, ms) in [("c", 30), ("a", 10), ("b", 10)] {
            let l = log.clone();
            sched.set_timeout(Duration::from_millis(ms), Box::new(move || l.borrow_mut().push(name)));
        }

        assert_eq!(sched.advance(Duration::from_millis(10)), 2);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(sched.now(), Duration::from_millis(10));

        sched.run_until_idle();
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(sched.now(), Duration::from_millis(30));
    }

    #[test]
    fn test_nested_timers_run_within_advance() {
        let sched = Rc::new(MockScheduler::new());
        let hits = Rc::new(Cell::new(0));
        let (s, h) = (sched.clone(), hits.clone());
        sched.set_timeout(
            Duration::from_millis(5),
            Box::new(move || {
                h.set(h.get() + 1);
                let h = h.clone();
                s.set_timeout(Duration::from_millis(5), Box::new(move || h.set(h.get() + 1)));
            }),
        );

        sched.advance(Duration::from_millis(20));
        assert_eq!(hits.get(), 2);
        assert_eq!(sched.pending(), 0);
        assert_eq!(sched.now(), Duration::from_millis(20));
    }
}
