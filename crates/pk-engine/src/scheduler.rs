//! Cooperative fixed-rate task scheduler.
//!
//! Tasks live in a slotmap arena owned by the scheduler and are addressed by
//! [`TaskKey`]. Every task gets the same mutable context `C` on each call, so
//! tasks never hold references to each other or to the state they drive.
//!
//! Each task runs at its own frequency. After a task runs, its next due time
//! is `max(start + period, end + MIN_TICK)`: a slow task never drives the
//! loop into a zero sleep, and an on-time task does not drift.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

use pk_ir::{Instant, MAX_TASK_HZ, MIN_TASK_HZ};
use slotmap::{new_key_type, SlotMap};

use crate::clock::Clock;

/// Minimum sleep between loop iterations.
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Sleep used when no task is registered.
const IDLE_SLEEP: Duration = Duration::from_secs(1);

new_key_type! {
    /// Handle to a registered task.
    pub struct TaskKey;
}

/// A periodic unit of work.
pub trait Task<C> {
    fn update(&mut self, ctx: &mut C, now: Instant);
}

impl<C, F> Task<C> for F
where
    F: FnMut(&mut C, Instant),
{
    fn update(&mut self, ctx: &mut C, now: Instant) {
        self(ctx, now)
    }
}

struct Entry<C> {
    task: Box<dyn Task<C> + Send>,
    period: Duration,
    /// None until the first run: due immediately
    next_due: Option<Instant>,
    paused: bool,
}

/// Stops a running scheduler from another thread.
#[derive(Clone, Debug)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Ask the run loop to return after the current iteration.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Runs registered tasks at their frequencies on a single thread.
pub struct Scheduler<C> {
    tasks: SlotMap<TaskKey, Entry<C>>,
    paused: bool,
    stop: Arc<AtomicBool>,
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self {
            tasks: SlotMap::with_key(),
            paused: false,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a task at `hz` (clamped to 1..=1000). It first runs on the
    /// next tick.
    pub fn register(&mut self, task: impl Task<C> + Send + 'static, hz: u32) -> TaskKey {
        let key = self.tasks.insert(Entry {
            task: Box::new(task),
            period: period_for(hz),
            next_due: None,
            paused: false,
        });
        log::debug!("registered task {:?} at {} Hz", key, clamp_hz(hz));
        key
    }

    /// Remove a task. Returns false if it was already gone.
    pub fn cancel(&mut self, key: TaskKey) -> bool {
        let removed = self.tasks.remove(key).is_some();
        if removed {
            log::debug!("cancelled task {:?}", key);
        }
        removed
    }

    pub fn contains(&self, key: TaskKey) -> bool {
        self.tasks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Skip every task body. Tasks keep their phase.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Skip one task's body, keeping its phase.
    pub fn pause_task(&mut self, key: TaskKey) {
        if let Some(entry) = self.tasks.get_mut(key) {
            entry.paused = true;
        }
    }

    pub fn resume_task(&mut self, key: TaskKey) {
        if let Some(entry) = self.tasks.get_mut(key) {
            entry.paused = false;
        }
    }

    pub fn is_task_paused(&self, key: TaskKey) -> Option<bool> {
        self.tasks.get(key).map(|e| e.paused)
    }

    /// Change a task's frequency. Takes effect after its next run.
    pub fn set_frequency(&mut self, key: TaskKey, hz: u32) {
        if let Some(entry) = self.tasks.get_mut(key) {
            entry.period = period_for(hz);
        }
    }

    pub fn period(&self, key: TaskKey) -> Option<Duration> {
        self.tasks.get(key).map(|e| e.period)
    }

    /// Run one task's body now, outside its schedule and regardless of
    /// pause state. Returns false if the task is gone.
    ///
    /// Needs `&mut self`, so it is only usable between ticks, never while
    /// [`run`](Self::run) owns the scheduler. A live loop forces work from
    /// inside a task instead, e.g. `Keyboard::force_update` on the next
    /// command.
    pub fn force(&mut self, key: TaskKey, ctx: &mut C, now: Instant) -> bool {
        match self.tasks.get_mut(key) {
            Some(entry) => {
                entry.task.update(ctx, now);
                true
            }
            None => false,
        }
    }

    /// Run every due task once and return how long to sleep before the
    /// next one is due (at least [`MIN_TICK`]).
    pub fn tick<K: Clock + ?Sized>(&mut self, ctx: &mut C, clock: &K) -> Duration {
        let mut next: Option<Instant> = None;
        for (_, entry) in self.tasks.iter_mut() {
            let start = clock.now();
            if entry.next_due.map_or(true, |due| start >= due) {
                if !self.paused && !entry.paused {
                    entry.task.update(ctx, start);
                }
                let end = clock.now();
                entry.next_due = Some((start + entry.period).max(end + MIN_TICK));
            }
            if let Some(due) = entry.next_due {
                next = Some(next.map_or(due, |n| n.min(due)));
            }
        }
        match next {
            Some(due) => (due - clock.now()).max(MIN_TICK),
            None => IDLE_SLEEP,
        }
    }

    /// Handle that makes [`run`](Self::run) return.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: self.stop.clone(),
        }
    }

    /// Make the run loop return after the current iteration.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Drive tasks until stopped.
    pub fn run<K: Clock + ?Sized>(&mut self, ctx: &mut C, clock: &mut K) {
        self.run_until(ctx, clock, |_| false);
    }

    /// Drive tasks until `done` returns true or the scheduler is stopped.
    /// `done` is checked after every tick.
    pub fn run_until<K, F>(&mut self, ctx: &mut C, clock: &mut K, mut done: F)
    where
        K: Clock + ?Sized,
        F: FnMut(&mut C) -> bool,
    {
        log::debug!("scheduler running {} tasks", self.tasks.len());
        while !self.stop.load(Ordering::Acquire) {
            let sleep = self.tick(ctx, clock);
            if done(ctx) {
                break;
            }
            clock.sleep(sleep);
        }
        self.stop.store(false, Ordering::Release);
        log::debug!("scheduler stopped");
    }
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_hz(hz: u32) -> u32 {
    hz.clamp(MIN_TASK_HZ, MAX_TASK_HZ)
}

fn period_for(hz: u32) -> Duration {
    (Duration::from_secs(1) / clamp_hz(hz)).max(MIN_TICK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use alloc::vec::Vec;
    use core::sync::atomic::AtomicU64;

    #[derive(Default)]
    struct Log {
        calls: Vec<(&'static str, Instant)>,
    }

    fn record(name: &'static str) -> impl FnMut(&mut Log, Instant) + Send {
        move |log: &mut Log, now| log.calls.push((name, now))
    }

    fn count(log: &Log, name: &str) -> usize {
        log.calls.iter().filter(|(n, _)| *n == name).count()
    }

    #[test]
    fn frequency_is_clamped() {
        let mut sched = Scheduler::<Log>::new();
        let slow = sched.register(record("slow"), 0);
        let fast = sched.register(record("fast"), 50_000);
        assert_eq!(sched.period(slow), Some(Duration::from_secs(1)));
        assert_eq!(sched.period(fast), Some(Duration::from_millis(1)));
    }

    #[test]
    fn tasks_run_at_their_rates() {
        let mut sched = Scheduler::new();
        sched.register(record("a"), 100);
        sched.register(record("b"), 10);
        let mut log = Log::default();
        let mut clock = ManualClock::new();

        while clock.now() < Instant::from_millis(1000) {
            let sleep = sched.tick(&mut log, &clock);
            clock.sleep(sleep);
        }
        assert_eq!(count(&log, "a"), 100);
        assert_eq!(count(&log, "b"), 10);
    }

    #[test]
    fn sleep_budget_is_time_to_next_due() {
        let mut sched = Scheduler::new();
        sched.register(record("a"), 100);
        let mut log = Log::default();
        let clock = ManualClock::new();
        assert_eq!(sched.tick(&mut log, &clock), Duration::from_millis(10));
    }

    #[test]
    fn empty_scheduler_idles() {
        let mut sched = Scheduler::<Log>::new();
        let mut log = Log::default();
        let clock = ManualClock::new();
        assert_eq!(sched.tick(&mut log, &clock), IDLE_SLEEP);
    }

    #[test]
    fn pause_keeps_phase() {
        let mut sched = Scheduler::new();
        let key = sched.register(record("a"), 10);
        let mut log = Log::default();
        let mut clock = ManualClock::new();

        sched.tick(&mut log, &clock);
        sched.pause();
        for _ in 0..3 {
            clock.advance(Duration::from_millis(100));
            sched.tick(&mut log, &clock);
        }
        assert_eq!(count(&log, "a"), 1);

        sched.resume();
        clock.advance(Duration::from_millis(50));
        sched.tick(&mut log, &clock);
        assert_eq!(count(&log, "a"), 1, "not due until the next period boundary");
        clock.advance(Duration::from_millis(50));
        sched.tick(&mut log, &clock);
        assert_eq!(count(&log, "a"), 2);

        sched.pause_task(key);
        assert_eq!(sched.is_task_paused(key), Some(true));
        clock.advance(Duration::from_millis(100));
        sched.tick(&mut log, &clock);
        assert_eq!(count(&log, "a"), 2);
        sched.resume_task(key);
        clock.advance(Duration::from_millis(100));
        sched.tick(&mut log, &clock);
        assert_eq!(count(&log, "a"), 3);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut sched = Scheduler::new();
        let key = sched.register(record("a"), 10);
        assert!(sched.cancel(key));
        assert!(!sched.cancel(key));
        assert!(!sched.contains(key));

        let mut log = Log::default();
        let clock = ManualClock::new();
        sched.tick(&mut log, &clock);
        assert!(log.calls.is_empty());
        assert!(!sched.force(key, &mut log, Instant::ZERO));
    }

    #[test]
    fn force_runs_even_when_paused() {
        let mut sched = Scheduler::new();
        let key = sched.register(record("a"), 1);
        let mut log = Log::default();
        sched.pause();
        assert!(sched.force(key, &mut log, Instant::from_millis(7)));
        assert_eq!(log.calls, [("a", Instant::from_millis(7))]);
    }

    #[test]
    fn run_until_stops_on_predicate() {
        let mut sched = Scheduler::new();
        sched.register(record("a"), 1000);
        let mut log = Log::default();
        let mut clock = ManualClock::new();
        sched.run_until(&mut log, &mut clock, |log| log.calls.len() >= 25);
        assert_eq!(log.calls.len(), 25);
        assert_eq!(clock.now(), Instant::from_millis(24));
    }

    #[test]
    fn stop_handle_ends_run() {
        let mut sched = Scheduler::new();
        sched.register(record("a"), 1000);
        let handle = sched.stop_handle();
        handle.stop();
        assert!(handle.is_stopped());

        let mut log = Log::default();
        let mut clock = ManualClock::new();
        sched.run(&mut log, &mut clock);
        assert!(log.calls.is_empty());
        assert!(!handle.is_stopped(), "flag resets so the scheduler can run again");
    }

    #[test]
    fn set_frequency_applies_after_next_run() {
        let mut sched = Scheduler::new();
        let key = sched.register(record("a"), 10);
        let mut log = Log::default();
        let mut clock = ManualClock::new();
        sched.tick(&mut log, &clock);
        sched.set_frequency(key, 100);
        clock.advance(Duration::from_millis(100));
        sched.tick(&mut log, &clock);
        clock.advance(Duration::from_millis(10));
        sched.tick(&mut log, &clock);
        assert_eq!(count(&log, "a"), 3);
    }

    /// A clock the task under test can move forward.
    #[derive(Clone, Default)]
    struct SharedClock(Arc<AtomicU64>);

    impl Clock for SharedClock {
        fn now(&self) -> Instant {
            Instant::from_micros(self.0.load(Ordering::Relaxed))
        }

        fn sleep(&mut self, duration: Duration) {
            self.0.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        }
    }

    struct Slow {
        clock: SharedClock,
        runs: Vec<Instant>,
    }

    #[test]
    fn overrun_reschedules_from_end() {
        let mut sched = Scheduler::new();
        // 10 ms period, 25 ms of work
        sched.register(
            |ctx: &mut Slow, now: Instant| {
                ctx.runs.push(now);
                ctx.clock.sleep(Duration::from_millis(25));
            },
            100,
        );
        let mut clock = SharedClock::default();
        let mut ctx = Slow {
            clock: clock.clone(),
            runs: Vec::new(),
        };

        let sleep = sched.tick(&mut ctx, &clock);
        assert_eq!(clock.now(), Instant::from_millis(25));
        assert_eq!(sleep, MIN_TICK);

        clock.sleep(sleep);
        let sleep = sched.tick(&mut ctx, &clock);
        assert_eq!(sleep, MIN_TICK);
        assert_eq!(ctx.runs, [Instant::ZERO, Instant::from_millis(26)]);
        assert_eq!(clock.now(), Instant::from_millis(51));
    }
}
