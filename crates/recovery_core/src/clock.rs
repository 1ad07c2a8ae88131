//! In-process tick counter that hosts advance once per game tick.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ScheduleError;
use crate::scheduler::{TaskHandle, TickScheduler};

#[derive(Debug, Clone, Copy)]
struct RepeatingTask {
    interval: u64,
    countdown: u64,
}

/// Repeating tasks keyed by handle. A task fires for the first time one full
/// interval after it was scheduled.
#[derive(Debug, Default)]
pub struct TickClock {
    tick: u64,
    next_handle: u64,
    tasks: BTreeMap<TaskHandle, RepeatingTask>,
    capacity: Option<usize>,
    refusing: bool,
}

impl TickClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Makes every further `schedule_repeating` call fail.
    pub fn set_refusing(&mut self, refusing: bool) {
        self.refusing = refusing;
    }

    /// Advances one tick and returns the tasks that are due.
    pub fn advance(&mut self) -> Vec<TaskHandle> {
        self.tick += 1;
        let mut due = Vec::new();
        for (handle, task) in self.tasks.iter_mut() {
            task.countdown -= 1;
            if task.countdown == 0 {
                task.countdown = task.interval;
                due.push(*handle);
            }
        }
        due
    }
}

impl TickScheduler for TickClock {
    fn schedule_repeating(&mut self, interval_ticks: u64) -> Result<TaskHandle, ScheduleError> {
        if self.refusing {
            return Err(ScheduleError::Rejected("clock is not accepting tasks".into()));
        }
        if interval_ticks == 0 {
            return Err(ScheduleError::InvalidInterval(interval_ticks));
        }
        if let Some(limit) = self.capacity {
            if self.tasks.len() >= limit {
                return Err(ScheduleError::CapacityExhausted { limit });
            }
        }

        self.next_handle += 1;
        let handle = TaskHandle(self.next_handle);
        self.tasks.insert(
            handle,
            RepeatingTask {
                interval: interval_ticks,
                countdown: interval_ticks,
            },
        );
        Ok(handle)
    }

    fn cancel(&mut self, handle: TaskHandle) {
        self.tasks.remove(&handle);
    }
}

/// A [`TickClock`] shared between the engine, which schedules on it, and the
/// host loop, which advances it.
#[derive(Debug, Clone, Default)]
pub struct SharedClock {
    inner: Arc<Mutex<TickClock>>,
}

impl SharedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TickClock::with_capacity(capacity))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TickClock> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Advances one tick. The lock is released before the caller runs the
    /// due tasks, so they may schedule or cancel freely.
    pub fn advance(&self) -> Vec<TaskHandle> {
        self.lock().advance()
    }

    pub fn tick(&self) -> u64 {
        self.lock().tick()
    }

    pub fn active_tasks(&self) -> usize {
        self.lock().active_tasks()
    }

    pub fn set_refusing(&self, refusing: bool) {
        self.lock().set_refusing(refusing);
    }
}

impl TickScheduler for SharedClock {
    fn schedule_repeating(&mut self, interval_ticks: u64) -> Result<TaskHandle, ScheduleError> {
        self.lock().schedule_repeating(interval_ticks)
    }

    fn cancel(&mut self, handle: TaskHandle) {
        self.lock().cancel(handle);
    }
}
