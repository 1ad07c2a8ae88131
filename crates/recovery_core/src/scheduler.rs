//! Lifecycle of the periodic heal task.

use tracing::debug;

use crate::error::ScheduleError;

/// Host-issued identifier of a repeating task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(pub u64);

/// A host facility that runs a callback every `interval` ticks.
pub trait TickScheduler: Send {
    fn schedule_repeating(&mut self, interval_ticks: u64) -> Result<TaskHandle, ScheduleError>;

    fn cancel(&mut self, handle: TaskHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running { interval: u64, handle: TaskHandle },
}

/// Owns at most one repeating task on the host scheduler.
pub struct SchedulerController {
    scheduler: Box<dyn TickScheduler>,
    state: SchedulerState,
}

impl SchedulerController {
    pub fn new(scheduler: impl TickScheduler + 'static) -> Self {
        Self {
            scheduler: Box::new(scheduler),
            state: SchedulerState::Stopped,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running { .. })
    }

    pub fn interval(&self) -> Option<u64> {
        match self.state {
            SchedulerState::Running { interval, .. } => Some(interval),
            SchedulerState::Stopped => None,
        }
    }

    pub fn handle(&self) -> Option<TaskHandle> {
        match self.state {
            SchedulerState::Running { handle, .. } => Some(handle),
            SchedulerState::Stopped => None,
        }
    }

    /// Starts the task if it is stopped. A running task with a different
    /// interval is replaced; one with the same interval is left alone.
    pub fn ensure_running(&mut self, interval: u64) -> Result<(), ScheduleError> {
        match self.state {
            SchedulerState::Running { interval: current, .. } if current == interval => Ok(()),
            SchedulerState::Running { .. } => self.restart(interval),
            SchedulerState::Stopped => self.start(interval),
        }
    }

    pub fn ensure_stopped(&mut self) {
        if let SchedulerState::Running { handle, .. } = self.state {
            self.scheduler.cancel(handle);
            self.state = SchedulerState::Stopped;
            debug!(target: "recovery.scheduler", task = handle.0, "heal task stopped");
        }
    }

    /// Moves a running task to a new interval. Does nothing when stopped.
    pub fn reschedule(&mut self, interval: u64) -> Result<(), ScheduleError> {
        match self.state {
            SchedulerState::Running { interval: current, .. } if current != interval => {
                self.restart(interval)
            }
            _ => Ok(()),
        }
    }

    fn restart(&mut self, interval: u64) -> Result<(), ScheduleError> {
        self.ensure_stopped();
        self.start(interval)
    }

    fn start(&mut self, interval: u64) -> Result<(), ScheduleError> {
        let handle = self.scheduler.schedule_repeating(interval)?;
        self.state = SchedulerState::Running { interval, handle };
        debug!(target: "recovery.scheduler", task = handle.0, interval, "heal task scheduled");
        Ok(())
    }
}

impl Drop for SchedulerController {
    fn drop(&mut self) {
        self.ensure_stopped();
    }
}
