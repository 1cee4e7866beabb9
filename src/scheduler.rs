use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Deferred work owned by the voice layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TimerTask {
    /// Try `start()` again on the current recognition session
    RestartSession,
    /// Throw the recognition session away and build a fresh one
    RecreateSession,
    /// End of the command gate's cooldown window
    CooldownElapsed,
}

/// Opaque handle for cancelling a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

/// Cancellable one-shot timers on a monotonic clock.
///
/// Time is a `Duration` since the event loop started; the caller supplies
/// `now` so tests can drive it deterministically. Tasks due at the same
/// instant fire in scheduling order.
#[derive(Debug)]
pub struct Scheduler<T> {
    next_id: u64,
    queue: BTreeMap<(Duration, TaskHandle), T>,
    deadlines: HashMap<TaskHandle, Duration>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, now: Duration, delay: Duration, task: T) -> TaskHandle {
        self.next_id += 1;
        let handle = TaskHandle(self.next_id);
        let deadline = now + delay;
        self.queue.insert((deadline, handle), task);
        self.deadlines.insert(handle, deadline);
        handle
    }

    /// Returns false when the task already fired or was cancelled
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        match self.deadlines.remove(&handle) {
            Some(deadline) => self.queue.remove(&(deadline, handle)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.deadlines.contains_key(&handle)
    }

    pub fn deadline(&self, handle: TaskHandle) -> Option<Duration> {
        self.deadlines.get(&handle).copied()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return the earliest task due at or before `now`
    pub fn pop_due(&mut self, now: Duration) -> Option<(TaskHandle, T)> {
        let key = *self.queue.keys().next()?;
        if key.0 > now {
            return None;
        }
        self.deadlines.remove(&key.1);
        self.queue.remove(&key).map(|task| (key.1, task))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T: PartialEq> Scheduler<T> {
    /// Number of pending tasks equal to `task`
    pub fn count(&self, task: &T) -> usize {
        self.queue.values().filter(|t| *t == task).count()
    }
}
