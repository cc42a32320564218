use log::trace;
use std::collections::BTreeMap;

/// Opaque handle of a repeating timer registered with a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(pub u64);

/// The host's periodic-callback facility.
///
/// Firings are delivered back to the engine by the host through
/// `ContagionEngine::on_timer`, always on the host's main context and never
/// concurrently.
pub trait Scheduler {
    /// Registers a repeating timer. `interval_ticks` is clamped to at least 1.
    fn schedule_repeating(&mut self, interval_ticks: u32) -> TaskHandle;

    /// Unregisters a timer. Unknown or already cancelled handles are ignored.
    fn cancel(&mut self, handle: TaskHandle);
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    interval: u64,
    next_due: u64,
}

/// A server-tick clock driving repeating timers, for headless hosts and tests.
///
/// A timer first fires on the tick after it was registered and then every
/// `interval` ticks. Timers due on the same tick fire in registration order.
#[derive(Debug, Default)]
pub struct TickScheduler {
    current_tick: u64,
    next_id: u64,
    timers: BTreeMap<TaskHandle, Timer>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.timers.contains_key(&handle)
    }

    pub fn scheduled_count(&self) -> usize {
        self.timers.len()
    }

    /// Moves to the next server tick and returns the handles due on it.
    pub fn advance(&mut self) -> Vec<TaskHandle> {
        self.current_tick += 1;
        let now = self.current_tick;
        let mut due = Vec::new();
        for (handle, timer) in self.timers.iter_mut() {
            if timer.next_due <= now {
                timer.next_due = now + timer.interval;
                due.push(*handle);
            }
        }
        if !due.is_empty() {
            trace!("Server tick {}: {} timer(s) due.", now, due.len());
        }
        due
    }
}

impl Scheduler for TickScheduler {
    fn schedule_repeating(&mut self, interval_ticks: u32) -> TaskHandle {
        self.next_id += 1;
        let handle = TaskHandle(self.next_id);
        let timer = Timer {
            interval: interval_ticks.max(1) as u64,
            next_due: self.current_tick + 1,
        };
        let _ = self.timers.insert(handle, timer);
        handle
    }

    fn cancel(&mut self, handle: TaskHandle) {
        let _ = self.timers.remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_next_tick_then_every_interval() {
        let mut scheduler = TickScheduler::new();
        let handle = scheduler.schedule_repeating(3);
        let fired: Vec<u64> = (0..10)
            .filter_map(|_| {
                let due = scheduler.advance();
                due.contains(&handle).then(|| scheduler.current_tick())
            })
            .collect();
        assert_eq!(fired, vec![1, 4, 7, 10]);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let mut scheduler = TickScheduler::new();
        let handle = scheduler.schedule_repeating(0);
        for _ in 0..3 {
            assert_eq!(scheduler.advance(), vec![handle]);
        }
    }

    #[test]
    fn cancelled_timers_stop_firing() {
        let mut scheduler = TickScheduler::new();
        let handle = scheduler.schedule_repeating(1);
        assert_eq!(scheduler.advance(), vec![handle]);
        scheduler.cancel(handle);
        scheduler.cancel(handle);
        assert!(scheduler.advance().is_empty());
        assert!(!scheduler.is_scheduled(handle));
    }
}
