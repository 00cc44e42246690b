//! Timer queue: the core's model of `setTimeout` / `setInterval`.
//!
//! Components never sleep. They register deadlines here and the host polls
//! the queue with the current time. Because every timer a component creates
//! lives in its queue, teardown can prove nothing is left armed.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use worldview_env::TimerId;

#[derive(Debug, Clone)]
struct TimerEntry<T> {
    deadline: Duration,
    repeat: Option<Duration>,
    payload: T,
}

/// Ordered set of pending timeouts and intervals carrying a payload `T`.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    by_deadline: BTreeMap<(Duration, TimerId), ()>,
    entries: HashMap<TimerId, TimerEntry<T>>,
    next_id: u64,
}

impl<T: Clone> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            by_deadline: BTreeMap::new(),
            entries: HashMap::new(),
            next_id: 0,
        }
    }

    fn allocate(&mut self) -> TimerId {
        self.next_id += 1;
        TimerId(self.next_id)
    }

    fn insert(&mut self, deadline: Duration, repeat: Option<Duration>, payload: T) -> TimerId {
        let id = self.allocate();
        self.by_deadline.insert((deadline, id), ());
        self.entries.insert(id, TimerEntry { deadline, repeat, payload });
        id
    }

    /// Fires once at `now + delay`.
    pub fn set_timeout(&mut self, now: Duration, delay: Duration, payload: T) -> TimerId {
        self.insert(now + delay, None, payload)
    }

    /// Fires every `period`, first at `now + period`.
    ///
    /// A zero period is clamped to one millisecond so polling always terminates.
    pub fn set_interval(&mut self, now: Duration, period: Duration, payload: T) -> TimerId {
        let period = period.max(Duration::from_millis(1));
        self.insert(now + period, Some(period), payload)
    }

    /// Cancels a timer. Returns false when it had already fired or been cleared.
    pub fn clear(&mut self, id: TimerId) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                self.by_deadline.remove(&(entry.deadline, id));
                true
            }
            None => false,
        }
    }

    /// Cancels every timer.
    pub fn clear_all(&mut self) {
        self.by_deadline.clear();
        self.entries.clear();
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.by_deadline.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Removes and returns every timer due at `now`, in deadline order.
    ///
    /// Intervals are rescheduled one period after their previous deadline;
    /// an interval that fell several periods behind fires once and skips
    /// ahead rather than bursting.
    pub fn pop_due(&mut self, now: Duration) -> Vec<(TimerId, T)> {
        let mut fired = Vec::new();
        while let Some(&(deadline, id)) = self.by_deadline.keys().next() {
            if deadline > now {
                break;
            }
            self.by_deadline.remove(&(deadline, id));
            let Some(entry) = self.entries.remove(&id) else {
                continue;
            };
            fired.push((id, entry.payload.clone()));
            if let Some(period) = entry.repeat {
                let mut next = deadline + period;
                while next <= now {
                    next += period;
                }
                self.by_deadline.insert((next, id), ());
                self.entries.insert(id, TimerEntry { deadline: next, ..entry });
            }
        }
        fired
    }
}

impl<T: Clone> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
