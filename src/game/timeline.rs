use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

/// Logical clock plus a queue of deferred tasks.
///
/// Nothing here sleeps: the owner moves the clock forward and drains the tasks
/// that became due, one at a time, in (due time, insertion order) order.
#[derive(Debug)]
pub struct Timeline<T> {
    now: Duration,
    next_seq: u64,
    pending: BinaryHeap<Reverse<Scheduled<T>>>,
}

#[derive(Debug)]
struct Scheduled<T> {
    due: Duration,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl<T> Timeline<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            pending: BinaryHeap::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Queue `task` to run `delay` after the current logical time.
    pub fn schedule_in(&mut self, delay: Duration, task: T) {
        let due = self.now.saturating_add(delay);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Reverse(Scheduled { due, seq, task }));
    }

    /// Pop the earliest task due at or before `until`, moving the clock to its due time.
    pub fn pop_due(&mut self, until: Duration) -> Option<T> {
        let is_due = self
            .pending
            .peek()
            .is_some_and(|Reverse(next)| next.due <= until);
        if !is_due {
            return None;
        }

        let Reverse(next) = self.pending.pop()?;
        self.now = self.now.max(next.due);
        Some(next.task)
    }

    /// Move the clock to `until` once everything due has been drained.
    pub fn settle_at(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(timeline: &mut Timeline<&'static str>, until: Duration) -> Vec<&'static str> {
        let mut fired = Vec::new();
        while let Some(task) = timeline.pop_due(until) {
            fired.push(task);
        }
        timeline.settle_at(until);
        fired
    }

    #[test]
    fn test_tasks_fire_in_due_order() {
        let mut timeline = Timeline::new();
        timeline.schedule_in(Duration::from_millis(300), "late");
        timeline.schedule_in(Duration::from_millis(100), "early");
        timeline.schedule_in(Duration::from_millis(200), "middle");

        let fired = drain(&mut timeline, Duration::from_millis(1000));
        assert_eq!(fired, vec!["early", "middle", "late"]);
        assert_eq!(timeline.now(), Duration::from_millis(1000));
    }

    #[test]
    fn test_equal_due_times_keep_insertion_order() {
        let mut timeline = Timeline::new();
        timeline.schedule_in(Duration::from_millis(50), "first");
        timeline.schedule_in(Duration::from_millis(50), "second");
        timeline.schedule_in(Duration::from_millis(50), "third");

        assert_eq!(
            drain(&mut timeline, Duration::from_millis(50)),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_tasks_not_yet_due_stay_queued() {
        let mut timeline = Timeline::new();
        timeline.schedule_in(Duration::from_millis(600), "beat");

        assert!(drain(&mut timeline, Duration::from_millis(599)).is_empty());
        assert_eq!(timeline.pending(), 1);

        assert_eq!(drain(&mut timeline, Duration::from_millis(600)), vec!["beat"]);
        assert_eq!(timeline.pending(), 0);
    }

    #[test]
    fn test_delay_is_relative_to_clock() {
        let mut timeline = Timeline::new();
        timeline.settle_at(Duration::from_secs(2));
        timeline.schedule_in(Duration::from_millis(500), "relative");

        assert!(drain(&mut timeline, Duration::from_millis(2499)).is_empty());
        assert_eq!(
            drain(&mut timeline, Duration::from_millis(2500)),
            vec!["relative"]
        );
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut timeline = Timeline::new();
        timeline.schedule_in(Duration::ZERO, "a");
        timeline.schedule_in(Duration::from_secs(1), "b");
        timeline.clear();

        assert!(drain(&mut timeline, Duration::from_secs(10)).is_empty());
        assert_eq!(timeline.pending(), 0);
    }
}
