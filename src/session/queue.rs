use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

use tokio::time::Instant;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    deadline: Instant,
    generation: u64,
    key: String,
}

/// Min-heap of deadlines keyed by session key.
///
/// Re-arming a key bumps its generation; heap entries from older
/// generations are skipped when they surface, so each key has at most one
/// live deadline.
#[derive(Debug, Default)]
pub struct DeadlineQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    live: HashMap<String, u64>,
    next_generation: u64,
}

impl DeadlineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the deadline for a key
    pub fn arm(&mut self, key: String, deadline: Instant) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.live.insert(key.clone(), generation);
        self.heap.push(Reverse(Entry {
            deadline,
            generation,
            key,
        }));
    }

    /// Cancel a key's deadline; returns whether one was armed
    pub fn cancel(&mut self, key: &str) -> bool {
        self.live.remove(key).is_some()
    }

    /// Earliest live deadline, discarding stale entries on the way
    pub fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse(entry)) = self.heap.peek() {
            if self.is_live(entry) {
                return Some(entry.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Remove and return every live key whose deadline is at or before `now`
    pub fn pop_due(&mut self, now: Instant) -> Vec<String> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            let Some(Reverse(entry)) = self.heap.pop() else {
                break;
            };
            if self.is_live(&entry) {
                self.live.remove(&entry.key);
                due.push(entry.key);
            }
        }
        due
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn is_live(&self, entry: &Entry) -> bool {
        self.live.get(&entry.key) == Some(&entry.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pops_in_deadline_order() {
        let now = Instant::now();
        let mut queue = DeadlineQueue::new();
        queue.arm("late".to_string(), now + Duration::from_secs(30));
        queue.arm("early".to_string(), now + Duration::from_secs(10));

        assert_eq!(queue.next_deadline(), Some(now + Duration::from_secs(10)));
        assert!(queue.pop_due(now).is_empty());
        assert_eq!(queue.pop_due(now + Duration::from_secs(10)), vec!["early"]);
        assert_eq!(
            queue.pop_due(now + Duration::from_secs(60)),
            vec!["late"]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rearm_replaces_previous_deadline() {
        let now = Instant::now();
        let mut queue = DeadlineQueue::new();
        queue.arm("a".to_string(), now + Duration::from_secs(1));
        queue.arm("a".to_string(), now + Duration::from_secs(100));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_deadline(), Some(now + Duration::from_secs(100)));
        assert!(queue.pop_due(now + Duration::from_secs(50)).is_empty());
        assert_eq!(queue.pop_due(now + Duration::from_secs(100)), vec!["a"]);
        assert!(queue.pop_due(now + Duration::from_secs(1000)).is_empty());
    }

    #[test]
    fn test_cancel() {
        let now = Instant::now();
        let mut queue = DeadlineQueue::new();
        queue.arm("a".to_string(), now);

        assert!(queue.cancel("a"));
        assert!(!queue.cancel("a"));
        assert_eq!(queue.next_deadline(), None);
        assert!(queue.pop_due(now + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_rearm_earlier_fires_once() {
        let now = Instant::now();
        let mut queue = DeadlineQueue::new();
        queue.arm("a".to_string(), now + Duration::from_secs(100));
        queue.arm("a".to_string(), now + Duration::from_secs(1));

        let due = queue.pop_due(now + Duration::from_secs(200));
        assert_eq!(due, vec!["a"]);
    }
}
