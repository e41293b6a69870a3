use crate::events::Node;

#[derive(Debug, Clone)]
struct Timer {
    owner: Node,
    due_ms: u64,
    interval_ms: Option<u64>,
    seq: u64,
}

/// Pending timers, at most one per owning node.
#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: Vec<Timer>,
    seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer for `owner`, replacing any pending one.
    pub fn arm(&mut self, owner: Node, due_ms: u64, interval_ms: Option<u64>) {
        self.disarm(owner);
        self.seq += 1;
        self.timers.push(Timer {
            owner,
            due_ms,
            interval_ms,
            seq: self.seq,
        });
    }

    /// Cancel the timer of `owner`. Returns whether one was pending.
    pub fn disarm(&mut self, owner: Node) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.owner != owner);
        self.timers.len() != before
    }

    pub fn is_armed(&self, owner: Node) -> bool {
        self.timers.iter().any(|t| t.owner == owner)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_due(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.due_ms).min()
    }

    /// Take the earliest timer due at `now`.
    ///
    /// Interval timers are rescheduled one interval after `now` (late ticks
    /// are not replayed); one-shot timers are removed.
    pub fn pop_due(&mut self, now: u64) -> Option<Node> {
        let pos = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= now)
            .min_by_key(|(_, t)| (t.due_ms, t.seq))
            .map(|(pos, _)| pos)?;

        let owner = self.timers[pos].owner;
        match self.timers[pos].interval_ms {
            Some(interval) => {
                self.seq += 1;
                let timer = &mut self.timers[pos];
                timer.due_ms = now.saturating_add(interval.max(1));
                timer.seq = self.seq;
            }
            None => {
                self.timers.remove(pos);
            }
        }
        Some(owner)
    }

    /// Drop timers of the step at `removed` and renumber later ones.
    pub(crate) fn remove_index(&mut self, removed: usize) {
        self.timers.retain(|t| match t.owner {
            Node::Step(i) | Node::Badge(i) => i != removed,
            Node::Modal => true,
        });
        for timer in self.timers.iter_mut() {
            timer.owner = match timer.owner {
                Node::Step(i) if i > removed => Node::Step(i - 1),
                Node::Badge(i) if i > removed => Node::Badge(i - 1),
                other => other,
            };
        }
    }

    /// Renumber timers after a step was inserted at `inserted`.
    pub(crate) fn insert_index(&mut self, inserted: usize) {
        for timer in self.timers.iter_mut() {
            timer.owner = match timer.owner {
                Node::Step(i) if i >= inserted => Node::Step(i + 1),
                Node::Badge(i) if i >= inserted => Node::Badge(i + 1),
                other => other,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fires_once() {
        let mut queue = TimerQueue::new();
        queue.arm(Node::Badge(0), 5_000, None);

        assert_eq!(queue.pop_due(4_999), None);
        assert_eq!(queue.pop_due(5_000), Some(Node::Badge(0)));
        assert_eq!(queue.pop_due(10_000), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn interval_reschedules_from_now() {
        let mut queue = TimerQueue::new();
        queue.arm(Node::Step(0), 200, Some(200));

        assert_eq!(queue.pop_due(1_000), Some(Node::Step(0)));
        assert_eq!(queue.next_due(), Some(1_200));
        assert_eq!(queue.pop_due(1_000), None);
    }

    #[test]
    fn rearming_replaces_pending_timer() {
        let mut queue = TimerQueue::new();
        queue.arm(Node::Step(0), 100, None);
        queue.arm(Node::Step(0), 900, None);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_due(500), None);
        assert_eq!(queue.pop_due(900), Some(Node::Step(0)));
    }

    #[test]
    fn earliest_deadline_first() {
        let mut queue = TimerQueue::new();
        queue.arm(Node::Step(0), 300, None);
        queue.arm(Node::Badge(1), 100, None);

        assert_eq!(queue.pop_due(1_000), Some(Node::Badge(1)));
        assert_eq!(queue.pop_due(1_000), Some(Node::Step(0)));
    }

    #[test]
    fn disarm_cancels() {
        let mut queue = TimerQueue::new();
        queue.arm(Node::Badge(2), 100, None);
        assert!(queue.disarm(Node::Badge(2)));
        assert!(!queue.disarm(Node::Badge(2)));
        assert!(!queue.is_armed(Node::Badge(2)));
    }

    #[test]
    fn renumbering_follows_child_list() {
        let mut queue = TimerQueue::new();
        queue.arm(Node::Step(0), 100, None);
        queue.arm(Node::Badge(2), 100, None);

        queue.remove_index(0);
        assert!(queue.is_armed(Node::Badge(1)));
        assert_eq!(queue.len(), 1);

        queue.insert_index(0);
        assert!(queue.is_armed(Node::Badge(2)));
    }
}
