//! Signal observation for embedders.
//!
//! Components never see each other through the bus; routing between them is
//! done by the flow itself. The bus is the outside view: every dispatched
//! signal is journaled, and listeners attached to a node observe the signals
//! that originate at that node or below it, in bubbling order (origin first,
//! then each ancestor).
//!
//! The journal is bounded. Once it holds [`JOURNAL_CAPACITY`] envelopes the
//! oldest one is dropped for each new one, so a flow that ticks for hours
//! without being drained keeps a fixed footprint.

use std::collections::VecDeque;
use std::fmt;

use crate::events::{Envelope, Node};

/// Callback invoked for each observed envelope.
pub type Listener = Box<dyn FnMut(&Envelope)>;

/// Handle returned by [`SignalBus::listen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Default number of envelopes kept in the journal.
pub const JOURNAL_CAPACITY: usize = 1024;

pub struct SignalBus {
    listeners: Vec<(ListenerId, Node, Listener)>,
    journal: VecDeque<Envelope>,
    capacity: usize,
    next_id: u64,
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::with_journal_capacity(JOURNAL_CAPACITY)
    }
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` envelopes. Zero turns the journal off;
    /// listeners are still called.
    pub fn with_journal_capacity(capacity: usize) -> Self {
        Self {
            listeners: Vec::new(),
            journal: VecDeque::with_capacity(capacity.min(JOURNAL_CAPACITY)),
            capacity,
            next_id: 0,
        }
    }

    pub fn journal_capacity(&self) -> usize {
        self.capacity
    }

    /// Attach a listener to `node`.
    pub fn listen(&mut self, node: Node, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, node, listener));
        id
    }

    /// Detach a listener. Returns `false` if it was not attached.
    pub fn unlisten(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Journal an envelope and deliver it up the containment chain.
    pub(crate) fn publish(&mut self, envelope: Envelope) {
        let mut current = Some(envelope.origin);
        while let Some(node) = current {
            for (_, attached, listener) in self.listeners.iter_mut() {
                if *attached == node {
                    listener(&envelope);
                }
            }
            current = node.parent();
        }
        if self.capacity == 0 {
            return;
        }
        if self.journal.len() >= self.capacity {
            self.journal.pop_front();
        }
        self.journal.push_back(envelope);
    }

    /// Journaled envelopes since the last drain, oldest first.
    pub fn events(&self) -> &VecDeque<Envelope> {
        &self.journal
    }

    /// Drain the journal.
    pub fn take_events(&mut self) -> Vec<Envelope> {
        self.journal.drain(..).collect()
    }

    /// Renumber nodes after the step at `removed` left the flow.
    pub(crate) fn remove_index(&mut self, removed: usize) {
        self.listeners.retain(|(_, node, _)| match node {
            Node::Step(i) | Node::Badge(i) => *i != removed,
            Node::Modal => true,
        });
        for (_, node, _) in self.listeners.iter_mut() {
            *node = match *node {
                Node::Step(i) if i > removed => Node::Step(i - 1),
                Node::Badge(i) if i > removed => Node::Badge(i - 1),
                other => other,
            };
        }
    }

    /// Renumber nodes after a step was inserted at `inserted`.
    pub(crate) fn insert_index(&mut self, inserted: usize) {
        for (_, node, _) in self.listeners.iter_mut() {
            *node = match *node {
                Node::Step(i) if i >= inserted => Node::Step(i + 1),
                Node::Badge(i) if i >= inserted => Node::Badge(i + 1),
                other => other,
            };
        }
    }
}

impl fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBus")
            .field("listener_count", &self.listeners.len())
            .field("journal_len", &self.journal.len())
            .field("journal_capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::to_datetime;
    use crate::events::Signal;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn envelope(origin: Node) -> Envelope {
        stamped(origin, 0)
    }

    fn stamped(origin: Node, at: u64) -> Envelope {
        Envelope {
            origin,
            signal: Signal::Shown,
            at: to_datetime(at),
        }
    }

    fn recorder(bus: &mut SignalBus, node: Node, log: &Rc<RefCell<Vec<String>>>) -> ListenerId {
        let log = Rc::clone(log);
        bus.listen(
            node,
            Box::new(move |env| log.borrow_mut().push(format!("{node} <- {}", env.origin))),
        )
    }

    #[test]
    fn delivers_in_bubbling_order() {
        let mut bus = SignalBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        recorder(&mut bus, Node::Modal, &log);
        recorder(&mut bus, Node::Badge(0), &log);
        recorder(&mut bus, Node::Step(0), &log);

        bus.publish(envelope(Node::Badge(0)));

        assert_eq!(
            *log.borrow(),
            vec![
                "flow-badge[0] <- flow-badge[0]",
                "flow-step[0] <- flow-badge[0]",
                "flow-modal <- flow-badge[0]",
            ]
        );
    }

    #[test]
    fn siblings_do_not_observe_each_other() {
        let mut bus = SignalBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        recorder(&mut bus, Node::Step(1), &log);

        bus.publish(envelope(Node::Step(0)));
        bus.publish(envelope(Node::Badge(0)));

        assert!(log.borrow().is_empty());
        assert_eq!(bus.events().len(), 2);
    }

    #[test]
    fn unlisten_and_drain() {
        let mut bus = SignalBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let id = recorder(&mut bus, Node::Modal, &log);
        assert!(bus.unlisten(id));
        assert!(!bus.unlisten(id));

        bus.publish(envelope(Node::Modal));
        assert!(log.borrow().is_empty());
        assert_eq!(bus.take_events().len(), 1);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn renumbers_on_removal() {
        let mut bus = SignalBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        recorder(&mut bus, Node::Step(0), &log);
        recorder(&mut bus, Node::Step(2), &log);

        bus.remove_index(0);
        bus.publish(envelope(Node::Step(1)));

        assert_eq!(*log.borrow(), vec!["flow-step[2] <- flow-step[1]"]);
    }

    #[test]
    fn full_journal_drops_oldest() {
        let mut bus = SignalBus::with_journal_capacity(3);
        for at in 0..5 {
            bus.publish(stamped(Node::Modal, at));
        }

        let kept: Vec<_> = bus.events().iter().map(|e| e.at).collect();
        assert_eq!(kept, vec![to_datetime(2), to_datetime(3), to_datetime(4)]);
        assert_eq!(bus.take_events().len(), 3);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn zero_capacity_still_notifies_listeners() {
        let mut bus = SignalBus::with_journal_capacity(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        recorder(&mut bus, Node::Modal, &log);

        bus.publish(envelope(Node::Step(0)));

        assert_eq!(*log.borrow(), vec!["flow-modal <- flow-step[0]"]);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn default_capacity_applies() {
        let mut bus = SignalBus::new();
        assert_eq!(bus.journal_capacity(), JOURNAL_CAPACITY);
        for _ in 0..JOURNAL_CAPACITY + 10 {
            bus.publish(envelope(Node::Modal));
        }
        assert_eq!(bus.events().len(), JOURNAL_CAPACITY);
    }
}
