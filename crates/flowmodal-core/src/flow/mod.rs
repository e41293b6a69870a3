//! Flow runtime.
//!
//! A [`Flow`] owns one coordinator ([`Modal`]), its ordered [`Step`]s and
//! each step's optional [`Badge`]. Components never call each other: a
//! handler consumes one signal, updates its own state, and returns
//! effects. The flow delivers dispatched signals depth-first in emission
//! order, so every public operation returns with the whole tree settled.
//!
//! ```text
//! Modal --activate/deactivate/started------> Step(i) --activate/deactivate/shown/hidden/ticked--> Badge(i)
//! Modal <--flow-started/timed-out/evaluated-- Step(i) <-------------------shown-------------------- Badge(i)
//! ```
//!
//! Timers are wall-clock deadlines owned by a node. They only fire from
//! [`Flow::tick`].

mod badge;
mod config;
mod modal;
mod step;
mod view;

pub use badge::Badge;
pub use config::{BadgeConfig, ModalConfig, StepConfig};
pub use modal::{
    Modal, STORAGE_KEY_ACTIVATED_STEP, STORAGE_KEY_STARTED_AT, STORAGE_KEY_TIMED_OUT,
};
pub use step::Step;
pub use view::{BadgeView, FlowView, HintView, StepView};

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::bus::{ListenerId, SignalBus, JOURNAL_CAPACITY};
use crate::clock::{to_datetime, SharedClock, SystemClock};
use crate::error::{FlowError, Result};
use crate::events::{ClickArea, Envelope, Node, Signal};
use crate::storage::{CascadeStorage, FlowStorage};
use crate::timer::TimerQueue;

/// What a handler asks the flow to do on its behalf.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    /// Deliver `signal` to `target`.
    Dispatch { target: Node, signal: Signal },
    /// Arm the emitting node's timer.
    Arm {
        delay_ms: u64,
        interval_ms: Option<u64>,
    },
    /// Cancel the emitting node's timer.
    Disarm,
}

impl Effect {
    pub(crate) fn dispatch(target: Node, signal: Signal) -> Self {
        Effect::Dispatch { target, signal }
    }
}

/// The persisted part of a flow, as read back from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistedState {
    pub started_at: Option<u64>,
    pub activated_step: Option<usize>,
    pub timed_out: bool,
}

/// Builder for [`Flow`].
pub struct FlowBuilder {
    modal: ModalConfig,
    steps: Vec<(StepConfig, Option<BadgeConfig>)>,
    clock: Option<SharedClock>,
    storage: Option<Box<dyn FlowStorage>>,
    database: Option<PathBuf>,
    journal_capacity: usize,
}

impl FlowBuilder {
    pub fn new(modal: ModalConfig) -> Self {
        Self {
            modal,
            steps: Vec::new(),
            clock: None,
            storage: None,
            database: None,
            journal_capacity: JOURNAL_CAPACITY,
        }
    }

    pub fn step(mut self, step: StepConfig) -> Self {
        self.steps.push((step, None));
        self
    }

    pub fn step_with_badge(mut self, step: StepConfig, badge: BadgeConfig) -> Self {
        self.steps.push((step, Some(badge)));
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use `storage` instead of opening the configured tiers.
    pub fn storage(mut self, storage: impl FlowStorage + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    /// SQLite file backing the `local` tier.
    pub fn database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = Some(path.into());
        self
    }

    /// Number of dispatched signals kept for [`Flow::events`]. Zero keeps none.
    pub fn journal_capacity(mut self, capacity: usize) -> Self {
        self.journal_capacity = capacity;
        self
    }

    pub fn modal_config(&self) -> &ModalConfig {
        &self.modal
    }

    /// Validate the tree, open storage and run the first activation.
    ///
    /// # Errors
    /// Fails before anything activates when a step outlives the storage
    /// duration, a badge format is invalid, or no storage tier opens.
    pub fn build(self) -> Result<Flow> {
        let modal = Modal::new(self.modal);
        let steps = self
            .steps
            .into_iter()
            .map(|(step, badge)| -> Result<Step> {
                Ok(Step::new(step, badge.map(Badge::new).transpose()?))
            })
            .collect::<Result<Vec<_>>>()?;
        modal.validate(&steps)?;

        let clock = self.clock.unwrap_or_else(|| Rc::new(SystemClock));
        let storage: Box<dyn FlowStorage> = match self.storage {
            Some(storage) => storage,
            None => {
                let config = modal.config();
                let namespace = config.storage_namespace.clone();
                let retention = config.storage_duration_ms;
                let cascade = match self.database {
                    Some(path) => CascadeStorage::open_at(
                        &path,
                        &config.storages,
                        namespace,
                        retention,
                        clock.clone(),
                    )?,
                    None => CascadeStorage::open(
                        &config.storages,
                        namespace,
                        retention,
                        clock.clone(),
                    )?,
                };
                Box::new(cascade)
            }
        };

        let mut flow = Flow {
            modal,
            steps,
            storage,
            clock,
            timers: TimerQueue::new(),
            bus: SignalBus::with_journal_capacity(self.journal_capacity),
        };
        debug!(steps = flow.steps.len(), "flow mounted");
        flow.activate()?;
        Ok(flow)
    }
}

/// A mounted coordinator with its steps.
pub struct Flow {
    modal: Modal,
    steps: Vec<Step>,
    storage: Box<dyn FlowStorage>,
    clock: SharedClock,
    timers: TimerQueue,
    bus: SignalBus,
}

impl Flow {
    pub fn builder(modal: ModalConfig) -> FlowBuilder {
        FlowBuilder::new(modal)
    }

    // =========================================================================
    // Routing
    // =========================================================================

    fn has_node(&self, node: Node) -> bool {
        match node {
            Node::Modal => true,
            Node::Step(i) => i < self.steps.len(),
            Node::Badge(i) => self.steps.get(i).is_some_and(|s| s.badge().is_some()),
        }
    }

    fn deliver(&mut self, target: Node, signal: Signal) -> Result<()> {
        let kind = signal.kind();
        if !self.has_node(target) {
            debug!(%target, signal = %kind, "no receiver");
            return Ok(());
        }

        let now = self.clock.now_ms();
        debug!(%target, signal = %kind, "deliver");
        self.bus.publish(Envelope {
            origin: target,
            signal: signal.clone(),
            at: to_datetime(now),
        });

        let effects = match target {
            Node::Modal if Modal::handles(kind) => {
                self.modal
                    .handle(&signal, &self.steps, self.storage.as_mut(), now)?
            }
            Node::Step(i) if Step::handles(kind) => self.steps[i].handle(i, &signal, now)?,
            Node::Badge(i) if Badge::handles(kind) => match self.steps[i].badge_mut() {
                Some(badge) => badge.handle(&signal)?,
                None => Vec::new(),
            },
            _ => Vec::new(),
        };
        self.apply(target, effects)
    }

    fn apply(&mut self, owner: Node, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::Dispatch { target, signal } => self.deliver(target, signal)?,
                Effect::Arm {
                    delay_ms,
                    interval_ms,
                } => {
                    let due = self.clock.now_ms().saturating_add(delay_ms);
                    self.timers.arm(owner, due, interval_ms);
                }
                Effect::Disarm => {
                    self.timers.disarm(owner);
                }
            }
        }
        Ok(())
    }

    fn activate(&mut self) -> Result<()> {
        let effects = self.modal.activate(&self.steps, self.storage.as_mut())?;
        self.apply(Node::Modal, effects)
    }

    fn deactivate(&mut self) -> Result<()> {
        let effects = self.modal.deactivate(&self.steps);
        self.apply(Node::Modal, effects)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.steps.len() {
            Ok(())
        } else {
            Err(FlowError::OutOfBounds {
                index,
                len: self.steps.len(),
            })
        }
    }

    // =========================================================================
    // Coordinator operations
    // =========================================================================

    /// Fire every timer due at the current clock reading. Returns how many
    /// fired.
    pub fn tick(&mut self) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut fired = 0;
        while let Some(owner) = self.timers.pop_due(now) {
            fired += 1;
            let effects = match owner {
                Node::Step(i) => self
                    .steps
                    .get(i)
                    .map(|step| step.on_timer(i, now))
                    .unwrap_or_default(),
                Node::Badge(i) => self
                    .steps
                    .get_mut(i)
                    .and_then(Step::badge_mut)
                    .map(Badge::on_timer)
                    .unwrap_or_default(),
                Node::Modal => Vec::new(),
            };
            self.apply(owner, effects)?;
        }
        Ok(fired)
    }

    /// Deactivate the current step and activate again. With `force`, the
    /// stored state is wiped first so the flow restarts from the beginning.
    pub fn refresh_state(&mut self, force: bool) -> Result<()> {
        if force {
            info!(namespace = %self.modal.config().storage_namespace, "flow state reset");
            self.storage.reset()?;
        }
        self.deactivate()?;
        self.activate()
    }

    pub fn set_deactivated(&mut self, deactivated: bool) -> Result<()> {
        if !self.modal.set_deactivated(deactivated) {
            return Ok(());
        }
        if deactivated {
            self.deactivate()
        } else {
            self.activate()
        }
    }

    // =========================================================================
    // Step operations
    // =========================================================================

    pub fn hide_modal(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let effects = self.steps[index].hide_modal(index)?;
        self.apply(Node::Step(index), effects)
    }

    pub fn show_modal(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let effects = self.steps[index].show_modal(index)?;
        self.apply(Node::Step(index), effects)
    }

    /// Simulate a click on `area` of `node`. Returns `false` when nothing
    /// clickable was there.
    pub fn click(&mut self, node: Node, area: ClickArea) -> Result<bool> {
        let effects = match node {
            Node::Modal => None,
            Node::Step(i) => {
                self.check_index(i)?;
                self.steps[i].click(i, area)
            }
            Node::Badge(i) => {
                self.check_index(i)?;
                self.steps[i].badge().and_then(|b| b.click(i, area))
            }
        };
        match effects {
            Some(effects) => {
                self.apply(node, effects)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn set_ready(&mut self, index: usize, ready: bool) -> Result<()> {
        self.check_index(index)?;
        let effects = self.steps[index].set_ready(ready);
        self.apply(Node::Step(index), effects)
    }

    pub fn set_skippable(&mut self, index: usize, skippable: bool) -> Result<()> {
        self.check_index(index)?;
        self.steps[index].set_skippable(skippable);
        Ok(())
    }

    /// Change a step's timeout, rejecting one longer than the storage duration.
    pub fn set_timeout_duration(&mut self, index: usize, timeout_ms: Option<u64>) -> Result<()> {
        self.check_index(index)?;
        let mut config = self.steps[index].config().clone();
        config.timeout_duration_ms = timeout_ms;
        self.modal.config().validate_step(&config)?;

        self.steps[index].set_timeout_duration(timeout_ms);
        if timeout_ms.is_none() {
            self.timers.disarm(Node::Step(index));
        }
        Ok(())
    }

    /// Insert a step at `index`, shifting later steps back.
    pub fn insert_step(
        &mut self,
        index: usize,
        step: StepConfig,
        badge: Option<BadgeConfig>,
    ) -> Result<()> {
        if index > self.steps.len() {
            return Err(FlowError::OutOfBounds {
                index,
                len: self.steps.len(),
            });
        }
        self.modal.config().validate_step(&step)?;
        let badge = badge.map(Badge::new).transpose()?;
        let ready = step.ready;

        self.timers.insert_index(index);
        self.bus.insert_index(index);
        self.steps.insert(index, Step::new(step, badge));
        debug!(step = index, "step inserted");

        if ready {
            self.apply(
                Node::Step(index),
                vec![Effect::dispatch(Node::Modal, Signal::FlowEvaluated)],
            )?;
        }
        Ok(())
    }

    /// Remove the step at `index`, deactivating it first when active.
    pub fn remove_step(&mut self, index: usize) -> Result<StepConfig> {
        self.check_index(index)?;
        if self.steps[index].active() {
            self.deliver(Node::Step(index), Signal::Deactivate)?;
        }
        self.timers.remove_index(index);
        self.bus.remove_index(index);
        let step = self.steps.remove(index);
        debug!(step = index, "step removed");
        Ok(step.config().clone())
    }

    /// Put a badge into the step's slot, replacing any previous one.
    pub fn set_badge(&mut self, index: usize, badge: Option<BadgeConfig>) -> Result<()> {
        self.check_index(index)?;
        let badge = badge.map(Badge::new).transpose()?;
        self.timers.disarm(Node::Badge(index));
        let effects = self.steps[index].set_badge(index, badge);
        self.apply(Node::Step(index), effects)
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Observe signals dispatched on `node` or any node below it.
    pub fn listen(&mut self, node: Node, listener: impl FnMut(&Envelope) + 'static) -> ListenerId {
        self.bus.listen(node, Box::new(listener))
    }

    pub fn unlisten(&mut self, id: ListenerId) -> bool {
        self.bus.unlisten(id)
    }

    /// Signals dispatched since the journal was last drained, oldest first.
    /// Only the most recent ones are kept; see [`FlowBuilder::journal_capacity`].
    pub fn events(&self) -> &VecDeque<Envelope> {
        self.bus.events()
    }

    pub fn take_events(&mut self) -> Vec<Envelope> {
        self.bus.take_events()
    }

    /// Some step is active.
    pub fn active(&self) -> bool {
        self.activated_step_index().is_some()
    }

    /// The active step's modal is visible.
    pub fn visible(&self) -> bool {
        self.activated_step_index()
            .is_some_and(|i| self.steps[i].visible())
    }

    pub fn activated_step_index(&self) -> Option<usize> {
        modal::active_index(&self.steps)
    }

    pub fn deactivated(&self) -> bool {
        self.modal.deactivated()
    }

    pub fn config(&self) -> &ModalConfig {
        self.modal.config()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Earliest pending timer deadline, in epoch milliseconds.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_due()
    }

    /// Read the stored progress back.
    pub fn persisted(&mut self) -> Result<PersistedState> {
        let started_at = self
            .storage
            .get(STORAGE_KEY_STARTED_AT)?
            .as_ref()
            .and_then(Value::as_u64);
        let activated_step = self
            .storage
            .get(STORAGE_KEY_ACTIVATED_STEP)?
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|i| usize::try_from(i).ok());
        let timed_out = matches!(
            self.storage.get(STORAGE_KEY_TIMED_OUT)?,
            Some(Value::Bool(true))
        );
        Ok(PersistedState {
            started_at,
            activated_step,
            timed_out,
        })
    }

    /// Snapshot of the derived display state.
    pub fn render(&self) -> FlowView {
        let now = self.clock.now_ms();
        FlowView {
            deactivated: self.deactivated(),
            active: self.active(),
            visible: self.visible(),
            activated_step_index: self.activated_step_index(),
            steps: self
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| StepView::new(i, step, now))
                .collect(),
        }
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("modal", &self.modal)
            .field("steps", &self.steps)
            .field("timers", &self.timers)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
