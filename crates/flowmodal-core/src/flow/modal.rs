//! Flow coordinator: picks the active step, persists that choice and reacts
//! to the intents its steps report.

use serde_json::{json, Value};
use tracing::{debug, info};

use super::{Effect, ModalConfig, Step};
use crate::error::{FlowError, Result};
use crate::events::{Node, Signal, SignalKind};
use crate::storage::FlowStorage;

pub const STORAGE_KEY_STARTED_AT: &str = "started-at";
pub const STORAGE_KEY_ACTIVATED_STEP: &str = "activated-step";
pub const STORAGE_KEY_TIMED_OUT: &str = "timed-out";

#[derive(Debug, Clone)]
pub struct Modal {
    config: ModalConfig,
}

/// Index of the active step, if any.
pub fn active_index(steps: &[Step]) -> Option<usize> {
    steps.iter().position(Step::active)
}

impl Modal {
    pub fn new(config: ModalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModalConfig {
        &self.config
    }

    pub fn deactivated(&self) -> bool {
        self.config.deactivated
    }

    pub(crate) fn set_deactivated(&mut self, deactivated: bool) -> bool {
        let changed = self.config.deactivated != deactivated;
        self.config.deactivated = deactivated;
        changed
    }

    pub(crate) fn handles(kind: SignalKind) -> bool {
        matches!(
            kind,
            SignalKind::FlowStarted | SignalKind::FlowTimedOut | SignalKind::FlowEvaluated
        )
    }

    pub(crate) fn handle(
        &mut self,
        signal: &Signal,
        steps: &[Step],
        storage: &mut dyn FlowStorage,
        now: u64,
    ) -> Result<Vec<Effect>> {
        match *signal {
            Signal::FlowStarted { initial } => {
                let stored = storage
                    .get(STORAGE_KEY_STARTED_AT)?
                    .as_ref()
                    .and_then(Value::as_u64)
                    .filter(|at| *at > 0);
                let started_at = match stored {
                    Some(at) if !initial => at,
                    _ => {
                        info!(namespace = %self.config.storage_namespace, started_at = now, "flow started");
                        storage.set(STORAGE_KEY_STARTED_AT, json!(now))?;
                        now
                    }
                };
                Ok(active_index(steps)
                    .map(|i| Effect::dispatch(Node::Step(i), Signal::Started { started_at }))
                    .into_iter()
                    .collect())
            }
            Signal::FlowTimedOut => {
                info!(namespace = %self.config.storage_namespace, "flow timed out");
                let effects = self.deactivate(steps);
                storage.set(STORAGE_KEY_TIMED_OUT, json!(true))?;
                storage.remove(STORAGE_KEY_STARTED_AT)?;
                storage.remove(STORAGE_KEY_ACTIVATED_STEP)?;
                Ok(effects)
            }
            Signal::FlowEvaluated => {
                if active_index(steps).is_some() {
                    return Ok(Vec::new());
                }
                self.activate(steps, storage)
            }
            ref other => Err(FlowError::SignalMismatch {
                expected: "a coordinator signal",
                actual: other.kind(),
            }),
        }
    }

    /// Activate the step the stored position advances to.
    pub(crate) fn activate(
        &self,
        steps: &[Step],
        storage: &mut dyn FlowStorage,
    ) -> Result<Vec<Effect>> {
        if self.config.deactivated || Self::timed_out(storage)? {
            return Ok(Vec::new());
        }

        let last = storage
            .get(STORAGE_KEY_ACTIVATED_STEP)?
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|i| usize::try_from(i).ok());
        let Some(next) = Self::advance(steps, last, storage)? else {
            return Ok(Vec::new());
        };

        let initial = last != Some(next);
        debug!(step = next, initial, "activating step");
        Ok(vec![Effect::dispatch(
            Node::Step(next),
            Signal::Activate { initial },
        )])
    }

    /// Deactivate the active step, if any.
    pub(crate) fn deactivate(&self, steps: &[Step]) -> Vec<Effect> {
        active_index(steps)
            .map(|i| Effect::dispatch(Node::Step(i), Signal::Deactivate))
            .into_iter()
            .collect()
    }

    /// Walk forward from `last` over ready, skippable steps and persist where
    /// the walk stopped.
    fn advance(
        steps: &[Step],
        last: Option<usize>,
        storage: &mut dyn FlowStorage,
    ) -> Result<Option<usize>> {
        let (mut candidate, start) = match last {
            Some(i) if i < steps.len() => (Some(i), i + 1),
            _ => (None, 0),
        };

        for (i, step) in steps.iter().enumerate().skip(start) {
            if !step.ready() {
                break;
            }
            candidate = Some(i);
            if !step.skippable() {
                break;
            }
        }

        if let Some(index) = candidate {
            storage.set(STORAGE_KEY_ACTIVATED_STEP, json!(index))?;
        }
        Ok(candidate)
    }

    fn timed_out(storage: &mut dyn FlowStorage) -> Result<bool> {
        Ok(matches!(
            storage.get(STORAGE_KEY_TIMED_OUT)?,
            Some(Value::Bool(true))
        ))
    }

    /// Every step must time out before the stored state does.
    pub(crate) fn validate(&self, steps: &[Step]) -> Result<()> {
        steps
            .iter()
            .try_for_each(|step| self.config.validate_step(step.config()))
    }
}
