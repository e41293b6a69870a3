//! Step state machine.
//!
//! ```text
//! inactive --activate--> active --shown--> active+visible --hidden--> active+hiding
//!    ^                                                                      |
//!    +-------------------------------deactivate-----------------------------+
//! ```
//!
//! On the initial path the modal is shown right away and the coordinator only
//! hears `flow-started` once the user hides it. On a restored path the
//! coordinator is told immediately and the badge takes the modal's place.

use tracing::debug;

use super::{Badge, Effect, StepConfig};
use crate::error::{FlowError, Result};
use crate::events::{ClickArea, Node, Signal, SignalKind};
use crate::timer::{Countdown, TIMER_INTERVAL_MS};

#[derive(Debug, Clone)]
pub struct Step {
    config: StepConfig,
    badge: Option<Badge>,
    initial: bool,
    active: bool,
    visible: bool,
    hiding: bool,
    started_at: Option<u64>,
}

impl Step {
    pub fn new(config: StepConfig, badge: Option<Badge>) -> Self {
        Self {
            config,
            badge,
            initial: false,
            active: false,
            visible: false,
            hiding: false,
            started_at: None,
        }
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    pub fn badge(&self) -> Option<&Badge> {
        self.badge.as_ref()
    }

    pub(crate) fn badge_mut(&mut self) -> Option<&mut Badge> {
        self.badge.as_mut()
    }

    pub fn ready(&self) -> bool {
        self.config.ready
    }

    pub fn skippable(&self) -> bool {
        self.config.skippable
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn hiding(&self) -> bool {
        self.hiding
    }

    pub fn started_at(&self) -> Option<u64> {
        self.started_at
    }

    /// Running countdown, if the step has a timeout and has been started.
    pub fn countdown(&self) -> Option<Countdown> {
        Some(Countdown::new(
            self.started_at?,
            self.config.timeout_duration_ms?,
        ))
    }

    pub(crate) fn handles(kind: SignalKind) -> bool {
        matches!(
            kind,
            SignalKind::Activate
                | SignalKind::Deactivate
                | SignalKind::Shown
                | SignalKind::Hidden
                | SignalKind::Started
        )
    }

    pub(crate) fn handle(&mut self, index: usize, signal: &Signal, now: u64) -> Result<Vec<Effect>> {
        let badge = Node::Badge(index);
        let mut effects = Vec::new();

        match *signal {
            Signal::Activate { initial } => {
                self.initial = initial;
                self.active = true;

                effects.push(Effect::dispatch(badge, Signal::Activate { initial }));
                if initial {
                    effects.push(Effect::dispatch(Node::Step(index), Signal::Shown));
                } else {
                    effects.push(Effect::dispatch(
                        Node::Modal,
                        Signal::FlowStarted { initial: false },
                    ));
                    effects.push(Effect::dispatch(badge, Signal::Shown));
                }
            }
            Signal::Deactivate => {
                self.active = false;
                self.visible = false;
                self.hiding = false;
                self.started_at = None;
                effects.push(Effect::Disarm);
                effects.push(Effect::dispatch(badge, Signal::Deactivate));
            }
            Signal::Shown => {
                self.visible = true;
                self.hiding = false;
            }
            Signal::Hidden => {
                if self.initial {
                    effects.push(Effect::dispatch(
                        Node::Modal,
                        Signal::FlowStarted { initial: true },
                    ));
                    self.initial = false;
                }
                self.visible = false;
                self.hiding = true;
            }
            Signal::Started { started_at } => {
                if self.config.timeout_duration_ms.is_none() {
                    return Ok(effects);
                }
                self.started_at = Some(started_at);
                effects.push(Effect::Arm {
                    delay_ms: TIMER_INTERVAL_MS,
                    interval_ms: Some(TIMER_INTERVAL_MS),
                });
                effects.extend(self.tick(index, now));
            }
            ref other => {
                return Err(FlowError::SignalMismatch {
                    expected: "a step signal",
                    actual: other.kind(),
                })
            }
        }
        Ok(effects)
    }

    /// The countdown interval fired.
    pub(crate) fn on_timer(&self, index: usize, now: u64) -> Vec<Effect> {
        self.tick(index, now)
    }

    /// Report the remaining time to the badge, and end the flow once it is
    /// used up.
    fn tick(&self, index: usize, now: u64) -> Vec<Effect> {
        let Some(countdown) = self.countdown() else {
            return Vec::new();
        };
        let remaining_time = countdown.remaining_ms(now);
        let mut effects = vec![Effect::dispatch(
            Node::Badge(index),
            Signal::Ticked { remaining_time },
        )];
        if remaining_time == 0 {
            debug!(step = index, "countdown over");
            effects.push(Effect::dispatch(Node::Badge(index), Signal::Deactivate));
            effects.push(Effect::dispatch(Node::Modal, Signal::FlowTimedOut));
        }
        effects
    }

    pub(crate) fn hide_modal(&self, index: usize) -> Result<Vec<Effect>> {
        if !self.active {
            return Err(FlowError::IllegalState(
                "Cannot hide <flow-step> while it is not active.".into(),
            ));
        }
        if !self.visible {
            return Ok(Vec::new());
        }
        Ok(Self::hide_sequence(index))
    }

    pub(crate) fn show_modal(&self, index: usize) -> Result<Vec<Effect>> {
        if !self.active {
            return Err(FlowError::IllegalState(
                "Cannot show <flow-step> while it is not active.".into(),
            ));
        }
        if self.visible {
            return Ok(Vec::new());
        }
        Ok(vec![
            Effect::dispatch(Node::Badge(index), Signal::Hidden),
            Effect::dispatch(Node::Step(index), Signal::Shown),
        ])
    }

    fn hide_sequence(index: usize) -> Vec<Effect> {
        vec![
            Effect::dispatch(Node::Step(index), Signal::Hidden),
            Effect::dispatch(Node::Badge(index), Signal::Shown),
        ]
    }

    /// Effects of a click on `area`, or `None` when the click hit nothing.
    pub(crate) fn click(&self, index: usize, area: ClickArea) -> Option<Vec<Effect>> {
        let on_screen = self.active && self.visible;
        let hides = match area {
            ClickArea::Backdrop if on_screen && self.config.backdrop => true,
            ClickArea::HideIcon if on_screen && self.config.hide_button_icon.is_some() => true,
            ClickArea::Content if on_screen => false,
            _ => return None,
        };

        let mut effects = vec![Effect::dispatch(Node::Step(index), Signal::Clicked { area })];
        if hides {
            effects.extend(Self::hide_sequence(index));
        }
        Some(effects)
    }

    /// A ready flag that turns on asks the coordinator to re-evaluate.
    pub(crate) fn set_ready(&mut self, ready: bool) -> Vec<Effect> {
        let changed = self.config.ready != ready;
        self.config.ready = ready;
        if changed && ready {
            vec![Effect::dispatch(Node::Modal, Signal::FlowEvaluated)]
        } else {
            Vec::new()
        }
    }

    pub(crate) fn set_skippable(&mut self, skippable: bool) {
        self.config.skippable = skippable;
    }

    pub(crate) fn set_timeout_duration(&mut self, timeout_ms: Option<u64>) {
        self.config.timeout_duration_ms = timeout_ms;
    }

    /// Replace the badge. An active step brings the new badge up to date.
    pub(crate) fn set_badge(&mut self, index: usize, badge: Option<Badge>) -> Vec<Effect> {
        self.badge = badge;
        if !self.active || self.badge.is_none() {
            return Vec::new();
        }

        let node = Node::Badge(index);
        let mut effects = vec![Effect::dispatch(
            node,
            Signal::Activate {
                initial: self.initial,
            },
        )];
        if !self.initial {
            effects.push(Effect::dispatch(node, Signal::Shown));
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(config: StepConfig) -> Step {
        Step::new(config, None)
    }

    #[test]
    fn initial_activation_shows_the_modal() {
        let mut s = step(StepConfig::ready());
        let effects = s.handle(0, &Signal::Activate { initial: true }, 0).unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::dispatch(Node::Badge(0), Signal::Activate { initial: true }),
                Effect::dispatch(Node::Step(0), Signal::Shown),
            ]
        );
        assert!(s.active());
    }

    #[test]
    fn restored_activation_starts_the_flow_and_shows_the_badge() {
        let mut s = step(StepConfig::ready());
        let effects = s.handle(1, &Signal::Activate { initial: false }, 0).unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::dispatch(Node::Badge(1), Signal::Activate { initial: false }),
                Effect::dispatch(Node::Modal, Signal::FlowStarted { initial: false }),
                Effect::dispatch(Node::Badge(1), Signal::Shown),
            ]
        );
    }

    #[test]
    fn first_hide_starts_the_flow_once() {
        let mut s = step(StepConfig::ready());
        s.handle(0, &Signal::Activate { initial: true }, 0).unwrap();
        s.handle(0, &Signal::Shown, 0).unwrap();

        let effects = s.handle(0, &Signal::Hidden, 0).unwrap();
        assert_eq!(
            effects,
            vec![Effect::dispatch(Node::Modal, Signal::FlowStarted { initial: true })]
        );
        assert!(!s.visible() && s.hiding());

        s.handle(0, &Signal::Shown, 0).unwrap();
        assert!(s.handle(0, &Signal::Hidden, 0).unwrap().is_empty());
    }

    #[test]
    fn started_without_timeout_is_a_no_op() {
        let mut s = step(StepConfig::ready());
        assert!(s
            .handle(0, &Signal::Started { started_at: 10 }, 10)
            .unwrap()
            .is_empty());
        assert_eq!(s.started_at(), None);
    }

    #[test]
    fn started_arms_countdown_and_ticks() {
        let mut s = step(StepConfig::ready().with_timeout(1_000));
        let effects = s.handle(0, &Signal::Started { started_at: 100 }, 400).unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::Arm {
                    delay_ms: 200,
                    interval_ms: Some(200)
                },
                Effect::dispatch(Node::Badge(0), Signal::Ticked { remaining_time: 700 }),
            ]
        );
    }

    #[test]
    fn expired_start_times_out_immediately() {
        let mut s = step(StepConfig::ready().with_timeout(1_000));
        let effects = s.handle(0, &Signal::Started { started_at: 0 }, 5_000).unwrap();
        assert_eq!(
            &effects[1..],
            &[
                Effect::dispatch(Node::Badge(0), Signal::Ticked { remaining_time: 0 }),
                Effect::dispatch(Node::Badge(0), Signal::Deactivate),
                Effect::dispatch(Node::Modal, Signal::FlowTimedOut),
            ]
        );
    }

    #[test]
    fn deactivate_resets_and_disarms() {
        let mut s = step(StepConfig::ready().with_timeout(1_000));
        s.handle(0, &Signal::Activate { initial: true }, 0).unwrap();
        s.handle(0, &Signal::Shown, 0).unwrap();
        s.handle(0, &Signal::Started { started_at: 0 }, 0).unwrap();

        let effects = s.handle(0, &Signal::Deactivate, 0).unwrap();
        assert_eq!(effects[0], Effect::Disarm);
        assert!(!s.active() && !s.visible() && !s.hiding());
        assert!(s.countdown().is_none());
    }

    #[test]
    fn hide_and_show_require_active() {
        let mut s = step(StepConfig::ready());
        assert!(matches!(s.hide_modal(0), Err(FlowError::IllegalState(_))));
        assert!(matches!(s.show_modal(0), Err(FlowError::IllegalState(_))));

        s.handle(0, &Signal::Activate { initial: true }, 0).unwrap();
        // Active but not yet shown.
        assert!(s.hide_modal(0).unwrap().is_empty());
        assert_eq!(s.show_modal(0).unwrap().len(), 2);

        s.handle(0, &Signal::Shown, 0).unwrap();
        assert!(s.show_modal(0).unwrap().is_empty());
        assert_eq!(
            s.hide_modal(0).unwrap(),
            vec![
                Effect::dispatch(Node::Step(0), Signal::Hidden),
                Effect::dispatch(Node::Badge(0), Signal::Shown),
            ]
        );
    }

    #[test]
    fn clicks_follow_configuration() {
        let mut plain = step(StepConfig::ready());
        plain.handle(0, &Signal::Activate { initial: true }, 0).unwrap();
        plain.handle(0, &Signal::Shown, 0).unwrap();
        assert!(plain.click(0, ClickArea::Backdrop).is_none());
        assert!(plain.click(0, ClickArea::HideIcon).is_none());
        assert_eq!(plain.click(0, ClickArea::Content).unwrap().len(), 1);

        let mut full = step(StepConfig::ready().with_backdrop(true).with_hide_button_icon("close"));
        assert!(full.click(0, ClickArea::Backdrop).is_none());
        full.handle(0, &Signal::Activate { initial: true }, 0).unwrap();
        full.handle(0, &Signal::Shown, 0).unwrap();
        assert_eq!(full.click(0, ClickArea::Backdrop).unwrap().len(), 3);
        assert_eq!(full.click(0, ClickArea::HideIcon).unwrap().len(), 3);
        assert!(full.click(0, ClickArea::Button).is_none());
    }

    #[test]
    fn ready_edge_requests_evaluation() {
        let mut s = step(StepConfig::default());
        assert_eq!(
            s.set_ready(true),
            vec![Effect::dispatch(Node::Modal, Signal::FlowEvaluated)]
        );
        assert!(s.set_ready(true).is_empty());
        assert!(s.set_ready(false).is_empty());
    }

    #[test]
    fn badge_slot_change_while_active() {
        let mut s = step(StepConfig::ready());
        let badge = || Badge::new(Default::default()).unwrap();
        assert!(s.set_badge(0, Some(badge())).is_empty());

        s.handle(0, &Signal::Activate { initial: false }, 0).unwrap();
        assert_eq!(
            s.set_badge(0, Some(badge())),
            vec![
                Effect::dispatch(Node::Badge(0), Signal::Activate { initial: false }),
                Effect::dispatch(Node::Badge(0), Signal::Shown),
            ]
        );
        assert!(s.set_badge(0, None).is_empty());
    }
}
