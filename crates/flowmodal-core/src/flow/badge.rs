//! Badge sub-state machine: the hint bubble and the button that brings a
//! hidden step back.

use tracing::debug;

use super::{BadgeConfig, Effect};
use crate::convert::CountdownFormat;
use crate::error::{FlowError, Result};
use crate::events::{ClickArea, Node, Signal, SignalKind};

#[derive(Debug, Clone)]
pub struct Badge {
    config: BadgeConfig,
    format: Option<CountdownFormat>,
    initial: bool,
    active: bool,
    hint_visible: bool,
    hint_hiding: bool,
    button_visible: bool,
    button_hiding: bool,
    count_down_text: Option<String>,
    hint_timer_pending: bool,
}

impl Badge {
    /// Build a badge, rejecting an invalid countdown format.
    pub fn new(config: BadgeConfig) -> Result<Self> {
        let format = config.count_down_format()?;
        Ok(Self {
            config,
            format,
            initial: false,
            active: false,
            hint_visible: false,
            hint_hiding: false,
            button_visible: false,
            button_hiding: false,
            count_down_text: None,
            hint_timer_pending: false,
        })
    }

    pub fn config(&self) -> &BadgeConfig {
        &self.config
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn visible(&self) -> bool {
        self.hint_visible || self.button_visible
    }

    pub fn hint_visible(&self) -> bool {
        self.hint_visible
    }

    pub fn hint_hiding(&self) -> bool {
        self.hint_hiding
    }

    pub fn button_visible(&self) -> bool {
        self.button_visible
    }

    pub fn button_hiding(&self) -> bool {
        self.button_hiding
    }

    pub fn count_down_text(&self) -> Option<&str> {
        self.count_down_text.as_deref()
    }

    /// Countdown text, falling back to the configured button text.
    pub fn button_label(&self) -> Option<&str> {
        self.count_down_text
            .as_deref()
            .or(self.config.button_text.as_deref())
    }

    pub(crate) fn handles(kind: SignalKind) -> bool {
        matches!(
            kind,
            SignalKind::Activate
                | SignalKind::Deactivate
                | SignalKind::Shown
                | SignalKind::Hidden
                | SignalKind::Ticked
        )
    }

    pub(crate) fn handle(&mut self, signal: &Signal) -> Result<Vec<Effect>> {
        let mut effects = Vec::new();
        match *signal {
            Signal::Activate { initial } => {
                self.initial = initial;
                self.active = true;
            }
            Signal::Deactivate => {
                self.active = false;
                self.hint_visible = false;
                self.button_visible = false;
                self.hint_hiding = false;
                self.button_hiding = false;
                self.cancel_hint_timer(&mut effects);
            }
            Signal::Shown => {
                self.button_visible = true;
                self.hint_hiding = false;
                self.button_hiding = false;

                if self.initial {
                    self.hint_visible = true;
                    if !self.hint_timer_pending {
                        self.hint_timer_pending = true;
                        effects.push(Effect::Arm {
                            delay_ms: self.config.hint_duration_ms,
                            interval_ms: None,
                        });
                    }
                }
            }
            Signal::Hidden => {
                self.initial = false;
                self.hint_visible = false;
                self.button_visible = false;
                self.button_hiding = true;
                self.cancel_hint_timer(&mut effects);
            }
            Signal::Ticked { remaining_time } => {
                self.count_down_text = self.format.as_ref().map(|f| f.format(remaining_time));
            }
            ref other => {
                return Err(FlowError::SignalMismatch {
                    expected: "a badge signal",
                    actual: other.kind(),
                })
            }
        }
        Ok(effects)
    }

    /// The hint timer expired.
    pub(crate) fn on_timer(&mut self) -> Vec<Effect> {
        debug!("hint dismissed");
        self.hint_timer_pending = false;
        self.hint_visible = false;
        self.hint_hiding = true;
        Vec::new()
    }

    /// Effects of a click on `area`, or `None` when the click hit nothing.
    pub(crate) fn click(&self, index: usize, area: ClickArea) -> Option<Vec<Effect>> {
        let hit = match area {
            ClickArea::Hint => {
                self.config.hint_text.is_some() && self.active && self.hint_visible
            }
            ClickArea::Button => self.active && self.button_visible,
            _ => false,
        };
        if !hit {
            return None;
        }

        let node = Node::Badge(index);
        Some(vec![
            Effect::dispatch(node, Signal::Clicked { area }),
            Effect::dispatch(node, Signal::Hidden),
            Effect::dispatch(Node::Step(index), Signal::Shown),
        ])
    }

    fn cancel_hint_timer(&mut self, effects: &mut Vec<Effect>) {
        if self.hint_timer_pending {
            self.hint_timer_pending = false;
            effects.push(Effect::Disarm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn badge(config: BadgeConfig) -> Badge {
        Badge::new(config).unwrap()
    }

    #[test]
    fn initial_show_arms_hint_timer_once() {
        let mut b = badge(BadgeConfig::default().with_hint("Come back"));
        b.handle(&Signal::Activate { initial: true }).unwrap();

        let effects = b.handle(&Signal::Shown).unwrap();
        assert_eq!(
            effects,
            vec![Effect::Arm {
                delay_ms: 5_000,
                interval_ms: None
            }]
        );
        assert!(b.hint_visible() && b.button_visible());

        assert!(b.handle(&Signal::Shown).unwrap().is_empty());

        b.on_timer();
        assert!(!b.hint_visible());
        assert!(b.hint_hiding());
        assert!(b.button_visible());
    }

    #[test]
    fn non_initial_show_skips_hint() {
        let mut b = badge(BadgeConfig::default().with_hint("Come back"));
        b.handle(&Signal::Activate { initial: false }).unwrap();
        assert!(b.handle(&Signal::Shown).unwrap().is_empty());
        assert!(!b.hint_visible());
        assert!(b.visible());
    }

    #[test]
    fn hidden_cancels_pending_timer_and_clears_initial() {
        let mut b = badge(BadgeConfig::default());
        b.handle(&Signal::Activate { initial: true }).unwrap();
        b.handle(&Signal::Shown).unwrap();

        assert_eq!(b.handle(&Signal::Hidden).unwrap(), vec![Effect::Disarm]);
        assert!(!b.visible());
        assert!(b.button_hiding());

        // Showing again no longer brings the hint back.
        assert!(b.handle(&Signal::Shown).unwrap().is_empty());
        assert!(!b.hint_visible());
    }

    #[test]
    fn deactivate_clears_everything() {
        let mut b = badge(BadgeConfig::default());
        b.handle(&Signal::Activate { initial: true }).unwrap();
        b.handle(&Signal::Shown).unwrap();

        assert_eq!(b.handle(&Signal::Deactivate).unwrap(), vec![Effect::Disarm]);
        assert!(!b.active());
        assert!(!b.visible());
        assert!(!b.hint_hiding() && !b.button_hiding());
    }

    #[test]
    fn ticks_format_the_countdown() {
        let mut b = badge(
            BadgeConfig {
                button_text: Some("Open".into()),
                ..BadgeConfig::default()
            }
            .with_count_down_format("mm:ss"),
        );
        assert_eq!(b.button_label(), Some("Open"));

        b.handle(&Signal::Ticked { remaining_time: 60_000 }).unwrap();
        assert_eq!(b.count_down_text(), Some("01:00"));
        assert_eq!(b.button_label(), Some("01:00"));
    }

    #[test]
    fn ticks_without_format_clear_the_text() {
        let mut b = badge(BadgeConfig::default());
        b.handle(&Signal::Ticked { remaining_time: 1_000 }).unwrap();
        assert_eq!(b.count_down_text(), None);
        assert_eq!(b.button_label(), None);
    }

    #[test]
    fn clicks_need_a_visible_target() {
        let mut b = badge(BadgeConfig::default());
        assert!(b.click(0, ClickArea::Button).is_none());

        b.handle(&Signal::Activate { initial: true }).unwrap();
        b.handle(&Signal::Shown).unwrap();
        // No hint text configured.
        assert!(b.click(0, ClickArea::Hint).is_none());
        assert!(b.click(0, ClickArea::Backdrop).is_none());

        let effects = b.click(2, ClickArea::Button).unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::dispatch(Node::Badge(2), Signal::Clicked { area: ClickArea::Button }),
                Effect::dispatch(Node::Badge(2), Signal::Hidden),
                Effect::dispatch(Node::Step(2), Signal::Shown),
            ]
        );
    }

    #[test]
    fn rejects_foreign_signals() {
        let mut b = badge(BadgeConfig::default());
        let err = b.handle(&Signal::FlowTimedOut).unwrap_err();
        assert!(matches!(
            err,
            FlowError::SignalMismatch {
                actual: SignalKind::FlowTimedOut,
                ..
            }
        ));
        assert!(!Badge::handles(SignalKind::Clicked));
    }
}
