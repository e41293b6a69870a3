use serde::Serialize;

use super::{Badge, Step};

/// Snapshot of everything a renderer needs to draw a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowView {
    pub deactivated: bool,
    pub active: bool,
    pub visible: bool,
    pub activated_step_index: Option<usize>,
    pub steps: Vec<StepView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub index: usize,
    pub ready: bool,
    pub skippable: bool,
    pub active: bool,
    pub visible: bool,
    pub hiding: bool,
    /// The dialog is on screen (`modal--visible`).
    pub modal_visible: bool,
    pub backdrop_visible: bool,
    pub has_backdrop: bool,
    pub hide_button_icon: Option<String>,
    pub timeout_duration_ms: Option<u64>,
    pub started_at: Option<u64>,
    pub remaining_ms: Option<u64>,
    pub badge: Option<BadgeView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeView {
    pub active: bool,
    pub visible: bool,
    /// Present only when hint text is configured.
    pub hint: Option<HintView>,
    pub button_visible: bool,
    pub button_hiding: bool,
    pub button_icon: Option<String>,
    pub button_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HintView {
    pub text: String,
    pub visible: bool,
    pub hiding: bool,
}

impl StepView {
    pub(crate) fn new(index: usize, step: &Step, now: u64) -> Self {
        let config = step.config();
        let on_screen = step.active() && step.visible();
        Self {
            index,
            ready: config.ready,
            skippable: config.skippable,
            active: step.active(),
            visible: step.visible(),
            hiding: step.hiding(),
            modal_visible: on_screen,
            backdrop_visible: config.backdrop && on_screen,
            has_backdrop: config.backdrop,
            hide_button_icon: config.hide_button_icon.clone(),
            timeout_duration_ms: config.timeout_duration_ms,
            started_at: step.started_at(),
            remaining_ms: step.countdown().map(|c| c.remaining_ms(now)),
            badge: step.badge().map(BadgeView::new),
        }
    }
}

impl BadgeView {
    pub(crate) fn new(badge: &Badge) -> Self {
        let config = badge.config();
        Self {
            active: badge.active(),
            visible: badge.visible(),
            hint: config.hint_text.as_ref().map(|text| HintView {
                text: text.clone(),
                visible: badge.active() && badge.hint_visible(),
                hiding: badge.hint_hiding(),
            }),
            button_visible: badge.active() && badge.button_visible(),
            button_hiding: badge.button_hiding(),
            button_icon: config.button_icon.clone(),
            button_label: badge.button_label().map(str::to_string),
        }
    }
}
