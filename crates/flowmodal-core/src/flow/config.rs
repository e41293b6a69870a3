//! Typed configuration of flow components.
//!
//! Each struct mirrors the attributes of one markup element. Durations are
//! held in milliseconds; [`crate::markup`] converts the string forms.

use serde::{Deserialize, Serialize};

use crate::convert::CountdownFormat;
use crate::error::{FlowError, Result};
use crate::storage::StorageTier;

/// Coordinator configuration (`<flow-modal>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalConfig {
    /// When `true`, no step is ever activated.
    #[serde(default)]
    pub deactivated: bool,
    /// Namespace the flow state is stored under.
    #[serde(default = "default_storage_namespace")]
    pub storage_namespace: String,
    /// How long persisted flow state lives, in milliseconds.
    #[serde(default = "default_storage_duration_ms")]
    pub storage_duration_ms: u64,
    /// Storage tiers in read/write preference order.
    #[serde(default = "default_storages")]
    pub storages: Vec<StorageTier>,
}

/// Step configuration (`<flow-step>`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub skippable: bool,
    /// Inactivity timeout in milliseconds. `None` never times out.
    #[serde(default)]
    pub timeout_duration_ms: Option<u64>,
    /// Render a backdrop that hides the modal when clicked.
    #[serde(default)]
    pub backdrop: bool,
    /// Icon of the hide button. No icon, no hide button.
    #[serde(default)]
    pub hide_button_icon: Option<String>,
}

/// Badge configuration (`<flow-badge>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeConfig {
    #[serde(default)]
    pub hint_text: Option<String>,
    /// How long the hint stays up after the first hide, in milliseconds.
    #[serde(default = "default_hint_duration_ms")]
    pub hint_duration_ms: u64,
    #[serde(default)]
    pub button_icon: Option<String>,
    #[serde(default)]
    pub button_text: Option<String>,
    /// Countdown display format, e.g. `"mm:ss"`.
    #[serde(default)]
    pub button_count_down_format: Option<String>,
}

fn default_storage_namespace() -> String {
    "flow-modal".into()
}
fn default_storage_duration_ms() -> u64 {
    30 * 60 * 1000
}
fn default_storages() -> Vec<StorageTier> {
    vec![StorageTier::Local, StorageTier::Memory]
}
fn default_hint_duration_ms() -> u64 {
    5 * 1000
}

impl Default for ModalConfig {
    fn default() -> Self {
        Self {
            deactivated: false,
            storage_namespace: default_storage_namespace(),
            storage_duration_ms: default_storage_duration_ms(),
            storages: default_storages(),
        }
    }
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            hint_text: None,
            hint_duration_ms: default_hint_duration_ms(),
            button_icon: None,
            button_text: None,
            button_count_down_format: None,
        }
    }
}

impl ModalConfig {
    /// A step may not outlive the state that records it.
    pub fn validate_step(&self, step: &StepConfig) -> Result<()> {
        match step.timeout_duration_ms {
            Some(timeout) if timeout > self.storage_duration_ms => Err(FlowError::InvalidValue(
                "\"storage-duration\" must be greater than the \"timeout-duration\" of each <flow-step>."
                    .into(),
            )),
            _ => Ok(()),
        }
    }
}

impl StepConfig {
    pub fn ready() -> Self {
        Self {
            ready: true,
            ..Self::default()
        }
    }

    pub fn with_skippable(mut self, skippable: bool) -> Self {
        self.skippable = skippable;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_duration_ms = Some(timeout_ms);
        self
    }

    pub fn with_backdrop(mut self, backdrop: bool) -> Self {
        self.backdrop = backdrop;
        self
    }

    pub fn with_hide_button_icon(mut self, icon: impl Into<String>) -> Self {
        self.hide_button_icon = Some(icon.into());
        self
    }
}

impl BadgeConfig {
    pub fn with_hint(mut self, text: impl Into<String>) -> Self {
        self.hint_text = Some(text.into());
        self
    }

    pub fn with_count_down_format(mut self, format: impl Into<String>) -> Self {
        self.button_count_down_format = Some(format.into());
        self
    }

    pub(crate) fn count_down_format(&self) -> Result<Option<CountdownFormat>> {
        self.button_count_down_format
            .as_deref()
            .map(CountdownFormat::parse)
            .transpose()
    }
}
