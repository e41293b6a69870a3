//! Mounting a flow from an element tree.
//!
//! A flow is described the way it would be written as markup: a
//! `<flow-modal>` element whose `<flow-step>` children may each hold one
//! `<flow-badge>`. Other elements are content and are ignored, as are
//! attributes this crate does not know (styling).
//!
//! Trees are usually loaded from TOML:
//!
//! ```toml
//! tag = "flow-modal"
//! attributes = { storage-namespace = "tour", storage-duration = "1h" }
//!
//! [[children]]
//! tag = "flow-step"
//! attributes = { ready = true, timeout-duration = "10m" }
//!
//! [[children.children]]
//! tag = "flow-badge"
//! attributes = { hint-text = "Come back", button-count-down-format = "mm:ss" }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::convert::{duration_attribute, parse_flag, parse_list};
use crate::error::{FlowError, Result};
use crate::flow::{BadgeConfig, Flow, FlowBuilder, ModalConfig, StepConfig};
use crate::storage::parse_tiers;

pub const MODAL_TAG: &str = "flow-modal";
pub const STEP_TAG: &str = "flow-step";
pub const BADGE_TAG: &str = "flow-badge";

/// Separator of the `storages` attribute.
const STORAGES_SEPARATOR: &str = ",";

/// One element of a markup tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default, deserialize_with = "deserialize_attributes")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<Element>,
}

/// Attribute values may be written as TOML strings, booleans or integers.
fn deserialize_attributes<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Flag(bool),
        Number(i64),
    }

    let raw = BTreeMap::<String, Raw>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Raw::Text(text) => text,
                Raw::Flag(flag) => flag.to_string(),
                Raw::Number(n) => n.to_string(),
            };
            (name, value)
        })
        .collect())
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn flag(&self, name: &str) -> bool {
        self.attribute(name).is_some_and(parse_flag)
    }

    /// Non-empty string attribute.
    fn text(&self, name: &str) -> Option<String> {
        self.attribute(name)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    }

    fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| FlowError::Markup(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| FlowError::Markup(format!("{}: {e}", path.display())))?;
        Self::from_toml(&source)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| FlowError::Markup(e.to_string()))
    }
}

/// Reject flow elements placed where they cannot work.
pub fn validate_structure(root: &Element) -> Result<()> {
    check_placement(root, None)?;
    if root.tag != MODAL_TAG {
        return Err(FlowError::Structure(format!(
            "Expected <{MODAL_TAG}> at the root, found <{}>.",
            root.tag
        )));
    }
    Ok(())
}

fn check_placement(element: &Element, parent: Option<&str>) -> Result<()> {
    match element.tag.as_str() {
        MODAL_TAG if parent.is_some() => {
            return Err(FlowError::Structure(
                "<flow-modal> cannot be nested in another element.".into(),
            ))
        }
        STEP_TAG if parent != Some(MODAL_TAG) => {
            return Err(FlowError::Structure(
                "<flow-step> must be a child of <flow-modal>.".into(),
            ))
        }
        BADGE_TAG if parent != Some(STEP_TAG) => {
            return Err(FlowError::Structure(
                "<flow-badge> must be a child of <flow-step>.".into(),
            ))
        }
        STEP_TAG if element.children_tagged(BADGE_TAG).count() >= 2 => {
            return Err(FlowError::Structure(
                "<flow-step> can only contain at most one <flow-badge>.".into(),
            ))
        }
        _ => {}
    }

    element
        .children
        .iter()
        .try_for_each(|child| check_placement(child, Some(element.tag.as_str())))
}

/// `<flow-modal>` attributes.
pub fn modal_config(element: &Element) -> Result<ModalConfig> {
    let mut config = ModalConfig {
        deactivated: element.flag("deactivated"),
        ..ModalConfig::default()
    };
    if let Some(namespace) = element.text("storage-namespace") {
        config.storage_namespace = namespace;
    }
    if let Some(value) = element.attribute("storage-duration") {
        config.storage_duration_ms = duration_attribute("storage-duration", value)?;
    }
    if let Some(value) = element.attribute("storages") {
        config.storages = parse_tiers(&parse_list(value, STORAGES_SEPARATOR))?;
    }
    Ok(config)
}

/// `<flow-step>` attributes.
pub fn step_config(element: &Element) -> Result<StepConfig> {
    Ok(StepConfig {
        ready: element.flag("ready"),
        skippable: element.flag("skippable"),
        timeout_duration_ms: element
            .attribute("timeout-duration")
            .map(|v| duration_attribute("timeout-duration", v))
            .transpose()?,
        backdrop: element.flag("backdrop"),
        hide_button_icon: element.text("hide-button-icon"),
    })
}

/// `<flow-badge>` attributes.
pub fn badge_config(element: &Element) -> Result<BadgeConfig> {
    let mut config = BadgeConfig {
        hint_text: element.text("hint-text"),
        button_icon: element.text("button-icon"),
        button_text: element.text("button-text"),
        button_count_down_format: element.text("button-count-down-format"),
        ..BadgeConfig::default()
    };
    if let Some(value) = element.attribute("hint-duration") {
        config.hint_duration_ms = duration_attribute("hint-duration", value)?;
    }
    Ok(config)
}

impl FlowBuilder {
    /// Builder for the flow described by `root`.
    pub fn from_element(root: &Element) -> Result<Self> {
        validate_structure(root)?;

        let mut builder = FlowBuilder::new(modal_config(root)?);
        for step in root.children_tagged(STEP_TAG) {
            let config = step_config(step)?;
            builder = match step.children_tagged(BADGE_TAG).next() {
                Some(badge) => builder.step_with_badge(config, badge_config(badge)?),
                None => builder.step(config),
            };
        }
        Ok(builder)
    }
}

impl Flow {
    /// Mount the flow described by `root` with the system clock and its
    /// configured storage tiers.
    pub fn mount(root: &Element) -> Result<Flow> {
        FlowBuilder::from_element(root)?.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageTier;

    const TOUR: &str = r#"
tag = "flow-modal"
attributes = { storage-namespace = "tour", storage-duration = "1h", storages = "memory, session", data-theme = "dark" }

[[children]]
tag = "flow-step"
attributes = { ready = true, skippable = "", timeout-duration = "10m", backdrop = "false" }

[[children.children]]
tag = "p"

[[children.children]]
tag = "flow-badge"
attributes = { hint-text = "Come back", hint-duration = 3000, button-count-down-format = "mm:ss" }

[[children]]
tag = "flow-step"
attributes = { hide-button-icon = "close" }
"#;

    #[test]
    fn parses_toml_tree() {
        let root = Element::from_toml(TOUR).unwrap();
        assert_eq!(root.tag, MODAL_TAG);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].attribute("ready"), Some("true"));
        assert_eq!(root.children[0].children[1].attribute("hint-duration"), Some("3000"));
    }

    #[test]
    fn builds_typed_configs() {
        let root = Element::from_toml(TOUR).unwrap();
        let modal = modal_config(&root).unwrap();
        assert_eq!(modal.storage_namespace, "tour");
        assert_eq!(modal.storage_duration_ms, 3_600_000);
        assert_eq!(modal.storages, vec![StorageTier::Memory, StorageTier::Session]);

        let step = step_config(&root.children[0]).unwrap();
        assert!(step.ready && step.skippable && !step.backdrop);
        assert_eq!(step.timeout_duration_ms, Some(600_000));

        let badge = badge_config(&root.children[0].children[1]).unwrap();
        assert_eq!(badge.hint_text.as_deref(), Some("Come back"));
        assert_eq!(badge.hint_duration_ms, 3_000);

        let second = step_config(&root.children[1]).unwrap();
        assert!(!second.ready);
        assert_eq!(second.hide_button_icon.as_deref(), Some("close"));
    }

    #[test]
    fn builder_collects_steps_and_badges() {
        let root = Element::from_toml(TOUR).unwrap();
        let builder = FlowBuilder::from_element(&root).unwrap();
        assert_eq!(builder.modal_config().storage_namespace, "tour");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_duration = Element::new(MODAL_TAG).attr("storage-duration", "forever");
        assert!(modal_config(&bad_duration)
            .unwrap_err()
            .to_string()
            .contains("\"storage-duration\" is invalid"));

        let bad_storage = Element::new(MODAL_TAG).attr("storages", "local,cookie");
        assert!(modal_config(&bad_storage).is_err());

        let bad_timeout = Element::new(STEP_TAG).attr("timeout-duration", "x");
        assert!(step_config(&bad_timeout).is_err());
    }

    #[test]
    fn step_outside_modal() {
        let err = validate_structure(&Element::new(STEP_TAG)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "FlowModalError: <flow-step> must be a child of <flow-modal>."
        );

        let nested = Element::new(MODAL_TAG).child(Element::new("div").child(Element::new(STEP_TAG)));
        assert!(matches!(validate_structure(&nested), Err(FlowError::Structure(_))));
    }

    #[test]
    fn badge_outside_step() {
        let root = Element::new(MODAL_TAG).child(Element::new(BADGE_TAG));
        let err = validate_structure(&root).unwrap_err();
        assert!(err.to_string().contains("<flow-badge> must be a child of <flow-step>."));
    }

    #[test]
    fn at_most_one_badge() {
        let root = Element::new(MODAL_TAG).child(
            Element::new(STEP_TAG)
                .child(Element::new(BADGE_TAG))
                .child(Element::new(BADGE_TAG)),
        );
        let err = validate_structure(&root).unwrap_err();
        assert!(err.to_string().contains("at most one <flow-badge>"));
    }

    #[test]
    fn root_must_be_a_modal() {
        assert!(validate_structure(&Element::new("div")).is_err());
        assert!(validate_structure(&Element::new(MODAL_TAG)).is_ok());
    }

    #[test]
    fn malformed_toml_is_a_markup_error() {
        assert!(matches!(
            Element::from_toml("tag = "),
            Err(FlowError::Markup(_))
        ));
    }

    #[test]
    fn mount_activates_from_markup() {
        let root = Element::new(MODAL_TAG)
            .attr("storages", "session")
            .child(Element::new(STEP_TAG).attr("ready", ""))
            .child(Element::new(STEP_TAG));
        let flow = Flow::mount(&root).unwrap();
        assert_eq!(flow.len(), 2);
        assert_eq!(flow.activated_step_index(), Some(0));
        assert!(flow.visible());
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.toml");
        let root = Element::new(MODAL_TAG).child(Element::new(STEP_TAG).attr("ready", ""));
        std::fs::write(&path, root.to_toml().unwrap()).unwrap();

        assert_eq!(Element::load(&path).unwrap(), root);
        assert!(Element::load(dir.path().join("missing.toml")).is_err());
    }
}
