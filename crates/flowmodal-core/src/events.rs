use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Address of a component inside one flow.
///
/// Steps are addressed purely by their position in the coordinator's child
/// list; a badge shares the index of the step that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "node", content = "index", rename_all = "lowercase")]
pub enum Node {
    Modal,
    Step(usize),
    Badge(usize),
}

impl Node {
    pub fn parent(self) -> Option<Node> {
        match self {
            Node::Modal => None,
            Node::Step(_) => Some(Node::Modal),
            Node::Badge(index) => Some(Node::Step(index)),
        }
    }

    /// `true` when `self` is `other` or one of its ancestors.
    pub fn contains(self, other: Node) -> bool {
        let mut current = Some(other);
        while let Some(node) = current {
            if node == self {
                return true;
            }
            current = node.parent();
        }
        false
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Modal => write!(f, "flow-modal"),
            Node::Step(index) => write!(f, "flow-step[{index}]"),
            Node::Badge(index) => write!(f, "flow-badge[{index}]"),
        }
    }
}

/// Where a click landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClickArea {
    Backdrop,
    HideIcon,
    Content,
    Hint,
    Button,
}

impl ClickArea {
    pub fn as_str(self) -> &'static str {
        match self {
            ClickArea::Backdrop => "backdrop",
            ClickArea::HideIcon => "hide-icon",
            ClickArea::Content => "content",
            ClickArea::Hint => "hint",
            ClickArea::Button => "button",
        }
    }
}

impl std::str::FromStr for ClickArea {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backdrop" => Ok(ClickArea::Backdrop),
            "hide-icon" => Ok(ClickArea::HideIcon),
            "content" => Ok(ClickArea::Content),
            "hint" => Ok(ClickArea::Hint),
            "button" => Ok(ClickArea::Button),
            other => Err(format!("unknown click area: {other}")),
        }
    }
}

/// Every interaction between flow components is a signal.
///
/// Decrees travel down (coordinator to step, step to badge), intents travel
/// up (step to coordinator), and `Clicked` is purely observational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Signal {
    Activate { initial: bool },
    Deactivate,
    Shown,
    Hidden,
    Started { started_at: u64 },
    Clicked { area: ClickArea },
    Ticked { remaining_time: u64 },
    FlowStarted { initial: bool },
    FlowTimedOut,
    FlowEvaluated,
}

/// Payload-free discriminant of a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Activate,
    Deactivate,
    Shown,
    Hidden,
    Started,
    Clicked,
    Ticked,
    FlowStarted,
    FlowTimedOut,
    FlowEvaluated,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Activate => "activate",
            SignalKind::Deactivate => "deactivate",
            SignalKind::Shown => "shown",
            SignalKind::Hidden => "hidden",
            SignalKind::Started => "started",
            SignalKind::Clicked => "clicked",
            SignalKind::Ticked => "ticked",
            SignalKind::FlowStarted => "flow-started",
            SignalKind::FlowTimedOut => "flow-timed-out",
            SignalKind::FlowEvaluated => "flow-evaluated",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Activate { .. } => SignalKind::Activate,
            Signal::Deactivate => SignalKind::Deactivate,
            Signal::Shown => SignalKind::Shown,
            Signal::Hidden => SignalKind::Hidden,
            Signal::Started { .. } => SignalKind::Started,
            Signal::Clicked { .. } => SignalKind::Clicked,
            Signal::Ticked { .. } => SignalKind::Ticked,
            Signal::FlowStarted { .. } => SignalKind::FlowStarted,
            Signal::FlowTimedOut => SignalKind::FlowTimedOut,
            Signal::FlowEvaluated => SignalKind::FlowEvaluated,
        }
    }
}

/// A signal as it was dispatched: where it originated and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub origin: Node,
    pub signal: Signal,
    pub at: DateTime<Utc>,
}

impl Envelope {
    /// Whether a listener attached to `node` observes this envelope.
    ///
    /// Signals bubble from their origin to its ancestors only.
    pub fn is_visible_to(&self, node: Node) -> bool {
        node.contains(self.origin)
    }
}
