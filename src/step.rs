//! Step model — one immutable unit of a guided sequence.

use serde::{Deserialize, Serialize};

/// Reference used to locate a step's on-screen element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Anchor {
    /// A raw selector string, e.g. `#checkin-button`.
    Selector(String),
    /// A semantic id applied to live elements by the tour attachment table.
    Attachment(String),
}

impl Anchor {
    pub fn selector(s: impl Into<String>) -> Self {
        Self::Selector(s.into())
    }

    pub fn attachment(id: impl Into<String>) -> Self {
        Self::Attachment(id.into())
    }
}

impl std::fmt::Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Selector(s) => write!(f, "{s}"),
            Self::Attachment(id) => write!(f, "[data-tour-id=\"{id}\"]"),
        }
    }
}

/// Presentation payload carried by a step. Opaque to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepContent {
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Anything else the host screen wants to render.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

impl StepContent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            extra: serde_json::Value::Null,
        }
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = extra;
        self
    }
}

/// One step in a guided sequence.
///
/// `reward` is unsigned: there is no XP revocation path, so a negative reward
/// fails to deserialize rather than reaching the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub order: i32,
    #[serde(default)]
    pub reward: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default)]
    pub content: StepContent,
}

impl Step {
    pub fn new(id: impl Into<String>, order: i32) -> Self {
        Self {
            id: id.into(),
            order,
            reward: 0,
            anchor: None,
            route: None,
            content: StepContent::default(),
        }
    }

    pub fn with_reward(mut self, reward: u32) -> Self {
        self.reward = reward;
        self
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_content(mut self, content: StepContent) -> Self {
        self.content = content;
        self
    }
}
