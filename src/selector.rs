//! Selector grammar: `$inputs.name`, `$steps.name`, `$steps.name.property`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static SELECTOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$(inputs|steps)\.([A-Za-z_][A-Za-z0-9_]*)(?:\.([A-Za-z_][A-Za-z0-9_]*))?$")
        .expect("selector grammar is a fixed, valid regex")
});

/// A parsed textual reference into the workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Selector {
    /// `$inputs.<name>`
    Input { name: String },
    /// `$steps.<name>` — a pure step reference, always flow control.
    Step { name: String },
    /// `$steps.<name>.<property>`
    StepOutput { name: String, property: String },
}

impl Selector {
    /// Parses a raw string against the selector grammar. Returns `None`
    /// if the string is not a selector at all (e.g. a literal value).
    pub fn parse(raw: &str) -> Option<Selector> {
        let captures = SELECTOR_PATTERN.captures(raw)?;
        let root = &captures[1];
        let name = captures[2].to_string();
        let property = captures.get(3).map(|m| m.as_str().to_string());
        match (root, property) {
            ("inputs", None) => Some(Selector::Input { name }),
            ("inputs", Some(_)) => None, // `$inputs.x.y` is not valid grammar
            ("steps", None) => Some(Selector::Step { name }),
            ("steps", Some(property)) => Some(Selector::StepOutput { name, property }),
            _ => None,
        }
    }

    /// The node id of the element this selector's *target* (the thing
    /// being referenced) resolves to: `target($steps.n.p) = $steps.n`.
    pub fn target_step_or_input_id(&self) -> String {
        match self {
            Selector::Input { name } => format!("$inputs.{name}"),
            Selector::Step { name } => format!("$steps.{name}"),
            Selector::StepOutput { name, .. } => format!("$steps.{name}"),
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Selector::Input { .. })
    }

    pub fn is_step(&self) -> bool {
        matches!(self, Selector::Step { .. })
    }

    pub fn is_step_output(&self) -> bool {
        matches!(self, Selector::StepOutput { .. })
    }

    pub fn property(&self) -> Option<&str> {
        match self {
            Selector::StepOutput { property, .. } => Some(property),
            _ => None,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Input { name } => write!(f, "$inputs.{name}"),
            Selector::Step { name } => write!(f, "$steps.{name}"),
            Selector::StepOutput { name, property } => write!(f, "$steps.{name}.{property}"),
        }
    }
}

impl From<Selector> for String {
    fn from(value: Selector) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Selector {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Selector::parse(&value).ok_or_else(|| format!("'{value}' is not a valid selector"))
    }
}

/// `true` iff `raw` matches the selector grammar at all (used to tell a
/// selector field apart from a literal field value in step manifests).
pub fn looks_like_selector(raw: &str) -> bool {
    SELECTOR_PATTERN.is_match(raw)
}
