//! Inline style declarations

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Declaration priority, mirrors the CSSOM `setProperty` priority argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    Important,
}

/// One inline style declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleValue {
    pub value: String,
    #[serde(default)]
    pub priority: Priority,
}

impl StyleValue {
    pub fn new(value: impl Into<String>, priority: Priority) -> Self {
        Self {
            value: value.into(),
            priority,
        }
    }

    pub fn important(value: impl Into<String>) -> Self {
        Self::new(value, Priority::Important)
    }

    /// Parse `"<value>"` or `"<value> !important"`.
    ///
    /// Returns None for an empty declaration.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        match text.strip_suffix("!important") {
            Some(value) => Some(Self::important(value.trim_end())),
            None => Some(Self::new(text, Priority::Normal)),
        }
    }
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.priority {
            Priority::Normal => write!(f, "{}", self.value),
            Priority::Important => write!(f, "{} !important", self.value),
        }
    }
}

/// Inline style of an element, keyed by property name.
pub type StyleMap = BTreeMap<String, StyleValue>;
