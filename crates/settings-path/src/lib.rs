//! Path addresses for settings documents.
//!
//! A path names exactly one node in a settings tree using dot-separated
//! field names and 0-based array indices in square brackets, e.g.
//! `email.accounts[0].imapHost`.
//!
//! Grammar: `segment ('.' segment)*`, `segment := name ('[' digits ']')*`.

mod parser;

pub use parser::parse_path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One step of a path: a field lookup or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Step {
    Field(String),
    Index(usize),
}

/// Parsed, immutable path address.
///
/// Always non-empty and always starts with a field step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathAddress {
    steps: Vec<Step>,
}

/// Errors produced while parsing path text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("empty field name at offset {offset}")]
    EmptySegment { offset: usize },

    #[error("unterminated '[' at offset {offset}")]
    UnterminatedIndex { offset: usize },

    #[error("invalid index {text:?} at offset {offset}")]
    InvalidIndex { offset: usize, text: String },

    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedChar { offset: usize, ch: char },

    #[error("path must start with a field name")]
    LeadingIndex,
}

impl PathAddress {
    /// Parse path text.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        parse_path(text)
    }

    /// Build a path from raw steps.
    pub fn from_steps(steps: Vec<Step>) -> Result<Self, PathError> {
        match steps.first() {
            None => Err(PathError::Empty),
            Some(Step::Index(_)) => Err(PathError::LeadingIndex),
            Some(Step::Field(name)) if name.is_empty() => {
                Err(PathError::EmptySegment { offset: 0 })
            }
            Some(Step::Field(_)) => Ok(Self { steps }),
        }
    }

    /// Single-field path.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            steps: vec![Step::Field(name.into())],
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// New path with a field step appended.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step::Field(name.into()));
        Self { steps }
    }

    /// New path with an index step appended.
    pub fn index(&self, position: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step::Index(position));
        Self { steps }
    }

    /// True if `prefix` addresses this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &PathAddress) -> bool {
        self.steps.starts_with(&prefix.steps)
    }

    /// Path text with every index erased, e.g. `email.accounts[].imapHost`.
    ///
    /// All elements of a list share one schema entry, so rules and the
    /// restart set are keyed by this form.
    pub fn schema_key(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            match step {
                Step::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                Step::Index(_) => out.push_str("[]"),
            }
        }
        out
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Field(name) if i == 0 => write!(f, "{}", name)?,
                Step::Field(name) => write!(f, ".{}", name)?,
                Step::Index(position) => write!(f, "[{}]", position)?,
            }
        }
        Ok(())
    }
}

impl FromStr for PathAddress {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_path(s)
    }
}

impl Serialize for PathAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PathAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_path(&text).map_err(serde::de::Error::custom)
    }
}
