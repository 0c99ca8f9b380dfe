//! Cross-field validation rules
//!
//! Rules are keyed by schema key (indices erased) so a single rule covers
//! every element of a list. They run at apply time against the candidate
//! document, only for the paths an apply touches.

use settings_path::PathAddress;

use crate::document::{ConfigDocument, Value};
use crate::error::{Result, SettingsError};

/// Constraint attached to a schema key
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Inclusive numeric range.
    Range { min: f64, max: f64 },
    /// String value must be one of the listed options.
    OneOf(Vec<String>),
    /// String must not be blank; string array must not be empty.
    NonEmpty,
    /// `field` must be non-empty whenever `when` holds `equals`. Both are
    /// concrete leaf paths, so a list-wide target cannot be expressed.
    RequiredWhen {
        field: PathAddress,
        when: PathAddress,
        equals: Value,
    },
}

/// A constraint bound to a schema key
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    target: String,
    constraint: Constraint,
}

impl Rule {
    pub fn new(target: &str, constraint: Constraint) -> Self {
        Self {
            target: target.to_string(),
            constraint,
        }
    }

    pub fn range(target: &str, min: f64, max: f64) -> Self {
        Self::new(target, Constraint::Range { min, max })
    }

    pub fn one_of(target: &str, options: &[&str]) -> Self {
        Self::new(
            target,
            Constraint::OneOf(options.iter().map(|s| s.to_string()).collect()),
        )
    }

    pub fn non_empty(target: &str) -> Self {
        Self::new(target, Constraint::NonEmpty)
    }

    pub fn required_when(field: PathAddress, when: PathAddress, equals: impl Into<Value>) -> Self {
        Self::new(
            &field.schema_key(),
            Constraint::RequiredWhen {
                field,
                when,
                equals: equals.into(),
            },
        )
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    pub(crate) fn triggered_by(&self, path: &PathAddress) -> bool {
        match &self.constraint {
            Constraint::RequiredWhen { field, when, .. } => field == path || when == path,
            _ => path.schema_key() == self.target,
        }
    }

    /// Check this rule for one touched path of `doc`.
    pub(crate) fn check(&self, doc: &ConfigDocument, touched: &PathAddress) -> Result<()> {
        match &self.constraint {
            Constraint::Range { min, max } => match doc.get(touched)? {
                Value::Number(n) if *n >= *min && *n <= *max => Ok(()),
                Value::Number(n) => Err(SettingsError::validation(
                    touched.to_string(),
                    format!("{} is outside [{}, {}]", n, min, max),
                )),
                other => Err(SettingsError::validation(
                    touched.to_string(),
                    format!("expected a number, got {}", other.kind()),
                )),
            },
            Constraint::OneOf(options) => match doc.get(touched)? {
                Value::String(s) if options.iter().any(|o| o == s) => Ok(()),
                other => Err(SettingsError::validation(
                    touched.to_string(),
                    format!("{:?} is not one of {}", other.to_string(), options.join(", ")),
                )),
            },
            Constraint::NonEmpty => {
                if is_blank(doc.get(touched)?) {
                    Err(SettingsError::validation(touched.to_string(), "must not be empty"))
                } else {
                    Ok(())
                }
            }
            Constraint::RequiredWhen {
                field,
                when,
                equals,
            } => {
                if doc.get(when)? != equals {
                    return Ok(());
                }
                if is_blank(doc.get(field)?) {
                    Err(SettingsError::validation(
                        field.to_string(),
                        format!("required when {} is {}", when, equals),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim().is_empty(),
        Value::StringArray(items) => items.is_empty(),
        Value::Number(_) | Value::Boolean(_) => false,
    }
}
