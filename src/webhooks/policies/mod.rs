//! Validation policies applied by the admission webhook server.
//!
//! Validation reports *every* violation, not just the first: callers get an
//! accumulable [`ErrorList`] they can render as one combined message or
//! enumerate cause by cause.

pub mod group;

pub use group::{
    validate_policy_group, validate_policy_group_expression, validate_policy_group_members,
};

use std::fmt;

/// Kind of a field-level validation failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    Invalid,
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldErrorKind::Required => write!(f, "Required value"),
            FieldErrorKind::Invalid => write!(f, "Invalid value"),
        }
    }
}

/// A single field-level validation failure.
///
/// Renders like `spec.policies: Invalid value: "in": policy group member
/// name is invalid`, carrying the offending literal value back to whoever
/// submitted the resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub kind: FieldErrorKind,
    pub value: Option<String>,
    pub detail: String,
}

impl FieldError {
    pub fn required(field: &str, detail: &str) -> Self {
        Self {
            field: field.to_string(),
            kind: FieldErrorKind::Required,
            value: None,
            detail: detail.to_string(),
        }
    }

    pub fn invalid(field: &str, value: &str, detail: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            kind: FieldErrorKind::Invalid,
            value: Some(value.to_string()),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(
                f,
                "{}: {}: \"{}\": {}",
                self.field, self.kind, value, self.detail
            ),
            None => write!(f, "{}: {}: {}", self.field, self.kind, self.detail),
        }
    }
}

impl std::error::Error for FieldError {}

/// An accumulated, order-independent collection of field errors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorList(Vec<FieldError>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ErrorList) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Keep only the errors matching `predicate`.
    pub fn filter(self, predicate: impl Fn(&FieldError) -> bool) -> Self {
        Self(self.0.into_iter().filter(|e| predicate(e)).collect())
    }

    /// Combined single-line message, suitable for an admission denial.
    pub fn aggregate_message(&self) -> String {
        self.0
            .iter()
            .map(FieldError::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.aggregate_message())
    }
}

impl IntoIterator for ErrorList {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<FieldError> for ErrorList {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
