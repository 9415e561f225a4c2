//! Resolution errors.
//!
//! Every error is scoped to one section and names the offending key. A
//! section with any error emits no model; sibling sections are unaffected.

use serde::Serialize;
use std::fmt;

/// What went wrong with one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ErrorKind {
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    #[error("unknown value grammar: {0}")]
    UnknownValueGrammar(String),

    #[error("line {line} already belongs to group {group}")]
    DuplicateGroupMembership { line: String, group: String },

    #[error("dangling reference: {0}")]
    DanglingReference(String),

    #[error("constraint cycle: {}", format_cycle(.0))]
    ConstraintCycle(Vec<String>),

    #[error("conflicting constraint: {0}")]
    ConflictingConstraint(String),

    #[error("key declared more than once")]
    DuplicateKey,
}

impl ErrorKind {
    /// Short stable name, e.g. `constraint_cycle`.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::MalformedIdentifier(_) => "malformed_identifier",
            ErrorKind::UnknownValueGrammar(_) => "unknown_value_grammar",
            ErrorKind::DuplicateGroupMembership { .. } => "duplicate_group_membership",
            ErrorKind::DanglingReference(_) => "dangling_reference",
            ErrorKind::ConstraintCycle(_) => "constraint_cycle",
            ErrorKind::ConflictingConstraint(_) => "conflicting_constraint",
            ErrorKind::DuplicateKey => "duplicate_key",
        }
    }
}

fn format_cycle(path: &[String]) -> String {
    match path.first() {
        Some(first) => format!("{} -> {first}", path.join(" -> ")),
        None => String::new(),
    }
}

/// One failure, located by section and key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("[{section}] {key}: {kind}")]
pub struct ResolveError {
    pub section: String,
    pub key: String,
    pub kind: ErrorKind,
}

/// Every failure collected while resolving one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionErrors {
    pub section: String,
    pub errors: Vec<ResolveError>,
}

impl SectionErrors {
    pub(crate) fn new(section: &str) -> Self {
        Self {
            section: section.to_string(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, key: impl Into<String>, kind: ErrorKind) {
        self.errors.push(ResolveError {
            section: self.section.clone(),
            key: key.into(),
            kind,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Errors of one kind, by [`ErrorKind::name`].
    pub fn of_kind<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ResolveError> + 'a {
        self.errors.iter().filter(move |e| e.kind.name() == name)
    }
}

impl fmt::Display for SectionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "section '{}' failed with {} error(s)",
            self.section,
            self.errors.len()
        )?;
        for err in &self.errors {
            write!(f, "\n  {}: {}", err.key, err.kind)?;
        }
        Ok(())
    }
}

impl std::error::Error for SectionErrors {}
