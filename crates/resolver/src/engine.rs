//! Batch resolution.
//!
//! The [`Resolver`] turns line-fitting sections into [`FitModel`]s. Each
//! section is resolved on its own: a failing section never affects its
//! siblings, and the only state shared between sections is the read-only
//! defaults entry list.

use crate::error::SectionErrors;
use crate::model::{FitModel, Role};
use crate::section::Section;
use linefit_config::{ConfigDocument, LineFittingSet, RawEntry, ResolverSettings};
use linefit_core::LineIdentifier;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of resolving one section.
pub type SectionResult = Result<FitModel, SectionErrors>;

/// Resolves line-fitting sections against a fixed set of settings.
///
/// Cheap to clone; clones share the known-line table.
#[derive(Debug, Clone)]
pub struct Resolver {
    settings: Arc<ResolverSettings>,
    known_lines: Arc<Vec<LineIdentifier>>,
}

impl Resolver {
    pub fn new(settings: ResolverSettings) -> Self {
        let known_lines = settings.known_line_ids();
        Self {
            settings: Arc::new(settings),
            known_lines: Arc::new(known_lines),
        }
    }

    /// Replace the lines that may be referenced without being declared.
    pub fn with_known_lines(mut self, lines: Vec<LineIdentifier>) -> Self {
        self.known_lines = Arc::new(lines);
        self
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn known_lines(&self) -> &[LineIdentifier] {
        &self.known_lines
    }

    /// Resolve one section given the shared defaults and its own entries.
    pub fn resolve_section(
        &self,
        name: &str,
        defaults: &[RawEntry],
        own: &[RawEntry],
    ) -> SectionResult {
        debug!(
            section = %name,
            defaults = defaults.len(),
            entries = own.len(),
            "Resolving section"
        );
        match Section::build(name, defaults, own, &self.known_lines) {
            Ok(section) => {
                let model = FitModel::from_section(&section);
                info!(
                    section = %name,
                    parameters = model.parameters.len(),
                    free = model.count(Role::Free),
                    derived = model.count(Role::Derived),
                    "Section resolved"
                );
                Ok(model)
            }
            Err(errors) => {
                for err in &errors.errors {
                    debug!(section = %name, key = %err.key, kind = err.kind.name(), "{}", err.kind);
                }
                warn!(section = %name, errors = errors.len(), "Section failed to resolve");
                Err(errors)
            }
        }
    }

    /// Resolve every section of a set, in set order.
    pub fn resolve_set(&self, set: &LineFittingSet) -> Vec<(String, SectionResult)> {
        set.sections
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    self.resolve_section(&s.name, &set.defaults, &s.entries),
                )
            })
            .collect()
    }

    /// Resolve every line-fitting section of a document.
    pub fn resolve_document(&self, document: &ConfigDocument) -> Vec<(String, SectionResult)> {
        let set = document.line_fitting(&self.settings);
        info!(sections = set.sections.len(), "Resolving document");
        self.resolve_set(&set)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ResolverSettings::default())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
