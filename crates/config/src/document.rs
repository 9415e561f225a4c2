//! INI-style configuration documents.
//!
//! The observation configuration is a plain INI file:
//!
//! ```text
//! [sample_data]
//! obj_list = gp030321,gp101157,gp121903
//!
//! [default_line_fitting]
//! H1_6563A_b = H1_6563A-N2_6584A-N2_6548A
//! N2_6548A_amp = expr:N2_6584A_amp/2.94
//!
//! ; per-object overrides
//! [gp121903_line_fitting]
//! O2_3726A_m = O2_3726A-O2_3729A
//! ```
//!
//! Keys keep their case, `=` or `:` separates key from value (whichever
//! comes first), lines starting with `;` or `#` are comments and indented
//! lines continue the previous value. Repeated keys inside a section are
//! kept so the resolver can report them against that section only.

use crate::ConfigError;
use crate::ResolverSettings;
use regex_lite::Regex;
use std::path::Path;
use std::sync::{Arc, LazyLock};

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^=:]+?)\s*[=:]\s*(.*)$").expect("entry pattern is valid")
});

/// One `key = value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub key: String,
    pub value: String,
    /// 1-based line number in the source text (0 when synthesized).
    pub line: usize,
}

impl RawEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            line: 0,
        }
    }
}

/// A `[name]` block and its entries in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSection {
    pub name: String,
    pub line: usize,
    pub entries: Vec<RawEntry>,
}

impl DocumentSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            line: 0,
            entries: Vec::new(),
        }
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }
}

/// A parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    sections: Vec<DocumentSection>,
}

/// The line-fitting sections of a document, ready for resolution.
///
/// `defaults` is shared read-only by every section.
#[derive(Debug, Clone)]
pub struct LineFittingSet {
    pub defaults: Arc<Vec<RawEntry>>,
    pub sections: Vec<DocumentSection>,
}

impl ConfigDocument {
    /// Load a document from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let doc = Self::parse(&content)?;
        tracing::debug!(
            path = %path.display(),
            sections = doc.sections.len(),
            "Configuration document loaded"
        );
        Ok(doc)
    }

    /// Parse document text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut sections: Vec<DocumentSection> = Vec::new();
        // Whether the previous significant line was an entry that an
        // indented line may continue.
        let mut continuable = false;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim_end_matches('\r');
            let trimmed = line.trim();

            if trimmed.is_empty() {
                continuable = false;
                continue;
            }
            if trimmed.starts_with(';') || trimmed.starts_with('#') {
                continue;
            }

            let indented = line.starts_with([' ', '\t']);
            if indented && continuable {
                if let Some(entry) = sections.last_mut().and_then(|s| s.entries.last_mut()) {
                    entry.value.push('\n');
                    entry.value.push_str(trimmed);
                }
                continue;
            }

            if let Some(header) = trimmed.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| ConfigError::Syntax {
                        line: line_no,
                        reason: format!("malformed section header '{trimmed}'"),
                    })?;
                if sections.iter().any(|s| s.name == name) {
                    return Err(ConfigError::DuplicateSection {
                        name: name.into(),
                        line: line_no,
                    });
                }
                sections.push(DocumentSection {
                    name: name.into(),
                    line: line_no,
                    entries: Vec::new(),
                });
                continuable = false;
                continue;
            }

            let caps = ENTRY_RE.captures(trimmed).ok_or_else(|| ConfigError::Syntax {
                line: line_no,
                reason: format!("expected 'key = value', got '{trimmed}'"),
            })?;
            let key = caps.get(1).map_or("", |m| m.as_str()).trim();
            let value = caps.get(2).map_or("", |m| m.as_str()).trim();
            let section = sections.last_mut().ok_or_else(|| ConfigError::Syntax {
                line: line_no,
                reason: format!("entry '{key}' appears before any section header"),
            })?;
            section.entries.push(RawEntry {
                key: key.into(),
                value: value.into(),
                line: line_no,
            });
            continuable = true;
        }

        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[DocumentSection] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&DocumentSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Comma-separated list stored at `section.key`, e.g. the object list
    /// of a sample section.
    pub fn list(&self, section: &str, key: &str) -> Option<Vec<String>> {
        let raw = self.section(section)?.get(key)?;
        Some(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    /// Every section whose name ends with the line-fitting suffix.
    ///
    /// The defaults section is excluded unless the settings ask for it.
    pub fn line_fitting(&self, settings: &ResolverSettings) -> LineFittingSet {
        let sections = self
            .sections
            .iter()
            .filter(|s| s.name.ends_with(&settings.section_suffix))
            .filter(|s| settings.include_default_section || s.name != settings.default_section)
            .cloned()
            .collect();
        LineFittingSet {
            defaults: Arc::new(self.defaults(settings)),
            sections,
        }
    }

    /// One section per object, named `<object><suffix>`.
    ///
    /// Objects without their own section get an empty one so that they
    /// still inherit the defaults.
    pub fn line_fitting_for(
        &self,
        settings: &ResolverSettings,
        objects: &[String],
    ) -> LineFittingSet {
        let sections = objects
            .iter()
            .map(|obj| {
                let name = format!("{obj}{}", settings.section_suffix);
                self.section(&name).cloned().unwrap_or_else(|| {
                    tracing::debug!(section = %name, "No section for object, using defaults only");
                    DocumentSection::new(name)
                })
            })
            .collect();
        LineFittingSet {
            defaults: Arc::new(self.defaults(settings)),
            sections,
        }
    }

    fn defaults(&self, settings: &ResolverSettings) -> Vec<RawEntry> {
        self.section(&settings.default_section)
            .map(|s| s.entries.clone())
            .unwrap_or_default()
    }
}
