//! Error types for the linefit domain.
//!
//! Uses `thiserror` for ergonomic error definitions. These are the
//! text-level failures (labels and expressions); section-level resolution
//! errors live in `linefit-resolver`.

use thiserror::Error;

/// Result type alias for label parsing.
pub type Result<T> = std::result::Result<T, LineError>;

/// A line label or recipe key that does not follow the identifier grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("empty label")]
    Empty,

    #[error("'{label}': species token is empty")]
    EmptySpecies { label: String },

    #[error("'{label}': species '{species}' must be letters followed by an ionization digit")]
    InvalidSpecies { label: String, species: String },

    #[error("'{label}': wavelength token '{token}' is not numeric")]
    InvalidWavelength { label: String, token: String },

    #[error("'{label}': unknown suffix '{suffix}'")]
    UnknownSuffix { label: String, suffix: String },

    #[error("'{label}': names a line but carries no recipe suffix")]
    MissingRecipe { label: String },
}

/// Failures while parsing an `expr:` body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("expression syntax error in '{input}': {detail}")]
    Syntax { input: String, detail: String },

    #[error("expression reference is malformed: {0}")]
    Identifier(#[from] LineError),

    #[error("expression reference '{0}' does not name a parameter")]
    NotAParameter(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_error_displays_label() {
        let err = LineError::InvalidWavelength {
            label: "O3_50x7A".into(),
            token: "50x7A".into(),
        };
        assert!(err.to_string().contains("O3_50x7A"));
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn expr_error_wraps_line_error() {
        let err: ExprError = LineError::Empty.into();
        assert!(err.to_string().contains("empty label"));
    }
}
