//! Fit parameters attached to a spectral line.

use crate::error::{ExprError, LineError};
use crate::key::{KeySuffix, RecipeKey};
use crate::line::LineIdentifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The parameters a line profile (or its local continuum) carries.
///
/// Declaration order here is the emission order within one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamName {
    Amp,
    Center,
    Sigma,
    ContSlope,
    ContIntercept,
}

impl ParamName {
    pub const ALL: [ParamName; 5] = [
        ParamName::Amp,
        ParamName::Center,
        ParamName::Sigma,
        ParamName::ContSlope,
        ParamName::ContIntercept,
    ];

    /// Gaussian profile parameters, one set per line.
    pub const PROFILE: [ParamName; 3] = [ParamName::Amp, ParamName::Center, ParamName::Sigma];

    /// Parameters shared through a kinematic tie.
    pub const KINEMATIC: [ParamName; 2] = [ParamName::Center, ParamName::Sigma];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamName::Amp => "amp",
            ParamName::Center => "center",
            ParamName::Sigma => "sigma",
            ParamName::ContSlope => "cont_slope",
            ParamName::ContIntercept => "cont_intercept",
        }
    }

    /// Match a key suffix (without the leading underscore).
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == suffix)
    }

    /// Continuum parameters belong to a whole fit window, not to one line.
    pub fn is_continuum(&self) -> bool {
        matches!(self, ParamName::ContSlope | ParamName::ContIntercept)
    }

    /// Position within [`ParamName::ALL`].
    pub fn ordinal(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to one parameter of one line, e.g. `N2_6584A_amp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamRef {
    pub line: LineIdentifier,
    pub param: ParamName,
}

impl ParamRef {
    pub fn new(line: LineIdentifier, param: ParamName) -> Self {
        Self { line, param }
    }

    /// Parse a parameter label as it appears inside an expression.
    pub fn parse(label: &str) -> Result<Self, ExprError> {
        let key = RecipeKey::parse(label).map_err(|e| match e {
            LineError::MissingRecipe { .. } => ExprError::NotAParameter(label.into()),
            other => ExprError::Identifier(other),
        })?;
        match key.suffix {
            KeySuffix::Param(param) => Ok(Self {
                line: key.line,
                param,
            }),
            _ => Err(ExprError::NotAParameter(label.into())),
        }
    }
}

impl fmt::Display for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.line, self.param)
    }
}
