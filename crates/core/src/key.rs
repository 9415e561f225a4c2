//! Recipe key grammar.
//!
//! ```text
//! key     = line ['_' component] ['_' recipe]
//! recipe  = "b" | "m" | "kinem" | param
//! param   = "amp" | "center" | "sigma" | "cont_slope" | "cont_intercept"
//! ```
//!
//! Keys are matched from the right so that the two-token parameter names
//! (`cont_slope`, `cont_intercept`) are recognised as one suffix. A key that
//! names a line with a `b<N>`/`m<N>` component and no recipe is an indexed
//! group declaration.

use crate::error::LineError;
use crate::line::LineIdentifier;
use crate::param::ParamName;
use std::fmt;

/// Group flavour declared by `_m` / `_b` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// One fitted profile represents the whole feature.
    Merged,
    /// Separate overlapping profiles sum to the observed feature.
    Blended,
}

impl GroupKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            GroupKind::Merged => "m",
            GroupKind::Blended => "b",
        }
    }
}

/// What a recipe key declares about its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySuffix {
    /// `_m`, `_b` or an indexed `_b<N>` / `_m<N>` group declaration.
    Group { kind: GroupKind, index: Option<u32> },
    /// `_kinem`.
    Kinematic,
    /// A parameter override.
    Param(ParamName),
}

/// A parsed configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeKey {
    pub line: LineIdentifier,
    pub suffix: KeySuffix,
}

impl RecipeKey {
    pub fn parse(key: &str) -> Result<Self, LineError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(LineError::Empty);
        }

        // Longest suffixes first: `cont_slope` before anything shorter.
        for param in [ParamName::ContSlope, ParamName::ContIntercept]
            .into_iter()
            .chain(ParamName::PROFILE)
        {
            if let Some(head) = strip_token(key, param.as_str()) {
                return Ok(Self {
                    line: LineIdentifier::parse(head)?,
                    suffix: KeySuffix::Param(param),
                });
            }
        }

        if let Some(head) = strip_token(key, "kinem") {
            return Ok(Self {
                line: LineIdentifier::parse(head)?,
                suffix: KeySuffix::Kinematic,
            });
        }

        for kind in [GroupKind::Blended, GroupKind::Merged] {
            if let Some(head) = strip_token(key, kind.suffix()) {
                return Ok(Self {
                    line: LineIdentifier::parse(head)?,
                    suffix: KeySuffix::Group { kind, index: None },
                });
            }
        }

        let line = LineIdentifier::parse(key)?;
        let indexed = line.component().and_then(|comp| {
            let (head, digits) = comp.split_at(1);
            let kind = match head {
                "b" => GroupKind::Blended,
                "m" => GroupKind::Merged,
                _ => return None,
            };
            digits.parse().ok().map(|index| (kind, index))
        });
        match indexed {
            Some((kind, index)) => Ok(Self {
                line,
                suffix: KeySuffix::Group {
                    kind,
                    index: Some(index),
                },
            }),
            None => Err(LineError::MissingRecipe { label: key.into() }),
        }
    }
}

fn strip_token<'a>(key: &'a str, token: &str) -> Option<&'a str> {
    key.strip_suffix(token)?.strip_suffix('_')
}

impl fmt::Display for RecipeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suffix {
            KeySuffix::Group { index: Some(_), .. } => write!(f, "{}", self.line),
            KeySuffix::Group { kind, index: None } => write!(f, "{}_{}", self.line, kind.suffix()),
            KeySuffix::Kinematic => write!(f, "{}_kinem", self.line),
            KeySuffix::Param(p) => write!(f, "{}_{}", self.line, p),
        }
    }
}
