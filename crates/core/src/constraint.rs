//! The closed constraint type attached to every parameter node.

use crate::expr::{Comparison, TiedExpr};

/// How the optimizer may move a parameter.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Constraint {
    /// Unconstrained (the default for undeclared parameters).
    #[default]
    Free,
    /// Held at a value.
    Fixed(f64),
    /// Free within optional bounds.
    Bounded { min: Option<f64>, max: Option<f64> },
    /// Defined by (`=`) or bounded by (`>`, `<`) an expression.
    Tied(TiedExpr),
    /// `vary:` without a value: free or held at its default.
    Vary(bool),
}

impl Constraint {
    /// Whether the parameter is an exact function of other parameters.
    pub fn is_equality_tie(&self) -> bool {
        matches!(self, Constraint::Tied(t) if t.comparison == Comparison::Equal)
    }

    pub fn tied(&self) -> Option<&TiedExpr> {
        match self {
            Constraint::Tied(t) => Some(t),
            _ => None,
        }
    }
}

/// A parameter override: constraint plus an optional initial value hint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamRecipe {
    pub constraint: Constraint,
    pub value: Option<f64>,
}

impl ParamRecipe {
    /// Canonical `name:value` text for this recipe.
    ///
    /// Returns `None` for the implicit default (free, no hint), which has
    /// no textual form.
    pub fn render(&self) -> Option<String> {
        let mut parts = Vec::new();
        match &self.constraint {
            Constraint::Free => {
                parts.push(format!("value:{}", self.value?));
            }
            Constraint::Fixed(v) => {
                parts.push(format!("value:{v}"));
                parts.push("vary:False".into());
            }
            Constraint::Bounded { min, max } => {
                if let Some(v) = self.value {
                    parts.push(format!("value:{v}"));
                }
                if let Some(min) = min {
                    parts.push(format!("min:{min}"));
                }
                if let Some(max) = max {
                    parts.push(format!("max:{max}"));
                }
            }
            Constraint::Tied(t) => {
                if let Some(v) = self.value {
                    parts.push(format!("value:{v}"));
                }
                parts.push(format!("expr:{t}"));
            }
            Constraint::Vary(vary) => {
                if let Some(v) = self.value {
                    parts.push(format!("value:{v}"));
                }
                parts.push(format!("vary:{}", if *vary { "True" } else { "False" }));
            }
        }
        Some(parts.join(","))
    }
}
