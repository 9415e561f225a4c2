//! # linefit core
//!
//! Domain types for the line-fitting constraint resolver: spectral line
//! identifiers, recipe keys, parameter names, expressions and constraints.
//! This crate knows nothing about configuration files or sections; it defines
//! the vocabulary the other crates resolve against.

pub mod constraint;
pub mod error;
pub mod expr;
pub mod key;
pub mod line;
pub mod param;

// Re-export key types at crate root for ergonomics
pub use constraint::{Constraint, ParamRecipe};
pub use error::{ExprError, LineError};
pub use expr::{BinOp, Comparison, Expr, TiedExpr};
pub use key::{GroupKind, KeySuffix, RecipeKey};
pub use line::{LineIdentifier, RECOMBINATION_SPECIES};
pub use param::{ParamName, ParamRef};
