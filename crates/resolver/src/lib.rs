//! Constraint resolution for line-fitting recipes.
//!
//! A recipe section declares which spectral lines are fitted together and
//! how their Gaussian parameters relate: merged and blended groups,
//! kinematic ties, fixed values, bounds and arithmetic expressions. This
//! crate turns each section into a flat, ordered parameter table that an
//! optimizer can consume directly.
//!
//! # Pipeline
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐
//! │  defaults  │──▶│  classify  │──▶│   groups   │──▶│   graph    │──▶│ FitModel │
//! │  + section │   │  entries   │   │  features  │   │ topo sort  │   │  table   │
//! └────────────┘   └────────────┘   └────────────┘   └────────────┘   └──────────┘
//!                        │                │                │
//!                        └────────────────┴───────┬────────┘
//!                                           ┌─────┴──────┐
//!                                           │SectionErrors│
//!                                           └────────────┘
//! ```
//!
//! Every pass collects its failures instead of stopping at the first one,
//! so a section with several mistakes reports all of them at once. A
//! section with any error produces no model; other sections are unaffected.
//!
//! # Example Recipe
//!
//! ```ini
//! [gp121903_line_fitting]
//! O2_3726A_m = O2_3726A-O2_3729A
//! H1_3712A_kinem = H1_3734A
//! N2_6548A_amp = expr:N2_6584A_amp/2.94
//! H1_6563A_b1_sigma = expr:>2.0*H1_6563A_sigma
//! ```

mod engine;
mod error;
mod eval;
mod graph;
mod groups;
mod model;
mod recipe;
mod section;

pub use engine::{Resolver, SectionResult};
pub use error::{ErrorKind, ResolveError, SectionErrors};
pub use eval::{EvalError, ModelEvaluator, Penalty};
pub use graph::ConstraintGraph;
pub use groups::{ComponentGroup, Feature, FeatureKind};
pub use model::{
    Bound, FitModel, FitParameter, Inequality, KinematicTieRecord, ModelSet, RecipeLine, Role,
};
pub use recipe::{EntryBody, RecipeEntry, RecipeKind, parse_value};
pub use section::{KinematicTie, Origin, ParameterNode, Section, overlay};
