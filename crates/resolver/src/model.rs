//! Fit model emission.
//!
//! A [`FitModel`] is the flat, ordered parameter table handed to an
//! external optimizer. Order is deterministic: parameters fit directly
//! come first in declaration order, derived parameters follow by
//! topological rank and then declaration order, so every derived value can
//! be computed in a single forward pass.

use crate::groups::Feature;
use crate::section::{Origin, Section};
use linefit_core::{Comparison, Constraint, LineIdentifier, ParamName, ParamRef};
use serde::{Deserialize, Serialize};

/// How the optimizer treats a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Free,
    Fixed,
    Derived,
}

/// Direction of an inequality penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    /// `expr:>`: the parameter must stay above the expression.
    Floor,
    /// `expr:<`: the parameter must stay below the expression.
    Ceiling,
}

/// An inequality carried by a free parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inequality {
    pub bound: Bound,
    pub expr: String,
    pub references: Vec<String>,
}

/// One row of the emitted parameter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParameter {
    /// `<line>_<param>`, e.g. `H1_6563A_sigma`.
    pub name: String,
    pub line: LineIdentifier,
    pub param: ParamName,
    /// Owning feature id.
    pub feature: String,
    /// Owning group id, when the line belongs to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<f64>,
    /// Defining expression of a derived parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    /// Parameters a derived parameter is computed from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tied_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inequality: Option<Inequality>,
    pub rank: usize,
    pub origin: Origin,
    /// Entry that set the constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A kinematic tie as emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinematicTieRecord {
    pub follower: LineIdentifier,
    pub leader: LineIdentifier,
    /// Follower over leader rest wavelength; converts a shared velocity
    /// structure into wavelength-space center and sigma.
    pub wavelength_ratio: f64,
}

/// A canonical `key = value` entry of the resolved recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub key: String,
    pub value: String,
}

/// The resolved model of one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitModel {
    pub section: String,
    pub features: Vec<Feature>,
    #[serde(default)]
    pub ties: Vec<KinematicTieRecord>,
    pub parameters: Vec<FitParameter>,
    /// Effective entries after inheritance, in canonical form.
    pub entries: Vec<RecipeLine>,
}

impl FitModel {
    /// Flatten a resolved section.
    pub fn from_section(section: &Section) -> Self {
        let nodes = &section.nodes;
        let derived = |i: usize| nodes[i].constraint.is_equality_tie();

        // Initial hints in topological order so derived values can use
        // their parents' hints.
        let mut initial: Vec<Option<f64>> = vec![None; nodes.len()];
        for &i in section.topological_order() {
            let node = &nodes[i];
            let hint = match &node.constraint {
                Constraint::Fixed(v) => Some(*v),
                Constraint::Tied(tied) if tied.comparison == Comparison::Equal => tied
                    .expr
                    .evaluate(&|r: &ParamRef| section.node_index(r).and_then(|j| initial[j]))
                    .or(node.value),
                _ => node.value,
            };
            initial[i] = hint;
        }

        let mut rows: Vec<usize> = (0..nodes.len()).filter(|&i| !derived(i)).collect();
        let mut tail: Vec<usize> = (0..nodes.len()).filter(|&i| derived(i)).collect();
        tail.sort_by_key(|&i| (section.rank(i), i));
        rows.extend(tail);

        let parameters = rows
            .into_iter()
            .map(|i| {
                let node = &nodes[i];
                let feature = &section.features[node.feature];
                let (min, max) = match node.constraint {
                    Constraint::Bounded { min, max } => (min, max),
                    _ => (None, None),
                };
                let role = match &node.constraint {
                    Constraint::Fixed(_) | Constraint::Vary(false) => Role::Fixed,
                    c if c.is_equality_tie() => Role::Derived,
                    _ => Role::Free,
                };
                let tied = node.constraint.tied();
                let references = || {
                    let mut names: Vec<String> = Vec::new();
                    for r in tied.map(|t| t.expr.references()).unwrap_or_default() {
                        let name = r.to_string();
                        if !names.contains(&name) {
                            names.push(name);
                        }
                    }
                    names
                };

                FitParameter {
                    name: node.target.to_string(),
                    line: node.target.line.clone(),
                    param: node.target.param,
                    feature: feature.id.clone(),
                    group: feature.is_group().then(|| feature.id.clone()),
                    role,
                    min,
                    max,
                    initial: initial[i],
                    expr: (role == Role::Derived)
                        .then(|| tied.map(|t| t.expr.to_string()))
                        .flatten(),
                    tied_to: if role == Role::Derived {
                        references()
                    } else {
                        Vec::new()
                    },
                    inequality: tied.filter(|t| t.comparison.is_inequality()).map(|t| {
                        Inequality {
                            bound: if t.comparison == Comparison::Greater {
                                Bound::Floor
                            } else {
                                Bound::Ceiling
                            },
                            expr: t.expr.to_string(),
                            references: references(),
                        }
                    }),
                    rank: section.rank(i),
                    origin: node.origin,
                    key: node.key.clone(),
                }
            })
            .collect();

        let ties = section
            .ties
            .iter()
            .map(|t| KinematicTieRecord {
                follower: t.follower.clone(),
                leader: t.leader.clone(),
                wavelength_ratio: t.follower.rest_wavelength() / t.leader.rest_wavelength(),
            })
            .collect();

        let entries = section
            .entries
            .iter()
            .filter_map(|e| {
                Some(RecipeLine {
                    key: e.key.clone(),
                    value: e.canonical_value()?,
                })
            })
            .collect();

        Self {
            section: section.name.clone(),
            features: section.features.clone(),
            ties,
            parameters,
            entries,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&FitParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn entry(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn count(&self, role: Role) -> usize {
        self.parameters.iter().filter(|p| p.role == role).count()
    }

    /// Parameters the optimizer varies, in table order.
    pub fn free_parameters(&self) -> impl Iterator<Item = &FitParameter> {
        self.parameters.iter().filter(|p| p.role == Role::Free)
    }

    /// The resolved recipe as configuration text. Resolving it again, with
    /// no defaults, yields this model.
    pub fn render_recipe(&self) -> String {
        let mut out = format!("[{}]\n", self.section);
        for entry in &self.entries {
            out.push_str(&entry.key);
            out.push_str(" = ");
            out.push_str(&entry.value);
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Several resolved models in one document.
///
/// TOML has no top-level arrays, so models are written as `[[models]]`
/// tables; concatenating separate model documents would merge them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSet {
    #[serde(default)]
    pub models: Vec<FitModel>,
}

impl ModelSet {
    pub fn new(models: Vec<FitModel>) -> Self {
        Self { models }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use linefit_config::RawEntry;

    fn model(pairs: &[(&str, &str)]) -> FitModel {
        let own: Vec<RawEntry> = pairs.iter().map(|(k, v)| RawEntry::new(*k, *v)).collect();
        let section = Section::build("gp121903_line_fitting", &[], &own, &[]).unwrap();
        FitModel::from_section(&section)
    }

    #[test]
    fn roots_then_derived_by_rank() {
        let m = model(&[
            ("O3_4959A_amp", "expr:O3_5007A_amp/2.98"),
            ("O3_5007A_amp", "value:3.0"),
            ("H1_4861A_amp", "expr:O3_4959A_amp*0.5"),
        ]);
        let derived: Vec<_> = m
            .parameters
            .iter()
            .filter(|p| p.role == Role::Derived)
            .map(|p| (p.name.as_str(), p.rank))
            .collect();
        assert_eq!(derived, [("O3_4959A_amp", 1), ("H1_4861A_amp", 2)]);

        // No root follows a derived parameter.
        let first_derived = m
            .parameters
            .iter()
            .position(|p| p.role == Role::Derived)
            .unwrap();
        assert!(m.parameters[first_derived..]
            .iter()
            .all(|p| p.role == Role::Derived));
        assert_eq!(m.parameters[0].name, "O3_4959A_center");
    }

    #[test]
    fn initial_hints_flow_through_expressions() {
        let m = model(&[
            ("N2_6584A_amp", "value:2.94"),
            ("N2_6548A_amp", "expr:N2_6584A_amp/2.94"),
            ("N2_6548A_center", "value:6548.05,vary:False"),
        ]);
        let p = m.parameter("N2_6548A_amp").unwrap();
        assert_eq!(p.initial, Some(1.0));
        assert_eq!(p.tied_to, ["N2_6584A_amp"]);
        assert_eq!(p.expr.as_deref(), Some("N2_6584A_amp/2.94"));

        let c = m.parameter("N2_6548A_center").unwrap();
        assert_eq!(c.role, Role::Fixed);
        assert_eq!(c.initial, Some(6548.05));
    }

    #[test]
    fn inequality_marks_free_parameter() {
        let m = model(&[
            ("H1_6563A_b", "H1_6563A-H1_6563A_b1"),
            ("H1_6563A_b1_sigma", "expr:>2.0*H1_6563A_sigma"),
        ]);
        let p = m.parameter("H1_6563A_b1_sigma").unwrap();
        assert_eq!(p.role, Role::Free);
        assert!(p.expr.is_none());
        let ineq = p.inequality.as_ref().unwrap();
        assert_eq!(ineq.bound, Bound::Floor);
        assert_eq!(ineq.references, ["H1_6563A_sigma"]);
        assert_eq!(p.group.as_deref(), Some("H1_6563A"));
    }

    #[test]
    fn bounds_and_vary_flags() {
        let m = model(&[
            ("O3_5007A_sigma", "min:0.5,max:3"),
            ("O3_5007A_center", "value:5007.1,vary:False"),
            ("O3_5007A_amp", "vary:True"),
        ]);
        let sigma = m.parameter("O3_5007A_sigma").unwrap();
        assert_eq!((sigma.min, sigma.max), (Some(0.5), Some(3.0)));
        assert_eq!(sigma.role, Role::Free);
        let center = m.parameter("O3_5007A_center").unwrap();
        assert_eq!(center.role, Role::Fixed);
        assert_eq!(center.initial, Some(5007.1));
        assert_eq!(m.parameter("O3_5007A_amp").unwrap().role, Role::Free);
        assert_eq!(m.count(Role::Fixed), 1);
        assert_eq!(m.free_parameters().count(), 4);
    }

    #[test]
    fn kinematic_ratio() {
        let m = model(&[
            ("H1_3734A_amp", "value:1"),
            ("H1_3712A_kinem", "H1_3734A"),
        ]);
        assert_eq!(m.ties.len(), 1);
        assert!((m.ties[0].wavelength_ratio - 3712.0 / 3734.0).abs() < 1e-12);
    }

    #[test]
    fn render_recipe_text() {
        let m = model(&[
            ("O2_3726A_m", "O2_3726A - O2_3729A"),
            ("O2_3726A_sigma", "max:2.5 , min:0.5"),
        ]);
        assert_eq!(
            m.render_recipe(),
            "[gp121903_line_fitting]\nO2_3726A_m = O2_3726A-O2_3729A\nO2_3726A_sigma = min:0.5,max:2.5\n"
        );
        assert_eq!(m.entry("O2_3726A_m"), Some("O2_3726A-O2_3729A"));
    }

    #[test]
    fn serializes_to_json_and_toml() {
        let m = model(&[
            ("O2_3726A_b", "O2_3726A-O2_3729A"),
            ("O2_3729A_amp", "expr:O2_3726A_amp*0.7"),
        ]);
        let json = m.to_json().unwrap();
        let back: FitModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);

        let toml_str = m.to_toml().unwrap();
        assert!(toml_str.contains("section = \"gp121903_line_fitting\""));
        assert!(toml_str.contains("[[parameters]]"));
    }

    #[test]
    fn model_set_keeps_models_apart_in_toml() {
        let a = model(&[("O3_5007A_amp", "value:1")]);
        let mut b = model(&[("O2_3726A_m", "O2_3726A-O2_3729A")]);
        b.section = "gp030321_line_fitting".into();

        let set = ModelSet::new(vec![a.clone(), b.clone()]);
        let text = set.to_toml().unwrap();
        assert!(text.contains("[[models]]"));

        let back = ModelSet::from_toml(&text).unwrap();
        assert_eq!(back.models.len(), 2);
        assert_eq!(back.models[0].section, "gp121903_line_fitting");
        assert_eq!(back.models[1].section, "gp030321_line_fitting");
        assert_eq!(back.models[0].parameters.len(), a.parameters.len());
        assert_eq!(back.models[1].entries, b.entries);
        assert_eq!(back, set);
    }
}
