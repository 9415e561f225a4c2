//! Recipe entry classification.
//!
//! Each `key = value` line of a line-fitting section becomes exactly one
//! [`RecipeEntry`]. The key decides the kind (group, kinematic tie or
//! parameter override); for overrides the value is parsed once into a
//! closed [`ParamRecipe`]:
//!
//! ```text
//! N2_6548A_amp      = expr:N2_6584A_amp/2.94         tied
//! H1_6563A_b1_sigma = expr:>2.0*H1_6563A_sigma       free, with a floor
//! O3_5007A_sigma    = min:0.5,max:3                  bounded
//! He1_5876A_center  = value:5876.2,vary:False        fixed
//! ```

use crate::error::ErrorKind;
use linefit_core::{
    Constraint, ExprError, GroupKind, KeySuffix, LineIdentifier, ParamRecipe, ParamRef,
    RecipeKey, TiedExpr,
};
use serde::{Deserialize, Serialize};

/// Kind of a recipe entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeKind {
    Merged,
    Blended,
    KinematicTie,
    ParamOverride,
}

/// Parsed payload of an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryBody {
    Group {
        kind: GroupKind,
        id: LineIdentifier,
        index: Option<u32>,
        members: Vec<LineIdentifier>,
    },
    Kinematic {
        follower: LineIdentifier,
        leader: LineIdentifier,
    },
    Param {
        target: ParamRef,
        recipe: ParamRecipe,
    },
}

/// One classified configuration line.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeEntry {
    pub key: String,
    pub raw: String,
    pub body: EntryBody,
}

impl RecipeEntry {
    /// Classify a `(key, value)` pair.
    pub fn classify(key: &str, raw: &str) -> Result<Self, ErrorKind> {
        let parsed =
            RecipeKey::parse(key).map_err(|e| ErrorKind::MalformedIdentifier(e.to_string()))?;

        let body = match parsed.suffix {
            KeySuffix::Group { kind, index } => EntryBody::Group {
                kind,
                index,
                members: parse_members(raw)?,
                id: parsed.line,
            },
            KeySuffix::Kinematic => EntryBody::Kinematic {
                leader: LineIdentifier::parse(raw)
                    .map_err(|e| ErrorKind::MalformedIdentifier(format!("kinematic leader {e}")))?,
                follower: parsed.line,
            },
            KeySuffix::Param(param) => EntryBody::Param {
                recipe: parse_value(raw)?,
                target: ParamRef::new(parsed.line, param),
            },
        };

        Ok(Self {
            key: key.trim().to_string(),
            raw: raw.to_string(),
            body,
        })
    }

    pub fn kind(&self) -> RecipeKind {
        match &self.body {
            EntryBody::Group {
                kind: GroupKind::Merged,
                ..
            } => RecipeKind::Merged,
            EntryBody::Group {
                kind: GroupKind::Blended,
                ..
            } => RecipeKind::Blended,
            EntryBody::Kinematic { .. } => RecipeKind::KinematicTie,
            EntryBody::Param { .. } => RecipeKind::ParamOverride,
        }
    }

    /// Canonical value text; parsing it back yields the same body.
    pub fn canonical_value(&self) -> Option<String> {
        match &self.body {
            EntryBody::Group { members, .. } => Some(
                members
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("-"),
            ),
            EntryBody::Kinematic { leader, .. } => Some(leader.to_string()),
            EntryBody::Param { recipe, .. } => recipe.render(),
        }
    }
}

fn parse_members(raw: &str) -> Result<Vec<LineIdentifier>, ErrorKind> {
    raw.split('-')
        .map(str::trim)
        .map(|token| {
            if token.is_empty() {
                return Err(ErrorKind::MalformedIdentifier(format!(
                    "empty member in group list '{raw}'"
                )));
            }
            LineIdentifier::parse(token)
                .map_err(|e| ErrorKind::MalformedIdentifier(format!("group member {e}")))
        })
        .collect()
}

/// Parse an override value into a constraint and optional initial value.
///
/// The value is a comma-separated list of `name:value` pairs where name is
/// one of `value`, `min`, `max`, `vary` or `expr`.
pub fn parse_value(raw: &str) -> Result<ParamRecipe, ErrorKind> {
    let bad = |detail: String| ErrorKind::UnknownValueGrammar(format!("'{raw}': {detail}"));

    let text = raw.trim();
    if text.is_empty() {
        return Err(bad("empty value".into()));
    }

    let mut value = None;
    let mut min = None;
    let mut max = None;
    let mut vary = None;
    let mut expr: Option<TiedExpr> = None;

    for pair in text.split(',').map(str::trim) {
        let (name, body) = pair
            .split_once(':')
            .ok_or_else(|| bad(format!("'{pair}' is not a name:value pair")))?;
        let (name, body) = (name.trim(), body.trim());
        if body.is_empty() || body == "None" {
            return Err(bad(format!("'{name}' has no value")));
        }

        let number = |body: &str| {
            body.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| bad(format!("'{body}' is not a finite number")))
        };

        let repeated = match name {
            "value" => value.replace(number(body)?).is_some(),
            "min" => min.replace(number(body)?).is_some(),
            "max" => max.replace(number(body)?).is_some(),
            "vary" => {
                let flag =
                    parse_bool(body).ok_or_else(|| bad(format!("'{body}' is not a boolean")))?;
                vary.replace(flag).is_some()
            }
            "expr" => expr.replace(TiedExpr::parse(body).map_err(expr_error)?).is_some(),
            other => return Err(bad(format!("unknown attribute '{other}'"))),
        };
        if repeated {
            return Err(bad(format!("'{name}' given more than once")));
        }
    }

    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(bad(format!("min {lo} exceeds max {hi}")));
        }
    }

    let bounded = min.is_some() || max.is_some();
    let constraint = match (expr, vary, bounded) {
        (Some(tied), None, false) => Constraint::Tied(tied),
        (Some(_), _, _) => return Err(bad("expr: only combines with value:".into())),
        (None, Some(false), true) => return Err(bad("vary:False contradicts min:/max:".into())),
        (None, Some(false), false) => match value {
            Some(v) => Constraint::Fixed(v),
            None => return Err(bad("vary:False needs value: to fix the parameter at".into())),
        },
        (None, _, true) => Constraint::Bounded { min, max },
        (None, Some(true), false) => Constraint::Vary(true),
        (None, None, false) => Constraint::Free,
    };

    Ok(ParamRecipe { constraint, value })
}

fn expr_error(err: ExprError) -> ErrorKind {
    match err {
        ExprError::Syntax { .. } => ErrorKind::UnknownValueGrammar(err.to_string()),
        ExprError::Identifier(e) => ErrorKind::MalformedIdentifier(e.to_string()),
        ExprError::NotAParameter(label) => ErrorKind::DanglingReference(format!(
            "'{label}' in expression is not a parameter"
        )),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use linefit_core::{Comparison, ParamName};

    fn recipe(raw: &str) -> ParamRecipe {
        parse_value(raw).unwrap()
    }

    #[test]
    fn classify_kinds() {
        let e = RecipeEntry::classify("O2_3726A_m", "O2_3726A-O2_3729A").unwrap();
        assert_eq!(e.kind(), RecipeKind::Merged);
        let e = RecipeEntry::classify("H1_6563A_b", "H1_6563A-N2_6584A-N2_6548A").unwrap();
        assert_eq!(e.kind(), RecipeKind::Blended);
        let EntryBody::Group { members, id, .. } = &e.body else {
            panic!("expected group");
        };
        assert_eq!(id.to_string(), "H1_6563A");
        assert_eq!(members.len(), 3);

        let e = RecipeEntry::classify("H1_3712A_kinem", "H1_3734A").unwrap();
        assert_eq!(e.kind(), RecipeKind::KinematicTie);

        let e = RecipeEntry::classify("N2_6548A_amp", "expr:N2_6584A_amp/2.94").unwrap();
        assert_eq!(e.kind(), RecipeKind::ParamOverride);
        let EntryBody::Param { target, recipe } = &e.body else {
            panic!("expected param");
        };
        assert_eq!(target.param, ParamName::Amp);
        assert!(recipe.constraint.is_equality_tie());
    }

    #[test]
    fn inequality_expression() {
        let r = recipe("expr:>2.0*H1_6563A_sigma");
        let tied = r.constraint.tied().unwrap();
        assert_eq!(tied.comparison, Comparison::Greater);
        assert!(!r.constraint.is_equality_tie());
    }

    #[test]
    fn value_combinations() {
        assert_eq!(
            recipe("value:5876.2,vary:False").constraint,
            Constraint::Fixed(5876.2)
        );
        assert_eq!(recipe("vary:yes").constraint, Constraint::Vary(true));
        assert_eq!(
            recipe("min:0.5,max:3").constraint,
            Constraint::Bounded {
                min: Some(0.5),
                max: Some(3.0)
            }
        );
        assert_eq!(
            recipe("max:3,vary:True").constraint,
            Constraint::Bounded {
                min: None,
                max: Some(3.0)
            }
        );
        let hint = recipe("value:1.2");
        assert_eq!(hint.constraint, Constraint::Free);
        assert_eq!(hint.value, Some(1.2));

        let tied = recipe("value:1,expr:N2_6584A_amp/3");
        assert!(tied.constraint.is_equality_tie());
        assert_eq!(tied.value, Some(1.0));
    }

    #[test]
    fn continuation_lines_split_like_commas() {
        let r = recipe("min:0,\nmax:5");
        assert_eq!(
            r.constraint,
            Constraint::Bounded {
                min: Some(0.0),
                max: Some(5.0)
            }
        );
    }

    #[test]
    fn rejected_values() {
        for raw in [
            "",
            "3.5",
            "value:",
            "value:None",
            "value:abc",
            "value:nan",
            "min:inf",
            "vary:maybe",
            "value:1,value:2",
            "shape:gaussian",
            "min:5,max:1",
            "expr:N2_6584A_amp,min:0",
            "expr:N2_6584A_amp,vary:False",
            "vary:False,min:0",
            "vary:False",
            "vary:no",
            "expr:1e400*O3_5007A_amp",
            "expr:2*",
        ] {
            assert!(
                matches!(parse_value(raw), Err(ErrorKind::UnknownValueGrammar(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn expression_reference_errors_map_to_kinds() {
        assert!(matches!(
            parse_value("expr:N2_65x4A_amp"),
            Err(ErrorKind::MalformedIdentifier(_))
        ));
        assert!(matches!(
            parse_value("expr:N2_6584A*2"),
            Err(ErrorKind::DanglingReference(_))
        ));
    }

    #[test]
    fn malformed_keys_and_members() {
        assert!(matches!(
            RecipeEntry::classify("O3_50x7A_amp", "value:1"),
            Err(ErrorKind::MalformedIdentifier(_))
        ));
        assert!(matches!(
            RecipeEntry::classify("O3_5007A", "value:1"),
            Err(ErrorKind::MalformedIdentifier(_))
        ));
        assert!(matches!(
            RecipeEntry::classify("H1_6563A_b", "H1_6563A--N2_6584A"),
            Err(ErrorKind::MalformedIdentifier(_))
        ));
        assert!(matches!(
            RecipeEntry::classify("H1_6563A_b", "H1_6563A_b-N2_6584A"),
            Err(ErrorKind::MalformedIdentifier(_))
        ));
        assert!(matches!(
            RecipeEntry::classify("H1_3712A_kinem", "H1_3734A_sigma"),
            Err(ErrorKind::MalformedIdentifier(_))
        ));
    }

    #[test]
    fn canonical_values() {
        let e = RecipeEntry::classify("H1_6563A_b", " H1_6563A - N2_6584A ").unwrap();
        assert_eq!(e.canonical_value().as_deref(), Some("H1_6563A-N2_6584A"));
        let e = RecipeEntry::classify("O3_5007A_sigma", "vary:on, value:2.0").unwrap();
        assert_eq!(e.canonical_value().as_deref(), Some("value:2,vary:True"));
        let e = RecipeEntry::classify("X1_100A_amp", "expr:(X1_200A_amp)*0.5").unwrap();
        assert_eq!(e.canonical_value().as_deref(), Some("expr:X1_200A_amp*0.5"));
    }
}
