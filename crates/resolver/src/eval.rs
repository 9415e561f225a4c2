//! Model evaluation.
//!
//! Expressions are compiled once into slot programs over the parameter
//! table; evaluating a model is then a single forward pass because the
//! table already lists every derived parameter after its inputs.

use crate::model::{Bound, FitModel, Role};
use linefit_core::{BinOp, Expr};
use serde::Serialize;
use std::collections::HashMap;

/// Failures while compiling or evaluating a model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("expected {expected} free values, got {got}")]
    Arity { expected: usize, got: usize },

    #[error("fixed parameter {0} has no value")]
    Unset(String),

    #[error("parameter {0} evaluated to a non-finite value")]
    NonFinite(String),

    #[error("expression for {name} is invalid: {detail}")]
    Expression { name: String, detail: String },
}

/// An expression with references replaced by table slots.
#[derive(Debug, Clone)]
enum Program {
    Num(f64),
    Slot(usize),
    Neg(Box<Program>),
    Binary {
        op: BinOp,
        lhs: Box<Program>,
        rhs: Box<Program>,
    },
}

impl Program {
    /// Compile `text` for the parameter at `slot`; references must point
    /// to earlier slots.
    fn compile(
        text: &str,
        name: &str,
        slot: usize,
        slots: &HashMap<&str, usize>,
    ) -> Result<Self, EvalError> {
        let expr = Expr::parse(text).map_err(|e| EvalError::Expression {
            name: name.to_string(),
            detail: e.to_string(),
        })?;
        Self::lower(&expr, name, slot, slots)
    }

    fn lower(
        expr: &Expr,
        name: &str,
        slot: usize,
        slots: &HashMap<&str, usize>,
    ) -> Result<Self, EvalError> {
        Ok(match expr {
            Expr::Num(n) => Program::Num(*n),
            Expr::Ref(r) => {
                let label = r.to_string();
                match slots.get(label.as_str()) {
                    Some(&s) if s < slot => Program::Slot(s),
                    Some(_) => {
                        return Err(EvalError::Expression {
                            name: name.to_string(),
                            detail: format!("{label} is not computed before {name}"),
                        });
                    }
                    None => {
                        return Err(EvalError::Expression {
                            name: name.to_string(),
                            detail: format!("unknown parameter {label}"),
                        });
                    }
                }
            }
            Expr::Neg(inner) => Program::Neg(Box::new(Self::lower(inner, name, slot, slots)?)),
            Expr::Binary { op, lhs, rhs } => Program::Binary {
                op: *op,
                lhs: Box::new(Self::lower(lhs, name, slot, slots)?),
                rhs: Box::new(Self::lower(rhs, name, slot, slots)?),
            },
        })
    }

    fn run(&self, values: &[f64]) -> f64 {
        match self {
            Program::Num(n) => *n,
            Program::Slot(s) => values[*s],
            Program::Neg(inner) => -inner.run(values),
            Program::Binary { op, lhs, rhs } => op.apply(lhs.run(values), rhs.run(values)),
        }
    }
}

#[derive(Debug, Clone)]
enum Step {
    Free,
    Fixed(Option<f64>),
    Derived(Program),
}

#[derive(Debug, Clone)]
struct Check {
    slot: usize,
    bound: Bound,
    limit: Program,
}

/// A violated inequality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Penalty {
    pub parameter: String,
    pub bound: Bound,
    pub limit: f64,
    pub value: f64,
    /// Distance past the limit (always positive).
    pub violation: f64,
}

/// Compiled evaluator for one [`FitModel`].
#[derive(Debug, Clone)]
pub struct ModelEvaluator {
    names: Vec<String>,
    steps: Vec<Step>,
    free: usize,
    checks: Vec<Check>,
}

impl FitModel {
    /// Compile the model's expressions.
    pub fn evaluator(&self) -> Result<ModelEvaluator, EvalError> {
        let slots: HashMap<&str, usize> = self
            .parameters
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.as_str(), i))
            .collect();
        let len = self.parameters.len();

        let mut steps = Vec::with_capacity(len);
        let mut checks = Vec::new();
        for (i, p) in self.parameters.iter().enumerate() {
            let step = match p.role {
                Role::Free => Step::Free,
                Role::Fixed => Step::Fixed(p.initial),
                Role::Derived => {
                    let text = p.expr.as_deref().ok_or_else(|| EvalError::Expression {
                        name: p.name.clone(),
                        detail: "derived parameter without expression".into(),
                    })?;
                    Step::Derived(Program::compile(text, &p.name, i, &slots)?)
                }
            };
            steps.push(step);

            if let Some(ineq) = &p.inequality {
                checks.push(Check {
                    slot: i,
                    bound: ineq.bound,
                    // Inequalities are checked after the full pass.
                    limit: Program::compile(&ineq.expr, &p.name, len, &slots)?,
                });
            }
        }

        Ok(ModelEvaluator {
            names: self.parameters.iter().map(|p| p.name.clone()).collect(),
            free: steps.iter().filter(|s| matches!(s, Step::Free)).count(),
            steps,
            checks,
        })
    }
}

impl ModelEvaluator {
    /// Names of the free parameters, in the order `evaluate` expects.
    pub fn free_names(&self) -> Vec<&str> {
        self.names
            .iter()
            .zip(&self.steps)
            .filter(|(_, s)| matches!(s, Step::Free))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Values for every parameter in table order, given the free values.
    pub fn evaluate(&self, free: &[f64]) -> Result<Vec<f64>, EvalError> {
        if free.len() != self.free {
            return Err(EvalError::Arity {
                expected: self.free,
                got: free.len(),
            });
        }

        let mut free_values = free.iter().copied();
        let mut values = Vec::with_capacity(self.steps.len());
        for (name, step) in self.names.iter().zip(&self.steps) {
            let value = match step {
                Step::Free => free_values.next().unwrap_or(f64::NAN),
                Step::Fixed(Some(v)) => *v,
                Step::Fixed(None) => return Err(EvalError::Unset(name.clone())),
                Step::Derived(program) => program.run(&values),
            };
            if !value.is_finite() {
                return Err(EvalError::NonFinite(name.clone()));
            }
            values.push(value);
        }
        Ok(values)
    }

    /// Violated inequalities for a full value vector from [`evaluate`].
    ///
    /// [`evaluate`]: ModelEvaluator::evaluate
    pub fn penalties(&self, values: &[f64]) -> Result<Vec<Penalty>, EvalError> {
        if values.len() != self.steps.len() {
            return Err(EvalError::Arity {
                expected: self.steps.len(),
                got: values.len(),
            });
        }

        let mut out = Vec::new();
        for check in &self.checks {
            let name = &self.names[check.slot];
            let limit = check.limit.run(values);
            if !limit.is_finite() {
                return Err(EvalError::NonFinite(format!("inequality limit of {name}")));
            }
            let value = values[check.slot];
            let violation = match check.bound {
                Bound::Floor => limit - value,
                Bound::Ceiling => value - limit,
            };
            if violation > 0.0 {
                out.push(Penalty {
                    parameter: name.clone(),
                    bound: check.bound,
                    limit,
                    value,
                    violation,
                });
            }
        }
        Ok(out)
    }
}
