//! Thin model-building wrapper around the MILP backend.
//!
//! Declares binary/integer variables by name, accumulates linear
//! constraints and solves a minimization program. Infeasible, unbounded or
//! otherwise failed solves yield `None` — "no solution" is an expected
//! outcome for callers, never an error.
//!
//! Everything backend-specific is contained here; swapping the solver
//! means editing this module only. Constraints and objectives are built
//! with the re-exported [`constraint!`] macro and [`Expression`] type.

use std::collections::BTreeMap;

use good_lp::{default_solver, variable, variables, ProblemVariables, Solution, SolverModel};
use tracing::warn;

pub use good_lp::{constraint, Constraint, Expression, Variable};

/// A minimization program under construction.
pub struct LinearModel {
    vars: ProblemVariables,
    by_name: BTreeMap<String, Variable>,
    constraints: Vec<Constraint>,
}

impl LinearModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self {
            vars: variables!(),
            by_name: BTreeMap::new(),
            constraints: Vec::new(),
        }
    }

    /// Declares a binary variable.
    pub fn binary(&mut self, name: impl Into<String>) -> Variable {
        let var = self.vars.add(variable().binary());
        self.by_name.insert(name.into(), var);
        var
    }

    /// Declares a bounded integer variable.
    pub fn integer(&mut self, name: impl Into<String>, min: i32, max: i32) -> Variable {
        let var = self
            .vars
            .add(variable().integer().min(min as f64).max(max as f64));
        self.by_name.insert(name.into(), var);
        var
    }

    /// Looks up a declared variable by name.
    pub fn var(&self, name: &str) -> Option<Variable> {
        self.by_name.get(name).copied()
    }

    /// Adds a linear constraint.
    pub fn add_constr(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Number of declared variables.
    pub fn num_vars(&self) -> usize {
        self.by_name.len()
    }

    /// Solves `minimize objective` subject to the added constraints.
    ///
    /// Returns `None` when the backend reports no usable solution.
    pub fn minimize(self, objective: Expression) -> Option<SolvedModel> {
        let mut model = self.vars.minimise(objective).using(default_solver);
        for constraint in self.constraints {
            model = model.with(constraint);
        }
        match model.solve() {
            Ok(solution) => {
                let values = self
                    .by_name
                    .into_iter()
                    .map(|(name, var)| (name, solution.value(var)))
                    .collect();
                Some(SolvedModel { values })
            }
            Err(err) => {
                warn!(error = %err, "solve failed, no assignment this cycle");
                None
            }
        }
    }
}

impl Default for LinearModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Variable values of a solved model.
#[derive(Debug, Clone)]
pub struct SolvedModel {
    values: BTreeMap<String, f64>,
}

impl SolvedModel {
    /// Value of a variable by name; 0.0 for unknown names.
    pub fn value(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    /// Whether a binary variable rounds to 1.
    pub fn is_one(&self, name: &str) -> bool {
        self.value(name) > 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_choice() {
        let mut model = LinearModel::new();
        let x1 = model.binary("x1");
        let x2 = model.binary("x2");
        model.add_constr(constraint!(x1 + x2 == 1.0));

        let solved = model.minimize(3.0 * x1 + 1.0 * x2).unwrap();
        assert!(!solved.is_one("x1"));
        assert!(solved.is_one("x2"));
    }

    #[test]
    fn test_bounded_integer() {
        let mut model = LinearModel::new();
        let u = model.integer("u", 0, 5);
        model.add_constr(constraint!(u >= 3.0));

        let solved = model.minimize(Expression::from(u)).unwrap();
        assert!((solved.value("u") - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible_yields_none() {
        let mut model = LinearModel::new();
        let x = model.binary("x");
        model.add_constr(constraint!(x >= 2.0));

        assert!(model.minimize(Expression::from(x)).is_none());
    }

    #[test]
    fn test_unknown_name_defaults_to_zero() {
        let mut model = LinearModel::new();
        let x = model.binary("x");
        model.add_constr(constraint!(x >= 1.0));
        let solved = model.minimize(Expression::from(x)).unwrap();
        assert_eq!(solved.value("nope"), 0.0);
        assert!(solved.is_one("x"));
    }
}
