// PathPlan: Constrained path enumeration and multi-commodity flows
// Copyright (C) 2023-2024 The NetSim developers
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! An opaque bridge to the linear-programming solver.
//!
//! The solver is fed a problem in triplet form: variables with bounds and
//! objective coefficients, constraints with row bounds, and a sparse matrix
//! of `(constraint, variable, value)` elements. One [`Problem`] answers one
//! question; re-solve a fresh instance for a changed problem.

use std::time::Duration;

use good_lp::solvers::coin_cbc::coin_cbc;
use good_lp::{constraint, variable, Expression, ProblemVariables, ResolutionError, Solution as _, SolverModel, Variable};

/// Positive infinity, for unbounded variables and rows.
pub const INFINITY: f64 = f64::INFINITY;

/// Negative infinity, for unbounded variables and rows.
pub const NEG_INFINITY: f64 = f64::NEG_INFINITY;

/// How far (in relative terms) a feasible MIP solution may be from
/// optimality: .5% away from the best solution is OK.
pub const DEFAULT_MIP_TOLERANCE_GAP: f64 = 0.005;

/// The direction of the optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Minimise the objective.
    Minimize,
    /// Maximise the objective.
    Maximize,
}

/// Index of a variable (column) of a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableIndex(usize);

/// Index of a constraint (row) of a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintIndex(usize);

/// A single value of the problem matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixElement {
    /// The row of the value.
    pub constraint: ConstraintIndex,
    /// The column of the value.
    pub variable: VariableIndex,
    /// The coefficient.
    pub value: f64,
}

impl MatrixElement {
    /// Create a new matrix element.
    pub fn new(constraint: ConstraintIndex, variable: VariableIndex, value: f64) -> Self {
        Self {
            constraint,
            variable,
            value,
        }
    }
}

/// The outcome class of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// The solution is optimal.
    Optimal,
    /// The solution meets all constraints but may not be optimal.
    Feasible,
    /// The solver found no solution.
    InfeasibleOrUnbounded,
    /// The solver hit its time limit.
    TimedOut,
}

/// The result of solving a [`Problem`].
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    status: SolutionStatus,
    objective_value: f64,
    variables: Vec<f64>,
}

impl Solution {
    /// The outcome class of the solve.
    pub fn status(&self) -> SolutionStatus {
        self.status
    }

    /// True if the solver produced a (feasible or optimal) assignment.
    pub fn is_feasible(&self) -> bool {
        matches!(
            self.status,
            SolutionStatus::Optimal | SolutionStatus::Feasible
        )
    }

    /// The value of the objective function.
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }

    /// The value of a variable. Zero when the solve failed.
    pub fn variable_value(&self, variable: VariableIndex) -> f64 {
        self.variables.get(variable.0).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct VariableDef {
    min: f64,
    max: f64,
    objective: f64,
}

/// A linear program in triplet form.
#[derive(Debug, Clone)]
pub struct Problem {
    direction: Direction,
    variables: Vec<VariableDef>,
    // row bounds, (min, max)
    constraints: Vec<(f64, f64)>,
    matrix: Vec<MatrixElement>,
    objective_offset: f64,
    mip_tolerance_gap: f64,
}

impl Problem {
    /// Create an empty problem.
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            variables: Vec::new(),
            constraints: Vec::new(),
            matrix: Vec::new(),
            objective_offset: 0.0,
            mip_tolerance_gap: DEFAULT_MIP_TOLERANCE_GAP,
        }
    }

    /// Add a new, unbounded variable with a zero objective coefficient.
    pub fn add_variable(&mut self) -> VariableIndex {
        self.variables.push(VariableDef {
            min: NEG_INFINITY,
            max: INFINITY,
            objective: 0.0,
        });
        VariableIndex(self.variables.len() - 1)
    }

    /// Add a new, unbounded constraint (row).
    pub fn add_constraint(&mut self) -> ConstraintIndex {
        self.constraints.push((NEG_INFINITY, INFINITY));
        ConstraintIndex(self.constraints.len() - 1)
    }

    /// Set the range of a variable.
    pub fn set_variable_range(&mut self, variable: VariableIndex, min: f64, max: f64) {
        self.variables[variable.0].min = min;
        self.variables[variable.0].max = max;
    }

    /// Set the range of a constraint.
    pub fn set_constraint_range(&mut self, constraint: ConstraintIndex, min: f64, max: f64) {
        self.constraints[constraint.0] = (min, max);
    }

    /// Set the coefficient of a variable in the objective.
    pub fn set_objective_coefficient(&mut self, variable: VariableIndex, value: f64) {
        self.variables[variable.0].objective = value;
    }

    /// Set a constant offset added to the objective value.
    pub fn set_objective_offset(&mut self, value: f64) {
        self.objective_offset = value;
    }

    /// Set all coefficients of the problem matrix. Replaces any previously
    /// set matrix.
    pub fn set_matrix(&mut self, matrix: Vec<MatrixElement>) {
        self.matrix = matrix;
    }

    /// Set the MIP tolerance gap.
    pub fn set_mip_tolerance_gap(&mut self, gap: f64) {
        self.mip_tolerance_gap = gap;
    }

    /// Solve the problem without a time limit.
    pub fn solve(&self) -> Solution {
        self.solve_with_time_limit(None)
    }

    /// Solve the problem. With a time limit, a solve that runs out of time
    /// reports [`SolutionStatus::TimedOut`].
    pub fn solve_with_time_limit(&self, time_limit: Option<Duration>) -> Solution {
        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = self
            .variables
            .iter()
            .map(|def| {
                let mut definition = variable();
                if def.min.is_finite() {
                    definition = definition.min(def.min);
                }
                if def.max.is_finite() {
                    definition = definition.max(def.max);
                }
                vars.add(definition)
            })
            .collect();

        let objective = self
            .variables
            .iter()
            .zip(&handles)
            .filter(|(def, _)| def.objective != 0.0)
            .fold(Expression::from(0.0), |acc, (def, var)| {
                acc + def.objective * *var
            });

        let unsolved = match self.direction {
            Direction::Minimize => vars.minimise(objective),
            Direction::Maximize => vars.maximise(objective),
        };
        let mut model = coin_cbc(unsolved);
        model.set_parameter("logLevel", "0");
        model.set_parameter("ratio", &self.mip_tolerance_gap.to_string());
        if let Some(limit) = time_limit {
            model.set_parameter("seconds", &limit.as_secs().max(1).to_string());
        }

        let mut rows = vec![Expression::from(0.0); self.constraints.len()];
        for element in &self.matrix {
            rows[element.constraint.0] =
                rows[element.constraint.0].clone() + element.value * handles[element.variable.0];
        }
        for (row, (min, max)) in rows.into_iter().zip(&self.constraints) {
            match (min.is_finite(), max.is_finite()) {
                (true, true) if min == max => {
                    model.add_constraint(constraint!(row == *min));
                }
                (true, true) => {
                    model.add_constraint(constraint!(row.clone() >= *min));
                    model.add_constraint(constraint!(row <= *max));
                }
                (true, false) => {
                    model.add_constraint(constraint!(row >= *min));
                }
                (false, true) => {
                    model.add_constraint(constraint!(row <= *max));
                }
                (false, false) => {}
            }
        }

        match model.solve() {
            Ok(solution) => {
                let variables: Vec<f64> =
                    handles.iter().map(|var| solution.value(*var)).collect();
                let objective_value = self
                    .variables
                    .iter()
                    .zip(&variables)
                    .map(|(def, value)| def.objective * value)
                    .sum::<f64>()
                    + self.objective_offset;
                Solution {
                    status: SolutionStatus::Optimal,
                    objective_value,
                    variables,
                }
            }
            Err(ResolutionError::Infeasible) | Err(ResolutionError::Unbounded) => Solution {
                status: SolutionStatus::InfeasibleOrUnbounded,
                objective_value: 0.0,
                variables: Vec::new(),
            },
            Err(error) => {
                let status = if time_limit.is_some() {
                    SolutionStatus::TimedOut
                } else {
                    log::warn!("solver failed: {error}");
                    SolutionStatus::InfeasibleOrUnbounded
                };
                Solution {
                    status,
                    objective_value: 0.0,
                    variables: Vec::new(),
                }
            }
        }
    }
}
