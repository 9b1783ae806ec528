//! ICU bed capacity planning as a mixed-integer linear program.
//!
//! An [`Instance`](problem::Instance) is read by [`parse`] (or assembled by [`ingest`]),
//! turned into a model by [`IcuModel`](models::IcuModel), solved through a
//! [`SolverAdapter`](solver::SolverAdapter) and decoded into a [`CapacityPlan`](report::CapacityPlan).

pub mod ingest;
pub mod milp;
pub mod models;
pub mod parse;
pub mod problem;
pub mod report;
pub mod solver;

use std::path::Path;

use derive_more::Display;
use log::info;

use crate::models::IcuModel;
use crate::parse::ParseError;
use crate::problem::{Dialect, Instance, ValidationError};
use crate::report::CapacityPlan;
use crate::solver::{SolverAdapter, SolverError, Solved};

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "{}", _0)]
    Parse(ParseError),
    #[display(fmt = "{}", _0)]
    Validation(ValidationError),
    #[display(fmt = "{}", _0)]
    Solver(SolverError),
    #[display(fmt = "I/O error: {}", _0)]
    Io(std::io::Error),
    #[display(fmt = "configuration error: {}", _0)]
    Config(String),
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<SolverError> for Error {
    fn from(e: SolverError) -> Self {
        Self::Solver(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// How a planning run ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Planned(CapacityPlan),
    /// No plan meets the constraints
    Infeasible,
    /// The objective can be improved without limit
    Unbounded,
}

/// Builds the model of an instance, optionally writes it as an LP file, solves it and decodes
/// the plan.
pub fn plan_capacity(
    instance: &Instance,
    dialect: Dialect,
    solver: &dyn SolverAdapter,
    lp_path: Option<&Path>,
) -> Result<Outcome, Error> {
    let icu = IcuModel::build(instance, dialect)?;

    if let Some(path) = lp_path {
        milp::lp_format::write_lp_file(&icu.model, path)?;
        info!("Wrote model to {}", path.display());
    }

    let outcome = match solver.solve(&icu.model)? {
        Solved::Optimal {
            objective,
            assignment,
        } => {
            let solution = icu.decode(&assignment);
            Outcome::Planned(report::decode(instance, &solution, objective))
        }
        Solved::Infeasible => Outcome::Infeasible,
        Solved::Unbounded => Outcome::Unbounded,
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::tests::{equipment, facility};
    use crate::problem::Target;
    use crate::solver::microlp::Microlp;

    #[test]
    fn plans_and_writes_the_model() {
        let instance = Instance::new(
            vec![facility(0.0, 2, 10, vec![5]), facility(1000.0, 1, 5, vec![0])],
            vec![equipment(100.0, 1.0, None)],
            [0],
            Target::Budget(0.0),
        )
        .unwrap();
        let path = std::env::temp_dir().join(format!("icu-capacity-{}.lp", std::process::id()));

        let outcome = plan_capacity(&instance, Dialect::Simple, &Microlp::default(), Some(&path)).unwrap();
        let plan = match outcome {
            Outcome::Planned(plan) => plan,
            other => panic!("expected a plan, got {:?}", other),
        };
        assert_eq!(plan.total_beds, 5);
        assert_eq!(plan.facilities.len(), 1);

        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let model = milp::lp_format::read_lp(&text).unwrap();
        let built = IcuModel::build(&instance, Dialect::Simple).unwrap();
        assert_eq!(model.num_constrs(), built.model.num_constrs());
        assert_eq!(model.vars().len(), built.model.vars().len());
    }

    #[test]
    fn infeasible_runs_have_no_plan() {
        let instance = Instance::new(
            vec![facility(0.0, 0, 3, vec![3])],
            vec![equipment(1.0, 1.0, None)],
            [0],
            Target::Demand(4),
        )
        .unwrap();
        let outcome = plan_capacity(&instance, Dialect::Simple, &Microlp::default(), None).unwrap();
        assert_eq!(outcome, Outcome::Infeasible);
    }

    #[test]
    fn full_dialect_needs_transfer_costs() {
        let instance = Instance::new(
            vec![facility(0.0, 0, 3, vec![3])],
            vec![equipment(1.0, 1.0, None)],
            [0],
            Target::Demand(1),
        )
        .unwrap();
        let err = plan_capacity(&instance, Dialect::Full, &Microlp::default(), None).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::MissingTransferCosts { .. })));
    }
}
