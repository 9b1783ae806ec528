//! The boundary between an assembled [`Model`] and the MILP solver that solves it.

pub mod microlp;

#[cfg(feature = "gurobi")]
pub mod gurobi;

use std::{str::FromStr, time::Duration};

use derive_more::Display;

use crate::milp::{Assignment, Model};

/// Settings that cross the solver boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolverConfig {
    /// Wall-clock limit for a single solve
    pub time_limit: Option<Duration>,
    /// Let the solver print its own log
    pub verbose: bool,
}

/// The terminal status of a solve
#[derive(Debug, Clone, PartialEq)]
pub enum Solved {
    Optimal {
        objective: f64,
        assignment: Assignment,
    },
    Infeasible,
    Unbounded,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SolverError {
    /// The solver cannot be reached or invoked
    #[display(fmt = "solver unavailable: {}", _0)]
    Unavailable(String),
    /// The solver ran but reported an error status
    #[display(fmt = "solver failed: {}", _0)]
    Failed(String),
}

impl std::error::Error for SolverError {}

/// Anything that can solve a [`Model`].
pub trait SolverAdapter {
    fn name(&self) -> &'static str;

    /// Solves the model. Infeasible and unbounded models are statuses, not errors.
    fn solve(&self, model: &Model) -> Result<Solved, SolverError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SolverKind {
    #[display(fmt = "microlp")]
    Microlp,
    #[display(fmt = "gurobi")]
    Gurobi,
}

impl FromStr for SolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "microlp" => Ok(SolverKind::Microlp),
            "gurobi" => Ok(SolverKind::Gurobi),
            other => Err(format!("unknown solver '{other}', expected 'microlp' or 'gurobi'")),
        }
    }
}

/// The adapter for a solver backend. Fails with [`SolverError::Unavailable`] when the backend
/// was not compiled in.
pub fn adapter(kind: SolverKind, config: SolverConfig) -> Result<Box<dyn SolverAdapter>, SolverError> {
    match kind {
        SolverKind::Microlp => Ok(Box::new(microlp::Microlp::new(config))),
        #[cfg(feature = "gurobi")]
        SolverKind::Gurobi => Ok(Box::new(gurobi::Gurobi::new(config))),
        #[cfg(not(feature = "gurobi"))]
        SolverKind::Gurobi => Err(SolverError::Unavailable(
            "built without the `gurobi` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_kinds_parse() {
        assert_eq!("microlp".parse::<SolverKind>(), Ok(SolverKind::Microlp));
        assert_eq!("Gurobi".parse::<SolverKind>(), Ok(SolverKind::Gurobi));
        assert!("cplex".parse::<SolverKind>().is_err());
    }

    #[cfg(not(feature = "gurobi"))]
    #[test]
    fn gurobi_needs_the_feature() {
        let err = adapter(SolverKind::Gurobi, SolverConfig::default()).err();
        assert!(matches!(err, Some(SolverError::Unavailable(_))));
    }
}
