//! Pure-Rust backend through `good_lp` and its `microlp` solver.

use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError,
    Solution, SolverModel, Variable,
};
use log::{info, warn};

use crate::milp::{Assignment, LinExpr, Model, ObjSense, Sense, VarType};

use super::{SolverAdapter, SolverConfig, SolverError, Solved};

#[derive(Debug, Clone, Default)]
pub struct Microlp {
    config: SolverConfig,
}

impl Microlp {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

fn expression(expr: &LinExpr, handles: &[Variable]) -> Expression {
    let mut out = Expression::from(expr.constant());
    for (var, coef) in expr.terms() {
        out += *coef * handles[**var];
    }
    out
}

impl SolverAdapter for Microlp {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(&self, model: &Model) -> Result<Solved, SolverError> {
        if self.config.time_limit.is_some() {
            warn!("microlp does not support a time limit, solving without one");
        }
        if self.config.verbose {
            warn!("microlp has no solver log to show");
        }
        info!(
            "Solving {} with microlp ({} variables, {} constraints)",
            model.name(),
            model.vars().len(),
            model.num_constrs()
        );

        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = model
            .vars()
            .iter()
            .map(|decl| {
                let def = variable().name(decl.name.clone()).min(decl.lb).max(decl.ub);
                let def = match decl.vtype {
                    VarType::Continuous => def,
                    VarType::Integer => def.integer(),
                    VarType::Binary => def.binary(),
                };
                vars.add(def)
            })
            .collect();

        let objective = expression(model.objective(), &handles);
        let mut problem = match model.sense() {
            ObjSense::Minimize => vars.minimise(objective),
            ObjSense::Maximize => vars.maximise(objective),
        }
        .using(default_solver);

        for constr in model.constrs() {
            let lhs = expression(&constr.expr, &handles);
            let rhs = Expression::from(constr.rhs);
            problem.add_constraint(match constr.sense {
                Sense::Le => constraint::leq(lhs, rhs),
                Sense::Ge => constraint::geq(lhs, rhs),
                Sense::Eq => constraint::eq(lhs, rhs),
            });
        }

        match problem.solve() {
            Ok(solution) => {
                let assignment =
                    Assignment::new(handles.iter().map(|h| solution.value(*h)).collect());
                let objective = model.objective_value(&assignment);
                info!("microlp: optimal, objective {}", objective);
                Ok(Solved::Optimal {
                    objective,
                    assignment,
                })
            }
            Err(ResolutionError::Infeasible) => {
                info!("microlp: infeasible");
                Ok(Solved::Infeasible)
            }
            Err(ResolutionError::Unbounded) => {
                info!("microlp: unbounded");
                Ok(Solved::Unbounded)
            }
            Err(e) => Err(SolverError::Failed(e.to_string())),
        }
    }
}
