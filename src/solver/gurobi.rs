//! Gurobi backend through `grb`. Needs a Gurobi installation and licence at run time.

use grb::expr::LinExpr as GrbLinExpr;
use grb::prelude::*;
use log::info;

use crate::milp::{self, Assignment, Model as MilpModel, ObjSense, Sense};

use super::{SolverAdapter, SolverConfig, SolverError, Solved};

#[derive(Debug, Clone, Default)]
pub struct Gurobi {
    config: SolverConfig,
}

impl Gurobi {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    fn expression(expr: &milp::LinExpr, handles: &[Var]) -> GrbLinExpr {
        let mut out = GrbLinExpr::new();
        for (var, coef) in expr.terms() {
            out.add_term(*coef, handles[**var]);
        }
        out.add_constant(expr.constant());
        out
    }

    fn run(&self, source: &MilpModel, model: &mut Model) -> grb::Result<Solved> {
        model.set_param(param::OutputFlag, self.config.verbose as i32)?;
        // tell infeasible and unbounded models apart
        model.set_param(param::DualReductions, 0)?;
        if let Some(limit) = self.config.time_limit {
            model.set_param(param::TimeLimit, limit.as_secs_f64())?;
        }

        let mut handles = Vec::with_capacity(source.vars().len());
        for decl in source.vars() {
            let vtype = match decl.vtype {
                milp::VarType::Continuous => VarType::Continuous,
                milp::VarType::Integer => VarType::Integer,
                milp::VarType::Binary => VarType::Binary,
            };
            handles.push(model.add_var(
                &decl.name,
                vtype,
                0.0,
                decl.lb,
                decl.ub,
                std::iter::empty(),
            )?);
        }

        for constr in source.constrs() {
            let lhs = Self::expression(&constr.expr, &handles);
            let rhs = constr.rhs;
            match constr.sense {
                Sense::Le => model.add_constr(&constr.name, c!(lhs <= rhs))?,
                Sense::Ge => model.add_constr(&constr.name, c!(lhs >= rhs))?,
                Sense::Eq => model.add_constr(&constr.name, c!(lhs == rhs))?,
            };
        }

        let sense = match source.sense() {
            ObjSense::Minimize => ModelSense::Minimize,
            ObjSense::Maximize => ModelSense::Maximize,
        };
        model.set_objective(Self::expression(source.objective(), &handles), sense)?;

        model.optimize()?;
        let solved = match model.status()? {
            Status::Optimal => {
                let mut values = Vec::with_capacity(handles.len());
                for var in &handles {
                    values.push(model.get_obj_attr(attr::X, var)?);
                }
                Solved::Optimal {
                    objective: model.get_attr(attr::ObjVal)?,
                    assignment: Assignment::new(values),
                }
            }
            Status::Infeasible => Solved::Infeasible,
            Status::Unbounded => Solved::Unbounded,
            other => {
                return Err(grb::Error::FromAPI(
                    format!("unexpected status {:?}", other),
                    0,
                ))
            }
        };
        Ok(solved)
    }
}

impl SolverAdapter for Gurobi {
    fn name(&self) -> &'static str {
        "gurobi"
    }

    fn solve(&self, source: &MilpModel) -> Result<Solved, SolverError> {
        info!(
            "Solving {} with gurobi ({} variables, {} constraints)",
            source.name(),
            source.vars().len(),
            source.num_constrs()
        );

        let mut model =
            Model::new(source.name()).map_err(|e| SolverError::Unavailable(e.to_string()))?;
        let solved = self
            .run(source, &mut model)
            .map_err(|e| SolverError::Failed(e.to_string()))?;

        match &solved {
            Solved::Optimal { objective, .. } => info!("gurobi: optimal, objective {}", objective),
            Solved::Infeasible => info!("gurobi: infeasible"),
            Solved::Unbounded => info!("gurobi: unbounded"),
        }
        Ok(solved)
    }
}
