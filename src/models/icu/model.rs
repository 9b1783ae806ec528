use std::collections::HashMap;

use log::{debug, info, trace};

use crate::milp::{Assignment, Constr, LinExpr, Model, ObjSense, Var, VarType};
use crate::models::utils::{AddVars, ConvertVars};
use crate::problem::{Dialect, FacilityIndex, Instance, RequirementIndex, Target, ValidationError};

use super::constraints;
use super::sets::Sets;

/// Handles of every decision variable of the model.
#[derive(Debug, Clone)]
pub struct Variables {
    /// ICU beds at each facility
    pub x: Vec<Var>,
    /// 1 if the facility operates, 0 otherwise
    pub y: Vec<Var>,
    /// Units of each requirement acquired at each facility, indexed `[i][j]`
    pub z: Vec<Vec<Var>>,
    /// Units of each repairable requirement repaired at each facility
    pub w: HashMap<(FacilityIndex, RequirementIndex), Var>,
    /// Units of each mobile requirement sent from one facility to another, keyed `(j, from, to)`
    pub v: HashMap<(RequirementIndex, FacilityIndex, FacilityIndex), Var>,
}

impl Variables {
    /// `sum_l v[j,l,i] - v[j,i,l]` over the partners of `i`; empty when there are no transfers
    pub fn net_inflow(&self, sets: &Sets, j: RequirementIndex, i: FacilityIndex) -> LinExpr {
        let mut expr = LinExpr::new();
        for l in sets.partners(i) {
            if let Some(inflow) = self.v.get(&(j, l, i)) {
                expr.add_term(1.0, *inflow);
            }
            if let Some(outflow) = self.v.get(&(j, i, l)) {
                expr.add_term(-1.0, *outflow);
            }
        }
        expr
    }
}

/// The assembled ICU capacity model together with its variable handles.
#[derive(Debug, Clone)]
pub struct IcuModel {
    pub model: Model,
    pub vars: Variables,
    pub dialect: Dialect,
}

impl IcuModel {
    /// Allocates the variables and adds the objective and every constraint family.
    ///
    /// The simple dialect has neither repair nor transfer variables. The full dialect requires
    /// transfer costs on every mobile requirement.
    pub fn build(instance: &Instance, dialect: Dialect) -> Result<IcuModel, ValidationError> {
        info!("Building ICU capacity model ({} dialect).", dialect);

        if dialect == Dialect::Full {
            if let Some((j, _)) = instance
                .requirements()
                .iter_enumerated()
                .find(|(_, r)| r.kind.is_mobile() && r.transfer.is_none())
            {
                return Err(ValidationError::MissingTransferCosts { requirement: *j });
            }
        }

        let sets = Sets::new(instance);
        let mut model = Model::new(match dialect {
            Dialect::Simple => "max_icu_beds",
            Dialect::Full => "min_costs_icu_beds",
        });

        //*****************CREATE VARIABLES*****************//
        let facilities = sets.F.len();
        let requirements = instance.requirements().len();

        // beds are only kept non-negative by the bed limits when maximising coverage
        let x = match instance.target() {
            Target::Budget(_) => facilities.free_integer(&mut model, "x"),
            Target::Demand(_) => facilities.integer(&mut model, "x"),
        };
        let y = facilities.binary(&mut model, "y");
        let z = (facilities, requirements).integer(&mut model, "z");

        let mut w = HashMap::new();
        let mut v = HashMap::new();
        if dialect == Dialect::Full {
            for i in &sets.F {
                for j in sets.repairable() {
                    let var = model.add_var(
                        format!("w_{}_{}", i, j),
                        VarType::Integer,
                        0.0..=f64::INFINITY,
                    );
                    w.insert((*i, j), var);
                }
            }
            for i in &sets.F {
                for j in sets.mobile() {
                    for l in sets.partners(*i) {
                        let var = model.add_var(
                            format!("v_{}_{}_{}", j, i, l),
                            VarType::Integer,
                            0.0..=f64::INFINITY,
                        );
                        v.insert((j, *i, l), var);
                    }
                }
            }
        }

        let vars = Variables { x, y, z, w, v };
        trace!("Allocated {} variables", model.vars().len());

        //*****************ADD OBJECTIVE AND CONSTRAINTS*****************//
        let mut families: Vec<(&str, Vec<Constr>)> = Vec::new();
        match instance.target() {
            Target::Budget(budget) => {
                let beds: LinExpr = vars.x.iter().copied().sum();
                model.set_objective(beds, ObjSense::Maximize);
                families.push(("budget", constraints::budget(&sets, instance, &vars, budget)));
            }
            Target::Demand(demand) => {
                model.set_objective(constraints::spend(&sets, instance, &vars), ObjSense::Minimize);
                families.push(("demand", constraints::demand(&sets, &vars, demand)));
            }
        }

        families.push((
            "equipment_balance",
            constraints::equipment_balance(&sets, instance, &vars),
        ));
        families.push((
            "infrastructure_balance",
            constraints::infrastructure_balance(&sets, instance, &vars),
        ));
        families.push(("staff_balance", constraints::staff_balance(&sets, instance, &vars)));
        if dialect == Dialect::Full {
            families.push(("repair_ceiling", constraints::repair_ceiling(&sets, instance, &vars)));
            families.push((
                "transfer_ceiling",
                constraints::transfer_ceiling(&sets, instance, &vars),
            ));
        }
        families.push(("bed_limit", constraints::bed_limits(&sets, instance, &vars)));
        families.push(("y_fix", constraints::built_fixing(&sets, &vars)));
        families.push(("y_dependent", constraints::activation(&sets, instance, &vars)));

        for (name, rows) in families {
            debug!("{}: {} rows", name, rows.len());
            model.add_family(name, rows);
        }

        info!(
            "Successfully built ICU capacity model with {} variables and {} constraints.",
            model.vars().len(),
            model.num_constrs()
        );

        Ok(IcuModel {
            model,
            vars,
            dialect,
        })
    }

    /// Reads the values of every decision variable out of a solver assignment
    pub fn decode(&self, assignment: &Assignment) -> IcuSolution {
        IcuSolution {
            x: self.vars.x.convert(assignment),
            y: self.vars.y.convert(assignment),
            z: self.vars.z.convert(assignment),
            w: self.vars.w.convert(assignment),
            v: self.vars.v.convert(assignment),
        }
    }
}

/// Numeric values of the decision variables, in the shape of [`Variables`].
#[derive(Debug, Clone, PartialEq)]
pub struct IcuSolution {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<Vec<f64>>,
    pub w: HashMap<(FacilityIndex, RequirementIndex), f64>,
    pub v: HashMap<(RequirementIndex, FacilityIndex, FacilityIndex), f64>,
}

impl IcuSolution {
    pub fn beds(&self, i: FacilityIndex) -> f64 {
        self.x[*i]
    }

    pub fn is_active(&self, i: FacilityIndex) -> bool {
        self.y[*i] > 0.5
    }

    pub fn acquired(&self, i: FacilityIndex, j: RequirementIndex) -> f64 {
        self.z[*i][*j]
    }

    /// Units repaired; zero where the model has no repair variable
    pub fn repaired(&self, i: FacilityIndex, j: RequirementIndex) -> f64 {
        self.w.get(&(i, j)).copied().unwrap_or(0.0)
    }

    /// Units sent from `from` to `to`; zero where the model has no transfer variable
    pub fn transferred(&self, j: RequirementIndex, from: FacilityIndex, to: FacilityIndex) -> f64 {
        self.v.get(&(j, from, to)).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milp::Sense;
    use crate::problem::tests::{equipment, facility};
    use crate::problem::{Facility, Requirement, RequirementKind, TransferCosts};

    fn simple_instance() -> Instance {
        // scenario with one built and one unbuilt facility and a single equipment type
        Instance::new(
            vec![facility(0.0, 2, 10, vec![5]), facility(1000.0, 1, 5, vec![0])],
            vec![equipment(100.0, 1.0, None)],
            [0],
            Target::Budget(0.0),
        )
        .unwrap()
    }

    fn full_instance() -> Instance {
        let transfer = || Some(TransferCosts::new(vec![vec![0.0, 5.0], vec![7.0, 0.0]]));
        let requirements = vec![
            Requirement {
                kind: RequirementKind::Equipment,
                price: 100.0,
                repair_price: 20.0,
                necessity_rate: 1.0,
                transfer: transfer(),
            },
            Requirement {
                kind: RequirementKind::Infrastructure,
                price: 50.0,
                repair_price: 10.0,
                necessity_rate: 0.5,
                transfer: None,
            },
            Requirement {
                kind: RequirementKind::Staff,
                price: 30.0,
                repair_price: 0.0,
                necessity_rate: 2.0,
                transfer: transfer(),
            },
        ];
        let facilities = vec![
            Facility {
                construction_cost: 0.0,
                min_beds: 0,
                max_beds: 4,
                stock: vec![6, 2, 8],
                broken: vec![1, 1, 0],
            },
            Facility {
                construction_cost: 900.0,
                min_beds: 1,
                max_beds: 6,
                stock: vec![0, 0, 0],
                broken: vec![0, 0, 0],
            },
        ];
        Instance::new(facilities, requirements, [0], Target::Demand(5)).unwrap()
    }

    fn family_sizes(model: &Model) -> Vec<(&str, usize)> {
        model
            .families()
            .iter()
            .map(|f| (f.name.as_str(), f.rows.len()))
            .collect()
    }

    #[test]
    fn simple_model_has_no_repair_or_transfer() {
        let icu = IcuModel::build(&simple_instance(), Dialect::Simple).unwrap();

        assert_eq!(icu.model.sense(), ObjSense::Maximize);
        assert!(icu.vars.w.is_empty());
        assert!(icu.vars.v.is_empty());
        assert_eq!(icu.model.vars().len(), 2 + 2 + 2);
        assert_eq!(
            family_sizes(&icu.model),
            vec![
                ("budget", 1),
                ("equipment_balance", 2),
                ("infrastructure_balance", 0),
                ("staff_balance", 0),
                ("bed_limit", 4),
                ("y_fix", 1),
                ("y_dependent", 4),
            ]
        );

        // beds may be negative in the variable domain, the bed limits keep them in range
        assert_eq!(icu.model.var(icu.vars.x[0]).lb, f64::NEG_INFINITY);
        assert_eq!(icu.model.var(icu.vars.y[1]).vtype, VarType::Binary);
    }

    #[test]
    fn budget_row_prices_construction_and_acquisition() {
        let icu = IcuModel::build(&simple_instance(), Dialect::Simple).unwrap();
        let row = &icu.model.family("budget").unwrap().rows[0];

        // the built facility costs nothing and drops out of the row
        assert_eq!(
            row.expr.terms(),
            &[
                (icu.vars.z[0][0], 100.0),
                (icu.vars.y[1], 1000.0),
                (icu.vars.z[1][0], 100.0)
            ]
        );
        assert_eq!(row.sense, Sense::Le);
        assert_eq!(row.rhs, 0.0);
    }

    #[test]
    fn balance_rows_move_stock_to_the_right() {
        let icu = IcuModel::build(&simple_instance(), Dialect::Simple).unwrap();
        let row = &icu.model.family("equipment_balance").unwrap().rows[0];

        assert_eq!(row.name, "equipment_balance_0_0");
        assert_eq!(row.expr.terms(), &[(icu.vars.z[0][0], 1.0), (icu.vars.x[0], -1.0)]);
        assert_eq!(row.sense, Sense::Ge);
        assert_eq!(row.rhs, -5.0);
    }

    #[test]
    fn full_model_families() {
        let icu = IcuModel::build(&full_instance(), Dialect::Full).unwrap();

        assert_eq!(icu.model.sense(), ObjSense::Minimize);
        // w for E and I at both facilities, v for E and S in both directions
        assert_eq!(icu.vars.w.len(), 4);
        assert_eq!(icu.vars.v.len(), 4);
        assert_eq!(
            family_sizes(&icu.model),
            vec![
                ("demand", 1),
                ("equipment_balance", 2),
                ("infrastructure_balance", 2),
                ("staff_balance", 2),
                ("repair_ceiling", 4),
                ("transfer_ceiling", 2),
                ("bed_limit", 4),
                ("y_fix", 1),
                ("y_dependent", 4),
            ]
        );
    }

    #[test]
    fn full_balance_rows_carry_repair_and_transfer_terms() {
        let icu = IcuModel::build(&full_instance(), Dialect::Full).unwrap();
        let vars = &icu.vars;
        let (f0, f1) = (FacilityIndex::from(0usize), FacilityIndex::from(1usize));
        let (e, i, s) = (
            RequirementIndex::from(0usize),
            RequirementIndex::from(1usize),
            RequirementIndex::from(2usize),
        );

        let equipment = &icu.model.family("equipment_balance").unwrap().rows[0];
        assert_eq!(
            equipment.expr.terms(),
            &[
                (vars.z[0][0], 1.0),
                (vars.w[&(f0, e)], 1.0),
                (vars.v[&(e, f1, f0)], 1.0),
                (vars.v[&(e, f0, f1)], -1.0),
                (vars.x[0], -1.0),
            ]
        );
        assert_eq!(equipment.rhs, -6.0);

        let infrastructure = &icu.model.family("infrastructure_balance").unwrap().rows[1];
        assert_eq!(infrastructure.name, "infrastructure_balance_1_1");
        assert_eq!(
            infrastructure.expr.terms(),
            &[(vars.z[1][1], 1.0), (vars.w[&(f1, i)], 1.0), (vars.x[1], -0.5)]
        );

        let staff = &icu.model.family("staff_balance").unwrap().rows[0];
        assert!(staff.expr.terms().iter().all(|(var, _)| !vars.w.values().any(|w| w == var)));
        assert!(staff.expr.terms().contains(&(vars.v[&(s, f0, f1)], -1.0)));
    }

    #[test]
    fn transfer_ceiling_bounds_equipment_by_existing_stock() {
        let icu = IcuModel::build(&full_instance(), Dialect::Full).unwrap();
        let rows = &icu.model.family("transfer_ceiling").unwrap().rows;

        // staff (requirement 2) is mobile but never ceiled
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["transfer_ceiling_0_0_1", "transfer_ceiling_0_1_0"]);
        let rhs: Vec<f64> = rows.iter().map(|r| r.rhs).collect();
        assert_eq!(rhs, vec![6.0, 0.0]);
        assert!(icu.vars.v.contains_key(&(
            RequirementIndex::from(2usize),
            FacilityIndex::from(0usize),
            FacilityIndex::from(1usize)
        )));
    }

    #[test]
    fn objective_prices_repair_and_transfer() {
        let icu = IcuModel::build(&full_instance(), Dialect::Full).unwrap();
        let vars = &icu.vars;
        let (f0, f1) = (FacilityIndex::from(0usize), FacilityIndex::from(1usize));
        let e = RequirementIndex::from(0usize);
        let terms = icu.model.objective().terms();

        assert!(terms.contains(&(vars.y[1], 900.0)));
        assert!(terms.contains(&(vars.w[&(f0, e)], 20.0)));
        assert!(terms.contains(&(vars.v[&(e, f0, f1)], 5.0)));
        assert!(terms.contains(&(vars.v[&(e, f1, f0)], 7.0)));
        assert!(!terms.iter().any(|(var, _)| *var == vars.y[0]));
    }

    #[test]
    fn activation_rows() {
        let icu = IcuModel::build(&full_instance(), Dialect::Full).unwrap();
        let rows = &icu.model.family("y_dependent").unwrap().rows;

        assert_eq!(rows[0].name, "y_dependent_upper_0");
        assert_eq!(rows[0].expr.terms(), &[(icu.vars.x[0], 0.25), (icu.vars.y[0], -1.0)]);
        assert_eq!(rows[1].name, "y_dependent_lower_0");
        assert_eq!(rows[1].expr.terms(), &[(icu.vars.y[0], 1.0), (icu.vars.x[0], -1.0)]);

        let fixed = &icu.model.family("y_fix").unwrap().rows[0];
        assert_eq!(fixed.name, "y_fix_0");
        assert_eq!(fixed.sense, Sense::Eq);
        assert_eq!(fixed.rhs, 1.0);
    }

    #[test]
    fn zero_capacity_built_facility_has_no_upper_activation_row() {
        let instance = Instance::new(
            vec![facility(0.0, 0, 0, vec![0]), facility(10.0, 0, 3, vec![0])],
            vec![equipment(1.0, 1.0, None)],
            [0],
            Target::Demand(1),
        )
        .unwrap();
        let icu = IcuModel::build(&instance, Dialect::Simple).unwrap();
        let names: Vec<&str> = icu
            .model
            .family("y_dependent")
            .unwrap()
            .rows
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["y_dependent_lower_0", "y_dependent_upper_1", "y_dependent_lower_1"]
        );
    }

    #[test]
    fn full_dialect_requires_transfer_costs() {
        let err = IcuModel::build(&simple_instance(), Dialect::Full).unwrap_err();
        assert_eq!(err, ValidationError::MissingTransferCosts { requirement: 0 });
    }

    #[test]
    fn build_is_deterministic() {
        let first = IcuModel::build(&full_instance(), Dialect::Full).unwrap();
        let second = IcuModel::build(&full_instance(), Dialect::Full).unwrap();
        assert_eq!(first.model, second.model);
    }

    #[test]
    fn decode_reads_values_by_handle() {
        let icu = IcuModel::build(&full_instance(), Dialect::Full).unwrap();
        let mut values = vec![0.0; icu.model.vars().len()];
        values[*icu.vars.x[1]] = 3.0;
        values[*icu.vars.y[1]] = 1.0;
        let (f0, f1) = (FacilityIndex::from(0usize), FacilityIndex::from(1usize));
        let e = RequirementIndex::from(0usize);
        values[*icu.vars.v[&(e, f0, f1)]] = 2.0;

        let solution = icu.decode(&Assignment::new(values));
        assert_eq!(solution.beds(f1), 3.0);
        assert!(solution.is_active(f1));
        assert!(!solution.is_active(f0));
        assert_eq!(solution.transferred(e, f0, f1), 2.0);
        assert_eq!(solution.repaired(f1, RequirementIndex::from(2usize)), 0.0);
    }
}
