//! One generator per constraint family. Every generator is a pure function of the instance,
//! the index sets and the variable handles, and emits its rows facility-major, then
//! requirement-major, then partner-minor.

use itertools::iproduct;

use crate::milp::{Constr, LinExpr};
use crate::problem::{Cost, Instance, RequirementIndex, Units};

use super::model::Variables;
use super::sets::Sets;

/// Total spend of a plan: construction, acquisition, repair and transfer.
pub fn spend(sets: &Sets, instance: &Instance, vars: &Variables) -> LinExpr {
    let mut expr = LinExpr::new();
    for i in &sets.F {
        expr.add_term(instance.facility(*i).construction_cost, vars.y[**i]);
        for j in sets.requirements() {
            expr.add_term(instance.requirement(j).price, vars.z[**i][*j]);
        }
        // priced per repaired unit; m[i][j] only bounds w
        for j in sets.repairable() {
            if let Some(w) = vars.w.get(&(*i, j)) {
                expr.add_term(instance.requirement(j).repair_price, *w);
            }
        }
        for j in sets.mobile() {
            let transfer = match &instance.requirement(j).transfer {
                Some(transfer) => transfer,
                None => continue,
            };
            for l in sets.partners(*i) {
                if let Some(v) = vars.v.get(&(j, *i, l)) {
                    expr.add_term(transfer.cost(*i, l), *v);
                }
            }
        }
    }
    expr
}

/// Total spend may not exceed the budget
pub fn budget(sets: &Sets, instance: &Instance, vars: &Variables, budget: Cost) -> Vec<Constr> {
    vec![Constr::new(
        "budget",
        spend(sets, instance, vars).leq(budget),
    )]
}

/// At least `demand` beds must be provided in total
pub fn demand(sets: &Sets, vars: &Variables, demand: Units) -> Vec<Constr> {
    let beds: LinExpr = sets.F.iter().map(|i| vars.x[**i]).sum();
    vec![Constr::new("demand", beds.geq(demand as f64))]
}

/// `a[i][j] + z[i,j] (+ w[i,j]) (+ inflow - outflow) >= n[j] x[i]`, with the repair and
/// transfer terms present only where the variables exist.
fn balance(
    family: &str,
    requirements: &[RequirementIndex],
    sets: &Sets,
    instance: &Instance,
    vars: &Variables,
) -> Vec<Constr> {
    iproduct!(&sets.F, requirements)
        .map(|(i, j)| {
            let mut supply = LinExpr::from(instance.stock(*i, *j) as f64) + vars.z[**i][**j];
            if let Some(w) = vars.w.get(&(*i, *j)) {
                supply += *w;
            }
            supply += vars.net_inflow(sets, *j, *i);

            let need = instance.requirement(*j).necessity_rate * vars.x[**i];
            Constr::new(format!("{}_{}_{}", family, i, j), supply.geq(need))
        })
        .collect()
}

pub fn equipment_balance(sets: &Sets, instance: &Instance, vars: &Variables) -> Vec<Constr> {
    balance("equipment_balance", &sets.E, sets, instance, vars)
}

pub fn infrastructure_balance(sets: &Sets, instance: &Instance, vars: &Variables) -> Vec<Constr> {
    balance("infrastructure_balance", &sets.I, sets, instance, vars)
}

pub fn staff_balance(sets: &Sets, instance: &Instance, vars: &Variables) -> Vec<Constr> {
    balance("staff_balance", &sets.S, sets, instance, vars)
}

/// No more units can be repaired than are marked as broken
pub fn repair_ceiling(sets: &Sets, instance: &Instance, vars: &Variables) -> Vec<Constr> {
    let mut rows = Vec::new();
    for i in &sets.F {
        for j in sets.repairable() {
            if let Some(w) = vars.w.get(&(*i, j)) {
                rows.push(Constr::new(
                    format!("repair_ceiling_{}_{}", i, j),
                    LinExpr::from(*w).leq(instance.broken(*i, j) as f64),
                ));
            }
        }
    }
    rows
}

/// A facility cannot send more equipment than it held before the plan. Staff transfers
/// are only limited by the staff balance.
pub fn transfer_ceiling(sets: &Sets, instance: &Instance, vars: &Variables) -> Vec<Constr> {
    let mut rows = Vec::new();
    for i in &sets.F {
        for &j in &sets.E {
            for l in sets.partners(*i) {
                if let Some(v) = vars.v.get(&(j, *i, l)) {
                    rows.push(Constr::new(
                        format!("transfer_ceiling_{}_{}_{}", j, i, l),
                        LinExpr::from(*v).leq(instance.stock(*i, j) as f64),
                    ));
                }
            }
        }
    }
    rows
}

/// `l[i] y[i] <= x[i] <= u[i]`
pub fn bed_limits(sets: &Sets, instance: &Instance, vars: &Variables) -> Vec<Constr> {
    let mut rows = Vec::with_capacity(2 * sets.F.len());
    for i in &sets.F {
        let facility = instance.facility(*i);
        let (x, y) = (vars.x[**i], vars.y[**i]);
        rows.push(Constr::new(
            format!("bed_limit_lower_{}", i),
            (facility.min_beds as f64 * y).leq(x),
        ));
        rows.push(Constr::new(
            format!("bed_limit_upper_{}", i),
            LinExpr::from(x).leq(facility.max_beds as f64),
        ));
    }
    rows
}

/// Built facilities are always active
pub fn built_fixing(sets: &Sets, vars: &Variables) -> Vec<Constr> {
    sets.built_sorted()
        .into_iter()
        .map(|i| Constr::new(format!("y_fix_{}", i), LinExpr::from(vars.y[*i]).equals(1.0)))
        .collect()
}

/// `x[i] / u[i] <= y[i]` and `y[i] <= x[i]`. The first row is left out when `u[i] = 0`,
/// which validation only admits for a built facility without a bed minimum.
pub fn activation(sets: &Sets, instance: &Instance, vars: &Variables) -> Vec<Constr> {
    let mut rows = Vec::with_capacity(2 * sets.F.len());
    for i in &sets.F {
        let (x, y) = (vars.x[**i], vars.y[**i]);
        let max_beds = instance.facility(*i).max_beds;
        if max_beds > 0 {
            rows.push(Constr::new(
                format!("y_dependent_upper_{}", i),
                ((1.0 / max_beds as f64) * x).leq(y),
            ));
        }
        rows.push(Constr::new(
            format!("y_dependent_lower_{}", i),
            LinExpr::from(y).leq(x),
        ));
    }
    rows
}

