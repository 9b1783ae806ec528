//! A solver-independent mixed-integer linear program.
//!
//! The ICU model is assembled here first and only translated into a concrete solver's
//! representation at the `SolverAdapter` boundary. Keeping the model as plain data makes
//! it possible to write it out as an LP artifact, read it back, and check a returned
//! assignment against every row without any solver present.

pub mod lp_format;

use std::{
    collections::HashMap,
    iter::Sum,
    ops::{Add, AddAssign, Index, Mul, Neg, RangeInclusive, Sub, SubAssign},
};

use derive_more::{Deref, Display, From, Into};

/// Handle of a variable, dense index into the model's variable table.
#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct Var(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum VarType {
    Continuous,
    Integer,
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub vtype: VarType,
    pub lb: f64,
    pub ub: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ObjSense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Sense {
    #[display(fmt = "<=")]
    Le,
    #[display(fmt = ">=")]
    Ge,
    #[display(fmt = "=")]
    Eq,
}

/// A linear expression `sum(coef * var) + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(Var, f64)>,
    constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terms(&self) -> &[(Var, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn add_term(&mut self, coef: f64, var: Var) {
        self.terms.push((var, coef));
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Evaluates the expression for the given variable values
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coef)| coef * values[**var])
            .sum::<f64>()
            + self.constant
    }

    /// Merges duplicate variables (keeping first-occurrence order) and drops zero terms.
    fn normalized(self) -> LinExpr {
        let mut position: HashMap<Var, usize> = HashMap::new();
        let mut terms: Vec<(Var, f64)> = Vec::with_capacity(self.terms.len());
        for (var, coef) in self.terms {
            match position.get(&var) {
                Some(&k) => terms[k].1 += coef,
                None => {
                    position.insert(var, terms.len());
                    terms.push((var, coef));
                }
            }
        }
        terms.retain(|(_, coef)| *coef != 0.0);

        LinExpr {
            terms,
            constant: self.constant,
        }
    }

    fn compare(self, sense: Sense, rhs: impl Into<LinExpr>) -> Row {
        let expr = (self - rhs.into()).normalized();
        let rhs = 0.0 - expr.constant;
        Row {
            expr: LinExpr {
                terms: expr.terms,
                constant: 0.0,
            },
            sense,
            rhs,
        }
    }

    pub fn leq(self, rhs: impl Into<LinExpr>) -> Row {
        self.compare(Sense::Le, rhs)
    }

    pub fn geq(self, rhs: impl Into<LinExpr>) -> Row {
        self.compare(Sense::Ge, rhs)
    }

    pub fn equals(self, rhs: impl Into<LinExpr>) -> Row {
        self.compare(Sense::Eq, rhs)
    }
}

impl From<Var> for LinExpr {
    fn from(var: Var) -> Self {
        LinExpr {
            terms: vec![(var, 1.0)],
            constant: 0.0,
        }
    }
}

impl From<f64> for LinExpr {
    fn from(constant: f64) -> Self {
        LinExpr {
            terms: Vec::new(),
            constant,
        }
    }
}

impl<T: Into<LinExpr>> Add<T> for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: T) -> LinExpr {
        self += rhs;
        self
    }
}

impl<T: Into<LinExpr>> AddAssign<T> for LinExpr {
    fn add_assign(&mut self, rhs: T) {
        let rhs = rhs.into();
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}

impl<T: Into<LinExpr>> Sub<T> for LinExpr {
    type Output = LinExpr;

    fn sub(mut self, rhs: T) -> LinExpr {
        self -= rhs;
        self
    }
}

impl<T: Into<LinExpr>> SubAssign<T> for LinExpr {
    fn sub_assign(&mut self, rhs: T) {
        let rhs: LinExpr = rhs.into();
        *self += -rhs;
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;

    fn neg(self) -> LinExpr {
        self * -1.0
    }
}

impl Mul<f64> for LinExpr {
    type Output = LinExpr;

    fn mul(mut self, rhs: f64) -> LinExpr {
        for (_, coef) in self.terms.iter_mut() {
            *coef *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl Mul<Var> for f64 {
    type Output = LinExpr;

    fn mul(self, var: Var) -> LinExpr {
        LinExpr {
            terms: vec![(var, self)],
            constant: 0.0,
        }
    }
}

impl Sum for LinExpr {
    fn sum<I: Iterator<Item = LinExpr>>(iter: I) -> Self {
        let mut total = LinExpr::new();
        for expr in iter {
            total += expr;
        }
        total
    }
}

impl Sum<Var> for LinExpr {
    fn sum<I: Iterator<Item = Var>>(iter: I) -> Self {
        LinExpr {
            terms: iter.map(|var| (var, 1.0)).collect(),
            constant: 0.0,
        }
    }
}

/// A normalized comparison: variables on the left, the constant on the right.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

/// A named row of the model
#[derive(Debug, Clone, PartialEq)]
pub struct Constr {
    pub name: String,
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constr {
    pub fn new(name: impl Into<String>, row: Row) -> Constr {
        Constr {
            name: name.into(),
            expr: row.expr,
            sense: row.sense,
            rhs: row.rhs,
        }
    }

    /// Whether the row holds for the given values, within `tol`
    pub fn is_satisfied(&self, values: &[f64], tol: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tol,
            Sense::Ge => lhs >= self.rhs - tol,
            Sense::Eq => (lhs - self.rhs).abs() <= tol,
        }
    }
}

/// A group of rows generated by the same rule
#[derive(Debug, Clone, PartialEq)]
pub struct Family {
    pub name: String,
    pub rows: Vec<Constr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    name: String,
    vars: Vec<VarDecl>,
    sense: ObjSense,
    objective: LinExpr,
    families: Vec<Family>,
}

impl Model {
    pub fn new(name: &str) -> Model {
        Model {
            name: name.to_string(),
            vars: Vec::new(),
            sense: ObjSense::Minimize,
            objective: LinExpr::new(),
            families: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_var(&mut self, name: impl Into<String>, vtype: VarType, bounds: RangeInclusive<f64>) -> Var {
        let (lb, ub) = match vtype {
            VarType::Binary => (bounds.start().max(0.0), bounds.end().min(1.0)),
            _ => bounds.into_inner(),
        };
        self.vars.push(VarDecl {
            name: name.into(),
            vtype,
            lb,
            ub,
        });
        Var(self.vars.len() - 1)
    }

    pub fn vars(&self) -> &[VarDecl] {
        &self.vars
    }

    pub fn var(&self, var: Var) -> &VarDecl {
        &self.vars[*var]
    }

    /// Looks a variable up by name
    pub fn var_by_name(&self, name: &str) -> Option<Var> {
        self.vars.iter().position(|decl| decl.name == name).map(Var)
    }

    pub fn set_objective(&mut self, expr: LinExpr, sense: ObjSense) {
        self.objective = expr.normalized();
        self.sense = sense;
    }

    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    pub fn sense(&self) -> ObjSense {
        self.sense
    }

    /// Appends a named family of rows. Families keep their insertion order.
    pub fn add_family(&mut self, name: &str, rows: Vec<Constr>) {
        self.families.push(Family {
            name: name.to_string(),
            rows,
        });
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    pub fn family(&self, name: &str) -> Option<&Family> {
        self.families.iter().find(|f| f.name == name)
    }

    /// Every row, family by family, in insertion order
    pub fn constrs(&self) -> impl Iterator<Item = &Constr> {
        self.families.iter().flat_map(|f| f.rows.iter())
    }

    pub fn num_constrs(&self) -> usize {
        self.families.iter().map(|f| f.rows.len()).sum()
    }

    pub fn objective_value(&self, assignment: &Assignment) -> f64 {
        self.objective.evaluate(assignment.values())
    }

    /// Names every bound, integrality requirement and row the assignment violates.
    pub fn violations(&self, assignment: &Assignment, tol: f64) -> Vec<String> {
        let values = assignment.values();
        let mut out = Vec::new();

        for (decl, value) in self.vars.iter().zip(values) {
            if *value < decl.lb - tol || *value > decl.ub + tol {
                out.push(format!("bound of {}", decl.name));
            }
            if decl.vtype != VarType::Continuous && (value - value.round()).abs() > tol {
                out.push(format!("integrality of {}", decl.name));
            }
        }

        out.extend(
            self.constrs()
                .filter(|c| !c.is_satisfied(values, tol))
                .map(|c| c.name.clone()),
        );

        out
    }
}

/// One value per variable of a model, as returned by a solver.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    values: Vec<f64>,
}

impl Assignment {
    pub fn new(values: Vec<f64>) -> Assignment {
        Assignment { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, var: Var) -> f64 {
        self.values[*var]
    }
}

impl Index<Var> for Assignment {
    type Output = f64;

    fn index(&self, var: Var) -> &f64 {
        &self.values[*var]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_moves_constants_right_and_merges_terms() {
        let mut model = Model::new("t");
        let x = model.add_var("x", VarType::Integer, 0.0..=10.0);
        let y = model.add_var("y", VarType::Binary, 0.0..=1.0);

        // 3 + x + 2y - x >= 2x + 1
        let row = (LinExpr::from(3.0) + x + 2.0 * y - x).geq(2.0 * x + LinExpr::from(1.0));
        assert_eq!(row.sense, Sense::Ge);
        assert_eq!(row.expr.terms(), &[(x, -2.0), (y, 2.0)]);
        assert_eq!(row.rhs, -2.0);
        assert_eq!(row.expr.constant(), 0.0);
    }

    #[test]
    fn binary_bounds_are_clamped() {
        let mut model = Model::new("t");
        let y = model.add_var("y", VarType::Binary, f64::NEG_INFINITY..=f64::INFINITY);
        assert_eq!(model.var(y).lb, 0.0);
        assert_eq!(model.var(y).ub, 1.0);
        assert_eq!(model.var_by_name("y"), Some(y));
    }

    #[test]
    fn violations_name_the_broken_rows() {
        let mut model = Model::new("t");
        let x = model.add_var("x", VarType::Integer, 0.0..=5.0);
        let y = model.add_var("y", VarType::Binary, 0.0..=1.0);
        model.add_family(
            "link",
            vec![
                Constr::new("cap", LinExpr::from(x).leq(5.0 * y)),
                Constr::new("fix", LinExpr::from(y).equals(1.0)),
            ],
        );

        assert!(model.violations(&Assignment::new(vec![3.0, 1.0]), 1e-6).is_empty());
        assert_eq!(
            model.violations(&Assignment::new(vec![3.0, 0.0]), 1e-6),
            vec!["cap".to_string(), "fix".to_string()]
        );
        assert_eq!(
            model.violations(&Assignment::new(vec![2.5, 1.0]), 1e-6),
            vec!["integrality of x".to_string()]
        );
        assert_eq!(model.num_constrs(), 2);
    }
}
