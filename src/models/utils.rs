use std::{collections::HashMap, hash::Hash, ops::RangeInclusive};

use crate::milp::{Assignment, Model, Var, VarType};

pub trait AddVars {
    type Out;

    /// Create a variable for any type
    fn vars(
        &self,
        model: &mut Model,
        base_name: &str,
        vtype: VarType,
        bounds: &RangeInclusive<f64>,
    ) -> Self::Out;

    /// Binary variables
    fn binary(&self, model: &mut Model, base_name: &str) -> Self::Out {
        self.vars(model, base_name, VarType::Binary, &(0.0..=1.0))
    }

    /// A non-negative integer variable
    fn integer(&self, model: &mut Model, base_name: &str) -> Self::Out {
        self.vars(model, base_name, VarType::Integer, &(0.0..=f64::INFINITY))
    }

    /// A free integer variable
    fn free_integer(&self, model: &mut Model, base_name: &str) -> Self::Out {
        self.vars(
            model,
            base_name,
            VarType::Integer,
            &(f64::NEG_INFINITY..=f64::INFINITY),
        )
    }
}

impl AddVars for usize {
    type Out = Vec<Var>;

    fn vars(
        &self,
        model: &mut Model,
        base_name: &str,
        vtype: VarType,
        bounds: &RangeInclusive<f64>,
    ) -> Self::Out {
        let mut vec = Vec::with_capacity(*self);
        for i in 0..*self {
            vec.push(model.add_var(format!("{}_{}", base_name, i), vtype, bounds.clone()));
        }

        vec
    }
}

impl AddVars for (usize, usize) {
    type Out = Vec<<usize as AddVars>::Out>;

    fn vars(
        &self,
        model: &mut Model,
        base_name: &str,
        vtype: VarType,
        bounds: &RangeInclusive<f64>,
    ) -> Self::Out {
        let mut out = Vec::with_capacity(self.0);
        for i in 0..self.0 {
            out.push(
                self.1
                    .vars(model, &format!("{}_{}", base_name, i), vtype, bounds),
            )
        }

        out
    }
}

/// Trait that reads variable handles back as numbers
pub trait ConvertVars {
    type Out;
    fn convert(&self, assignment: &Assignment) -> Self::Out;
}

impl<T: ConvertVars> ConvertVars for Vec<T> {
    type Out = Vec<T::Out>;

    fn convert(&self, assignment: &Assignment) -> Self::Out {
        self.iter().map(|e| e.convert(assignment)).collect()
    }
}

impl<K: Clone + Eq + Hash, T: ConvertVars> ConvertVars for HashMap<K, T> {
    type Out = HashMap<K, T::Out>;

    fn convert(&self, assignment: &Assignment) -> Self::Out {
        self.iter()
            .map(|(k, e)| (k.clone(), e.convert(assignment)))
            .collect()
    }
}

impl ConvertVars for Var {
    type Out = f64;

    fn convert(&self, assignment: &Assignment) -> Self::Out {
        assignment[*self]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_vars_are_named_by_index() {
        let mut model = Model::new("t");
        let z = (2usize, 3usize).integer(&mut model, "z");

        assert_eq!(z.len(), 2);
        assert_eq!(z[1].len(), 3);
        assert_eq!(model.var(z[1][2]).name, "z_1_2");
        assert_eq!(model.var(z[0][0]).ub, f64::INFINITY);
        assert_eq!(model.vars().len(), 6);
    }

    #[test]
    fn convert_reads_values_in_shape() {
        let mut model = Model::new("t");
        let x = 2usize.free_integer(&mut model, "x");
        let y = 2usize.binary(&mut model, "y");
        let assignment = Assignment::new(vec![-3.0, 4.0, 1.0, 0.0]);

        assert_eq!(x.convert(&assignment), vec![-3.0, 4.0]);
        assert_eq!(vec![y].convert(&assignment), vec![vec![1.0, 0.0]]);

        let mut map = HashMap::new();
        map.insert("a", x[1]);
        assert_eq!(map.convert(&assignment)["a"], 4.0);
    }
}
