use std::collections::HashSet;

use crate::problem::{FacilityIndex, Instance, RequirementIndex};

#[derive(Debug)]
#[allow(non_snake_case)]
pub struct Sets {
    /// Set of facilities
    pub F: Vec<FacilityIndex>,
    /// Set of facilities that are already built
    pub K: HashSet<FacilityIndex>,
    /// Set of equipment requirements
    pub E: Vec<RequirementIndex>,
    /// Set of infrastructure requirements
    pub I: Vec<RequirementIndex>,
    /// Set of staff requirements
    pub S: Vec<RequirementIndex>,
}

impl Sets {
    pub fn new(instance: &Instance) -> Sets {
        let ranges = instance.ranges();
        let reqs = |range: &std::ops::Range<usize>| range.clone().map(RequirementIndex::from).collect();

        Sets {
            F: (0..instance.facilities().len()).map(FacilityIndex::from).collect(),
            K: instance.built().clone(),
            E: reqs(&ranges.equipment),
            I: reqs(&ranges.infrastructure),
            S: reqs(&ranges.staff),
        }
    }

    /// Every requirement, ordered equipment, infrastructure, staff
    pub fn requirements(&self) -> impl Iterator<Item = RequirementIndex> + '_ {
        self.E.iter().chain(&self.I).chain(&self.S).copied()
    }

    /// Equipment and infrastructure
    pub fn repairable(&self) -> impl Iterator<Item = RequirementIndex> + '_ {
        self.E.iter().chain(&self.I).copied()
    }

    /// Equipment and staff
    pub fn mobile(&self) -> impl Iterator<Item = RequirementIndex> + '_ {
        self.E.iter().chain(&self.S).copied()
    }

    /// Every facility other than `i`, in index order
    pub fn partners(&self, i: FacilityIndex) -> impl Iterator<Item = FacilityIndex> + '_ {
        self.F.iter().copied().filter(move |l| *l != i)
    }

    /// The built facilities in ascending order
    pub fn built_sorted(&self) -> Vec<FacilityIndex> {
        let mut built: Vec<_> = self.K.iter().copied().collect();
        built.sort_unstable();
        built
    }
}
