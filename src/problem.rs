use std::{collections::HashSet, ops::Range, str::FromStr};

use derive_more::{Deref, Display, From, Into};
use float_ord::FloatOrd;
use serde::Serialize;
use typed_index_collections::TiVec;

/// The type used for money
pub type Cost = f64;
/// The type used for counted units (beds, devices, professionals)
pub type Units = u32;

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Display)]
pub struct FacilityIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Display)]
pub struct RequirementIndex(usize);

/// Which input layout, and which model shape, a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Dialect {
    /// Flat equipment and occupation axes, no repair or transfer modelling.
    #[display(fmt = "simple")]
    Simple,
    /// Equipment, infrastructure and staff axes with repair and transfer.
    #[display(fmt = "full")]
    Full,
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Dialect::Simple),
            "full" => Ok(Dialect::Full),
            other => Err(format!("unknown dialect '{other}', expected 'simple' or 'full'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    #[display(fmt = "equipment")]
    Equipment,
    #[display(fmt = "infrastructure")]
    Infrastructure,
    #[display(fmt = "staff")]
    Staff,
}

impl RequirementKind {
    /// Whether units can be moved between facilities
    pub fn is_mobile(self) -> bool {
        !matches!(self, RequirementKind::Infrastructure)
    }

    /// Whether broken units can be brought back into service
    pub fn is_repairable(self) -> bool {
        !matches!(self, RequirementKind::Staff)
    }
}

/// A hospital or care site, existing or proposed.
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    /// Cost of building the facility. Ignored for facilities that are already built.
    pub construction_cost: Cost,
    /// The minimum number of ICU beds if the facility operates
    pub min_beds: Units,
    /// The maximum number of ICU beds
    pub max_beds: Units,
    /// Working units of every requirement already present
    pub stock: Vec<Units>,
    /// Units of every requirement waiting for repair
    pub broken: Vec<Units>,
}

/// Cost of moving one unit of a requirement between two facilities, indexed `[from][to]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferCosts(Vec<Vec<Cost>>);

impl TransferCosts {
    pub fn new(costs: Vec<Vec<Cost>>) -> Self {
        Self(costs)
    }

    pub fn cost(&self, from: FacilityIndex, to: FacilityIndex) -> Cost {
        self.0[*from][*to]
    }

    fn rows(&self) -> &[Vec<Cost>] {
        &self.0
    }
}

/// Anything needed per ICU bed: a device, a piece of infrastructure or a staff role.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub kind: RequirementKind,
    /// Price of acquiring (or hiring) one unit
    pub price: Cost,
    /// Price of repairing one unit. Only meaningful for repairable requirements.
    pub repair_price: Cost,
    /// Units needed per ICU bed
    pub necessity_rate: f64,
    /// Transfer costs, present only for mobile requirements
    pub transfer: Option<TransferCosts>,
}

/// What the plan is driven by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// Maximise beds while total spend stays within the budget
    Budget(Cost),
    /// Minimise cost while providing at least this many beds
    Demand(Units),
}

/// The contiguous index ranges of each requirement kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequirementRanges {
    pub equipment: Range<usize>,
    pub infrastructure: Range<usize>,
    pub staff: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum ValidationError {
    #[display(fmt = "an instance needs at least one facility")]
    NoFacilities,
    #[display(fmt = "built facility {} is outside [0, {})", facility, facilities)]
    BuiltOutOfRange { facility: usize, facilities: usize },
    #[display(
        fmt = "facility {} has {} entries in its {} vector, expected {}",
        facility,
        found,
        field,
        expected
    )]
    VectorLength {
        facility: usize,
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[display(
        fmt = "requirement {} breaks the equipment, infrastructure, staff ordering",
        requirement
    )]
    NonContiguousRequirements { requirement: usize },
    #[display(fmt = "infrastructure requirement {} cannot have transfer costs", requirement)]
    ImmobileTransfer { requirement: usize },
    #[display(
        fmt = "transfer costs of requirement {} must be a {}x{} matrix",
        requirement,
        facilities,
        facilities
    )]
    TransferShape {
        requirement: usize,
        facilities: usize,
    },
    #[display(fmt = "{} {} is {}, must be non-negative", field, index, value)]
    NegativeCost {
        field: &'static str,
        index: usize,
        value: f64,
    },
    #[display(fmt = "necessity rate of requirement {} is {}, must be non-negative", requirement, value)]
    NegativeRate { requirement: usize, value: f64 },
    #[display(
        fmt = "facility {} has a minimum of {} beds above its maximum of {}",
        facility,
        min,
        max
    )]
    BoundsInverted { facility: usize, min: Units, max: Units },
    #[display(fmt = "facility {} has no bed capacity but could be activated", facility)]
    ZeroCapacity { facility: usize },
    #[display(
        fmt = "facility {} is not built but holds stock of requirement {}",
        facility,
        requirement
    )]
    StockAtUnbuilt { facility: usize, requirement: usize },
    #[display(fmt = "budget is {}, must be non-negative", _0)]
    NegativeBudget(Cost),
    #[display(fmt = "mobile requirement {} has no transfer costs", requirement)]
    MissingTransferCosts { requirement: usize },
}

impl std::error::Error for ValidationError {}

/// A validated planning problem. Never changes once constructed.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Facilities, dense and zero-based
    facilities: TiVec<FacilityIndex, Facility>,
    /// Requirements, ordered equipment, infrastructure, staff
    requirements: TiVec<RequirementIndex, Requirement>,
    /// The facilities that already exist (K)
    built: HashSet<FacilityIndex>,
    ranges: RequirementRanges,
    target: Target,
}

impl Instance {
    /// Validates the raw records and assembles an instance. Construction costs of built
    /// facilities are forced to zero.
    pub fn new(
        facilities: Vec<Facility>,
        requirements: Vec<Requirement>,
        built: impl IntoIterator<Item = usize>,
        target: Target,
    ) -> Result<Instance, ValidationError> {
        use ValidationError::*;

        let nf = facilities.len();
        let nr = requirements.len();
        if nf == 0 {
            return Err(NoFacilities);
        }

        let mut built_set = HashSet::new();
        for facility in built {
            if facility >= nf {
                return Err(BuiltOutOfRange {
                    facility,
                    facilities: nf,
                });
            }
            built_set.insert(FacilityIndex(facility));
        }

        let ranges = Self::derive_ranges(&requirements)?;

        for (j, req) in requirements.iter().enumerate() {
            Self::non_negative("price of requirement", j, req.price)?;
            Self::non_negative("repair price of requirement", j, req.repair_price)?;
            if !(req.necessity_rate >= 0.0) {
                return Err(NegativeRate {
                    requirement: j,
                    value: req.necessity_rate,
                });
            }
            match (&req.transfer, req.kind.is_mobile()) {
                (Some(_), false) => return Err(ImmobileTransfer { requirement: j }),
                (Some(t), true) => {
                    if t.rows().len() != nf || t.rows().iter().any(|row| row.len() != nf) {
                        return Err(TransferShape {
                            requirement: j,
                            facilities: nf,
                        });
                    }
                    for (from, row) in t.rows().iter().enumerate() {
                        for (to, cost) in row.iter().enumerate() {
                            if from != to {
                                Self::non_negative("transfer cost of requirement", j, *cost)?;
                            }
                        }
                    }
                }
                (None, _) => (),
            }
        }

        let mut facilities = facilities;
        for (i, facility) in facilities.iter_mut().enumerate() {
            let is_built = built_set.contains(&FacilityIndex(i));
            for (field, found) in [("stock", facility.stock.len()), ("broken", facility.broken.len())] {
                if found != nr {
                    return Err(VectorLength {
                        facility: i,
                        field,
                        expected: nr,
                        found,
                    });
                }
            }

            if is_built {
                facility.construction_cost = 0.0;
            }
            Self::non_negative("construction cost of facility", i, facility.construction_cost)?;

            if facility.max_beds == 0 && (facility.min_beds > 0 || !is_built) {
                return Err(ZeroCapacity { facility: i });
            }
            if facility.min_beds > facility.max_beds {
                return Err(BoundsInverted {
                    facility: i,
                    min: facility.min_beds,
                    max: facility.max_beds,
                });
            }
            if !is_built {
                if let Some(j) = facility.stock.iter().position(|&a| a > 0) {
                    return Err(StockAtUnbuilt {
                        facility: i,
                        requirement: j,
                    });
                }
            }
        }

        if let Target::Budget(budget) = target {
            if !(budget >= 0.0) {
                return Err(NegativeBudget(budget));
            }
        }

        Ok(Instance {
            facilities: facilities.into(),
            requirements: requirements.into(),
            built: built_set,
            ranges,
            target,
        })
    }

    fn non_negative(field: &'static str, index: usize, value: f64) -> Result<(), ValidationError> {
        match value >= 0.0 {
            true => Ok(()),
            false => Err(ValidationError::NegativeCost {
                field,
                index,
                value,
            }),
        }
    }

    /// Derives the E, I, S ranges, rejecting any kind that appears out of order.
    fn derive_ranges(requirements: &[Requirement]) -> Result<RequirementRanges, ValidationError> {
        let rank = |kind: RequirementKind| match kind {
            RequirementKind::Equipment => 0,
            RequirementKind::Infrastructure => 1,
            RequirementKind::Staff => 2,
        };

        let mut bounds = [0usize; 3];
        let mut last = 0;
        for (j, req) in requirements.iter().enumerate() {
            let r = rank(req.kind);
            if r < last {
                return Err(ValidationError::NonContiguousRequirements { requirement: j });
            }
            last = r;
            bounds[r] = j + 1;
        }

        // empty kinds collapse onto the end of the previous one
        let e_end = bounds[0];
        let i_end = bounds[1].max(e_end);
        let s_end = bounds[2].max(i_end);
        Ok(RequirementRanges {
            equipment: 0..e_end,
            infrastructure: e_end..i_end,
            staff: i_end..s_end,
        })
    }

    /// The facilities of the problem, indexed by `FacilityIndex`
    pub fn facilities(&self) -> &TiVec<FacilityIndex, Facility> {
        &self.facilities
    }

    pub fn facility(&self, i: FacilityIndex) -> &Facility {
        &self.facilities[i]
    }

    /// The requirements of the problem, ordered equipment, infrastructure, staff
    pub fn requirements(&self) -> &TiVec<RequirementIndex, Requirement> {
        &self.requirements
    }

    pub fn requirement(&self, j: RequirementIndex) -> &Requirement {
        &self.requirements[j]
    }

    /// The set of facilities that already exist
    pub fn built(&self) -> &HashSet<FacilityIndex> {
        &self.built
    }

    pub fn is_built(&self, i: FacilityIndex) -> bool {
        self.built.contains(&i)
    }

    pub fn ranges(&self) -> &RequirementRanges {
        &self.ranges
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Working units of requirement `j` at facility `i`
    pub fn stock(&self, i: FacilityIndex, j: RequirementIndex) -> Units {
        self.facilities[i].stock[*j]
    }

    /// Units of requirement `j` at facility `i` that need repair
    pub fn broken(&self, i: FacilityIndex, j: RequirementIndex) -> Units {
        self.facilities[i].broken[*j]
    }

    /// Beds a facility can staff and equip today: the minimum over requirements of stock
    /// divided by necessity rate. Requirements with a zero rate impose no limit; a facility
    /// without any limiting requirement reports zero.
    pub fn bottleneck_capacity(&self, i: FacilityIndex) -> f64 {
        self.requirements
            .iter_enumerated()
            .filter(|(_, req)| req.necessity_rate > 0.0)
            .map(|(j, req)| FloatOrd(self.stock(i, j) as f64 / req.necessity_rate))
            .min()
            .map(|cap| cap.0)
            .unwrap_or(0.0)
    }
}
