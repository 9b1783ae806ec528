//! Turns a solved assignment into a per-facility capacity plan and prints it.

use std::io::{self, Write};

use serde::Serialize;

use crate::models::icu::{IcuSolution, Sets};
use crate::problem::{FacilityIndex, Instance, RequirementIndex, RequirementKind, Units};

/// Units of one requirement acquired or repaired
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub requirement: usize,
    pub kind: RequirementKind,
    pub units: Units,
}

/// Units of one requirement moved to or from a partner facility
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shipment {
    pub requirement: usize,
    pub kind: RequirementKind,
    pub units: Units,
    pub partner: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityPlan {
    pub facility: usize,
    /// The facility does not exist yet and the plan builds it
    pub newly_built: bool,
    pub beds: Units,
    /// Beds on top of what the facility's current stock supports
    pub added_beds: i64,
    pub acquire: Vec<LineItem>,
    pub repair: Vec<LineItem>,
    pub transfer: Vec<Shipment>,
    pub receive: Vec<Shipment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityPlan {
    pub objective: f64,
    pub total_beds: u64,
    /// Active facilities only, in index order
    pub facilities: Vec<FacilityPlan>,
}

fn units(value: f64) -> Units {
    value.round().max(0.0) as Units
}

fn items(
    requirements: impl Iterator<Item = RequirementIndex>,
    instance: &Instance,
    value: impl Fn(RequirementIndex) -> f64,
) -> Vec<LineItem> {
    requirements
        .map(|j| LineItem {
            requirement: *j,
            kind: instance.requirement(j).kind,
            units: units(value(j)),
        })
        .filter(|item| item.units > 0)
        .collect()
}

/// Decodes the plan of every active facility. Zero line items are dropped.
pub fn decode(instance: &Instance, solution: &IcuSolution, objective: f64) -> CapacityPlan {
    let sets = Sets::new(instance);

    let facilities: Vec<FacilityPlan> = sets
        .F
        .iter()
        .copied()
        .filter(|i| solution.is_active(*i))
        .map(|i| {
            let beds = units(solution.beds(i));
            let baseline = instance.bottleneck_capacity(i);

            let shipments = |from_i: bool| -> Vec<Shipment> {
                let mut out = Vec::new();
                for j in sets.mobile() {
                    for l in sets.partners(i) {
                        let (from, to) = if from_i { (i, l) } else { (l, i) };
                        let units = units(solution.transferred(j, from, to));
                        if units > 0 {
                            out.push(Shipment {
                                requirement: *j,
                                kind: instance.requirement(j).kind,
                                units,
                                partner: *l,
                            });
                        }
                    }
                }
                out
            };

            FacilityPlan {
                facility: *i,
                newly_built: !instance.is_built(i),
                beds,
                added_beds: (beds as f64 - baseline).trunc() as i64,
                acquire: items(sets.requirements(), instance, |j| solution.acquired(i, j)),
                repair: items(sets.repairable(), instance, |j| solution.repaired(i, j)),
                transfer: shipments(true),
                receive: shipments(false),
            }
        })
        .collect();

    CapacityPlan {
        objective,
        total_beds: facilities.iter().map(|f| f.beds as u64).sum(),
        facilities,
    }
}

fn describe(kind: RequirementKind, staff_word: &str) -> String {
    match kind {
        RequirementKind::Equipment => "units of equipment".to_string(),
        RequirementKind::Infrastructure => "units of infrastructure".to_string(),
        RequirementKind::Staff => format!("professionals {} staff", staff_word),
    }
}

/// Writes the header once, before the first line
fn section<W: Write>(out: &mut W, header: &str, lines: &[String]) -> io::Result<()> {
    for (k, line) in lines.iter().enumerate() {
        if k == 0 {
            writeln!(out, "\t{}:", header)?;
        }
        writeln!(out, "\t\t\t {}", line)?;
    }
    Ok(())
}

impl CapacityPlan {
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Objective value:\t {}", self.objective)?;
        writeln!(out, "Total ICU beds:\t {}", self.total_beds)?;

        for plan in &self.facilities {
            match plan.newly_built {
                true => writeln!(out, "Build Hospital {}", plan.facility)?,
                false => writeln!(out, "Hospital {}", plan.facility)?,
            }
            writeln!(out, "\tTotal ICU beds:\t {}", plan.beds)?;
            writeln!(out, "\tAdded ICU beds:\t {}", plan.added_beds)?;

            let stock_lines = |items: &[LineItem], staff_word: &str| -> Vec<String> {
                items
                    .iter()
                    .map(|item| {
                        format!("{} {} {}", item.units, describe(item.kind, staff_word), item.requirement)
                    })
                    .collect()
            };
            let shipment_lines = |shipments: &[Shipment], direction: &str| -> Vec<String> {
                shipments
                    .iter()
                    .map(|s| {
                        format!(
                            "{} {} {} {} Hospital {}",
                            s.units,
                            describe(s.kind, "of"),
                            s.requirement,
                            direction,
                            s.partner
                        )
                    })
                    .collect()
            };

            section(out, "Acquire", &stock_lines(&plan.acquire, "to"))?;
            section(out, "Repair", &stock_lines(&plan.repair, "of"))?;
            section(out, "Transfer", &shipment_lines(&plan.transfer, "to"))?;
            section(out, "Receive", &shipment_lines(&plan.receive, "from"))?;
        }
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn facility(&self, i: FacilityIndex) -> Option<&FacilityPlan> {
        self.facilities.iter().find(|f| f.facility == *i)
    }
}
