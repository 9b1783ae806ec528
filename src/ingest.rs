//! Normalises spreadsheet rows (hospitals, equipment, staff, consumables) into an instance.
//!
//! Cells arrive as locale-formatted strings: currencies like `R$ 1.234,56` and decimals like
//! `0,5`. Fetching the rows is left to the caller; this module only cleans and types them.

use derive_more::Display;
use log::{debug, warn};

use crate::problem::{
    Cost, Facility, Instance, Requirement, RequirementKind, Target, Units, ValidationError,
};

/// The marker a hospital row carries when the hospital already exists
const BUILT_MARKER: &str = "construído";

const HOURS_PER_WEEK: f64 = 7.0 * 24.0;

#[derive(Debug, Clone, PartialEq, Display)]
pub enum IngestError {
    #[display(fmt = "{} row {} has no column {}", sheet, row, column)]
    MissingColumn {
        sheet: &'static str,
        row: usize,
        column: usize,
    },
    #[display(fmt = "{} row {} column {}: '{}' is not a number", sheet, row, column, value)]
    InvalidNumber {
        sheet: &'static str,
        row: usize,
        column: usize,
        value: String,
    },
    #[display(fmt = "staff row {} has a shift length of zero hours", row)]
    ZeroShiftLength { row: usize },
    #[display(fmt = "invalid instance: {}", _0)]
    Invalid(ValidationError),
}

impl std::error::Error for IngestError {}

impl From<ValidationError> for IngestError {
    fn from(e: ValidationError) -> Self {
        Self::Invalid(e)
    }
}

/// Parses a currency string such as `R$ 1.234,56`: `.` groups thousands, `,` is the decimal mark.
pub fn parse_currency(value: &str) -> Option<f64> {
    let digits = value.trim().trim_start_matches("R$").trim();
    digits.replace('.', "").replace(',', ".").parse().ok()
}

/// Parses a decimal that may use `,` as its decimal mark.
pub fn parse_decimal(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse().ok()
}

/// Typed access to the cells of one spreadsheet row
struct Cells<'a> {
    sheet: &'static str,
    row: usize,
    cells: &'a [&'a str],
}

impl<'a> Cells<'a> {
    fn get(&self, column: usize) -> Result<&'a str, IngestError> {
        self.cells
            .get(column)
            .copied()
            .ok_or(IngestError::MissingColumn {
                sheet: self.sheet,
                row: self.row,
                column,
            })
    }

    fn number<T>(&self, column: usize, parse: impl Fn(&str) -> Option<T>) -> Result<T, IngestError> {
        let value = self.get(column)?;
        parse(value).ok_or_else(|| IngestError::InvalidNumber {
            sheet: self.sheet,
            row: self.row,
            column,
            value: value.to_string(),
        })
    }

    fn integer<T: std::str::FromStr>(&self, column: usize) -> Result<T, IngestError> {
        self.number(column, |v| v.trim().parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HospitalRow {
    pub id: usize,
    pub name: String,
    pub construction_cost: Cost,
    pub min_beds: Units,
    pub max_beds: Units,
    pub coord_x: f64,
    pub coord_y: f64,
    pub built: bool,
}

impl HospitalRow {
    /// `id, name, construction cost, min beds, max beds, x, y, status`
    pub fn from_cells(row: usize, cells: &[&str]) -> Result<Self, IngestError> {
        let c = Cells {
            sheet: "hospital",
            row,
            cells,
        };
        Ok(HospitalRow {
            id: c.integer(0)?,
            name: c.get(1)?.to_string(),
            construction_cost: c.number(2, parse_currency)?,
            min_beds: c.integer(3)?,
            max_beds: c.integer(4)?,
            coord_x: c.number(5, parse_decimal)?,
            coord_y: c.number(6, parse_decimal)?,
            built: c.get(7)?.trim().to_lowercase() == BUILT_MARKER,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentRow {
    pub id: usize,
    pub name: String,
    pub price: Cost,
    pub necessity_rate: f64,
    pub maintenance_frequency: u32,
    pub maintenance_cost: Cost,
}

impl EquipmentRow {
    /// `id, name, price, rate, maintenance frequency, maintenance cost`
    pub fn from_cells(row: usize, cells: &[&str]) -> Result<Self, IngestError> {
        let c = Cells {
            sheet: "equipment",
            row,
            cells,
        };
        Ok(EquipmentRow {
            id: c.integer(0)?,
            name: c.get(1)?.to_string(),
            price: c.number(2, parse_currency)?,
            necessity_rate: c.number(3, parse_decimal)?,
            maintenance_frequency: c.integer(4)?,
            maintenance_cost: c.number(5, parse_currency)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaffRow {
    pub id: usize,
    pub team: String,
    pub salary: Cost,
    /// Professionals per bed and week, corrected for how many shifts cover a week
    pub necessity_rate: f64,
}

impl StaffRow {
    /// `id, team, salary, shift hours, professionals per bed`
    pub fn from_cells(row: usize, cells: &[&str]) -> Result<Self, IngestError> {
        let c = Cells {
            sheet: "staff",
            row,
            cells,
        };
        let shift_hours: u32 = c.integer(3)?;
        if shift_hours == 0 {
            return Err(IngestError::ZeroShiftLength { row });
        }
        let per_bed = c.number(4, parse_decimal)?;

        Ok(StaffRow {
            id: c.integer(0)?,
            team: c.get(1)?.to_string(),
            salary: c.number(2, parse_currency)?,
            necessity_rate: (HOURS_PER_WEEK / shift_hours as f64).ceil() * per_bed,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumableRow {
    pub id: usize,
    pub name: String,
    pub price: Cost,
    pub necessity_rate: f64,
}

impl ConsumableRow {
    /// `id, name, price, unit, rate`
    pub fn from_cells(row: usize, cells: &[&str]) -> Result<Self, IngestError> {
        let c = Cells {
            sheet: "consumable",
            row,
            cells,
        };
        Ok(ConsumableRow {
            id: c.integer(0)?,
            name: c.get(1)?.to_string(),
            price: c.number(2, parse_currency)?,
            necessity_rate: c.number(4, parse_decimal)?,
        })
    }
}

/// Every row of the data source, cleaned and typed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    pub hospitals: Vec<HospitalRow>,
    pub equipment: Vec<EquipmentRow>,
    pub staff: Vec<StaffRow>,
    pub consumables: Vec<ConsumableRow>,
}

impl Catalog {
    /// Types the raw rows of each sheet. Row numbers in errors are 1-based and exclude headers.
    pub fn from_rows(
        hospitals: &[Vec<&str>],
        equipment: &[Vec<&str>],
        staff: &[Vec<&str>],
        consumables: &[Vec<&str>],
    ) -> Result<Catalog, IngestError> {
        fn typed<T>(
            rows: &[Vec<&str>],
            parse: impl Fn(usize, &[&str]) -> Result<T, IngestError>,
        ) -> Result<Vec<T>, IngestError> {
            rows.iter()
                .enumerate()
                .map(|(k, cells)| parse(k + 1, cells.as_slice()))
                .collect()
        }

        let catalog = Catalog {
            hospitals: typed(hospitals, HospitalRow::from_cells)?,
            equipment: typed(equipment, EquipmentRow::from_cells)?,
            staff: typed(staff, StaffRow::from_cells)?,
            consumables: typed(consumables, ConsumableRow::from_cells)?,
        };
        debug!(
            "Catalog with {} hospitals, {} equipment, {} staff and {} consumables",
            catalog.hospitals.len(),
            catalog.equipment.len(),
            catalog.staff.len(),
            catalog.consumables.len()
        );
        Ok(catalog)
    }

    /// Number of requirements the instance will have
    pub fn requirement_count(&self) -> usize {
        self.equipment.len() + self.consumables.len() + self.staff.len()
    }

    /// A budget-driven instance with requirements ordered equipment, consumables, staff.
    /// Consumables are modelled as equipment. `stock` holds one row per hospital; without it
    /// every hospital starts empty.
    pub fn to_instance(&self, budget: Cost, stock: Option<&[Vec<Units>]>) -> Result<Instance, IngestError> {
        let equipment = self.equipment.iter().map(|e| Requirement {
            kind: RequirementKind::Equipment,
            price: e.price,
            repair_price: e.maintenance_cost,
            necessity_rate: e.necessity_rate,
            transfer: None,
        });
        let consumables = self.consumables.iter().map(|c| Requirement {
            kind: RequirementKind::Equipment,
            price: c.price,
            repair_price: 0.0,
            necessity_rate: c.necessity_rate,
            transfer: None,
        });
        let staff = self.staff.iter().map(|s| Requirement {
            kind: RequirementKind::Staff,
            price: s.salary,
            repair_price: 0.0,
            necessity_rate: s.necessity_rate,
            transfer: None,
        });
        let requirements: Vec<Requirement> = equipment.chain(consumables).chain(staff).collect();

        let nr = requirements.len();
        let facilities = self
            .hospitals
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let stock = match stock.and_then(|rows| rows.get(i)) {
                    Some(row) if h.built => row.clone(),
                    Some(row) => {
                        if row.iter().any(|&units| units > 0) {
                            warn!("Discarding stock listed for hospital {}, which is not built", h.id);
                        }
                        vec![0; nr]
                    }
                    None => vec![0; nr],
                };
                Facility {
                    construction_cost: h.construction_cost,
                    min_beds: h.min_beds,
                    max_beds: h.max_beds,
                    broken: vec![0; nr],
                    stock,
                }
            })
            .collect();
        let built = self
            .hospitals
            .iter()
            .enumerate()
            .filter(|(_, h)| h.built)
            .map(|(i, _)| i);

        Ok(Instance::new(facilities, requirements, built, Target::Budget(budget))?)
    }
}
