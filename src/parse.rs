//! Line-oriented instance reader for both input dialects.
//!
//! Every record sits on its own line and holds whitespace-separated tokens. Empty lines are
//! records too (an empty set of built facilities, or an empty vector when a dimension is
//! zero). The caller names the dialect; it is never guessed from the input.
//!
//! Simple dialect (budget driven):
//!
//! ```raw
//! |F| |E| |O|
//! K
//! budget
//! c[F]
//! l[F]
//! u[F]
//! p[E]
//! n[E]
//! h[O]                  (hiring cost of each occupation)
//! r[O]                  (professionals of each occupation per bed)
//! a[E]  x |F| lines     (equipment at each facility)
//! s[O]  x |F| lines     (staff at each facility)
//! ```
//!
//! Full dialect (demand driven):
//!
//! ```raw
//! |F|
//! K
//! |E| |I| |S|
//! d
//! c[F]
//! l[F]
//! u[F]
//! p[R]
//! r[R] or r[|E|+|I|]
//! n[R]
//! a[R]  x |K| lines     (one per built facility, in index order)
//! m[R]  x |F| lines
//! t[F]  x |F| lines     (for each equipment, then each staff requirement)
//! ```

use std::{
    collections::HashSet,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
};

use derive_more::Display;
use log::{debug, trace, warn};

use crate::problem::{
    Cost, Dialect, Facility, Instance, Requirement, RequirementKind, Target, TransferCosts,
    Units, ValidationError,
};

#[derive(Debug, Display)]
pub enum ParseError {
    #[display(fmt = "I/O error: {}", _0)]
    Io(std::io::Error),
    #[display(fmt = "line {}: input ended while reading {}", line, record)]
    UnexpectedEof { line: usize, record: String },
    #[display(
        fmt = "line {}: could not parse token '{}' of {} as {}",
        line,
        token,
        record,
        type_name
    )]
    NonNumeric {
        line: usize,
        record: String,
        token: String,
        type_name: &'static str,
    },
    #[display(fmt = "line {}: {} has {} entries, expected {}", line, record, found, expected)]
    LengthMismatch {
        line: usize,
        record: String,
        expected: usize,
        found: usize,
    },
    #[display(
        fmt = "line {}: expected three requirement counts |E| |I| |S| with a representable total, found {} entries",
        line,
        found
    )]
    MalformedRanges { line: usize, found: usize },
    #[display(
        fmt = "line {}: {} has {} entries but the requirement counts declare {}",
        line,
        record,
        found,
        expected
    )]
    RequirementRangeMismatch {
        line: usize,
        record: String,
        expected: usize,
        found: usize,
    },
    #[display(
        fmt = "line {}: built facility {} is outside [0, {})",
        line,
        facility,
        facilities
    )]
    BuiltOutOfRange {
        line: usize,
        facility: usize,
        facilities: usize,
    },
    #[display(
        fmt = "line {}: facility {} has an upper bound of zero beds but could be activated",
        line,
        facility
    )]
    ZeroCapacity { line: usize, facility: usize },
    #[display(fmt = "line {}: unexpected input after the last record", line)]
    TrailingInput { line: usize },
    #[display(fmt = "invalid instance: {}", _0)]
    Invalid(ValidationError),
}

impl std::error::Error for ParseError {}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ValidationError> for ParseError {
    fn from(e: ValidationError) -> Self {
        Self::Invalid(e)
    }
}

/// A cursor over the lines of an instance file.
struct Records {
    lines: Vec<String>,
    next: usize,
}

impl Records {
    fn new<R: BufRead>(reader: R) -> Result<Records, ParseError> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        Ok(Records { lines, next: 0 })
    }

    /// The next record and its 1-based line number
    fn record(&mut self, record: &str) -> Result<(usize, &str), ParseError> {
        let line = self.next + 1;
        match self.lines.get(self.next) {
            Some(text) => {
                self.next += 1;
                trace!("line {} ({}): {}", line, record, text);
                Ok((line, text.as_str()))
            }
            None => Err(ParseError::UnexpectedEof {
                line,
                record: record.to_string(),
            }),
        }
    }

    /// Every token of the next record, parsed as `T`
    fn values<T: FromStr>(&mut self, record: &str) -> Result<(usize, Vec<T>), ParseError> {
        let (line, text) = self.record(record)?;
        let values = text
            .split_whitespace()
            .map(|token| {
                token.parse::<T>().map_err(|_| ParseError::NonNumeric {
                    line,
                    record: record.to_string(),
                    token: token.to_string(),
                    type_name: std::any::type_name::<T>(),
                })
            })
            .collect::<Result<Vec<T>, _>>()?;
        Ok((line, values))
    }

    /// A record of exactly `expected` values, sized by a facility count
    fn exactly<T: FromStr>(&mut self, record: &str, expected: usize) -> Result<Vec<T>, ParseError> {
        let (line, values) = self.values(record)?;
        match values.len() == expected {
            true => Ok(values),
            false => Err(ParseError::LengthMismatch {
                line,
                record: record.to_string(),
                expected,
                found: values.len(),
            }),
        }
    }

    /// A record of exactly `expected` values, sized by a requirement count
    fn per_requirement<T: FromStr>(
        &mut self,
        record: &str,
        expected: usize,
    ) -> Result<Vec<T>, ParseError> {
        let (line, values) = self.values(record)?;
        match values.len() == expected {
            true => Ok(values),
            false => Err(ParseError::RequirementRangeMismatch {
                line,
                record: record.to_string(),
                expected,
                found: values.len(),
            }),
        }
    }

    fn scalar<T: FromStr>(&mut self, record: &str) -> Result<T, ParseError> {
        let mut values = self.exactly::<T>(record, 1)?;
        // exactly() guarantees one element
        Ok(values.remove(0))
    }

    /// The set of built facilities, checked against the facility count
    fn built(&mut self, facilities: usize) -> Result<HashSet<usize>, ParseError> {
        let (line, values) = self.values::<usize>("built facilities")?;
        match values.iter().find(|&&i| i >= facilities) {
            Some(&facility) => Err(ParseError::BuiltOutOfRange {
                line,
                facility,
                facilities,
            }),
            None => Ok(values.into_iter().collect()),
        }
    }

    /// Bed upper bounds; zero is only admitted for a built facility without a minimum
    fn capacities(
        &mut self,
        min_beds: &[Units],
        built: &HashSet<usize>,
    ) -> Result<Vec<Units>, ParseError> {
        let line = self.next + 1;
        let max_beds = self.exactly::<Units>("bed upper bounds", min_beds.len())?;
        for (facility, (&u, &l)) in max_beds.iter().zip(min_beds).enumerate() {
            if u == 0 && (l > 0 || !built.contains(&facility)) {
                return Err(ParseError::ZeroCapacity { line, facility });
            }
        }
        Ok(max_beds)
    }

    /// Fails if anything but blank lines remains
    fn finish(self) -> Result<(), ParseError> {
        match self.lines[self.next..]
            .iter()
            .position(|line| !line.trim().is_empty())
        {
            Some(offset) => Err(ParseError::TrailingInput {
                line: self.next + offset + 1,
            }),
            None => Ok(()),
        }
    }
}

/// Reads an instance of the given dialect from a file.
pub fn read_instance<P: AsRef<Path>>(path: P, dialect: Dialect) -> Result<Instance, ParseError> {
    debug!("Reading {} instance from {}", dialect, path.as_ref().display());
    let file = File::open(path)?;
    parse_instance(BufReader::new(file), dialect)
}

/// Parses an instance of the given dialect.
pub fn parse_instance<R: BufRead>(reader: R, dialect: Dialect) -> Result<Instance, ParseError> {
    let mut records = Records::new(reader)?;
    let instance = match dialect {
        Dialect::Simple => parse_simple(&mut records)?,
        Dialect::Full => parse_full(&mut records)?,
    };
    records.finish()?;
    Ok(instance)
}

pub fn parse_str(input: &str, dialect: Dialect) -> Result<Instance, ParseError> {
    parse_instance(input.as_bytes(), dialect)
}

fn parse_simple(records: &mut Records) -> Result<Instance, ParseError> {
    let dims = records.exactly::<usize>("dimensions |F| |E| |O|", 3)?;
    let (nf, ne, no) = (dims[0], dims[1], dims[2]);
    debug!("Simple instance: {} facilities, {} equipment, {} occupations", nf, ne, no);

    let built = records.built(nf)?;
    let budget: Cost = records.scalar("budget")?;
    let construction = records.exactly::<Cost>("construction costs", nf)?;
    let min_beds = records.exactly::<Units>("bed lower bounds", nf)?;
    let max_beds = records.capacities(&min_beds, &built)?;

    let prices = records.per_requirement::<Cost>("equipment prices", ne)?;
    let rates = records.per_requirement::<f64>("equipment necessity rates", ne)?;
    let hiring = records.per_requirement::<Cost>("hiring costs", no)?;
    let staff_rates = records.per_requirement::<f64>("staff necessity rates", no)?;

    let mut equipment_stock = Vec::with_capacity(nf);
    for i in 0..nf {
        equipment_stock.push(records.per_requirement::<Units>(&format!("equipment of facility {}", i), ne)?);
    }
    let mut staff_stock = Vec::with_capacity(nf);
    for i in 0..nf {
        staff_stock.push(records.per_requirement::<Units>(&format!("staff of facility {}", i), no)?);
    }

    let equipment = prices.iter().zip(&rates).map(|(&price, &rate)| Requirement {
        kind: RequirementKind::Equipment,
        price,
        repair_price: 0.0,
        necessity_rate: rate,
        transfer: None,
    });
    let staff = hiring.iter().zip(&staff_rates).map(|(&price, &rate)| Requirement {
        kind: RequirementKind::Staff,
        price,
        repair_price: 0.0,
        necessity_rate: rate,
        transfer: None,
    });
    let requirements: Vec<Requirement> = equipment.chain(staff).collect();

    let facilities = (0..nf)
        .map(|i| {
            let mut stock = equipment_stock[i].clone();
            stock.extend(&staff_stock[i]);
            // facilities that do not exist yet start empty
            if !built.contains(&i) && stock.iter().any(|&units| units > 0) {
                warn!("Discarding stock listed for facility {}, which is not built", i);
                stock.iter_mut().for_each(|units| *units = 0);
            }
            Facility {
                construction_cost: construction[i],
                min_beds: min_beds[i],
                max_beds: max_beds[i],
                broken: vec![0; stock.len()],
                stock,
            }
        })
        .collect();

    Ok(Instance::new(facilities, requirements, built, Target::Budget(budget))?)
}

fn parse_full(records: &mut Records) -> Result<Instance, ParseError> {
    let nf: usize = records.scalar("facility count")?;
    let built = records.built(nf)?;

    let (line, counts) = records.values::<usize>("requirement counts")?;
    if counts.len() != 3 {
        return Err(ParseError::MalformedRanges {
            line,
            found: counts.len(),
        });
    }
    let (ne, ni, ns) = (counts[0], counts[1], counts[2]);
    let nr = ne
        .checked_add(ni)
        .and_then(|n| n.checked_add(ns))
        .ok_or(ParseError::MalformedRanges { line, found: 3 })?;
    debug!(
        "Full instance: {} facilities ({} built), {} equipment, {} infrastructure, {} staff",
        nf,
        built.len(),
        ne,
        ni,
        ns
    );

    let demand: Units = records.scalar("demand")?;
    let construction = records.exactly::<Cost>("construction costs", nf)?;
    let min_beds = records.exactly::<Units>("bed lower bounds", nf)?;
    let max_beds = records.capacities(&min_beds, &built)?;

    let prices = records.per_requirement::<Cost>("requirement prices", nr)?;
    let (line, mut repair) = records.values::<Cost>("repair prices")?;
    if repair.len() == ne + ni {
        // staff cannot be repaired
        repair.resize(nr, 0.0);
    } else if repair.len() != nr {
        return Err(ParseError::RequirementRangeMismatch {
            line,
            record: "repair prices".to_string(),
            expected: nr,
            found: repair.len(),
        });
    }
    let rates = records.per_requirement::<f64>("necessity rates", nr)?;

    // only built facilities list their stock, everything else starts empty
    let mut stock = Vec::with_capacity(nf);
    for i in 0..nf {
        if built.contains(&i) {
            stock.push(records.per_requirement::<Units>(&format!("stock of facility {}", i), nr)?);
        } else {
            stock.push(vec![0; nr]);
        }
    }

    let mut broken = Vec::with_capacity(nf);
    for i in 0..nf {
        broken.push(records.per_requirement::<Units>(&format!("repair needs of facility {}", i), nr)?);
    }

    let mut transfer = Vec::with_capacity(ne + ns);
    for j in (0..ne).chain(ne + ni..nr) {
        let mut matrix = Vec::with_capacity(nf);
        for i in 0..nf {
            matrix.push(records.exactly::<Cost>(
                &format!("transfer costs of requirement {} from facility {}", j, i),
                nf,
            )?);
        }
        transfer.push((j, TransferCosts::new(matrix)));
    }

    let mut requirements: Vec<Requirement> = (0..nr)
        .map(|j| Requirement {
            kind: match j {
                j if j < ne => RequirementKind::Equipment,
                j if j < ne + ni => RequirementKind::Infrastructure,
                _ => RequirementKind::Staff,
            },
            price: prices[j],
            repair_price: repair[j],
            necessity_rate: rates[j],
            transfer: None,
        })
        .collect();
    for (j, costs) in transfer {
        requirements[j].transfer = Some(costs);
    }

    let facilities = stock
        .into_iter()
        .zip(broken)
        .enumerate()
        .map(|(i, (stock, broken))| Facility {
            construction_cost: construction[i],
            min_beds: min_beds[i],
            max_beds: max_beds[i],
            stock,
            broken,
        })
        .collect();

    Ok(Instance::new(facilities, requirements, built, Target::Demand(demand))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{FacilityIndex, RequirementIndex};

    const FULL: &str = "2
0
1 1 1
5
500 900
0 1
4 6
100 50 30
20 10
1 0.5 2
6 2 8
1 1 0
0 0 0
0 5
7 0
0 4
3 0
";

    const SIMPLE: &str = "2 1 1
0
250.5
0 1000
2 1
10 5
100
1
40
0.5
5
0
2
0
";

    fn replace_line(text: &str, line: usize, with: &str) -> String {
        text.lines()
            .enumerate()
            .map(|(k, l)| if k + 1 == line { with } else { l })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn parses_full_dialect() {
        let instance = parse_str(FULL, Dialect::Full).unwrap();
        let (f0, f1) = (FacilityIndex::from(0usize), FacilityIndex::from(1usize));

        assert_eq!(instance.target(), Target::Demand(5));
        assert_eq!(instance.facilities().len(), 2);
        assert_eq!(instance.ranges().equipment, 0..1);
        assert_eq!(instance.ranges().infrastructure, 1..2);
        assert_eq!(instance.ranges().staff, 2..3);

        // the built facility's declared cost is discarded
        assert_eq!(instance.facility(f0).construction_cost, 0.0);
        assert_eq!(instance.facility(f1).construction_cost, 900.0);

        assert_eq!(instance.facility(f0).stock, vec![6, 2, 8]);
        // no stock row is given for the unbuilt facility
        assert_eq!(instance.facility(f1).stock, vec![0, 0, 0]);
        assert_eq!(instance.facility(f0).broken, vec![1, 1, 0]);

        let staff = instance.requirement(RequirementIndex::from(2usize));
        assert_eq!(staff.kind, RequirementKind::Staff);
        assert_eq!(staff.repair_price, 0.0);
        assert_eq!(staff.transfer.as_ref().unwrap().cost(f1, f0), 3.0);

        let infrastructure = instance.requirement(RequirementIndex::from(1usize));
        assert!(infrastructure.transfer.is_none());
        assert_eq!(infrastructure.necessity_rate, 0.5);

        let equipment = instance.requirement(RequirementIndex::from(0usize));
        assert_eq!(equipment.transfer.as_ref().unwrap().cost(f0, f1), 5.0);
    }

    #[test]
    fn full_repair_prices_may_cover_every_requirement() {
        let text = replace_line(FULL, 9, "20 10 0");
        assert!(parse_str(&text, Dialect::Full).is_ok());

        let text = replace_line(FULL, 9, "20");
        assert!(matches!(
            parse_str(&text, Dialect::Full),
            Err(ParseError::RequirementRangeMismatch {
                line: 9,
                expected: 3,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn parses_simple_dialect() {
        let instance = parse_str(SIMPLE, Dialect::Simple).unwrap();
        let (f0, f1) = (FacilityIndex::from(0usize), FacilityIndex::from(1usize));

        assert_eq!(instance.target(), Target::Budget(250.5));
        assert_eq!(instance.requirements().len(), 2);
        assert_eq!(instance.ranges().equipment, 0..1);
        assert_eq!(instance.ranges().staff, 1..2);

        let staff = instance.requirement(RequirementIndex::from(1usize));
        assert_eq!(staff.kind, RequirementKind::Staff);
        assert_eq!(staff.price, 40.0);
        assert_eq!(staff.necessity_rate, 0.5);

        assert_eq!(instance.facility(f0).stock, vec![5, 2]);
        assert_eq!(instance.facility(f1).stock, vec![0, 0]);
        assert_eq!(instance.facility(f1).construction_cost, 1000.0);
        assert!(instance.is_built(f0));
    }

    #[test]
    fn reports_missing_records() {
        let text: String = FULL.lines().take(12).collect::<Vec<_>>().join("\n");
        match parse_str(&text, Dialect::Full) {
            Err(ParseError::UnexpectedEof { line, record }) => {
                assert_eq!(line, 13);
                assert_eq!(record, "repair needs of facility 1");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn reports_non_numeric_tokens() {
        let text = replace_line(FULL, 7, "4 six");
        match parse_str(&text, Dialect::Full) {
            Err(ParseError::NonNumeric {
                line,
                token,
                type_name,
                ..
            }) => {
                assert_eq!(line, 7);
                assert_eq!(token, "six");
                assert_eq!(type_name, "u32");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn reports_vector_lengths() {
        let text = replace_line(FULL, 5, "500 900 100");
        assert!(matches!(
            parse_str(&text, Dialect::Full),
            Err(ParseError::LengthMismatch {
                line: 5,
                expected: 2,
                found: 3,
                ..
            })
        ));

        let text = replace_line(FULL, 8, "100 50");
        assert!(matches!(
            parse_str(&text, Dialect::Full),
            Err(ParseError::RequirementRangeMismatch { line: 8, .. })
        ));
    }

    #[test]
    fn reports_malformed_requirement_counts() {
        let text = replace_line(FULL, 3, "1 1");
        assert!(matches!(
            parse_str(&text, Dialect::Full),
            Err(ParseError::MalformedRanges { line: 3, found: 2 })
        ));
    }

    #[test]
    fn reports_built_facility_out_of_range() {
        let text = replace_line(FULL, 2, "0 2");
        assert!(matches!(
            parse_str(&text, Dialect::Full),
            Err(ParseError::BuiltOutOfRange {
                line: 2,
                facility: 2,
                facilities: 2
            })
        ));
    }

    #[test]
    fn reports_zero_capacity() {
        let text = replace_line(FULL, 7, "4 0");
        assert!(matches!(
            parse_str(&text, Dialect::Full),
            Err(ParseError::ZeroCapacity { line: 7, facility: 1 })
        ));
    }

    #[test]
    fn reports_trailing_input() {
        let text = format!("{}\n1 2 3\n", FULL);
        assert!(matches!(
            parse_str(&text, Dialect::Full),
            Err(ParseError::TrailingInput { line: 19 })
        ));

        // blank lines after the last record are fine
        let text = format!("{}\n\n", FULL);
        assert!(parse_str(&text, Dialect::Full).is_ok());
    }

    #[test]
    fn requirement_counts_that_overflow_are_malformed() {
        let text = replace_line(FULL, 3, &format!("{} 1 0", usize::MAX));
        assert!(matches!(
            parse_str(&text, Dialect::Full),
            Err(ParseError::MalformedRanges { line: 3, found: 3 })
        ));
    }

    #[test]
    fn stock_at_unbuilt_facility_is_zeroed_in_simple_dialect() {
        let text = replace_line(&replace_line(SIMPLE, 12, "3"), 14, "4");
        let instance = parse_str(&text, Dialect::Simple).unwrap();
        let f1 = FacilityIndex::from(1usize);

        assert_eq!(instance.facility(f1).stock, vec![0, 0]);
        // the built facility keeps what it lists
        assert_eq!(instance.facility(FacilityIndex::from(0usize)).stock, vec![5, 2]);
    }
}
