//! Textual LP artifact of a [`Model`], one line per row.
//!
//! The writer emits a CPLEX-LP-style file that is meant for humans auditing a model. Row
//! families are kept as `\ family: <name>` comment lines so that [`read_lp`] can restore
//! them. The reader only understands what [`write_lp`] produces (modulo whitespace); it is
//! not a general LP parser.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use derive_more::Display;
use log::debug;

use super::{Constr, LinExpr, Model, ObjSense, Sense, Var, VarType};

const FAMILY_TAG: &str = "\\ family:";
const NAMES_PER_LINE: usize = 10;

#[derive(Debug, Display)]
#[display(fmt = "LP line {}: {}", line, message)]
pub struct LpFormatError {
    pub line: usize,
    pub message: String,
}

impl std::error::Error for LpFormatError {}

fn number(value: f64) -> String {
    if value == f64::INFINITY {
        "+inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{}", value)
    }
}

fn terms(model: &Model, expr: &LinExpr) -> String {
    let mut out = String::new();
    for (k, (var, coef)) in expr.terms().iter().enumerate() {
        let name = &model.var(*var).name;
        match (k, *coef < 0.0) {
            (0, false) => out.push_str(&format!("{} {}", number(*coef), name)),
            (0, true) => out.push_str(&format!("-{} {}", number(-coef), name)),
            (_, false) => out.push_str(&format!(" + {} {}", number(*coef), name)),
            (_, true) => out.push_str(&format!(" - {} {}", number(-coef), name)),
        }
    }

    if expr.constant() != 0.0 || expr.terms().is_empty() {
        let c = expr.constant();
        match (out.is_empty(), c < 0.0) {
            (true, _) => out.push_str(&number(c)),
            (false, false) => out.push_str(&format!(" + {}", number(c))),
            (false, true) => out.push_str(&format!(" - {}", number(-c))),
        }
    }
    out
}

fn name_block<W: Write>(out: &mut W, header: &str, names: &[&str]) -> io::Result<()> {
    if names.is_empty() {
        return Ok(());
    }
    writeln!(out, "{}", header)?;
    for chunk in names.chunks(NAMES_PER_LINE) {
        writeln!(out, " {}", chunk.join(" "))?;
    }
    Ok(())
}

/// Writes the model in LP format
pub fn write_lp<W: Write>(model: &Model, out: &mut W) -> io::Result<()> {
    writeln!(out, "\\ Model: {}", model.name())?;
    match model.sense() {
        ObjSense::Minimize => writeln!(out, "Minimize")?,
        ObjSense::Maximize => writeln!(out, "Maximize")?,
    }
    writeln!(out, " obj: {}", terms(model, model.objective()))?;

    writeln!(out, "Subject To")?;
    for family in model.families() {
        writeln!(out, "{} {}", FAMILY_TAG, family.name)?;
        for row in &family.rows {
            writeln!(
                out,
                " {}: {} {} {}",
                row.name,
                terms(model, &row.expr),
                row.sense,
                number(row.rhs)
            )?;
        }
    }

    writeln!(out, "Bounds")?;
    for decl in model.vars() {
        if decl.lb == f64::NEG_INFINITY && decl.ub == f64::INFINITY {
            writeln!(out, " {} free", decl.name)?;
        } else {
            writeln!(out, " {} <= {} <= {}", number(decl.lb), decl.name, number(decl.ub))?;
        }
    }

    let of_type = |vtype: VarType| -> Vec<&str> {
        model
            .vars()
            .iter()
            .filter(|d| d.vtype == vtype)
            .map(|d| d.name.as_str())
            .collect()
    };
    name_block(out, "Generals", &of_type(VarType::Integer))?;
    name_block(out, "Binaries", &of_type(VarType::Binary))?;
    writeln!(out, "End")
}

/// Writes the model in LP format to a file
pub fn write_lp_file<P: AsRef<Path>>(model: &Model, path: P) -> io::Result<()> {
    debug!("Writing LP artifact to {}", path.as_ref().display());
    let mut out = BufWriter::new(File::create(path)?);
    write_lp(model, &mut out)?;
    out.flush()
}

/// Renders the model as an LP string
pub fn to_lp_string(model: &Model) -> String {
    let mut buf = Vec::new();
    // writing into a Vec cannot fail
    let _ = write_lp(model, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Objective,
    Constraints,
    Bounds,
    Generals,
    Binaries,
    End,
}

struct Reader {
    model: Model,
    by_name: HashMap<String, Var>,
    objective: LinExpr,
    sense: ObjSense,
    family: Option<(String, Vec<Constr>)>,
    line: usize,
}

impl Reader {
    fn err<T>(&self, message: impl Into<String>) -> Result<T, LpFormatError> {
        Err(LpFormatError {
            line: self.line,
            message: message.into(),
        })
    }

    fn var(&mut self, name: &str) -> Var {
        if let Some(var) = self.by_name.get(name) {
            return *var;
        }
        // LP default bounds
        let var = self.model.add_var(name, VarType::Continuous, 0.0..=f64::INFINITY);
        self.by_name.insert(name.to_string(), var);
        var
    }

    fn parse_number(&self, token: &str) -> Result<f64, LpFormatError> {
        match token {
            "+inf" | "inf" => Ok(f64::INFINITY),
            "-inf" => Ok(f64::NEG_INFINITY),
            _ => match token.parse::<f64>() {
                Ok(value) => Ok(value),
                Err(_) => self.err(format!("expected a number, found '{}'", token)),
            },
        }
    }

    fn is_number(token: &str) -> bool {
        token.starts_with(|c: char| c.is_ascii_digit() || c == '.')
            || (token.len() > 1
                && token.starts_with(|c: char| c == '-' || c == '+')
                && token[1..].starts_with(|c: char| c.is_ascii_digit() || c == '.'))
    }

    fn parse_expr(&mut self, tokens: &[&str]) -> Result<LinExpr, LpFormatError> {
        let mut expr = LinExpr::new();
        let mut sign = 1.0;
        let mut coef: Option<f64> = None;

        for token in tokens {
            match *token {
                "+" => sign = 1.0,
                "-" => sign = -1.0,
                t if Self::is_number(t) => {
                    if let Some(c) = coef {
                        expr.add_constant(sign * c);
                        sign = 1.0;
                    }
                    coef = Some(self.parse_number(t)?);
                }
                name => {
                    let var = self.var(name);
                    expr.add_term(sign * coef.take().unwrap_or(1.0), var);
                    sign = 1.0;
                }
            }
        }
        if let Some(c) = coef {
            expr.add_constant(sign * c);
        }
        Ok(expr)
    }

    fn objective_line(&mut self, text: &str) -> Result<(), LpFormatError> {
        let body = text.split_once(':').map(|(_, body)| body).unwrap_or(text);
        let tokens: Vec<&str> = body.split_whitespace().collect();
        let expr = self.parse_expr(&tokens)?;
        self.objective += expr;
        Ok(())
    }

    fn constraint_line(&mut self, text: &str) -> Result<(), LpFormatError> {
        let (name, body) = match text.split_once(':') {
            Some((name, body)) => (name.trim().to_string(), body),
            None => return self.err("row without a name"),
        };
        let tokens: Vec<&str> = body.split_whitespace().collect();
        let op = tokens
            .iter()
            .position(|t| matches!(*t, "<=" | ">=" | "=" | "=<" | "=>"));
        let op = match op {
            Some(op) if op + 2 == tokens.len() => op,
            _ => return self.err(format!("row '{}' needs '<expr> <op> <rhs>'", name)),
        };

        let sense = match tokens[op] {
            "<=" | "=<" => Sense::Le,
            ">=" | "=>" => Sense::Ge,
            _ => Sense::Eq,
        };
        let lhs = self.parse_expr(&tokens[..op])?;
        let rhs = self.parse_number(tokens[op + 1])?;
        let row = match sense {
            Sense::Le => lhs.leq(rhs),
            Sense::Ge => lhs.geq(rhs),
            Sense::Eq => lhs.equals(rhs),
        };

        let constr = Constr::new(name, row);
        match self.family.as_mut() {
            Some((_, rows)) => rows.push(constr),
            None => self.family = Some(("constraints".to_string(), vec![constr])),
        }
        Ok(())
    }

    fn close_family(&mut self) {
        if let Some((name, rows)) = self.family.take() {
            self.model.add_family(&name, rows);
        }
    }

    fn bound_line(&mut self, text: &str) -> Result<(), LpFormatError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.as_slice() {
            [name, free] if free.eq_ignore_ascii_case("free") => {
                let var = self.var(name);
                let decl = &mut self.model.vars[*var];
                decl.lb = f64::NEG_INFINITY;
                decl.ub = f64::INFINITY;
            }
            [lb, "<=", name, "<=", ub] => {
                let (lb, ub) = (self.parse_number(lb)?, self.parse_number(ub)?);
                let var = self.var(name);
                let decl = &mut self.model.vars[*var];
                decl.lb = lb;
                decl.ub = ub;
            }
            _ => return self.err(format!("unrecognised bound '{}'", text)),
        }
        Ok(())
    }

    fn type_line(&mut self, text: &str, vtype: VarType) {
        for name in text.split_whitespace() {
            let var = self.var(name);
            self.model.vars[*var].vtype = vtype;
        }
    }
}

/// Reads a model previously written by [`write_lp`].
pub fn read_lp(text: &str) -> Result<Model, LpFormatError> {
    let mut reader = Reader {
        model: Model::new(""),
        by_name: HashMap::new(),
        objective: LinExpr::new(),
        sense: ObjSense::Minimize,
        family: None,
        line: 0,
    };
    let mut section = Section::Preamble;

    for (k, raw) in text.lines().enumerate() {
        reader.line = k + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix(FAMILY_TAG) {
            reader.close_family();
            reader.family = Some((name.trim().to_string(), Vec::new()));
            continue;
        }
        if let Some(name) = line.strip_prefix("\\ Model:") {
            reader.model.name = name.trim().to_string();
            continue;
        }
        if line.starts_with('\\') {
            continue;
        }

        let next = match line.to_ascii_lowercase().as_str() {
            "minimize" | "minimise" | "min" => {
                reader.sense = ObjSense::Minimize;
                Some(Section::Objective)
            }
            "maximize" | "maximise" | "max" => {
                reader.sense = ObjSense::Maximize;
                Some(Section::Objective)
            }
            "subject to" | "st" | "s.t." => Some(Section::Constraints),
            "bounds" => Some(Section::Bounds),
            "generals" | "general" | "integers" => Some(Section::Generals),
            "binaries" | "binary" => Some(Section::Binaries),
            "end" => Some(Section::End),
            _ => None,
        };
        if let Some(next) = next {
            if section == Section::Constraints {
                reader.close_family();
            }
            section = next;
            continue;
        }

        match section {
            Section::Objective => reader.objective_line(line)?,
            Section::Constraints => reader.constraint_line(line)?,
            Section::Bounds => reader.bound_line(line)?,
            Section::Generals => reader.type_line(line, VarType::Integer),
            Section::Binaries => reader.type_line(line, VarType::Binary),
            Section::Preamble | Section::End => {
                return reader.err(format!("unexpected content '{}'", line))
            }
        }
    }

    let Reader {
        mut model,
        objective,
        sense,
        ..
    } = reader;
    model.set_objective(objective, sense);
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Model {
        let mut model = Model::new("sample");
        let x = model.add_var("x_0", VarType::Integer, f64::NEG_INFINITY..=f64::INFINITY);
        let y = model.add_var("y_0", VarType::Binary, 0.0..=1.0);
        let z = model.add_var("z_0_0", VarType::Integer, 0.0..=f64::INFINITY);
        model.set_objective(LinExpr::from(x), ObjSense::Maximize);
        model.add_family(
            "budget",
            vec![Constr::new("budget", (250.0 * y + 12.5 * z).leq(100.0))],
        );
        model.add_family(
            "y_dependent",
            vec![
                Constr::new("y_dependent_upper_0", ((1.0 / 3.0) * x - y).leq(0.0)),
                Constr::new("y_dependent_lower_0", (LinExpr::from(y) - x).leq(0.0)),
            ],
        );
        model
    }

    #[test]
    fn writes_one_line_per_row() {
        let text = to_lp_string(&sample());
        assert!(text.starts_with("\\ Model: sample\nMaximize\n obj: 1 x_0\nSubject To\n"));
        assert!(text.contains(" budget: 250 y_0 + 12.5 z_0_0 <= 100\n"));
        assert!(text.contains(" y_dependent_lower_0: 1 y_0 - 1 x_0 <= 0\n"));
        assert!(text.contains(" x_0 free\n"));
        assert!(text.contains(" 0 <= y_0 <= 1\n"));
        assert!(text.contains("Generals\n x_0 z_0_0\nBinaries\n y_0\nEnd\n"));
    }

    #[test]
    fn reads_back_what_it_writes() {
        let model = sample();
        let parsed = read_lp(&to_lp_string(&model)).unwrap();

        assert_eq!(parsed.name(), "sample");
        assert_eq!(parsed.sense(), ObjSense::Maximize);
        assert_eq!(parsed.num_constrs(), model.num_constrs());

        let families: Vec<&str> = parsed.families().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(families, vec!["budget", "y_dependent"]);

        let mut names: Vec<&str> = parsed.vars().iter().map(|v| v.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["x_0", "y_0", "z_0_0"]);

        let x = parsed.var_by_name("x_0").unwrap();
        assert_eq!(parsed.var(x).vtype, VarType::Integer);
        assert_eq!(parsed.var(x).lb, f64::NEG_INFINITY);

        let row = &parsed.families()[1].rows[0];
        assert_eq!(row.name, "y_dependent_upper_0");
        assert_eq!(row.expr.terms()[0], (x, 1.0 / 3.0));
    }

    #[test]
    fn rejects_rows_without_comparison() {
        let text = "Minimize\n obj: 1 x\nSubject To\n bad: 1 x 4\nEnd\n";
        let err = read_lp(text).unwrap_err();
        assert_eq!(err.line, 4);
    }
}
