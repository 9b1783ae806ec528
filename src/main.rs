use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use log::{error, info, warn};

use icu_capacity::{
    parse::read_instance,
    plan_capacity,
    problem::Dialect,
    solver::{self, SolverConfig, SolverKind},
    Error, Outcome,
};

/// Plans ICU bed capacity across a network of hospitals.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    /// Instance file
    instance: PathBuf,

    /// Input layout and model shape: simple (budget driven) or full (demand driven)
    #[clap(long)]
    dialect: Dialect,

    /// Solver backend: microlp or gurobi
    #[clap(long, default_value = "microlp")]
    solver: SolverKind,

    /// Wall-clock limit for the solver, in seconds
    #[clap(long)]
    time_limit: Option<f64>,

    /// Write the assembled model as an LP file
    #[clap(long)]
    write_lp: Option<PathBuf>,

    /// Print the plan as JSON instead of text
    #[clap(long)]
    json: bool,

    /// Show the solver's own log
    #[clap(long)]
    verbose: bool,
}

/// Non-positive limits mean no limit
fn time_limit(secs: Option<f64>) -> Result<Option<Duration>, Error> {
    match secs {
        Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid time limit {}: {}", secs, e))),
        Some(secs) if secs.is_nan() => Err(Error::Config("invalid time limit NaN".to_string())),
        _ => Ok(None),
    }
}

fn run(args: &Args) -> Result<Outcome, Error> {
    let instance = read_instance(&args.instance, args.dialect)?;
    info!(
        "Read instance with {} facilities and {} requirements",
        instance.facilities().len(),
        instance.requirements().len()
    );

    let config = SolverConfig {
        time_limit: time_limit(args.time_limit)?,
        verbose: args.verbose,
    };
    let adapter = solver::adapter(args.solver, config)?;

    plan_capacity(&instance, args.dialect, adapter.as_ref(), args.write_lp.as_deref())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(Outcome::Planned(plan)) => {
            if args.json {
                match serde_json::to_string_pretty(&plan) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("failed to serialize the plan: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print!("{}", plan.to_text());
            }
            ExitCode::SUCCESS
        }
        Ok(Outcome::Infeasible) => {
            warn!("The instance is infeasible, no plan was produced");
            ExitCode::from(2)
        }
        Ok(Outcome::Unbounded) => {
            warn!("The objective is unbounded, no plan was produced");
            ExitCode::from(3)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
