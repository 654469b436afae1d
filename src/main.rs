use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use log::error;

use rusty_quant::config::QuantConfig;
use rusty_quant::export::write_results;
use rusty_quant::regression::{RegressionPoint, SampleKind, WeightingFactor};
use rusty_quant::state::RunSession;
use rusty_quant::storage::{JsonRunStore, RunStore};

/// Calibration-curve quantitation for results-table exports.
#[derive(Debug, Parser)]
#[command(name = "rusty-quant", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to ./rusty-quant.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Run store directory, overriding `storage.root`
    #[arg(long, global = true)]
    store: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse an export, fit the calibration and save the run
    Import {
        file: PathBuf,
        #[arg(long)]
        project: String,
        #[arg(long)]
        run: String,
        /// Weighting label, e.g. "1 / x"; defaults to the export's own
        #[arg(long)]
        weighting: Option<String>,
        /// Only use rows of this analyte peak
        #[arg(long)]
        analyte: Option<String>,
        /// Fit and report without saving
        #[arg(long)]
        dry_run: bool,
    },
    /// Print a stored run
    Show {
        #[arg(long)]
        project: String,
        #[arg(long)]
        run: String,
    },
    /// Include or exclude a point, refit and save
    Toggle {
        #[arg(long)]
        project: String,
        #[arg(long)]
        run: String,
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        index: usize,
        #[arg(long, action = ArgAction::Set)]
        active: bool,
    },
    /// Write the results table (.csv or .parquet)
    Export {
        #[arg(long)]
        project: String,
        #[arg(long)]
        run: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// List the runs stored under a project
    List {
        #[arg(long)]
        project: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Standard,
    Qc,
    Unknown,
}

impl From<KindArg> for SampleKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Standard => SampleKind::Standard,
            KindArg::Qc => SampleKind::QualityControl,
            KindArg::Unknown => SampleKind::Unknown,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("rusty-quant error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = QuantConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log.filter.as_str()),
    )
    .init();

    let mut store = JsonRunStore::new(cli.store.clone().unwrap_or(config.storage.root.clone()));

    match cli.command {
        Command::Import {
            file,
            project,
            run,
            weighting,
            analyte,
            dry_run,
        } => {
            let weighting = match weighting {
                Some(label) => Some(label.parse::<WeightingFactor>()?),
                None => config.regression.weighting_factor()?,
            };
            let mut session = RunSession::new(project, run);
            session.start_import(file, analyte)?;
            let fitted = session.wait_import(weighting);
            if let Some(regression) = session.regression() {
                print!("{}", regression.summary());
            }
            fitted?;
            if let Some(notice) = &session.status_message {
                println!("{notice}");
            }
            if !dry_run {
                session.save(&mut store)?;
            }
        }
        Command::Show { project, run } => {
            let session = RunSession::open(&store, &project, &run)?;
            print_session(&session);
        }
        Command::Toggle {
            project,
            run,
            kind,
            index,
            active,
        } => {
            let mut session = RunSession::open(&store, &project, &run)?;
            if let Err(e) = session.set_point_active(kind.into(), index, active) {
                error!("Not saved: {e:#}");
                return Err(e);
            }
            session.save(&mut store)?;
            print_session(&session);
        }
        Command::Export { project, run, out } => {
            let session = RunSession::open(&store, &project, &run)?;
            let regression = session.regression().context("run has no data")?;
            write_results(&out, regression.data())
                .with_context(|| format!("writing {}", out.display()))?;
            println!("Wrote {} result(s) to {}", regression.data().len(), out.display());
        }
        Command::List { project } => {
            for run in store.list_runs(&project)? {
                println!("{run}");
            }
        }
    }
    Ok(())
}

fn fmt_opt(v: Option<f64>, precision: usize) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
}

fn print_points(kind: SampleKind, points: &[RegressionPoint]) {
    for (i, p) in points.iter().enumerate() {
        println!(
            "{:<8} {:>3} {} {:<24} {:>12} {:>14} {:>12} {:>9}",
            kind.label(),
            i,
            if p.is_active { ' ' } else { 'x' },
            p.sample_name,
            fmt_opt(p.nominal_concentration, 4),
            fmt_opt(p.instrument_response, 2),
            fmt_opt(p.calculated_concentration, 4),
            fmt_opt(p.accuracy.map(|a| a * 100.0), 2),
        );
    }
}

fn print_session(session: &RunSession) {
    println!("run {}/{}", session.project_id, session.run_id);
    if let Some(message) = &session.status_message {
        println!("{message}");
    }
    let Some(regression) = session.regression() else {
        return;
    };
    print!("{}", regression.summary());
    println!(
        "{:<8} {:>3}   {:<24} {:>12} {:>14} {:>12} {:>9}",
        "kind", "#", "sample", "nominal", "response", "calculated", "acc %"
    );
    let data = regression.data();
    print_points(SampleKind::Standard, &data.standards);
    print_points(SampleKind::QualityControl, &data.quality_controls);
    print_points(SampleKind::Unknown, &data.unknowns);
}
