//! dtnsim — run a TOML DTN scenario from the command line.
//!
//! ```bash
//! # One run, CSV reports in ./output, event log on stdout
//! dtnsim scenarios/campus.toml --events -
//!
//! # Same scenario over five seeds, summary table only
//! dtnsim scenarios/campus.toml --sweep 1,2,3,4,5
//!
//! # Drive the run from stdin: pause / resume / step [n] / terminate
//! dtnsim scenarios/campus.toml --interactive
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dtn_output::{CsvWriter, EventLogSink, ReportObserver, ReportWriter, RunSummary};
use dtn_sim::{ControlCommand, ObserverSet, ScenarioConfig, Sim, run_sweep, seed_sweep};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Csv,
    Sqlite,
    Parquet,
}

/// Delay-tolerant network simulator.
#[derive(Parser, Debug)]
#[command(name = "dtnsim", version, about, long_about = None)]
struct Args {
    /// Scenario TOML file.  Relative paths inside it resolve against its directory.
    scenario: PathBuf,

    /// Directory for report files; created if missing.
    #[arg(short, long, default_value = "output")]
    out: PathBuf,

    /// Report backend.
    #[arg(short, long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Write a periodic stats row every N contacts (0 disables).
    #[arg(long, default_value_t = 100)]
    stats_every: u64,

    /// Write one line per event to this file, or `-` for stdout.
    #[arg(long)]
    events: Option<PathBuf>,

    /// Override the scenario seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Run once per seed (comma separated) and print a summary table
    /// instead of writing reports.
    #[arg(long, value_delimiter = ',')]
    sweep: Vec<u64>,

    /// Read control commands from stdin while running.
    #[arg(short, long)]
    interactive: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let (mut cfg, base_dir) = ScenarioConfig::load(&args.scenario)
        .with_context(|| format!("loading {}", args.scenario.display()))?;
    if let Some(seed) = args.seed {
        cfg = cfg.with_seed(seed);
    }

    if !args.sweep.is_empty() {
        return sweep(&cfg, &base_dir, &args.sweep);
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    let mut sim = cfg.build(Some(&base_dir))?;
    info!(
        scenario = %cfg.name,
        nodes = sim.node_count(),
        seed = cfg.seed,
        policy = sim.policy_name(),
        out = %args.out.display(),
        "starting run"
    );

    let t0 = Instant::now();
    let summary = match args.format {
        Format::Csv => run(&mut sim, CsvWriter::new(&args.out)?, &args)?,
        #[cfg(feature = "sqlite")]
        Format::Sqlite => run(&mut sim, dtn_output::SqliteWriter::new(&args.out)?, &args)?,
        #[cfg(feature = "parquet")]
        Format::Parquet => run(&mut sim, dtn_output::ParquetWriter::new(&args.out)?, &args)?,
        #[allow(unreachable_patterns)]
        other => bail!("{other:?} output needs dtnsim built with `--features {}`", format!("{other:?}").to_lowercase()),
    };

    print_summary(&cfg.name, cfg.seed, &summary);
    info!(wall_secs = t0.elapsed().as_secs_f64(), "done");
    Ok(())
}

/// Run `sim` to completion with a report observer and the optional event log.
fn run<W: ReportWriter>(sim: &mut Sim, writer: W, args: &Args) -> Result<RunSummary> {
    let mut report = ReportObserver::new(writer, args.stats_every);
    let mut log = args.events.as_deref().map(open_event_log).transpose()?;

    {
        let mut observers = ObserverSet::new().with(&mut report);
        if let Some(log) = log.as_mut() {
            observers.push(log);
        }

        if args.interactive {
            let commands = spawn_console();
            let end = sim.config().end_time;
            sim.run_controlled(end, &mut observers, &commands)?;
            sim.finish(&mut observers);
        } else {
            sim.run(&mut observers)?;
        }
    }

    if let Some(e) = log.as_mut().and_then(EventLogSink::take_error) {
        warn!(error = %e, "event log incomplete");
    }
    if let Some(e) = report.take_error() {
        return Err(e).context("writing reports");
    }
    report.summary().cloned().context("run ended without a summary")
}

fn open_event_log(path: &Path) -> Result<EventLogSink<Box<dyn Write>>> {
    let out: Box<dyn Write> = if path == Path::new("-") {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        Box::new(BufWriter::new(file))
    };
    Ok(EventLogSink::new(out))
}

/// Parse stdin lines into commands on a background thread.  The channel
/// closes when stdin does.
fn spawn_console() -> mpsc::Receiver<ControlCommand> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<ControlCommand>() {
                Ok(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("{e}; expected pause, resume, step [n] or terminate"),
            }
        }
    });
    rx
}

fn sweep(base: &ScenarioConfig, base_dir: &Path, seeds: &[u64]) -> Result<()> {
    let configs = seed_sweep(base, seeds.iter().copied());
    let mut failed = 0;
    for result in run_sweep(&configs, Some(base_dir)) {
        match result {
            Ok(r) => print_summary(&r.name, r.seed, &RunSummary::from_stats(&r.stats)),
            Err(e) => {
                failed += 1;
                eprintln!("run failed: {e}");
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} runs failed", configs.len());
    }
    Ok(())
}

fn print_summary(name: &str, seed: u64, s: &RunSummary) {
    println!(
        "{name} seed={seed} created={} delivered={} ratio={:.3} overhead={:.3} latency={:.1}s hops={:.2} dropped={}",
        s.created,
        s.delivered,
        s.delivery_ratio,
        s.overhead_ratio,
        s.mean_latency_secs,
        s.mean_hops,
        s.dropped_total(),
    );
}
