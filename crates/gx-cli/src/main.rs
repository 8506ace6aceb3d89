//! `gx` — stream geospatial features through a GX transform script.
//!
//! Usage: `gx [SOURCES]... --script transform.gx [--workers N]`
//!
//! Records are read from the sources (or stdin), fanned out to a pool of
//! worker VMs sharing one compiled program, and every emitted payload is
//! written to stdout as a JSON line.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::{fmt, EnvFilter};

mod pool;

#[derive(Parser, Debug)]
#[command(name = "gx")]
#[command(about = "Stream geospatial features through a GX transform script")]
struct Args {
    /// Input files (.geojson, .jsonlines, .ndjson); JSON lines are read from
    /// stdin when no sources are given
    sources: Vec<PathBuf>,

    /// GX script to run against each record
    #[arg(short = 'g', long = "script")]
    script: PathBuf,

    /// Number of worker VMs (0 = two per core)
    #[arg(short = 'w', long = "workers", default_value_t = 0)]
    workers: usize,

    /// Log the compiled constants table and code listing
    #[arg(short, long)]
    debug: bool,

    /// Dump VM state to stderr when a record faults
    #[arg(short = 'x', long = "dump-on-crash")]
    dump_on_crash: bool,
}

fn main() {
    let args = Args::parse();
    init_logging(args.debug);
    if let Err(err) = run(args) {
        error!("{err}");
        process::exit(1);
    }
}

/// `RUST_LOG` overrides the default filter; `--debug` raises it.
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let source = fs::read_to_string(&args.script)?;
    let program = Arc::new(gx_lang::compile(&source)?);

    if args.debug {
        for (index, constant) in program.constants.iter().enumerate() {
            debug!("const [{index}] = {constant}");
        }
        for (index, op) in program.code.iter().enumerate() {
            debug!("code  [{index}] : {op}");
        }
        debug!("registers: {}", program.register_count);
    }

    let workers = if args.workers == 0 {
        2 * thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    } else {
        args.workers
    };
    debug!(workers, "starting pool");

    pool::run(program, &args.sources, workers, args.dump_on_crash)
}
