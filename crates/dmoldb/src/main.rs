use std::{
    fs::File,
    os::unix::prelude::AsRawFd,
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use dmoldb::{
    config::{Config, Mode, RunPaths},
    db::Db,
    die, harvest, report,
};

/// harvest DMOL3 geometry-optimization results into a structured store
#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
struct Args {
    /// root directory containing the search workspaces; required unless
    /// a reporting subcommand is given
    #[arg(value_parser)]
    root: Option<PathBuf>,

    /// TOML run configuration
    #[arg(short, long)]
    config: Option<String>,

    /// discovery strategy, overriding the configuration
    #[arg(short, long)]
    mode: Option<Mode>,

    /// similarity cutoff in angstroms, overriding the configuration
    #[arg(long)]
    cutoff: Option<f64>,

    /// skip DOS rendering
    #[arg(long, default_value_t = false)]
    no_dos: bool,

    /// mirror diagnostics into a timestamped run log file
    #[arg(short, long, default_value_t = false)]
    log: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// flatten a store into a CSV file next to it
    Csv { store: PathBuf },

    /// merge the records of one store into another, renumbering ids
    Merge { into: PathBuf, from: PathBuf },

    /// render the aggregate statistics figure for a store
    Stats {
        store: PathBuf,
        /// output image path
        #[arg(short, long, default_value = "stats.png")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Some(Command::Csv { store }) => {
            let out = Db::open(store).to_csv()?;
            println!("wrote {}", out.display());
            return Ok(());
        }
        Some(Command::Merge { into, from }) => {
            let n = Db::open(&into).merge(&Db::open(from))?;
            println!("merged {n} records into {}", into.display());
            return Ok(());
        }
        Some(Command::Stats { store, out }) => {
            if let Err(e) = report::plot_stats(&Db::open(store), &out) {
                die!("{e}");
            }
            println!("wrote {}", out.display());
            return Ok(());
        }
        None => {}
    }

    let Some(root) = args.root else {
        die!("a root directory is required; see --help");
    };
    if !root.is_dir() {
        die!("root path {} does not exist", root.display());
    }

    let mut config = match args.config {
        Some(f) => Config::load(&f),
        None => Config::default(),
    };
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(cutoff) = args.cutoff {
        config.rmsd_cutoff = cutoff;
    }
    if args.no_dos {
        config.dos = false;
    }

    let paths = RunPaths::new(&jiff::Zoned::now());
    if args.log {
        let logfile =
            File::create(&paths.log).expect("failed to create log file");
        // redirect stderr into the run log so every diagnostic line,
        // including env_logger output, lands there
        unsafe {
            libc::dup2(logfile.as_raw_fd(), 2);
        }
    }

    harvest::run(&root, &config, &paths)
}
