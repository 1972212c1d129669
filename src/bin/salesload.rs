//! salesload CLI - load sales extracts into the warehouse
//!
//! Reads the customer, product, order and order-detail CSV extracts, cleans
//! them and replaces the warehouse contents with the result.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use salesload::{
    count_tables, Config, Database, MemoryWarehouse, Pipeline, Result, RunReport,
    SqlWarehouse,
};

#[derive(Parser)]
#[command(name = "salesload")]
#[command(version, about = "Load sales CSV extracts into a relational warehouse", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, clean and load the four tables
    Run {
        /// Path to YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory holding the CSV extracts (overrides source.data_dir)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Database URL (overrides database.url and DATABASE_URL)
        #[arg(long)]
        database_url: Option<String>,

        /// Rows per multi-row INSERT
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Load into an in-memory warehouse instead of the database
        #[arg(long)]
        dry_run: bool,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Process the extracts and report, without touching the database
    Check {
        /// Path to YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory holding the CSV extracts (overrides source.data_dir)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Print the row count of every warehouse table
    Counts {
        /// Path to YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Database URL (overrides database.url and DATABASE_URL)
        #[arg(long)]
        database_url: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            data_dir,
            database_url,
            batch_size,
            dry_run,
            format,
        } => run(config, data_dir, database_url, batch_size, dry_run, format),
        Commands::Check { config, data_dir } => check(config, data_dir),
        Commands::Counts {
            config,
            database_url,
        } => counts(config, database_url),
    };

    if let Err(e) = result {
        error!(phase = ?e.phase(), "Run failed");
        eprintln!("{}", e.format_detailed());
        process::exit(1);
    }
}

/// File, then environment, then command line.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_env()?;
    Ok(config)
}

fn run(
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    database_url: Option<String>,
    batch_size: Option<usize>,
    dry_run: bool,
    format: Format,
) -> Result<()> {
    let mut config = load_config(config.as_deref())?;
    if let Some(dir) = data_dir {
        config.source.data_dir = dir;
    }
    if let Some(url) = database_url {
        config.database.url = Some(url);
    }
    if let Some(size) = batch_size {
        config.load.batch_size = size;
    }

    let report = if dry_run {
        info!("Dry run: loading into memory");
        Pipeline::new(config)?.run(&mut MemoryWarehouse::new())?
    } else {
        let db = Database::new_with_config(config.database_url()?, config.database.pool.clone())?;
        let mut conn = db.get_connection()?;
        Pipeline::new(config)?.run(&mut SqlWarehouse::new(&mut conn))?
    };

    print_report(&report, format)
}

fn print_report(report: &RunReport, format: Format) -> Result<()> {
    match format {
        Format::Text => println!("{}", report),
        Format::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    if !report.validation.all_match() {
        eprintln!("warning: warehouse row counts differ from the processed extracts");
    }
    Ok(())
}

fn check(config: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(config.as_deref())?;
    if let Some(dir) = data_dir {
        config.source.data_dir = dir;
    }

    let prepared = Pipeline::new(config)?.prepare()?;
    println!("{}", prepared.summary);
    Ok(())
}

fn counts(config: Option<PathBuf>, database_url: Option<String>) -> Result<()> {
    let mut config = load_config(config.as_deref())?;
    if let Some(url) = database_url {
        config.database.url = Some(url);
    }

    let db = Database::new_with_config(config.database_url()?, config.database.pool.clone())?;
    let mut conn = db.get_connection()?;
    let mut store = SqlWarehouse::new(&mut conn);

    for (table, rows) in count_tables(&mut store)? {
        println!("{:<14} {:>10}", table.name(), rows);
    }
    Ok(())
}
