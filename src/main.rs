//! genotick-eval - population maintenance CLI
//!
//! Inspects and maintains a directory of Genotick robots stored as
//! `<id>.prg` files, the same population the evaluation engine reads.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, config, missing population, etc.)

mod cli;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat};
use genotick_eval::analysis::summarize_robots;
use genotick_eval::config::{Config, DEFAULT_CONFIG_FILE};
use genotick_eval::report::{self, PopulationReport};
use genotick_eval::{AgentId, FsPopulation, Population, Robot};
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    args.apply_to(&mut config);

    init_logging(args.log_level(config.general.verbose));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args, config).await {
        error!("Command failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: generate a default .genotick.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: a tracing subscriber was already installed");
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("Warning: ignoring {}: {:#}", DEFAULT_CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}

async fn run(args: Args, config: Config) -> Result<()> {
    let dir = config.population.dir.clone();
    let population = FsPopulation::<Robot>::open(&dir)
        .await
        .with_context(|| format!("Failed to open population {}", dir))?;
    info!("Population at {}", population.dir().display());

    match args.command {
        Command::InitConfig => handle_init_config(),
        Command::List { from, to } => list(&population, from, to).await,
        Command::Show { id, last } => show(&population, id, last).await,
        Command::Report { format, output } => {
            let robots = population.load_all().await?;
            let report = PopulationReport::new(dir, summarize_robots(&robots));

            let content = match format {
                OutputFormat::Json => report::generate_json_report(&report)?,
                OutputFormat::Markdown => report::generate_markdown_report(&report),
            };

            match output {
                Some(path) => {
                    report::write_report(&content, &path)
                        .with_context(|| format!("Failed to write report to {}", path.display()))?;
                    println!("✅ Report saved to: {}", path.display());
                }
                None => println!("{}", content),
            }
            Ok(())
        }
        Command::Remove { id } => {
            population.remove(id).await?;
            println!("🗑️  Removed robot {}", id);
            Ok(())
        }
        Command::Clear { .. } => {
            let removed = population.remove_all().await?;
            warn!("Removed {} robots from {}", removed, population.dir().display());
            println!("🗑️  Removed {} robots", removed);
            Ok(())
        }
    }
}

async fn list(
    population: &FsPopulation<Robot>,
    from: Option<usize>,
    to: Option<usize>,
) -> Result<()> {
    let ids = match (from, to) {
        (Some(from), Some(to)) => population.list_range(from, to).await?,
        _ => population.list_identities().await?,
    };

    if ids.is_empty() {
        println!("   No robots found.");
        return Ok(());
    }

    for id in &ids {
        println!("{}", id);
    }
    println!("\n   Total: {} robots", ids.len());
    Ok(())
}

async fn show(population: &FsPopulation<Robot>, id: AgentId, last: usize) -> Result<()> {
    let robot = population.fetch(id).await?;
    let counts = robot.counts();

    println!("🤖 Robot {}", id);
    println!("   Created: {}", robot.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("   Predictions: {}", counts.total());
    println!(
        "   ↑ Up: {} | ↓ Down: {} | · Out: {}",
        counts.up, counts.down, counts.out
    );
    println!(
        "   Symmetrical: {}",
        if counts.is_symmetrical() { "yes" } else { "no" }
    );

    if !robot.predictions.is_empty() && last > 0 {
        let start = robot.predictions.len().saturating_sub(last);
        let recent: String = robot.predictions[start..]
            .iter()
            .map(|p| p.arrow())
            .collect();
        println!("   Recent: {}", recent);
    }

    Ok(())
}
