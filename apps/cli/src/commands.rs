//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use queryharvest_core::pipeline::{EntryOutcome, HarvestSummary, ProgressReporter};
use queryharvest_shared::{AppConfig, PipelineConfig, init_config, load_config, load_config_from};
use queryharvest_sparql::{QueryExecutor, SparqlExecutor};
use queryharvest_storage::{CollectKind, CollectOptions};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// QueryHarvest: collect worked SPARQL examples from a public query catalog.
#[derive(Parser)]
#[command(
    name = "queryharvest",
    version,
    about = "Harvest SPARQL query examples from a public catalog into JSON files.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.queryharvest/queryharvest.toml).
    #[arg(long, global = true, env = "QUERYHARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// List the catalog, extract every query and write one JSON file per example.
    Harvest(HarvestArgs),

    /// Gather executed examples from an output directory into one document.
    Collect {
        /// Which examples to keep.
        #[arg(long, value_enum)]
        kind: KindArg,

        /// Directory of harvested examples (defaults to the configured output dir).
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Rows (non-empty) or characters (rdf) kept per example.
        #[arg(long)]
        limit: Option<usize>,

        /// Output file (defaults to <kind>_results.json).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for a single harvest run. Unset flags fall back to the config file.
#[derive(Args, Debug, Default)]
pub(crate) struct HarvestArgs {
    /// Output directory for example files.
    #[arg(long, env = "QUERYHARVEST_OUT")]
    pub out: Option<PathBuf>,

    /// Minimum delay between catalog requests, in seconds.
    #[arg(long)]
    pub delay: Option<f64>,

    /// SPARQL endpoint URL.
    #[arg(long, env = "QUERYHARVEST_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Request and execution timeout, in seconds.
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Extract only; mark every example's execution as skipped.
    #[arg(long)]
    pub no_execute: bool,

    /// Stop with an error after this many catalog pages.
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Catalog API base URL.
    #[arg(long, env = "QUERYHARVEST_CATALOG")]
    pub catalog: Option<String>,

    /// Omit `extracted_at` so re-runs produce identical files.
    #[arg(long)]
    pub no_timestamps: bool,
}

impl HarvestArgs {
    /// Layer the flags over a loaded config.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(out) = &self.out {
            config.output.dir = out.to_string_lossy().into_owned();
        }
        if let Some(delay) = self.delay {
            config.http.delay_secs = delay;
        }
        if let Some(endpoint) = &self.endpoint {
            config.sparql.endpoint = endpoint.clone();
        }
        if let Some(timeout) = self.timeout {
            config.http.timeout_secs = timeout;
            config.sparql.timeout_secs = timeout;
        }
        if self.no_execute {
            config.sparql.enabled = false;
        }
        if let Some(max_pages) = self.max_pages {
            config.catalog.max_pages = max_pages;
        }
        if let Some(catalog) = &self.catalog {
            config.catalog.base_url = catalog.clone();
        }
        if self.no_timestamps {
            config.output.timestamps = false;
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum KindArg {
    NonEmpty,
    Rdf,
}

impl From<KindArg> for CollectKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::NonEmpty => CollectKind::NonEmpty,
            KindArg::Rdf => CollectKind::Rdf,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "queryharvest=info",
        1 => "queryharvest=debug",
        _ => "queryharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Harvest(args) => cmd_harvest(config_path, &args).await,
        Command::Collect {
            kind,
            dir,
            limit,
            out,
        } => cmd_collect(config_path, kind.into(), dir, limit, out),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_harvest(config_path: Option<&Path>, args: &HarvestArgs) -> Result<()> {
    let mut app = load(config_path)?;
    args.apply(&mut app);
    let config = PipelineConfig::try_from(&app)?;

    info!(
        catalog = %config.catalog_url,
        endpoint = %config.endpoint,
        out = %config.output_dir.display(),
        execute = config.execute,
        "starting harvest"
    );

    let executor = SparqlExecutor::new(&config)?;
    let reporter = CliProgress::new();
    let summary = harvest_with(&config, &executor, &reporter).await?;

    print_summary(&summary, &config.output_dir);
    Ok(())
}

async fn harvest_with<E: QueryExecutor>(
    config: &PipelineConfig,
    executor: &E,
    reporter: &CliProgress,
) -> Result<HarvestSummary> {
    match queryharvest_core::run_harvest(config, executor, reporter).await {
        Ok(summary) => Ok(summary),
        Err(e) => {
            reporter.spinner.finish_and_clear();
            Err(e.into())
        }
    }
}

fn print_summary(summary: &HarvestSummary, out: &Path) {
    println!();
    println!("  Harvest complete");
    println!("  Entries:            {}", summary.total);
    println!("  Written:            {}", summary.written);
    println!("  Extraction errors:  {}", summary.extraction_failures);
    println!("  Execution failures: {}", summary.execution_failures);
    println!("  Output:             {}", out.display());
    println!("  Time:               {:.1}s", summary.elapsed.as_secs_f64());

    if !summary.failures.is_empty() {
        println!();
        println!("  Failures:");
        for failure in &summary.failures {
            println!("    [{}] {}: {}", failure.stage, failure.id, failure.cause);
        }
    }
    println!();
}

fn cmd_collect(
    config_path: Option<&Path>,
    kind: CollectKind,
    dir: Option<PathBuf>,
    limit: Option<usize>,
    out: Option<PathBuf>,
) -> Result<()> {
    let dir = match dir {
        Some(dir) => dir,
        None => PathBuf::from(load(config_path)?.output.dir),
    };
    if !dir.is_dir() {
        return Err(eyre!("'{}' is not a directory", dir.display()));
    }

    let out = out.unwrap_or_else(|| match kind {
        CollectKind::NonEmpty => PathBuf::from("non_empty_results.json"),
        CollectKind::Rdf => PathBuf::from("rdf_results.json"),
    });

    let collection = queryharvest_storage::collect(&dir, CollectOptions { kind, limit })?;
    queryharvest_storage::write_collection(&out, &collection)?;

    println!(
        "Collected {} of {} examples into {}",
        collection.matched,
        collection.scanned_files,
        out.display()
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn entry_done(&self, outcome: &EntryOutcome, current: usize, total: usize) {
        let id = match outcome {
            EntryOutcome::Written { id, .. } | EntryOutcome::ExtractionFailed { id, .. } => id,
        };
        self.spinner.set_message(format!("[{current}/{total}] {id}"));
    }

    fn done(&self, _summary: &HarvestSummary) {
        self.spinner.finish_and_clear();
    }
}
