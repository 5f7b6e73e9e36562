//! talentpool CLI - funnel and talent pool reports over candidate activity exports

// Global invariants enforced:
// - Tables go to stdout; progress, notices and logs go to stderr
// - An empty filter result is a warning, not a failure

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use clap::{ArgAction, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use talentpool_core::config::{self, ResolvedConfig};
use talentpool_core::report::{render_breakdown_text, render_dashboard_text, render_funnel_text};
use talentpool_core::{
    breakdown, events, export, filter, funnel_report, render_json, DashboardReport,
    DashboardSettings, EventTable, FilterChoices, FilterOptions, FilteredEvents, WindowAnchor,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "talentpool")]
#[command(about = "Recruiting funnel and talent pool reports over candidate activity exports")]
#[command(version = env!("TALENTPOOL_VERSION"))]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Folder movement summary: counts, share and average days per transition
    Funnel {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Talent pool breakdown by age band, day, CEFR and rejection reason
    Breakdown {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        breakdown: BreakdownArgs,
    },
    /// Funnel summary and breakdown from a single load
    Report {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        breakdown: BreakdownArgs,
    },
    /// List the date range, sites and campaign titles available for filtering
    Options {
        /// Candidate activity export (CSV)
        csv: PathBuf,

        /// Only offer campaign titles for these sites (repeatable)
        #[arg(long = "site")]
        sites: Vec<String>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate or show the configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without running a report
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Candidate activity export (CSV)
    csv: PathBuf,

    /// First invitation date included, YYYY-MM-DD (default: lookback from the latest invitation)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last invitation date included, YYYY-MM-DD (default: latest invitation)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Restrict to a campaign site (repeatable; default: all sites)
    #[arg(long = "site")]
    sites: Vec<String>,

    /// Restrict to a campaign title (repeatable; default: all titles)
    #[arg(long = "title")]
    titles: Vec<String>,

    /// Output format
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// Path to config file (default: auto-discover)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct BreakdownArgs {
    /// Time ages are measured from (default: now, local time)
    #[arg(long, value_parser = parse_as_of)]
    as_of: Option<NaiveDateTime>,

    /// Write the filtered rows with Row_label and Column_label to this CSV file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Day that closes the daily window (overrides config file)
    #[arg(long)]
    window_anchor: Option<AnchorArg>,

    /// Number of days in the daily window (overrides config file)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=31))]
    window_days: Option<u32>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum AnchorArg {
    /// Window ends yesterday
    Today,
    /// Window ends on the filter's end date
    EndDate,
}

impl From<AnchorArg> for WindowAnchor {
    fn from(arg: AnchorArg) -> Self {
        match arg {
            AnchorArg::Today => WindowAnchor::Today,
            AnchorArg::EndDate => WindowAnchor::EndDate,
        }
    }
}

fn parse_as_of(value: &str) -> Result<NaiveDateTime, String> {
    events::parse_timestamp(value)
        .ok_or_else(|| format!("not a date or date-time: {value:?} (try 2024-06-10T12:00:00)"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Funnel { input } => {
            let resolved = load_config(input.config.as_deref())?;
            let table = EventTable::load(&input.csv)?;
            let options = filter_options(&table, &input, &resolved)?;
            let Some(filtered) = apply_filters(&table, &options)? else {
                return Ok(());
            };

            let report = with_spinner("Calculating metrics...", || {
                funnel_report(&filtered, &resolved.settings)
            });
            match input.format {
                OutputFormat::Text => print!("{}", render_funnel_text(&report)),
                OutputFormat::Json => println!("{}", render_json(&report)),
            }
        }
        Commands::Breakdown { input, breakdown: args } => {
            let resolved = load_config(input.config.as_deref())?;
            let settings = breakdown_settings(&resolved, &args);
            let table = EventTable::load(&input.csv)?;
            let options = filter_options(&table, &input, &resolved)?;
            let Some(filtered) = apply_filters(&table, &options)? else {
                return Ok(());
            };

            let now = as_of(&args);
            let result = with_spinner("Classifying candidates...", || {
                breakdown(&filtered, &settings, now)
            });
            if let Some(path) = &args.export {
                write_export(path, &filtered, &result)?;
            }
            match input.format {
                OutputFormat::Text => print!("{}", render_breakdown_text(&result.report)),
                OutputFormat::Json => println!("{}", render_json(&result.report)),
            }
        }
        Commands::Report { input, breakdown: args } => {
            let resolved = load_config(input.config.as_deref())?;
            let settings = breakdown_settings(&resolved, &args);
            let table = EventTable::load(&input.csv)?;
            let options = filter_options(&table, &input, &resolved)?;
            let Some(filtered) = apply_filters(&table, &options)? else {
                return Ok(());
            };

            let now = as_of(&args);
            let (funnel, result) = with_spinner("Calculating metrics...", || {
                (
                    funnel_report(&filtered, &settings),
                    breakdown(&filtered, &settings, now),
                )
            });
            if let Some(path) = &args.export {
                write_export(path, &filtered, &result)?;
            }
            let report = DashboardReport {
                filters: options,
                funnel,
                breakdown: result.report,
            };
            match input.format {
                OutputFormat::Text => print!("{}", render_dashboard_text(&report)),
                OutputFormat::Json => println!("{}", render_json(&report)),
            }
        }
        Commands::Options {
            csv,
            sites,
            format,
            config: config_path,
        } => {
            let resolved = load_config(config_path.as_deref())?;
            let table = EventTable::load(&csv)?;
            let selected: BTreeSet<String> = sites.into_iter().collect();
            let choices = FilterChoices::of(&table, &selected, resolved.lookback_days)?;
            match format {
                OutputFormat::Text => print_choices(&choices, resolved.lookback_days),
                OutputFormat::Json => println!("{}", render_json(&choices)),
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let dir = std::env::current_dir()?;
                match config::load_and_resolve(&dir, path.as_deref()) {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let dir = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&dir, path.as_deref())
                    .context("failed to load configuration")?;
                print_config(&resolved);
            }
        },
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let dir = std::env::current_dir()?;
    let resolved =
        config::load_and_resolve(&dir, path).context("failed to load configuration")?;
    if let Some(config_path) = &resolved.config_path {
        eprintln!("Using config: {}", config_path.display());
    }
    Ok(resolved)
}

/// CLI flags override config file values
fn breakdown_settings(resolved: &ResolvedConfig, args: &BreakdownArgs) -> DashboardSettings {
    let mut settings = resolved.settings.clone();
    if let Some(anchor) = args.window_anchor {
        settings.window_anchor = anchor.into();
    }
    if let Some(days) = args.window_days {
        settings.window_days = days;
    }
    settings
}

fn as_of(args: &BreakdownArgs) -> NaiveDateTime {
    args.as_of
        .unwrap_or_else(|| chrono::Local::now().naive_local())
}

fn filter_options(
    table: &EventTable,
    input: &InputArgs,
    resolved: &ResolvedConfig,
) -> anyhow::Result<FilterOptions> {
    let selected: BTreeSet<String> = input.sites.iter().cloned().collect();
    let choices = FilterChoices::of(table, &selected, resolved.lookback_days)?;
    let mut options = choices
        .default_filter()
        .with_sites(&input.sites)
        .with_titles(&input.titles);
    if let Some(start) = input.start {
        options.start = start;
    }
    if let Some(end) = input.end {
        options.end = end;
    }
    options.validate()?;
    Ok(options)
}

/// `None` when the filters leave no rows; that case is reported, not failed
fn apply_filters<'a>(
    table: &'a EventTable,
    options: &FilterOptions,
) -> anyhow::Result<Option<FilteredEvents<'a>>> {
    match filter::apply(table, options) {
        Ok(filtered) => Ok(Some(filtered)),
        Err(e) if e.is_informational() => {
            tracing::debug!(start = %options.start, end = %options.end, "filters left no rows");
            eprintln!("Warning: {}", e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn write_export(
    path: &Path,
    filtered: &FilteredEvents<'_>,
    result: &talentpool_core::Breakdown<'_>,
) -> anyhow::Result<()> {
    let rows = export::export_labeled_csv(path, filtered, &result.classified)
        .with_context(|| format!("failed to write labeled export: {}", path.display()))?;
    eprintln!("Labeled export written to: {} ({} rows)", path.display(), rows);
    Ok(())
}

fn with_spinner<T>(message: &'static str, work: impl FnOnce() -> T) -> T {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    let out = work();
    spinner.finish_and_clear();
    out
}

fn print_choices(choices: &FilterChoices, lookback_days: u32) {
    println!(
        "Invitation dates: {} to {}",
        choices.bounds.min, choices.bounds.max
    );
    println!(
        "Default range:    {} to {} (last {} days)",
        choices.default_start, choices.default_end, lookback_days
    );
    println!();
    println!("Sites:");
    for site in &choices.sites {
        println!("  {}", site);
    }
    println!();
    println!("Campaign titles:");
    for title in &choices.titles {
        println!("  {}", title);
    }
}

fn print_config(resolved: &ResolvedConfig) {
    let settings = &resolved.settings;
    println!("Configuration:");
    if let Some(ref p) = resolved.config_path {
        println!("  Source: {}", p.display());
    } else {
        println!("  Source: defaults (no config file found)");
    }
    println!();
    println!("Filters:");
    println!("  lookback_days: {}", resolved.lookback_days);
    println!();
    println!("Funnel:");
    println!("  unengaged_after_days: {}", resolved.unengaged_after_days);
    println!("  system folders: {}", settings.catalog.len());
    println!("  metrics:");
    for metric in &settings.metrics {
        println!("    {} ({} -> {})", metric.title, metric.from, metric.to);
    }
    println!();
    println!("Breakdown:");
    println!("  databank_folder: {}", resolved.databank_folder);
    println!("  talent_pool_folder: {}", resolved.talent_pool_folder);
    println!(
        "  cefr categories: {}",
        settings.cefr_levels.categories().join(", ")
    );
    println!(
        "  daily_window: {} days, anchor {}",
        settings.window_days,
        match settings.window_anchor {
            WindowAnchor::Today => "today",
            WindowAnchor::EndDate => "end-date",
        }
    );
}
