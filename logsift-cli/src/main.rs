use anyhow::{bail, Context, Result};
use clap::Parser;
use logsift_core::geo::{geo_join, GeoEnricher};
use logsift_core::input::STDIN_FORMAT;
use logsift_core::output::verdicts_to_json;
use logsift_core::{
    export_events, read_log_file, save_report, AnalysisRun, Analyzer, Config, EnsembleConfidence,
    OutputFormat, RunOutcome, SourceLines, Table,
};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "logsift",
    about = "Surface bursts and irregular activity in forensic logs",
    version
)]
struct Cli {
    /// Log files to analyze (.txt, .vlog, ...); reads stdin when omitted
    files: Vec<PathBuf>,

    /// Bucket width in seconds
    #[arg(short, long)]
    width: Option<i64>,

    /// Config file (defaults to ./.logsift.toml or the user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Export parsed events in this format (json, csv, txt)
    #[arg(short, long)]
    export: Option<String>,

    /// Write the export to this file; the format falls back to export.format
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write per-bucket verdicts as JSON to this file
    #[arg(long)]
    verdicts: Option<PathBuf>,

    /// Resolve source IPs to locations
    #[arg(long)]
    geo: bool,

    /// Print every bucket, not only the outliers
    #[arg(long)]
    all_buckets: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    info!("Starting LogSift CLI");

    let config = load_config(&cli)?;
    let sources = read_sources(&cli.files)?;
    let analyzer = Analyzer::from_config(&config).context("Invalid analysis settings")?;

    let run = match analyzer.run_sources(&sources)? {
        RunOutcome::Completed(run) => run,
        RunOutcome::NoValidEntries { lines_seen } => {
            eprintln!(
                "No valid log entries parsed from {} lines. Please check your log file format.",
                lines_seen
            );
            std::process::exit(2);
        }
    };

    print_report(&run, config.analysis.bucket_width_secs, cli.all_buckets);

    if cli.geo || config.geo.enabled {
        print_geo(&run, &config).await?;
    }

    if let Some(path) = &cli.verdicts {
        save_report(&verdicts_to_json(&run.report)?, path)
            .with_context(|| format!("Failed to write verdicts to {}", path.display()))?;
        info!("Wrote verdicts to {}", path.display());
    }

    if let Some(format) = export_format(&cli, &config)? {
        let content = export_events(&run.store, format)?;
        match &cli.output {
            Some(path) => {
                save_report(&content, path)
                    .with_context(|| format!("Failed to write export to {}", path.display()))?;
                println!("Exported {} entries to {}", run.store.len(), path.display());
            }
            None => print!("{}", content),
        }
    }

    Ok(())
}

/// `--export` wins; `--output` alone uses the configured format.
fn export_format(cli: &Cli, config: &Config) -> Result<Option<OutputFormat>> {
    match (cli.export.as_deref(), &cli.output) {
        (Some(name), _) => OutputFormat::from_str(name)
            .map(Some)
            .with_context(|| format!("Unknown export format '{}'", name)),
        (None, Some(_)) => Ok(Some(config.export.output_format()?)),
        (None, None) => Ok(None),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load()?,
    };
    if let Some(width) = cli.width {
        config.analysis.bucket_width_secs = width;
    }
    config.validate()?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn read_sources(files: &[PathBuf]) -> Result<Vec<SourceLines>> {
    if files.is_empty() {
        info!("Reading log data from stdin");
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read from stdin")?;
        if input.is_empty() {
            bail!("No log data provided. Pass log files or pipe data to stdin.");
        }
        return Ok(vec![SourceLines::from_text(STDIN_FORMAT, &input)]);
    }

    files
        .iter()
        .map(|path| {
            read_log_file(path).with_context(|| format!("Failed to read {}", path.display()))
        })
        .collect()
}

fn print_report(run: &AnalysisRun, width_secs: i64, all_buckets: bool) {
    let summary = run.summary();
    println!("Parsed {} log entries successfully.", summary.total_entries);
    println!();
    println!("== Summary");
    println!("Total Entries:  {}", summary.total_entries);
    println!("Distinct Users: {}", summary.distinct_users);
    println!("Event Types:    {}", summary.event_types);
    println!("Unique IPs:     {}", summary.unique_ips);
    println!();

    if all_buckets {
        println!("== Events per {}s window", width_secs);
        print!("{}", run.timeline_table().render());
        println!();
    }

    println!(
        "== Z-score outliers (mean {:.2}, std {:.2})",
        run.report.mean, run.report.std_dev
    );
    print_table_or_none(&run.z_outlier_table());

    println!("== Isolation forest outliers");
    if run.report.ensemble_confidence == EnsembleConfidence::Low {
        println!(
            "(low confidence: only {} buckets to train on)",
            run.buckets.len()
        );
    }
    print_table_or_none(&run.ensemble_outlier_table());
}

fn print_table_or_none(table: &Table) {
    if table.is_empty() {
        println!("none");
    } else {
        print!("{}", table.render());
    }
    println!();
}

async fn print_geo(run: &AnalysisRun, config: &Config) -> Result<()> {
    let enricher = GeoEnricher::from_settings(&config.geo)?;
    let locations = enricher.resolve_store(&run.store).await;
    let joined = geo_join(&run.store, &locations);

    println!("== IP geolocation");
    if joined.is_empty() {
        println!("No IP geolocation data could be retrieved.");
        println!();
        return Ok(());
    }

    let mut table = Table::new(&["ip", "latitude", "longitude", "city", "country", "event", "user"]);
    for tagged in joined {
        let location = tagged.location;
        table.push_row(vec![
            tagged.event.ip.unwrap_or_default(),
            location.latitude.map_or_else(String::new, |v| format!("{:.4}", v)),
            location.longitude.map_or_else(String::new, |v| format!("{:.4}", v)),
            location.city.unwrap_or_else(|| "None".to_string()),
            location.country.unwrap_or_else(|| "None".to_string()),
            tagged.event.event.unwrap_or_else(|| "None".to_string()),
            tagged.event.user.unwrap_or_else(|| "None".to_string()),
        ]);
    }
    print!("{}", table.render());
    println!();
    Ok(())
}
