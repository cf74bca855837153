//! CLI entry point for the grade normalizer.
//!
//! Reads an already-fetched provider payload from disk, normalizes it, and
//! writes the bundle as JSON and optionally CSV.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grade_normalizer::{
    ids::{IdGenerator, SequentialIds, UuidIds},
    mapping::MappingTable,
    normalize,
    output::{append_records, to_json},
    providers::{Provider, ProviderKind, TableProvider},
};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "grade-normalizer")]
#[command(about = "Normalize school information system grade payloads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a raw provider payload (JSON file)
    Normalize {
        /// Path to the payload JSON
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,

        /// Built-in provider that produced the payload
        #[arg(short, long, value_enum, default_value_t = ProviderKind::Scodoc)]
        provider: ProviderKind,

        /// Custom mapping table (JSON); overrides --provider
        #[arg(short, long, env = "GRADE_MAPPING_FILE")]
        mapping: Option<PathBuf>,

        /// Write the normalized JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// CSV file to append grade records to
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Use counters instead of random UUIDs for ids
        #[arg(long, default_value_t = false)]
        sequential_ids: bool,

        /// Emit single-line JSON
        #[arg(long, default_value_t = false)]
        compact: bool,
    },
    /// List built-in providers and their aggregation policies
    Providers,
    /// Validate a custom mapping table
    CheckMapping {
        #[arg(value_name = "MAPPING")]
        mapping: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/grade_normalizer.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("grade_normalizer.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", "info")?);

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", "debug")?);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize {
            payload,
            provider,
            mapping,
            output,
            csv,
            sequential_ids,
            compact,
        } => {
            let provider = match mapping {
                Some(path) => TableProvider::new(MappingTable::load(&path)?)?,
                None => provider.provider(),
            };
            run_normalize(
                &provider,
                &payload,
                output.as_deref(),
                csv.as_deref(),
                sequential_ids,
                compact,
            )?;
        }
        Commands::Providers => {
            for kind in ProviderKind::all() {
                let table = kind.table();
                println!(
                    "{} (out of {}, bonus counted: {}, optional counted: {})",
                    table.name,
                    table.default_out_of,
                    table.policy.include_bonus,
                    table.policy.include_optional
                );
            }
        }
        Commands::CheckMapping { mapping } => {
            let table = MappingTable::load(&mapping)?;
            info!(provider = %table.name, groups = table.groups.len(), "Mapping table is valid");
            println!("{}: ok", table.name);
        }
    }

    Ok(())
}

fn env_filter(var: &str, default_directive: &str) -> Result<EnvFilter> {
    Ok(EnvFilter::from_env(var).add_directive(default_directive.parse()?))
}

#[tracing::instrument(skip(provider), fields(provider = provider.name(), payload = %payload_path.display()))]
fn run_normalize(
    provider: &dyn Provider,
    payload_path: &Path,
    output: Option<&Path>,
    csv: Option<&Path>,
    sequential_ids: bool,
    compact: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(payload_path)
        .with_context(|| format!("failed to read payload {}", payload_path.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("payload {} is not valid JSON", payload_path.display()))?;

    let mut ids: Box<dyn IdGenerator> = if sequential_ids {
        Box::new(SequentialIds::default())
    } else {
        Box::new(UuidIds)
    };

    let grades = normalize(provider, &payload, ids.as_mut())?;

    let disabled = grades
        .records
        .iter()
        .filter(|r| r.student_value.is_disabled())
        .count();
    if disabled > 0 {
        warn!(disabled, "Some records have no readable mark");
    }
    info!(
        records = grades.records.len(),
        subjects = grades.averages.subjects.len(),
        "Normalization complete"
    );

    let json = to_json(&grades, compact)?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }

    if let Some(path) = csv {
        append_records(path, &grades.records)?;
    }

    Ok(())
}
