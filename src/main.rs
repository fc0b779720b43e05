use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};

use pkgmerge::config::{CONFIG_FILE_NAME, PkgmergeConfig};
use pkgmerge::format::OutputFormat;
use pkgmerge::input::load_package;
use pkgmerge::telemetry;
use pkgmerge_core::{
    EventSink, ObjectId, PipelineEvent, build_graph, get_dependencies, reconcile,
};

/// Three-way package reconciliation
///
/// Compares a vendor's base package, the customer's customized copy of it
/// and the vendor's new release. Every changed object is classified,
/// placed in a dependency-aware review sequence and given merge guidance.
///
/// Package files are JSON: an array of objects, or {"objects": [...]}.
///
/// QUICK START:
///
///   pkgmerge compare --base v1.json --customer ours.json --vendor v2.json
///
///   # Machine-readable report
///   pkgmerge compare ... --format json --output report.json
///
///   # Inspect references inside one package
///   pkgmerge graph --package v2.json
///
/// Settings are read from ./pkgmerge.toml when present (see --config).
#[derive(Parser)]
#[command(name = "pkgmerge")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(
    after_help = "See 'pkgmerge <command> --help' for more information on a specific command."
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file [default: ./pkgmerge.toml]
    #[arg(long, global = true, env = "PKGMERGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile base, customer and vendor packages
    ///
    /// Prints change counts, the review sequence with a merge strategy per
    /// object, broken dependency cycles and unresolved references.
    Compare {
        /// The vendor package the customer started from
        #[arg(long)]
        base: PathBuf,

        /// The customer's customized package
        #[arg(long)]
        customer: PathBuf,

        /// The vendor's new release
        #[arg(long)]
        vendor: PathBuf,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Write the report to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Print pipeline events to stderr as JSON lines
        #[arg(long)]
        events: bool,
    },

    /// Show the dependency graph of one package
    Graph {
        /// Package file
        #[arg(long)]
        package: PathBuf,

        /// Only show direct dependencies and dependents of this object
        #[arg(long)]
        uuid: Option<String>,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let config = PkgmergeConfig::load(&config_path)?;

    match cli.command {
        Commands::Compare {
            base,
            customer,
            vendor,
            format,
            output,
            events,
        } => run_compare(
            &config,
            [&base, &customer, &vendor].map(PathBuf::as_path),
            format,
            output.as_deref(),
            events,
        ),
        Commands::Graph {
            package,
            uuid,
            format,
        } => run_graph(&config, &package, uuid.as_deref(), format),
    }
}

fn run_compare(
    config: &PkgmergeConfig,
    [base, customer, vendor]: [&Path; 3],
    format: OutputFormat,
    output: Option<&Path>,
    events: bool,
) -> Result<()> {
    let base = load_package(base)?;
    let customer = load_package(customer)?;
    let vendor = load_package(vendor)?;

    let print_event = |event: &PipelineEvent| {
        if let Ok(line) = serde_json::to_string(event) {
            eprintln!("{line}");
        }
    };
    let sink: Option<&dyn EventSink> = if events { Some(&print_event) } else { None };

    let report = reconcile(&base, &customer, &vendor, &config.to_options(), sink);
    tracing::info!(
        to_review = report.summary.total(),
        cycles = report.summary.cycles_broken,
        unresolved = report.summary.unresolved_references,
        "reconciliation finished"
    );

    let rendered = format.report(&report)?;
    write_output(&rendered, output)
}

fn run_graph(
    config: &PkgmergeConfig,
    package: &Path,
    uuid: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let package = load_package(package)?;
    let graph = build_graph(&package, &config.to_options().graph);

    let rendered = match uuid {
        None => format.graph(&graph)?,
        Some(raw) => {
            let uuid = ObjectId::new(raw).with_context(|| format!("invalid uuid '{raw}'"))?;
            if !package.contains(&uuid) {
                bail!(
                    "object '{uuid}' is not in the package\n  \
                     To fix: list its objects with 'pkgmerge graph --package <file>'."
                );
            }
            let deps = get_dependencies(&uuid, &graph);
            match format {
                OutputFormat::Json => format.serialize(&deps)?,
                OutputFormat::Text => {
                    let join = |ids: &[ObjectId]| {
                        ids.iter().map(ObjectId::as_str).collect::<Vec<_>>().join(", ")
                    };
                    format!(
                        "depends on: {}\nused by: {}\n",
                        join(&deps.parents),
                        join(&deps.children)
                    )
                }
            }
        }
    };
    write_output(&rendered, None)
}

fn write_output(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("could not write report to {}", path.display()))?;
            tracing::debug!(path = %path.display(), "report written");
        }
        None => {
            print!("{rendered}");
            if !rendered.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
