//! CLI definition, tracing setup and the export command.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tracing::{info, warn};

use confluence_export_client::{ConfluenceClient, ContentApi, resolve_page_id};
use confluence_export_core::{
    ExportOptions, ExportOutcome, ExporterOptions, ManifestContext, build_exporters,
    build_manifest, export_pages, parse_formats, write_manifest,
};
use confluence_export_fetcher::{FetchOptions, FetchReport, discover_and_fetch};
use confluence_export_shared::{
    AppConfig, DEFAULT_CONFIG_FILE, ExportSettings, ProgressObserver, SilentProgress, save_config,
};

use crate::progress::CliProgress;
use crate::settings::{read_pages_file, require_credentials, resolve_settings};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Export Confluence pages to Markdown, HTML, plain text and PDF.
#[derive(Parser)]
#[command(
    name = "confluence-export",
    version,
    about = "Export Confluence pages to Markdown, HTML, plain text and PDF.",
    long_about = "Export Confluence pages to Markdown, HTML, plain text and PDF.\n\n\
                  Pages can be given as numeric IDs or full page URLs, read from a \
                  file, or taken from a whole space. Child pages are followed with \
                  --include-children."
)]
pub(crate) struct Cli {
    /// Confluence site URL, e.g. https://yoursite.atlassian.net.
    #[arg(long, env = "CONFLUENCE_BASE_URL", value_name = "URL", help_heading = "Authentication")]
    pub base_url: Option<String>,

    /// Atlassian account email.
    #[arg(long, env = "CONFLUENCE_EMAIL", value_name = "EMAIL", help_heading = "Authentication")]
    pub email: Option<String>,

    /// Atlassian API token. Never written to config files.
    #[arg(
        long,
        env = "CONFLUENCE_API_TOKEN",
        hide_env_values = true,
        value_name = "TOKEN",
        help_heading = "Authentication"
    )]
    pub token: Option<String>,

    /// Page IDs or URLs to export (space- or comma-separated).
    #[arg(long, num_args = 1.., value_delimiter = ',', value_name = "PAGE", help_heading = "Page selection")]
    pub pages: Vec<String>,

    /// File with page IDs or URLs, one per line; `#` starts a comment.
    #[arg(long, value_name = "FILE", help_heading = "Page selection")]
    pub pages_file: Option<PathBuf>,

    /// Export every page of a space.
    #[arg(long, value_name = "SPACE_KEY", help_heading = "Page selection")]
    pub space: Option<String>,

    /// Also export all descendants of the selected pages.
    #[arg(long, help_heading = "Page selection")]
    pub include_children: bool,

    /// Output formats: markdown/md, html, txt/text, pdf.
    #[arg(
        short = 'f',
        long = "format",
        num_args = 1..,
        value_delimiter = ',',
        value_name = "FORMAT",
        help_heading = "Export"
    )]
    pub formats: Vec<String>,

    /// Output directory [default: ./confluence-exports].
    #[arg(short, long, value_name = "DIR", help_heading = "Export")]
    pub output: Option<PathBuf>,

    /// Write all files into the output directory, ignoring the hierarchy.
    #[arg(long, help_heading = "Export")]
    pub flat: bool,

    /// Also write manifest.json and INDEX.md.
    #[arg(long, help_heading = "Export")]
    pub manifest: bool,

    /// Start Markdown files with YAML frontmatter (title, page id, space).
    #[arg(long, help_heading = "Export")]
    pub frontmatter: bool,

    /// Do not repeat the page title at the top of Markdown and text files.
    #[arg(long, help_heading = "Export")]
    pub no_title: bool,

    /// Parallel page fetches [default: 4].
    #[arg(short, long, value_name = "N", help_heading = "Advanced")]
    pub workers: Option<usize>,

    /// Skip pages that fail to fetch and continue (default).
    #[arg(long, overrides_with = "no_skip_errors", help_heading = "Advanced")]
    pub skip_errors: bool,

    /// Stop at the first fetch or discovery error.
    #[arg(long, overrides_with = "skip_errors", help_heading = "Advanced")]
    pub no_skip_errors: bool,

    /// Verbosity level (-v lists written files, -vv debug logs, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, help_heading = "Advanced")]
    pub verbose: u8,

    /// Only print errors.
    #[arg(short, long, help_heading = "Advanced")]
    pub quiet: bool,

    /// Log format for diagnostics on stderr.
    #[arg(long, value_enum, default_value = "text", help_heading = "Advanced")]
    pub log_format: LogFormat,

    /// Config file to use instead of the auto-detected one.
    #[arg(short, long, value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,

    /// Save the resolved settings (without the token) and exit.
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_CONFIG_FILE,
        help_heading = "Configuration"
    )]
    pub save_config: Option<PathBuf>,

    /// Ignore config files.
    #[arg(long, conflicts_with = "config", help_heading = "Configuration")]
    pub no_config: bool,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Default level from the resolved settings: quiet wins, then the `-v`
/// count, then a `verbose` config entry.
fn log_level(cli: &Cli, settings: &ExportSettings) -> &'static str {
    if settings.quiet {
        return "error";
    }
    match cli.verbose {
        0 if settings.verbose => "info",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize tracing from flags and resolved settings. `RUST_LOG` takes
/// precedence.
fn init_tracing(cli: &Cli, settings: &ExportSettings) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = log_level(cli, settings);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

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
// Export command
// ---------------------------------------------------------------------------

/// Run an export. Exits with failure when any page could not be fetched or
/// written.
pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    let started = Instant::now();
    let (settings, config_file) = resolve_settings(&cli)?;
    init_tracing(&cli, &settings);

    if let Some(path) = &cli.save_config {
        let saved = save_config(&AppConfig::from(&settings), Some(path))?;
        println!("Configuration saved to: {}", saved.display());
        println!("The API token is not saved. Set it with CONFLUENCE_API_TOKEN.");
        return Ok(ExitCode::SUCCESS);
    }

    let credentials = require_credentials(&settings, cli.token.as_deref())?;
    let formats = parse_formats(&settings.formats)?;
    let api: Arc<dyn ContentApi> = Arc::new(ConfluenceClient::new(
        &credentials.base_url,
        &credentials.email,
        &credentials.token,
    )?);

    let page_ids = collect_page_ids(&settings, api.as_ref()).await?;
    let format_names: Vec<String> = formats.iter().map(|f| f.name().to_string()).collect();

    if !settings.quiet {
        print_header(&credentials.base_url, &settings, page_ids.len(), &format_names, config_file.as_ref());
    }

    let cli_progress = (!settings.quiet).then(|| Arc::new(CliProgress::new(settings.verbose)));
    let observer: Arc<dyn ProgressObserver> = match &cli_progress {
        Some(progress) => Arc::clone(progress) as Arc<dyn ProgressObserver>,
        None => Arc::new(SilentProgress),
    };

    let options = FetchOptions {
        include_children: settings.include_children,
        include_body: true,
        skip_errors: settings.skip_errors,
        workers: settings.workers,
    };
    info!(pages = page_ids.len(), include_children = options.include_children, "fetching pages");
    let report = match discover_and_fetch(Arc::clone(&api), &page_ids, options, Arc::clone(&observer)).await {
        Ok(report) => report,
        Err(e) => {
            if let Some(progress) = &cli_progress {
                progress.finish();
            }
            return Err(eyre!("failed to fetch pages: {e}"));
        }
    };

    if report.pages.is_empty() {
        if let Some(progress) = &cli_progress {
            progress.finish();
        }
        print_fetch_failures(&report);
        return Err(eyre!("no pages found to export"));
    }

    let exporters = build_exporters(
        &formats,
        ExporterOptions {
            include_title: !cli.no_title,
            include_metadata: cli.frontmatter,
            ..ExporterOptions::default()
        },
        Some(Arc::clone(&api)),
    )?;
    let export_options = ExportOptions {
        output_dir: settings.output.clone(),
        flat: settings.flat,
    };
    let outcome = export_pages(&report.pages, &exporters, &export_options, observer.as_ref()).await;

    if let Some(progress) = &cli_progress {
        progress.finish();
    }
    let outcome = outcome?;

    if settings.manifest {
        let context = ManifestContext {
            base_url: credentials.base_url.clone(),
            output_dir: settings.output.clone(),
            formats: format_names,
            include_children: settings.include_children,
            flat: settings.flat,
            duration: started.elapsed(),
        };
        let manifest = build_manifest(&context, &report.pages, &outcome);
        let paths = write_manifest(&manifest, &settings.output)?;
        if !settings.quiet {
            println!("Manifest files created:");
            println!("  - {}", paths.index.display());
            println!("  - {}", paths.json.display());
        }
    }

    if !settings.quiet {
        print_summary(&report, &outcome, settings.verbose);
    } else {
        print_fetch_failures(&report);
        print_export_failures(&outcome);
    }

    if outcome.is_success() && report.failures.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(
            fetch_failures = report.failures.len(),
            export_failures = outcome.failures.len(),
            "export finished with failures"
        );
        Ok(ExitCode::FAILURE)
    }
}

/// Page IDs from `--pages`, `--pages-file` and `--space`, in that order.
async fn collect_page_ids(settings: &ExportSettings, api: &dyn ContentApi) -> Result<Vec<String>> {
    if settings.pages.is_empty() && settings.pages_file.is_none() && settings.space.is_none() {
        return Err(eyre!("you must specify --pages, --pages-file or --space"));
    }

    let mut inputs = settings.pages.clone();
    if let Some(file) = &settings.pages_file {
        let from_file = read_pages_file(file)?;
        if !settings.quiet {
            println!("Loaded {} page(s) from {}", from_file.len(), file.display());
        }
        inputs.extend(from_file);
    }

    let mut ids: Vec<String> = inputs
        .iter()
        .map(|input| resolve_page_id(input))
        .filter(|id| !id.is_empty())
        .collect();

    if let Some(space) = &settings.space {
        let space_pages = api
            .list_space_pages(space)
            .await
            .map_err(|e| eyre!("failed to fetch pages from space '{space}': {e}"))?;
        if !settings.quiet {
            println!("Found {} page(s) in space '{space}'", space_pages.len());
        }
        ids.extend(space_pages.into_iter().map(|page| page.id));
    }

    if ids.is_empty() {
        return Err(eyre!("no valid page IDs found"));
    }
    Ok(ids)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

fn print_header(
    base_url: &str,
    settings: &ExportSettings,
    page_count: usize,
    formats: &[String],
    config_file: Option<&PathBuf>,
) {
    println!();
    println!("  Confluence Export v{}", env!("CARGO_PKG_VERSION"));
    println!("  Base URL:  {base_url}");
    if let Some(space) = &settings.space {
        println!("  Space:     {space}");
    }
    println!("  Pages:     {page_count}");
    println!("  Formats:   {}", formats.join(", "));
    println!("  Children:  {}", yes_no(settings.include_children));
    println!("  Output:    {}", settings.output.display());
    println!(
        "  Structure: {}",
        if settings.flat { "Flat" } else { "Hierarchical" }
    );
    println!("  Workers:   {}", settings.workers);
    println!("  Manifest:  {}", yes_no(settings.manifest));
    if let Some(path) = config_file {
        println!("  Config:    {}", path.display());
    }
    println!();
}

fn print_summary(report: &FetchReport, outcome: &ExportOutcome, verbose: bool) {
    println!();
    println!("  Export summary");
    println!("  Pages:     {}", report.pages.len());
    println!("  Exported:  {}", outcome.files.len());
    if !outcome.failures.is_empty() {
        println!("  Failed:    {}", outcome.failures.len());
    }
    if !report.failures.is_empty() {
        println!("  Skipped:   {}", report.failures.len());
    }

    if verbose && !outcome.files.is_empty() {
        println!();
        println!("  Exported files:");
        for file in &outcome.files {
            println!("    - {}", file.path.display());
        }
    }
    println!();

    print_fetch_failures(report);
    print_export_failures(outcome);
}

fn print_fetch_failures(report: &FetchReport) {
    if report.failures.is_empty() {
        return;
    }
    eprintln!("Skipped pages:");
    for failure in &report.failures {
        eprintln!("  - {} ({}): {}", failure.label(), failure.id, failure.message);
    }
}

fn print_export_failures(outcome: &ExportOutcome) {
    if outcome.failures.is_empty() {
        return;
    }
    eprintln!("Failed exports:");
    for failure in &outcome.failures {
        eprintln!("  - {} ({}): {}", failure.title, failure.format, failure.error);
    }
}
