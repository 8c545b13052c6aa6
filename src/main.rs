//! Cadastats - land-tenure survey dashboard
//!
//! A CLI tool that loads the JSON extracts of a cadastral survey
//! project, aggregates them and writes a Markdown or JSON report of
//! the dashboard sections.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, report export, etc.)
//!   2 - `--strict` was set and some section rendered fallback data

mod analysis;
mod cli;
mod config;
mod loader;
mod models;
mod report;
mod view;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use loader::{DataLoader, LoaderConfig, OfflineTransport, Transport};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use view::prefs::{FilePreferenceStore, PreferenceStore};
use view::sections::BuildOptions;
use view::{Dashboard, DashboardOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Cadastats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_dashboard(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Dashboard failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .cadastats.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", config::CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to set the data source, retry policy and report options.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load every requested section, apply the filters and write the report.
/// Returns the exit code (0 or 2).
async fn run_dashboard(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let mut prefs = FilePreferenceStore::new(&config.general.preferences_file);
    if let Some(size) = args.font_size {
        prefs
            .set_font_size(size)
            .context("Failed to store font size preference")?;
        info!("Font size preference set to {}px", size);
    }

    let loader = Arc::new(build_loader(&config, args.offline)?);
    let options = DashboardOptions {
        source: config.general.source.clone(),
        build: BuildOptions {
            top_n: config.report.top_n,
            include_map: config.report.include_map,
        },
    };
    let mut dashboard = Dashboard::new(loader, report::ReportRenderer::new(), options);

    println!("📥 Loading extracts from: {}", config.general.source);

    let filters = args.filter_changes();

    let mut notices = Vec::new();
    for section in args.effective_sections() {
        let spinner = loading_spinner(args.quiet, &section.to_string());
        dashboard.activate(section).await;
        spinner.finish_and_clear();

        dashboard.apply_filters(filters.iter().cloned());
        notices.extend(dashboard.take_notices());
    }

    // The same rejection is reported once per section; keep one.
    let mut seen = HashSet::new();
    notices.retain(|n: &view::Notice| seen.insert(n.message.clone()));
    for notice in &notices {
        eprintln!("{}", notice);
    }

    let views = dashboard.into_renderer().into_views();
    let degraded = views.iter().any(|v| v.degraded);

    let report = report::Report {
        metadata: report::ReportMetadata {
            source: config.general.source.clone(),
            generated_at: Utc::now(),
            degraded,
            font_size: prefs.font_size_or_default(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        sections: views,
        notices,
        include_charts: config.report.include_charts,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let output_path = std::path::PathBuf::from(&config.general.output);
    if let Err(e) = report::write_report(&output, &output_path) {
        // Export failures are reported to the user, never a panic.
        eprintln!("\n❌ Export impossible : {:#}", e);
        return Ok(1);
    }

    println!("\n📊 Sections rendered: {}", report.sections.len());
    for view in &report.sections {
        let marker = if view.degraded { "⚠️ " } else { "✅" };
        println!("   {} {}", marker, view.title);
    }
    println!(
        "\n✅ Report saved to: {} ({:.1}s)",
        output_path.display(),
        report.metadata.duration_seconds
    );

    if args.strict && degraded {
        eprintln!("\n⛔ Some sections rendered fallback data. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Build the data loader for the configured source.
fn build_loader(config: &Config, offline: bool) -> Result<DataLoader> {
    let mut loader_config = LoaderConfig::from(&config.loader);

    let transport: Arc<dyn Transport> = if offline {
        warn!("Offline mode: every section will use fallback data");
        loader_config.max_attempts = 1;
        Arc::new(OfflineTransport)
    } else {
        let timeout = Duration::from_secs(config.loader.timeout_seconds);
        Arc::from(
            loader::transport_for(&config.general.source, timeout)
                .context("Failed to create HTTP client")?,
        )
    };

    Ok(DataLoader::new(transport, loader_config))
}

fn loading_spinner(quiet: bool, label: &str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Loading {}...", label));
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
