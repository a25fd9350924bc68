//! scholar-citations - Google Scholar citation tracker
//!
//! ## Usage
//!
//! ```bash
//! scholar-citations run --profile "https://scholar.google.com/citations?user=NvBZp6MAAAAJ"
//! scholar-citations run --config tracker.json --sheets-id <spreadsheet id>
//! scholar-citations cookies import cookies.json
//! scholar-citations cookies --config tracker.json path
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use scholar_citations::config::{Config, SheetsConfig};
use scholar_citations::cookies::CookieJar;
use scholar_citations::history::DuplicateDatePolicy;
use scholar_citations::pipeline::{self, ChannelStatus, RunSummary};
use scholar_citations::scholar::ScholarClient;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Google Scholar citation tracker
#[derive(Parser)]
#[command(name = "scholar-citations")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch current citations and update the workbook
    Run {
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Profile URL or Scholar user id
        #[arg(long)]
        profile: Option<String>,

        /// Directory for the workbook
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Observation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Proxy URL (e.g., http://127.0.0.1:7890)
        #[arg(long)]
        proxy: Option<String>,

        /// Mirror site URL
        #[arg(long)]
        mirror: Option<String>,

        /// Minimum pause between profile pages, in seconds
        #[arg(long)]
        delay_min: Option<f64>,

        /// Maximum pause between profile pages, in seconds
        #[arg(long)]
        delay_max: Option<f64>,

        /// Replace metrics rows already recorded for the run date
        #[arg(long)]
        replace_same_day: bool,

        /// Google spreadsheet to mirror the workbook into
        #[arg(long)]
        sheets_id: Option<String>,

        /// OAuth access token for Google Sheets
        #[arg(long, env = "SCHOLAR_SHEETS_TOKEN", hide_env_values = true)]
        sheets_token: Option<String>,

        /// SMTP password for the summary email
        #[arg(long, env = "SCHOLAR_SMTP_PASSWORD", hide_env_values = true)]
        smtp_password: Option<String>,
    },

    /// Manage cookies
    Cookies {
        /// JSON config file whose `cookie_file` selects the jar
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cookie file to manage, overrides the config
        #[arg(long)]
        cookie_file: Option<PathBuf>,

        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Subcommand)]
enum CookieAction {
    /// Clear stored cookies
    Clear,
    /// Show cookie file path
    Path,
    /// Store cookies from a browser JSON export
    Import {
        /// Exported cookie file
        file: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Run {
            config,
            profile,
            output,
            date,
            proxy,
            mirror,
            delay_min,
            delay_max,
            replace_same_day,
            sheets_id,
            sheets_token,
            smtp_password,
        } => {
            let mut config = match config {
                Some(path) => Config::from_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => Config::default(),
            };

            if let Some(profile) = profile {
                config.profile = profile;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            if date.is_some() {
                config.run_date = date;
            }
            if proxy.is_some() {
                config.proxy = proxy;
            }
            if mirror.is_some() {
                config.scholar_base_url = mirror;
            }
            if let Some(secs) = delay_min {
                config.delay_min_secs = secs;
            }
            if let Some(secs) = delay_max {
                config.delay_max_secs = secs;
            }
            if replace_same_day {
                config.duplicate_dates = DuplicateDatePolicy::Replace;
            }
            if let Some(id) = sheets_id {
                config.sheets.get_or_insert_with(SheetsConfig::default).spreadsheet_id = id;
            }
            if let (Some(token), Some(sheets)) = (sheets_token, config.sheets.as_mut()) {
                sheets.access_token = token;
            }
            if let (Some(password), Some(email)) = (smtp_password, config.email.as_mut()) {
                email.password = password;
            }

            run_tracker(config).await
        }
        Commands::Cookies {
            config,
            cookie_file,
            action,
        } => {
            let configured = match config {
                Some(path) => Config::from_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?
                    .cookie_file,
                None => None,
            };
            let jar = CookieJar::resolve(cookie_file.or(configured).as_deref());
            handle_cookies(&jar, action)
        }
    }
}

// ============================================================================
// Tracking Run
// ============================================================================

async fn run_tracker(config: Config) -> Result<()> {
    println!("Google Scholar Citation Tracker");
    println!("-------------------------------");
    println!("Using profile: {}", config.profile);

    let jar = CookieJar::resolve(config.cookie_file.as_deref());
    let client = ScholarClient::new(config.fetch_options(jar.header_value()))?;

    match pipeline::run(&config, &client).await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Run aborted");
            Err(e).context("Citation tracking run failed")
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\nAuthor: {}", summary.author_name);
    println!("Date: {}", summary.date);
    println!("Fetched {} publications", summary.fetched_count);
    if !summary.skipped.is_empty() {
        println!("Skipped {} rows:", summary.skipped.len());
        for reason in &summary.skipped {
            println!("  - {}", reason);
        }
    }

    println!("\nTotal papers: {}", summary.snapshot.paper_count);
    println!("\nMetrics for current crawl:");
    println!("Total Citations: {}", summary.snapshot.total_citations);
    println!("h-index: {}", summary.snapshot.h_index);
    println!("i10-index: {}", summary.snapshot.i10_index);

    println!("\nSaved: {}", summary.output_path.display());
    print_channel("Google Sheets sync", &summary.sheets_sync);
    print_channel("Summary email", &summary.email);
    info!(runs = summary.history_len, "Run complete");
}

fn print_channel(label: &str, status: &ChannelStatus) {
    match status {
        ChannelStatus::Disabled => {}
        ChannelStatus::Done => println!("{}: done", label),
        ChannelStatus::Failed(reason) => println!("{}: failed ({})", label, reason),
    }
}

// ============================================================================
// Cookie Management
// ============================================================================

fn handle_cookies(jar: &CookieJar, action: CookieAction) -> Result<()> {
    match action {
        CookieAction::Clear => {
            if jar.clear()? {
                println!("Cookies cleared.");
            } else {
                println!("No cookies stored at {:?}", jar.path());
            }
        }
        CookieAction::Path => {
            println!("Cookie file: {:?}", jar.path());
        }
        CookieAction::Import { file } => {
            let count = jar
                .import(&file)
                .with_context(|| format!("Failed to import cookies from {}", file.display()))?;
            println!("Successfully saved {} cookies to {:?}", count, jar.path());
        }
    }

    Ok(())
}
