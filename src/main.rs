//! Sitemap-Sweep main entry point
//!
//! This is the command-line interface for the Sitemap-Sweep crawler.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use sitemap_sweep::config::{
    load_config_with_hash, validate, Config, DispatchOrder, OutputMode, PresenterKind,
    RequestType, TargetType, USER_AGENT_HEADER,
};
use sitemap_sweep::crawler::run_crawl;
use sitemap_sweep::output::{format_summary, write_broken_urls};
use tracing_subscriber::EnvFilter;

/// Sitemap-Sweep: a bounded-concurrency sitemap crawler
///
/// Sitemap-Sweep reads an XML sitemap, a sitemap index or a plain URL list,
/// requests every URL with a fixed number of concurrent connections and
/// reports status codes, redirects and broken URLs.
#[derive(Parser, Debug)]
#[command(name = "sitemap-sweep")]
#[command(version)]
#[command(about = "Crawl every URL of a sitemap with bounded concurrency", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Request every URL listed in a sitemap, sitemap index or text file
    ///
    /// Example: sitemap-sweep run https://example.com/sitemap.xml -c 10
    Run(RunArgs),
}

/// Flags of the `run` subcommand; each one overrides the configuration file
#[derive(Args, Debug)]
struct RunArgs {
    /// Sitemap path or URL (`http(s)://`, `file://` or a local path)
    #[arg(value_name = "SITEMAP")]
    sitemap: String,

    /// Path to TOML configuration file
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Number of simultaneous requests
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// HTTP method used for every URL
    #[arg(short = 'r', long, value_enum, ignore_case = true)]
    request_type: Option<RequestType>,

    /// Follow 301/302/303/307/308 responses
    #[arg(long, value_name = "BOOL")]
    follow_redirects: Option<bool>,

    /// Stop following a redirect chain after this many hops
    #[arg(long)]
    max_redirect_hops: Option<u32>,

    /// Per-request timeout in seconds (at least 0.5)
    #[arg(short, long)]
    timeout: Option<f64>,

    /// User-Agent request header
    #[arg(short, long)]
    user_agent: Option<String>,

    /// Extra request header, `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Response headers whose values are tallied, comma separated
    #[arg(long, value_delimiter = ',')]
    count_response_headers: Vec<String>,

    /// Percentage of successful URLs that are requested again (0-99)
    #[arg(long)]
    bonus_respawn: Option<u8>,

    /// Order in which queued URLs are dispatched
    #[arg(long, value_enum)]
    dispatch_order: Option<DispatchOrder>,

    /// Minimum pause after each dispatch, in microseconds
    #[arg(long)]
    spawn_delay_min: Option<u64>,

    /// Maximum pause after each dispatch, in microseconds
    #[arg(long)]
    spawn_delay_max: Option<u64>,

    /// Format of the target
    #[arg(long, value_enum)]
    target_type: Option<TargetType>,

    /// Count responses or also save their bodies
    #[arg(short = 'o', long, value_enum)]
    output_mode: Option<OutputMode>,

    /// Do not write broken.txt
    #[arg(long)]
    no_broken: bool,

    /// Base directory for run output
    #[arg(short = 'd', long)]
    output_destination: Option<String>,

    /// Statistics refresh interval in seconds
    #[arg(long)]
    timer_ui: Option<f64>,

    /// How live statistics are displayed
    #[arg(long, value_enum)]
    presenter: Option<PresenterKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Run(args) => handle_run(args).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitemap_sweep=info,warn"),
            1 => EnvFilter::new("sitemap_sweep=debug,info"),
            2 => EnvFilter::new("sitemap_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the `run` subcommand
async fn handle_run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    apply_overrides(&mut config, args)?;
    validate(&config).context("invalid configuration")?;

    let write_broken = config.output.broken;
    let report = run_crawl(config).await?;

    println!("{}", format_summary(&report));

    if write_broken {
        if let Some(dir) = &report.output_dir {
            if let Some(path) = write_broken_urls(&report.results, dir)? {
                println!("Broken URLs written to {}", path.display());
            }
        }
    }

    Ok(())
}

/// Applies command line flags on top of the loaded configuration
fn apply_overrides(config: &mut Config, args: RunArgs) -> Result<()> {
    config.target.file = args.sitemap;

    if let Some(target_type) = args.target_type {
        config.target.target_type = target_type;
    }
    if let Some(concurrency) = args.concurrency {
        config.request.concurrency = concurrency;
    }
    if let Some(request_type) = args.request_type {
        config.request.request_type = request_type;
    }
    if let Some(follow) = args.follow_redirects {
        config.request.follow_redirects = follow;
    }
    if args.max_redirect_hops.is_some() {
        config.request.max_redirect_hops = args.max_redirect_hops;
    }
    if let Some(timeout) = args.timeout {
        config.request.timeout = timeout;
    }
    if let Some(user_agent) = args.user_agent {
        config
            .request
            .headers
            .insert(USER_AGENT_HEADER.to_string(), user_agent);
    }
    for header in args.headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("invalid header '{}', expected 'Name: value'", header);
        };
        config
            .request
            .headers
            .insert(name.trim().to_string(), value.trim().to_string());
    }
    if !args.count_response_headers.is_empty() {
        config.request.count_response_headers = args
            .count_response_headers
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
    }
    if let Some(percent) = args.bonus_respawn {
        config.request.bonus_respawn = percent;
    }
    if let Some(order) = args.dispatch_order {
        config.request.dispatch_order = order;
    }
    if let Some(min) = args.spawn_delay_min {
        config.request.spawn_delay_min = min;
    }
    if let Some(max) = args.spawn_delay_max {
        config.request.spawn_delay_max = max;
    }
    if let Some(mode) = args.output_mode {
        config.output.mode = mode;
    }
    if args.no_broken {
        config.output.broken = false;
    }
    if let Some(destination) = args.output_destination {
        config.output.destination = destination;
    }
    if let Some(timer_ui) = args.timer_ui {
        config.output.timer_ui = timer_ui;
    }
    if let Some(presenter) = args.presenter {
        config.output.presenter = presenter;
    }

    Ok(())
}
