mod source;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use libendpoint_storm::{ProbeConfig, ProbeResult, Prober, Report};
use serde::{Deserialize, Serialize};
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const URL_WIDTH: usize = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
struct Config {
    #[serde(default)]
    probe: ProbeConfig,
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("epq").join("config.toml"))
}

fn load_config(path: Option<PathBuf>) -> Config {
    let Some(path) = path.or_else(config_path) else {
        return Config::default();
    };
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Config::default();
    };

    match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring invalid config");
            Config::default()
        }
    }
}

fn get_default_config_toml() -> String {
    r#"# Endpoint Query (epq) Configuration

[probe]
# Seconds before a single request is abandoned
timeout_secs = 10

# Endpoints answering slower than this are reported as slow
slow_threshold_ms = 1000

# Probes in flight across all domains (also the size of one wave)
max_concurrent = 50

# Probes in flight per domain key (e.g. everything under ankr.com)
max_per_domain = 10

# Optional request quota per domain key, in requests per second
# max_rate_per_domain = 20

# URL fragments that mark a known RPC gateway; these are checked as RPC first
rpc_signatures = ["rpc.ankr", "/rpc", "endpoints.omni", "public.blast", "blockpi.network", "drpc.org"]

# JSON-RPC health calls, tried in an order picked from the URL text
[[probe.rpc_probes]]
chain = "ethereum"
method = "eth_blockNumber"
params = []

[[probe.rpc_probes]]
chain = "solana"
method = "getHealth"

[[probe.rpc_probes]]
chain = "sui"
method = "sui_getProtocolConfig"
params = []
"#
    .to_string()
}

#[derive(Parser, Debug)]
#[command(name = "epq")]
#[command(about = "Endpoint Query - liveness check for HTTP, API and JSON-RPC endpoints", long_about = None)]
struct Args {
    /// Config source to scan for URLs (JSON, YAML, CSV or text; `-` reads stdin)
    source: Option<PathBuf>,

    /// Output results as NDJSON stream (one JSON object per line)
    #[arg(long, short = 'j')]
    ndjson: bool,

    /// Output the full classified report as one JSON document
    #[arg(long, conflicts_with = "ndjson")]
    json: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Latency in milliseconds above which an endpoint counts as slow
    #[arg(long)]
    slow_ms: Option<u64>,

    /// Maximum probes in flight overall
    #[arg(long)]
    concurrency: Option<u32>,

    /// Maximum probes in flight per domain
    #[arg(long)]
    per_domain: Option<u32>,

    /// Requests per second allowed per domain
    #[arg(long)]
    rate: Option<u32>,

    /// Read settings from this file instead of the default config path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every probe result to stderr
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Print the default config to stdout and exit
    #[arg(long)]
    print_default_config: bool,

    /// Write the default config to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

impl Args {
    fn apply(&self, config: &mut ProbeConfig) {
        if let Some(secs) = self.timeout {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.slow_ms {
            config.slow_threshold_ms = ms;
        }
        if let Some(n) = self.concurrency {
            config.max_concurrent = n;
        }
        if let Some(n) = self.per_domain {
            config.max_per_domain = n;
        }
        if self.rate.is_some() {
            config.max_rate_per_domain = self.rate;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OutputMode {
    Text,
    Json,
    Ndjson,
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,libendpoint_storm=info,epq=info")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_default_config {
        println!("{}", get_default_config_toml());
        return Ok(());
    }

    if args.write_default_config {
        let path = config_path().context("Could not determine config path")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, get_default_config_toml())?;
        println!("Default config written to: {}", path.display());
        return Ok(());
    }

    init_logging(args.verbose);

    let Some(source) = args.source.clone() else {
        anyhow::bail!("A config source to scan is required (see --help)");
    };

    let mut probe_config = load_config(args.config.clone()).probe;
    args.apply(&mut probe_config);

    let mode = if args.ndjson {
        OutputMode::Ndjson
    } else if args.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(&source, mode, probe_config))
}

async fn run(source: &Path, mode: OutputMode, config: ProbeConfig) -> Result<()> {
    let urls = source::load_urls(source)?;
    info!(count = urls.len(), source = %source.display(), "Found unique URLs");
    if urls.is_empty() {
        warn!("No URLs found in {}", source.display());
    }

    let prober = Prober::with_config(config)?;
    let urls: Vec<String> = urls.into_iter().collect();

    match mode {
        OutputMode::Ndjson => run_ndjson(&prober, urls).await,
        OutputMode::Json => {
            let report = Report::from_results(prober.check_all(urls).await);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        OutputMode::Text => {
            let report = run_with_progress(&prober, urls).await;
            print_report(&report, prober.config().slow_threshold_ms);
            Ok(())
        }
    }
}

async fn run_ndjson(prober: &Prober, urls: Vec<String>) -> Result<()> {
    let stream = prober.probe_stream(urls);
    futures::pin_mut!(stream);

    let mut stdout = io::stdout();
    while let Some(result) = stream.next().await {
        let line = serde_json::to_string(&result)?;
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
    }

    Ok(())
}

async fn run_with_progress(prober: &Prober, urls: Vec<String>) -> Report {
    let bar = ProgressBar::new(urls.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.green}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█░ "),
    );

    let results = prober
        .run(urls, |progress, _| {
            bar.set_position(progress.processed as u64);
            bar.set_message(format!("wave {}", progress.wave));
        })
        .await;

    bar.finish_and_clear();
    Report::from_results(results)
}

fn truncate_url(url: &str) -> String {
    if url.chars().count() > URL_WIDTH {
        let head: String = url.chars().take(URL_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        url.to_string()
    }
}

fn print_rows(results: &[ProbeResult]) {
    println!("{:<w$}  {:>10}  {:>6}  Type", "URL", "Ping (ms)", "Status", w = URL_WIDTH);
    for result in results {
        let status = result
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<w$}  {:>10.1}  {:>6}  {}",
            truncate_url(&result.url),
            result.latency_ms,
            status,
            result.endpoint_type,
            w = URL_WIDTH
        );
    }
}

fn print_report(report: &Report, slow_threshold_ms: u64) {
    let summary = &report.summary;

    println!("=== Endpoint Status Summary ===");
    println!("Total Endpoints: {}", summary.total);
    println!("Healthy: {} ({:.1}%)", summary.healthy, summary.percent(summary.healthy));
    println!("Slow: {} ({:.1}%)", summary.slow, summary.percent(summary.slow));
    println!("Errors: {} ({:.1}%)", summary.errored, summary.percent(summary.errored));

    println!();
    println!("=== Healthy Endpoints ===");
    print_rows(&report.healthy);

    if !report.slow.is_empty() {
        println!();
        println!("=== Slow Endpoints (>{}ms) ===", slow_threshold_ms);
        print_rows(&report.slow);
    }

    if !report.errored.is_empty() {
        println!();
        println!("=== Failed Endpoints ===");
        println!("{:<w$}  {:>6}  {:<14}  Issue", "URL", "Status", "Type", w = URL_WIDTH);
        for result in &report.errored {
            println!(
                "{:<w$}  {:>6}  {:<14}  {}",
                truncate_url(&result.url),
                "Error",
                result.endpoint_type.as_str(),
                result.error.as_deref().unwrap_or_default(),
                w = URL_WIDTH
            );
        }
    }
}
