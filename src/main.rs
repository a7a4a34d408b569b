// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agentrace command line: demo runs, config inspection and collector checks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;

use agentrace::config::{self, CliOptions, ObservabilityConfig};
use agentrace::instrument::{traced_agent_async, traced_llm_async, traced_tool_async};
use agentrace::telemetry::{init_telemetry, TelemetryConfig};
use agentrace::{HasUsageMetrics, Observability, UsageMetrics, VERSION};

/// agentrace - tracing and structured logging for agent systems.
#[derive(Parser)]
#[command(name = "agentrace")]
#[command(author, version, about = "Tracing and structured logging for agent systems", long_about = None)]
struct Cli {
    /// Service name reported to the collector
    #[arg(long, global = true)]
    service_name: Option<String>,

    /// Fixed session id for every record
    #[arg(long, global = true)]
    session_id: Option<String>,

    /// OTLP/HTTP collector endpoint (host:port or URL)
    #[arg(short, long, global = true)]
    endpoint: Option<String>,

    /// Use plaintext http for the collector
    #[arg(long, global = true)]
    insecure: bool,

    /// Disable the console output
    #[arg(long, global = true)]
    no_console: bool,

    /// Append records to this JSON-lines file
    #[arg(long, global = true)]
    jsonl: Option<PathBuf>,

    /// Nesting budget for captured arguments and results
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Increase diagnostic logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn options(&self) -> CliOptions {
        CliOptions {
            service_name: self.service_name.clone(),
            session_id: self.session_id.clone(),
            endpoint: self.endpoint.clone(),
            insecure: self.insecure.then_some(true),
            no_console: self.no_console,
            jsonl_path: self.jsonl.clone(),
            max_depth: self.max_depth,
        }
    }
}

/// Subcommands for agentrace.
#[derive(Subcommand)]
enum Commands {
    /// Run simulated crawler agents through every configured output
    Demo {
        /// Number of concurrent runs
        #[arg(short, long, default_value_t = 2)]
        runs: usize,

        /// Make one navigation fail
        #[arg(long)]
        fail: bool,
    },

    /// Show the resolved configuration
    Config {
        /// Write an example .agentrace.json in the workspace instead
        #[arg(long)]
        init: bool,
    },

    /// Validate configuration and probe the collector
    Check,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _telemetry = init_telemetry(&TelemetryConfig::from_verbosity(cli.verbose))?;

    let cwd = std::env::current_dir()?;
    let workspace_root = config::find_workspace_root(&cwd).unwrap_or(cwd);
    let options = cli.options();

    match cli.command {
        Commands::Demo { runs, fail } => {
            let config = config::load_config(&workspace_root, options)?;
            run_demo(&config, runs, fail).await
        }
        Commands::Config { init } => {
            if init {
                let path = config::init_config(&workspace_root, None)?;
                println!("Created config file: {}", path.display());
            } else {
                let config = config::load_config(&workspace_root, options)?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            Ok(())
        }
        Commands::Check => check(&workspace_root, options),
        Commands::Version => {
            println!("agentrace {VERSION}");
            Ok(())
        }
    }
}

fn check(workspace_root: &std::path::Path, options: CliOptions) -> anyhow::Result<()> {
    let config = match config::load_config(workspace_root, options) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            return Err(e.into());
        }
    };
    println!("{} configuration valid", "✓".green());

    match config.otlp() {
        None => println!("{} no collector configured", "-".dimmed()),
        Some(otlp) => match otlp.probe() {
            Ok(()) => println!("{} collector reachable at {}", "✓".green(), otlp.base_url()),
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                return Err(e.into());
            }
        },
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("cannot navigate to {0}: unsupported scheme")]
    Navigation(String),
    #[error("worker task failed: {0}")]
    Join(String),
}

#[derive(Debug, Clone, Serialize)]
struct Page {
    url: String,
    status: u16,
    title: String,
}

#[derive(Debug, Clone, Serialize)]
struct Summary {
    text: String,
    usage: UsageMetrics,
}

impl HasUsageMetrics for Summary {
    fn usage_metrics(&self) -> Option<UsageMetrics> {
        Some(self.usage)
    }
}

async fn run_demo(config: &ObservabilityConfig, runs: usize, fail: bool) -> anyhow::Result<()> {
    let obs = Observability::from_config(config)?;

    let navigate = Arc::new(traced_tool_async(&obs, "navigate", |url: String| async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        if !url.starts_with("https://") {
            return Err(DemoError::Navigation(url));
        }
        let title = url.rsplit('/').next().unwrap_or_default().to_string();
        Ok(Page {
            url,
            status: 200,
            title,
        })
    }));

    let summarize = Arc::new(traced_llm_async(&obs, "summarize", |pages: Vec<Page>| async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        let titles: Vec<_> = pages.iter().map(|p| p.title.as_str()).collect();
        let input_tokens = 200 * pages.len() as u64;
        Ok::<_, DemoError>(Summary {
            text: format!("Visited {}", titles.join(", ")),
            usage: UsageMetrics::tokens(input_tokens, 48).with_cost(input_tokens as f64 * 1e-6),
        })
    }));

    let crawler = {
        let handle = obs.clone();
        Arc::new(traced_agent_async(&obs, "crawler", move |urls: Vec<String>| {
            let obs = handle.clone();
            let navigate = navigate.clone();
            let summarize = summarize.clone();
            async move {
                // Navigate concurrently; each task keeps the crawler as parent
                let mut tasks = Vec::with_capacity(urls.len());
                for url in urls {
                    let navigate = navigate.clone();
                    tasks.push(tokio::spawn(
                        obs.propagate(async move { navigate.call(url).await }),
                    ));
                }

                let mut pages = Vec::with_capacity(tasks.len());
                for task in tasks {
                    pages.push(task.await.map_err(|e| DemoError::Join(e.to_string()))??);
                }
                summarize.call(pages).await
            }
        }))
    };

    let mut handles = Vec::with_capacity(runs);
    for run in 0..runs {
        let request = obs.new_request();
        let crawler = crawler.clone();
        let scheme = if fail && run == 0 { "ftp" } else { "https" };
        let urls = vec![
            format!("https://example.com/run{run}/index"),
            format!("{scheme}://example.com/run{run}/docs"),
        ];
        handles.push(tokio::spawn(
            request.scope(async move { crawler.call(urls).await }),
        ));
    }

    let mut failures = 0;
    for handle in handles {
        match handle.await? {
            Ok(summary) => eprintln!("{} {}", "✓".green(), summary.text),
            Err(e) => {
                failures += 1;
                eprintln!("{} {}", "✗".red(), e);
            }
        }
    }

    // Flushing waits on the exporter, so keep it off the runtime's workers.
    let flushing = obs.clone();
    tokio::task::spawn_blocking(move || flushing.flush()).await?;
    let diagnostics = obs.diagnostics();
    eprintln!(
        "{}",
        format!(
            "{} records, {} spans ({} failed), {} output failures",
            diagnostics.records_emitted,
            diagnostics.spans_closed,
            diagnostics.spans_failed,
            diagnostics.total_output_failures()
        )
        .dimmed()
    );
    if let Some(stats) = obs.exporter_stats() {
        eprintln!(
            "{}",
            format!(
                "exported {} spans / {} logs, dropped {}, failed batches {}",
                stats.exported_spans, stats.exported_logs, stats.dropped, stats.failed_batches
            )
            .dimmed()
        );
    }
    let closing = obs.clone();
    tokio::task::spawn_blocking(move || closing.shutdown()).await?;

    if failures > 0 {
        anyhow::bail!("{failures} run(s) failed");
    }
    Ok(())
}
