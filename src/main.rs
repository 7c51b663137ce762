//! planguard: validate and repair execution plans
//!
//! Usage:
//!   planguard run --request req.json       → orchestrate one request against the brain service
//!   planguard run < req.json               → same, request on stdin
//!   planguard check --plan p.json --plugins defs.json → offline check, no reasoner
//!   planguard config                       → print effective configuration
//!   planguard version                      → show version

use anyhow::Context;
use clap::{Parser, Subcommand};
use planguard::config::{PlanguardConfig, DEFAULT_CONFIG_FILE};
use planguard::logging::init_tracing;
use planguard::check_plan;
use planguard_agent::{PlanOrchestrator, RequestContext};
use planguard_core::PluginDefinition;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "planguard",
    about = "Plan validator and repair engine",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write JSON logs to a daily rolling file in this directory (in addition to stderr)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator on a request of [key, value] pairs
    Run {
        /// Request file, or "-" for stdin
        #[arg(short, long, default_value = "-")]
        request: String,
        /// Override the repair retry budget
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Normalize, resolve iteration and validate a plan without calling the brain
    Check {
        /// Plan file (JSON)
        #[arg(long)]
        plan: PathBuf,
        /// Plugin definitions file (JSON array)
        #[arg(long)]
        plugins: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("planguard v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = PlanguardConfig::load(&config_path).with_env();
    if let Some(dir) = cli.log_dir.clone() {
        config.logging.log_dir = Some(dir);
    }
    let guard = init_tracing(&config.logging);

    let success = match cli.command {
        Commands::Run {
            request,
            max_retries,
        } => {
            if let Some(n) = max_retries {
                config.repair.max_retries = n;
            }
            run(&config, &request).await?
        }
        Commands::Check { plan, plugins } => check(&plan, plugins.as_deref())?,
        Commands::Config => {
            print!("{}", config.to_toml());
            true
        }
        Commands::Version => true,
    };

    drop(guard);
    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn read_json(source: &str) -> anyhow::Result<Value> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading {}", source))?
    };
    serde_json::from_str(&text).with_context(|| format!("parsing JSON from {}", source))
}

async fn run(config: &PlanguardConfig, source: &str) -> anyhow::Result<bool> {
    let raw = read_json(source)?;
    // accept a bare pair list or a plugin-style {"inputs": [...]} body
    let inputs = match raw {
        Value::Object(mut body) if body.contains_key("inputs") => {
            body.remove("inputs").unwrap_or(Value::Null)
        }
        other => other,
    };

    let reasoner = Arc::new(config.brain_client());
    let orchestrator = PlanOrchestrator::new(reasoner).with_config(config.repair_config());
    let ctx = RequestContext::new();

    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling before the next retry");
            cancel.cancel();
        }
    });

    info!(run_id = %ctx.run_id, brain = %config.reasoner.base_url, "running request");
    let outputs = orchestrator.execute(&inputs, &ctx).await;
    println!("{}", serde_json::to_string_pretty(&outputs)?);
    Ok(outputs.iter().all(|o| o.success))
}

fn check(plan: &Path, plugins: Option<&Path>) -> anyhow::Result<bool> {
    let raw = read_json(&plan.to_string_lossy())?;
    let plugins: Vec<PluginDefinition> = match plugins {
        Some(path) => serde_json::from_value(read_json(&path.to_string_lossy())?)
            .context("plugin definitions must be a JSON array")?,
        None => Vec::new(),
    };

    let report = check_plan(raw, plugins);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.result.valid)
}
