use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use taskloom::load::load_workflow_with;
use taskloom::{registry, Engine, EngineConfig, WorkflowValidator};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Run declarative task workflows.
#[derive(Debug, Parser)]
#[command(name = "taskloom", version, about)]
struct Cli {
    /// Path to a YAML workflow file
    #[arg(required_unless_present = "list_actions")]
    workflow: Option<PathBuf>,

    /// List available actions and exit
    #[arg(long)]
    list_actions: bool,

    /// Validate the workflow against the registered actions without running it
    #[arg(long)]
    check: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "TASKLOOM_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Maximum concurrently running tasks in a parallel group
    #[arg(long, value_name = "N")]
    max_concurrency: Option<usize>,

    /// Default per-task timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Seed a context key before the first task (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, Value)>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let registry = registry::global();

    if cli.list_actions {
        println!("Available actions:");
        for name in registry.list() {
            println!("  - {name}");
        }
        return Ok(());
    }

    let path = cli.workflow.context("no workflow file given")?;
    if !path.exists() {
        bail!("Workflow file not found: {}", path.display());
    }

    let validator = if cli.check {
        WorkflowValidator::new().with_known_actions(registry.list())
    } else {
        WorkflowValidator::new()
    };
    let workflow = load_workflow_with(&path, &validator)?;

    if cli.check {
        println!("{}: {} task(s) OK", path.display(), workflow.tasks.len());
        return Ok(());
    }

    let mut config = EngineConfig::from_env()?;
    if let Some(n) = cli.max_concurrency {
        config = config.with_max_concurrency(n);
    }
    if let Some(secs) = cli.timeout {
        let timeout = Some(secs)
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
            .context("--timeout must be a positive number of seconds")?;
        config = config.with_default_timeout(timeout);
    }

    let seed: Map<String, Value> = cli.set.into_iter().collect();
    let engine = Engine::new(registry, config);

    info!("Executing workflow: {}", path.display());
    match engine.execute_with(&workflow, seed).await {
        Ok(ctx) => {
            info!("Workflow completed successfully");
            debug!("Final context keys: {:?}", ctx.keys().collect::<Vec<_>>());
            Ok(())
        }
        Err(errors) => {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Workflow execution failed:\n  {}", details.join("\n  "))
        }
    }
}

/// Parses `key=value`. The value is read as a YAML scalar, falling back to
/// the raw text.
fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = match serde_yaml::from_str::<Value>(value) {
        Ok(Value::Null) | Err(_) => Value::String(value.to_string()),
        Ok(parsed) => parsed,
    };
    Ok((key.to_string(), value))
}
