use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use tierkv_store::{BackendKind, StringStore};
use tierkv_tier::{HostCapabilities, KeyState, TierConfig, TieredStore};

use crate::cli::*;

/// How a command ended when it did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// The requested key is held by no tier. Exits with status 2 so scripts
    /// can tell a miss from a failure (status 1).
    Missing,
}

impl Outcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Done => ExitCode::SUCCESS,
            Outcome::Missing => ExitCode::from(2),
        }
    }
}

pub async fn run_command(cli: Cli, out: &mut dyn Write) -> anyhow::Result<Outcome> {
    let config = resolve_config(&cli)?;
    // Only the directory capability exists on a native host.
    let store = TieredStore::from_config(&config, &HostCapabilities::none())
        .await
        .context("failed to assemble tiers")?;
    // The table tier does not outlive the process, so a configured directory must be usable.
    if let Some(dir) = &config.directory {
        if store.tiers().find(BackendKind::Directory).is_none() {
            anyhow::bail!("directory tier unavailable at {}", dir.display());
        }
    }
    debug!(scope = %config.scope, tiers = store.tiers().len(), "store ready");

    let format = cli.format;
    match cli.command {
        Command::Get(args) => cmd_get(&store, &args.key, &format, out).await,
        Command::Set(args) => cmd_set(&store, args, &format, out).await,
        Command::Delete(args) => cmd_delete(&store, &args.key, &format, out).await,
        Command::Clear => cmd_clear(&store, &format, out).await,
        Command::Keys => cmd_keys(&store, &format, out).await,
        Command::Tiers => cmd_tiers(&store, &format, out),
        Command::Inspect(args) => cmd_inspect(&store, &args.key, &format, out).await,
    }
}

/// Configuration file (or defaults) with command-line overrides applied.
fn resolve_config(cli: &Cli) -> anyhow::Result<TierConfig> {
    let mut config = match &cli.config {
        Some(path) => TierConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => TierConfig::default(),
    };
    if let Some(scope) = &cli.scope {
        config.scope = scope.clone();
    }
    if let Some(dir) = &cli.dir {
        config.directory = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn cmd_get(
    store: &TieredStore,
    key: &str,
    format: &OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<Outcome> {
    let value = store
        .get(key)
        .await
        .with_context(|| format!("failed to read {key:?}"))?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", json!({ "key": key, "value": value }))?,
        OutputFormat::Text => {
            if let Some(value) = &value {
                writeln!(out, "{value}")?;
            }
        }
    }
    Ok(if value.is_some() { Outcome::Done } else { Outcome::Missing })
}

async fn cmd_set(
    store: &TieredStore,
    args: SetArgs,
    format: &OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<Outcome> {
    store
        .set(&args.key, &args.value)
        .await
        .with_context(|| format!("failed to store {:?}", args.key))?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", json!({ "key": args.key, "stored": true }))?,
        OutputFormat::Text => writeln!(out, "{} Stored {}", "✓".green(), args.key.bold())?,
    }
    Ok(Outcome::Done)
}

async fn cmd_delete(
    store: &TieredStore,
    key: &str,
    format: &OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<Outcome> {
    let removed = store
        .delete(key)
        .await
        .with_context(|| format!("failed to delete {key:?}"))?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", json!({ "key": key, "removed": removed }))?,
        OutputFormat::Text if removed => writeln!(out, "{} Deleted {}", "✓".green(), key.bold())?,
        OutputFormat::Text => writeln!(out, "{} was not present", key.bold())?,
    }
    Ok(if removed { Outcome::Done } else { Outcome::Missing })
}

async fn cmd_clear(
    store: &TieredStore,
    format: &OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<Outcome> {
    store.clear().await.context("failed to clear scope")?;
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", json!({ "scope": store.scope(), "cleared": true }))?
        }
        OutputFormat::Text => {
            writeln!(out, "{} Cleared scope {}", "✓".green(), store.scope().bold())?
        }
    }
    Ok(Outcome::Done)
}

async fn cmd_keys(
    store: &TieredStore,
    format: &OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<Outcome> {
    let keys = store.keys().await.context("failed to list keys")?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", json!(keys))?,
        OutputFormat::Text => {
            for key in &keys {
                writeln!(out, "{key}")?;
            }
        }
    }
    Ok(Outcome::Done)
}

fn cmd_tiers(
    store: &TieredStore,
    format: &OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<Outcome> {
    let tiers: Vec<_> = store.tiers().describe().into_iter().rev().collect();
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = tiers
                .iter()
                .map(|(backend, priority)| json!({ "backend": backend, "priority": priority }))
                .collect();
            writeln!(out, "{}", json!(rows))?;
        }
        OutputFormat::Text => {
            writeln!(out, "Scope {}", store.scope().bold())?;
            for (backend, priority) in &tiers {
                writeln!(out, "  {:>4}  {}", priority, backend.to_string().cyan())?;
            }
        }
    }
    Ok(Outcome::Done)
}

async fn cmd_inspect(
    store: &TieredStore,
    key: &str,
    format: &OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<Outcome> {
    let state = store
        .inspect(key)
        .await
        .with_context(|| format!("failed to inspect {key:?}"))?;
    let outcome = match state {
        KeyState::Absent => Outcome::Missing,
        _ => Outcome::Done,
    };
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", json!({ "key": key, "tiers": state }))?;
        }
        OutputFormat::Text => match &state {
            KeyState::Absent => writeln!(out, "{}: {}", key.bold(), "absent".dimmed())?,
            KeyState::Present { value, tiers } => {
                let held: Vec<String> = tiers.iter().map(ToString::to_string).collect();
                writeln!(out, "{} = {}", key.bold(), value)?;
                writeln!(out, "  held by: {}", held.join(", ").cyan())?;
            }
            KeyState::Divergent { values } => {
                writeln!(out, "{}: {}", key.bold(), "divergent".yellow().bold())?;
                for (backend, value) in values {
                    writeln!(out, "  {}: {}", backend.to_string().cyan(), value)?;
                }
            }
        },
    }
    Ok(outcome)
}
