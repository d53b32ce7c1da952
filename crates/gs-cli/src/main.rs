//! gatesync CLI
//!
//! Command-line interface for reconciling cloud compute inventory into an
//! access-management registry.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

mod config;

use config::{AppConfig, SyncDefaults};
use gs_connectors::{
    create_provider, AssetsProvider, ConfirmOptions, ProfileConfig, RegistryApi, RegistryClient,
    SqsTaskQueue,
};
use gs_engine::{
    AssetAgent, CleanAssets, CleanOptions, ListenLoop, RunSummary, SmartSync, SyncOptions,
    TargetedSync,
};

#[derive(Parser)]
#[command(name = "gatesync")]
#[command(version)]
#[command(about = "Reconciles cloud compute inventory into an access-management registry", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sync explicit instances (or a whole profile) into the registry
    Sync {
        /// Profile to sync
        #[arg(short, long)]
        profile: String,

        /// Instance ids to sync, comma-separated (default: all)
        #[arg(short, long, value_delimiter = ',')]
        instances: Vec<String>,

        /// Stop after this many synced assets
        #[arg(long)]
        limit: Option<usize>,

        #[command(flatten)]
        push: PushOpts,
    },

    /// Diff a profile against the registry, adding and deleting by instance number
    Reconcile {
        /// Profile to reconcile
        #[arg(short, long)]
        profile: String,

        #[command(flatten)]
        push: PushOpts,
    },

    /// Delete registry assets whose instances are gone
    Clean {
        /// Restrict to assets tagged with this profile
        #[arg(short, long)]
        profile: Option<String>,

        /// Restrict to these instance numbers, comma-separated
        #[arg(short, long, value_delimiter = ',')]
        instances: Vec<String>,

        /// Delete without probing liveness first
        #[arg(long)]
        include_all: bool,

        #[command(flatten)]
        confirm: ConfirmArgs,
    },

    /// Serve reconciliation requests from the task queue
    Listen,

    /// Show current configuration
    ShowConfig {
        /// Show secrets (redacted by default)
        #[arg(long)]
        show_secrets: bool,
    },
}

/// Push and follow-up flags shared by the sync commands.
#[derive(Args, Default)]
struct PushOpts {
    /// Push system users to each synced asset
    #[arg(long)]
    push: bool,

    /// Verify pushed credentials after the run, re-pushing on failure
    #[arg(long)]
    push_check: bool,

    /// Push unconditionally on the first push-check round
    #[arg(long)]
    force_push: bool,

    /// Probe liveness of each synced asset after the run
    #[arg(long)]
    test_asset: bool,

    /// Comma-separated system user names to push (default: all)
    #[arg(long, value_name = "USERS")]
    push_system_users: Option<String>,

    /// Retry budget for push-checks
    #[arg(long, value_name = "N")]
    push_max_tries: Option<u32>,

    #[command(flatten)]
    confirm: ConfirmArgs,
}

/// Task-confirmation pacing flags.
#[derive(Args, Default)]
struct ConfirmArgs {
    /// Seconds to wait for each task confirmation
    #[arg(long, value_name = "SECS")]
    check_timeout: Option<u64>,

    /// Seconds between task-log fetches
    #[arg(long, value_name = "SECS")]
    check_interval: Option<u64>,

    /// Stream each fetched task-log snapshot at info level
    #[arg(long)]
    show_task_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = resolve_config(cli.config, cli.verbose)?;

    // Initialize logging
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        config
            .logging
            .level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    };

    gs_observability::logging::init_logging_with_config(gs_observability::logging::LoggingConfig {
        level: log_level,
        json_format: config.logging.json || cli.format == OutputFormat::Json,
        ..Default::default()
    });

    // Execute command
    match cli.command {
        Commands::Sync {
            profile,
            instances,
            limit,
            push,
        } => cmd_sync(config, &profile, instances, limit, &push, cli.format).await,
        Commands::Reconcile { profile, push } => {
            cmd_reconcile(config, &profile, &push, cli.format).await
        }
        Commands::Clean {
            profile,
            instances,
            include_all,
            confirm,
        } => cmd_clean(config, profile, instances, include_all, &confirm, cli.format).await,
        Commands::Listen => cmd_listen(config).await,
        Commands::ShowConfig { show_secrets } => {
            cmd_show_config(config, show_secrets, cli.format).await
        }
    }
}

/// Resolves configuration: `--config` wins, then `$GATESYNC_CONFIG`, then
/// the platform config directory, then built-in defaults. An explicitly
/// named file that fails to load is a hard error.
fn resolve_config(cli_path: Option<PathBuf>, verbose: bool) -> Result<AppConfig> {
    let explicit = cli_path.or_else(|| std::env::var_os("GATESYNC_CONFIG").map(PathBuf::from));
    if let Some(path) = explicit {
        return AppConfig::load(&path);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        return AppConfig::load(&default_path);
    }

    if verbose {
        eprintln!("Using default configuration (no config file found)");
    }
    Ok(AppConfig::default())
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("com", "gatesync", "gatesync") {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/default.yaml")
    }
}

/// Run options assembled from configured defaults and command-line flags.
/// Boolean flags are additive; valued flags override the configured value.
fn sync_options(defaults: &SyncDefaults, push: &PushOpts) -> SyncOptions {
    SyncOptions {
        push: defaults.push || push.push,
        push_check: defaults.push_check || push.push_check,
        force_push: defaults.force_push || push.force_push,
        test_asset: defaults.test_asset || push.test_asset,
        push_system_users: push
            .push_system_users
            .clone()
            .or_else(|| defaults.push_system_users.clone()),
        confirm: confirm_options(defaults, &push.confirm),
        push_max_tries: push.push_max_tries.unwrap_or(defaults.push_max_tries),
    }
}

fn confirm_options(defaults: &SyncDefaults, args: &ConfirmArgs) -> ConfirmOptions {
    let mut confirm = defaults.confirm_options();
    if let Some(timeout) = args.check_timeout {
        confirm.timeout_secs = timeout;
    }
    if let Some(interval) = args.check_interval {
        confirm.interval_secs = interval;
    }
    confirm.show_task_log = confirm.show_task_log || args.show_task_log;
    confirm
}

fn registry_api(config: &AppConfig) -> Result<Arc<dyn RegistryApi>> {
    let client =
        RegistryClient::new(config.registry.clone()).context("Failed to build registry client")?;
    Ok(Arc::new(client))
}

async fn build_provider(config: &AppConfig, profile: &str) -> Result<Box<dyn AssetsProvider>> {
    let profile_config = config
        .profiles
        .get(profile)
        .with_context(|| format!("Profile '{}' is not configured", profile))?;
    create_provider(profile, profile_config)
        .await
        .with_context(|| format!("Failed to build provider for profile '{}'", profile))
}

async fn cmd_sync(
    config: AppConfig,
    profile: &str,
    instances: Vec<String>,
    limit: Option<usize>,
    push: &PushOpts,
    format: OutputFormat,
) -> Result<()> {
    let provider = build_provider(&config, profile).await?;
    let agent = AssetAgent::new(registry_api(&config)?);
    let options = sync_options(&config.defaults, push);

    let instance_ids = (!instances.is_empty()).then_some(instances.as_slice());
    let summary = TargetedSync::new(provider.as_ref(), &agent, options)
        .run(instance_ids, limit)
        .await?;

    report(summary, format)
}

async fn cmd_reconcile(
    config: AppConfig,
    profile: &str,
    push: &PushOpts,
    format: OutputFormat,
) -> Result<()> {
    let provider = build_provider(&config, profile).await?;
    let agent = AssetAgent::new(registry_api(&config)?);
    let options = sync_options(&config.defaults, push);

    let summary = SmartSync::new(provider.as_ref(), &agent, options)
        .run()
        .await?;

    report(summary, format)
}

async fn cmd_clean(
    config: AppConfig,
    profile: Option<String>,
    instances: Vec<String>,
    include_all: bool,
    confirm: &ConfirmArgs,
    format: OutputFormat,
) -> Result<()> {
    let agent = AssetAgent::new(registry_api(&config)?);
    let options = CleanOptions {
        profile,
        instance_numbers: instances,
        include_all,
        confirm: confirm_options(&config.defaults, confirm),
    };

    let summary = CleanAssets::new(&agent, options).run().await?;
    report(summary, format)
}

async fn cmd_listen(config: AppConfig) -> Result<()> {
    let listen = config
        .listen
        .clone()
        .context("Listen mode requires a `listen` section in the configuration")?;

    let providers = listen_providers(&config, listen.profiles.as_deref()).await?;
    if providers.is_empty() {
        anyhow::bail!("No profiles available for listen mode");
    }

    let queue = SqsTaskQueue::new(listen)
        .await
        .context("Failed to build task queue")?;
    let api = registry_api(&config)?;
    let options = sync_options(&config.defaults, &PushOpts::default());
    let runner = ListenLoop::new(&queue, api, &providers, options);

    println!(
        "{}",
        format!("Listening for sync requests ({} profiles)", providers.len())
            .green()
            .bold()
    );
    println!("Press Ctrl+C to stop");

    tokio::select! {
        _ = runner.run() => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\n{}", "Shutting down...".yellow());
        }
    }

    Ok(())
}

/// Builds one provider per configured profile, restricted to the allow-list
/// when one is set.
async fn listen_providers(
    config: &AppConfig,
    allow: Option<&[String]>,
) -> Result<BTreeMap<String, Box<dyn AssetsProvider>>> {
    let mut providers = BTreeMap::new();
    for (name, profile) in &config.profiles {
        if let Some(allowed) = allow {
            if !allowed.iter().any(|p| p == name) {
                continue;
            }
        }
        let provider = create_provider(name, profile)
            .await
            .with_context(|| format!("Failed to build provider for profile '{}'", name))?;
        providers.insert(name.clone(), provider);
    }
    Ok(providers)
}

async fn cmd_show_config(config: AppConfig, show_secrets: bool, format: OutputFormat) -> Result<()> {
    let display_config = if show_secrets {
        config
    } else {
        config.redact_secrets()
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&display_config)?);
    } else {
        println!("{}", "Current Configuration".bold());
        println!("─────────────────────");
        println!("Registry: {}", display_config.registry.base_url);
        println!();
        println!("Profiles:");
        if display_config.profiles.is_empty() {
            println!("  (none)");
        }
        for (name, profile) in &display_config.profiles {
            let ProfileConfig::Aws(aws) = profile;
            println!(
                "  - {}: aws {} ({} selectors)",
                name.cyan(),
                aws.region,
                aws.selectors.len()
            );
        }
        if let Some(listen) = &display_config.listen {
            println!();
            println!("Listen queue: {}", listen.queue_url);
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!();
    println!("{}", "Run Summary".bold());
    println!("───────────");
    println!(
        "  Synced:  {} ({} created, {} updated)",
        summary.synced, summary.created, summary.updated
    );
    println!("  Deleted: {}", summary.deleted);
    if summary.failed > 0 {
        println!("  Failed:  {}", summary.failed.to_string().red());
    } else {
        println!("  Failed:  {}", summary.failed);
    }
    println!("  Elapsed: {} ms", summary.duration_ms);
    Ok(())
}

/// Prints the summary and exits non-zero when any asset failed.
fn report(summary: RunSummary, format: OutputFormat) -> Result<()> {
    print_summary(&summary, format)?;
    if !summary.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!(
            "json".parse::<OutputFormat>(),
            Ok(OutputFormat::Json)
        ));
        assert!(matches!(
            "TEXT".parse::<OutputFormat>(),
            Ok(OutputFormat::Text)
        ));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_sync_options_flags_are_additive() {
        let defaults = SyncDefaults {
            push: true,
            ..SyncDefaults::default()
        };
        let opts = PushOpts {
            push_check: true,
            ..PushOpts::default()
        };

        let merged = sync_options(&defaults, &opts);
        assert!(merged.push);
        assert!(merged.push_check);
        assert!(!merged.force_push);
    }

    #[test]
    fn test_sync_options_cli_overrides_values() {
        let defaults = SyncDefaults {
            push_max_tries: 5,
            push_system_users: Some("root".to_string()),
            ..SyncDefaults::default()
        };
        let opts = PushOpts {
            push_max_tries: Some(1),
            push_system_users: Some("deploy,ops".to_string()),
            confirm: ConfirmArgs {
                check_timeout: Some(9),
                ..ConfirmArgs::default()
            },
            ..PushOpts::default()
        };

        let merged = sync_options(&defaults, &opts);
        assert_eq!(merged.push_max_tries, 1);
        assert_eq!(merged.push_system_users.as_deref(), Some("deploy,ops"));
        assert_eq!(merged.confirm.timeout_secs, 9);
        assert_eq!(merged.confirm.interval_secs, 3);
    }

    #[test]
    fn test_confirm_options_fall_back_to_defaults() {
        let defaults = SyncDefaults::default();
        let confirm = confirm_options(&defaults, &ConfirmArgs::default());
        assert_eq!(confirm.timeout_secs, 30);
        assert_eq!(confirm.interval_secs, 3);
        assert!(!confirm.show_task_log);
    }
}
