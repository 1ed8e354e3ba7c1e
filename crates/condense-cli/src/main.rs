//! # condense-cli
//!
//! Interactive chat client for Condense.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use condense_core::error::format_error_with_suggestion;
use condense_core::{Config, Error};
use condense_providers::ProviderRegistry;
use condense_session::{ConversationManager, ProviderReplyGenerator, ProviderSummarizer};

mod commands;
mod repl;

/// Application context shared by the REPL.
pub struct AppContext {
    pub config: Config,
    pub registry: ProviderRegistry,
    pub manager: Arc<ConversationManager>,
}

/// Condense - chat sessions with summary-based history compression
#[derive(Parser)]
#[command(name = "condense")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file layered over the user and project config
    #[arg(short, long, value_name = "PATH", env = "CONDENSE_CONFIG")]
    config: Option<PathBuf>,

    /// Provider to use (anthropic, openai)
    #[arg(long)]
    provider: Option<String>,

    /// Model used for replies
    #[arg(short, long)]
    model: Option<String>,

    /// Message count that triggers compression
    #[arg(short, long)]
    threshold: Option<usize>,

    /// Start sessions with compression disabled
    #[arg(long)]
    no_compression: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Check the effective configuration for problems
    Validate,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref provider) = self.provider {
            config.general.provider = provider.clone();
            config.providers.default_provider = Some(provider.clone());
        }
        if let Some(ref model) = self.model {
            config.general.model = Some(model.clone());
        }
        if let Some(threshold) = self.threshold {
            config.compression.threshold = threshold;
        }
        if self.no_compression {
            config.compression.enabled = false;
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, Error> {
    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .map_err(|e| Error::Config(e.to_string()))?;

    cli.apply_overrides(&mut config);
    Ok(config)
}

/// Build the provider-backed conversation manager.
fn build_context(config: Config, requested: Option<&str>) -> Result<AppContext, Error> {
    let registry = ProviderRegistry::from_config(&config);

    let provider = match requested {
        Some(id) => registry.get(id),
        None => registry.default_provider(),
    }
    .ok_or_else(|| Error::provider_not_configured(requested.unwrap_or(&config.general.provider)))?;

    let summarizer = Arc::new(ProviderSummarizer::new(
        Arc::clone(&provider),
        &config.compression,
    ));
    let generator = Arc::new(ProviderReplyGenerator::new(provider, &config));
    let manager = Arc::new(ConversationManager::from_config(
        &config, summarizer, generator,
    ));

    Ok(AppContext {
        config,
        registry,
        manager,
    })
}

fn history_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("condense")
        .join("history.txt")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => anyhow::bail!(format_error_with_suggestion(&e)),
    };

    match cli.command {
        Some(Commands::Config { action }) => {
            commands::config::handle(action, &config, cli.config.as_deref())?;
        }
        Some(Commands::Chat) | None => {
            if let Err(e) = config.ensure_valid() {
                anyhow::bail!(format_error_with_suggestion(&e));
            }
            let ctx = match build_context(config, cli.provider.as_deref()) {
                Ok(ctx) => ctx,
                Err(e) => anyhow::bail!(format_error_with_suggestion(&e)),
            };
            tracing::debug!(
                providers = ?ctx.registry.list(),
                threshold = ctx.config.compression.threshold,
                "Starting chat"
            );
            repl::run(Arc::new(ctx), history_path()).await?;
        }
    }

    Ok(())
}
