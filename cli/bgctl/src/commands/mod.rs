//! CLI commands.

mod deploy;
mod hook;
mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use bluegreen_core::{BlueGreen, DeployConfig, HookEnv, Session};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::logging::LogFormat;
use crate::output::OutputFormat;

/// Environment variable that records the deployed tag on an application.
pub const DEFAULT_TAG_KEY: &str = "BLUEGREEN_TAG";

/// bgctl - Blue-green cutovers between two applications.
#[derive(Debug, Parser)]
#[command(name = "bgctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Deployment file (YAML or JSON).
    #[arg(long, global = true, default_value = "bluegreen.yml", env = "BLUEGREEN_CONFIG")]
    config: PathBuf,

    /// API token.
    #[arg(long, global = true, env = "BLUEGREEN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Control API base URL.
    #[arg(
        long,
        global = true,
        env = "BLUEGREEN_TARGET",
        default_value = "http://localhost:8080/"
    )]
    target: String,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Log level, used when RUST_LOG is unset.
    #[arg(long, global = true, env = "BLUEGREEN_LOG", default_value = "info")]
    pub log_level: String,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Move traffic from one application to another.
    Deploy(deploy::DeployCommand),

    /// Show cnames, units and deployed tag of applications.
    Status(status::StatusCommand),

    /// Run a single configured hook.
    Hook(hook::HookCommand),
}

impl Cli {
    /// Run the CLI command.
    pub fn run(self) -> Result<()> {
        let ctx = CommandContext {
            config_path: self.config,
            token: self.token,
            target: self.target,
            format: self.format,
        };

        match self.command {
            Commands::Deploy(cmd) => cmd.run(&ctx),
            Commands::Status(cmd) => cmd.run(&ctx),
            Commands::Hook(cmd) => cmd.run(&ctx),
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config_path: PathBuf,
    pub token: Option<String>,
    pub target: String,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Load the deployment file; a missing file yields an empty configuration.
    pub fn deploy_config(&self) -> Result<DeployConfig> {
        if !self.config_path.exists() {
            debug!(path = %self.config_path.display(), "no deployment file, using defaults");
            return Ok(DeployConfig::default());
        }

        DeployConfig::load(&self.config_path).with_context(|| {
            format!(
                "Failed to load deployment file {}",
                self.config_path.display()
            )
        })
    }

    /// Get the API token, failing with a hint when none was given.
    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow::anyhow!("No API token. Use --token or set BLUEGREEN_TOKEN."))
    }

    pub fn session(&self) -> Result<Session> {
        let token = self.require_token()?;
        let config = self.deploy_config()?;
        Ok(Session::new(token, &self.target, config)?)
    }

    /// Get an orchestrator for the configured target.
    pub fn orchestrator(&self) -> Result<BlueGreen> {
        BlueGreen::connect(self.session()?).context("Failed to create HTTP client")
    }
}

/// Parse `KEY=VALUE` pairs into a hook environment.
pub fn parse_env_pairs(pairs: &[String]) -> Result<HookEnv> {
    let mut env = HookEnv::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(anyhow::anyhow!(
                "Invalid environment variable '{}'. Use format KEY=VALUE",
                pair
            ));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow::anyhow!(
                "Invalid environment variable '{}'. KEY cannot be empty.",
                pair
            ));
        }

        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}
