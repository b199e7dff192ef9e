// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use formic_core::domain::config::{SwarmConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./formic-config.yaml)
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Include comments describing every setting
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = SwarmConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. {}", DEFAULT_CONFIG_FILE);
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Split Negotiation:".bold());
    println!(
        "  Minimum approvals: {}{}",
        config.minimum_job_split_proposal_required,
        if config.auto_accepts_splits() {
            " (auto-accept)".dimmed().to_string()
        } else {
            String::new()
        }
    );
    println!();

    println!("{}", "Workers:".bold());
    println!("  Idle backoff: {:?}", config.idle_backoff);
    println!("  Max empty listings: {}", config.max_empty_listings);
    match config.lock_lease {
        Some(lease) => println!("  Lock lease: {:?}", lease),
        None => println!("  Lock lease: {}", "(none)".dimmed()),
    }
    println!("  Pheromone intensity: {}", config.pheromone_intensity);
    println!();

    println!("{}", "Orchestrator:".bold());
    println!("  Max steps: {}", config.orchestrator.max_steps);
    match config.orchestrator.event_wait_timeout {
        Some(timeout) => println!("  Event wait timeout: {:?}", timeout),
        None => println!("  Event wait timeout: {}", "(none)".dimmed()),
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = SwarmConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml").to_string()
    } else {
        SwarmConfig::default().to_yaml_string()?
    };

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}
