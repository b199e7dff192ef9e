// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

// Swarm Configuration
//
// Tunables shared by every worker in a swarm and by the orchestrator loop:
// - split approval policy
// - idle backoff and graceful termination
// - optional lock lease (expired locks may be taken over)
// - orchestrator step limit and event wait deadline
//
// Loaded from YAML with environment overrides for container deployments.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "FORMIC_CONFIG_PATH";
pub const DEFAULT_CONFIG_FILE: &str = "./formic-config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Approvals needed before a split proposal is accepted. `1` means the
    /// proposing agent's own judgment suffices and the proposal is accepted
    /// immediately.
    #[serde(default = "default_min_split_approvals")]
    pub minimum_job_split_proposal_required: u32,

    /// Fixed delay after a pass that found nothing to lock
    #[serde(default = "default_idle_backoff", with = "humantime_serde")]
    pub idle_backoff: Duration,

    /// Consecutive empty listings tolerated before a worker exits
    #[serde(default = "default_max_empty_listings")]
    pub max_empty_listings: u32,

    /// Locks older than this may be taken over. `None` keeps locks until
    /// they are released.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub lock_lease: Option<Duration>,

    /// Weight given to every pheromone this swarm deposits
    #[serde(default = "default_pheromone_intensity")]
    pub pheromone_intensity: f64,

    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Upper bound on reasoning steps for a single request
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Give up on a request when no external event arrives within this window
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub event_wait_timeout: Option<Duration>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            event_wait_timeout: None,
        }
    }
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            minimum_job_split_proposal_required: default_min_split_approvals(),
            idle_backoff: default_idle_backoff(),
            max_empty_listings: default_max_empty_listings(),
            lock_lease: None,
            pheromone_intensity: default_pheromone_intensity(),
            orchestrator: OrchestratorSettings::default(),
        }
    }
}

impl SwarmConfig {
    /// Whether a fresh split proposal is accepted without review
    pub fn auto_accepts_splits(&self) -> bool {
        self.minimum_job_split_proposal_required == 1
    }

    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. FORMIC_CONFIG_PATH environment variable
    /// 2. ./formic-config.yaml (working directory)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from(DEFAULT_CONFIG_FILE);
        if cwd.exists() {
            return Some(cwd);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::debug!("No configuration file found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("FORMIC_MIN_SPLIT_APPROVALS") {
            match val.parse::<u32>() {
                Ok(n) => {
                    tracing::info!("Environment override: FORMIC_MIN_SPLIT_APPROVALS={}", n);
                    self.minimum_job_split_proposal_required = n;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for FORMIC_MIN_SPLIT_APPROVALS: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("FORMIC_IDLE_BACKOFF_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => {
                    tracing::info!("Environment override: FORMIC_IDLE_BACKOFF_SECS={}", secs);
                    self.idle_backoff = Duration::from_secs(secs);
                }
                Err(_) => tracing::warn!(
                    "Invalid value for FORMIC_IDLE_BACKOFF_SECS: '{}'. Expected seconds. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.minimum_job_split_proposal_required == 0 {
            anyhow::bail!("minimum_job_split_proposal_required must be at least 1");
        }

        if self.orchestrator.max_steps == 0 {
            anyhow::bail!("orchestrator.max_steps must be at least 1");
        }

        if !self.pheromone_intensity.is_finite() || self.pheromone_intensity < 0.0 {
            anyhow::bail!(
                "pheromone_intensity must be a non-negative number, got {}",
                self.pheromone_intensity
            );
        }

        if self.lock_lease.is_some_and(|l| l.is_zero()) {
            anyhow::bail!("lock_lease must be greater than zero when set");
        }

        Ok(())
    }
}

fn default_min_split_approvals() -> u32 {
    1
}

fn default_idle_backoff() -> Duration {
    Duration::from_secs(5)
}

fn default_max_empty_listings() -> u32 {
    2
}

fn default_pheromone_intensity() -> f64 {
    1.0
}

fn default_max_steps() -> u32 {
    64
}
