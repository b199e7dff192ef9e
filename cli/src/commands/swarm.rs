// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Swarm commands
//!
//! Commands: run

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use formic_core::application::ControlLoop;
use formic_core::domain::agent::{AgentContext, SwarmId};
use formic_core::domain::config::SwarmConfig;
use formic_core::domain::executor::{JobExecutor, WorkOutcome};
use formic_core::domain::job::{Job, JobStatus};
use formic_core::domain::oracle::Oracles;
use formic_core::infrastructure::{AgentEventBus, BroadcastNotifier, InMemoryJobRepository, RuleOracle};
use formic_swarm::SwarmSupervisor;

use crate::backlog::BacklogFile;

#[derive(Subcommand)]
pub enum SwarmCommand {
    /// Seed a backlog and let a swarm of workers drain it
    Run {
        /// Backlog file (YAML)
        #[arg(short, long, value_name = "FILE")]
        jobs: PathBuf,

        /// Number of workers
        #[arg(short, long, default_value_t = 3)]
        workers: usize,

        /// Simulated time spent on each job, in milliseconds
        #[arg(long, default_value_t = 250)]
        work_ms: u64,
    },
}

pub async fn handle_command(command: SwarmCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        SwarmCommand::Run { jobs, workers, work_ms } => {
            run(jobs, workers, Duration::from_millis(work_ms), config_override).await
        }
    }
}

/// Completes every job after a fixed delay.
struct SimulatedExecutor {
    work_time: Duration,
}

#[async_trait]
impl JobExecutor for SimulatedExecutor {
    async fn execute(&self, job: &Job, ctx: &AgentContext) -> Result<WorkOutcome> {
        info!(job = %job.name, agent = %ctx.agent_name, "Working");
        tokio::time::sleep(self.work_time).await;
        Ok(WorkOutcome::Completed)
    }
}

async fn run(jobs_file: PathBuf, workers: usize, work_time: Duration, config_override: Option<PathBuf>) -> Result<()> {
    if workers == 0 {
        bail!("--workers must be at least 1");
    }

    let config = SwarmConfig::load_or_default(config_override).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let swarm_id = SwarmId::new();
    let jobs = BacklogFile::from_yaml_file(&jobs_file)?.into_jobs(swarm_id)?;
    let job_count = jobs.len();
    let repository = Arc::new(
        InMemoryJobRepository::new()
            .with_lock_lease(config.lock_lease)
            .with_jobs(jobs),
    );

    println!(
        "{}",
        format!("Seeded {} jobs from {}, starting {} workers", job_count, jobs_file.display(), workers).bold()
    );

    let notifier = BroadcastNotifier::with_default_capacity();
    let mut notifications = notifier.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(message) = notifications.recv().await {
            println!("  {} {}", "▸".cyan(), message);
        }
    });

    let cancel = CancellationToken::new();
    let supervisor = SwarmSupervisor::new(
        swarm_id,
        workers,
        config.clone(),
        repository.clone(),
        Oracles::uniform(Arc::new(RuleOracle::new())),
        Arc::new(SimulatedExecutor { work_time }),
        Arc::new(notifier),
    )
    .with_cancellation(cancel.clone());
    let control = ControlLoop::new(
        Arc::new(supervisor),
        Arc::new(AgentEventBus::new()),
        config.orchestrator.clone(),
    )
    .with_cancellation(cancel.clone());

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping workers");
            ctrl_c.cancel();
        }
    });

    let result = control.process_one_request("Drain the backlog").await;
    drop(control);
    if tokio::time::timeout(Duration::from_secs(1), printer).await.is_err() {
        warn!("Notification printer did not finish");
    }

    let summary = result.context("Swarm run failed")?;
    println!();
    println!("{}", summary);
    println!();
    print_backlog(&repository.all_jobs());

    Ok(())
}

fn print_backlog(jobs: &[Job]) {
    println!("{}", "Backlog:".bold());
    for root in jobs.iter().filter(|j| j.is_root()) {
        print_job(root, "");
        for child in jobs.iter().filter(|j| j.parent_job_id == Some(root.id)) {
            print_job(child, "  ");
        }
    }
}

fn print_job(job: &Job, indent: &str) {
    let status = match job.status {
        JobStatus::Closed => job.status.to_string().green(),
        JobStatus::Blocked => job.status.to_string().red(),
        JobStatus::Open => job.status.to_string().yellow(),
    };
    println!("  {}{} [{}]", indent, job.name, status);
}
