// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use formic_core::application::ControlLoop;
use formic_core::domain::agent::{AgentContext, SwarmId};
use formic_core::domain::config::SwarmConfig;
use formic_core::domain::events::ExternalEventSource;
use formic_core::domain::executor::{JobExecutor, WorkOutcome};
use formic_core::domain::job::{Job, JobStatus};
use formic_core::domain::oracle::Oracles;
use formic_core::infrastructure::{AgentEventBus, InMemoryJobRepository, RuleOracle, TracingNotifier};
use formic_swarm::SwarmSupervisor;

struct InstantExecutor;

#[async_trait]
impl JobExecutor for InstantExecutor {
    async fn execute(&self, _job: &Job, _ctx: &AgentContext) -> anyhow::Result<WorkOutcome> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(WorkOutcome::Completed)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_control_loop_waits_for_every_worker() {
    let swarm = SwarmId::new();
    let jobs = vec![
        Job::new(swarm, "api", ""),
        Job::new(swarm, "frontend", "needs: api"),
        Job::new(swarm, "docs", "- guide\n- reference"),
        Job::new(swarm, "ci", ""),
    ];
    let repo = Arc::new(InMemoryJobRepository::new().with_jobs(jobs));
    let config = SwarmConfig {
        idle_backoff: Duration::from_millis(20),
        ..SwarmConfig::default()
    };
    let bus = Arc::new(AgentEventBus::new());

    let supervisor = SwarmSupervisor::new(
        swarm,
        3,
        config.clone(),
        repo.clone(),
        Oracles::uniform(Arc::new(RuleOracle::new())),
        Arc::new(InstantExecutor),
        Arc::new(TracingNotifier),
    );
    let control = ControlLoop::new(Arc::new(supervisor), bus.clone(), config.orchestrator.clone());

    let summary = control.process_one_request("drain the backlog").await.unwrap();

    assert!(summary.starts_with("3 of 3 workers reported"));
    assert!(summary.contains("worker-1"));
    assert_eq!(bus.running_agent_count(), 0);
    assert_eq!(bus.pending_external_event_count(), 0);

    let open: Vec<String> = repo
        .all_jobs()
        .into_iter()
        .filter(|j| j.status != JobStatus::Closed)
        .map(|j| j.name)
        .collect();
    assert_eq!(open, vec!["docs".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_agent_message_ahead_of_reports_keeps_one_set_of_workers() {
    let swarm = SwarmId::new();
    let jobs: Vec<Job> = (0..4).map(|i| Job::new(swarm, format!("job-{}", i), "")).collect();
    let repo = Arc::new(InMemoryJobRepository::new().with_jobs(jobs));
    let config = SwarmConfig {
        idle_backoff: Duration::from_millis(20),
        ..SwarmConfig::default()
    };
    let bus = Arc::new(AgentEventBus::new());
    bus.post_agent_message("scout", None, "backlog looks small");

    let supervisor = SwarmSupervisor::new(
        swarm,
        2,
        config.clone(),
        repo.clone(),
        Oracles::uniform(Arc::new(RuleOracle::new())),
        Arc::new(InstantExecutor),
        Arc::new(TracingNotifier),
    );
    let control = ControlLoop::new(Arc::new(supervisor), bus.clone(), config.orchestrator.clone());

    let summary = control.process_one_request("drain the backlog").await.unwrap();

    assert!(summary.starts_with("2 of 2 workers reported"), "{}", summary);
    assert_eq!(summary.matches("Background agent 'worker-").count(), 2);
    assert_eq!(bus.running_agent_count(), 0);
    assert!(repo.all_jobs().iter().all(|j| j.status == JobStatus::Closed));
}

#[tokio::test]
async fn test_zero_workers_completes_immediately() {
    let swarm = SwarmId::new();
    let repo = Arc::new(InMemoryJobRepository::new());
    let config = SwarmConfig::default();
    let supervisor = SwarmSupervisor::new(
        swarm,
        0,
        config.clone(),
        repo,
        Oracles::uniform(Arc::new(RuleOracle::new())),
        Arc::new(InstantExecutor),
        Arc::new(TracingNotifier),
    );
    let control = ControlLoop::new(Arc::new(supervisor), Arc::new(AgentEventBus::new()), config.orchestrator);

    let summary = control.process_one_request("nothing to do").await.unwrap();
    assert!(summary.starts_with("0 of 0 workers reported"));
}
