// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Swarm Supervisor
//!
//! A [`ReasoningEngine`] that answers a request by delegating it to a fixed
//! number of [`Worker`]s running as background agents. The orchestrator
//! control loop keeps waiting while any of them run; the request completes
//! once every worker has reported back.
//!
//! Delegation is recorded as an assistant note in the context. Later steps
//! see the note and never start a second set of workers, whatever events
//! arrive in between.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use formic_core::domain::agent::{AgentContext, SwarmId};
use formic_core::domain::config::SwarmConfig;
use formic_core::domain::events::{BackgroundTask, ExternalEventSource};
use formic_core::domain::executor::JobExecutor;
use formic_core::domain::notification::NotificationSink;
use formic_core::domain::oracle::Oracles;
use formic_core::domain::reasoning::{ContextMessage, MessageRole, ReasoningContext, ReasoningEngine, StepOutcome};
use formic_core::domain::repository::JobRepository;

use crate::application::worker::Worker;

const DELEGATION_NOTE: &str = "Delegated backlog to";

pub struct SwarmSupervisor {
    swarm_id: SwarmId,
    workers: usize,
    config: SwarmConfig,
    repository: Arc<dyn JobRepository>,
    oracles: Oracles,
    executor: Arc<dyn JobExecutor>,
    notifier: Arc<dyn NotificationSink>,
    cancel: CancellationToken,
}

impl SwarmSupervisor {
    pub fn new(
        swarm_id: SwarmId,
        workers: usize,
        config: SwarmConfig,
        repository: Arc<dyn JobRepository>,
        oracles: Oracles,
        executor: Arc<dyn JobExecutor>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            swarm_id,
            workers,
            config,
            repository,
            oracles,
            executor,
            notifier,
            cancel: CancellationToken::new(),
        }
    }

    /// Workers stop at their next state boundary once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn spawn_workers(&self, events: &dyn ExternalEventSource) {
        for n in 1..=self.workers {
            let name = format!("worker-{}", n);
            let worker = Worker::new(
                AgentContext::new(self.swarm_id, name.clone()),
                self.config.clone(),
                self.repository.clone(),
                self.oracles.clone(),
                self.executor.clone(),
                self.notifier.clone(),
            )
            .with_cancellation(self.cancel.child_token());

            let task = BackgroundTask::new(format!("drain backlog of swarm {}", self.swarm_id), async move {
                let report = worker.run().await;
                anyhow::Ok(report.to_string())
            });
            events.create_and_start_thread(task, &name);
        }
        info!(swarm_id = %self.swarm_id, workers = self.workers, "Workers delegated");
    }
}

#[async_trait]
impl ReasoningEngine for SwarmSupervisor {
    async fn assemble_context(&self, user_message: &str) -> anyhow::Result<ReasoningContext> {
        Ok(ReasoningContext::from_user_message(user_message))
    }

    async fn step(&self, mut context: ReasoningContext, events: &dyn ExternalEventSource) -> anyhow::Result<StepOutcome> {
        let delegated = context
            .messages
            .iter()
            .any(|m| m.role == MessageRole::Assistant && m.content.starts_with(DELEGATION_NOTE));

        if !delegated && self.workers > 0 {
            self.spawn_workers(events);
            context.push(ContextMessage::new(
                MessageRole::Assistant,
                format!("{} {} workers in swarm {}", DELEGATION_NOTE, self.workers, self.swarm_id),
            ));
            return Ok(StepOutcome {
                context,
                completed: false,
                delegated: true,
                final_message: String::new(),
            });
        }

        let reports: Vec<&str> = context
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::BackgroundAgent)
            .map(|m| m.content.as_str())
            .collect();

        let final_message = format!("{} of {} workers reported:\n{}", reports.len(), self.workers, reports.join("\n"));
        Ok(StepOutcome {
            context,
            completed: true,
            delegated: false,
            final_message,
        })
    }
}
