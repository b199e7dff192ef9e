// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Best-effort writes of shared swarm state.
//!
//! Pheromones, blockers and dependency edges are advisory. A failed write is
//! logged and the caller carries on; the next agent to read the job simply
//! sees less information.

use std::sync::Arc;

use tracing::warn;

use formic_core::domain::agent::AgentContext;
use formic_core::domain::job::{Blocker, DependencyType, JobId, Pheromone, PheromoneType};
use formic_core::domain::notification::NotificationSink;
use formic_core::domain::repository::JobRepository;

#[derive(Clone)]
pub struct SwarmSignals {
    repository: Arc<dyn JobRepository>,
    notifier: Arc<dyn NotificationSink>,
    intensity: f64,
}

impl SwarmSignals {
    pub fn new(repository: Arc<dyn JobRepository>, notifier: Arc<dyn NotificationSink>, intensity: f64) -> Self {
        Self {
            repository,
            notifier,
            intensity,
        }
    }

    pub fn repository(&self) -> &Arc<dyn JobRepository> {
        &self.repository
    }

    pub async fn deposit(&self, job_id: JobId, pheromone_type: PheromoneType, ctx: &AgentContext) {
        let pheromone = Pheromone::new(pheromone_type, self.intensity, ctx);
        if let Err(e) = self.repository.deposit_pheromone(job_id, pheromone).await {
            warn!(job_id = %job_id, pheromone = %pheromone_type, error = %e, "Failed to deposit pheromone");
        }
    }

    pub async fn record_blocker(&self, job_id: JobId, text: &str, blocking_ids: Vec<JobId>, ctx: &AgentContext) {
        let blocker = Blocker::new(text, ctx, blocking_ids);
        if let Err(e) = self.repository.add_blocker(job_id, blocker).await {
            warn!(job_id = %job_id, error = %e, "Failed to record blocker");
        }
    }

    /// Add one "blocks" edge per target.
    pub async fn add_dependencies(&self, job_id: JobId, targets: &[JobId]) {
        for target in targets {
            if let Err(e) = self
                .repository
                .add_dependency(job_id, *target, DependencyType::Blocks)
                .await
            {
                warn!(job_id = %job_id, target = %target, error = %e, "Failed to add dependency");
            }
        }
    }

    /// Mark a job blocked in one go: IS_BLOCKED pheromone plus a blocker
    /// entry listing `blocking_ids`.
    pub async fn mark_blocked(&self, job_id: JobId, text: &str, blocking_ids: Vec<JobId>, ctx: &AgentContext) {
        self.deposit(job_id, PheromoneType::IsBlocked, ctx).await;
        self.record_blocker(job_id, text, blocking_ids, ctx).await;
        metrics::counter!("formic_jobs_blocked_total").increment(1);
    }

    pub async fn notify(&self, text: impl AsRef<str>) {
        self.notifier.send_message(text.as_ref()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use formic_core::domain::agent::SwarmId;
    use formic_core::domain::job::{Job, JobStatus};
    use formic_core::infrastructure::InMemoryJobRepository;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send_message(&self, text: &str) {
            self.messages.lock().push(text.to_string());
        }
    }

    #[tokio::test]
    async fn test_mark_blocked_sets_pheromone_and_status() {
        let ctx = AgentContext::new(SwarmId::new(), "ant-1");
        let job = Job::new(ctx.swarm_id, "j", "");
        let repo = Arc::new(InMemoryJobRepository::new().with_jobs([job.clone()]));
        let sink = Arc::new(RecordingSink::default());
        let signals = SwarmSignals::new(repo.clone(), sink.clone(), 1.0);

        signals.mark_blocked(job.id, "waiting", vec![], &ctx).await;
        signals.notify("blocked j").await;

        let stored = repo.get_job(job.id).await.unwrap().unwrap();
        assert!(stored.has_pheromone(PheromoneType::IsBlocked));
        assert_eq!(stored.status, JobStatus::Blocked);
        assert_eq!(stored.blockers[0].added_by_name, "ant-1");
        assert_eq!(sink.messages.lock().as_slice(), ["blocked j"]);
    }

    #[tokio::test]
    async fn test_writes_to_missing_job_are_swallowed() {
        let ctx = AgentContext::new(SwarmId::new(), "ant-1");
        let repo = Arc::new(InMemoryJobRepository::new());
        let signals = SwarmSignals::new(repo, Arc::new(RecordingSink::default()), 1.0);

        let missing = JobId::new();
        signals.deposit(missing, PheromoneType::Activity, &ctx).await;
        signals.add_dependencies(missing, &[JobId::new()]).await;
    }
}
