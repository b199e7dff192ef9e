// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Job Picker
//!
//! Chooses the next job for an agent from a listing and says what to do with
//! it. Picking has side effects: jobs found blocked along the way are marked
//! blocked, and a job judged too large gets a split proposal before it is
//! returned.
//!
//! The agent hands over two views of the backlog: the candidates it could
//! lock right now, and every job that is not closed. Only candidates are
//! picked. The dependency oracle judges a candidate against the full backlog,
//! so a job being worked by another agent, or itself blocked, still holds
//! back the jobs that need it.
//!
//! # Selection order
//!
//! 1. Drop jobs that are not open or that another agent flagged
//!    (`SPLIT_THIS_JOB`, `IS_BLOCKED`).
//! 2. For each remaining job, in listing order:
//!    - unresolved recorded dependencies: mark blocked, skip
//!    - dependency oracle names a blocker: mark blocked, record edges, skip
//!    - root job the complexity oracle wants split: propose, return `Split`
//!    - otherwise return `Implement`
//! 3. Second pass: an `IS_BLOCKED` job whose recorded dependencies have all
//!    closed is reopened and returned as `Implement`.
//! 4. `Terminate`.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use formic_core::domain::agent::AgentContext;
use formic_core::domain::config::SwarmConfig;
use formic_core::domain::job::{Job, JobId, JobStatus, PheromoneType};

use crate::application::negotiator::SplitNegotiator;
use crate::application::resolver::DependencyResolver;
use crate::application::signals::SwarmSignals;
use crate::domain::PickOutcome;

pub struct JobPicker {
    resolver: DependencyResolver,
    negotiator: SplitNegotiator,
    signals: SwarmSignals,
}

impl JobPicker {
    pub fn new(resolver: DependencyResolver, negotiator: SplitNegotiator, signals: SwarmSignals) -> Self {
        Self {
            resolver,
            negotiator,
            signals,
        }
    }

    pub fn negotiator(&self) -> &SplitNegotiator {
        &self.negotiator
    }

    pub async fn pick_job(
        &self,
        candidates: &[Job],
        backlog: &[Job],
        ctx: &AgentContext,
        config: &SwarmConfig,
    ) -> PickOutcome {
        let outcome = self.select(candidates, backlog, ctx, config).await;
        metrics::counter!("formic_jobs_picked_total", "action" => outcome.action.as_str()).increment(1);
        if let Some(job) = &outcome.job {
            debug!(job_id = %job.id, action = outcome.action.as_str(), agent = %ctx.agent_name, "Picked job");
        }
        outcome
    }

    async fn select(&self, jobs: &[Job], backlog: &[Job], ctx: &AgentContext, config: &SwarmConfig) -> PickOutcome {
        let unfinished: Vec<Job> = backlog.iter().filter(|j| j.status != JobStatus::Closed).cloned().collect();
        let mut blocked_now: HashSet<JobId> = HashSet::new();

        for job in jobs.iter().filter(|j| j.status == JobStatus::Open && !j.is_flagged()) {
            let check = self.resolver.check_dependencies_resolved(job).await;
            if !check.resolved {
                let text = format!("Waiting on {} unfinished dependencies", check.unresolved_deps.len());
                self.block(job, &text, check.unresolved_deps, ctx).await;
                blocked_now.insert(job.id);
                continue;
            }

            let analysis = self.resolver.analyze_job_dependencies(job, &unfinished).await;
            if analysis.has_blocker {
                self.signals.add_dependencies(job.id, &analysis.blocking_job_ids).await;
                self.block(job, &analysis.reason, analysis.blocking_job_ids, ctx).await;
                blocked_now.insert(job.id);
                continue;
            }

            if job.is_root() && !job.has_pheromone(PheromoneType::SplitRejected) {
                let split = self.negotiator.is_job_splittable(job).await;
                if split.splittable {
                    self.negotiator
                        .propose_split(job, split.proposed_jobs, &split.reason, ctx, config)
                        .await;
                    return PickOutcome::split(job.clone());
                }
            }

            return PickOutcome::implement(job.clone());
        }

        if let Some(job) = self.unblock_resolved(jobs, &blocked_now).await {
            return PickOutcome::implement(job);
        }

        PickOutcome::terminate()
    }

    /// Find a job blocked only on recorded dependencies that have since
    /// closed and reopen it. Jobs blocked for reasons outside the swarm
    /// carry no dependency edges and stay blocked.
    async fn unblock_resolved(&self, jobs: &[Job], blocked_now: &HashSet<JobId>) -> Option<Job> {
        let revivable = jobs.iter().filter(|j| {
            j.status != JobStatus::Closed
                && j.has_pheromone(PheromoneType::IsBlocked)
                && !j.awaiting_split()
                && !blocked_now.contains(&j.id)
                && j.blocking_dependencies().next().is_some()
        });

        for job in revivable {
            if !self.resolver.check_dependencies_resolved(job).await.resolved {
                continue;
            }

            if job.status == JobStatus::Blocked {
                if let Err(e) = self.signals.repository().update_job_status(job.id, JobStatus::Open).await {
                    warn!(job_id = %job.id, error = %e, "Failed to reopen unblocked job");
                }
            }
            info!(job_id = %job.id, "Dependencies closed, job unblocked");
            self.signals.notify(format!("'{}' is no longer blocked", job.name)).await;

            let mut job = job.clone();
            job.status = JobStatus::Open;
            return Some(job);
        }

        None
    }

    async fn block(&self, job: &Job, text: &str, blocking_ids: Vec<JobId>, ctx: &AgentContext) {
        info!(job_id = %job.id, blockers = blocking_ids.len(), reason = text, "Job blocked");
        self.signals.mark_blocked(job.id, text, blocking_ids, ctx).await;
        self.signals
            .notify(format!("{} marked '{}' blocked: {}", ctx.agent_name, job.name, text))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PickAction;
    use async_trait::async_trait;
    use formic_core::domain::agent::SwarmId;
    use formic_core::domain::notification::NotificationSink;
    use formic_core::domain::repository::JobRepository;
    use formic_core::infrastructure::{InMemoryJobRepository, RuleOracle};
    use std::sync::Arc;

    struct Silent;

    #[async_trait]
    impl NotificationSink for Silent {
        async fn send_message(&self, _text: &str) {}
    }

    fn picker(repo: Arc<InMemoryJobRepository>) -> JobPicker {
        let oracle = Arc::new(RuleOracle::new());
        let signals = SwarmSignals::new(repo.clone(), Arc::new(Silent), 1.0);
        JobPicker::new(
            DependencyResolver::new(repo, oracle.clone()),
            SplitNegotiator::new(oracle.clone(), oracle, signals.clone()),
            signals,
        )
    }

    async fn listing(repo: &InMemoryJobRepository, swarm: SwarmId) -> Vec<Job> {
        repo.list_jobs(swarm, &[JobStatus::Open, JobStatus::Blocked]).await.unwrap()
    }

    #[tokio::test]
    async fn test_picks_first_plain_job_to_implement() {
        let ctx = AgentContext::new(SwarmId::new(), "ant-1");
        let j1 = Job::new(ctx.swarm_id, "first", "write the parser");
        let j2 = Job::new(ctx.swarm_id, "second", "");
        let repo = Arc::new(InMemoryJobRepository::new().with_jobs([j1.clone(), j2]));

        let jobs = listing(&repo, ctx.swarm_id).await;
        let outcome = picker(repo).pick_job(&jobs, &jobs, &ctx, &SwarmConfig::default()).await;

        assert_eq!(outcome.action, PickAction::Implement);
        assert_eq!(outcome.job.unwrap().id, j1.id);
    }

    #[tokio::test]
    async fn test_unresolved_dependency_never_implemented() {
        let ctx = AgentContext::new(SwarmId::new(), "ant-1");
        let j2 = Job::new(ctx.swarm_id, "j2", "");
        let j1 = Job::new(ctx.swarm_id, "j1", "").with_dependency(j2.id);
        let repo = Arc::new(InMemoryJobRepository::new().with_jobs([j1.clone(), j2.clone()]));

        let jobs = listing(&repo, ctx.swarm_id).await;
        let outcome = picker(repo.clone()).pick_job(&jobs, &jobs, &ctx, &SwarmConfig::default()).await;

        assert_eq!(outcome.job.unwrap().id, j2.id);
        let blocked = repo.get_job(j1.id).await.unwrap().unwrap();
        assert!(blocked.has_pheromone(PheromoneType::IsBlocked));
        assert_eq!(blocked.status, JobStatus::Blocked);
        assert_eq!(blocked.blockers[0].blocker_job_ids, vec![j2.id]);
    }

    #[tokio::test]
    async fn test_oracle_blocker_records_dependency_edge() {
        let ctx = AgentContext::new(SwarmId::new(), "ant-1");
        let j1 = Job::new(ctx.swarm_id, "frontend", "needs: api");
        let j2 = Job::new(ctx.swarm_id, "api", "");
        let repo = Arc::new(InMemoryJobRepository::new().with_jobs([j1.clone(), j2.clone()]));

        let jobs = listing(&repo, ctx.swarm_id).await;
        let outcome = picker(repo.clone()).pick_job(&jobs, &jobs, &ctx, &SwarmConfig::default()).await;

        assert_eq!(outcome.job.unwrap().id, j2.id);
        let blocked = repo.get_job(j1.id).await.unwrap().unwrap();
        assert!(blocked.has_pheromone(PheromoneType::IsBlocked));
        assert_eq!(blocked.dependencies.len(), 1);
        assert_eq!(blocked.dependencies[0].target_job_id, j2.id);
    }

    #[tokio::test]
    async fn test_dependency_outside_candidates_still_blocks() {
        let ctx = AgentContext::new(SwarmId::new(), "ant-1");
        let frontend = Job::new(ctx.swarm_id, "frontend", "needs: api");
        let api = Job::new(ctx.swarm_id, "api", "");
        let repo = Arc::new(InMemoryJobRepository::new().with_jobs([frontend.clone(), api.clone()]));

        let backlog = listing(&repo, ctx.swarm_id).await;
        let candidates: Vec<Job> = backlog.iter().filter(|j| j.id != api.id).cloned().collect();
        let outcome = picker(repo.clone())
            .pick_job(&candidates, &backlog, &ctx, &SwarmConfig::default())
            .await;

        assert!(outcome.is_terminate());
        let blocked = repo.get_job(frontend.id).await.unwrap().unwrap();
        assert_eq!(blocked.status, JobStatus::Blocked);
        assert_eq!(blocked.dependencies[0].target_job_id, api.id);
    }

    #[tokio::test]
    async fn test_flagged_jobs_only_yield_terminate() {
        let ctx = AgentContext::new(SwarmId::new(), "ant-1");
        let mut j1 = Job::new(ctx.swarm_id, "j1", "");
        j1.pheromones
            .push(formic_core::domain::job::Pheromone::new(PheromoneType::IsBlocked, 1.0, &ctx));
        let repo = Arc::new(InMemoryJobRepository::new().with_jobs([j1]));

        let jobs = listing(&repo, ctx.swarm_id).await;
        let outcome = picker(repo).pick_job(&jobs, &jobs, &ctx, &SwarmConfig::default()).await;

        assert!(outcome.is_terminate());
        assert!(outcome.job.is_none());
    }

    #[tokio::test]
    async fn test_split_returned_and_accepted_in_same_pick() {
        let ctx = AgentContext::new(SwarmId::new(), "ant-1");
        let big = Job::new(ctx.swarm_id, "release", "- changelog\n- tag\n- publish");
        let repo = Arc::new(InMemoryJobRepository::new().with_jobs([big.clone()]));

        let jobs = listing(&repo, ctx.swarm_id).await;
        let outcome = picker(repo.clone()).pick_job(&jobs, &jobs, &ctx, &SwarmConfig::default()).await;

        assert_eq!(outcome.action, PickAction::Split);
        let children: Vec<Job> = repo
            .all_jobs()
            .into_iter()
            .filter(|j| j.parent_job_id == Some(big.id))
            .collect();
        assert_eq!(children.len(), 3);
    }

    #[tokio::test]
    async fn test_second_pass_reopens_job_once_dependency_closes() {
        let ctx = AgentContext::new(SwarmId::new(), "ant-1");
        let j2 = Job::new(ctx.swarm_id, "j2", "");
        let j1 = Job::new(ctx.swarm_id, "j1", "").with_dependency(j2.id);
        let repo = Arc::new(InMemoryJobRepository::new().with_jobs([j1.clone(), j2.clone()]));
        let picker = picker(repo.clone());

        let jobs = listing(&repo, ctx.swarm_id).await;
        picker.pick_job(&jobs, &jobs, &ctx, &SwarmConfig::default()).await;
        repo.close_job(j2.id).await.unwrap();

        let jobs = listing(&repo, ctx.swarm_id).await;
        let outcome = picker.pick_job(&jobs, &jobs, &ctx, &SwarmConfig::default()).await;

        assert_eq!(outcome.action, PickAction::Implement);
        assert_eq!(outcome.job.unwrap().id, j1.id);
        let reopened = repo.get_job(j1.id).await.unwrap().unwrap();
        assert_eq!(reopened.status, JobStatus::Open);
    }

    #[tokio::test]
    async fn test_externally_blocked_job_stays_blocked() {
        let ctx = AgentContext::new(SwarmId::new(), "ant-1");
        let j1 = Job::new(ctx.swarm_id, "j1", "");
        let repo = Arc::new(InMemoryJobRepository::new().with_jobs([j1.clone()]));
        let signals = SwarmSignals::new(repo.clone(), Arc::new(Silent), 1.0);
        signals.mark_blocked(j1.id, "waiting on vendor", vec![], &ctx).await;

        let jobs = listing(&repo, ctx.swarm_id).await;
        let outcome = picker(repo).pick_job(&jobs, &jobs, &ctx, &SwarmConfig::default()).await;
        assert!(outcome.is_terminate());
    }
}
