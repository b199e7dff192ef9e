// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Worker Loop
//!
//! One [`Worker`] per agent. Workers share nothing but the repository; every
//! cycle re-reads the backlog, so an agent that crashes mid-cycle costs the
//! swarm at most one held lock (reclaimable once its lease expires).
//!
//! # Cycle
//!
//! ```text
//! ScanningProposals ─► ListingJobs ─┬─► Locking ─► Working(job) ─► ScanningProposals
//!                                   │      └─ nothing lockable ─► Idle ─► ScanningProposals
//!                                   └─ empty / nothing actionable, streak > max ─► Terminated
//! ```
//!
//! Cancellation is checked at every state boundary and during the idle
//! backoff.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use formic_core::domain::agent::AgentContext;
use formic_core::domain::config::SwarmConfig;
use formic_core::domain::executor::{JobExecutor, WorkOutcome};
use formic_core::domain::job::{Job, JobId, JobStatus, PheromoneType};
use formic_core::domain::notification::NotificationSink;
use formic_core::domain::oracle::{BlockerOracle, Oracles};
use formic_core::domain::repository::JobRepository;

use crate::application::negotiator::SplitNegotiator;
use crate::application::picker::JobPicker;
use crate::application::resolver::DependencyResolver;
use crate::application::signals::SwarmSignals;
use crate::domain::{PickAction, WorkResult, WorkerExit, WorkerReport, WorkerState};

const LISTED_STATUSES: [JobStatus; 2] = [JobStatus::Open, JobStatus::Blocked];

enum LockAttempt {
    Locked(JobId),
    SplitProposed,
    /// Every actionable candidate was taken by another agent
    Contended,
    /// The picker found nothing actionable
    Nothing,
}

pub struct Worker {
    ctx: AgentContext,
    config: SwarmConfig,
    repository: Arc<dyn JobRepository>,
    picker: JobPicker,
    blocker: Arc<dyn BlockerOracle>,
    executor: Arc<dyn JobExecutor>,
    signals: SwarmSignals,
    cancel: CancellationToken,
    state: WorkerState,
}

impl Worker {
    pub fn new(
        ctx: AgentContext,
        config: SwarmConfig,
        repository: Arc<dyn JobRepository>,
        oracles: Oracles,
        executor: Arc<dyn JobExecutor>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let signals = SwarmSignals::new(repository.clone(), notifier, config.pheromone_intensity);
        let picker = JobPicker::new(
            DependencyResolver::new(repository.clone(), oracles.dependency.clone()),
            SplitNegotiator::new(oracles.complexity.clone(), oracles.approval.clone(), signals.clone()),
            signals.clone(),
        );

        Self {
            ctx,
            config,
            repository,
            picker,
            blocker: oracles.blocker,
            executor,
            signals,
            cancel: CancellationToken::new(),
            state: WorkerState::ListingJobs,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    /// Run cycles until the backlog has nothing left for this agent or the
    /// worker is cancelled.
    pub async fn run(mut self) -> WorkerReport {
        let mut report = WorkerReport {
            agent_name: self.ctx.agent_name.clone(),
            ..WorkerReport::default()
        };
        let mut empty_streak: u32 = 0;

        info!(agent = %self.ctx.agent_name, swarm_id = %self.ctx.swarm_id, "Worker started");

        let exit = loop {
            if self.cancel.is_cancelled() {
                break WorkerExit::Cancelled;
            }
            report.cycles += 1;

            self.transition(WorkerState::ScanningProposals);
            let excluded = self.review_proposals().await;

            self.transition(WorkerState::ListingJobs);
            let listing = self.list_jobs().await;

            let attempt = if listing.is_empty() {
                LockAttempt::Nothing
            } else {
                self.transition(WorkerState::Locking);
                self.lock_next(listing, excluded).await
            };

            match attempt {
                LockAttempt::Locked(job_id) => {
                    empty_streak = 0;
                    if self.cancel.is_cancelled() {
                        self.release(job_id).await;
                        break WorkerExit::Cancelled;
                    }
                    self.transition(WorkerState::Working(job_id));
                    match self.work(job_id).await {
                        WorkResult::Completed => report.jobs_completed += 1,
                        WorkResult::Blocked => report.jobs_blocked += 1,
                        WorkResult::SplitProposed => report.splits_proposed += 1,
                        WorkResult::Incomplete | WorkResult::Failed | WorkResult::Skipped => {}
                    }
                    continue;
                }
                LockAttempt::SplitProposed => {
                    empty_streak = 0;
                    report.splits_proposed += 1;
                    continue;
                }
                LockAttempt::Contended => {
                    empty_streak = 0;
                }
                LockAttempt::Nothing => {
                    empty_streak += 1;
                    debug!(agent = %self.ctx.agent_name, streak = empty_streak, "Nothing actionable");
                    if empty_streak > self.config.max_empty_listings {
                        break WorkerExit::Drained;
                    }
                }
            }

            self.transition(WorkerState::Idle);
            tokio::select! {
                _ = self.cancel.cancelled() => break WorkerExit::Cancelled,
                _ = tokio::time::sleep(self.config.idle_backoff) => {}
            }
        };

        self.transition(WorkerState::Terminated);
        report.exit = Some(exit);
        info!(agent = %self.ctx.agent_name, exit = ?exit, cycles = report.cycles, "Worker stopped");
        self.signals.notify(format!("Worker {}", report)).await;
        report
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(agent = %self.ctx.agent_name, from = %self.state, to = %next, "Worker state change");
        self.state = next;
    }

    async fn review_proposals(&self) -> HashSet<JobId> {
        let open = match self.repository.list_jobs(self.ctx.swarm_id, &[JobStatus::Open]).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(agent = %self.ctx.agent_name, error = %e, "Failed to list jobs for proposal review");
                return HashSet::new();
            }
        };

        let summary = self
            .picker
            .negotiator()
            .review_pending_proposals(&open, &self.ctx)
            .await;
        if !summary.approved.is_empty() || !summary.rejected.is_empty() {
            debug!(
                agent = %self.ctx.agent_name,
                approved = summary.approved.len(),
                rejected = summary.rejected.len(),
                "Reviewed split proposals"
            );
        }
        summary.excluded
    }

    async fn list_jobs(&self) -> Vec<Job> {
        match self.repository.list_jobs(self.ctx.swarm_id, &LISTED_STATUSES).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(agent = %self.ctx.agent_name, error = %e, "Failed to list jobs");
                Vec::new()
            }
        }
    }

    /// Jobs this agent may lock. The rest of the listing stays visible to the
    /// picker as dependency context.
    fn candidates(&self, listing: &[Job], skip: &HashSet<JobId>) -> Vec<Job> {
        let now = Utc::now();
        listing
            .iter()
            .filter(|j| !skip.contains(&j.id))
            .filter(|j| !j.has_pending_proposal())
            .filter(|j| !j.is_locked(self.config.lock_lease, now))
            .cloned()
            .collect()
    }

    /// Pick and lock until a lock sticks or the picker runs dry. A lost race
    /// removes that job for the rest of the pass and re-reads the backlog.
    async fn lock_next(&self, listing: Vec<Job>, mut skip: HashSet<JobId>) -> LockAttempt {
        let mut contended = false;
        let mut listing = Some(listing);

        loop {
            let jobs = match listing.take() {
                Some(jobs) => jobs,
                None => self.list_jobs().await,
            };
            let candidates = self.candidates(&jobs, &skip);
            if candidates.is_empty() {
                break;
            }

            let outcome = self.picker.pick_job(&candidates, &jobs, &self.ctx, &self.config).await;
            let job = match (outcome.action, outcome.job) {
                (PickAction::Implement, Some(job)) => job,
                (PickAction::Split, _) => return LockAttempt::SplitProposed,
                _ => break,
            };

            match self.repository.lock_job(job.id, self.ctx.agent_id, &self.ctx.agent_name).await {
                Ok(true) => {
                    metrics::counter!("formic_jobs_locked_total").increment(1);
                    info!(job_id = %job.id, agent = %self.ctx.agent_name, "Job locked");
                    self.signals
                        .notify(format!("{} locked '{}'", self.ctx.agent_name, job.name))
                        .await;
                    return LockAttempt::Locked(job.id);
                }
                Ok(false) => {
                    metrics::counter!("formic_lock_contention_total").increment(1);
                    debug!(job_id = %job.id, agent = %self.ctx.agent_name, "Lock lost to another agent");
                    contended = true;
                    skip.insert(job.id);
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Lock attempt failed");
                    skip.insert(job.id);
                }
            }
        }

        if contended {
            LockAttempt::Contended
        } else {
            LockAttempt::Nothing
        }
    }

    /// Work a locked job. The lock is released on every path.
    async fn work(&self, job_id: JobId) -> WorkResult {
        let result = match self.repository.get_job(job_id).await {
            Ok(Some(job)) if job.status != JobStatus::Closed => self.work_locked(&job).await,
            Ok(_) => WorkResult::Skipped,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Failed to load locked job");
                WorkResult::Skipped
            }
        };
        self.release(job_id).await;
        result
    }

    async fn work_locked(&self, job: &Job) -> WorkResult {
        if job.is_root() && !job.has_pheromone(PheromoneType::SplitRejected) {
            let negotiator = self.picker.negotiator();
            let split = negotiator.is_job_splittable(job).await;
            if split.splittable {
                negotiator
                    .propose_split(job, split.proposed_jobs, &split.reason, &self.ctx, &self.config)
                    .await;
                return WorkResult::SplitProposed;
            }
        }

        self.signals.deposit(job.id, PheromoneType::Activity, &self.ctx).await;

        match self.blocker.detect_blocker(job).await {
            Ok(verdict) if verdict.has_blocker => {
                info!(job_id = %job.id, reason = %verdict.blocker_reason, "Blocker detected while working");
                self.signals
                    .mark_blocked(job.id, &verdict.blocker_reason, Vec::new(), &self.ctx)
                    .await;
                self.signals
                    .notify(format!(
                        "{} found '{}' blocked: {}",
                        self.ctx.agent_name, job.name, verdict.blocker_reason
                    ))
                    .await;
                return WorkResult::Blocked;
            }
            Ok(_) => {}
            Err(e) => warn!(job_id = %job.id, error = %e, "Blocker oracle failed, proceeding"),
        }

        match self.executor.execute(job, &self.ctx).await {
            Ok(WorkOutcome::Completed) => match self.repository.close_job(job.id).await {
                Ok(()) => {
                    info!(job_id = %job.id, agent = %self.ctx.agent_name, "Job completed");
                    self.signals
                        .notify(format!("{} completed '{}'", self.ctx.agent_name, job.name))
                        .await;
                    WorkResult::Completed
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Failed to close completed job");
                    WorkResult::Failed
                }
            },
            Ok(WorkOutcome::Incomplete) => {
                debug!(job_id = %job.id, "Work incomplete, job stays open");
                WorkResult::Incomplete
            }
            Err(e) => {
                warn!(job_id = %job.id, agent = %self.ctx.agent_name, error = %e, "Job execution failed");
                WorkResult::Failed
            }
        }
    }

    async fn release(&self, job_id: JobId) {
        if let Err(e) = self.repository.unlock_job(job_id, self.ctx.agent_id).await {
            warn!(job_id = %job_id, error = %e, "Failed to release lock");
        }
    }
}
