// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! In-memory implementation of the domain [`JobRepository`], used for
//! development, tests and the single-process `formic swarm run` mode.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve `Job` aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! All state sits behind one mutex, so [`JobRepository::lock_job`] is a true
//! compare-and-set: the check for an active lock and the write of the new
//! lock happen under the same guard.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::agent::{AgentId, SwarmId};
use crate::domain::job::{
    Blocker, DependencyType, Job, JobDependency, JobId, JobLock, JobStatus, Pheromone, ProposalId, ProposalStatus,
    SplitProposal, SplitProposalDraft,
};
use crate::domain::repository::{JobRepository, RepositoryError};

#[derive(Default)]
struct JobStore {
    jobs: HashMap<JobId, Job>,
    /// Insertion order, so listings are stable across calls
    order: Vec<JobId>,
}

impl JobStore {
    fn insert(&mut self, job: Job) {
        if !self.jobs.contains_key(&job.id) {
            self.order.push(job.id);
        }
        self.jobs.insert(job.id, job);
    }

    fn get_mut(&mut self, id: JobId) -> Result<&mut Job, RepositoryError> {
        self.jobs.get_mut(&id).ok_or(RepositoryError::JobNotFound(id))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryJobRepository {
    store: Arc<Mutex<JobStore>>,
    lock_lease: Option<Duration>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks older than `lease` are treated as abandoned and may be taken over.
    pub fn with_lock_lease(mut self, lease: Option<Duration>) -> Self {
        self.lock_lease = lease;
        self
    }

    /// Seed the repository with existing jobs.
    pub fn with_jobs(self, jobs: impl IntoIterator<Item = Job>) -> Self {
        {
            let mut store = self.store.lock();
            for job in jobs {
                store.insert(job);
            }
        }
        self
    }

    /// Snapshot of every job in insertion order.
    pub fn all_jobs(&self) -> Vec<Job> {
        let store = self.store.lock();
        store.order.iter().filter_map(|id| store.jobs.get(id).cloned()).collect()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn get_job(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.store.lock().jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, swarm_id: SwarmId, statuses: &[JobStatus]) -> Result<Vec<Job>, RepositoryError> {
        let store = self.store.lock();
        Ok(store
            .order
            .iter()
            .filter_map(|id| store.jobs.get(id))
            .filter(|job| job.swarm_id == swarm_id && statuses.contains(&job.status))
            .cloned()
            .collect())
    }

    async fn create_job(&self, job: Job) -> Result<Job, RepositoryError> {
        self.store.lock().insert(job.clone());
        Ok(job)
    }

    async fn lock_job(&self, id: JobId, agent_id: AgentId, agent_name: &str) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        let mut store = self.store.lock();
        let job = store.get_mut(id)?;

        if job.status == JobStatus::Closed {
            return Ok(false);
        }

        if let Some(existing) = &job.lock {
            if !existing.is_expired(self.lock_lease, now) {
                return Ok(existing.holder_agent_id == agent_id);
            }
            debug!(
                job_id = %id,
                previous_holder = %existing.holder_agent_name,
                "Taking over expired lock"
            );
        }

        job.lock = Some(JobLock {
            holder_agent_id: agent_id,
            holder_agent_name: agent_name.to_string(),
            acquired_at: now,
        });
        job.updated_at = now;
        Ok(true)
    }

    async fn unlock_job(&self, id: JobId, agent_id: AgentId) -> Result<(), RepositoryError> {
        let mut store = self.store.lock();
        let job = store.get_mut(id)?;
        match &job.lock {
            None => Ok(()),
            Some(lock) if lock.holder_agent_id == agent_id => {
                job.lock = None;
                job.updated_at = Utc::now();
                Ok(())
            }
            Some(_) => Err(RepositoryError::LockNotHeld { job_id: id, agent_id }),
        }
    }

    async fn add_dependency(&self, id: JobId, target: JobId, dependency_type: DependencyType) -> Result<(), RepositoryError> {
        let mut store = self.store.lock();
        let job = store.get_mut(id)?;
        let dependency = JobDependency {
            target_job_id: target,
            dependency_type,
        };
        if !job.dependencies.contains(&dependency) {
            job.dependencies.push(dependency);
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn add_blocker(&self, id: JobId, blocker: Blocker) -> Result<(), RepositoryError> {
        let mut store = self.store.lock();
        let job = store.get_mut(id)?;
        job.blockers.push(blocker);
        if job.status == JobStatus::Open {
            job.status = JobStatus::Blocked;
        }
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn deposit_pheromone(&self, id: JobId, pheromone: Pheromone) -> Result<(), RepositoryError> {
        let mut store = self.store.lock();
        let job = store.get_mut(id)?;
        job.pheromones.push(pheromone);
        Ok(())
    }

    async fn add_split_proposal(&self, id: JobId, draft: SplitProposalDraft) -> Result<SplitProposal, RepositoryError> {
        let mut store = self.store.lock();
        let job = store.get_mut(id)?;
        let proposal = draft.into_proposal();
        job.split_proposals.push(proposal.clone());
        job.updated_at = Utc::now();
        Ok(proposal)
    }

    async fn accept_split_proposal(&self, id: JobId, proposal_id: ProposalId) -> Result<Vec<Job>, RepositoryError> {
        let mut store = self.store.lock();
        let job = store.get_mut(id)?;
        let proposal = job
            .split_proposals
            .iter_mut()
            .find(|p| p.id == proposal_id)
            .ok_or(RepositoryError::ProposalNotFound { job_id: id, proposal_id })?;

        if proposal.status == ProposalStatus::Accepted {
            return Ok(Vec::new());
        }
        proposal.status = ProposalStatus::Accepted;
        let proposed = proposal.proposed_jobs.clone();
        job.updated_at = Utc::now();

        let parent = job.clone();
        let children: Vec<Job> = proposed.iter().map(|p| Job::child_of(&parent, p)).collect();
        for child in &children {
            store.insert(child.clone());
        }
        Ok(children)
    }

    async fn delete_split_proposal(&self, id: JobId, proposal_id: ProposalId) -> Result<(), RepositoryError> {
        let mut store = self.store.lock();
        let job = store.get_mut(id)?;
        let before = job.split_proposals.len();
        job.split_proposals.retain(|p| p.id != proposal_id);
        if job.split_proposals.len() == before {
            return Err(RepositoryError::ProposalNotFound { job_id: id, proposal_id });
        }
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn update_job_status(&self, id: JobId, status: JobStatus) -> Result<(), RepositoryError> {
        let mut store = self.store.lock();
        let job = store.get_mut(id)?;
        job.status = status;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn close_job(&self, id: JobId) -> Result<(), RepositoryError> {
        let mut store = self.store.lock();
        let job = store.get_mut(id)?;
        job.status = JobStatus::Closed;
        job.lock = None;
        job.updated_at = Utc::now();
        Ok(())
    }
}
