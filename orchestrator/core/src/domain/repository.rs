// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Job Repository Interface
//!
//! Persistence contract for the [`Job`] aggregate, following the DDD
//! Repository pattern: the trait lives in the domain layer and is implemented
//! in `crate::infrastructure::repositories`.
//!
//! Every mutating call is independent; there are no cross-call transactions.
//! A crash between, say, accepting a proposal and depositing the matching
//! pheromone leaves partial state behind, which the swarm tolerates because
//! pheromones are advisory.
//!
//! [`JobRepository::lock_job`] is the only mutual-exclusion primitive in the
//! system and must be an atomic compare-and-set.

use async_trait::async_trait;

use crate::domain::agent::{AgentId, SwarmId};
use crate::domain::job::{
    Blocker, DependencyType, Job, JobId, JobStatus, Pheromone, ProposalId, SplitProposal, SplitProposalDraft,
};

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Find job by ID
    async fn get_job(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;

    /// List jobs of a swarm whose status is one of `statuses`, in creation order
    async fn list_jobs(&self, swarm_id: SwarmId, statuses: &[JobStatus]) -> Result<Vec<Job>, RepositoryError>;

    /// Insert a new job
    async fn create_job(&self, job: Job) -> Result<Job, RepositoryError>;

    /// Atomically claim the job. Returns `Ok(false)` when another agent holds
    /// an active lock; contention is not an error.
    async fn lock_job(&self, id: JobId, agent_id: AgentId, agent_name: &str) -> Result<bool, RepositoryError>;

    /// Release a lock held by `agent_id`
    async fn unlock_job(&self, id: JobId, agent_id: AgentId) -> Result<(), RepositoryError>;

    async fn add_dependency(&self, id: JobId, target: JobId, dependency_type: DependencyType) -> Result<(), RepositoryError>;

    /// Record a blocker; the job's status becomes `Blocked`
    async fn add_blocker(&self, id: JobId, blocker: Blocker) -> Result<(), RepositoryError>;

    /// Append a pheromone. Existing entries are never touched.
    async fn deposit_pheromone(&self, id: JobId, pheromone: Pheromone) -> Result<(), RepositoryError>;

    async fn add_split_proposal(&self, id: JobId, draft: SplitProposalDraft) -> Result<SplitProposal, RepositoryError>;

    /// Mark the proposal accepted and materialize one child job per proposed
    /// entry. Returns the created children.
    async fn accept_split_proposal(&self, id: JobId, proposal_id: ProposalId) -> Result<Vec<Job>, RepositoryError>;

    async fn delete_split_proposal(&self, id: JobId, proposal_id: ProposalId) -> Result<(), RepositoryError>;

    async fn update_job_status(&self, id: JobId, status: JobStatus) -> Result<(), RepositoryError>;

    /// Close the job and drop any lock on it
    async fn close_job(&self, id: JobId) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Split proposal {proposal_id} not found on job {job_id}")]
    ProposalNotFound { job_id: JobId, proposal_id: ProposalId },

    #[error("Agent {agent_id} does not hold the lock on job {job_id}")]
    LockNotHeld { job_id: JobId, agent_id: AgentId },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
