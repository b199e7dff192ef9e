// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Job Aggregate
//!
//! A [`Job`] is one unit of backlog work shared by every agent in a swarm.
//! Agents never talk to each other directly; they coordinate by reading and
//! appending to the state carried on each job:
//!
//! - [`Pheromone`]: append-only advisory markers (stigmergy).
//! - [`Blocker`]: why the job cannot proceed, and which jobs it waits on.
//! - [`SplitProposal`]: a suggested decomposition into child jobs.
//! - [`JobLock`]: the single active claim an agent holds while working.
//!
//! ## Invariants
//!
//! - A job carrying `SPLIT_THIS_JOB` or `IS_BLOCKED` is excluded from normal
//!   selection. A `split-rejected` deposited after `SPLIT_THIS_JOB` lifts the
//!   split request.
//! - Only root jobs (`parent_job_id == None`) are split-eligible.
//! - A job holds at most one active lock.
//! - The pheromone list only grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::agent::{AgentContext, AgentId, SwarmId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub Uuid);

impl ProposalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Open,
    Blocked,
    Closed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Open => "open",
            JobStatus::Blocked => "blocked",
            JobStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    /// The target job must be closed before the dependent job may start.
    Blocks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDependency {
    pub target_job_id: JobId,
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
}

impl JobDependency {
    pub fn blocks(target_job_id: JobId) -> Self {
        Self {
            target_job_id,
            dependency_type: DependencyType::Blocks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocker {
    pub text: String,
    pub added_by: AgentId,
    pub added_by_name: String,
    #[serde(default)]
    pub blocker_job_ids: Vec<JobId>,
}

impl Blocker {
    pub fn new(text: impl Into<String>, ctx: &AgentContext, blocker_job_ids: Vec<JobId>) -> Self {
        Self {
            text: text.into(),
            added_by: ctx.agent_id,
            added_by_name: ctx.agent_name.clone(),
            blocker_job_ids,
        }
    }
}

/// Marker kinds an agent may leave on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PheromoneType {
    #[serde(rename = "SPLIT_THIS_JOB")]
    SplitThisJob,
    #[serde(rename = "IS_BLOCKED")]
    IsBlocked,
    #[serde(rename = "activity")]
    Activity,
    #[serde(rename = "split-approved")]
    SplitApproved,
    #[serde(rename = "split-rejected")]
    SplitRejected,
}

impl fmt::Display for PheromoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PheromoneType::SplitThisJob => "SPLIT_THIS_JOB",
            PheromoneType::IsBlocked => "IS_BLOCKED",
            PheromoneType::Activity => "activity",
            PheromoneType::SplitApproved => "split-approved",
            PheromoneType::SplitRejected => "split-rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pheromone {
    #[serde(rename = "type")]
    pub pheromone_type: PheromoneType,
    pub intensity: f64,
    pub deposited_by: AgentId,
    pub deposited_by_name: String,
    pub deposited_at: DateTime<Utc>,
}

impl Pheromone {
    pub fn new(pheromone_type: PheromoneType, intensity: f64, ctx: &AgentContext) -> Self {
        Self {
            pheromone_type,
            intensity,
            deposited_by: ctx.agent_id,
            deposited_by_name: ctx.agent_name.clone(),
            deposited_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedJob {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl ProposedJob {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitProposal {
    pub id: ProposalId,
    pub description: String,
    pub proposed_jobs: Vec<ProposedJob>,
    pub proposed_by: AgentId,
    pub proposed_by_name: String,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for [`crate::domain::repository::JobRepository::add_split_proposal`].
/// The repository assigns the id, status and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitProposalDraft {
    pub description: String,
    pub proposed_jobs: Vec<ProposedJob>,
    pub proposed_by: AgentId,
    pub proposed_by_name: String,
}

impl SplitProposalDraft {
    pub fn new(description: impl Into<String>, proposed_jobs: Vec<ProposedJob>, ctx: &AgentContext) -> Self {
        Self {
            description: description.into(),
            proposed_jobs,
            proposed_by: ctx.agent_id,
            proposed_by_name: ctx.agent_name.clone(),
        }
    }

    pub fn into_proposal(self) -> SplitProposal {
        SplitProposal {
            id: ProposalId::new(),
            description: self.description,
            proposed_jobs: self.proposed_jobs,
            proposed_by: self.proposed_by,
            proposed_by_name: self.proposed_by_name,
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLock {
    pub holder_agent_id: AgentId,
    pub holder_agent_name: String,
    pub acquired_at: DateTime<Utc>,
}

impl JobLock {
    /// A lock with no lease never expires.
    pub fn is_expired(&self, lease: Option<Duration>, now: DateTime<Utc>) -> bool {
        match lease.and_then(|l| chrono::Duration::from_std(l).ok()) {
            Some(lease) => self.acquired_at + lease <= now,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub swarm_id: SwarmId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: JobStatus,
    #[serde(default)]
    pub parent_job_id: Option<JobId>,
    #[serde(default)]
    pub dependencies: Vec<JobDependency>,
    #[serde(default)]
    pub blockers: Vec<Blocker>,
    #[serde(default)]
    pub split_proposals: Vec<SplitProposal>,
    #[serde(default)]
    pub pheromones: Vec<Pheromone>,
    #[serde(default)]
    pub lock: Option<JobLock>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(swarm_id: SwarmId, name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            swarm_id,
            name: name.into(),
            description: description.into(),
            status: JobStatus::Open,
            parent_job_id: None,
            dependencies: Vec::new(),
            blockers: Vec::new(),
            split_proposals: Vec::new(),
            pheromones: Vec::new(),
            lock: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Materialize a child job from an accepted proposal entry.
    pub fn child_of(parent: &Job, proposed: &ProposedJob) -> Self {
        let mut child = Self::new(parent.swarm_id, proposed.name.clone(), proposed.description.clone());
        child.parent_job_id = Some(parent.id);
        child
    }

    pub fn with_dependency(mut self, target: JobId) -> Self {
        self.dependencies.push(JobDependency::blocks(target));
        self
    }

    pub fn with_parent(mut self, parent: JobId) -> Self {
        self.parent_job_id = Some(parent);
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_job_id.is_none()
    }

    pub fn has_pheromone(&self, pheromone_type: PheromoneType) -> bool {
        self.pheromones.iter().any(|p| p.pheromone_type == pheromone_type)
    }

    /// True when the newest split marker is `SPLIT_THIS_JOB`, i.e. no
    /// rejection has been recorded since the split was requested.
    pub fn awaiting_split(&self) -> bool {
        self.pheromones
            .iter()
            .rev()
            .find(|p| matches!(p.pheromone_type, PheromoneType::SplitThisJob | PheromoneType::SplitRejected))
            .is_some_and(|p| p.pheromone_type == PheromoneType::SplitThisJob)
    }

    /// True when another agent has flagged the job as needing a split or
    /// as blocked.
    pub fn is_flagged(&self) -> bool {
        self.awaiting_split() || self.has_pheromone(PheromoneType::IsBlocked)
    }

    pub fn blocking_dependencies(&self) -> impl Iterator<Item = &JobDependency> {
        self.dependencies
            .iter()
            .filter(|d| d.dependency_type == DependencyType::Blocks)
    }

    pub fn pending_proposals(&self) -> Vec<&SplitProposal> {
        self.split_proposals
            .iter()
            .filter(|p| p.status == ProposalStatus::Pending)
            .collect()
    }

    pub fn has_pending_proposal(&self) -> bool {
        self.split_proposals.iter().any(|p| p.status == ProposalStatus::Pending)
    }

    /// Whether the job carries a lock that has not expired.
    pub fn is_locked(&self, lease: Option<Duration>, now: DateTime<Utc>) -> bool {
        self.lock.as_ref().is_some_and(|l| !l.is_expired(lease, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AgentContext {
        AgentContext::new(SwarmId::new(), "tester")
    }

    #[test]
    fn test_new_job_is_open_root() {
        let job = Job::new(SwarmId::new(), "write docs", "");
        assert_eq!(job.status, JobStatus::Open);
        assert!(job.is_root());
        assert!(!job.is_flagged());
        assert!(job.lock.is_none());
    }

    #[test]
    fn test_child_inherits_swarm_and_parent() {
        let parent = Job::new(SwarmId::new(), "parent", "");
        let child = Job::child_of(&parent, &ProposedJob::new("a", "first half"));
        assert_eq!(child.parent_job_id, Some(parent.id));
        assert_eq!(child.swarm_id, parent.swarm_id);
        assert!(!child.is_root());
        assert_eq!(child.description, "first half");
    }

    #[test]
    fn test_flagged_by_either_pheromone() {
        let ctx = ctx();
        let mut job = Job::new(ctx.swarm_id, "j", "");
        job.pheromones.push(Pheromone::new(PheromoneType::Activity, 1.0, &ctx));
        assert!(!job.is_flagged());

        job.pheromones.push(Pheromone::new(PheromoneType::IsBlocked, 1.0, &ctx));
        assert!(job.is_flagged());

        let mut other = Job::new(ctx.swarm_id, "k", "");
        other.pheromones.push(Pheromone::new(PheromoneType::SplitThisJob, 1.0, &ctx));
        assert!(other.is_flagged());

        other.pheromones.push(Pheromone::new(PheromoneType::SplitRejected, 1.0, &ctx));
        assert!(!other.awaiting_split());
        assert!(!other.is_flagged());
    }

    #[test]
    fn test_lock_expiry() {
        let lock = JobLock {
            holder_agent_id: AgentId::new(),
            holder_agent_name: "a".to_string(),
            acquired_at: Utc::now() - chrono::Duration::seconds(120),
        };
        assert!(!lock.is_expired(None, Utc::now()));
        assert!(lock.is_expired(Some(Duration::from_secs(60)), Utc::now()));
        assert!(!lock.is_expired(Some(Duration::from_secs(600)), Utc::now()));
    }

    #[test]
    fn test_pheromone_type_wire_names() {
        let json = serde_json::to_string(&PheromoneType::SplitThisJob).unwrap();
        assert_eq!(json, "\"SPLIT_THIS_JOB\"");
        let json = serde_json::to_string(&PheromoneType::SplitApproved).unwrap();
        assert_eq!(json, "\"split-approved\"");
        let parsed: PheromoneType = serde_json::from_str("\"IS_BLOCKED\"").unwrap();
        assert_eq!(parsed, PheromoneType::IsBlocked);
    }

    #[test]
    fn test_pending_proposals_filter() {
        let ctx = ctx();
        let mut job = Job::new(ctx.swarm_id, "j", "");
        let mut accepted = SplitProposalDraft::new("old", vec![], &ctx).into_proposal();
        accepted.status = ProposalStatus::Accepted;
        job.split_proposals.push(accepted);
        assert!(!job.has_pending_proposal());

        job.split_proposals
            .push(SplitProposalDraft::new("new", vec![], &ctx).into_proposal());
        assert!(job.has_pending_proposal());
        assert_eq!(job.pending_proposals().len(), 1);
    }
}
