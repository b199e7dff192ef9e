// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Split Negotiator
//!
//! Owns the life of a split proposal: deciding whether a job is worth
//! splitting, recording the proposal, and later accepting or rejecting it.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Implements split proposal negotiation between agents
//!
//! # Proposal lifecycle
//!
//! ```text
//! propose_split ──► Pending ──(approve)──► Accepted  (children created, split-approved)
//!        │                 └──(reject)───► deleted   (split-rejected)
//!        └── minimum approvals == 1 ──► Accepted immediately
//! ```
//!
//! Only root jobs are ever split, so the job tree is at most two levels deep.

use std::sync::Arc;

use tracing::{debug, info, warn};

use formic_core::domain::agent::AgentContext;
use formic_core::domain::config::SwarmConfig;
use formic_core::domain::job::{Job, JobStatus, PheromoneType, ProposalId, ProposedJob, SplitProposal, SplitProposalDraft};
use formic_core::domain::oracle::{ApprovalAction, ApprovalOracle, ComplexityOracle};

use crate::application::signals::SwarmSignals;
use crate::domain::{ReviewSummary, SplitAnalysis};

pub struct SplitNegotiator {
    complexity: Arc<dyn ComplexityOracle>,
    approval: Arc<dyn ApprovalOracle>,
    signals: SwarmSignals,
}

impl SplitNegotiator {
    pub fn new(complexity: Arc<dyn ComplexityOracle>, approval: Arc<dyn ApprovalOracle>, signals: SwarmSignals) -> Self {
        Self {
            complexity,
            approval,
            signals,
        }
    }

    /// Non-root jobs are never splittable, whatever the oracle thinks.
    pub async fn is_job_splittable(&self, job: &Job) -> SplitAnalysis {
        if !job.is_root() {
            return SplitAnalysis::not_splittable("only root jobs may be split");
        }

        let verdict = match self.complexity.assess_complexity(job).await {
            Ok(v) => v,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Complexity oracle failed, treating job as atomic");
                return SplitAnalysis::not_splittable(format!("complexity oracle failed: {}", e));
            }
        };

        if !verdict.should_split || verdict.proposed_jobs.len() < 2 {
            return SplitAnalysis::not_splittable(verdict.reason);
        }

        SplitAnalysis {
            splittable: true,
            proposed_jobs: verdict.proposed_jobs,
            reason: verdict.reason,
        }
    }

    /// Flag the job with `SPLIT_THIS_JOB` and record a proposal. When the
    /// swarm needs a single approval the proposal is accepted before this
    /// returns.
    pub async fn propose_split(
        &self,
        job: &Job,
        proposed_jobs: Vec<ProposedJob>,
        reason: &str,
        ctx: &AgentContext,
        config: &SwarmConfig,
    ) -> Option<SplitProposal> {
        let child_count = proposed_jobs.len();
        self.signals.deposit(job.id, PheromoneType::SplitThisJob, ctx).await;

        let draft = SplitProposalDraft::new(reason, proposed_jobs, ctx);
        let proposal = match self.signals.repository().add_split_proposal(job.id, draft).await {
            Ok(p) => p,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Failed to record split proposal");
                return None;
            }
        };

        metrics::counter!("formic_split_proposals_total", "outcome" => "proposed").increment(1);
        info!(
            job_id = %job.id,
            proposal_id = %proposal.id,
            children = child_count,
            agent = %ctx.agent_name,
            "Split proposed"
        );
        self.signals
            .notify(format!(
                "{} proposed splitting '{}' into {} jobs: {}",
                ctx.agent_name, job.name, child_count, reason
            ))
            .await;

        if config.auto_accepts_splits() {
            self.accept(job, proposal.id, ctx).await;
        }

        Some(proposal)
    }

    /// Accept a proposal and deposit `split-approved`. Returns the children
    /// created by this call.
    pub async fn accept(&self, job: &Job, proposal_id: ProposalId, ctx: &AgentContext) -> Vec<Job> {
        let children = match self
            .signals
            .repository()
            .accept_split_proposal(job.id, proposal_id)
            .await
        {
            Ok(children) => children,
            Err(e) => {
                warn!(job_id = %job.id, proposal_id = %proposal_id, error = %e, "Failed to accept split proposal");
                return Vec::new();
            }
        };

        self.signals.deposit(job.id, PheromoneType::SplitApproved, ctx).await;
        metrics::counter!("formic_split_proposals_total", "outcome" => "accepted").increment(1);
        info!(job_id = %job.id, proposal_id = %proposal_id, children = children.len(), "Split accepted");

        let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
        self.signals
            .notify(format!(
                "Split of '{}' accepted by {}: {}",
                job.name,
                ctx.agent_name,
                names.join(", ")
            ))
            .await;

        children
    }

    /// Delete a proposal and deposit `split-rejected`, which lifts the
    /// job's split request.
    pub async fn reject(&self, job: &Job, proposal_id: ProposalId, reason: &str, ctx: &AgentContext) {
        if let Err(e) = self
            .signals
            .repository()
            .delete_split_proposal(job.id, proposal_id)
            .await
        {
            warn!(job_id = %job.id, proposal_id = %proposal_id, error = %e, "Failed to delete split proposal");
        }

        self.signals.deposit(job.id, PheromoneType::SplitRejected, ctx).await;
        metrics::counter!("formic_split_proposals_total", "outcome" => "rejected").increment(1);
        info!(job_id = %job.id, proposal_id = %proposal_id, reason, "Split rejected");
        self.signals
            .notify(format!("Split of '{}' rejected by {}: {}", job.name, ctx.agent_name, reason))
            .await;
    }

    /// Review every open job carrying exactly one pending proposal.
    ///
    /// Any job with a pending proposal at the start of the pass is listed in
    /// [`ReviewSummary::excluded`], whether or not it was reviewed.
    pub async fn review_pending_proposals(&self, jobs: &[Job], ctx: &AgentContext) -> ReviewSummary {
        let mut summary = ReviewSummary::default();

        for job in jobs.iter().filter(|j| j.has_pending_proposal()) {
            summary.excluded.insert(job.id);

            if job.status != JobStatus::Open {
                continue;
            }
            let pending = job.pending_proposals();
            let [proposal] = pending.as_slice() else {
                debug!(job_id = %job.id, pending = pending.len(), "Skipping review of ambiguous proposals");
                continue;
            };

            let verdict = self.approval.review_proposal(job, proposal).await;
            match verdict {
                Ok(v) if v.action == ApprovalAction::Approve => {
                    self.accept(job, proposal.id, ctx).await;
                    summary.approved.push(job.id);
                }
                Ok(v) => {
                    self.reject(job, proposal.id, &v.reason, ctx).await;
                    summary.rejected.push(job.id);
                }
                Err(e) => {
                    self.reject(job, proposal.id, &format!("review failed: {}", e), ctx).await;
                    summary.rejected.push(job.id);
                }
            }
        }

        summary
    }
}
