// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Deterministic oracle backend.
//!
//! [`RuleOracle`] reads plain-text conventions out of a job description
//! instead of asking a model:
//!
//! | Line | Meaning |
//! |------|---------|
//! | `- item` (two or more) | split into one child per item |
//! | `needs: <job name>` | depends on the open job with that name |
//! | `blocked: <reason>` | something outside the swarm blocks the work |
//!
//! Proposals are approved when they name at least two distinct, non-empty
//! jobs.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::domain::job::{Job, ProposedJob, SplitProposal};
use crate::domain::oracle::{
    ApprovalAction, ApprovalOracle, ApprovalVerdict, BlockerOracle, BlockerVerdict, ComplexityOracle, ComplexityVerdict,
    DependencyOracle, DependencyVerdict, OracleError,
};

#[derive(Debug, Clone)]
pub struct RuleOracle {
    /// Splits proposing more children than this are rejected on review
    pub max_children: usize,
}

impl Default for RuleOracle {
    fn default() -> Self {
        Self { max_children: 8 }
    }
}

impl RuleOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn directive<'a>(line: &'a str, key: &str) -> Option<&'a str> {
        let line = line.trim();
        let (head, rest) = line.split_once(':')?;
        if head.trim().eq_ignore_ascii_case(key) {
            Some(rest.trim())
        } else {
            None
        }
    }
}

#[async_trait]
impl ComplexityOracle for RuleOracle {
    async fn assess_complexity(&self, job: &Job) -> Result<ComplexityVerdict, OracleError> {
        let proposed_jobs: Vec<ProposedJob> = job
            .description
            .lines()
            .filter_map(|l| l.trim().strip_prefix("- "))
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| ProposedJob::new(item, format!("Part of '{}': {}", job.name, item)))
            .collect();

        if proposed_jobs.len() >= 2 {
            Ok(ComplexityVerdict {
                should_split: true,
                reason: format!("Description lists {} independent items", proposed_jobs.len()),
                proposed_jobs,
            })
        } else {
            Ok(ComplexityVerdict::default())
        }
    }
}

#[async_trait]
impl DependencyOracle for RuleOracle {
    async fn find_dependencies(&self, job: &Job, others: &[Job]) -> Result<DependencyVerdict, OracleError> {
        let needed: Vec<&str> = job
            .description
            .lines()
            .filter_map(|l| Self::directive(l, "needs"))
            .collect();

        let blocking_job_ids: Vec<_> = others
            .iter()
            .filter(|o| needed.iter().any(|n| n.eq_ignore_ascii_case(&o.name)))
            .map(|o| o.id)
            .collect();

        if blocking_job_ids.is_empty() {
            return Ok(DependencyVerdict::default());
        }
        Ok(DependencyVerdict {
            has_blocker: true,
            reason: format!("'{}' needs {} open job(s) first", job.name, blocking_job_ids.len()),
            blocking_job_ids,
        })
    }
}

#[async_trait]
impl ApprovalOracle for RuleOracle {
    async fn review_proposal(&self, _job: &Job, proposal: &SplitProposal) -> Result<ApprovalVerdict, OracleError> {
        let names: HashSet<&str> = proposal.proposed_jobs.iter().map(|p| p.name.trim()).collect();

        let reject = |reason: String| ApprovalVerdict {
            action: ApprovalAction::Reject,
            reason,
        };

        if proposal.proposed_jobs.len() < 2 {
            return Ok(reject("A split needs at least two sub-jobs".to_string()));
        }
        if proposal.proposed_jobs.len() > self.max_children {
            return Ok(reject(format!(
                "Split into {} sub-jobs exceeds the limit of {}",
                proposal.proposed_jobs.len(),
                self.max_children
            )));
        }
        if names.contains("") || names.len() != proposal.proposed_jobs.len() {
            return Ok(reject("Sub-job names must be non-empty and distinct".to_string()));
        }

        Ok(ApprovalVerdict {
            action: ApprovalAction::Approve,
            reason: format!("{} well-formed sub-jobs", names.len()),
        })
    }
}

#[async_trait]
impl BlockerOracle for RuleOracle {
    async fn detect_blocker(&self, job: &Job) -> Result<BlockerVerdict, OracleError> {
        match job.description.lines().find_map(|l| Self::directive(l, "blocked")) {
            Some(reason) => Ok(BlockerVerdict {
                has_blocker: true,
                blocker_reason: reason.to_string(),
            }),
            None => Ok(BlockerVerdict::default()),
        }
    }
}
