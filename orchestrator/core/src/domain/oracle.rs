// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Oracles
//!
//! Semantic judgments the scheduler cannot make by itself: whether a job is
//! too large, whether it silently depends on another open job, whether a split
//! proposal is sensible, whether something blocks work right now.
//!
//! The scheduler only sees these traits, so any inference backend (or a
//! deterministic rule engine such as
//! [`crate::infrastructure::oracles::RuleOracle`]) can be plugged in.
//! Callers treat an [`OracleError`] as the permissive outcome for that oracle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::job::{Job, JobId, ProposedJob, SplitProposal};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityVerdict {
    pub should_split: bool,
    #[serde(default)]
    pub proposed_jobs: Vec<ProposedJob>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyVerdict {
    pub has_blocker: bool,
    #[serde(default)]
    pub blocking_job_ids: Vec<JobId>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalVerdict {
    pub action: ApprovalAction,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockerVerdict {
    pub has_blocker: bool,
    #[serde(default)]
    pub blocker_reason: String,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle backend unavailable: {0}")]
    Unavailable(String),

    #[error("Oracle timed out")]
    Timeout,

    #[error("Malformed oracle response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ComplexityOracle: Send + Sync {
    async fn assess_complexity(&self, job: &Job) -> Result<ComplexityVerdict, OracleError>;
}

#[async_trait]
pub trait DependencyOracle: Send + Sync {
    /// `others` never contains `job` itself.
    async fn find_dependencies(&self, job: &Job, others: &[Job]) -> Result<DependencyVerdict, OracleError>;
}

#[async_trait]
pub trait ApprovalOracle: Send + Sync {
    async fn review_proposal(&self, job: &Job, proposal: &SplitProposal) -> Result<ApprovalVerdict, OracleError>;
}

#[async_trait]
pub trait BlockerOracle: Send + Sync {
    async fn detect_blocker(&self, job: &Job) -> Result<BlockerVerdict, OracleError>;
}

/// The full oracle capability set a worker needs.
#[derive(Clone)]
pub struct Oracles {
    pub complexity: Arc<dyn ComplexityOracle>,
    pub dependency: Arc<dyn DependencyOracle>,
    pub approval: Arc<dyn ApprovalOracle>,
    pub blocker: Arc<dyn BlockerOracle>,
}

impl Oracles {
    pub fn new(
        complexity: Arc<dyn ComplexityOracle>,
        dependency: Arc<dyn DependencyOracle>,
        approval: Arc<dyn ApprovalOracle>,
        blocker: Arc<dyn BlockerOracle>,
    ) -> Self {
        Self {
            complexity,
            dependency,
            approval,
            blocker,
        }
    }

    /// Use one value for every capability.
    pub fn uniform<O>(oracle: Arc<O>) -> Self
    where
        O: ComplexityOracle + DependencyOracle + ApprovalOracle + BlockerOracle + 'static,
    {
        Self {
            complexity: oracle.clone(),
            dependency: oracle.clone(),
            approval: oracle.clone(),
            blocker: oracle,
        }
    }
}
