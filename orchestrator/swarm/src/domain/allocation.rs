// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Allocation Results
//!
//! What the resolver, negotiator and picker hand back to a worker.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use formic_core::domain::job::{Job, JobId, ProposedJob};

/// What a worker should do with the job the picker selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickAction {
    Implement,
    Split,
    /// Nothing in the listing is actionable.
    Terminate,
}

impl PickAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickAction::Implement => "implement",
            PickAction::Split => "split",
            PickAction::Terminate => "terminate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PickOutcome {
    pub job: Option<Job>,
    pub action: PickAction,
}

impl PickOutcome {
    pub fn implement(job: Job) -> Self {
        Self {
            job: Some(job),
            action: PickAction::Implement,
        }
    }

    pub fn split(job: Job) -> Self {
        Self {
            job: Some(job),
            action: PickAction::Split,
        }
    }

    pub fn terminate() -> Self {
        Self {
            job: None,
            action: PickAction::Terminate,
        }
    }

    pub fn is_terminate(&self) -> bool {
        self.action == PickAction::Terminate
    }
}

/// Closure of the job's recorded "blocks" dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyCheck {
    pub resolved: bool,
    /// Targets that are missing or not yet closed, in declaration order
    pub unresolved_deps: Vec<JobId>,
}

/// Verdict on dependencies the job never declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyAnalysis {
    pub has_blocker: bool,
    pub blocking_job_ids: Vec<JobId>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitAnalysis {
    pub splittable: bool,
    pub proposed_jobs: Vec<ProposedJob>,
    pub reason: String,
}

impl SplitAnalysis {
    pub fn not_splittable(reason: impl Into<String>) -> Self {
        Self {
            splittable: false,
            proposed_jobs: Vec::new(),
            reason: reason.into(),
        }
    }
}

/// Result of one proposal review pass.
#[derive(Debug, Clone, Default)]
pub struct ReviewSummary {
    pub approved: Vec<JobId>,
    pub rejected: Vec<JobId>,
    /// Jobs that had a pending proposal when the pass started. The same
    /// cycle must not lock them.
    pub excluded: HashSet<JobId>,
}
