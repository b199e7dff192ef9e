// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::fmt;

use formic_core::domain::job::JobId;

/// Phase of a worker cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerState {
    ScanningProposals,
    ListingJobs,
    Locking,
    Working(JobId),
    Idle,
    Terminated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::ScanningProposals => f.write_str("scanning-proposals"),
            WorkerState::ListingJobs => f.write_str("listing-jobs"),
            WorkerState::Locking => f.write_str("locking"),
            WorkerState::Working(id) => write!(f, "working({})", id),
            WorkerState::Idle => f.write_str("idle"),
            WorkerState::Terminated => f.write_str("terminated"),
        }
    }
}

/// Why a worker stopped. Neither reason is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerExit {
    /// Too many consecutive listings without actionable work
    Drained,
    Cancelled,
}

/// What happened to a locked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkResult {
    Completed,
    Incomplete,
    SplitProposed,
    Blocked,
    Failed,
    /// The job vanished or closed between listing and locking
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub agent_name: String,
    pub cycles: u32,
    pub jobs_completed: u32,
    pub jobs_blocked: u32,
    pub splits_proposed: u32,
    pub exit: Option<WorkerExit>,
}

impl fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} cycles, {} completed, {} blocked, {} splits",
            self.agent_name, self.cycles, self.jobs_completed, self.jobs_blocked, self.splits_proposed
        )
    }
}
