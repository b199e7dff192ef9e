// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentContext;
use crate::domain::job::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkOutcome {
    /// The job is done and may be closed.
    Completed,
    /// Progress was made but the job stays open for another pass.
    Incomplete,
}

/// The unit of work a worker performs on a locked job.
///
/// What "work" means is up to the embedding application; the swarm only
/// decides which job gets worked on and by whom.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: &Job, ctx: &AgentContext) -> anyhow::Result<WorkOutcome>;
}
