// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # External Events
//!
//! Signals that reach the orchestrator from outside its own reasoning:
//! background agents finishing (alone or as a group) and messages that agents
//! post to the orchestrator's queue. [`ExternalEventSource`] is the contract the
//! control loop suspends on; `crate::infrastructure::event_bus::AgentEventBus`
//! is the in-process implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub Uuid);

impl ThreadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one background agent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub thread_id: ThreadId,
    pub agent_name: String,
    pub task: String,
    pub success: bool,
    pub output: String,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExternalEvent {
    BackgroundAgentCompletion(AgentOutcome),
    BackgroundGroupedAgentCompletion {
        group_id: Uuid,
        outcomes: Vec<AgentOutcome>,
    },
    AgentQueueEvent {
        from_agent: String,
        #[serde(default)]
        to_agent: Option<String>,
        message: String,
        sent_at: DateTime<Utc>,
    },
}

impl ExternalEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ExternalEvent::BackgroundAgentCompletion(_) => "background_agent_completion",
            ExternalEvent::BackgroundGroupedAgentCompletion { .. } => "background_grouped_agent_completion",
            ExternalEvent::AgentQueueEvent { .. } => "agent_queue_event",
        }
    }
}

/// Handle returned for a delegated background agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadHandle {
    pub thread_id: ThreadId,
    pub agent_name: String,
    pub started_at: DateTime<Utc>,
}

pub type BackgroundFuture = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'static>>;

/// A unit of delegated work: a description for humans plus the future that
/// performs it.
pub struct BackgroundTask {
    pub description: String,
    pub future: BackgroundFuture,
}

impl BackgroundTask {
    pub fn new<F>(description: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self {
            description: description.into(),
            future: Box::pin(future),
        }
    }
}

impl fmt::Debug for BackgroundTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundTask")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait ExternalEventSource: Send + Sync {
    fn running_agent_count(&self) -> usize;

    fn pending_external_event_count(&self) -> usize;

    /// Suspend until the next event arrives. Events are delivered FIFO.
    async fn wait_for_any_external_event(&self) -> Result<ExternalEvent, EventBusError>;

    fn create_and_start_thread(&self, task: BackgroundTask, selected_agent: &str) -> ThreadHandle;
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,
}
