// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::events::ExternalEventSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    /// Synthesized from an external event about a delegated agent.
    BackgroundAgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ContextMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The orchestrator's running conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningContext {
    pub messages: Vec<ContextMessage>,
}

impl ReasoningContext {
    pub fn from_user_message(text: impl Into<String>) -> Self {
        Self {
            messages: vec![ContextMessage::new(MessageRole::User, text)],
        }
    }

    pub fn push(&mut self, message: ContextMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ContextMessage> {
        self.messages.last()
    }
}

/// Result of one reasoning + tool-execution step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub context: ReasoningContext,
    /// The engine considers the request answered.
    pub completed: bool,
    /// The step handed work to at least one background agent.
    pub delegated: bool,
    pub final_message: String,
}

/// Context assembly and step execution (LLM prompting, tool calls) live
/// behind this trait.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn assemble_context(&self, user_message: &str) -> anyhow::Result<ReasoningContext>;

    async fn step(&self, context: ReasoningContext, events: &dyn ExternalEventSource) -> anyhow::Result<StepOutcome>;
}
