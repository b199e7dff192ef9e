// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Orchestrator Control Loop
//!
//! Processes one user request by alternating reasoning steps with waits on
//! the external event source:
//!
//! | After a step | Action |
//! |--------------|--------|
//! | delegated, or agents running, or events pending | wait for the next event, append it to the context, step again |
//! | completed, nothing running, nothing pending | return the final message |
//! | not completed, nothing outstanding | step again |
//!
//! The single `wait_for_any_external_event` call is the loop's only
//! suspension point. Everything else runs to completion between waits.
//! A step failure, an event wait deadline, cancellation and the step limit
//! each end the request with an [`OrchestratorError`].

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::config::OrchestratorSettings;
use crate::domain::events::{EventBusError, ExternalEvent, ExternalEventSource};
use crate::domain::reasoning::{ContextMessage, MessageRole, ReasoningEngine};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Failed to assemble reasoning context: {0}")]
    Context(String),

    #[error("Reasoning step {step} failed: {message}")]
    Step { step: u32, message: String },

    #[error("Event bus failure: {0}")]
    EventBus(#[from] EventBusError),

    #[error("No external event arrived within {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request exceeded {0} reasoning steps")]
    StepLimitExceeded(u32),
}

pub struct ControlLoop {
    engine: Arc<dyn ReasoningEngine>,
    events: Arc<dyn ExternalEventSource>,
    settings: OrchestratorSettings,
    cancel: CancellationToken,
}

impl ControlLoop {
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        events: Arc<dyn ExternalEventSource>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            engine,
            events,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn process_one_request(&self, user_message: &str) -> Result<String, OrchestratorError> {
        let mut context = self
            .engine
            .assemble_context(user_message)
            .await
            .map_err(|e| OrchestratorError::Context(format!("{:#}", e)))?;

        let mut steps: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }
            if steps >= self.settings.max_steps {
                return Err(OrchestratorError::StepLimitExceeded(self.settings.max_steps));
            }
            steps += 1;

            let outcome = self
                .engine
                .step(context, self.events.as_ref())
                .await
                .map_err(|e| {
                    warn!(step = steps, "Reasoning step failed: {:#}", e);
                    OrchestratorError::Step {
                        step: steps,
                        message: format!("{:#}", e),
                    }
                })?;
            context = outcome.context;

            let running = self.events.running_agent_count();
            let pending = self.events.pending_external_event_count();
            debug!(
                step = steps,
                completed = outcome.completed,
                delegated = outcome.delegated,
                running,
                pending,
                "Reasoning step finished"
            );

            if outcome.delegated || running > 0 || pending > 0 {
                let event = self.wait_for_event().await?;
                info!(kind = event.kind(), "External event received");
                context.push(synthesize_message(&event));
                continue;
            }

            if outcome.completed {
                info!(steps, "Request completed");
                return Ok(outcome.final_message);
            }
        }
    }

    async fn wait_for_event(&self) -> Result<ExternalEvent, OrchestratorError> {
        let deadline = self.settings.event_wait_timeout;
        let wait = async {
            match deadline {
                Some(limit) => match tokio::time::timeout(limit, self.events.wait_for_any_external_event()).await {
                    Ok(result) => result.map_err(OrchestratorError::from),
                    Err(_) => Err(OrchestratorError::Timeout(limit)),
                },
                None => self
                    .events
                    .wait_for_any_external_event()
                    .await
                    .map_err(OrchestratorError::from),
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(OrchestratorError::Cancelled),
            result = wait => result,
        }
    }
}

/// Describe an external event as a context message for the next step.
pub fn synthesize_message(event: &ExternalEvent) -> ContextMessage {
    match event {
        ExternalEvent::BackgroundAgentCompletion(outcome) => ContextMessage::new(
            MessageRole::BackgroundAgent,
            format!(
                "Background agent '{}' {} task '{}':\n{}",
                outcome.agent_name,
                if outcome.success { "completed" } else { "failed" },
                outcome.task,
                outcome.output
            ),
        ),
        ExternalEvent::BackgroundGroupedAgentCompletion { group_id, outcomes } => {
            let succeeded = outcomes.iter().filter(|o| o.success).count();
            let mut text = format!(
                "Background agent group {} finished: {} of {} succeeded",
                group_id,
                succeeded,
                outcomes.len()
            );
            for o in outcomes {
                text.push_str(&format!(
                    "\n- '{}' ({}): {}",
                    o.agent_name,
                    if o.success { "ok" } else { "failed" },
                    o.output
                ));
            }
            ContextMessage::new(MessageRole::BackgroundAgent, text)
        }
        ExternalEvent::AgentQueueEvent {
            from_agent,
            to_agent,
            message,
            ..
        } => {
            let recipient = to_agent.as_deref().unwrap_or("orchestrator");
            ContextMessage::new(
                MessageRole::System,
                format!("Message from agent '{}' to '{}': {}", from_agent, recipient, message),
            )
        }
    }
}
