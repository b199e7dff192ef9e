// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Control loop driven by the in-process event bus.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use formic_core::application::{ControlLoop, OrchestratorError};
use formic_core::domain::config::OrchestratorSettings;
use formic_core::domain::events::{BackgroundTask, ExternalEventSource};
use formic_core::domain::reasoning::{ReasoningContext, ReasoningEngine, StepOutcome};
use formic_core::infrastructure::AgentEventBus;

/// Starts its background work on the first step, then answers with every
/// message the loop appended to the context.
struct FanOutEngine {
    bus: AgentEventBus,
    started: AtomicBool,
    start: fn(&AgentEventBus, &dyn ExternalEventSource),
}

impl FanOutEngine {
    fn new(bus: AgentEventBus, start: fn(&AgentEventBus, &dyn ExternalEventSource)) -> Self {
        Self {
            bus,
            started: AtomicBool::new(false),
            start,
        }
    }
}

#[async_trait]
impl ReasoningEngine for FanOutEngine {
    async fn assemble_context(&self, user_message: &str) -> anyhow::Result<ReasoningContext> {
        Ok(ReasoningContext::from_user_message(user_message))
    }

    async fn step(&self, context: ReasoningContext, events: &dyn ExternalEventSource) -> anyhow::Result<StepOutcome> {
        if !self.started.swap(true, Ordering::SeqCst) {
            (self.start)(&self.bus, events);
            return Ok(StepOutcome {
                context,
                completed: false,
                delegated: true,
                final_message: String::new(),
            });
        }

        let final_message = context
            .messages
            .iter()
            .skip(1)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n---\n");
        Ok(StepOutcome {
            context,
            completed: true,
            delegated: false,
            final_message,
        })
    }
}

async fn explode() -> anyhow::Result<String> {
    panic!("boom")
}

fn control_loop(engine: FanOutEngine, bus: AgentEventBus, settings: OrchestratorSettings) -> ControlLoop {
    ControlLoop::new(Arc::new(engine), Arc::new(bus), settings)
}

#[tokio::test]
async fn test_queue_message_and_group_completion_are_both_seen() {
    let bus = AgentEventBus::new();
    let engine = FanOutEngine::new(bus.clone(), |bus, _| {
        bus.post_agent_message("planner", None, "starting the build");
        bus.create_and_start_group(vec![
            (
                BackgroundTask::new("build", async { anyhow::Ok("built".to_string()) }),
                "builder".to_string(),
            ),
            (
                BackgroundTask::new("lint", async { Err::<String, _>(anyhow::anyhow!("lint failed")) }),
                "linter".to_string(),
            ),
        ]);
    });
    let control = control_loop(engine, bus.clone(), OrchestratorSettings::default());

    let answer = assert_ok!(control.process_one_request("ship it").await);

    let message_at = answer
        .find("Message from agent 'planner' to 'orchestrator': starting the build")
        .unwrap();
    let group_at = answer.find("finished: 1 of 2 succeeded").unwrap();
    assert!(message_at < group_at);
    assert!(answer.contains("'builder' (ok): built"));
    assert!(answer.contains("'linter' (failed): lint failed"));
    assert_eq!(bus.running_agent_count(), 0);
    assert_eq!(bus.pending_external_event_count(), 0);
}

#[tokio::test]
async fn test_panicking_agent_is_reported_as_failed() {
    let bus = AgentEventBus::new();
    let engine = FanOutEngine::new(bus.clone(), |_, events| {
        events.create_and_start_thread(
            BackgroundTask::new("explode", explode()),
            "fragile",
        );
    });
    let control = control_loop(engine, bus, OrchestratorSettings::default());

    let answer = assert_ok!(control.process_one_request("try it").await);

    assert!(answer.starts_with("Background agent 'fragile' failed task 'explode'"));
}

#[tokio::test(start_paused = true)]
async fn test_silent_agent_hits_event_wait_deadline() {
    let bus = AgentEventBus::new();
    let engine = FanOutEngine::new(bus.clone(), |_, events| {
        events.create_and_start_thread(
            BackgroundTask::new("stall", async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                anyhow::Ok("late".to_string())
            }),
            "sleeper",
        );
    });
    let settings = OrchestratorSettings {
        event_wait_timeout: Some(Duration::from_secs(5)),
        ..OrchestratorSettings::default()
    };
    let control = control_loop(engine, bus.clone(), settings);

    let err = assert_err!(control.process_one_request("wait for it").await);

    assert!(matches!(err, OrchestratorError::Timeout(limit) if limit == Duration::from_secs(5)));
    assert_eq!(bus.running_agent_count(), 1);
}
