// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

// External Event Bus - fan-in queue for the orchestrator
//
// Background agents and inter-agent messages all feed one unbounded mpsc
// channel; the orchestrator is the single consumer. Delivery is FIFO in send
// order, with no reordering across event kinds.
//
// Counter ordering matters: a finishing agent bumps `pending` before it drops
// `running`, so a reader never sees both at zero while a completion is still
// in flight.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::events::{
    AgentOutcome, BackgroundTask, EventBusError, ExternalEvent, ExternalEventSource, ThreadHandle, ThreadId,
};

struct Inner {
    sender: mpsc::UnboundedSender<ExternalEvent>,
    receiver: Mutex<mpsc::UnboundedReceiver<ExternalEvent>>,
    running: AtomicUsize,
    pending: AtomicUsize,
}

/// In-process [`ExternalEventSource`] backed by tokio tasks.
#[derive(Clone)]
pub struct AgentEventBus {
    inner: Arc<Inner>,
}

impl AgentEventBus {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                sender,
                receiver: Mutex::new(receiver),
                running: AtomicUsize::new(0),
                pending: AtomicUsize::new(0),
            }),
        }
    }

    /// Queue a message from one agent to the orchestrator (or another agent).
    pub fn post_agent_message(&self, from_agent: &str, to_agent: Option<&str>, message: impl Into<String>) {
        self.publish(ExternalEvent::AgentQueueEvent {
            from_agent: from_agent.to_string(),
            to_agent: to_agent.map(str::to_string),
            message: message.into(),
            sent_at: Utc::now(),
        });
    }

    /// Start several agents that report back as one grouped completion once
    /// the last of them finishes.
    pub fn create_and_start_group(&self, tasks: Vec<(BackgroundTask, String)>) -> (Uuid, Vec<ThreadHandle>) {
        let group_id = Uuid::new_v4();
        let count = tasks.len();
        self.inner.running.fetch_add(count, Ordering::SeqCst);

        let mut handles = Vec::with_capacity(count);
        let mut runs = Vec::with_capacity(count);
        for (task, agent_name) in tasks {
            let handle = new_handle(&agent_name);
            runs.push(run_task(handle.thread_id, agent_name, task));
            handles.push(handle);
        }

        let bus = self.clone();
        tokio::spawn(async move {
            let outcomes = futures::future::join_all(runs).await;
            bus.finish(count, ExternalEvent::BackgroundGroupedAgentCompletion { group_id, outcomes });
        });

        debug!(group_id = %group_id, agents = count, "Started background agent group");
        (group_id, handles)
    }

    fn publish(&self, event: ExternalEvent) {
        debug!(kind = event.kind(), "Publishing external event");
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        if self.inner.sender.send(event).is_err() {
            self.inner.pending.fetch_sub(1, Ordering::SeqCst);
            warn!("External event dropped: receiver closed");
        }
    }

    /// Hand over `finished` running agents to a pending event.
    fn finish(&self, finished: usize, event: ExternalEvent) {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        self.inner.running.fetch_sub(finished, Ordering::SeqCst);
        if self.inner.sender.send(event).is_err() {
            self.inner.pending.fetch_sub(1, Ordering::SeqCst);
            warn!("Completion event dropped: receiver closed");
        }
    }
}

impl Default for AgentEventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn new_handle(agent_name: &str) -> ThreadHandle {
    ThreadHandle {
        thread_id: ThreadId::new(),
        agent_name: agent_name.to_string(),
        started_at: Utc::now(),
    }
}

/// Drive one task to completion. The future runs in its own tokio task so a
/// panic becomes a failed outcome instead of a lost completion.
async fn run_task(thread_id: ThreadId, agent_name: String, task: BackgroundTask) -> AgentOutcome {
    let description = task.description;
    let (success, output) = match tokio::spawn(task.future).await {
        Ok(Ok(output)) => (true, output),
        Ok(Err(e)) => (false, format!("{:#}", e)),
        Err(join_err) => (false, format!("agent task aborted: {}", join_err)),
    };
    AgentOutcome {
        thread_id,
        agent_name,
        task: description,
        success,
        output,
        finished_at: Utc::now(),
    }
}

#[async_trait]
impl ExternalEventSource for AgentEventBus {
    fn running_agent_count(&self) -> usize {
        self.inner.running.load(Ordering::SeqCst)
    }

    fn pending_external_event_count(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    async fn wait_for_any_external_event(&self) -> Result<ExternalEvent, EventBusError> {
        let mut receiver = self.inner.receiver.lock().await;
        match receiver.recv().await {
            Some(event) => {
                self.inner.pending.fetch_sub(1, Ordering::SeqCst);
                metrics::counter!("formic_external_events_total", "kind" => event.kind()).increment(1);
                Ok(event)
            }
            None => Err(EventBusError::Closed),
        }
    }

    fn create_and_start_thread(&self, task: BackgroundTask, selected_agent: &str) -> ThreadHandle {
        let handle = new_handle(selected_agent);
        self.inner.running.fetch_add(1, Ordering::SeqCst);

        let bus = self.clone();
        let thread_id = handle.thread_id;
        let agent_name = selected_agent.to_string();
        tokio::spawn(async move {
            let outcome = run_task(thread_id, agent_name, task).await;
            bus.finish(1, ExternalEvent::BackgroundAgentCompletion(outcome));
        });

        debug!(thread_id = %handle.thread_id, agent = selected_agent, "Started background agent");
        handle
    }
}
