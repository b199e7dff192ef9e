// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

// Notification sinks
//
// BroadcastNotifier fans swarm transitions out over a tokio broadcast channel
// so the CLI (or any observer) can stream them. Slow observers lag and lose
// the oldest messages; senders never block.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::notification::NotificationSink;

/// Writes every notification to the log.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn send_message(&self, text: &str) {
        info!(target: "formic::notify", "{}", text);
    }
}

#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: Arc<broadcast::Sender<String>>,
}

impl BroadcastNotifier {
    /// Capacity determines how many messages are buffered per lagging receiver
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn subscribe(&self) -> NotificationReceiver {
        NotificationReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[async_trait]
impl NotificationSink for BroadcastNotifier {
    async fn send_message(&self, text: &str) {
        // send() only fails when nobody is listening
        if self.sender.send(text.to_string()).is_err() {
            debug!("No subscribers listening to notification");
        }
    }
}

pub struct NotificationReceiver {
    receiver: broadcast::Receiver<String>,
}

impl NotificationReceiver {
    /// Next notification, skipping over any that were dropped while lagging.
    /// `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.receiver.recv().await {
                Ok(text) => return Some(text),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Notification receiver lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
