// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;

/// Fire-and-forget sink for human-readable swarm transitions (split proposed,
/// job blocked, job locked, ...). Implementations must not fail the caller.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_message(&self, text: &str);
}
