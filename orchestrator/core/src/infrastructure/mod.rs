// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod repositories;
pub mod event_bus;
pub mod notification;
pub mod oracles;

pub use event_bus::AgentEventBus;
pub use notification::{BroadcastNotifier, TracingNotifier};
pub use oracles::RuleOracle;
pub use repositories::InMemoryJobRepository;
