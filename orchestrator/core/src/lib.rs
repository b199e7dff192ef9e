// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # `formic-core`
//!
//! Domain model and runtime primitives shared by every Formic agent.
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `Job`, `Pheromone`, `SplitProposal`, `AgentContext`, repository and oracle traits, `SwarmConfig` |
//! | [`application`] | Application | `ControlLoop` (orchestrator request processing) |
//! | [`infrastructure`] | Infrastructure | `InMemoryJobRepository`, `AgentEventBus`, notification sinks, `RuleOracle` |

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
