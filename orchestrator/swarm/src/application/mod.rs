// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Swarm application services.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Job selection, dependency and split decisions, and the
//!   per-agent worker loop, all expressed against the `formic-core` domain
//!   traits.

pub mod negotiator;
pub mod picker;
pub mod resolver;
pub mod signals;
pub mod supervisor;
pub mod worker;

pub use negotiator::SplitNegotiator;
pub use picker::JobPicker;
pub use resolver::DependencyResolver;
pub use signals::SwarmSignals;
pub use supervisor::SwarmSupervisor;
pub use worker::Worker;
