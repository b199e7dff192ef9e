// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # `formic-swarm`: Decentralized Job Allocation
//!
//! Many workers share one backlog and never talk to each other. Each worker
//! reads the pheromones, locks and proposals other workers left on jobs,
//! picks one actionable job, claims it with an atomic lock, and either splits
//! it, reports it blocked, or works it.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `PickOutcome`, `DependencyCheck`, `SplitAnalysis`, `WorkerState`, `WorkerReport` |
//! | [`application`] | Application | `DependencyResolver`, `SplitNegotiator`, `JobPicker`, `Worker`, `SwarmSupervisor` |
//!
//! ## Key Concepts
//!
//! - **Pheromone**: an append-only marker; `SPLIT_THIS_JOB` and `IS_BLOCKED`
//!   take a job out of normal selection.
//! - **Split proposal**: accepted on creation when the swarm needs a single
//!   approval, otherwise reviewed by the next worker cycle.
//! - **Lock**: the only mutual exclusion; a lost race just moves the worker
//!   on to the next candidate.

pub mod domain;
pub mod application;

pub use application::{DependencyResolver, JobPicker, SplitNegotiator, SwarmSignals, SwarmSupervisor, Worker};
pub use domain::*;
