// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Layer
//!
//! Value types produced by the allocation algorithms. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`allocation`] | `PickAction`, `PickOutcome`, `DependencyCheck`, `DependencyAnalysis`, `SplitAnalysis`, `ReviewSummary` |
//! | [`worker_state`] | `WorkerState`, `WorkerExit`, `WorkerReport`, `WorkResult` |

pub mod allocation;
pub mod worker_state;

pub use allocation::*;
pub use worker_state::*;
