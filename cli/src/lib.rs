// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Formic CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command handlers and backlog file loading for the `formic`
//!   binary

pub mod backlog;
pub mod commands;
