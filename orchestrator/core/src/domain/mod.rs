// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: pure types and collaborator contracts. No I/O.

pub mod agent;
pub mod job;
pub mod config;
pub mod events;
pub mod executor;
pub mod notification;
pub mod oracle;
pub mod reasoning;
pub mod repository;
