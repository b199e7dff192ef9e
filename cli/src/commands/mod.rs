// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for Formic CLI

pub mod config;
pub mod swarm;

pub use self::config::ConfigCommand;
pub use self::swarm::SwarmCommand;
