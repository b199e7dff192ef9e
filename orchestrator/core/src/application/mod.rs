// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod control_loop;

pub use control_loop::{ControlLoop, OrchestratorError};
