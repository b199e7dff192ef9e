// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Backlog files.
//!
//! A backlog is a YAML list of jobs. Dependencies are written by job name and
//! resolved to ids when the backlog is seeded:
//!
//! ```yaml
//! jobs:
//!   - name: schema
//!   - name: migration
//!     description: Write the migration for the new schema
//!     depends_on: [schema]
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use formic_core::domain::agent::SwarmId;
use formic_core::domain::job::{Job, JobDependency};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklogFile {
    pub jobs: Vec<BacklogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklogEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl BacklogFile {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read backlog {:?}", path))?;
        Self::from_yaml_str(&content).with_context(|| format!("Invalid backlog {:?}", path))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Build the jobs of `swarm_id`, in file order, with name dependencies
    /// turned into "blocks" edges.
    pub fn into_jobs(self, swarm_id: SwarmId) -> Result<Vec<Job>> {
        let mut ids = HashMap::new();
        let mut jobs = Vec::with_capacity(self.jobs.len());

        for entry in &self.jobs {
            if entry.name.trim().is_empty() {
                bail!("Backlog contains a job without a name");
            }
            let job = Job::new(swarm_id, entry.name.clone(), entry.description.clone());
            if ids.insert(entry.name.clone(), job.id).is_some() {
                bail!("Duplicate job name in backlog: '{}'", entry.name);
            }
            jobs.push(job);
        }

        for (job, entry) in jobs.iter_mut().zip(&self.jobs) {
            for dep in &entry.depends_on {
                let Some(target) = ids.get(dep) else {
                    bail!("Job '{}' depends on unknown job '{}'", entry.name, dep);
                };
                if *target == job.id {
                    bail!("Job '{}' depends on itself", entry.name);
                }
                job.dependencies.push(JobDependency::blocks(*target));
            }
        }

        Ok(jobs)
    }
}
