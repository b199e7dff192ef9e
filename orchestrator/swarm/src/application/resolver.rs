// Copyright (c) 2026 Formic Contributors
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use formic_core::domain::job::{Job, JobId, JobStatus};
use formic_core::domain::oracle::DependencyOracle;
use formic_core::domain::repository::JobRepository;

use crate::domain::{DependencyAnalysis, DependencyCheck};

/// Decides whether a job can start: first against the dependencies it
/// declares, then by asking the dependency oracle about ones it does not.
pub struct DependencyResolver {
    repository: Arc<dyn JobRepository>,
    oracle: Arc<dyn DependencyOracle>,
}

impl DependencyResolver {
    pub fn new(repository: Arc<dyn JobRepository>, oracle: Arc<dyn DependencyOracle>) -> Self {
        Self { repository, oracle }
    }

    /// A "blocks" dependency is resolved only when its target exists and is
    /// closed. A failed read counts as unresolved.
    pub async fn check_dependencies_resolved(&self, job: &Job) -> DependencyCheck {
        let mut unresolved_deps = Vec::new();

        for dep in job.blocking_dependencies() {
            let closed = match self.repository.get_job(dep.target_job_id).await {
                Ok(Some(target)) => target.status == JobStatus::Closed,
                Ok(None) => false,
                Err(e) => {
                    warn!(job_id = %job.id, target = %dep.target_job_id, error = %e, "Dependency lookup failed");
                    false
                }
            };
            if !closed {
                unresolved_deps.push(dep.target_job_id);
            }
        }

        DependencyCheck {
            resolved: unresolved_deps.is_empty(),
            unresolved_deps,
        }
    }

    /// Ask the oracle whether one of `candidates` must finish first.
    pub async fn analyze_job_dependencies(&self, job: &Job, candidates: &[Job]) -> DependencyAnalysis {
        let others: Vec<Job> = candidates.iter().filter(|c| c.id != job.id).cloned().collect();
        if others.is_empty() {
            return DependencyAnalysis::default();
        }

        let verdict = match self.oracle.find_dependencies(job, &others).await {
            Ok(v) => v,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Dependency oracle failed, assuming no blocker");
                return DependencyAnalysis::default();
            }
        };

        if !verdict.has_blocker {
            return DependencyAnalysis::default();
        }

        let known: HashSet<JobId> = others.iter().map(|j| j.id).collect();
        let mut seen = HashSet::new();
        let blocking_job_ids: Vec<JobId> = verdict
            .blocking_job_ids
            .into_iter()
            .filter(|id| known.contains(id) && seen.insert(*id))
            .collect();

        if blocking_job_ids.is_empty() {
            debug!(job_id = %job.id, "Oracle named no known blocking job, ignoring verdict");
            return DependencyAnalysis::default();
        }

        DependencyAnalysis {
            has_blocker: true,
            blocking_job_ids,
            reason: verdict.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use formic_core::domain::agent::SwarmId;
    use formic_core::domain::oracle::{DependencyVerdict, OracleError};
    use formic_core::infrastructure::{InMemoryJobRepository, RuleOracle};
    use parking_lot::Mutex;

    /// Returns a canned verdict and records how many candidates it saw.
    struct CannedOracle {
        verdict: Result<DependencyVerdict, ()>,
        seen: Mutex<Vec<usize>>,
    }

    impl CannedOracle {
        fn new(verdict: Result<DependencyVerdict, ()>) -> Self {
            Self {
                verdict,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DependencyOracle for CannedOracle {
        async fn find_dependencies(&self, _job: &Job, others: &[Job]) -> Result<DependencyVerdict, OracleError> {
            self.seen.lock().push(others.len());
            self.verdict
                .clone()
                .map_err(|_| OracleError::Unavailable("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_open_or_missing_targets_are_unresolved() {
        let swarm = SwarmId::new();
        let closed = Job::new(swarm, "done", "").with_status(JobStatus::Closed);
        let open = Job::new(swarm, "todo", "");
        let missing = JobId::new();
        let job = Job::new(swarm, "j", "")
            .with_dependency(closed.id)
            .with_dependency(open.id)
            .with_dependency(missing);
        let repo = Arc::new(InMemoryJobRepository::new().with_jobs([closed, open.clone(), job.clone()]));
        let resolver = DependencyResolver::new(repo, Arc::new(RuleOracle::new()));

        let check = resolver.check_dependencies_resolved(&job).await;
        assert!(!check.resolved);
        assert_eq!(check.unresolved_deps, vec![open.id, missing]);
    }

    #[tokio::test]
    async fn test_no_dependencies_is_resolved() {
        let job = Job::new(SwarmId::new(), "j", "");
        let resolver = DependencyResolver::new(Arc::new(InMemoryJobRepository::new()), Arc::new(RuleOracle::new()));
        let check = resolver.check_dependencies_resolved(&job).await;
        assert!(check.resolved);
        assert!(check.unresolved_deps.is_empty());
    }

    #[tokio::test]
    async fn test_analysis_skips_oracle_without_other_candidates() {
        let job = Job::new(SwarmId::new(), "j", "");
        let oracle = Arc::new(CannedOracle::new(Ok(DependencyVerdict {
            has_blocker: true,
            blocking_job_ids: vec![JobId::new()],
            reason: "x".into(),
        })));
        let resolver = DependencyResolver::new(Arc::new(InMemoryJobRepository::new()), oracle.clone());

        let analysis = resolver.analyze_job_dependencies(&job, &[job.clone()]).await;
        assert!(!analysis.has_blocker);
        assert!(oracle.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_analysis_keeps_only_candidate_ids() {
        let swarm = SwarmId::new();
        let job = Job::new(swarm, "j", "");
        let other = Job::new(swarm, "k", "");
        let oracle = Arc::new(CannedOracle::new(Ok(DependencyVerdict {
            has_blocker: true,
            blocking_job_ids: vec![JobId::new(), other.id, other.id],
            reason: "k first".into(),
        })));
        let resolver = DependencyResolver::new(Arc::new(InMemoryJobRepository::new()), oracle.clone());

        let analysis = resolver
            .analyze_job_dependencies(&job, &[job.clone(), other.clone()])
            .await;
        assert!(analysis.has_blocker);
        assert_eq!(analysis.blocking_job_ids, vec![other.id]);
        assert_eq!(oracle.seen.lock().as_slice(), [1]);
    }

    #[tokio::test]
    async fn test_oracle_failure_means_no_blocker() {
        let swarm = SwarmId::new();
        let job = Job::new(swarm, "j", "");
        let other = Job::new(swarm, "k", "");
        let resolver = DependencyResolver::new(
            Arc::new(InMemoryJobRepository::new()),
            Arc::new(CannedOracle::new(Err(()))),
        );

        let analysis = resolver.analyze_job_dependencies(&job, &[other]).await;
        assert_eq!(analysis, DependencyAnalysis::default());
    }
}
