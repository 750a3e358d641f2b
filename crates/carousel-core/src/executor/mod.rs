//! Transition executor
//!
//! Applies a migration path step by step through a [`Controller`]:
//!
//! 1. Apply the step (dry runs only describe it and move on)
//! 2. Re-observe the cluster
//! 3. Validate every host of the growing color not yet known to be good
//! 4. Taint bad hosts and re-apply the same step until none are left
//!
//! Steps are strictly sequential. A step that cannot be completed halts the
//! transition with a [`StepError`] holding everything needed to resume.

mod validation;

use crate::controller::{accept_all, Controller, HostValidator, Runnable};
use crate::error::{ControllerError, GoalError, PreconditionError, StepError, StepFailure, TaintErrors, TransitionError};
use crate::goal::build_end_state;
use crate::model::{Cluster, ClusterState, Color, Step};
use crate::step::{create_steps, StepOptions};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// How often a step may be re-applied after bad hosts were found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum applications per step; `None` retries until the step is clean
    pub max_attempts: Option<u32>,
    /// Pause before each re-application
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Retry until every host is valid, without pausing
    #[inline]
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Give up after `attempts` applications of one step
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Pause before each re-application
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Executor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionConfig {
    /// Describe each apply instead of running it
    pub dry_run: bool,
    /// Re-application policy
    pub retry: RetryPolicy,
}

/// Summary of a finished transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionReport {
    /// Steps applied and validated
    pub steps_applied: usize,
    /// Apply descriptions, one per step; only filled by dry runs
    pub planned: Vec<String>,
    /// Extra applications caused by bad hosts
    pub reapplications: usize,
    /// Taint failures whose host was replaced by the next application anyway
    pub taint_failures: Vec<ControllerError>,
    /// Host validations performed
    pub hosts_validated: usize,
    /// Whether this was a dry run
    pub dry_run: bool,
}

/// Everything needed to run a rollout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Observed cluster
    pub cluster: Cluster,
    /// Active color before the rollout
    pub starting_group: Color,
    /// Migration path
    pub steps: Vec<Step>,
    /// Target state
    pub goal: ClusterState,
}

/// Blue/green rollout orchestrator
pub struct Carousel {
    controller: Arc<dyn Controller>,
    validator: Arc<dyn HostValidator>,
    config: TransitionConfig,
}

impl Carousel {
    /// Create an executor that accepts every host
    pub fn new(controller: Arc<dyn Controller>, config: TransitionConfig) -> Self {
        Self {
            controller,
            validator: accept_all(),
            config,
        }
    }

    /// Validate new hosts with `validator`
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn HostValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Current configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    /// Observe the cluster and plan a rollout to `node_count` nodes at `version`
    ///
    /// # Errors
    /// Cluster unavailable, or the cluster is not clean
    pub async fn plan(
        &self,
        node_count: usize,
        version: Version,
        options: &StepOptions,
    ) -> Result<Plan, TransitionError> {
        let cluster = self.controller.get_cluster().await.map_err(TransitionError::Cluster)?;
        let current = cluster.as_cluster_state();
        let starting_group = current.group().map_err(GoalError::from)?;
        let goal = build_end_state(&current, node_count, version)?;
        let steps = create_steps(&current, &goal, options);
        Ok(Plan {
            cluster,
            starting_group,
            steps,
            goal,
        })
    }

    /// Roll the cluster over to `node_count` nodes at `version`
    ///
    /// # Errors
    /// See [`TransitionError`]; only `TransitionError::Step` is resumable
    pub async fn rollout(
        &self,
        node_count: usize,
        version: Version,
        options: &StepOptions,
    ) -> Result<TransitionReport, TransitionError> {
        let plan = self.plan(node_count, version, options).await?;
        tracing::info!(
            from = %plan.cluster.as_cluster_state(),
            to = %plan.goal,
            steps = plan.steps.len(),
            "starting rollout"
        );
        self.transition(&plan.cluster, plan.starting_group, &plan.steps, &plan.goal)
            .await
    }

    /// Continue a halted transition against a freshly observed cluster
    ///
    /// The failed step usually left the cluster at the step before it, so the
    /// observed composition is applied first whenever the recorded path does
    /// not already start there.
    ///
    /// # Errors
    /// `TransitionError::Precondition` if the cluster drifted from the
    /// recorded path in both colors; otherwise see [`TransitionError`]
    pub async fn resume(
        &self,
        starting_group: Color,
        steps: &[Step],
        goal: &ClusterState,
    ) -> Result<TransitionReport, TransitionError> {
        let cluster = self.controller.get_cluster().await.map_err(TransitionError::Cluster)?;
        let path = resume_path(cluster.as_cluster_state().as_step(), steps)?;
        tracing::info!(cluster = %cluster.as_cluster_state(), steps = path.len(), "resuming transition");
        self.transition(&cluster, starting_group, &path, goal).await
    }

    /// Continue from a recorded failure
    ///
    /// # Errors
    /// See [`TransitionError`]
    pub async fn resume_from(&self, record: &StepError) -> Result<TransitionReport, TransitionError> {
        self.resume(record.starting_group, &record.remaining_steps, &record.goal_state)
            .await
    }

    /// Apply `steps` to `cluster`, growing the color opposite `starting_group`
    ///
    /// # Errors
    /// `TransitionError::Precondition` if the path does not connect the
    /// cluster to the goal; `TransitionError::Step` when a step fails
    pub async fn transition(
        &self,
        cluster: &Cluster,
        starting_group: Color,
        steps: &[Step],
        goal: &ClusterState,
    ) -> Result<TransitionReport, TransitionError> {
        check_path(&cluster.as_cluster_state(), steps, goal)?;

        let grow = starting_group.other();
        let mut report = TransitionReport {
            dry_run: self.config.dry_run,
            ..TransitionReport::default()
        };
        let mut known_good: HashSet<String> = cluster[grow].hosts.iter().cloned().collect();
        let mut observed = cluster.clone();

        for (index, step) in steps.iter().enumerate() {
            let apply = self.controller.create_apply(goal, step);
            if self.config.dry_run {
                let description = apply.describe();
                tracing::info!(step = %step, "{description}");
                report.planned.push(description);
                continue;
            }

            let mut run = StepRun {
                grow,
                known_good: &mut known_good,
                observed: &mut observed,
                report: &mut report,
            };
            if let Err(cause) = self.run_step(apply.as_ref(), &mut run).await {
                tracing::error!(step = %step, error = %cause, "step failed");
                return Err(TransitionError::Step(Box::new(StepError {
                    cause,
                    remaining_steps: steps[index..].to_vec(),
                    original_cluster: observed,
                    starting_group,
                    goal_state: goal.clone(),
                })));
            }

            report.steps_applied += 1;
            tracing::info!(
                "completed step: blue with {} nodes and green with {} nodes",
                step.blue,
                step.green
            );
        }

        Ok(report)
    }

    /// Apply one step until no bad host is left
    async fn run_step(&self, apply: &dyn Runnable, run: &mut StepRun<'_>) -> Result<(), StepFailure> {
        let mut attempts = 0u32;
        let mut carried = TaintErrors::new();
        let mut untainted: HashSet<String> = HashSet::new();

        loop {
            attempts += 1;
            tracing::debug!(runner = %apply.describe(), attempt = attempts, "applying step");

            if let Err(source) = apply.output().await {
                return Err(StepFailure::Apply {
                    runnable: apply.describe(),
                    source,
                    taints: carried,
                });
            }

            *run.observed = match self.controller.get_cluster().await {
                Ok(cluster) => cluster,
                Err(source) => {
                    return Err(StepFailure::Observe {
                        source,
                        taints: carried,
                    });
                }
            };

            let hosts = &run.observed[run.grow].hosts;
            if hosts.iter().any(|host| untainted.contains(host)) {
                return Err(StepFailure::Taint(carried));
            }
            if !carried.is_empty() {
                tracing::warn!(errors = %carried, "taint failures healed by re-application");
                run.report.taint_failures.extend(carried.errors().iter().cloned());
                carried = TaintErrors::new();
            }

            let new_hosts: Vec<String> = hosts
                .iter()
                .filter(|host| !host.is_empty() && !run.known_good.contains(*host))
                .cloned()
                .collect();
            let round = validation::validate_hosts(&self.controller, &self.validator, new_hosts).await?;
            run.report.hosts_validated += round.checked();
            let needs_rerun = round.needs_rerun();
            run.known_good.extend(round.valid);

            if !needs_rerun {
                return Ok(());
            }

            tracing::info!(invalid = ?round.invalid, attempt = attempts, "invalid hosts found, re-applying step");
            if self.config.retry.exhausted(attempts) {
                return Err(StepFailure::RetryLimitExceeded {
                    attempts,
                    taints: round.taint_errors,
                });
            }

            untainted = round.untainted.into_iter().collect();
            carried = round.taint_errors;
            run.report.reapplications += 1;
            if !self.config.retry.backoff.is_zero() {
                tokio::time::sleep(self.config.retry.backoff).await;
            }
        }
    }
}

/// Mutable state threaded through the steps of one transition
struct StepRun<'a> {
    grow: Color,
    known_good: &'a mut HashSet<String>,
    observed: &'a mut Cluster,
    report: &'a mut TransitionReport,
}

/// Recorded steps, led by the observed composition when needed
///
/// The observed composition may only lead the path when it is one move away
/// from the first recorded step: the same counts, or a change in a single
/// color. An empty cluster is left to [`check_path`].
fn resume_path(current: Step, steps: &[Step]) -> Result<Vec<Step>, PreconditionError> {
    let Some(first) = steps.first() else {
        return Ok(Vec::new());
    };
    if current.total() == 0 || (*first == current && steps.len() >= 2) {
        return Ok(steps.to_vec());
    }

    let changed = Color::ALL.into_iter().filter(|&color| current[color] != first[color]).count();
    if changed > 1 {
        return Err(PreconditionError::FirstStepMismatch {
            cluster: current,
            first: *first,
        });
    }

    let mut path = Vec::with_capacity(steps.len() + 1);
    path.push(current);
    path.extend_from_slice(steps);
    Ok(path)
}

/// Check that `steps` leads from `current` to `goal`
///
/// # Errors
/// `PreconditionError` describing the first mismatch
pub fn check_path(current: &ClusterState, steps: &[Step], goal: &ClusterState) -> Result<(), PreconditionError> {
    let (Some(first), Some(last)) = (steps.first(), steps.last()) else {
        return Err(PreconditionError::EmptyPath);
    };

    if !current.is_empty() {
        if steps.len() < 2 {
            return Err(PreconditionError::TooFewSteps(steps.len()));
        }
        if !current.equal_step(first) {
            return Err(PreconditionError::FirstStepMismatch {
                cluster: current.as_step(),
                first: *first,
            });
        }
    }

    if !goal.equal_step(last) {
        return Err(PreconditionError::LastStepMismatch {
            goal: goal.as_step(),
            last: *last,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClusterGroupState;

    fn state(blue: usize, green: usize) -> ClusterState {
        ClusterState::new(
            ClusterGroupState {
                count: blue,
                ..ClusterGroupState::default()
            },
            ClusterGroupState {
                count: green,
                ..ClusterGroupState::default()
            },
        )
    }

    #[test]
    fn path_must_not_be_empty() {
        assert_eq!(
            check_path(&state(0, 0), &[], &state(1, 0)),
            Err(PreconditionError::EmptyPath)
        );
    }

    #[test]
    fn populated_cluster_needs_two_steps() {
        assert_eq!(
            check_path(&state(2, 0), &[Step::new(2, 0)], &state(2, 0)),
            Err(PreconditionError::TooFewSteps(1))
        );
    }

    #[test]
    fn first_step_must_match_cluster() {
        let err = check_path(&state(2, 0), &[Step::new(1, 0), Step::new(0, 1)], &state(0, 1));
        assert!(matches!(err, Err(PreconditionError::FirstStepMismatch { .. })));
    }

    #[test]
    fn last_step_must_match_goal() {
        let err = check_path(&state(1, 0), &[Step::new(1, 0), Step::new(1, 1)], &state(0, 1));
        assert!(matches!(err, Err(PreconditionError::LastStepMismatch { .. })));
    }

    #[test]
    fn empty_cluster_skips_first_step_check() {
        assert!(check_path(&state(0, 0), &[Step::new(0, 1)], &state(0, 1)).is_ok());
    }

    #[test]
    fn resume_path_starts_at_observed_cluster() {
        let steps = [Step::new(1, 1), Step::new(0, 1)];
        assert_eq!(
            resume_path(Step::new(1, 0), &steps),
            Ok(vec![Step::new(1, 0), Step::new(1, 1), Step::new(0, 1)])
        );
        assert_eq!(resume_path(Step::new(1, 1), &steps), Ok(steps.to_vec()));
        assert_eq!(
            resume_path(Step::new(0, 1), &[Step::new(0, 1)]),
            Ok(vec![Step::new(0, 1), Step::new(0, 1)])
        );
    }

    #[test]
    fn resume_path_rejects_drift_in_both_colors() {
        let steps = [Step::new(1, 2), Step::new(0, 2), Step::new(0, 3)];
        assert_eq!(
            resume_path(Step::new(2, 0), &steps),
            Err(PreconditionError::FirstStepMismatch {
                cluster: Step::new(2, 0),
                first: Step::new(1, 2),
            })
        );
    }

    #[test]
    fn resume_path_leaves_empty_cluster_and_path_alone() {
        let steps = [Step::new(0, 1), Step::new(0, 2)];
        assert_eq!(resume_path(Step::new(0, 0), &steps), Ok(steps.to_vec()));
        assert_eq!(resume_path(Step::new(2, 0), &[]), Ok(Vec::new()));
    }

    #[test]
    fn retry_policy_bounds() {
        let policy = RetryPolicy::unbounded();
        assert!(!policy.exhausted(u32::MAX));
        let policy = RetryPolicy::unbounded().with_max_attempts(0);
        assert_eq!(policy.max_attempts, Some(1));
        assert!(policy.exhausted(1));
    }
}
