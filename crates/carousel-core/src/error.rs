//! Error types for Carousel Core
//!
//! Provides error handling for:
//! - Unclean cluster states and unknown colors
//! - Goal state resolution
//! - Controller and runnable failures
//! - Transition preconditions
//! - Resumable step failures (`StepError`), the only state persisted between runs

use crate::model::{Cluster, ClusterState, Color, Step};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Cluster model errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Both colors have nodes, so the current group is ambiguous
    #[error("cluster is not in a clean state: {0}")]
    NotCleanState(String),

    /// Text that names no valid color
    #[error("unknown color: {0:?}")]
    UnknownColor(String),
}

/// Goal state resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GoalError {
    /// The current group could not be determined
    #[error("failed to determine current group: {0}")]
    DetermineGroup(#[from] ModelError),
}

/// Failure of a [`Runnable`](crate::controller::Runnable), with its captured output
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RunnableError {
    /// Human readable failure
    pub message: String,
    /// Captured standard output
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
    /// Exit code, if the process ran to completion
    pub exit_code: Option<i32>,
}

impl RunnableError {
    /// Create error without captured output
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: None,
        }
    }

    /// Attach captured output
    #[inline]
    #[must_use]
    pub fn with_output(mut self, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    /// Attach exit code
    #[inline]
    #[must_use]
    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    /// Captured stderr, falling back to the message when nothing was captured
    #[must_use]
    pub fn diagnostic_text(&self) -> String {
        if self.stderr.is_empty() {
            self.message.clone()
        } else {
            String::from_utf8_lossy(&self.stderr).into_owned()
        }
    }
}

/// Infrastructure controller errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// Cluster could not be observed
    #[error("failed to get cluster state: {0}")]
    ClusterUnavailable(String),

    /// Cluster state was observed but could not be understood
    #[error("failed to build cluster state: {0}")]
    InvalidState(String),

    /// Hostname was blank
    #[error("hostname can not be empty")]
    EmptyHostname,

    /// Hostname is not in either group
    #[error("host not part of group: {0}")]
    HostNotInGroup(String),

    /// Resources could not be listed
    #[error("failed to list resources: {0}")]
    ResourceListing(String),

    /// Host could not be resolved to resources for tainting
    #[error("failed to taint host {host}: {reason}")]
    TaintHost {
        /// Host being tainted
        host: String,
        /// Why its resources could not be resolved
        reason: String,
    },

    /// A resource taint command failed
    #[error("tainting failed with runner {runner}: {source}")]
    TaintResource {
        /// Runner description
        runner: String,
        /// Underlying failure
        #[source]
        source: RunnableError,
    },

    /// Resource no longer exists
    #[error("resource {0} not found, could be an outdated terraform")]
    NoSuchResource(String),

    /// Workspace could not be prepared
    #[error("failed to {action} workspace {workspace:?}: {source}")]
    Workspace {
        /// Operation that failed (init, show, list, select, create)
        action: &'static str,
        /// Workspace name
        workspace: String,
        /// Underlying failure
        #[source]
        source: RunnableError,
    },
}

impl ControllerError {
    /// Check if the error means the host is unknown to the cluster
    #[inline]
    #[must_use]
    pub fn is_unknown_host(&self) -> bool {
        matches!(self, Self::EmptyHostname | Self::HostNotInGroup(_))
    }
}

/// Several taint failures collected from one validation round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaintErrors(Vec<ControllerError>);

impl TaintErrors {
    /// Create empty list
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error
    #[inline]
    pub fn push(&mut self, error: ControllerError) {
        self.0.push(error);
    }

    /// True if no error was collected
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of errors
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Collected errors
    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[ControllerError] {
        &self.0
    }
}

impl From<Vec<ControllerError>> for TaintErrors {
    fn from(errors: Vec<ControllerError>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for TaintErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("multiple errors: [")?;
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{error}")?;
        }
        f.write_str("]")
    }
}

impl std::error::Error for TaintErrors {}

fn with_taints(taints: &TaintErrors) -> String {
    if taints.is_empty() {
        String::new()
    } else {
        format!("; earlier taint failures: {taints}")
    }
}

/// Why a step could not be completed
#[derive(Debug, thiserror::Error)]
pub enum StepFailure {
    /// Applying the step failed
    #[error("{source}: with runnable {runnable}{}", with_taints(.taints))]
    Apply {
        /// Description of the runnable
        runnable: String,
        /// Failure with captured output
        #[source]
        source: RunnableError,
        /// Taint failures from the previous validation round of this step
        taints: TaintErrors,
    },

    /// The cluster could not be observed after applying
    #[error("{source}{}", with_taints(.taints))]
    Observe {
        /// Controller failure
        #[source]
        source: ControllerError,
        /// Taint failures from the previous validation round of this step
        taints: TaintErrors,
    },

    /// Invalid hosts could not be tainted and survived a re-application
    #[error("{0}")]
    Taint(TaintErrors),

    /// A validation task did not complete
    #[error("validation of host {host} did not complete: {reason}")]
    Validation {
        /// Host being validated
        host: String,
        /// Join failure
        reason: String,
    },

    /// The retry policy gave up on the step
    #[error("step still had invalid hosts after {attempts} applications{}", with_taints(.taints))]
    RetryLimitExceeded {
        /// Applications performed
        attempts: u32,
        /// Taint failures from the last validation round
        taints: TaintErrors,
    },

    /// Cause read back from a step file
    #[error("{0}")]
    Recorded(String),
}

impl StepFailure {
    fn unrecorded() -> Self {
        Self::Recorded(String::from("unknown cause"))
    }

    /// Taint failures folded into this cause
    #[must_use]
    pub fn taint_errors(&self) -> Option<&TaintErrors> {
        match self {
            Self::Apply { taints, .. }
            | Self::Observe { taints, .. }
            | Self::RetryLimitExceeded { taints, .. }
            | Self::Taint(taints) => Some(taints).filter(|t| !t.is_empty()),
            Self::Validation { .. } | Self::Recorded(_) => None,
        }
    }
}

/// Resumable failure of a transition
///
/// Holds exactly what the executor needs to continue: the step that failed
/// and every later step, the starting color and the goal. Serializes to a flat
/// JSON record so another process can resume from it.
#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
#[error("{cause}")]
pub struct StepError {
    /// Why the step failed; serialized as text only
    #[source]
    #[serde(with = "recorded_cause", default = "StepFailure::unrecorded")]
    pub cause: StepFailure,
    /// Failed step followed by every later step
    #[serde(alias = "todo")]
    pub remaining_steps: Vec<Step>,
    /// Last observed cluster
    pub original_cluster: Cluster,
    /// Active color when the transition started
    pub starting_group: Color,
    /// Target of the transition
    pub goal_state: ClusterState,
}

impl StepError {
    /// Pretty JSON record
    ///
    /// # Errors
    /// Serialization failure
    pub fn to_json(&self) -> Result<String, StepFileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a JSON record
    ///
    /// # Errors
    /// Malformed record
    pub fn from_json(data: &str) -> Result<Self, StepFileError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Write the record to a step file
    ///
    /// # Errors
    /// Serialization or I/O failure
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), StepFileError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a record from a step file
    ///
    /// # Errors
    /// I/O failure or malformed record
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, StepFileError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

mod recorded_cause {
    use super::StepFailure;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(cause: &StepFailure, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(cause)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<StepFailure, D::Error> {
        String::deserialize(d).map(StepFailure::Recorded)
    }
}

/// Step file persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StepFileError {
    /// File could not be read or written
    #[error("step file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("step file is malformed: {0}")]
    Format(#[from] serde_json::Error),
}

/// Transition preconditions; fatal and never retried
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    /// No steps at all
    #[error("migration path is empty")]
    EmptyPath,

    /// A populated cluster needs a start and an end step
    #[error("a populated cluster needs at least 2 steps, got {0}")]
    TooFewSteps(usize),

    /// First step does not describe the observed cluster
    #[error("current cluster ({cluster}) doesn't match first step ({first})")]
    FirstStepMismatch {
        /// Observed counts
        cluster: Step,
        /// First step
        first: Step,
    },

    /// Last step does not describe the goal
    #[error("goal state ({goal}) doesn't match last step ({last})")]
    LastStepMismatch {
        /// Goal counts
        goal: Step,
        /// Last step
        last: Step,
    },
}

/// Top level transition error
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    /// Cluster could not be observed before starting
    #[error("could not observe cluster")]
    Cluster(#[source] ControllerError),

    /// Goal state could not be established
    #[error("failed to establish goal state: {0}")]
    Goal(#[from] GoalError),

    /// Steps and cluster disagree
    #[error("invalid transition: {0}")]
    Precondition(#[from] PreconditionError),

    /// A step failed; resumable
    #[error(transparent)]
    Step(#[from] Box<StepError>),
}

impl TransitionError {
    /// Check if the transition can be resumed from a step file
    #[inline]
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Step(_))
    }

    /// Resumable record, if any
    #[inline]
    #[must_use]
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::Step(err) => Some(&**err),
            _ => None,
        }
    }
}
