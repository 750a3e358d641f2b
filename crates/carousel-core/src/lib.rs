//! Carousel Core - blue/green cluster rollouts
//!
//! The orchestration logic behind a rollout:
//! - Resolves "N nodes at version V" into a target cluster state
//! - Schedules the migration path between two states
//! - Applies the path through an injected controller, validating new hosts
//!   and tainting bad ones until each step is clean
//! - Records a resumable [`StepError`] when a step cannot be completed
//!
//! # Example
//!
//! ```rust,ignore
//! use carousel_core::prelude::*;
//!
//! # async fn example(controller: std::sync::Arc<dyn Controller>) -> Result<(), TransitionError> {
//! let carousel = Carousel::new(controller, TransitionConfig::default());
//! let options = StepOptions::new().with_batch_size(2);
//!
//! let report = carousel.rollout(6, "1.2.0".parse().unwrap(), &options).await?;
//! println!("applied {} steps", report.steps_applied);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod controller;
pub mod error;
pub mod executor;
pub mod goal;
pub mod model;
pub mod step;

pub use controller::{accept_all, Controller, HostValidator, Runnable};
pub use error::{
    ControllerError, GoalError, ModelError, PreconditionError, RunnableError, StepError, StepFailure,
    StepFileError, TaintErrors, TransitionError,
};
pub use executor::{check_path, Carousel, Plan, RetryPolicy, TransitionConfig, TransitionReport};
pub use goal::build_end_state;
pub use model::{
    zero_version, Cluster, ClusterGroup, ClusterGroupState, ClusterState, Color, ColorMap, Step,
};
pub use step::{create_steps, StepOptions};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a rollout
    pub use crate::{
        Carousel, Cluster, ClusterState, Color, Controller, HostValidator, RetryPolicy, Runnable,
        Step, StepError, StepOptions, TransitionConfig, TransitionError, TransitionReport,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
