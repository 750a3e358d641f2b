//! Carousel CLI - blue/green rollouts from the command line
//!
//! Provides:
//! - The `carousel` command definition (`rollout`, `resume`, `state`, `taint`, `version`)
//! - `carousel.yaml` loading with command line overrides
//! - Log setup for human or JSON output
//! - `CommandValidator`, judging new hosts by an external command's exit status

#![warn(unreachable_pub)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod validator;

pub use cli::{build_cli, TransitionArgs, DEFAULT_OUTPUT};
pub use commands::{dispatch, finish_transition, Outcome};
pub use config::CarouselConfig;
pub use validator::CommandValidator;

/// Version of the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
