//! Apply construction

use crate::config::{ApplyOptions, BinaryConfig};
use crate::runner::{CommandRunner, RunOptions};
use carousel_core::{ClusterState, Color, Step};

/// Arguments for `terraform apply` realizing `step` on the way to `target`
///
/// Per color, in canonical order: `version<Color>Count=<n>` and
/// `version<Color>=<target version>`, then the configured `-var` pairs.
#[must_use]
pub fn apply_args(target: &ClusterState, step: &Step, config: &BinaryConfig) -> Vec<String> {
    let mut args = vec!["apply".to_string(), "--auto-approve".to_string()];
    for color in Color::ALL {
        let title = color.title();
        args.push("-var".into());
        args.push(format!("version{title}Count={}", step[color]));
        args.push("-var".into());
        args.push(format!("version{title}={}", target[color].version));
    }
    for pair in &config.args {
        args.push("-var".into());
        args.push(format!("{}={}", pair.key, pair.value));
    }
    args
}

/// Runnable for one apply
#[must_use]
pub fn build_apply(
    target: &ClusterState,
    step: &Step,
    config: &BinaryConfig,
    options: ApplyOptions,
) -> CommandRunner {
    let run = RunOptions::default()
        .with_show_output(options.show_output)
        .with_suppress_err_output(!options.show_errors);
    CommandRunner::new(
        config.working_directory.as_deref(),
        &config.binary,
        run,
        apply_args(target, step, config),
    )
    .with_environment("TF_VAR_", &config.private_args)
    .with_environment("", &config.environment)
}
