//! Subcommand handlers

use crate::cli::TransitionArgs;
use crate::config::CarouselConfig;
use crate::validator::CommandValidator;
use anyhow::{anyhow, Context};
use carousel_core::{
    Carousel, Cluster, Color, Controller, ControllerError, StepError, TaintErrors, TransitionError,
    TransitionReport,
};
use carousel_terraform::{ApplyOptions, TerraformController};
use clap::ArgMatches;
use semver::Version;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// How a command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Exit 0
    Success,
    /// Exit 1; the failure has already been reported
    Failed,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Failed => ExitCode::FAILURE,
        }
    }
}

/// Run the subcommand in `matches`
///
/// # Errors
/// Any failure that is not a recorded step failure
pub async fn dispatch(matches: &ArgMatches) -> anyhow::Result<Outcome> {
    let config = CarouselConfig::load(matches.get_one::<PathBuf>("file").map(PathBuf::as_path))?;

    match matches.subcommand() {
        Some(("rollout", args)) => {
            let count = *args.get_one::<usize>("count").context("missing node count")?;
            let version = args.get_one::<Version>("version").cloned().context("missing version")?;
            let transition = TransitionArgs::from_matches(args);
            let (carousel, config) = prepare(config, &transition).await?;
            let result = carousel.rollout(count, version, &config.step_options()).await;
            finish_transition(result, &transition)
        }
        Some(("resume", args)) => {
            let path = args.get_one::<PathBuf>("step-file").context("missing step file")?;
            let record = StepError::read_from(path)
                .with_context(|| format!("failed to read step file {}", path.display()))?;
            let transition = TransitionArgs::from_matches(args);
            let (carousel, _) = prepare(config, &transition).await?;
            let result = carousel.resume_from(&record).await;
            finish_transition(result, &transition)
        }
        Some(("state", args)) => {
            let controller = terraform(&config, false);
            let cluster = controller.get_cluster().await?;
            println!("{}", render_cluster(&cluster, args.get_flag("full"), args.get_flag("json"))?);
            Ok(Outcome::Success)
        }
        Some(("taint", args)) => {
            let hosts: Vec<String> = args.get_many::<String>("hosts").into_iter().flatten().cloned().collect();
            let controller = terraform(&config, false);
            taint_hosts(controller.as_ref(), &hosts).await?;
            Ok(Outcome::Success)
        }
        Some(("version", args)) => {
            println!("{}", version_text(args.get_flag("json"))?);
            Ok(Outcome::Success)
        }
        Some((name, _)) => Err(anyhow!("unknown command {name:?}")),
        None => Err(anyhow!("no command given")),
    }
}

fn terraform(config: &CarouselConfig, show_output: bool) -> Arc<dyn Controller> {
    let apply = ApplyOptions {
        show_output,
        show_errors: show_output,
    };
    Arc::new(TerraformController::new(config.binary.clone(), apply))
}

/// Build the executor for `rollout` and `resume`, selecting the workspace first
async fn prepare(
    mut config: CarouselConfig,
    args: &TransitionArgs,
) -> anyhow::Result<(Carousel, CarouselConfig)> {
    config.apply_overrides(args);
    let controller = terraform(&config, !args.quiet);
    controller
        .select_workspace(&config.workspace)
        .await
        .with_context(|| format!("failed to select workspace {:?}", config.workspace))?;

    let mut carousel = Carousel::new(controller, config.transition_config(args.dry_run));
    if let Some(program) = &config.validator.command {
        tracing::debug!(program = %program, "validating hosts with command");
        carousel = carousel.with_validator(Arc::new(CommandValidator::new(
            program.clone(),
            config.validator.args.clone(),
        )));
    }
    Ok((carousel, config))
}

/// Report a finished transition
///
/// A step failure is written to the output file (or printed when that
/// fails) and ends as [`Outcome::Failed`]; other errors are returned.
///
/// # Errors
/// Failures before the first step, such as an unreachable cluster
pub fn finish_transition(
    result: Result<TransitionReport, TransitionError>,
    args: &TransitionArgs,
) -> anyhow::Result<Outcome> {
    match result {
        Ok(report) => {
            print_report(&report);
            Ok(Outcome::Success)
        }
        Err(TransitionError::Step(record)) => {
            tracing::error!(error = %record, "transition halted");
            match record.write_to(&args.output) {
                Ok(()) => {
                    eprintln!(
                        "Transition halted; resume with: carousel resume {}",
                        args.output.display()
                    );
                }
                Err(err) => {
                    tracing::error!(path = %args.output.display(), error = %err, "could not write step file");
                    println!("{}", record.to_json()?);
                }
            }
            Ok(Outcome::Failed)
        }
        Err(err) => Err(err.into()),
    }
}

fn print_report(report: &TransitionReport) {
    if report.dry_run {
        for description in &report.planned {
            println!("{description}");
        }
        println!("Planned {} steps", report.planned.len());
        return;
    }
    println!("Transition complete");
    println!("  Steps applied: {}", report.steps_applied);
    println!("  Hosts validated: {}", report.hosts_validated);
    println!("  Re-applications: {}", report.reapplications);
    if !report.taint_failures.is_empty() {
        println!("  Healed taint failures: {}", report.taint_failures.len());
    }
}

/// Format a cluster for `state`
///
/// # Errors
/// JSON serialization failure
pub fn render_cluster(cluster: &Cluster, full: bool, json: bool) -> anyhow::Result<String> {
    if json {
        let text = if full {
            serde_json::to_string_pretty(cluster)?
        } else {
            serde_json::to_string_pretty(&cluster.as_cluster_state())?
        };
        return Ok(text);
    }
    if !full {
        return Ok(cluster.as_cluster_state().to_string());
    }

    let mut lines = Vec::new();
    for color in Color::ALL {
        let group = &cluster[color];
        lines.push(format!("{}@{}:", color.title(), group.version));
        lines.extend(group.hosts.iter().map(|host| format!("  {host}")));
    }
    Ok(lines.join("\n"))
}

/// Taint every host, reporting all failures together
///
/// # Errors
/// `TaintErrors` with one entry per host that could not be tainted
pub async fn taint_hosts(controller: &dyn Controller, hosts: &[String]) -> Result<(), TaintErrors> {
    let mut errors: Vec<ControllerError> = Vec::new();
    for host in hosts {
        match controller.taint_host(host).await {
            Ok(()) => println!("Tainted {host}"),
            Err(err) => {
                tracing::error!(host = %host, error = %err, "taint failed");
                errors.push(err);
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TaintErrors::from(errors))
    }
}

/// Text printed by `version`
///
/// # Errors
/// JSON serialization failure
pub fn version_text(json: bool) -> anyhow::Result<String> {
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    if json {
        let value = serde_json::json!({
            "name": "carousel",
            "version": crate::VERSION,
            "core": carousel_core::VERSION,
            "os": os,
            "arch": arch,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }
    Ok(format!(
        "carousel {} (core {}) {os}/{arch}",
        crate::VERSION,
        carousel_core::VERSION
    ))
}
