//! Host validation through an external command

use carousel_core::HostValidator;
use std::process::Stdio;
use tokio::process::Command;

/// Runs `<program> <args..> <hostname>`; exit status 0 marks the host valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandValidator {
    program: String,
    args: Vec<String>,
}

impl CommandValidator {
    /// Create a validator for `program`
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Program run for each host
    #[inline]
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait::async_trait]
impl HostValidator for CommandValidator {
    async fn validate(&self, hostname: &str) -> bool {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(hostname)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await;

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                tracing::warn!(host = hostname, %status, "host failed validation");
                false
            }
            Err(err) => {
                tracing::error!(host = hostname, program = %self.program, error = %err, "could not run validator");
                false
            }
        }
    }
}
