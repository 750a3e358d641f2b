//! Subprocess runnable
//!
//! Every `output()` call spawns a fresh process, so one runner can be
//! re-applied any number of times. Stdout and stderr are captured and can be
//! echoed to the terminal while the command runs.

use crate::config::{ValuePair, DEFAULT_BINARY};
use carousel_core::{Runnable, RunnableError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

/// Terminal attachment for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOptions {
    /// Attach stdin
    pub interactive: bool,
    /// Echo stdout while capturing it
    pub show_output: bool,
    /// Capture stderr without echoing it
    pub suppress_err_output: bool,
}

impl RunOptions {
    /// Capture everything, echo nothing
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            suppress_err_output: true,
            ..Self::default()
        }
    }

    /// Set stdin attachment
    #[inline]
    #[must_use]
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Set stdout echo
    #[inline]
    #[must_use]
    pub fn with_show_output(mut self, show: bool) -> Self {
        self.show_output = show;
        self
    }

    /// Set stderr suppression
    #[inline]
    #[must_use]
    pub fn with_suppress_err_output(mut self, suppress: bool) -> Self {
        self.suppress_err_output = suppress;
        self
    }
}

/// A command line that can be run repeatedly
#[derive(Debug, Clone)]
pub struct CommandRunner {
    binary: String,
    args: Vec<String>,
    working_directory: PathBuf,
    env: Vec<(String, String)>,
    masked: Vec<String>,
    options: RunOptions,
}

impl CommandRunner {
    /// Create a runner
    ///
    /// An empty binary falls back to `terraform`; a working directory that
    /// does not exist falls back to the current directory.
    pub fn new<I, S>(working_directory: Option<&Path>, binary: &str, options: RunOptions, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let binary = if binary.is_empty() { DEFAULT_BINARY } else { binary };
        let working_directory = working_directory
            .filter(|dir| dir.is_dir())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            binary: binary.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            working_directory,
            env: Vec::new(),
            masked: Vec::new(),
            options,
        }
    }

    /// Add environment variables named `<prefix><key>`
    ///
    /// Values never appear in [`describe`](Runnable::describe); each variable
    /// is shown as `<prefix><key>=xxxx` in front of the command.
    #[must_use]
    pub fn with_environment(mut self, prefix: &str, pairs: &[ValuePair]) -> Self {
        for pair in pairs {
            let name = format!("{prefix}{}", pair.key);
            self.masked.insert(0, format!("{name}=xxxx"));
            self.env.push((name, pair.value.clone()));
        }
        self
    }

    /// Arguments after the binary
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Extra environment, unmasked
    #[must_use]
    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    /// Directory the command runs in
    #[must_use]
    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }
}

#[async_trait::async_trait]
impl Runnable for CommandRunner {
    async fn output(&self) -> Result<Vec<u8>, RunnableError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args)
            .current_dir(&self.working_directory)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if self.options.interactive {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| {
            RunnableError::new(format!("failed to start {}: {err}", self.binary))
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let echo_out = self.options.show_output;
        let echo_err = !self.options.suppress_err_output;

        let ((out, out_failure), (err, err_failure), status) = tokio::join!(
            tee(stdout, echo_out.then(tokio::io::stdout)),
            tee(stderr, echo_err.then(tokio::io::stderr)),
            child.wait(),
        );

        let status = status.map_err(|e| RunnableError::new(format!("failed to wait for {}: {e}", self.binary)))?;
        if let Some(e) = &err_failure {
            tracing::warn!(command = %self.binary, error = %e, "stderr capture truncated");
        }
        if status.success() {
            // Truncated stdout would be parsed as if it were complete.
            return match out_failure {
                None => Ok(out),
                Some(e) => Err(RunnableError::new(format!("failed to read stdout of {}: {e}", self.binary))
                    .with_output(out, err)
                    .with_exit_code(status.code())),
            };
        }

        let mut message = status
            .code()
            .map_or_else(|| "terminated by signal".to_string(), |code| format!("exit status {code}"));
        for (stream, failure) in [("stdout", &out_failure), ("stderr", &err_failure)] {
            if let Some(e) = failure {
                message.push_str(&format!("; {stream} capture failed: {e}"));
            }
        }
        Err(RunnableError::new(message)
            .with_output(out, err)
            .with_exit_code(status.code()))
    }

    fn describe(&self) -> String {
        let mut parts = self.masked.clone();
        parts.push(self.binary.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Read `source` to the end, copying into `echo` when given
///
/// A read error stops the capture; the bytes read so far are returned with it.
async fn tee<R, W>(source: Option<R>, mut echo: Option<W>) -> (Vec<u8>, Option<std::io::Error>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut captured = Vec::new();
    let Some(mut source) = source else {
        return (captured, None);
    };

    let mut buf = [0u8; 4096];
    let mut failure = None;
    loop {
        match source.read(&mut buf).await {
            Ok(0) => break,
            Err(err) => {
                failure = Some(err);
                break;
            }
            Ok(n) => {
                captured.extend_from_slice(&buf[..n]);
                if let Some(w) = echo.as_mut() {
                    let _ = w.write_all(&buf[..n]).await;
                }
            }
        }
    }
    if let Some(w) = echo.as_mut() {
        let _ = w.flush().await;
    }
    (captured, failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Yields one chunk, then fails
    struct Broken {
        sent: bool,
    }

    impl AsyncRead for Broken {
        fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
            if self.sent {
                return Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed")));
            }
            self.sent = true;
            buf.put_slice(b"partial");
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn describe_masks_environment() {
        let runner = CommandRunner::new(None, "terraform", RunOptions::quiet(), ["apply", "--auto-approve"])
            .with_environment("TF_VAR_", &[ValuePair::new("token", "s3cr3t")])
            .with_environment("", &[ValuePair::new("AWS_PROFILE", "dev")]);

        assert_eq!(
            runner.describe(),
            "AWS_PROFILE=xxxx TF_VAR_token=xxxx terraform apply --auto-approve"
        );
        assert!(!runner.describe().contains("s3cr3t"));
        assert_eq!(
            runner.environment(),
            &[
                ("TF_VAR_token".to_string(), "s3cr3t".to_string()),
                ("AWS_PROFILE".to_string(), "dev".to_string()),
            ]
        );
    }

    #[test]
    fn empty_binary_and_missing_directory_fall_back() {
        let runner = CommandRunner::new(
            Some(Path::new("/definitely/not/here")),
            "",
            RunOptions::default(),
            ["state", "pull"],
        );
        assert_eq!(runner.describe(), "terraform state pull");
        assert_eq!(runner.working_directory(), Path::new("."));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_is_rerunnable() {
        let runner = CommandRunner::new(None, "sh", RunOptions::quiet(), ["-c", "printf hello"]);
        assert_eq!(runner.output().await.unwrap(), b"hello");
        assert_eq!(runner.output().await.unwrap(), b"hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_carries_stderr_and_exit_code() {
        let runner = CommandRunner::new(None, "sh", RunOptions::quiet(), ["-c", "echo oops >&2; exit 3"]);
        let err = runner.output().await.unwrap_err();
        assert_eq!(err.exit_code, Some(3));
        assert_eq!(err.stderr, b"oops\n");
        assert_eq!(err.message, "exit status 3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn environment_reaches_child() {
        let runner = CommandRunner::new(None, "sh", RunOptions::quiet(), ["-c", "printf \"$TF_VAR_name\""])
            .with_environment("TF_VAR_", &[ValuePair::new("name", "carousel")]);
        assert_eq!(runner.output().await.unwrap(), b"carousel");
    }

    #[tokio::test]
    async fn missing_binary_fails_to_start() {
        let runner = CommandRunner::new(None, "carousel-no-such-binary", RunOptions::quiet(), Vec::<String>::new());
        let err = runner.output().await.unwrap_err();
        assert!(err.message.starts_with("failed to start carousel-no-such-binary"));
        assert_eq!(err.exit_code, None);
    }

    #[tokio::test]
    async fn read_error_is_returned_with_partial_output() {
        let (captured, failure) = tee(Some(Broken { sent: false }), None::<tokio::io::Stdout>).await;
        assert_eq!(captured, b"partial");
        assert_eq!(failure.map(|e| e.kind()), Some(std::io::ErrorKind::BrokenPipe));
    }

    #[tokio::test]
    async fn missing_stream_captures_nothing() {
        let (captured, failure) = tee(None::<Broken>, None::<tokio::io::Stdout>).await;
        assert!(captured.is_empty());
        assert!(failure.is_none());
    }
}
