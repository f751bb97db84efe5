use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::{Duration, Instant},
};

use metrics::{counter, histogram};
use thiserror::Error;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    process::Command,
    time::timeout,
};
use tracing::{info, warn};

use crate::domain::arguments::ArgumentSequence;

const METRIC_RENDER_TOTAL: &str = "printgate_render_total";
const METRIC_RENDER_MS: &str = "printgate_render_ms";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer executable `{binary}` not found: {source}")]
    NotFound { binary: PathBuf, source: io::Error },
    #[error("failed to spawn renderer: {0}")]
    Spawn(io::Error),
    #[error("renderer exited unsuccessfully (exit {exit_code:?})")]
    Exit { exit_code: Option<i32> },
    #[error("failed to copy renderer output: {0}")]
    Output(io::Error),
    #[error("failed to wait for renderer: {0}")]
    Wait(io::Error),
    #[error("renderer did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("failed to prepare renderer input: {0}")]
    Input(io::Error),
}

impl RenderError {
    fn code(&self) -> &'static str {
        match self {
            RenderError::NotFound { .. } => "not_found",
            RenderError::Spawn(_) => "spawn",
            RenderError::Exit { .. } => "exit",
            RenderError::Output(_) => "output",
            RenderError::Wait(_) => "wait",
            RenderError::TimedOut(_) => "timed_out",
            RenderError::Input(_) => "input",
        }
    }
}

/// Runs the WeasyPrint executable and streams the PDF it writes to stdout.
#[derive(Debug, Clone)]
pub struct WeasyPrint {
    binary: PathBuf,
    deadline: Duration,
}

impl WeasyPrint {
    pub fn new(binary: impl Into<PathBuf>, deadline: Duration) -> Self {
        Self {
            binary: binary.into(),
            deadline,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run the renderer with `args`, copying its standard output into `destination`.
    ///
    /// The child is killed when the deadline elapses or when the returned future
    /// is dropped. Returns the number of bytes written.
    pub async fn render<W>(
        &self,
        destination: &mut W,
        args: &ArgumentSequence,
    ) -> Result<u64, RenderError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let started_at = Instant::now();
        let result = self.run(destination, args).await;
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(bytes) => {
                counter!(METRIC_RENDER_TOTAL, "result" => "ok").increment(1);
                info!(
                    target = "printgate::render",
                    op = "weasyprint::render",
                    result = "ok",
                    elapsed_ms = elapsed_ms as u64,
                    bytes = *bytes,
                    "Renderer produced PDF"
                );
            }
            Err(err) => {
                counter!(METRIC_RENDER_TOTAL, "result" => err.code()).increment(1);
                warn!(
                    target = "printgate::render",
                    op = "weasyprint::render",
                    result = "error",
                    elapsed_ms = elapsed_ms as u64,
                    error_code = err.code(),
                    error = %err,
                    args = %args,
                    "Renderer invocation failed"
                );
            }
        }
        histogram!(METRIC_RENDER_MS).record(elapsed_ms);

        result
    }

    async fn run<W>(
        &self,
        destination: &mut W,
        args: &ArgumentSequence,
    ) -> Result<u64, RenderError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut child = Command::new(&self.binary)
            .args(args.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    RenderError::NotFound {
                        binary: self.binary.clone(),
                        source: err,
                    }
                } else {
                    RenderError::Spawn(err)
                }
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| RenderError::Output(io::Error::other("renderer stdout not captured")))?;

        let outcome = timeout(self.deadline, async {
            let written = tokio::io::copy(&mut stdout, destination)
                .await
                .map_err(RenderError::Output)?;
            destination.flush().await.map_err(RenderError::Output)?;
            let status = child.wait().await.map_err(RenderError::Wait)?;
            Ok::<(u64, ExitStatus), RenderError>((written, status))
        })
        .await;

        let (written, status) = match outcome {
            Ok(result) => result?,
            Err(_) => {
                if let Err(err) = child.kill().await {
                    warn!(
                        target = "printgate::render",
                        op = "weasyprint::kill",
                        error = %err,
                        "Failed to kill timed out renderer"
                    );
                }
                return Err(RenderError::TimedOut(self.deadline));
            }
        };

        if !status.success() {
            return Err(RenderError::Exit {
                exit_code: status.code(),
            });
        }

        Ok(written)
    }
}
