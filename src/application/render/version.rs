use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
};

use thiserror::Error;
use tokio::{process::Command, sync::OnceCell};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionProbeError {
    #[error("failed to run `{binary} --version`: {message}")]
    Spawn { binary: String, message: String },
    #[error("`{binary} --version` exited unsuccessfully (exit {exit_code:?})")]
    Exit {
        binary: String,
        exit_code: Option<i32>,
    },
}

/// The renderer's self-reported version, probed once per process.
///
/// Concurrent first callers share one probe. A failed probe is remembered and
/// returned to every later caller.
#[derive(Debug)]
pub struct RendererVersion {
    binary: PathBuf,
    cell: OnceCell<Result<String, VersionProbeError>>,
}

impl RendererVersion {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Result<&str, VersionProbeError> {
        self.cell
            .get_or_init(|| probe(&self.binary))
            .await
            .as_deref()
            .map_err(Clone::clone)
    }
}

async fn probe(binary: &Path) -> Result<String, VersionProbeError> {
    let display = binary.display().to_string();
    let output = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| {
            let message = if err.kind() == ErrorKind::NotFound {
                "executable file not found".to_string()
            } else {
                err.to_string()
            };
            VersionProbeError::Spawn {
                binary: display.clone(),
                message,
            }
        });

    let result = output.and_then(|output| {
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(VersionProbeError::Exit {
                binary: display.clone(),
                exit_code: output.status.code(),
            })
        }
    });

    match &result {
        Ok(version) => info!(
            target = "printgate::render",
            op = "weasyprint::version",
            result = "ok",
            version = %version,
            "Probed renderer version"
        ),
        Err(err) => warn!(
            target = "printgate::render",
            op = "weasyprint::version",
            result = "error",
            error = %err,
            "Renderer version probe failed; caching failure"
        ),
    }

    result
}
