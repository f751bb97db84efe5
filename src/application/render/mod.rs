//! PDF rendering: option sanitisation, argument construction and the renderer
//! subprocess.
//!
//! Handlers describe what to render with a [`RenderRequest`]; [`PdfRenderer`]
//! turns it into an [`ArgumentSequence`] and streams the renderer's output into
//! whatever sink the caller provides (an in-memory buffer for inline responses,
//! a temporary file when the document is relayed to a sharing service).

mod invoker;
mod source;
mod version;

use std::path::PathBuf;

use tokio::io::AsyncWrite;
use tracing::debug;

use crate::domain::{
    arguments::{ArgumentSequence, build_arguments},
    options::{RawOptions, RenderOptions},
};

pub use invoker::{RenderError, WeasyPrint};
pub use source::RenderSource;
pub use version::{RendererVersion, VersionProbeError};

/// A document assembled from uploaded files inside a request workspace.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub html_path: PathBuf,
    pub stylesheets: Vec<PathBuf>,
    pub attachments: Vec<PathBuf>,
    pub options: RenderOptions,
}

#[derive(Debug, Clone)]
pub enum RenderRequest {
    Files(RenderJob),
    Source {
        source: RenderSource,
        options: RenderOptions,
    },
}

#[derive(Debug, Clone)]
pub struct PdfRenderer {
    weasyprint: WeasyPrint,
    cache_folder: Option<PathBuf>,
}

impl PdfRenderer {
    pub fn new(weasyprint: WeasyPrint, cache_folder: Option<PathBuf>) -> Self {
        Self {
            weasyprint,
            cache_folder,
        }
    }

    pub fn binary(&self) -> &std::path::Path {
        self.weasyprint.binary()
    }

    /// Sanitise client options; absent options yield the defaults.
    pub fn sanitize(&self, raw: Option<&RawOptions>) -> RenderOptions {
        raw.map(RenderOptions::validate)
            .unwrap_or_default()
            .with_cache_folder(self.cache_folder.clone())
    }

    pub async fn render<W>(
        &self,
        destination: &mut W,
        request: &RenderRequest,
    ) -> Result<u64, RenderError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        match request {
            RenderRequest::Files(job) => {
                let args = build_arguments(Some(&job.options))
                    .with_stylesheets(&job.stylesheets)
                    .with_attachments(&job.attachments)
                    .with_source(&job.html_path);
                self.invoke(destination, &args).await
            }
            RenderRequest::Source { source, options } => {
                // Keeps the temporary HTML file alive until the renderer exits.
                let prepared = source.prepare().await?;
                if let Some(path) = prepared.path() {
                    debug!(
                        target = "printgate::render",
                        path = %path.display(),
                        "Staged inline markup"
                    );
                }
                let args = build_arguments(Some(options)).with_source(prepared.as_os_str());
                self.invoke(destination, &args).await
            }
        }
    }

    async fn invoke<W>(
        &self,
        destination: &mut W,
        args: &ArgumentSequence,
    ) -> Result<u64, RenderError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        debug!(
            target = "printgate::render",
            binary = %self.weasyprint.binary().display(),
            args = %args,
            "Invoking renderer"
        );
        self.weasyprint.render(destination, args).await
    }
}
