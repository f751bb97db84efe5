//! Relaying rendered documents to third-party file-sharing services.

mod adapters;

use std::{
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use metrics::counter;
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, HeaderValue},
    multipart::{Form, Part},
};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::domain::share::{ShareResult, ShareService, UnknownShareService};

pub use adapters::{CvSh, FileIo, KiTc, ShareAdapter};

const METRIC_SHARE_TOTAL: &str = "printgate_share_total";
const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum ShareError {
    #[error(transparent)]
    Unsupported(#[from] UnknownShareService),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to read `{path}`: {source}")]
    ReadFile { path: PathBuf, source: io::Error },
    #[error("request to {service} failed: {source}")]
    Transport {
        service: ShareService,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to upload to {service}: unexpected status {status}")]
    UnexpectedStatus {
        service: ShareService,
        status: StatusCode,
    },
    #[error("failed to parse {service} response: {detail}")]
    MalformedResponse {
        service: ShareService,
        detail: String,
    },
    #[error("{service} rejected the upload: {reason}")]
    Rejected {
        service: ShareService,
        reason: String,
    },
}

/// Upload endpoints, one per supported service.
#[derive(Debug, Clone)]
pub struct ShareEndpoints {
    pub file_io: Url,
    pub ki_tc: Url,
    pub c_v_sh: Url,
}

#[derive(Debug, Clone)]
pub struct ShareRelay {
    client: Client,
    file_io: FileIo,
    ki_tc: KiTc,
    c_v_sh: CvSh,
}

impl ShareRelay {
    pub fn new(endpoints: ShareEndpoints, timeout: Duration) -> Result<Self, ShareError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(ShareError::Client)?;

        Ok(Self {
            client,
            file_io: FileIo::new(endpoints.file_io),
            ki_tc: KiTc::new(endpoints.ki_tc),
            c_v_sh: CvSh::new(endpoints.c_v_sh),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("printgate/", env!("CARGO_PKG_VERSION"))
    }

    /// Parse a client-supplied service discriminator.
    pub fn resolve(name: &str) -> Result<ShareService, ShareError> {
        Ok(name.parse::<ShareService>()?)
    }

    fn adapter(&self, service: ShareService) -> &dyn ShareAdapter {
        match service {
            ShareService::FileIo => &self.file_io,
            ShareService::KiTc => &self.ki_tc,
            ShareService::CvSh => &self.c_v_sh,
        }
    }

    /// Upload the file at `path` as `filename` and return the public link.
    pub async fn upload(
        &self,
        path: &Path,
        filename: &str,
        service: ShareService,
    ) -> Result<ShareResult, ShareError> {
        let started_at = Instant::now();
        let result = self.send(path, filename, service).await;
        let elapsed_ms = started_at.elapsed().as_millis() as u64;

        match &result {
            Ok(shared) => {
                counter!(METRIC_SHARE_TOTAL, "service" => service.as_str(), "result" => "ok")
                    .increment(1);
                info!(
                    target = "printgate::share",
                    op = "share::upload",
                    service = service.as_str(),
                    result = "ok",
                    elapsed_ms,
                    link = %shared.link,
                    "Document shared"
                );
            }
            Err(err) => {
                counter!(METRIC_SHARE_TOTAL, "service" => service.as_str(), "result" => "error")
                    .increment(1);
                warn!(
                    target = "printgate::share",
                    op = "share::upload",
                    service = service.as_str(),
                    result = "error",
                    elapsed_ms,
                    error = %err,
                    "Sharing service upload failed"
                );
            }
        }

        result
    }

    async fn send(
        &self,
        path: &Path,
        filename: &str,
        service: ShareService,
    ) -> Result<ShareResult, ShareError> {
        let adapter = self.adapter(service);

        let data = tokio::fs::read(path)
            .await
            .map_err(|source| ShareError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;

        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(PDF_MIME)
            .map_err(ShareError::Client)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(adapter.endpoint().clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .multipart(form)
            .send()
            .await
            .map_err(|source| ShareError::Transport { service, source })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ShareError::Transport { service, source })?;

        let link = adapter.extract_link(status, &body)?;
        Ok(ShareResult::shared(service, link, filename))
    }
}
