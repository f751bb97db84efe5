use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::domain::share::ShareService;

use super::ShareError;

/// Per-service knowledge: where to upload and how to read the answer.
pub trait ShareAdapter: Send + Sync + std::fmt::Debug {
    fn service(&self) -> ShareService;

    fn endpoint(&self) -> &Url;

    /// Extract the public link from a completed upload response.
    fn extract_link(&self, status: StatusCode, body: &[u8]) -> Result<String, ShareError>;
}

#[derive(Debug, Clone)]
pub struct FileIo {
    endpoint: Url,
}

impl FileIo {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }
}

#[derive(Deserialize)]
struct FileIoResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    link: String,
}

impl ShareAdapter for FileIo {
    fn service(&self) -> ShareService {
        ShareService::FileIo
    }

    fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    // file.io reports failures in the body, so the status code is not checked.
    fn extract_link(&self, _status: StatusCode, body: &[u8]) -> Result<String, ShareError> {
        let response: FileIoResponse =
            serde_json::from_slice(body).map_err(|err| ShareError::MalformedResponse {
                service: self.service(),
                detail: err.to_string(),
            })?;

        if !response.success {
            return Err(ShareError::Rejected {
                service: self.service(),
                reason: "upload was not accepted".to_string(),
            });
        }

        Ok(response.link)
    }
}

#[derive(Debug, Clone)]
pub struct KiTc {
    endpoint: Url,
}

impl KiTc {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }
}

#[derive(Deserialize)]
struct KiTcResponse {
    #[serde(default)]
    file: KiTcFile,
}

#[derive(Deserialize, Default)]
struct KiTcFile {
    #[serde(default)]
    download_page: String,
}

impl ShareAdapter for KiTc {
    fn service(&self) -> ShareService {
        ShareService::KiTc
    }

    fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn extract_link(&self, status: StatusCode, body: &[u8]) -> Result<String, ShareError> {
        expect_status(self.service(), status, StatusCode::CREATED)?;

        let response: KiTcResponse =
            serde_json::from_slice(body).map_err(|err| ShareError::MalformedResponse {
                service: self.service(),
                detail: err.to_string(),
            })?;

        if response.file.download_page.is_empty() {
            return Err(ShareError::Rejected {
                service: self.service(),
                reason: "missing download page URL in response".to_string(),
            });
        }

        Ok(response.file.download_page)
    }
}

#[derive(Debug, Clone)]
pub struct CvSh {
    endpoint: Url,
}

impl CvSh {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }
}

impl ShareAdapter for CvSh {
    fn service(&self) -> ShareService {
        ShareService::CvSh
    }

    fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    // c-v.sh answers with the bare URL as plain text.
    fn extract_link(&self, status: StatusCode, body: &[u8]) -> Result<String, ShareError> {
        expect_status(self.service(), status, StatusCode::OK)?;

        let text = String::from_utf8_lossy(body);
        let link = text.trim();
        if !link.starts_with("http") {
            return Err(ShareError::MalformedResponse {
                service: self.service(),
                detail: format!("invalid URL response: {link}"),
            });
        }

        Ok(link.to_string())
    }
}

fn expect_status(
    service: ShareService,
    status: StatusCode,
    expected: StatusCode,
) -> Result<(), ShareError> {
    if status == expected {
        Ok(())
    } else {
        Err(ShareError::UnexpectedStatus { service, status })
    }
}
