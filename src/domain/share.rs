use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File-sharing services a rendered document can be relayed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShareService {
    #[serde(rename = "file.io")]
    FileIo,
    #[serde(rename = "ki.tc")]
    KiTc,
    #[serde(rename = "c-v.sh")]
    CvSh,
}

impl ShareService {
    pub const ALL: [ShareService; 3] = [ShareService::FileIo, ShareService::KiTc, ShareService::CvSh];

    pub fn as_str(self) -> &'static str {
        match self {
            ShareService::FileIo => "file.io",
            ShareService::KiTc => "ki.tc",
            ShareService::CvSh => "c-v.sh",
        }
    }
}

impl fmt::Display for ShareService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported share service `{0}`")]
pub struct UnknownShareService(pub String);

impl FromStr for ShareService {
    type Err = UnknownShareService;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|service| service.as_str() == value)
            .ok_or_else(|| UnknownShareService(value.to_string()))
    }
}

/// Outcome of relaying a document, returned to the client as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareResult {
    pub link: String,
    pub service: ShareService,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl ShareResult {
    pub fn shared(service: ShareService, link: impl Into<String>, filename: &str) -> Self {
        Self {
            link: link.into(),
            service,
            success: true,
            message: None,
            filename: (!filename.is_empty()).then(|| filename.to_string()),
        }
    }
}
