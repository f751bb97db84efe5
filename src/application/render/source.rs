use std::{ffi::OsStr, path::Path};

use tempfile::NamedTempFile;
use url::Url;

use super::invoker::RenderError;

/// What the renderer reads: a remote document or inline markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderSource {
    Remote(String),
    Markup(String),
}

impl RenderSource {
    /// Inputs with an `http(s)://` prefix that also parse as URLs are fetched by
    /// the renderer itself; everything else is treated as HTML.
    pub fn classify(input: impl Into<String>) -> Self {
        let input = input.into();
        if is_remote(&input) {
            Self::Remote(input)
        } else {
            Self::Markup(input)
        }
    }

    /// Resolve into something the renderer can read. Markup is written to a
    /// temporary `.html` file that lives as long as the returned value.
    pub(crate) async fn prepare(&self) -> Result<PreparedSource, RenderError> {
        match self {
            RenderSource::Remote(url) => Ok(PreparedSource::Remote(url.clone())),
            RenderSource::Markup(html) => {
                let file = tempfile::Builder::new()
                    .prefix("pdfgen-")
                    .suffix(".html")
                    .tempfile()
                    .map_err(RenderError::Input)?;
                tokio::fs::write(file.path(), html.as_bytes())
                    .await
                    .map_err(RenderError::Input)?;
                Ok(PreparedSource::File(file))
            }
        }
    }
}

fn is_remote(input: &str) -> bool {
    (input.starts_with("http://") || input.starts_with("https://")) && Url::parse(input).is_ok()
}

#[derive(Debug)]
pub(crate) enum PreparedSource {
    Remote(String),
    File(NamedTempFile),
}

impl PreparedSource {
    pub(crate) fn as_os_str(&self) -> &OsStr {
        match self {
            PreparedSource::Remote(url) => OsStr::new(url),
            PreparedSource::File(file) => file.path().as_os_str(),
        }
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        match self {
            PreparedSource::Remote(_) => None,
            PreparedSource::File(file) => Some(file.path()),
        }
    }
}
