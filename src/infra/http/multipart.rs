//! Multipart parsing for file-based rendering requests.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum_extra::extract::{Multipart, multipart::MultipartError};
use thiserror::Error;
use tracing::debug;

use crate::{
    application::error::HttpError,
    domain::options::RawOptions,
    infra::workspace::{RequestWorkspace, WorkspaceError},
};

const SOURCE_BASE: &str = "infra::http::multipart";
const HTML_FIELD: &str = "html";
const OPTIONS_FIELD: &str = "options";
const STYLESHEET_PREFIX: &str = "css.";
const ATTACHMENT_PREFIX: &str = "asset.";
const HTML_FALLBACK_NAME: &str = "index.html";

/// Uploaded document parts, stored inside the request workspace.
#[derive(Debug)]
pub(super) struct RenderForm {
    pub(super) html: PathBuf,
    pub(super) stylesheets: Vec<PathBuf>,
    pub(super) attachments: Vec<PathBuf>,
    pub(super) options: Option<RawOptions>,
}

#[derive(Debug, Error)]
pub(super) enum UploadFormError {
    #[error("Form parsing failed: {0}")]
    Multipart(#[source] MultipartError),
    #[error("invalid JSON format options")]
    InvalidOptions(#[source] serde_json::Error),
    #[error("missing HTML file")]
    MissingHtml,
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl From<UploadFormError> for HttpError {
    fn from(err: UploadFormError) -> Self {
        match &err {
            UploadFormError::Multipart(inner) => multipart_error(inner, &err),
            UploadFormError::InvalidOptions(_) | UploadFormError::MissingHtml => {
                HttpError::from_error(SOURCE_BASE, StatusCode::BAD_REQUEST, err.to_string(), &err)
            }
            UploadFormError::Workspace(WorkspaceError::Stream { source }) => {
                match source.downcast_ref::<MultipartError>() {
                    Some(inner) => multipart_error(inner, &err),
                    None => internal(&err),
                }
            }
            UploadFormError::Workspace(_) => internal(&err),
        }
    }
}

fn multipart_error(inner: &MultipartError, err: &UploadFormError) -> HttpError {
    match inner.status() {
        StatusCode::PAYLOAD_TOO_LARGE => HttpError::from_error(
            SOURCE_BASE,
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large",
            err,
        ),
        _ => HttpError::from_error(
            SOURCE_BASE,
            StatusCode::BAD_REQUEST,
            format!("Form parsing failed: {inner}"),
            err,
        ),
    }
}

fn internal(err: &UploadFormError) -> HttpError {
    HttpError::from_error(
        SOURCE_BASE,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        err,
    )
}

/// Stream every document part to disk and collect the render inputs.
///
/// `html` is required; `css.*` and `asset.*` parts may repeat; the first
/// `options` part is parsed as JSON. Other parts are skipped. A default
/// stylesheet is written when no `css.*` part was sent.
pub(super) async fn read_render_form(
    multipart: &mut Multipart,
    workspace: &RequestWorkspace,
) -> Result<RenderForm, UploadFormError> {
    let mut html = None;
    let mut stylesheets = Vec::new();
    let mut attachments = Vec::new();
    let mut options = None;
    let mut options_seen = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(UploadFormError::Multipart)?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == OPTIONS_FIELD {
            let text = field.text().await.map_err(UploadFormError::Multipart)?;
            if !options_seen {
                options_seen = true;
                options = serde_json::from_str::<Option<RawOptions>>(&text)
                    .map_err(UploadFormError::InvalidOptions)?;
            }
            continue;
        }

        let slot = if name == HTML_FIELD {
            FieldSlot::Html
        } else if name.starts_with(STYLESHEET_PREFIX) {
            FieldSlot::Stylesheet
        } else if name.starts_with(ATTACHMENT_PREFIX) {
            FieldSlot::Attachment
        } else {
            debug!(target = SOURCE_BASE, field = %name, "Skipping unknown form field");
            continue;
        };

        let fallback = match slot {
            FieldSlot::Html => HTML_FALLBACK_NAME,
            _ => name.as_str(),
        };
        let path = workspace.resolve(field.file_name(), fallback);
        let bytes = workspace.store_stream(&path, field).await?;
        debug!(
            target = SOURCE_BASE,
            field = %name,
            path = %path.display(),
            bytes,
            "Stored uploaded part"
        );

        match slot {
            FieldSlot::Html => html = Some(path),
            FieldSlot::Stylesheet => stylesheets.push(path),
            FieldSlot::Attachment => attachments.push(path),
        }
    }

    let html = html.ok_or(UploadFormError::MissingHtml)?;
    if stylesheets.is_empty() {
        stylesheets.push(workspace.write_default_stylesheet().await?);
    }

    Ok(RenderForm {
        html,
        stylesheets,
        attachments,
        options,
    })
}

#[derive(Clone, Copy)]
enum FieldSlot {
    Html,
    Stylesheet,
    Attachment,
}
