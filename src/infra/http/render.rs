//! Rendering endpoints.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{Multipart, multipart::MultipartRejection};
use bytes::Bytes;
use serde::Deserialize;
use tracing::warn;

use crate::{
    application::{
        error::HttpError,
        render::{RenderError, RenderJob, RenderRequest, RenderSource},
        share::{ShareError, ShareRelay},
    },
    domain::{
        options::RawOptions,
        share::{ShareResult, ShareService},
    },
    infra::workspace::RequestWorkspace,
};

use super::{
    HttpState,
    multipart::read_render_form,
    response::{DEFAULT_FILENAME, DEMO_FILENAME, normalize_filename, pdf_response},
};

const SOURCE_BASE: &str = "infra::http::render";

pub(super) const DEMO_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Test Document</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 20px; }
        h1 { color: #333; }
    </style>
</head>
<body>
    <h1>Hello, World! 🌍</h1>
    <p>This is a test PDF document.</p>
</body>
</html>"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RenderQuery {
    filename: Option<String>,
    share_service: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HtmlRenderBody {
    html: String,
    options: Option<RawOptions>,
    share_service: Option<String>,
}

pub(super) async fn render_file(
    State(state): State<HttpState>,
    Query(query): Query<RenderQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            return HttpError::from_error(
                SOURCE_BASE,
                StatusCode::BAD_REQUEST,
                "multipart/form-data request required",
                &rejection,
            )
            .into_response();
        }
    };

    let workspace = match RequestWorkspace::create() {
        Ok(workspace) => workspace,
        Err(err) => {
            return HttpError::from_error(
                SOURCE_BASE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &err,
            )
            .into_response();
        }
    };

    let form = match read_render_form(&mut multipart, &workspace).await {
        Ok(form) => form,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let filename = normalize_filename(query.filename.as_deref(), DEFAULT_FILENAME);
    let service = select_service([query.share_service.as_deref()]);
    let request = RenderRequest::Files(RenderJob {
        html_path: form.html,
        stylesheets: form.stylesheets,
        attachments: form.attachments,
        options: state.renderer.sanitize(form.options.as_ref()),
    });

    // `workspace` stays alive until the response is ready.
    let response = deliver(&state, &request, &filename, service).await;
    drop(workspace);
    response
}

pub(super) async fn render_html(
    State(state): State<HttpState>,
    Query(query): Query<RenderQuery>,
    body: Bytes,
) -> Response {
    let body: HtmlRenderBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(err) => {
            return HttpError::from_error(
                SOURCE_BASE,
                StatusCode::BAD_REQUEST,
                format!("JSON format error: {err}"),
                &err,
            )
            .into_response();
        }
    };

    let filename = normalize_filename(query.filename.as_deref(), DEFAULT_FILENAME);
    let service = select_service([body.share_service.as_deref(), query.share_service.as_deref()]);
    let request = RenderRequest::Source {
        source: RenderSource::classify(body.html),
        options: state.renderer.sanitize(body.options.as_ref()),
    };

    deliver(&state, &request, &filename, service).await
}

pub(super) async fn render_demo(
    State(state): State<HttpState>,
    Query(query): Query<RenderQuery>,
) -> Response {
    let filename = normalize_filename(query.filename.as_deref(), DEMO_FILENAME);
    let service = select_service([query.share_service.as_deref()]);
    let request = RenderRequest::Source {
        source: RenderSource::Markup(DEMO_HTML.to_string()),
        options: state.renderer.sanitize(None),
    };

    deliver(&state, &request, &filename, service).await
}

/// First non-empty candidate wins; unknown services are logged and ignored.
fn select_service<const N: usize>(candidates: [Option<&str>; N]) -> Option<ShareService> {
    let name = candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())?;

    match ShareRelay::resolve(name) {
        Ok(service) => Some(service),
        Err(err) => {
            warn!(
                target = "printgate::share",
                requested = name,
                error = %err,
                "Ignoring unsupported share service"
            );
            None
        }
    }
}

async fn deliver(
    state: &HttpState,
    request: &RenderRequest,
    filename: &str,
    service: Option<ShareService>,
) -> Response {
    match service {
        None => {
            let mut pdf = Vec::new();
            match state.renderer.render(&mut pdf, request).await {
                Ok(_) => pdf_response(filename, pdf),
                Err(err) => render_error(&err).into_response(),
            }
        }
        Some(service) => match share(state, request, filename, service).await {
            Ok(result) => Json(result).into_response(),
            Err(err) => err.into_response(),
        },
    }
}

async fn share(
    state: &HttpState,
    request: &RenderRequest,
    filename: &str,
    service: ShareService,
) -> Result<ShareResult, HttpError> {
    let temp = tempfile::Builder::new()
        .prefix("pdfshare-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|err| internal_error(&err))?;
    let handle = temp.reopen().map_err(|err| internal_error(&err))?;
    let mut file = tokio::fs::File::from_std(handle);

    state
        .renderer
        .render(&mut file, request)
        .await
        .map_err(|err| render_error(&err))?;
    drop(file);

    state
        .share
        .upload(temp.path(), filename, service)
        .await
        .map_err(|err| share_error(&err))
}

fn render_error(err: &RenderError) -> HttpError {
    match err {
        RenderError::Input(_) => internal_error(err),
        RenderError::TimedOut(_) => HttpError::from_error(
            SOURCE_BASE,
            StatusCode::GATEWAY_TIMEOUT,
            "Request timed out",
            err,
        ),
        _ => HttpError::from_error(
            SOURCE_BASE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "PDF generation failed",
            err,
        ),
    }
}

fn share_error(err: &ShareError) -> HttpError {
    HttpError::from_error(
        SOURCE_BASE,
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to upload to sharing service: {err}"),
        err,
    )
}

fn internal_error(err: &dyn std::error::Error) -> HttpError {
    HttpError::from_error(
        SOURCE_BASE,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_service_takes_precedence_over_query() {
        assert_eq!(
            select_service([Some("c-v.sh"), Some("ki.tc")]),
            Some(ShareService::CvSh)
        );
        assert_eq!(
            select_service([Some(""), Some("ki.tc")]),
            Some(ShareService::KiTc)
        );
        assert_eq!(
            select_service([None, Some(" file.io ")]),
            Some(ShareService::FileIo)
        );
    }

    #[test]
    fn unknown_or_missing_services_fall_back_to_inline() {
        assert_eq!(select_service([Some("dropbox")]), None);
        assert_eq!(select_service([None, None]), None);
        assert_eq!(select_service::<0>([]), None);
    }

    #[test]
    fn html_body_accepts_missing_fields() {
        let body: HtmlRenderBody = serde_json::from_slice(br#"{"html":"<p>x</p>"}"#).expect("parse");
        assert_eq!(body.html, "<p>x</p>");
        assert!(body.options.is_none());
        assert!(body.share_service.is_none());

        let body: HtmlRenderBody =
            serde_json::from_slice(br#"{"html":"h","options":null,"share_service":"ki.tc"}"#)
                .expect("parse");
        assert!(body.options.is_none());
        assert_eq!(body.share_service.as_deref(), Some("ki.tc"));
    }
}
