use axum::{
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::application::error::HttpError;

pub(super) const DEFAULT_FILENAME: &str = "document.pdf";
pub(super) const DEMO_FILENAME: &str = "test.pdf";

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// RFC 5987 `attr-char`: everything else in `filename*` is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Trim the requested name, fall back to `default`, and make sure it ends in
/// `.pdf` (case-insensitively). Control characters are dropped.
pub(super) fn normalize_filename(requested: Option<&str>, default: &str) -> String {
    let cleaned: Option<String> = requested
        .map(|name| name.chars().filter(|c| !c.is_control()).collect::<String>())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    match cleaned {
        Some(name) if name.to_ascii_lowercase().ends_with(".pdf") => name,
        Some(name) => format!("{name}.pdf"),
        None => default.to_string(),
    }
}

pub(super) fn content_disposition(filename: &str) -> Result<HeaderValue, HttpError> {
    let quoted = filename.replace('\\', "\\\\").replace('"', "\\\"");
    let encoded = utf8_percent_encode(filename, ATTR_CHAR);
    let value = format!("attachment; filename=\"{quoted}\"; filename*=UTF-8''{encoded}");

    HeaderValue::from_bytes(value.as_bytes()).map_err(|err| {
        HttpError::from_error(
            "infra::http::content_disposition",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
    })
}

pub(super) fn pdf_response(filename: &str, pdf: Vec<u8>) -> Response {
    let disposition = match content_disposition(filename) {
        Ok(value) => value,
        Err(err) => return err.into_response(),
    };

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static(PDF_CONTENT_TYPE)),
            (CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response()
}
