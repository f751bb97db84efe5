//! Liveness and version endpoints.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::application::error::HttpError;

use super::HttpState;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Serialize)]
pub(super) struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "PDF generation service is running",
    })
}

/// Build metadata baked in at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub api_version: String,
    pub build_date: String,
    pub built_by: String,
    #[serde(rename = "builtWithGoVersion")]
    pub toolchain: String,
    pub commit: String,
    pub repo_url: String,
}

impl BuildInfo {
    pub fn from_env() -> Self {
        Self {
            api_version: env!("CARGO_PKG_VERSION").to_string(),
            build_date: option_env!("PRINTGATE_BUILD_DATE").unwrap_or(UNKNOWN).to_string(),
            built_by: option_env!("PRINTGATE_BUILT_BY").unwrap_or(UNKNOWN).to_string(),
            toolchain: option_env!("PRINTGATE_RUSTC_VERSION")
                .unwrap_or(UNKNOWN)
                .to_string(),
            commit: option_env!("PRINTGATE_COMMIT").unwrap_or(UNKNOWN).to_string(),
            repo_url: option_env!("PRINTGATE_REPO_URL")
                .unwrap_or(UNKNOWN)
                .to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionResponse<'a> {
    #[serde(flatten)]
    build: &'a BuildInfo,
    weasyprint_version: &'a str,
}

pub(super) async fn version_info(State(state): State<HttpState>) -> Response {
    match state.version.get().await {
        Ok(weasyprint_version) => Json(VersionResponse {
            build: &state.build,
            weasyprint_version,
        })
        .into_response(),
        Err(err) => HttpError::from_error(
            "infra::http::version_info",
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to get weasyprint version: {err}"),
            &err,
        )
        .into_response(),
    }
}
