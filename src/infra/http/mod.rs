mod middleware;
mod multipart;
mod render;
mod response;
mod system;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};

use crate::application::{
    render::{PdfRenderer, RendererVersion},
    share::ShareRelay,
};

pub use middleware::RequestContext;
pub use system::BuildInfo;

/// Shared handles for every request.
#[derive(Clone)]
pub struct HttpState {
    pub renderer: Arc<PdfRenderer>,
    pub share: Arc<ShareRelay>,
    pub version: Arc<RendererVersion>,
    pub build: Arc<BuildInfo>,
}

/// Assemble the public router.
///
/// `request_timeout` bounds every handler; `body_limit` caps request bodies
/// in bytes.
pub fn build_router(state: HttpState, request_timeout: Duration, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(system::health))
        .route("/api/v1/pdf/render/file", post(render::render_file))
        .route(
            "/api/v1/pdf/render/html",
            post(render::render_html).get(render::render_demo),
        )
        .route("/api/v1/pdf/version", get(system::version_info))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(
            request_timeout,
            middleware::enforce_request_timeout,
        ))
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
}
