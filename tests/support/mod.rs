//! Router harness shared by the integration tests.
#![allow(dead_code)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, header::CONTENT_TYPE},
    response::Response,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

use printgate::{
    application::{
        render::{PdfRenderer, RendererVersion, WeasyPrint},
        share::{ShareEndpoints, ShareRelay},
    },
    infra::http::{BuildInfo, HttpState, build_router},
};

pub const BOUNDARY: &str = "printgate-test-boundary";
pub const UNREACHABLE_SHARE: &str = "http://127.0.0.1:9";

/// Prints a PDF marker, every argument, the contents of each stylesheet and
/// the HTML source so responses can be inspected after the workspace is gone.
pub const ECHO_RENDERER: &str = r#"if [ "$1" = "--version" ]; then
  echo "WeasyPrint version 62.3"
  exit 0
fi
printf '%%PDF-1.7\n'
prev=""
for arg in "$@"; do
  printf 'arg:%s\n' "$arg"
  if [ "$prev" = "--stylesheet" ]; then printf 'css:'; cat "$arg"; printf '\n'; fi
  if [ "$arg" = "-" ] && [ -f "$prev" ]; then printf 'html:'; cat "$prev"; printf '\n'; fi
  prev="$arg"
done"#;

pub struct HarnessOptions<'a> {
    pub script: &'a str,
    pub share_base: &'a str,
    pub body_limit: usize,
    pub request_timeout: Duration,
    pub renderer_deadline: Duration,
}

impl Default for HarnessOptions<'_> {
    fn default() -> Self {
        Self {
            script: ECHO_RENDERER,
            share_base: UNREACHABLE_SHARE,
            body_limit: 1024 * 1024,
            request_timeout: Duration::from_secs(10),
            renderer_deadline: Duration::from_secs(10),
        }
    }
}

pub struct Harness {
    dir: TempDir,
    pub router: Router,
}

impl Harness {
    /// Directory holding the fake renderer; removed with the harness.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

pub fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("weasyprint");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("set perms");
    path
}

pub fn endpoints(base: &str) -> ShareEndpoints {
    ShareEndpoints {
        file_io: Url::parse(&format!("{base}/fileio")).expect("url"),
        ki_tc: Url::parse(&format!("{base}/file/u/")).expect("url"),
        c_v_sh: Url::parse(&format!("{base}/cvsh")).expect("url"),
    }
}

pub fn harness_from(options: HarnessOptions<'_>) -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let binary = write_script(dir.path(), options.script);
    let renderer = PdfRenderer::new(
        WeasyPrint::new(&binary, options.renderer_deadline),
        None,
    );
    let share =
        ShareRelay::new(endpoints(options.share_base), Duration::from_secs(5)).expect("relay");

    let state = HttpState {
        version: Arc::new(RendererVersion::new(binary.as_path())),
        renderer: Arc::new(renderer),
        share: Arc::new(share),
        build: Arc::new(BuildInfo::from_env()),
    };

    Harness {
        dir,
        router: build_router(state, options.request_timeout, options.body_limit),
    }
}

pub fn harness_with(script: &str, share_base: &str, body_limit: usize) -> Harness {
    harness_from(HarnessOptions {
        script,
        share_base,
        body_limit,
        ..Default::default()
    })
}

pub fn harness() -> Harness {
    harness_from(HarnessOptions::default())
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.expect("router response")
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

pub fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
    let mut body = String::new();
    for (name, filename, content) in parts {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        match filename {
            Some(filename) => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )),
            None => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
            )),
        }
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body.into_bytes()
}

pub fn file_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

pub fn html_request(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

pub fn arg_lines(output: &str) -> Vec<&str> {
    output
        .lines()
        .filter_map(|line| line.strip_prefix("arg:"))
        .collect()
}
