#![cfg(unix)]

mod support;

use std::{
    fs,
    process::Command,
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    http::{
        Request, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
};
use httpmock::MockServer;
use serde_json::{Value, json};
use tempfile::TempDir;

use support::{
    ECHO_RENDERER, HarnessOptions, UNREACHABLE_SHARE, arg_lines, body_text, file_request, harness,
    harness_from, harness_with, html_request, multipart, send,
};

#[tokio::test]
async fn health_reports_running() {
    let harness = harness();
    let response = send(
        &harness.router,
        Request::get("/").body(Body::empty()).expect("request"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(
        body,
        json!({ "status": "ok", "message": "PDF generation service is running" })
    );
}

#[tokio::test]
async fn version_includes_renderer_output() {
    let harness = harness();
    let response = send(
        &harness.router,
        Request::get("/api/v1/pdf/version")
            .body(Body::empty())
            .expect("request"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(body["weasyprintVersion"], "WeasyPrint version 62.3");
    assert_eq!(body["apiVersion"], env!("CARGO_PKG_VERSION"));
    for key in ["buildDate", "builtBy", "builtWithGoVersion", "commit", "repoUrl"] {
        assert!(body[key].is_string(), "missing {key}");
    }
}

#[tokio::test]
async fn version_lookup_failure_is_a_server_error() {
    let harness = harness_with("exit 7", UNREACHABLE_SHARE, 1024);
    let response = send(
        &harness.router,
        Request::get("/api/v1/pdf/version")
            .body(Body::empty())
            .expect("request"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body_text(response)
            .await
            .starts_with("failed to get weasyprint version: ")
    );
}

#[tokio::test]
async fn file_upload_renders_with_default_stylesheet() {
    let harness = harness();
    let body = multipart(&[
        ("options", None, r#"{"dpi": 150, "javascript": true}"#),
        ("html", Some("report.html"), "<h1>Quarterly</h1>"),
        ("asset.logo", Some("logo.png"), "PNG"),
        ("unrelated", None, "ignored"),
    ]);

    let response = send(
        &harness.router,
        file_request("/api/v1/pdf/render/file?filename=quarterly", body),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).expect("content type"),
        "application/pdf"
    );
    assert_eq!(
        response
            .headers()
            .get(CONTENT_DISPOSITION)
            .expect("disposition"),
        "attachment; filename=\"quarterly.pdf\"; filename*=UTF-8''quarterly.pdf"
    );

    let output = body_text(response).await;
    assert!(output.starts_with("%PDF-1.7\n"));
    let args = arg_lines(&output);
    assert_eq!(&args[..2], &["--dpi", "150"]);
    assert!(!args.contains(&"--javascript"));
    assert_eq!(args[2], "--stylesheet");
    assert!(args[3].ends_with("default.css"));
    assert_eq!(args[4], "--attachment");
    assert!(args[5].ends_with("logo.png"));
    assert!(args[6].ends_with("report.html"));
    assert_eq!(args[7], "-");
    assert!(output.contains("css:@page { size: A4; margin: 2cm 2.5cm; }"));
    assert!(output.contains("html:<h1>Quarterly</h1>"));
}

#[tokio::test]
async fn uploaded_stylesheets_replace_the_default() {
    let harness = harness();
    let body = multipart(&[
        ("html", Some("index.html"), "<p>styled</p>"),
        ("css.main", Some("main.css"), "p { color: red; }"),
        ("css.print", Some("print.css"), "@page { size: A5; }"),
    ]);

    let response = send(
        &harness.router,
        file_request("/api/v1/pdf/render/file", body),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(CONTENT_DISPOSITION)
            .expect("disposition"),
        "attachment; filename=\"document.pdf\"; filename*=UTF-8''document.pdf"
    );
    let output = body_text(response).await;
    assert!(output.contains("css:p { color: red; }"));
    assert!(output.contains("css:@page { size: A5; }"));
    assert!(!output.contains("default.css"));
}

#[tokio::test]
async fn file_upload_without_html_is_rejected() {
    let harness = harness();
    let body = multipart(&[("css.main", Some("main.css"), "p {}")]);

    let response = send(
        &harness.router,
        file_request("/api/v1/pdf/render/file", body),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "missing HTML file");
}

#[tokio::test]
async fn file_upload_with_bad_options_is_rejected() {
    let harness = harness();
    let body = multipart(&[
        ("options", None, "{not json"),
        ("html", Some("index.html"), "<p>x</p>"),
    ]);

    let response = send(
        &harness.router,
        file_request("/api/v1/pdf/render/file", body),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "invalid JSON format options");
}

#[tokio::test]
async fn file_route_requires_multipart() {
    let harness = harness();
    let response = send(
        &harness.router,
        html_request("/api/v1/pdf/render/file", json!({ "html": "<p>x</p>" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_uploads_are_rejected() {
    let harness = harness_with(ECHO_RENDERER, UNREACHABLE_SHARE, 256);
    let large = "x".repeat(4096);
    let body = multipart(&[("html", Some("index.html"), large.as_str())]);

    let response = send(
        &harness.router,
        file_request("/api/v1/pdf/render/file", body),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn html_post_renders_inline_markup() {
    let harness = harness();
    let response = send(
        &harness.router,
        html_request(
            "/api/v1/pdf/render/html?filename=%E6%8A%A5%E5%91%8A",
            json!({ "html": "<p>inline</p>", "options": { "pdf_variant": "pdf/a-3b" } }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(CONTENT_DISPOSITION)
            .expect("disposition")
            .as_bytes(),
        "attachment; filename=\"报告.pdf\"; filename*=UTF-8''%E6%8A%A5%E5%91%8A.pdf".as_bytes()
    );
    let output = body_text(response).await;
    let args = arg_lines(&output);
    assert_eq!(&args[..2], &["--pdf-variant", "pdf/a-3b"]);
    assert!(output.contains("html:<p>inline</p>"));
}

#[tokio::test]
async fn html_post_passes_urls_through() {
    let harness = harness();
    let response = send(
        &harness.router,
        html_request(
            "/api/v1/pdf/render/html",
            json!({ "html": "https://example.com/invoice" }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let output = body_text(response).await;
    assert_eq!(arg_lines(&output), vec!["https://example.com/invoice", "-"]);
}

#[tokio::test]
async fn html_post_with_malformed_json_is_rejected() {
    let harness = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/pdf/render/html")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{\"html\": "))
        .expect("request");

    let response = send(&harness.router, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.starts_with("JSON format error: "));
}

#[tokio::test]
async fn demo_document_uses_test_filename() {
    let harness = harness();
    let response = send(
        &harness.router,
        Request::get("/api/v1/pdf/render/html")
            .body(Body::empty())
            .expect("request"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(CONTENT_DISPOSITION)
            .expect("disposition"),
        "attachment; filename=\"test.pdf\"; filename*=UTF-8''test.pdf"
    );
    let output = body_text(response).await;
    assert!(output.contains("Hello, World!"));
}

#[tokio::test]
async fn renderer_failure_is_a_server_error() {
    let harness = harness_with("echo boom >&2\nexit 3", UNREACHABLE_SHARE, 1024 * 1024);
    let response = send(
        &harness.router,
        html_request("/api/v1/pdf/render/html", json!({ "html": "<p>x</p>" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "PDF generation failed");
}

#[tokio::test]
async fn unknown_share_service_falls_back_to_inline() {
    let harness = harness();
    let response = send(
        &harness.router,
        html_request(
            "/api/v1/pdf/render/html?share_service=dropbox",
            json!({ "html": "<p>x</p>" }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).expect("content type"),
        "application/pdf"
    );
}

#[tokio::test]
async fn html_post_shares_through_ki_tc() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/file/u/");
        then.status(201)
            .header("content-type", "application/json")
            .body(r#"{"file":{"download_page":"https://ki.tc/file/abc"}}"#);
    });
    let harness = harness_with(ECHO_RENDERER, &server.base_url(), 1024 * 1024);

    let response = send(
        &harness.router,
        html_request(
            "/api/v1/pdf/render/html?filename=shared&share_service=file.io",
            json!({ "html": "<p>share me</p>", "share_service": "ki.tc" }),
        ),
    )
    .await;

    mock.assert();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(
        body,
        json!({
            "link": "https://ki.tc/file/abc",
            "service": "ki.tc",
            "success": true,
            "filename": "shared.pdf",
        })
    );
}

#[tokio::test]
async fn file_upload_share_failure_reports_service_error() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/cvsh");
        then.status(200).body("not a link");
    });
    let harness = harness_with(ECHO_RENDERER, &server.base_url(), 1024 * 1024);
    let body = multipart(&[("html", Some("index.html"), "<p>x</p>")]);

    let response = send(
        &harness.router,
        file_request("/api/v1/pdf/render/file?share_service=%20c-v.sh%20", body),
    )
    .await;

    mock.assert();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body_text(response)
            .await
            .starts_with("Failed to upload to sharing service: ")
    );
}

/// A reaped or zombie process counts as gone.
fn process_alive(pid: &str) -> bool {
    if let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) {
        let state = stat.rsplit(')').next().map(str::trim_start);
        return !matches!(state.and_then(|rest| rest.chars().next()), Some('Z' | 'X'));
    }
    Command::new("kill")
        .args(["-0", pid])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn request_timeout_answers_504_and_kills_the_renderer() {
    let pids = TempDir::new().expect("temp dir");
    let pid_file = pids.path().join("renderer.pid");
    let script = format!("echo $$ > \"{}\"\nexec sleep 30", pid_file.display());
    let harness = harness_from(HarnessOptions {
        script: &script,
        request_timeout: Duration::from_millis(500),
        renderer_deadline: Duration::from_secs(30),
        ..Default::default()
    });

    let started = Instant::now();
    let response = send(
        &harness.router,
        Request::get("/api/v1/pdf/render/html")
            .body(Body::empty())
            .expect("request"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body_text(response).await, "Request timed out");
    assert!(started.elapsed() < Duration::from_secs(10));

    let pid = fs::read_to_string(&pid_file).expect("renderer started");
    let pid = pid.trim();
    let deadline = Instant::now() + Duration::from_secs(5);
    while process_alive(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!process_alive(pid), "renderer {pid} outlived the request");
}
