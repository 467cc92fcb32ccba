//! Integration tests for the HTTP API.
//!
//! The router runs on an ephemeral port and is called with reqwest. Assets are
//! served by a second local router; ffmpeg and ffprobe are shell stand-ins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;

use slidecast::server::{create_router, AppState, RENDER_PATH};
use slidecast::{AssetFetcher, Orchestrator, RenderSettings};

const SUBTITLES: &str = "[Script Info]\nScriptType: v4.00+\n\n[Events]\n";

/// Serve `router` on 127.0.0.1 and return its base URL
async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_service(scratch: &Path, settings: RenderSettings) -> String {
    let orchestrator = Orchestrator::new(scratch, settings, AssetFetcher::new().unwrap());
    spawn(create_router(AppState::new(Arc::new(orchestrator)))).await
}

/// Local host for images and narration; anything else is a 404
async fn spawn_assets() -> String {
    let assets = Router::new()
        .route("/a.jpg", get(|| async { "jpeg-a" }))
        .route("/b.jpg", get(|| async { "jpeg-b" }))
        .route("/c.jpg", get(|| async { "jpeg-c" }))
        .route("/voice.mp3", get(|| async { "id3" }));
    spawn(assets).await
}

fn form(image_urls: &[String], audio_url: &str) -> Form {
    Form::new()
        .text("image_urls_json", serde_json::to_string(image_urls).unwrap())
        .text("audio_url", audio_url.to_string())
        .part(
            "subtitle_file",
            Part::bytes(SUBTITLES.as_bytes().to_vec()).file_name("subs.ass"),
        )
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[cfg(unix)]
fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
fn stub_settings(tools: &Path, ffmpeg_body: &str) -> RenderSettings {
    RenderSettings {
        ffmpeg_path: write_tool(tools, "ffmpeg", ffmpeg_body),
        ffprobe_path: write_tool(tools, "ffprobe", "echo 10.0"),
        stage_timeout_secs: 5,
        ..RenderSettings::default()
    }
}

// ─── health ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_returns_ok() {
    let scratch = tempfile::tempdir().unwrap();
    let base = spawn_service(scratch.path(), RenderSettings::default()).await;

    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

// ─── request validation ──────────────────────────────────────────────────────

#[tokio::test]
async fn missing_subtitle_field_is_422() {
    let scratch = tempfile::tempdir().unwrap();
    let base = spawn_service(scratch.path(), RenderSettings::default()).await;

    let form = Form::new()
        .text("image_urls_json", r#"["https://a.example/1.jpg","https://a.example/2.jpg"]"#)
        .text("audio_url", "https://a.example/v.mp3");
    let response = reqwest::Client::new()
        .post(format!("{base}{RENDER_PATH}"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "invalid_request");
    assert!(body["detail"].as_str().unwrap().contains("subtitle_file"));
}

#[tokio::test]
async fn malformed_image_json_is_500() {
    let scratch = tempfile::tempdir().unwrap();
    let base = spawn_service(scratch.path(), RenderSettings::default()).await;

    let form = Form::new()
        .text("image_urls_json", "not json")
        .text("audio_url", "https://a.example/v.mp3")
        .part("subtitle_file", Part::bytes(b"x".to_vec()).file_name("s.ass"));
    let response = reqwest::Client::new()
        .post(format!("{base}{RENDER_PATH}"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "invalid_request");
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("An internal server error occurred: "));
    assert_eq!(entries(scratch.path()), 0);
}

#[tokio::test]
async fn non_http_audio_url_is_500() {
    let scratch = tempfile::tempdir().unwrap();
    let base = spawn_service(scratch.path(), RenderSettings::default()).await;

    let images = vec![
        "https://a.example/1.jpg".to_string(),
        "https://a.example/2.jpg".to_string(),
    ];
    let response = reqwest::Client::new()
        .post(format!("{base}{RENDER_PATH}"))
        .multipart(form(&images, "ftp://a.example/v.mp3"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "invalid_request");
    assert!(body["detail"].as_str().unwrap().contains("audio_url"));
}

#[tokio::test]
async fn non_multipart_body_is_422() {
    let scratch = tempfile::tempdir().unwrap();
    let base = spawn_service(scratch.path(), RenderSettings::default()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}{RENDER_PATH}"))
        .body("plain text")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn single_image_is_500_and_touches_nothing() {
    let scratch = tempfile::tempdir().unwrap();
    let base = spawn_service(scratch.path(), RenderSettings::default()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}{RENDER_PATH}"))
        .multipart(form(&["https://a.example/only.jpg".to_string()], "https://a.example/v.mp3"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "insufficient_input");
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("An internal server error occurred: "));
    assert_eq!(entries(scratch.path()), 0);
}

// ─── rendering ───────────────────────────────────────────────────────────────

#[cfg(unix)]
#[tokio::test]
async fn renders_and_streams_video() {
    let scratch = tempfile::tempdir().unwrap();
    let tools = tempfile::tempdir().unwrap();
    let settings = stub_settings(tools.path(), "for last; do :; done\nprintf video > \"$last\"");
    let base = spawn_service(scratch.path(), settings).await;
    let assets = spawn_assets().await;

    let images: Vec<String> = ["a", "b", "c"]
        .iter()
        .map(|n| format!("{assets}/{n}.jpg"))
        .collect();
    let response = reqwest::Client::new()
        .post(format!("{base}{RENDER_PATH}"))
        .multipart(
            form(&images, &format!("{assets}/voice.mp3")).text("output_filename", "../../my talk.mp4"),
        )
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "video/mp4");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"my talk.mp4\""
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"video");

    // cleanup runs once the body has been fully sent
    for _ in 0..50 {
        if entries(scratch.path()) == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(entries(scratch.path()), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn missing_image_is_500_naming_the_asset() {
    let scratch = tempfile::tempdir().unwrap();
    let tools = tempfile::tempdir().unwrap();
    let settings = stub_settings(tools.path(), "for last; do :; done\nprintf video > \"$last\"");
    let base = spawn_service(scratch.path(), settings).await;
    let assets = spawn_assets().await;

    let images = vec![format!("{assets}/a.jpg"), format!("{assets}/gone.jpg")];
    let response = reqwest::Client::new()
        .post(format!("{base}{RENDER_PATH}"))
        .multipart(form(&images, &format!("{assets}/voice.mp3")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "download_failed");
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("image 2"));
    assert!(detail.contains("404"));
    assert_eq!(entries(scratch.path()), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn stage_failure_is_500_without_scratch_path() {
    let scratch = tempfile::tempdir().unwrap();
    let tools = tempfile::tempdir().unwrap();
    let settings = stub_settings(
        tools.path(),
        "for last; do :; done\necho \"$last: Invalid data found\" >&2\nexit 1",
    );
    let base = spawn_service(scratch.path(), settings).await;
    let assets = spawn_assets().await;

    let images = vec![format!("{assets}/a.jpg"), format!("{assets}/b.jpg")];
    let response = reqwest::Client::new()
        .post(format!("{base}{RENDER_PATH}"))
        .multipart(form(&images, &format!("{assets}/voice.mp3")))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "stage_failed");
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("slideshow stage failed"));
    assert!(!detail.contains(&scratch.path().display().to_string()));
    assert_eq!(entries(scratch.path()), 0);
}
