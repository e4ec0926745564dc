//! Test helpers: build AppState and router for integration tests.
//!
//! Everything runs on the local storage backend inside a temp directory with a
//! seeded lesson directory and the passthrough transcoder.

#![allow(dead_code)]

use axum::Router;
use axum_test::TestServer;
use lessoncast_api::auth::JwtService;
use lessoncast_api::constants;
use lessoncast_api::setup::{routes, services};
use lessoncast_api::state::AppState;
use lessoncast_core::{Config, LessonId, LessonInfo, LessonKind, VideoAsset, VideoStatus};
use lessoncast_services::{
    CallerRole, InMemoryLessonDirectory, LessonDirectory, PassthroughTranscoder, Transcoder,
};
use lessoncast_storage::{LocalStorage, Storage, UrlSigner};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";
pub const TEST_BASE_URL: &str = "http://localhost/media";

pub const VIDEO_LESSON: LessonId = 101;
pub const DOCUMENT_LESSON: LessonId = 102;
pub const UNKNOWN_LESSON: LessonId = 999;

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

pub fn video_path(lesson_id: LessonId, suffix: &str) -> String {
    api_path(&format!("/lessons/{}/video{}", lesson_id, suffix))
}

/// Test application: server, state, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub owner_id: Uuid,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn token(&self, user_id: Uuid, role: CallerRole) -> String {
        self.state
            .jwt
            .issue(user_id, role, Duration::from_secs(3600))
            .expect("Failed to mint test token")
    }

    pub fn owner_token(&self) -> String {
        self.token(self.owner_id, CallerRole::Instructor)
    }

    pub fn student_token(&self) -> String {
        self.token(Uuid::new_v4(), CallerRole::Student)
    }

    /// Polls the status endpoint until `status` is observed.
    pub async fn wait_for_status(&self, lesson_id: LessonId, status: VideoStatus) -> VideoAsset {
        for _ in 0..100 {
            let asset: VideoAsset = self
                .server
                .get(&video_path(lesson_id, ""))
                .authorization_bearer(self.owner_token())
                .await
                .json();
            if asset.status == status {
                return asset;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("lesson {} never reached {}", lesson_id, status);
    }
}

pub fn test_config(storage_dir: &std::path::Path, base_url: &str) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("ENVIRONMENT", "test".to_string()),
        ("JWT_SECRET", TEST_JWT_SECRET.to_string()),
        ("STORAGE_BACKEND", "local".to_string()),
        (
            "LOCAL_STORAGE_PATH",
            storage_dir.to_string_lossy().into_owned(),
        ),
        ("LOCAL_STORAGE_BASE_URL", base_url.to_string()),
        ("MAX_VIDEO_SIZE_MB", "1".to_string()),
    ]);
    Config::from_lookup(|key| vars.get(key).cloned()).expect("Invalid test configuration")
}

pub fn seeded_lessons(owner_id: Uuid) -> Arc<dyn LessonDirectory> {
    Arc::new(InMemoryLessonDirectory::with_lessons([
        LessonInfo {
            id: VIDEO_LESSON,
            owner_id,
            kind: LessonKind::Video,
        },
        LessonInfo {
            id: DOCUMENT_LESSON,
            owner_id,
            kind: LessonKind::Document,
        },
    ]))
}

/// State and router over local storage rooted at `storage_dir`.
pub async fn build_app(
    storage_dir: &std::path::Path,
    base_url: &str,
    owner_id: Uuid,
    transcoder: Arc<dyn Transcoder>,
) -> (Arc<AppState>, Router) {
    let config = test_config(storage_dir, base_url);
    let local = Arc::new(
        LocalStorage::new(storage_dir, base_url.to_string())
            .await
            .expect("Failed to create local storage")
            .with_url_signer(UrlSigner::new(TEST_JWT_SECRET.as_bytes())),
    );
    let storage: Arc<dyn Storage> = local.clone();

    let state = services::assemble_state(
        &config,
        storage,
        Some(local),
        seeded_lessons(owner_id),
        transcoder,
    );
    let router = routes::setup_routes(&config, state.clone()).expect("Failed to build routes");
    (state, router)
}

/// Setup test app with isolated local storage.
pub async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let owner_id = Uuid::new_v4();
    let (state, router) = build_app(
        temp_dir.path(),
        TEST_BASE_URL,
        owner_id,
        Arc::new(PassthroughTranscoder),
    )
    .await;
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        state,
        owner_id,
        _temp_dir: temp_dir,
    }
}

/// Splits a signed media URL into the route path and its token.
pub fn signed_path(url: &str) -> (String, String) {
    let rest = url
        .strip_prefix("http://localhost")
        .expect("URL was not issued by the test base URL");
    let (path, token) = rest.split_once("?token=").expect("URL carries no token");
    (path.to_string(), token.to_string())
}

pub fn fake_mp4(len: usize) -> Vec<u8> {
    let mut bytes = b"\x00\x00\x00\x18ftypmp42".to_vec();
    bytes.resize(len, 0x42);
    bytes
}

/// Minted with a foreign secret; the server must reject it.
pub fn forged_token() -> String {
    JwtService::new("some-other-secret-that-is-32-chars-long")
        .issue(Uuid::new_v4(), CallerRole::Admin, Duration::from_secs(60))
        .expect("Failed to mint token")
}

fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

/// A minimal MP4 whose `moov/mvhd` records `seconds`, padded with `mdat_len` bytes of media.
pub fn mp4_with_duration(seconds: u32, mdat_len: usize) -> Vec<u8> {
    let timescale: u32 = 1000;
    let mut mvhd = vec![0u8; 4 + 8];
    mvhd.extend_from_slice(&timescale.to_be_bytes());
    mvhd.extend_from_slice(&(seconds * timescale).to_be_bytes());
    mvhd.resize(100, 0);

    let mut file = mp4_box(b"ftyp", b"isom\0\0\x02\0isommp41");
    file.extend(mp4_box(b"mdat", &vec![0x42; mdat_len]));
    file.extend(mp4_box(b"moov", &mp4_box(b"mvhd", &mvhd)));
    file
}
