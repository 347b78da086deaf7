//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p movshift-api`.

#![allow(dead_code)]

pub mod encoder;

use axum_test::TestServer;
use movshift_api::setup::routes;
use movshift_api::state::AppState;
use movshift_core::Config;
use movshift_processing::Encoder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub use encoder::FakeEncoder;

/// API path prefix for tests.
pub fn api_path(path: &str) -> String {
    format!("/api{}", path)
}

/// Test application: server, state and the temp directory holding both stores.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn staging_dir(&self) -> &Path {
        self.state.config.staging_dir()
    }

    pub fn output_dir(&self) -> &Path {
        self.state.config.output_dir()
    }

    pub fn staged(&self, name: &str) -> PathBuf {
        self.staging_dir().join(name)
    }

    pub fn converted(&self, name: &str) -> PathBuf {
        self.output_dir().join(name)
    }

    /// Number of entries left in a store directory (missing directory counts as empty).
    pub fn entries(&self, dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    /// Wait until a store directory holds no entries at all.
    pub async fn wait_until_empty(&self, dir: &Path) {
        for _ in 0..100 {
            if self.entries(dir) == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{} still has {} entries", dir.display(), self.entries(dir));
    }

    /// Wait for a background deletion to land.
    pub async fn wait_until_gone(&self, path: &Path) {
        for _ in 0..100 {
            if !path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{} still exists", path.display());
    }
}

/// Setup a test app with the given encoder and default limits.
pub async fn setup_test_app(encoder: Arc<dyn Encoder>) -> TestApp {
    setup_test_app_with(encoder, |_| {}).await
}

/// Setup a test app, letting the caller adjust the config first.
pub async fn setup_test_app_with(
    encoder: Arc<dyn Encoder>,
    customize: impl FnOnce(&mut Config),
) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = Config::with_stores(
        temp_dir.path().join("uploads"),
        temp_dir.path().join("converted"),
    );
    customize(&mut config);
    config.validate().expect("Test config must be valid");

    let state = Arc::new(AppState::new(config.clone(), encoder));
    let app = routes::setup_routes(&config, state.clone()).expect("Failed to build router");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}
