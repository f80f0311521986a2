// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::remote::RemotePhotoSearchClient;
use crate::store::models::Coordinate;
use crate::store::SqliteStore;

/// Create an in-memory SQLite store for testing
pub async fn setup_test_store() -> SqliteStore {
    SqliteStore::in_memory()
        .await
        .expect("Failed to create in-memory store")
}

/// Create a test configuration with temporary paths
pub fn create_test_config() -> Config {
    let temp_dir = std::env::temp_dir().join(format!("pin-album-test-{}", std::process::id()));

    Config {
        store_db_path: temp_dir.join("test_pins.db"),
        search_api_url: "http://localhost:3000/services/rest".to_string(),
        search_api_key: "test-key".to_string(),
        request_timeout_secs: 5,
        log_level: "error".to_string(), // Reduce log noise in tests
    }
}

/// Scriptable stand-in for the remote photo service.
///
/// Fetches for a URL registered with [`FakePhotoSource::gate`] block until
/// the returned `Notify` is signalled, which lets tests hold a response back.
pub struct FakePhotoSource {
    search_result: Mutex<std::result::Result<Vec<String>, String>>,
    images: Mutex<HashMap<String, Vec<u8>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    search_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakePhotoSource {
    pub fn new() -> Self {
        Self {
            search_result: Mutex::new(Ok(Vec::new())),
            images: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            search_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_urls(urls: Vec<String>) -> Self {
        let source = Self::new();
        source.set_search_urls(urls);
        source
    }

    pub fn set_search_urls(&self, urls: Vec<String>) {
        *self.search_result.lock().unwrap() = Ok(urls);
    }

    pub fn fail_search(&self, cause: &str) {
        *self.search_result.lock().unwrap() = Err(cause.to_string());
    }

    pub fn add_image(&self, url: &str, bytes: Vec<u8>) {
        self.images.lock().unwrap().insert(url.to_string(), bytes);
    }

    /// Hold fetches of `url` until the returned handle is notified
    pub fn gate(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(url.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(source: &'a FakePhotoSource) -> Self {
        let now = source.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        source.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self {
            counter: &source.in_flight,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemotePhotoSearchClient for FakePhotoSource {
    async fn search(&self, _coordinate: Coordinate) -> Result<Vec<String>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let result = self.search_result.lock().unwrap().clone();
        result.map_err(SyncError::search_failed)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(self);

        let gate = self.gates.lock().unwrap().get(url).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let image = self.images.lock().unwrap().get(url).cloned();
        image.ok_or_else(|| SyncError::fetch_failed(format!("no image registered for {}", url)))
    }
}

/// Create a temporary directory for tests
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().expect("Failed to create temp directory")
}

/// Path of a database file inside `dir`
pub fn temp_db_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("pins.db")
}
