//! Shared test infrastructure for integration tests
//!
//! Provides TestServer (spawns the real canopy binary against a temp-dir
//! filesystem store), an aws-sdk-s3 client factory, raw reqwest helpers,
//! and data generators.

#![allow(dead_code)]

use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use rand::{Rng, SeedableRng};
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// Port counter to avoid conflicts between tests.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(18300);

/// Test server wrapper that spawns a real canopy binary
pub struct TestServer {
    process: Child,
    port: u16,
    _data_dir: TempDir,
}

impl TestServer {
    // ── Factory methods ──

    /// Start a test server with a filesystem store in a temp directory.
    pub async fn filesystem() -> Self {
        Self::spawn_with_extras("").await
    }

    /// Start a test server with a custom max store-path length.
    pub async fn filesystem_with_max_path(max_len: usize) -> Self {
        Self::spawn_with_extras(&format!("max_filename_length = {}\n", max_len)).await
    }

    /// Start a test server with pretty-printed XML responses.
    pub async fn filesystem_pretty() -> Self {
        Self::spawn_with_extras("pretty_print = true\n").await
    }

    // ── Shared spawn logic ──

    /// Allocate a port, write a TOML config, spawn the gateway, and wait
    /// for readiness. All factory methods delegate here.
    async fn spawn_with_extras(extras: &str) -> Self {
        let data_dir = TempDir::new().expect("Failed to create temp dir");
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);

        let full_config = format!(
            "listen_addr = \"127.0.0.1:{}\"\n{}\n[backend]\ntype = \"filesystem\"\npath = \"{}\"\n",
            port,
            extras,
            data_dir.path().join("store").display()
        );

        let config_path = data_dir.path().join("test.toml");
        std::fs::write(&config_path, &full_config).expect("Failed to write test config");

        let process = Command::new(env!("CARGO_BIN_EXE_canopy"))
            .env("CANOPY_CONFIG", &config_path)
            .env("RUST_LOG", "canopy=warn")
            .spawn()
            .expect("Failed to start server");

        let mut server = Self {
            process,
            port,
            _data_dir: data_dir,
        };
        server.wait_ready().await;
        server
    }

    // ── Instance methods ──

    async fn wait_ready(&mut self) {
        let addr = format!("127.0.0.1:{}", self.port);
        for _ in 0..150 {
            if std::net::TcpStream::connect(&addr).is_ok() {
                sleep(Duration::from_millis(100)).await;
                return;
            }

            if let Ok(Some(status)) = self.process.try_wait() {
                panic!("Server exited before becoming ready: {}", status);
            }

            sleep(Duration::from_millis(100)).await;
        }

        let _ = self.process.kill();
        panic!("Timed out waiting for server on {}", addr);
    }

    /// Create an S3 client configured for this test server
    pub async fn s3_client(&self) -> Client {
        let credentials = Credentials::new("test", "test", None, None, "test");

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(self.endpoint())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Client::from_conf(config)
    }

    /// Get the HTTP endpoint URL
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
    }
}

// === Shared HTTP helpers (reqwest) ===

/// PUT an object via reqwest and return the response.
pub async fn put_object(
    client: &reqwest::Client,
    endpoint: &str,
    bucket: &str,
    key: &str,
    data: Vec<u8>,
    content_type: &str,
) -> reqwest::Response {
    let url = format!("{}/{}/{}", endpoint, bucket, key);
    let resp = client
        .put(&url)
        .header("content-type", content_type)
        .body(data)
        .send()
        .await
        .expect("PUT failed");
    assert!(
        resp.status().is_success(),
        "PUT {} failed: {}",
        key,
        resp.status()
    );
    resp
}

/// GET an object and return the body bytes.
pub async fn get_bytes(
    client: &reqwest::Client,
    endpoint: &str,
    bucket: &str,
    key: &str,
) -> Vec<u8> {
    let url = format!("{}/{}/{}", endpoint, bucket, key);
    let resp = client.get(&url).send().await.expect("GET failed");
    assert!(
        resp.status().is_success(),
        "GET {} failed: {}",
        key,
        resp.status()
    );
    resp.bytes().await.unwrap().to_vec()
}

/// HEAD an object and return response headers.
pub async fn head_headers(
    client: &reqwest::Client,
    endpoint: &str,
    bucket: &str,
    key: &str,
) -> reqwest::header::HeaderMap {
    let url = format!("{}/{}/{}", endpoint, bucket, key);
    let resp = client.head(&url).send().await.expect("HEAD failed");
    assert!(
        resp.status().is_success(),
        "HEAD {} failed: {}",
        key,
        resp.status()
    );
    resp.headers().clone()
}

/// Create a bucket via reqwest, asserting success.
pub async fn create_bucket(client: &reqwest::Client, endpoint: &str, bucket: &str) {
    let url = format!("{}/{}", endpoint, bucket);
    let resp = client.put(&url).send().await.expect("PUT bucket failed");
    assert!(
        resp.status().is_success(),
        "CREATE {} failed: {}",
        bucket,
        resp.status()
    );
}

/// Make a raw ListObjects request and return the XML body.
pub async fn list_objects_raw(
    client: &reqwest::Client,
    endpoint: &str,
    bucket: &str,
    params: &str,
) -> String {
    let url = format!("{}/{}?{}", endpoint, bucket, params);
    let resp = client.get(&url).send().await.unwrap();
    assert!(
        resp.status().is_success(),
        "ListObjects failed: {}",
        resp.status()
    );
    resp.text().await.unwrap()
}

/// Count non-overlapping occurrences of `needle` in `haystack`.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

// === Data generators ===

/// Generate deterministic binary data
pub fn generate_binary(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; size];
    rng.fill(&mut data[..]);
    data
}
