//! Network fetch tests against a local canned-HTTP listener.

#![cfg(feature = "network")]

use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use geoctx_common::error::GridError;
use geoctx_common::Region;
use geoctx_grids::{GridIntegrity, GridOrigin, GridResolver, GridSources};
use geoctx_testkit::write_shift_grid;

/// Serve exactly one canned HTTP response, then close the connection.
async fn serve_once(response: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf).await;
        stream.write_all(&response).await.unwrap();
        stream.shutdown().await.ok();
    });

    format!("http://{}", addr)
}

/// Serve headers that promise a body which never arrives.
async fn serve_stalled() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf).await;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 1048576\r\n\r\n")
            .await
            .unwrap();
        // Hold the socket open without sending a single body byte.
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    format!("http://{}", addr)
}

fn http_ok(body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

fn network_sources(uwd: &Path, endpoint: String) -> GridSources {
    GridSources {
        search_paths: Vec::new(),
        user_writable_dir: Some(uwd.to_path_buf()),
        network_enabled: true,
        endpoint,
        ca_bundle: None,
    }
}

/// Serialized grid bytes the listener will hand out.
fn grid_body(name: &str) -> Vec<u8> {
    let staging = TempDir::new().unwrap();
    let path = write_shift_grid(
        staging.path(),
        name,
        Region::new(-125.0, 24.0, -66.0, 50.0),
        4,
        4,
        1.0,
        -0.5,
    );
    std::fs::read(path).unwrap()
}

fn crc_of(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

#[tokio::test]
async fn fetch_renames_verified_file_into_place() {
    let body = grid_body("net_grid");
    let integrity = GridIntegrity {
        remote_path: None,
        size_bytes: Some(body.len() as u64),
        crc32: Some(crc_of(&body)),
    };

    let uwd = TempDir::new().unwrap();
    let endpoint = serve_once(http_ok(&body)).await;
    let sources = network_sources(uwd.path(), endpoint);

    let resolver = GridResolver::new();
    let reference = resolver
        .locate(&sources, "net_grid", Some(&integrity), None)
        .await
        .unwrap();

    assert_eq!(reference.origin, GridOrigin::Network);
    assert_eq!(reference.path, uwd.path().join("net_grid.json"));
    assert!(reference.path.is_file());
    assert!(!uwd.path().join("net_grid.json.partial").exists());

    // The fetched file parses and samples.
    let grid = resolver
        .load(&sources, "net_grid", Some(&integrity), None)
        .await
        .unwrap();
    assert_eq!(grid.sample(-100.0, 40.0), Some((1.0, -0.5)));

    // The listener is gone; a repeat locate answers from cache.
    assert!(resolver.locate(&sources, "net_grid", None, None).await.is_ok());
}

#[tokio::test]
async fn crc_mismatch_discards_fetched_file() {
    let body = grid_body("bad_grid");
    let integrity = GridIntegrity {
        remote_path: None,
        size_bytes: Some(body.len() as u64),
        crc32: Some(crc_of(&body) ^ 0xFFFF_FFFF),
    };

    let uwd = TempDir::new().unwrap();
    let endpoint = serve_once(http_ok(&body)).await;
    let sources = network_sources(uwd.path(), endpoint);

    let resolver = GridResolver::new();
    let err = resolver
        .locate(&sources, "bad_grid", Some(&integrity), None)
        .await
        .unwrap_err();

    assert!(matches!(err, GridError::NotFound(_)));
    assert!(!uwd.path().join("bad_grid.json").exists());
    assert!(!uwd.path().join("bad_grid.json.partial").exists());
    assert!(resolver.cached("bad_grid").await.is_none());
}

#[tokio::test]
async fn size_mismatch_discards_fetched_file() {
    let body = grid_body("short_grid");
    let integrity = GridIntegrity {
        remote_path: None,
        size_bytes: Some(body.len() as u64 + 1),
        crc32: None,
    };

    let uwd = TempDir::new().unwrap();
    let endpoint = serve_once(http_ok(&body)).await;
    let sources = network_sources(uwd.path(), endpoint);

    let resolver = GridResolver::new();
    let err = resolver
        .locate(&sources, "short_grid", Some(&integrity), None)
        .await
        .unwrap_err();

    assert!(matches!(err, GridError::NotFound(_)));
    assert!(!uwd.path().join("short_grid.json").exists());
    assert!(!uwd.path().join("short_grid.json.partial").exists());
}

#[tokio::test]
async fn stalled_fetch_times_out_and_removes_partial() {
    let uwd = TempDir::new().unwrap();
    let endpoint = serve_stalled().await;
    let sources = network_sources(uwd.path(), endpoint);

    let resolver = GridResolver::new();
    let err = resolver
        .locate(
            &sources,
            "slow_grid",
            None,
            Some(Duration::from_millis(250)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GridError::Timeout(name) if name == "slow_grid"));
    assert!(!uwd.path().join("slow_grid.json").exists());
    assert!(!uwd.path().join("slow_grid.json.partial").exists());
    assert!(resolver.cached("slow_grid").await.is_none());
}

#[tokio::test]
async fn error_status_is_not_found() {
    let uwd = TempDir::new().unwrap();
    let endpoint = serve_once(
        b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_vec(),
    )
    .await;
    let sources = network_sources(uwd.path(), endpoint);

    let resolver = GridResolver::new();
    let err = resolver
        .locate(&sources, "absent_grid", None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, GridError::NotFound(_)));
    assert!(!uwd.path().join("absent_grid.json").exists());
}
