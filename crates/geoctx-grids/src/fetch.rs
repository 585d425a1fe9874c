//! Network fetch of grid files.
//!
//! A fetch streams the response body into `<name>.json.partial` inside
//! the user-writable directory, verifies size and CRC-32 against the
//! authority's grid metadata when known, and renames the file into
//! place only after everything checks out. A timeout or failed check
//! removes the partial file so no unusable state survives.

use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use geoctx_common::error::{GridError, GridResult};

use crate::resolver::{GridIntegrity, GridSources};

/// Fetch a grid from the configured endpoint. Returns the final local
/// path of the verified file.
pub(crate) async fn fetch_grid(
    sources: &GridSources,
    name: &str,
    integrity: Option<&GridIntegrity>,
    timeout: Option<Duration>,
) -> GridResult<PathBuf> {
    let dest_dir = sources
        .user_writable_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("geoctx"));

    fs::create_dir_all(&dest_dir)
        .await
        .map_err(|e| GridError::NotFound(format!("{} (cannot create {}: {})", name, dest_dir.display(), e)))?;

    let final_path = dest_dir.join(format!("{}.json", name));
    let temp_path = dest_dir.join(format!("{}.json.partial", name));

    let fetch = fetch_to_temp(sources, name, integrity, &temp_path, &final_path);

    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fetch).await {
            Ok(result) => result,
            Err(_) => {
                fs::remove_file(&temp_path).await.ok();
                warn!(grid = %name, timeout_secs = limit.as_secs(), "grid fetch timed out");
                Err(GridError::Timeout(name.to_string()))
            }
        },
        None => fetch.await,
    }
}

async fn fetch_to_temp(
    sources: &GridSources,
    name: &str,
    integrity: Option<&GridIntegrity>,
    temp_path: &std::path::Path,
    final_path: &std::path::Path,
) -> GridResult<PathBuf> {
    let client = build_client(sources, name)?;

    let remote = integrity
        .and_then(|i| i.remote_path.clone())
        .unwrap_or_else(|| format!("{}.json", name));
    let url = format!("{}/{}", sources.endpoint.trim_end_matches('/'), remote);

    debug!(grid = %name, url = %url, "fetching grid");

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| GridError::NotFound(format!("{} (request failed: {})", name, e)))?;

    if !response.status().is_success() {
        return Err(GridError::NotFound(format!(
            "{} (endpoint returned {})",
            name,
            response.status()
        )));
    }

    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| GridError::NotFound(format!("{} (cannot write temp file: {})", name, e)))?;

    let mut hasher = crc32fast::Hasher::new();
    let mut size: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                fs::remove_file(temp_path).await.ok();
                return Err(GridError::NotFound(format!("{} (stream error: {})", name, e)));
            }
        };

        if let Err(e) = file.write_all(&chunk).await {
            fs::remove_file(temp_path).await.ok();
            return Err(GridError::NotFound(format!("{} (write error: {})", name, e)));
        }

        hasher.update(&chunk);
        size += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| GridError::NotFound(format!("{} (flush error: {})", name, e)))?;
    drop(file);

    if let Err(msg) = verify(integrity, size, hasher.finalize()) {
        fs::remove_file(temp_path).await.ok();
        warn!(grid = %name, reason = %msg, "fetched grid failed integrity check");
        return Err(GridError::NotFound(format!("{} ({})", name, msg)));
    }

    fs::rename(temp_path, final_path)
        .await
        .map_err(|e| GridError::NotFound(format!("{} (rename failed: {})", name, e)))?;

    info!(grid = %name, bytes = size, path = %final_path.display(), "grid fetch complete");
    Ok(final_path.to_path_buf())
}

fn build_client(sources: &GridSources, name: &str) -> GridResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(30));

    if let Some(ca_path) = &sources.ca_bundle {
        let pem = std::fs::read(ca_path).map_err(|e| {
            GridError::NotFound(format!(
                "{} (cannot read CA bundle {}: {})",
                name,
                ca_path.display(),
                e
            ))
        })?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
            GridError::NotFound(format!("{} (invalid CA bundle: {})", name, e))
        })?;
        builder = builder.add_root_certificate(cert);
    }

    builder
        .build()
        .map_err(|e| GridError::NotFound(format!("{} (client build failed: {})", name, e)))
}

fn verify(integrity: Option<&GridIntegrity>, size: u64, crc: u32) -> Result<(), String> {
    let Some(integrity) = integrity else {
        return Ok(());
    };

    if let Some(expected) = integrity.size_bytes {
        if size != expected {
            return Err(format!("size mismatch: expected {} bytes, got {}", expected, size));
        }
    }

    if let Some(expected) = integrity.crc32 {
        if crc != expected {
            return Err(format!(
                "crc32 mismatch: expected {:08x}, got {:08x}",
                expected, crc
            ));
        }
    }

    Ok(())
}
