//! Remote feed retrieval.
//!
//! Published GTFS feeds are zip archives behind plain HTTP(S) URLs; the
//! bytes fetched here become an [`InputSource::Upload`](crate::gtfs::InputSource).

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, bail};
use bytes::Bytes;
use tracing::debug;

/// Fetches the body at `url`, failing on non-success status codes.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        bail!("GET {url} returned status {status}");
    }

    let bytes = resp.bytes().await?;
    debug!(url, bytes = bytes.len(), "Fetched feed bytes");
    Ok(bytes)
}

/// Returns `true` when `source` should be fetched rather than read from disk.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
