// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote artifact retrieval over HTTPS.

use crate::step::{Classify, FailureKind};

use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::{io::Write, time::Duration};
use tracing::{debug, instrument};

/// Release metadata as served by a release API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Release tag, usually `v<semver>`.
    pub tag_name: String,

    /// Downloadable payloads.
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Release {
    /// Parse release metadata from a JSON payload.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Parse`] if the payload is not release metadata.
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(FetchError::Parse)
    }

    /// First asset whose name ends with `suffix`.
    pub fn asset_with_suffix(&self, suffix: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.name.ends_with(suffix))
    }
}

/// Downloadable release payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

/// HTTP client for remote artifacts.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Construct new fetcher whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("shellstrap/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client })
    }

    /// Underlying HTTP client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Download `url` in full.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Request`] on network failure or timeout.
    /// - Return [`FetchError::HttpStatus`] on a non-success status.
    #[instrument(skip(self), level = "debug")]
    pub async fn bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::request(url, source))?;

        Ok(body.to_vec())
    }

    /// Fetch and parse release metadata at `url`.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Request`] on network failure or timeout.
    /// - Return [`FetchError::HttpStatus`] on a non-success status.
    /// - Return [`FetchError::Parse`] if the payload is not release metadata.
    pub async fn latest_release(&self, url: &str) -> Result<Release> {
        Release::from_json(&self.bytes(url).await?)
    }

    /// Stream `url` into `sink`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Request`] on network failure or timeout.
    /// - Return [`FetchError::HttpStatus`] on a non-success status.
    /// - Return [`FetchError::Write`] if `sink` rejects the data.
    #[instrument(skip(self, sink), level = "debug")]
    pub async fn download_into(&self, url: &str, sink: &mut impl Write) -> Result<u64> {
        let response = self.get(url).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::request(url, source))?;
            sink.write_all(&chunk).map_err(FetchError::Write)?;
            written += chunk.len() as u64;
        }
        sink.flush().map_err(FetchError::Write)?;

        debug!("downloaded {written} bytes from {url}");
        Ok(written)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::request(url, source))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, 160))
                .unwrap_or_default();
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
                body_snippet,
            });
        }

        Ok(response)
    }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

/// Remote retrieval error types.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Request failed before a response arrived, or mid-body.
    #[error("failed to fetch {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status.
    #[error("fetching {url} failed with HTTP {status}{body_snippet}")]
    HttpStatus {
        url: String,
        status: StatusCode,
        body_snippet: String,
    },

    /// Payload could not be parsed.
    #[error("failed to parse release metadata: {0}")]
    Parse(#[source] serde_json::Error),

    /// Downloaded data could not be written locally.
    #[error("failed to write downloaded data: {0}")]
    Write(#[source] std::io::Error),
}

impl FetchError {
    fn request(url: &str, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.to_string(),
            source,
        }
    }
}

impl Classify for FetchError {
    fn kind(&self) -> FailureKind {
        match self {
            Self::Write(_) => FailureKind::Filesystem,
            _ => FailureKind::Fetch,
        }
    }
}

/// Friendly result alias :3
type Result<T, E = FetchError> = std::result::Result<T, E>;


#[cfg(test)]
mod tests {
    use super::{testing::serve, *};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const RELEASE: &str = indoc! {r#"
        {
            "tag_name": "v7.4.1",
            "html_url": "https://example.org/releases/v7.4.1",
            "assets": [
                {
                    "name": "PowerShell-7.4.1-linux-x64.tar.gz",
                    "browser_download_url": "https://example.org/PowerShell-7.4.1-linux-x64.tar.gz"
                },
                {
                    "name": "PowerShell-7.4.1-win-x64.msi",
                    "browser_download_url": "https://example.org/PowerShell-7.4.1-win-x64.msi"
                }
            ]
        }
    "#};

    #[test]
    fn release_selects_asset_by_suffix() -> anyhow::Result<()> {
        let release = Release::from_json(RELEASE.as_bytes())?;
        assert_eq!(release.tag_name, "v7.4.1");

        let asset = release.asset_with_suffix("win-x64.msi").unwrap();
        assert_eq!(asset.name, "PowerShell-7.4.1-win-x64.msi");
        assert_eq!(release.asset_with_suffix("osx-arm64.pkg"), None);

        Ok(())
    }

    #[test]
    fn release_rejects_unrelated_json() {
        let result = Release::from_json(br#"{"message": "API rate limit exceeded"}"#);
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn download_into_streams_body() -> anyhow::Result<()> {
        let base = serve(vec![("/profile.ps1", 200, b"Set-Alias ll ls\n".to_vec())]).await;
        let fetcher = Fetcher::new(Duration::from_secs(5))?;

        let mut sink = Vec::new();
        let written = fetcher
            .download_into(&format!("{base}/profile.ps1"), &mut sink)
            .await?;
        assert_eq!(written, 16);
        assert_eq!(sink, b"Set-Alias ll ls\n");

        Ok(())
    }

    #[tokio::test]
    async fn http_error_status_is_fetch_failure() -> anyhow::Result<()> {
        let base = serve(vec![]).await;
        let fetcher = Fetcher::new(Duration::from_secs(5))?;

        let error = fetcher
            .bytes(&format!("{base}/missing"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            FetchError::HttpStatus { status, .. } if status == StatusCode::NOT_FOUND
        ));
        assert_eq!(error.kind(), FailureKind::Fetch);

        Ok(())
    }
}
