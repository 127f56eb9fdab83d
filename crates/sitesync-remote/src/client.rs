//! HTTP remote store client
//!
//! Provides [`HttpRemoteStore`], a thin typed wrapper over `reqwest`
//! handling authentication headers, URL construction and response
//! classification.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use sitesync_core::domain::newtypes::{PublishMode, RemotePath};
//! use sitesync_core::ports::IRemoteStore;
//! use sitesync_remote::HttpRemoteStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = HttpRemoteStore::new("https://api.example.com/v1", "my-site", "token")?;
//! store
//!     .upload(Path::new("index.html"), &RemotePath::new("/index.html")?, PublishMode::Live)
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Serialize;
use sitesync_core::config::RemoteConfig;
use sitesync_core::domain::newtypes::{PublishMode, RemotePath};
use sitesync_core::ports::{IRemoteStore, RemoteError};
use tracing::debug;

use crate::{classify_status, network_error};

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Body of a move request
#[derive(Debug, Serialize)]
struct MoveRequest<'a> {
    from: &'a str,
    to: &'a str,
}

// ============================================================================
// HttpRemoteStore
// ============================================================================

/// `IRemoteStore` backed by the site REST API
pub struct HttpRemoteStore {
    client: Client,
    endpoint: Url,
    site: String,
    token: String,
}

impl HttpRemoteStore {
    /// Creates a client for `site` at `endpoint`
    ///
    /// # Errors
    /// Fails if `endpoint` is not an absolute http(s) URL or the HTTP
    /// client cannot be built
    pub fn new(endpoint: &str, site: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("Invalid remote endpoint: {endpoint}"))?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("Remote endpoint cannot be used as a base URL: {endpoint}");
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("sitesync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            site: site.into(),
            token: token.into(),
        })
    }

    /// Creates a client from the `remote` config section and a token
    pub fn from_config(config: &RemoteConfig, token: impl Into<String>) -> Result<Self> {
        Self::new(&config.endpoint, config.site.clone(), token)
    }

    /// The base endpoint
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Builds `{endpoint}/sites/{site}/{tail...}` with every segment escaped
    fn url<'a>(&self, tail: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("sites")
                .push(&self.site)
                .extend(tail);
        }
        url
    }

    fn file_url(&self, remote: &RemotePath) -> Url {
        let segments = remote.as_str().split('/').filter(|s| !s.is_empty());
        self.url(std::iter::once("files").chain(segments))
    }

    /// Creates an authenticated request builder
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.token)
    }

    /// Sends a request and classifies any non-success response
    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request.send().await.map_err(network_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.trim().to_string()
        };
        debug!(status = status.as_u16(), message = %message, "Remote request failed");
        Err(classify_status(status, message))
    }
}

#[async_trait]
impl IRemoteStore for HttpRemoteStore {
    fn identity(&self) -> &str {
        &self.site
    }

    async fn upload(
        &self,
        local: &Path,
        remote: &RemotePath,
        mode: PublishMode,
    ) -> Result<(), RemoteError> {
        let bytes = tokio::fs::read(local)
            .await
            .map_err(|source| RemoteError::LocalRead {
                path: local.to_path_buf(),
                source,
            })?;

        debug!(
            path = %local.display(),
            remote = %remote,
            mode = %mode,
            size = bytes.len(),
            "PUT file"
        );

        let request = self
            .request(Method::PUT, self.file_url(remote))
            .query(&[("mode", mode.as_str())])
            .body(bytes);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, remote: &RemotePath) -> Result<(), RemoteError> {
        debug!(remote = %remote, "DELETE file");
        self.send(self.request(Method::DELETE, self.file_url(remote)))
            .await?;
        Ok(())
    }

    async fn move_item(&self, from: &RemotePath, to: &RemotePath) -> Result<(), RemoteError> {
        debug!(from = %from, to = %to, "POST move");
        let request = self.request(Method::POST, self.url(["move"])).json(&MoveRequest {
            from: from.as_str(),
            to: to.as_str(),
        });
        self.send(request).await?;
        Ok(())
    }
}

impl std::fmt::Debug for HttpRemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRemoteStore")
            .field("endpoint", &self.endpoint.as_str())
            .field("site", &self.site)
            .finish_non_exhaustive()
    }
}
