//! Downloader workers and the transport they drive
//!
//! This module handles:
//! - The `Transport` seam: one network call per request
//! - Building the default `reqwest` client with a proper user agent string
//! - Wrapping a transport in a pooled, identifiable `Downloader`

use crate::config::UserAgentConfig;
use crate::coordination::Identifiable;
use crate::model::{Request, Response};
use crate::CrawlError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Issues one network call for a request
///
/// Implementations should copy the request depth onto the response; the
/// downloader enforces it either way.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn call(&self, request: &Request) -> anyhow::Result<Response>;
}

#[async_trait]
impl Transport for Client {
    async fn call(&self, request: &Request) -> anyhow::Result<Response> {
        let http_response = self
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone())
            .send()
            .await?;

        let final_url = http_response.url().clone();
        let status = http_response.status().as_u16();
        let headers = http_response.headers().clone();
        let body = http_response.text().await?;

        Ok(Response::new(final_url, status, body)
            .with_headers(headers)
            .with_depth(request.depth()))
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use ripple_engine::config::UserAgentConfig;
/// use ripple_engine::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "Ripple".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Format: CrawlerName/Version (+ContactURL; ContactEmail)
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// A pooled worker owning one transport client
pub struct Downloader<C> {
    id: u32,
    client: C,
}

impl<C: Transport> Downloader<C> {
    pub fn new(id: u32, client: C) -> Self {
        Self { id, client }
    }

    /// Fetches `request`
    ///
    /// Transport failures come back as `CrawlError::Download`; the returned
    /// response always carries the depth of `request`.
    pub async fn download(&self, request: &Request) -> Result<Response, CrawlError> {
        if !request.valid() {
            return Err(CrawlError::Download {
                url: request.url().to_string(),
                message: "request target is not a valid HTTP(S) URL".to_string(),
            });
        }

        tracing::debug!(downloader = self.id, depth = request.depth(), "GET {}", request.url());

        match self.client.call(request).await {
            Ok(response) => Ok(response.with_depth(request.depth())),
            Err(e) => Err(CrawlError::Download {
                url: request.url().to_string(),
                message: format!("{:#}", e),
            }),
        }
    }
}

impl<C> Identifiable for Downloader<C> {
    fn id(&self) -> u32 {
        self.id
    }
}
