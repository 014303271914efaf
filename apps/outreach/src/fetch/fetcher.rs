//! Page fetching: one GET per run, no retry, no cache.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};
use thiserror::Error;
use tracing::{debug, info};
use url::{Host, Url};

use super::html::page_text;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("Unsafe URL blocked: {0}")]
    UnsafeUrl(String),

    #[error("Timeout fetching: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {0} for: {1}")]
    HttpStatus(u16, String),

    #[error("No content extracted from: {0}")]
    NoContent(String),
}

/// Raised from the redirect policy; surfaced as `FetchError::UnsafeUrl`.
#[derive(Debug, Error)]
#[error("redirect to non-public host: {0}")]
struct BlockedRedirect(String);

const MAX_REDIRECTS: usize = 5;

/// Source of page text for a URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub max_chars: Option<usize>,
    /// Permit loopback and private-network hosts. Off in production.
    pub allow_private_hosts: bool,
}

pub struct HttpPageFetcher {
    client: Client,
    settings: FetchSettings,
}

impl HttpPageFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        Self::with_client_builder(settings, Client::builder())
    }

    fn with_client_builder(
        settings: FetchSettings,
        builder: ClientBuilder,
    ) -> Result<Self, FetchError> {
        let client = builder
            .timeout(settings.timeout)
            .user_agent(concat!("outreach/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect_policy(settings.allow_private_hosts))
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;
        Ok(Self { client, settings })
    }

    fn validate(&self, url: &str) -> Result<Url, FetchError> {
        let parsed = Url::parse(url.trim()).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        if !["http", "https"].contains(&parsed.scheme()) {
            return Err(FetchError::UnsafeUrl(url.to_string()));
        }
        if !self.settings.allow_private_hosts && !is_public_host(&parsed) {
            return Err(FetchError::UnsafeUrl(url.to_string()));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = self.validate(url)?;
        debug!("Fetching page: {}", parsed);

        let response = self.client.get(parsed.clone()).send().await.map_err(|e| {
            if let Some(blocked) = blocked_redirect(&e) {
                FetchError::UnsafeUrl(blocked.0.clone())
            } else if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16(), url.to_string()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        let text = page_text(&html, self.settings.max_chars);
        if text.is_empty() {
            return Err(FetchError::NoContent(url.to_string()));
        }

        info!("Fetched {} chars from: {}", text.len(), url);
        Ok(text)
    }
}

/// Follows up to `MAX_REDIRECTS` hops, re-checking each target host unless
/// private hosts are allowed.
fn redirect_policy(allow_private_hosts: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if !allow_private_hosts && !is_public_host(attempt.url()) {
            let target = attempt.url().to_string();
            attempt.error(BlockedRedirect(target))
        } else {
            attempt.follow()
        }
    })
}

fn blocked_redirect(err: &reqwest::Error) -> Option<&BlockedRedirect> {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(blocked) = inner.downcast_ref::<BlockedRedirect>() {
            return Some(blocked);
        }
        source = inner.source();
    }
    None
}

/// Rejects localhost, loopback, private, link-local, and unspecified hosts.
fn is_public_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            domain != "localhost" && !domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => is_public_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_public_ip(IpAddr::V6(ip)),
        None => false,
    }
}

fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            let this_network = a == 0;
            let shared_cgnat = a == 100 && (b & 0xc0) == 64;
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || this_network
                || shared_cgnat)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_public_ip(IpAddr::V4(v4));
            }
            let unique_local = (v6.segments()[0] & 0xfe00) == 0xfc00;
            let link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}
