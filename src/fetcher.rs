use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, warn};
use url::Url;

use crate::cache::HttpCache;

/// Whether a request may be answered from (and stored into) the HTTP cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Cached,
    Bypass,
}

/// A fetched page, body already decoded as UTF-8.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub body: String,
}

pub struct Fetcher {
    client: reqwest::Client,
    cache: Option<HttpCache>,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout: Option<Duration>, cache: Option<HttpCache>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Fetcher {
            client: builder.build()?,
            cache,
        })
    }

    /// GET `url` and decode the body as UTF-8 whatever charset the server declares.
    ///
    /// Failures are logged and come back as `None`; the caller decides whether
    /// that skips an item or aborts the run.
    pub async fn fetch(&self, url: &Url, policy: CachePolicy) -> Option<Page> {
        let bytes = self.fetch_bytes(url, policy).await?;
        Some(Page {
            url: url.clone(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    pub async fn fetch_bytes(&self, url: &Url, policy: CachePolicy) -> Option<Vec<u8>> {
        let cache = match policy {
            CachePolicy::Cached => self.cache.as_ref(),
            CachePolicy::Bypass => None,
        };

        if let Some(cache) = cache {
            match cache.get(url.as_str()) {
                Ok(Some(body)) => return Some(body),
                Ok(None) => {}
                Err(e) => warn!(%url, error = %e, "Cache lookup failed"),
            }
        }

        match self.get(url).await {
            Ok((status, body)) => {
                debug!(%url, status, bytes = body.len(), "Fetched");
                if let Some(cache) = cache {
                    if let Err(e) = cache.put(url.as_str(), status, &body) {
                        warn!(%url, error = %e, "Failed to store response in cache");
                    }
                }
                Some(body)
            }
            Err(e) => {
                error!(%url, error = %e, "Failed to load page");
                None
            }
        }
    }

    async fn get(&self, url: &Url) -> Result<(u16, Vec<u8>)> {
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok((status, body))
    }
}
