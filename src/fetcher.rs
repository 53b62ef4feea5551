use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::header::HeaderValue;
use reqwest::StatusCode;
use url::Url;

use crate::config::Config;
use crate::model::{AvatarCandidate, AvatarList};
use crate::retry::{retry_rate_limited, RetryPolicy};
use crate::{AvatarError, Result};

/// Upper bound of the random path segment that picks a generated image.
pub const MAX_AVATAR_NUMBER: u32 = 1000;

/// Anything able to produce a page worth of avatar candidates.
#[async_trait]
pub trait AvatarSource: Send + Sync {
    async fn fetch_all(&self, count: usize) -> Result<AvatarList>;
}

/// Pulls candidates from the avatar generator over HTTP.
pub struct AvatarFetcher {
    client: reqwest::Client,
    base: Url,
    seed: String,
    policy: RetryPolicy,
}

impl AvatarFetcher {
    pub fn new(base: Url, seed: String, policy: RetryPolicy) -> Result<Self> {
        let mut header = reqwest::header::HeaderMap::new();
        header.insert(
            "User-Agent",
            HeaderValue::from_static(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            )),
        );
        let client = reqwest::Client::builder()
            .default_headers(header)
            .build()?;

        Ok(Self {
            client,
            base,
            seed,
            policy,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.generator_url.clone(),
            config.generator_seed.clone(),
            config.retry_policy(),
        )
    }

    /// `<base>/<seed>/<n>` for a fresh random `n` per candidate, so every
    /// request yields a different image.
    pub fn candidate_urls(&self, count: usize) -> Result<Vec<Url>> {
        (0..count)
            .map(|_| self.candidate_url(fastrand::u32(0..=MAX_AVATAR_NUMBER)))
            .collect()
    }

    pub fn candidate_url(&self, number: u32) -> Result<Url> {
        let base = self.base.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/{}/{}", base, self.seed, number))?)
    }

    /// Fetch every url concurrently. The result is aligned with `urls`,
    /// whichever request finishes first. One failed candidate fails the
    /// whole batch.
    pub async fn fetch_urls(&self, urls: &[Url]) -> Result<AvatarList> {
        log::debug!("fetching {} avatar candidates", urls.len());
        try_join_all(urls.iter().map(|url| self.fetch_one_with_retry(url)))
            .await
    }

    pub async fn fetch_one_with_retry(
        &self,
        url: &Url,
    ) -> Result<AvatarCandidate> {
        retry_rate_limited(&self.policy, move || self.fetch_one(url)).await
    }

    /// A single attempt, no retries.
    pub async fn fetch_one(&self, url: &Url) -> Result<AvatarCandidate> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            log::debug!("{} answered 429", url);
            return Err(AvatarError::RateLimited {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(AvatarError::Upstream {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        log::trace!("{} bytes received from {}", body.len(), url);
        Ok(AvatarCandidate::from_bytes(&body))
    }
}

#[async_trait]
impl AvatarSource for AvatarFetcher {
    async fn fetch_all(&self, count: usize) -> Result<AvatarList> {
        let urls = self.candidate_urls(count)?;
        self.fetch_urls(&urls).await
    }
}
