use async_trait::async_trait;
use url::Url;

use crate::config::Config;
use crate::model::{AvatarCandidate, SetAvatarRequest, SetAvatarResponse};
use crate::{AvatarError, Result};

/// The backend endpoint that stores the chosen avatar for a user.
#[async_trait]
pub trait AvatarApi: Send + Sync {
    async fn set_avatar(
        &self,
        user_id: &str,
        image: &AvatarCandidate,
    ) -> Result<SetAvatarResponse>;
}

pub struct HttpAvatarApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpAvatarApi {
    pub fn new(base: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.set_avatar_url.clone())
    }

    /// The user id always lands in a single, percent-encoded segment.
    pub fn user_url(&self, user_id: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AvatarError::Validation(format!(
                    "{} cannot take a user id",
                    self.base
                ))
            })?
            .pop_if_empty()
            .push(user_id);
        Ok(url)
    }
}

#[async_trait]
impl AvatarApi for HttpAvatarApi {
    async fn set_avatar(
        &self,
        user_id: &str,
        image: &AvatarCandidate,
    ) -> Result<SetAvatarResponse> {
        let url = self.user_url(user_id)?;
        log::debug!("posting avatar for user {} to {}", user_id, url);

        let body = SetAvatarRequest {
            image: image.as_base64().to_owned(),
        };
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<SetAvatarResponse>()
            .await?;

        Ok(response)
    }
}
