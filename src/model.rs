use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// One generated image offered for selection, kept as base64 text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvatarCandidate(String);

impl AvatarCandidate {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(general_purpose::STANDARD.encode(bytes))
    }

    pub fn from_base64(encoded: String) -> Self {
        Self(encoded)
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        Ok(general_purpose::STANDARD.decode(&self.0)?)
    }

    /// The generator serves SVG, this is what an `<img src>` expects.
    pub fn data_url(&self) -> String {
        format!("data:image/svg+xml;base64,{}", self.0)
    }
}

/// Candidates in the order their requests were issued.
pub type AvatarList = Vec<AvatarCandidate>;

/// The locally persisted record of the authenticated user.
///
/// Only the avatar fields are touched here, anything else the chat
/// client stored is carried through `extra` untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(rename = "_id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_avatar_image_set: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub avatar_image: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_avatar_image_set: false,
            avatar_image: String::new(),
            extra: Map::new(),
        }
    }

    pub fn set_avatar(&mut self, image: String) {
        self.is_avatar_image_set = true;
        self.avatar_image = image;
    }
}

/// Fresh accounts are stored with `"avatarImage": null`.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "user id must be a string or a number, got {}",
            other
        ))),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetAvatarRequest {
    pub image: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAvatarResponse {
    pub is_set: bool,
    #[serde(default)]
    pub image: Option<String>,
}
