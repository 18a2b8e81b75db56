//! The body of a chat request.

use serde::{Deserialize, Deserializer, Serialize};

/// The author of a [`ChatMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The assistant.
    Assistant,
    /// System instructions.
    System,
}

/// A message of the client-side conversation history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The author.
    pub role: Role,
    /// The text content.
    pub content: String,
}

impl ChatMessage {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The JSON body of `POST /api/chat`.
///
/// Missing and `null` fields take their empty value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The full conversation so far, the last message being the new one.
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<ChatMessage>,
    /// The broker user whose connected accounts the tools act on.
    #[serde(rename = "userId", default, deserialize_with = "null_as_default")]
    pub user_id: String,
    /// Toolkit slugs whose tools are offered to the model.
    #[serde(default, deserialize_with = "null_as_default")]
    pub toolkits: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Drops empty slugs, lower-cases the rest and removes duplicates,
/// keeping the first occurrence.
pub fn normalize_toolkits<I, S>(toolkits: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = vec![];
    for toolkit in toolkits {
        let toolkit = toolkit.as_ref();
        if toolkit.is_empty() {
            continue;
        }
        let toolkit = toolkit.to_lowercase();
        if !normalized.contains(&toolkit) {
            normalized.push(toolkit);
        }
    }
    normalized
}
