use sqlx::FromRow;

use crate::classifier::MediaFields;
use crate::crypto::{Codec, CodecError};
use crate::error::AppError;

pub const MAX_CONTENT_CHARS: usize = 2000;

/// A stored chat message. `content` is sealed when `is_private` is set.
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub author_name: Option<String>,
    pub session_id: String,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub is_admin: bool,
    pub is_private: bool,
    pub reply_to: Option<String>,
    pub youtube_id: Option<String>,
    pub giphy_url: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Ban {
    pub ip_hash: String,
    pub reason: Option<String>,
    pub created_at: i64,
}

/// Which rows a reader may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Admin view: every row.
    All,
    /// Public rows plus the private rows of this session.
    Session(String),
}

impl Visibility {
    pub fn for_caller(session_id: &str, is_admin: bool) -> Self {
        if is_admin {
            Visibility::All
        } else {
            Visibility::Session(session_id.to_string())
        }
    }

    pub fn can_see(&self, message: &Message) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Session(session) => !message.is_private || message.session_id == *session,
        }
    }
}

/// A message that passed validation and is ready to append.
#[derive(Debug, Clone)]
pub struct NewMessage {
    content: String,
    pub author_name: Option<String>,
    pub ip_hash: Option<String>,
    pub session_id: String,
    pub is_admin: bool,
    pub is_private: bool,
    pub reply_to: Option<String>,
    pub media: MediaFields,
    sealed: bool,
}

/// Trim and bound-check message text.
pub fn validate_content(content: &str) -> Result<String, AppError> {
    let trimmed = content.trim();

    if trimmed.is_empty() {
        return Err(AppError::Validation("Content is required".to_string()));
    }

    if trimmed.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation("Content too long".to_string()));
    }

    Ok(trimmed.to_string())
}

impl NewMessage {
    pub fn new(content: &str, session_id: &str) -> Result<Self, AppError> {
        let content = validate_content(content)?;

        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(AppError::Validation("Session ID required".to_string()));
        }

        Ok(Self {
            content,
            author_name: None,
            ip_hash: None,
            session_id: session_id.to_string(),
            is_admin: false,
            is_private: false,
            reply_to: None,
            media: MediaFields::default(),
            sealed: false,
        })
    }

    pub fn author_name(mut self, name: Option<&str>) -> Self {
        self.author_name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Seal the body if the message is private. Idempotent.
    pub fn seal(mut self, codec: &dyn Codec) -> Result<Self, CodecError> {
        if self.is_private && !self.sealed {
            self.content = codec.seal(&self.content)?;
            self.sealed = true;
        }
        Ok(self)
    }

    pub fn is_ready(&self) -> bool {
        !self.is_private || self.sealed
    }
}
