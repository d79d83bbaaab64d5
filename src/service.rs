//! Chat orchestration: admission, validation, classification, sealing and
//! storage on the way in; visibility filtering and opening on the way out.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{Pool, Sqlite};

use crate::classifier::{classify, MediaFields};
use crate::crypto::Codec;
use crate::db::models::validate_content;
use crate::db::{Message, MessageRepository, NewMessage, Visibility};
use crate::error::AppError;
use crate::guard::AbuseGuard;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub content: String,
    pub author_name: Option<String>,
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub is_admin: bool,
    #[serde(default, deserialize_with = "flag")]
    pub is_private: bool,
    pub reply_to: Option<String>,
}

/// Who is asking. Self-asserted: `is_admin` is not verified here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Caller {
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub is_admin: bool,
}

/// Boolean flag as clients send it: `true` or the string `"true"` sets it,
/// anything else (`null`, `"1"`, `"yes"`) leaves it unset.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Bool(value)) => value,
        Some(Raw::Text(text)) => text == "true",
        Some(Raw::Other(_)) | None => false,
    })
}

impl Caller {
    pub fn new(session_id: impl Into<String>, is_admin: bool) -> Self {
        Self {
            session_id: Some(session_id.into()),
            is_admin,
        }
    }

    fn session(&self) -> Option<&str> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn owns(&self, message: &Message) -> bool {
        self.session() == Some(message.session_id.as_str())
    }
}

/// A message as one caller sees it. Never carries the author's session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub content: String,
    pub author_name: Option<String>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub is_admin: bool,
    pub is_private: bool,
    pub is_own: bool,
    pub reply_to: Option<String>,
    #[serde(flatten)]
    pub media: MediaFields,
}

impl MessageView {
    fn new(message: Message, content: String, is_own: bool) -> Self {
        Self {
            id: message.id,
            content,
            author_name: message.author_name,
            created_at: message.created_at,
            updated_at: message.updated_at,
            is_admin: message.is_admin,
            is_private: message.is_private,
            is_own,
            reply_to: message.reply_to,
            media: MediaFields {
                youtube_id: message.youtube_id,
                giphy_url: message.giphy_url,
                image_url: message.image_url,
                video_url: message.video_url,
            },
        }
    }
}

#[derive(Clone)]
pub struct ChatService {
    db: Pool<Sqlite>,
    codec: Arc<dyn Codec>,
    guard: AbuseGuard,
    history_limit: i64,
}

impl ChatService {
    pub fn new(db: Pool<Sqlite>, codec: Arc<dyn Codec>, guard: AbuseGuard, history_limit: i64) -> Self {
        Self {
            db,
            codec,
            guard,
            history_limit,
        }
    }

    pub fn guard(&self) -> &AbuseGuard {
        &self.guard
    }

    /// Admit, validate, classify, seal and store one message. The response
    /// echoes the plaintext even when the stored copy is sealed.
    pub async fn submit(&self, client_ip: &str, req: SubmitRequest) -> Result<MessageView, AppError> {
        let ip_hash = self.guard.admit(&self.db, client_ip).await?.into_result()?;

        let session_id = req.session_id.as_deref().unwrap_or_default();
        let mut draft = NewMessage::new(&req.content, session_id)?
            .author_name(req.author_name.as_deref());
        draft.ip_hash = Some(ip_hash);
        draft.is_admin = req.is_admin;
        draft.is_private = req.is_private;

        let caller = Caller::new(draft.session_id.clone(), req.is_admin);
        if let Some(target_id) = req.reply_to.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            let target = self.visible_message(&caller, target_id).await?;
            // Replies to a private message stay private
            draft.is_private |= target.is_private;
            draft.reply_to = Some(target.id);
        }

        draft.media = MediaFields::from(classify(draft.content()));

        let plaintext = draft.content().to_string();
        let draft = draft
            .seal(self.codec.as_ref())
            .map_err(|e| AppError::Crypto(e.to_string()))?;

        let stored = MessageRepository::create(&self.db, &draft).await?;
        tracing::info!(
            message_id = %stored.id,
            is_private = stored.is_private,
            ip_hash = ?draft.ip_hash,
            "Message stored"
        );

        Ok(MessageView::new(stored, plaintext, true))
    }

    /// Recent messages visible to `caller`, oldest first. Private bodies that
    /// fail to open are replaced by the placeholder.
    pub async fn list(&self, caller: &Caller) -> Result<Vec<MessageView>, AppError> {
        let Some(session) = caller.session() else {
            return Ok(Vec::new());
        };

        let visibility = Visibility::for_caller(session, caller.is_admin);
        let messages = MessageRepository::list(&self.db, &visibility, self.history_limit).await?;

        Ok(messages
            .into_iter()
            .map(|message| {
                let content = if message.is_private {
                    self.codec.open_or_placeholder(&message.content)
                } else {
                    message.content.clone()
                };
                let is_own = caller.owns(&message);
                MessageView::new(message, content, is_own)
            })
            .collect())
    }

    pub async fn count(&self, caller: &Caller) -> Result<i64, AppError> {
        if caller.is_admin {
            return MessageRepository::count(&self.db, &Visibility::All).await;
        }

        match caller.session() {
            Some(session) => {
                MessageRepository::count(&self.db, &Visibility::Session(session.to_string())).await
            }
            None => Ok(0),
        }
    }

    /// Replace a message body. Private messages are re-sealed.
    pub async fn edit(&self, id: &str, caller: &Caller, content: &str) -> Result<(), AppError> {
        let content = validate_content(content)?;
        let message = self.existing(id).await?;
        Self::authorize(caller, &message)?;

        let stored_content = if message.is_private {
            self.codec
                .seal(&content)
                .map_err(|e| AppError::Crypto(e.to_string()))?
        } else {
            content
        };

        MessageRepository::update_content(&self.db, &message.id, &stored_content).await?;
        tracing::info!(message_id = %message.id, "Message edited");
        Ok(())
    }

    pub async fn delete(&self, id: &str, caller: &Caller) -> Result<(), AppError> {
        let message = self.existing(id).await?;
        Self::authorize(caller, &message)?;

        MessageRepository::delete(&self.db, &message.id).await?;
        tracing::info!(message_id = %message.id, "Message deleted");
        Ok(())
    }

    async fn existing(&self, id: &str) -> Result<Message, AppError> {
        MessageRepository::get_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Message not found".to_string()))
    }

    async fn visible_message(&self, caller: &Caller, id: &str) -> Result<Message, AppError> {
        let visibility = match caller.session() {
            Some(session) => Visibility::for_caller(session, caller.is_admin),
            None => return Err(AppError::Validation("Session ID required".to_string())),
        };

        MessageRepository::get_by_id(&self.db, id)
            .await?
            .filter(|message| visibility.can_see(message))
            .ok_or_else(|| AppError::Validation("Reply target not found".to_string()))
    }

    fn authorize(caller: &Caller, message: &Message) -> Result<(), AppError> {
        if caller.is_admin || caller.owns(message) {
            Ok(())
        } else {
            Err(AppError::Forbidden("You can only modify your own messages".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{XorCodec, DECRYPTION_FAILED};
    use crate::db::{memory_pool, BanRepository};
    use crate::guard::hash_ip;

    async fn service_with(max_requests: u32) -> ChatService {
        let pool = memory_pool().await.unwrap();
        ChatService::new(
            pool,
            Arc::new(XorCodec::new("test-key")),
            AbuseGuard::new(max_requests, 60),
            100,
        )
    }

    async fn service() -> ChatService {
        service_with(1000).await
    }

    #[test]
    fn test_flags_are_lenient() {
        let req: SubmitRequest = serde_json::from_value(serde_json::json!({
            "content": "hi",
            "is_private": null,
            "is_admin": "true",
        }))
        .unwrap();
        assert!(!req.is_private);
        assert!(req.is_admin);

        let caller: Caller = serde_json::from_value(serde_json::json!({"is_admin": 1})).unwrap();
        assert!(!caller.is_admin);

        let caller: Caller = serde_json::from_value(serde_json::json!({"is_admin": true})).unwrap();
        assert!(caller.is_admin);
    }

    fn request(content: &str, session: &str) -> SubmitRequest {
        SubmitRequest {
            content: content.to_string(),
            author_name: None,
            session_id: Some(session.to_string()),
            is_admin: false,
            is_private: false,
            reply_to: None,
        }
    }

    fn private(content: &str, session: &str) -> SubmitRequest {
        SubmitRequest {
            is_private: true,
            ..request(content, session)
        }
    }

    #[tokio::test]
    async fn test_public_messages_visible_to_everyone() {
        let svc = service().await;
        svc.submit("10.0.0.1", request("hello all", "alice")).await.unwrap();

        for caller in [Caller::new("bob", false), Caller::new("carol", false), Caller::new("x", true)] {
            let listed = svc.list(&caller).await.unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].content, "hello all");
            assert!(!listed[0].is_own);
        }
    }

    #[tokio::test]
    async fn test_private_messages_scoped_to_session_and_admin() {
        let svc = service().await;
        let created = svc.submit("10.0.0.1", private("just for me", "alice")).await.unwrap();
        assert_eq!(created.content, "just for me");
        assert!(created.is_own);

        let own = svc.list(&Caller::new("alice", false)).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].content, "just for me");

        let admin = svc.list(&Caller::new("root", true)).await.unwrap();
        assert_eq!(admin[0].content, "just for me");

        assert!(svc.list(&Caller::new("bob", false)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_private_content_is_sealed_at_rest() {
        let svc = service().await;
        let created = svc.submit("10.0.0.1", private("secret words", "alice")).await.unwrap();

        let stored = MessageRepository::get_by_id(&svc.db, &created.id).await.unwrap().unwrap();
        assert_ne!(stored.content, "secret words");
        assert_eq!(XorCodec::new("test-key").open(&stored.content).unwrap(), "secret words");
    }

    #[tokio::test]
    async fn test_corrupt_private_row_degrades_to_placeholder() {
        let svc = service().await;
        let broken = svc.submit("10.0.0.1", private("soon broken", "alice")).await.unwrap();
        svc.submit("10.0.0.1", request("fine", "alice")).await.unwrap();

        MessageRepository::update_content(&svc.db, &broken.id, "!!not sealed!!").await.unwrap();

        let listed = svc.list(&Caller::new("alice", false)).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].content, DECRYPTION_FAILED);
        assert_eq!(listed[1].content, "fine");
    }

    #[tokio::test]
    async fn test_list_without_session_is_empty() {
        let svc = service().await;
        svc.submit("10.0.0.1", request("hello", "alice")).await.unwrap();

        assert!(svc.list(&Caller::default()).await.unwrap().is_empty());
        let admin_without_session = Caller { session_id: None, is_admin: true };
        assert!(svc.list(&admin_without_session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let svc = service().await;

        let empty = svc.submit("10.0.0.1", request("   ", "alice")).await;
        assert!(matches!(empty, Err(AppError::Validation(_))));

        let long = svc.submit("10.0.0.1", request(&"x".repeat(2001), "alice")).await;
        assert!(matches!(long, Err(AppError::Validation(_))));

        let mut no_session = request("hi", "alice");
        no_session.session_id = None;
        let result = svc.submit("10.0.0.1", no_session).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        assert_eq!(svc.count(&Caller::new("x", true)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_submit_classifies_content() {
        let svc = service().await;
        let created = svc
            .submit("10.0.0.1", request("check this https://example.com/pic.png out", "alice"))
            .await
            .unwrap();

        assert_eq!(created.media.image_url.as_deref(), Some("https://example.com/pic.png"));
        assert!(created.media.youtube_id.is_none());

        let listed = svc.list(&Caller::new("bob", false)).await.unwrap();
        assert_eq!(listed[0].media, created.media);
    }

    #[tokio::test]
    async fn test_rate_limited_after_quota() {
        let svc = service_with(2).await;
        svc.submit("10.0.0.9", request("1", "alice")).await.unwrap();
        svc.submit("10.0.0.9", request("2", "alice")).await.unwrap();

        let third = svc.submit("10.0.0.9", request("3", "alice")).await;
        assert!(matches!(third, Err(AppError::RateLimited)));

        svc.submit("10.0.0.10", request("other ip", "alice")).await.unwrap();
    }

    #[tokio::test]
    async fn test_banned_identity_cannot_submit() {
        let svc = service().await;
        BanRepository::add(&svc.db, &hash_ip("198.51.100.4"), None).await.unwrap();

        let result = svc.submit("198.51.100.4", request("hi", "alice")).await;
        assert!(matches!(result, Err(AppError::Banned)));
        assert_eq!(svc.count(&Caller::new("x", true)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_matches_visibility() {
        let svc = service().await;
        svc.submit("10.0.0.1", request("public", "alice")).await.unwrap();
        svc.submit("10.0.0.1", private("alice only", "alice")).await.unwrap();
        svc.submit("10.0.0.1", private("bob only", "bob")).await.unwrap();

        assert_eq!(svc.count(&Caller::new("alice", false)).await.unwrap(), 2);
        assert_eq!(svc.count(&Caller::new("carol", false)).await.unwrap(), 1);
        assert_eq!(svc.count(&Caller::default()).await.unwrap(), 0);
        assert_eq!(svc.count(&Caller { session_id: None, is_admin: true }).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_ordering_follows_submission() {
        let svc = service().await;
        for content in ["A", "B", "C"] {
            svc.submit("10.0.0.1", request(content, "alice")).await.unwrap();
        }

        let listed = svc.list(&Caller::new("alice", false)).await.unwrap();
        let contents: Vec<_> = listed.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_edit_missing_message_creates_nothing() {
        let svc = service().await;
        let result = svc.edit("missing", &Caller::new("alice", true), "new").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(svc.count(&Caller::new("x", true)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_edit_reseals_private_content() {
        let svc = service().await;
        let created = svc.submit("10.0.0.1", private("first", "alice")).await.unwrap();

        svc.edit(&created.id, &Caller::new("alice", false), "  second  ").await.unwrap();

        let stored = MessageRepository::get_by_id(&svc.db, &created.id).await.unwrap().unwrap();
        assert_ne!(stored.content, "second");

        let listed = svc.list(&Caller::new("alice", false)).await.unwrap();
        assert_eq!(listed[0].content, "second");
        assert!(listed[0].updated_at.is_some());
    }

    #[tokio::test]
    async fn test_edit_and_delete_require_owner_or_admin() {
        let svc = service().await;
        let created = svc.submit("10.0.0.1", request("mine", "alice")).await.unwrap();

        let stranger = Caller::new("mallory", false);
        assert!(matches!(svc.edit(&created.id, &stranger, "hijack").await, Err(AppError::Forbidden(_))));
        assert!(matches!(svc.delete(&created.id, &stranger).await, Err(AppError::Forbidden(_))));
        assert!(matches!(svc.edit(&created.id, &Caller::default(), "x").await, Err(AppError::Forbidden(_))));

        svc.edit(&created.id, &Caller::new("moderator", true), "moderated").await.unwrap();
        svc.delete(&created.id, &Caller::new("alice", false)).await.unwrap();
        assert!(matches!(svc.delete(&created.id, &Caller::new("alice", false)).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_edit_rejects_blank_content() {
        let svc = service().await;
        let created = svc.submit("10.0.0.1", request("text", "alice")).await.unwrap();

        let result = svc.edit(&created.id, &Caller::new("alice", false), "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_deleted_parent_leaves_unresolvable_reply() {
        let svc = service().await;
        let parent = svc.submit("10.0.0.1", request("parent", "alice")).await.unwrap();

        let mut reply = request("reply", "bob");
        reply.reply_to = Some(parent.id.clone());
        let reply = svc.submit("10.0.0.2", reply).await.unwrap();

        svc.delete(&parent.id, &Caller::new("alice", false)).await.unwrap();

        let listed = svc.list(&Caller::new("bob", false)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, reply.id);
        assert_eq!(listed[0].reply_to.as_deref(), Some(parent.id.as_str()));
        assert!(listed.iter().all(|m| m.id != parent.id));
    }

    #[tokio::test]
    async fn test_reply_target_must_be_visible() {
        let svc = service().await;
        let hidden = svc.submit("10.0.0.1", private("alice secret", "alice")).await.unwrap();

        let mut reply = request("peek", "bob");
        reply.reply_to = Some(hidden.id.clone());
        assert!(matches!(svc.submit("10.0.0.2", reply).await, Err(AppError::Validation(_))));

        let mut reply = request("nothing", "bob");
        reply.reply_to = Some("missing".to_string());
        assert!(matches!(svc.submit("10.0.0.2", reply).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_reply_to_private_message_is_private() {
        let svc = service().await;
        let question = svc.submit("10.0.0.1", private("help?", "alice")).await.unwrap();

        let mut answer = request("on it", "moderator");
        answer.is_admin = true;
        answer.reply_to = Some(question.id.clone());
        let answer = svc.submit("10.0.0.2", answer).await.unwrap();

        assert!(answer.is_private);
        let stored = MessageRepository::get_by_id(&svc.db, &answer.id).await.unwrap().unwrap();
        assert_ne!(stored.content, "on it");
    }
}
