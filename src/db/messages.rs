use sqlx::{Pool, Sqlite};
use uuid::Uuid;
use crate::db::models::{Message, NewMessage, Visibility};
use crate::error::AppError;

const MESSAGE_COLUMNS: &str = "id, content, author_name, session_id, created_at, updated_at, \
    is_admin, is_private, reply_to, youtube_id, giphy_url, image_url, video_url";

pub struct MessageRepository;

impl MessageRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        draft: &NewMessage,
    ) -> Result<Message, AppError> {
        if draft.content().trim().is_empty() || draft.session_id.is_empty() {
            return Err(AppError::Validation("Content and session are required".to_string()));
        }
        if !draft.is_ready() {
            return Err(AppError::Internal("Private message was not sealed".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            r#"
INSERT INTO chat_messages (
    id, content, author_name, ip_hash, session_id, created_at,
    is_admin, is_private, reply_to, youtube_id, giphy_url, image_url, video_url
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(draft.content())
        .bind(&draft.author_name)
        .bind(&draft.ip_hash)
        .bind(&draft.session_id)
        .bind(created_at)
        .bind(draft.is_admin)
        .bind(draft.is_private)
        .bind(&draft.reply_to)
        .bind(&draft.media.youtube_id)
        .bind(&draft.media.giphy_url)
        .bind(&draft.media.image_url)
        .bind(&draft.media.video_url)
        .execute(pool)
        .await?;

        let message = Self::get_by_id(pool, &id).await?
            .ok_or_else(|| AppError::Internal("Failed to fetch created message".to_string()))?;

        Ok(message)
    }

    pub async fn get_by_id(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>(&format!(
            "SELECT {} FROM chat_messages WHERE id = ?",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(message)
    }

    /// The most recent `limit` visible messages, oldest first.
    pub async fn list(
        pool: &Pool<Sqlite>,
        visibility: &Visibility,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let (all, session) = Self::predicate_args(visibility);

        let messages = sqlx::query_as::<_, Message>(&format!(
            r#"
SELECT {columns} FROM (
    SELECT seq, {columns}
    FROM chat_messages
    WHERE (? OR is_private = 0 OR session_id = ?)
    ORDER BY created_at DESC, seq DESC
    LIMIT ?
)
ORDER BY created_at ASC, seq ASC
            "#,
            columns = MESSAGE_COLUMNS
        ))
        .bind(all)
        .bind(session)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Public messages plus the caller's own private ones; everything for admins.
    pub async fn count(
        pool: &Pool<Sqlite>,
        visibility: &Visibility,
    ) -> Result<i64, AppError> {
        let count: i64 = match visibility {
            Visibility::All => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chat_messages")
                    .fetch_one(pool)
                    .await?
            }
            Visibility::Session(session) => {
                let public: i64 =
                    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chat_messages WHERE is_private = 0")
                        .fetch_one(pool)
                        .await?;
                let own_private: i64 = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM chat_messages WHERE is_private = 1 AND session_id = ?",
                )
                .bind(session)
                .fetch_one(pool)
                .await?;
                public + own_private
            }
        };

        Ok(count)
    }

    /// Replace the body and stamp `updated_at`. `content` must already be
    /// sealed if the row is private.
    pub async fn update_content(
        pool: &Pool<Sqlite>,
        id: &str,
        content: &str,
    ) -> Result<(), AppError> {
        let updated_at = chrono::Utc::now().timestamp_millis();

        let result = sqlx::query("UPDATE chat_messages SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(updated_at)
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Message not found".to_string()));
        }

        Ok(())
    }

    /// Hard delete. Replies keep their dangling `reply_to`.
    pub async fn delete(
        pool: &Pool<Sqlite>,
        id: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Message not found".to_string()));
        }

        Ok(())
    }

    fn predicate_args(visibility: &Visibility) -> (bool, &str) {
        match visibility {
            Visibility::All => (true, ""),
            Visibility::Session(session) => (false, session.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    async fn post(pool: &Pool<Sqlite>, content: &str, session: &str, private: bool) -> Message {
        let mut draft = NewMessage::new(content, session).unwrap();
        draft.is_private = private;
        if private {
            draft = draft.seal(&crate::crypto::XorCodec::new("test")).unwrap();
        }
        MessageRepository::create(pool, &draft).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamp() {
        let pool = memory_pool().await.unwrap();
        let message = post(&pool, "hello", "s1", false).await;

        assert!(!message.id.is_empty());
        assert!(message.created_at > 0);
        assert!(message.updated_at.is_none());
        assert_eq!(message.content, "hello");
    }

    #[tokio::test]
    async fn test_unsealed_private_draft_is_refused() {
        let pool = memory_pool().await.unwrap();
        let mut draft = NewMessage::new("secret", "s1").unwrap();
        draft.is_private = true;

        let result = MessageRepository::create(&pool, &draft).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(MessageRepository::count(&pool, &Visibility::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let pool = memory_pool().await.unwrap();
        for content in ["A", "B", "C"] {
            post(&pool, content, "s1", false).await;
        }

        let listed = MessageRepository::list(&pool, &Visibility::All, 100).await.unwrap();
        let contents: Vec<_> = listed.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_same_millisecond_rows_keep_insertion_order() {
        let pool = memory_pool().await.unwrap();
        for (id, content) in [("zzz", "first"), ("mmm", "second"), ("aaa", "third")] {
            sqlx::query(
                "INSERT INTO chat_messages (id, content, session_id, created_at) VALUES (?, ?, 's1', 1700000000000)",
            )
            .bind(id)
            .bind(content)
            .execute(&pool)
            .await
            .unwrap();
        }

        let listed = MessageRepository::list(&pool, &Visibility::All, 100).await.unwrap();
        let contents: Vec<_> = listed.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);

        let latest = MessageRepository::list(&pool, &Visibility::All, 2).await.unwrap();
        let contents: Vec<_> = latest.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["second", "third"]);
    }

    #[tokio::test]
    async fn test_list_limit_keeps_latest() {
        let pool = memory_pool().await.unwrap();
        for content in ["1", "2", "3", "4"] {
            post(&pool, content, "s1", false).await;
        }

        let listed = MessageRepository::list(&pool, &Visibility::All, 2).await.unwrap();
        let contents: Vec<_> = listed.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["3", "4"]);
    }

    #[tokio::test]
    async fn test_visibility_filter_and_count() {
        let pool = memory_pool().await.unwrap();
        post(&pool, "public", "alice", false).await;
        post(&pool, "alice secret", "alice", true).await;
        post(&pool, "bob secret", "bob", true).await;

        let alice = Visibility::Session("alice".to_string());
        let carol = Visibility::Session("carol".to_string());

        assert_eq!(MessageRepository::list(&pool, &alice, 100).await.unwrap().len(), 2);
        assert_eq!(MessageRepository::list(&pool, &carol, 100).await.unwrap().len(), 1);
        assert_eq!(MessageRepository::list(&pool, &Visibility::All, 100).await.unwrap().len(), 3);

        assert_eq!(MessageRepository::count(&pool, &alice).await.unwrap(), 2);
        assert_eq!(MessageRepository::count(&pool, &carol).await.unwrap(), 1);
        assert_eq!(MessageRepository::count(&pool, &Visibility::All).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_rows() {
        let pool = memory_pool().await.unwrap();

        let result = MessageRepository::update_content(&pool, "nope", "x").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(MessageRepository::count(&pool, &Visibility::All).await.unwrap(), 0);

        let result = MessageRepository::delete(&pool, "nope").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_sets_updated_at() {
        let pool = memory_pool().await.unwrap();
        let message = post(&pool, "before", "s1", false).await;

        MessageRepository::update_content(&pool, &message.id, "after").await.unwrap();

        let stored = MessageRepository::get_by_id(&pool, &message.id).await.unwrap().unwrap();
        assert_eq!(stored.content, "after");
        assert!(stored.updated_at.is_some());
        assert_eq!(stored.created_at, message.created_at);
    }

    #[tokio::test]
    async fn test_delete_does_not_cascade_to_replies() {
        let pool = memory_pool().await.unwrap();
        let parent = post(&pool, "parent", "s1", false).await;

        let mut reply = NewMessage::new("reply", "s2").unwrap();
        reply.reply_to = Some(parent.id.clone());
        let reply = MessageRepository::create(&pool, &reply).await.unwrap();

        MessageRepository::delete(&pool, &parent.id).await.unwrap();

        let listed = MessageRepository::list(&pool, &Visibility::All, 100).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, reply.id);
        assert_eq!(listed[0].reply_to.as_deref(), Some(parent.id.as_str()));
    }
}
