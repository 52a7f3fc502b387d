//! Chat Repository Implementation
//!
//! Read state is tracked per recipient in `chat_message_recipients`; the
//! sender never gets a recipient row for their own message.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{ChatMessage, ChatRepository, Conversation, ConversationSummary};
use crate::shared::error::AppError;

const CONVERSATION_COLUMNS: &str =
    "c.id, c.company_id, c.title, c.is_group, c.created_by, c.created_at, c.last_activity_at";

#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: i64,
    company_id: i64,
    title: Option<String>,
    is_group: bool,
    created_by: i64,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl ConversationRow {
    fn into_conversation(self) -> Conversation {
        Conversation {
            id: self.id,
            company_id: self.company_id,
            title: self.title,
            is_group: self.is_group,
            created_by: self.created_by,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    conversation_id: i64,
    sender_id: i64,
    content: String,
    edited_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            content: self.content,
            edited_at: self.edited_at,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL chat repository implementation.
#[derive(Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<ConversationSummary>, AppError> {
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS}
            FROM chat_conversations c
            JOIN chat_conversation_members m ON m.conversation_id = c.id
            WHERE m.user_id = $1
            ORDER BY c.last_activity_at DESC, c.id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

        let members = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT conversation_id, user_id
            FROM chat_conversation_members
            WHERE conversation_id = ANY($1)
            ORDER BY joined_at, user_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let unread = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT msg.conversation_id, COUNT(*)
            FROM chat_message_recipients r
            JOIN chat_messages msg ON msg.id = r.message_id
            WHERE r.user_id = $1 AND r.read_at IS NULL AND msg.conversation_id = ANY($2)
            GROUP BY msg.conversation_id
            "#,
        )
        .bind(user_id)
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut member_map: HashMap<i64, Vec<i64>> = HashMap::new();
        for (conversation_id, member_id) in members {
            member_map.entry(conversation_id).or_default().push(member_id);
        }
        let unread_map: HashMap<i64, i64> = unread.into_iter().collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                ConversationSummary {
                    conversation: row.into_conversation(),
                    member_ids: member_map.remove(&id).unwrap_or_default(),
                    unread_count: unread_map.get(&id).copied().unwrap_or(0),
                }
            })
            .collect())
    }

    async fn find_conversation(
        &self,
        company_id: i64,
        id: i64,
    ) -> Result<Option<Conversation>, AppError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations c WHERE c.company_id = $1 AND c.id = $2"
        ))
        .bind(company_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_conversation()))
    }

    async fn find_direct(
        &self,
        company_id: i64,
        user_a: i64,
        user_b: i64,
    ) -> Result<Option<Conversation>, AppError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS}
            FROM chat_conversations c
            WHERE c.company_id = $1
              AND NOT c.is_group
              AND EXISTS (SELECT 1 FROM chat_conversation_members
                          WHERE conversation_id = c.id AND user_id = $2)
              AND EXISTS (SELECT 1 FROM chat_conversation_members
                          WHERE conversation_id = c.id AND user_id = $3)
              AND (SELECT COUNT(*) FROM chat_conversation_members
                   WHERE conversation_id = c.id) = 2
            ORDER BY c.id
            LIMIT 1
            "#
        ))
        .bind(company_id)
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_conversation()))
    }

    async fn create_conversation(
        &self,
        conversation: &Conversation,
        member_ids: &[i64],
    ) -> Result<Conversation, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            INSERT INTO chat_conversations (id, company_id, title, is_group, created_by,
                                            created_at, last_activity_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, company_id, title, is_group, created_by, created_at, last_activity_at
            "#,
        )
        .bind(conversation.id)
        .bind(conversation.company_id)
        .bind(&conversation.title)
        .bind(conversation.is_group)
        .bind(conversation.created_by)
        .bind(conversation.created_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO chat_conversation_members (conversation_id, user_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(conversation.id)
        .bind(member_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into_conversation())
    }

    async fn member_ids(&self, conversation_id: i64) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM chat_conversation_members WHERE conversation_id = $1 ORDER BY joined_at, user_id",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn is_member(&self, conversation_id: i64, user_id: i64) -> Result<bool, AppError> {
        let found = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM chat_conversation_members
                          WHERE conversation_id = $1 AND user_id = $2)
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(found)
    }

    async fn messages(
        &self,
        conversation_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, sender_id, content, edited_at, created_at
            FROM chat_messages
            WHERE conversation_id = $1
              AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(conversation_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    async fn create_message(
        &self,
        message: &ChatMessage,
        recipient_ids: &[i64],
    ) -> Result<ChatMessage, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO chat_messages (id, conversation_id, sender_id, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, conversation_id, sender_id, content, edited_at, created_at
            "#,
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(message.created_at)
        .fetch_one(&mut *tx)
        .await?;

        if !recipient_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO chat_message_recipients (message_id, user_id)
                SELECT $1, UNNEST($2::BIGINT[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(message.id)
            .bind(recipient_ids)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE chat_conversations SET last_activity_at = $2 WHERE id = $1")
            .bind(message.conversation_id)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into_message())
    }

    async fn find_message(&self, id: i64) -> Result<Option<ChatMessage>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "SELECT id, conversation_id, sender_id, content, edited_at, created_at FROM chat_messages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    async fn update_message_content(
        &self,
        id: i64,
        content: &str,
    ) -> Result<ChatMessage, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE chat_messages
            SET content = $2, edited_at = NOW()
            WHERE id = $1
            RETURNING id, conversation_id, sender_id, content, edited_at, created_at
            "#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".into()))?;

        Ok(row.into_message())
    }

    async fn delete_message(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Message not found".into()));
        }
        Ok(())
    }

    async fn mark_read(&self, conversation_id: i64, user_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE chat_message_recipients r
            SET read_at = NOW()
            FROM chat_messages msg
            WHERE msg.id = r.message_id
              AND msg.conversation_id = $1
              AND r.user_id = $2
              AND r.read_at IS NULL
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM chat_message_recipients WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
