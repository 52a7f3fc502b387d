//! Internal chat: conversations, messages and per-recipient read state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::shared::error::AppError;

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// A conversation between users of one tenant.
///
/// Maps to `chat_conversations`; members live in
/// `chat_conversation_members`.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: i64,
    pub company_id: i64,
    pub title: Option<String>,
    /// Direct conversations have exactly two members
    pub is_group: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    /// Time of the latest message, or creation time when empty
    pub last_activity_at: DateTime<Utc>,
}

/// A conversation as seen by one member.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub member_ids: Vec<i64>,
    pub unread_count: i64,
}

/// Maps to `chat_messages`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Conversations the user belongs to, most recently active first.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<ConversationSummary>, AppError>;

    async fn find_conversation(
        &self,
        company_id: i64,
        id: i64,
    ) -> Result<Option<Conversation>, AppError>;

    /// Existing non-group conversation between exactly these two users.
    async fn find_direct(
        &self,
        company_id: i64,
        user_a: i64,
        user_b: i64,
    ) -> Result<Option<Conversation>, AppError>;

    /// Insert a conversation and its members in one transaction.
    async fn create_conversation(
        &self,
        conversation: &Conversation,
        member_ids: &[i64],
    ) -> Result<Conversation, AppError>;

    async fn member_ids(&self, conversation_id: i64) -> Result<Vec<i64>, AppError>;

    async fn is_member(&self, conversation_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Messages newest first, optionally strictly older than `before`.
    async fn messages(
        &self,
        conversation_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, AppError>;

    /// Insert a message and one unread recipient row per recipient, in one
    /// transaction.
    async fn create_message(
        &self,
        message: &ChatMessage,
        recipient_ids: &[i64],
    ) -> Result<ChatMessage, AppError>;

    async fn find_message(&self, id: i64) -> Result<Option<ChatMessage>, AppError>;

    async fn update_message_content(
        &self,
        id: i64,
        content: &str,
    ) -> Result<ChatMessage, AppError>;

    async fn delete_message(&self, id: i64) -> Result<(), AppError>;

    /// Mark every unread message of the conversation as read for the user.
    async fn mark_read(&self, conversation_id: i64, user_id: i64) -> Result<u64, AppError>;

    /// Unread messages for the user across all conversations.
    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError>;
}
