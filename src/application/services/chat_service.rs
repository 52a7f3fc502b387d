//! Chat Service
//!
//! Internal conversations between users of one tenant. Every message gets an
//! unread recipient row for each member other than the sender.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::dto::parse_ids;
use crate::application::dto::request::CreateConversationRequest;
use crate::domain::{
    ChatMessage, ChatRepository, Conversation, ConversationSummary, UserRepository,
    MAX_MESSAGE_LENGTH,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

pub const DEFAULT_MESSAGE_LIMIT: i64 = 50;
pub const MAX_MESSAGE_LIMIT: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("You are not a member of this conversation")]
    NotMember,

    #[error("Only the sender can change this message")]
    NotSender,

    #[error("Unknown or inactive user: {0}")]
    UnknownMember(i64),

    #[error("A direct conversation needs exactly one other member")]
    DirectNeedsOneMember,

    #[error("At least one other member is required")]
    NoMembers,

    #[error("Message must be 1-4000 characters")]
    InvalidContent,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            e @ (ChatError::ConversationNotFound | ChatError::MessageNotFound) => {
                AppError::NotFound(e.to_string())
            }
            e @ (ChatError::NotMember | ChatError::NotSender) => AppError::Forbidden(e.to_string()),
            e @ (ChatError::UnknownMember(_)
            | ChatError::DirectNeedsOneMember
            | ChatError::NoMembers
            | ChatError::InvalidContent) => AppError::validation(e.to_string()),
            ChatError::Repository(e) => e,
        }
    }
}

fn clean_content(content: &str) -> Result<String, ChatError> {
    let content = content.trim();
    if content.is_empty() || content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ChatError::InvalidContent);
    }
    Ok(content.to_string())
}

#[async_trait]
pub trait ChatService: Send + Sync {
    async fn conversations(&self, user_id: i64) -> Result<Vec<ConversationSummary>, ChatError>;

    /// Create a conversation, or return the existing direct one between the
    /// same two users.
    async fn create_conversation(
        &self,
        company_id: i64,
        user_id: i64,
        request: CreateConversationRequest,
    ) -> Result<ConversationSummary, ChatError>;

    async fn messages(
        &self,
        company_id: i64,
        user_id: i64,
        conversation_id: i64,
        before: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>, ChatError>;

    async fn send_message(
        &self,
        company_id: i64,
        user_id: i64,
        conversation_id: i64,
        content: &str,
    ) -> Result<ChatMessage, ChatError>;

    async fn edit_message(
        &self,
        company_id: i64,
        user_id: i64,
        message_id: i64,
        content: &str,
    ) -> Result<ChatMessage, ChatError>;

    async fn delete_message(&self, company_id: i64, user_id: i64, message_id: i64) -> Result<(), ChatError>;

    /// Returns how many messages were marked.
    async fn mark_read(&self, company_id: i64, user_id: i64, conversation_id: i64) -> Result<u64, ChatError>;

    async fn unread_count(&self, user_id: i64) -> Result<i64, ChatError>;
}

pub struct ChatServiceImpl<C: ChatRepository, U: UserRepository> {
    chat_repo: Arc<C>,
    user_repo: Arc<U>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<C: ChatRepository, U: UserRepository> ChatServiceImpl<C, U> {
    pub fn new(chat_repo: Arc<C>, user_repo: Arc<U>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            chat_repo,
            user_repo,
            id_generator,
        }
    }

    /// The conversation, provided it is in the tenant and the user is a member.
    async fn membership(
        &self,
        company_id: i64,
        user_id: i64,
        conversation_id: i64,
    ) -> Result<Conversation, ChatError> {
        let conversation = self
            .chat_repo
            .find_conversation(company_id, conversation_id)
            .await?
            .ok_or(ChatError::ConversationNotFound)?;

        if !self.chat_repo.is_member(conversation_id, user_id).await? {
            return Err(ChatError::NotMember);
        }
        Ok(conversation)
    }

    /// A message the user sent, in a conversation of the tenant.
    async fn own_message(&self, company_id: i64, user_id: i64, message_id: i64) -> Result<ChatMessage, ChatError> {
        let message = self
            .chat_repo
            .find_message(message_id)
            .await?
            .ok_or(ChatError::MessageNotFound)?;

        self.chat_repo
            .find_conversation(company_id, message.conversation_id)
            .await?
            .ok_or(ChatError::MessageNotFound)?;

        if message.sender_id != user_id {
            return Err(ChatError::NotSender);
        }
        Ok(message)
    }
}

#[async_trait]
impl<C, U> ChatService for ChatServiceImpl<C, U>
where
    C: ChatRepository + 'static,
    U: UserRepository + 'static,
{
    async fn conversations(&self, user_id: i64) -> Result<Vec<ConversationSummary>, ChatError> {
        Ok(self.chat_repo.list_for_user(user_id).await?)
    }

    async fn create_conversation(
        &self,
        company_id: i64,
        user_id: i64,
        request: CreateConversationRequest,
    ) -> Result<ConversationSummary, ChatError> {
        let mut others = parse_ids(&request.member_ids, "member_ids")?;
        others.retain(|id| *id != user_id);
        others.sort_unstable();
        others.dedup();

        let active = self.user_repo.active_ids_in_company(company_id, &others).await?;
        if let Some(missing) = others.iter().find(|id| !active.contains(id)) {
            return Err(ChatError::UnknownMember(*missing));
        }

        let is_group = request.is_group.unwrap_or(others.len() > 1);
        if !is_group {
            let [other] = others[..] else {
                return Err(ChatError::DirectNeedsOneMember);
            };
            if let Some(existing) = self.chat_repo.find_direct(company_id, user_id, other).await? {
                let summary = self
                    .chat_repo
                    .list_for_user(user_id)
                    .await?
                    .into_iter()
                    .find(|s| s.conversation.id == existing.id)
                    .unwrap_or(ConversationSummary {
                        conversation: existing,
                        member_ids: vec![user_id, other],
                        unread_count: 0,
                    });
                return Ok(summary);
            }
        } else if others.is_empty() {
            return Err(ChatError::NoMembers);
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: self.id_generator.generate(),
            company_id,
            title: request
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            is_group,
            created_by: user_id,
            created_at: now,
            last_activity_at: now,
        };

        let mut members = vec![user_id];
        members.extend(&others);

        let conversation = self
            .chat_repo
            .create_conversation(&conversation, &members)
            .await?;
        tracing::info!(
            company_id,
            conversation_id = conversation.id,
            members = members.len(),
            "Conversation created"
        );

        Ok(ConversationSummary {
            conversation,
            member_ids: members,
            unread_count: 0,
        })
    }

    async fn messages(
        &self,
        company_id: i64,
        user_id: i64,
        conversation_id: i64,
        before: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        self.membership(company_id, user_id, conversation_id).await?;
        let limit = limit
            .unwrap_or(DEFAULT_MESSAGE_LIMIT)
            .clamp(1, MAX_MESSAGE_LIMIT);
        Ok(self.chat_repo.messages(conversation_id, before, limit).await?)
    }

    async fn send_message(
        &self,
        company_id: i64,
        user_id: i64,
        conversation_id: i64,
        content: &str,
    ) -> Result<ChatMessage, ChatError> {
        let content = clean_content(content)?;
        self.membership(company_id, user_id, conversation_id).await?;

        let recipients: Vec<i64> = self
            .chat_repo
            .member_ids(conversation_id)
            .await?
            .into_iter()
            .filter(|id| *id != user_id)
            .collect();

        let message = ChatMessage {
            id: self.id_generator.generate(),
            conversation_id,
            sender_id: user_id,
            content,
            edited_at: None,
            created_at: Utc::now(),
        };

        let message = self.chat_repo.create_message(&message, &recipients).await?;
        tracing::debug!(conversation_id, message_id = message.id, "Message sent");
        Ok(message)
    }

    async fn edit_message(
        &self,
        company_id: i64,
        user_id: i64,
        message_id: i64,
        content: &str,
    ) -> Result<ChatMessage, ChatError> {
        let content = clean_content(content)?;
        self.own_message(company_id, user_id, message_id).await?;
        Ok(self.chat_repo.update_message_content(message_id, &content).await?)
    }

    async fn delete_message(&self, company_id: i64, user_id: i64, message_id: i64) -> Result<(), ChatError> {
        self.own_message(company_id, user_id, message_id).await?;
        Ok(self.chat_repo.delete_message(message_id).await?)
    }

    async fn mark_read(&self, company_id: i64, user_id: i64, conversation_id: i64) -> Result<u64, ChatError> {
        self.membership(company_id, user_id, conversation_id).await?;
        Ok(self.chat_repo.mark_read(conversation_id, user_id).await?)
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, ChatError> {
        Ok(self.chat_repo.unread_count(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockChatRepository, MockUserRepository};
    use mockall::predicate::*;
    use pretty_assertions::assert_eq;

    fn create_test_conversation(id: i64, is_group: bool) -> Conversation {
        let now = Utc::now();
        Conversation {
            id,
            company_id: 1,
            title: None,
            is_group,
            created_by: 10,
            created_at: now,
            last_activity_at: now,
        }
    }

    fn create_test_message(id: i64, sender_id: i64) -> ChatMessage {
        ChatMessage {
            id,
            conversation_id: 100,
            sender_id,
            content: "hello".into(),
            edited_at: None,
            created_at: Utc::now(),
        }
    }

    fn create_service(
        chat: MockChatRepository,
        users: MockUserRepository,
    ) -> ChatServiceImpl<MockChatRepository, MockUserRepository> {
        ChatServiceImpl::new(Arc::new(chat), Arc::new(users), Arc::new(SnowflakeGenerator::new(1, 0)))
    }

    fn direct_request(member: &str) -> CreateConversationRequest {
        CreateConversationRequest {
            title: None,
            member_ids: vec![member.to_string()],
            is_group: None,
        }
    }

    // ==================== Conversations ====================

    #[tokio::test]
    async fn test_direct_conversation_is_reused() {
        let mut users = MockUserRepository::new();
        users
            .expect_active_ids_in_company()
            .returning(|_, ids| Ok(ids.to_vec()));

        let mut chat = MockChatRepository::new();
        chat.expect_find_direct()
            .with(eq(1), eq(10), eq(20))
            .returning(|_, _, _| Ok(Some(create_test_conversation(100, false))));
        chat.expect_list_for_user().returning(|_| Ok(vec![]));
        chat.expect_create_conversation().never();

        let summary = create_service(chat, users)
            .create_conversation(1, 10, direct_request("20"))
            .await
            .unwrap();

        assert_eq!(summary.conversation.id, 100);
        assert_eq!(summary.member_ids, vec![10, 20]);
    }

    #[tokio::test]
    async fn test_new_direct_conversation_includes_creator() {
        let mut users = MockUserRepository::new();
        users
            .expect_active_ids_in_company()
            .returning(|_, ids| Ok(ids.to_vec()));

        let mut chat = MockChatRepository::new();
        chat.expect_find_direct().returning(|_, _, _| Ok(None));
        chat.expect_create_conversation()
            .withf(|c, members| !c.is_group && members == [10, 20])
            .times(1)
            .returning(|c, _| Ok(c.clone()));

        let summary = create_service(chat, users)
            .create_conversation(1, 10, direct_request("20"))
            .await
            .unwrap();
        assert_eq!(summary.unread_count, 0);
    }

    #[tokio::test]
    async fn test_member_from_other_tenant_is_rejected() {
        let mut users = MockUserRepository::new();
        users.expect_active_ids_in_company().returning(|_, _| Ok(vec![]));
        let mut chat = MockChatRepository::new();
        chat.expect_create_conversation().never();

        let result = create_service(chat, users)
            .create_conversation(1, 10, direct_request("99"))
            .await;
        assert!(matches!(result, Err(ChatError::UnknownMember(99))));
    }

    #[tokio::test]
    async fn test_direct_conversation_with_two_others_is_rejected() {
        let mut users = MockUserRepository::new();
        users
            .expect_active_ids_in_company()
            .returning(|_, ids| Ok(ids.to_vec()));

        let request = CreateConversationRequest {
            title: None,
            member_ids: vec!["20".into(), "30".into()],
            is_group: Some(false),
        };
        let result = create_service(MockChatRepository::new(), users)
            .create_conversation(1, 10, request)
            .await;
        assert!(matches!(result, Err(ChatError::DirectNeedsOneMember)));
    }

    // ==================== Messages ====================

    #[tokio::test]
    async fn test_send_creates_recipients_for_other_members() {
        let mut chat = MockChatRepository::new();
        chat.expect_find_conversation()
            .returning(|_, id| Ok(Some(create_test_conversation(id, true))));
        chat.expect_is_member().returning(|_, _| Ok(true));
        chat.expect_member_ids().returning(|_| Ok(vec![10, 20, 30]));
        chat.expect_create_message()
            .withf(|m, recipients| m.content == "hi there" && recipients == [20, 30])
            .times(1)
            .returning(|m, _| Ok(m.clone()));

        let message = create_service(chat, MockUserRepository::new())
            .send_message(1, 10, 100, "  hi there ")
            .await
            .unwrap();
        assert_eq!(message.sender_id, 10);
    }

    #[tokio::test]
    async fn test_non_member_cannot_read_messages() {
        let mut chat = MockChatRepository::new();
        chat.expect_find_conversation()
            .returning(|_, id| Ok(Some(create_test_conversation(id, true))));
        chat.expect_is_member().returning(|_, _| Ok(false));
        chat.expect_messages().never();

        let result = create_service(chat, MockUserRepository::new())
            .messages(1, 40, 100, None, None)
            .await;
        assert!(matches!(result, Err(ChatError::NotMember)));
    }

    #[tokio::test]
    async fn test_messages_limit_is_clamped() {
        let mut chat = MockChatRepository::new();
        chat.expect_find_conversation()
            .returning(|_, id| Ok(Some(create_test_conversation(id, true))));
        chat.expect_is_member().returning(|_, _| Ok(true));
        chat.expect_messages()
            .with(eq(100), eq(Some(555)), eq(MAX_MESSAGE_LIMIT))
            .returning(|_, _, _| Ok(vec![]));

        let messages = create_service(chat, MockUserRepository::new())
            .messages(1, 10, 100, Some(555), Some(10_000))
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_only_sender_can_edit() {
        let mut chat = MockChatRepository::new();
        chat.expect_find_message()
            .returning(|id| Ok(Some(create_test_message(id, 20))));
        chat.expect_find_conversation()
            .returning(|_, id| Ok(Some(create_test_conversation(id, true))));
        chat.expect_update_message_content().never();

        let result = create_service(chat, MockUserRepository::new())
            .edit_message(1, 10, 5, "changed")
            .await;
        assert!(matches!(result, Err(ChatError::NotSender)));
    }

    #[test]
    fn test_clean_content() {
        assert_eq!(clean_content(" hi ").unwrap(), "hi");
        assert!(matches!(clean_content("   "), Err(ChatError::InvalidContent)));
        assert!(clean_content(&"x".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
    }
}
