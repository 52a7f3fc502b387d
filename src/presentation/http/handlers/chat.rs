//! Chat Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::parse_id;
use crate::application::dto::request::{
    CreateConversationRequest, MessageContentRequest, MessagesQuery,
};
use crate::application::dto::response::{ConversationResponse, MessageResponse, UnreadResponse};
use crate::application::services::{ChatService, ChatServiceImpl};
use crate::domain::Permission;
use crate::infrastructure::repositories::{PgChatRepository, PgUserRepository};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn chat_service(state: &AppState) -> impl ChatService {
    ChatServiceImpl::new(
        Arc::new(PgChatRepository::new(state.db.clone())),
        Arc::new(PgUserRepository::new(state.db.clone())),
        state.snowflake.clone(),
    )
}

/// Conversations the caller belongs to, most recent activity first
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ConversationResponse>>, AppError> {
    auth.require(Permission::ChatUse)?;
    let conversations = chat_service(&state).conversations(auth.user_id).await?;
    Ok(Json(conversations.into_iter().map(Into::into).collect()))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>), AppError> {
    auth.require(Permission::ChatUse)?;
    validate(&body)?;
    let conversation = chat_service(&state)
        .create_conversation(auth.company_id, auth.user_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(conversation.into())))
}

pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    auth.require(Permission::ChatUse)?;
    let conversation_id = parse_id(&conversation_id, "conversation_id")?;
    let before = query
        .before
        .as_deref()
        .map(|b| parse_id(b, "before"))
        .transpose()?;

    let messages = chat_service(&state)
        .messages(auth.company_id, auth.user_id, conversation_id, before, query.limit)
        .await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<String>,
    Json(body): Json<MessageContentRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    auth.require(Permission::ChatUse)?;
    validate(&body)?;
    let conversation_id = parse_id(&conversation_id, "conversation_id")?;
    let message = chat_service(&state)
        .send_message(auth.company_id, auth.user_id, conversation_id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message.into())))
}

/// Sender only
pub async fn edit_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<String>,
    Json(body): Json<MessageContentRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    auth.require(Permission::ChatUse)?;
    validate(&body)?;
    let message_id = parse_id(&message_id, "message_id")?;
    let message = chat_service(&state)
        .edit_message(auth.company_id, auth.user_id, message_id, &body.content)
        .await?;
    Ok(Json(message.into()))
}

pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::ChatUse)?;
    let message_id = parse_id(&message_id, "message_id")?;
    chat_service(&state)
        .delete_message(auth.company_id, auth.user_id, message_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, AppError> {
    auth.require(Permission::ChatUse)?;
    let conversation_id = parse_id(&conversation_id, "conversation_id")?;
    let marked = chat_service(&state)
        .mark_read(auth.company_id, auth.user_id, conversation_id)
        .await?;
    tracing::debug!(conversation_id, marked, "Messages marked read");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UnreadResponse>, AppError> {
    auth.require(Permission::ChatUse)?;
    let unread = chat_service(&state).unread_count(auth.user_id).await?;
    Ok(Json(UnreadResponse { unread }))
}
