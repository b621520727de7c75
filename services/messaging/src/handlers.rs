use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use afrilingua_auth::Claims;
use afrilingua_common::{ApiResponse, AppError};

use crate::models::*;
use crate::services::{AppState, MessagingService};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("Messaging Service is healthy".to_string()))
}

pub async fn handler_404() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Endpoint not found".to_string())),
    )
}

// Conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<Vec<ConversationSummary>> {
    ok(MessagingService::new(&state)
        .list_conversations(claims.user_id())
        .await?)
}

pub async fn create_conversation(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ConversationSummary>>), AppError> {
    let conversation = MessagingService::new(&state)
        .create_conversation(&claims, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(conversation))))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    claims: Claims,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<ConversationSummary> {
    ok(MessagingService::new(&state)
        .get_conversation(claims.user_id(), conversation_id)
        .await?)
}

// Messages
pub async fn list_messages(
    State(state): State<AppState>,
    claims: Claims,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<Vec<MessageView>> {
    ok(MessagingService::new(&state)
        .list_messages(claims.user_id(), conversation_id)
        .await?)
}

pub async fn send_message(
    State(state): State<AppState>,
    claims: Claims,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageView>>), AppError> {
    request.validate()?;
    let message = MessagingService::new(&state)
        .send_message(&claims, conversation_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(message))))
}

pub async fn mark_read(
    State(state): State<AppState>,
    claims: Claims,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<ReadReceipt> {
    ok(MessagingService::new(&state)
        .mark_read(claims.user_id(), conversation_id)
        .await?)
}
