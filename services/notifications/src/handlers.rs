use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use afrilingua_auth::Claims;
use afrilingua_common::{ApiResponse, AppError};
use afrilingua_database::Notification;

use crate::models::*;
use crate::services::{AppState, NotificationService};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

fn service(state: &AppState) -> NotificationService {
    NotificationService::new(state.db_pool.clone())
}

pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("Notifications Service is healthy".to_string()))
}

pub async fn handler_404() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Endpoint not found".to_string())),
    )
}

pub async fn list_notifications(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<NotificationListQuery>,
) -> ApiResult<Vec<Notification>> {
    ok(service(&state).list(claims.user_id(), query).await?)
}

pub async fn unread_count(State(state): State<AppState>, claims: Claims) -> ApiResult<UnreadCount> {
    ok(service(&state).unread_count(claims.user_id()).await?)
}

pub async fn mark_read(
    State(state): State<AppState>,
    claims: Claims,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Notification> {
    ok(service(&state).mark_read(claims.user_id(), notification_id).await?)
}

pub async fn mark_all_read(State(state): State<AppState>, claims: Claims) -> ApiResult<ReadAllResult> {
    ok(service(&state).mark_all_read(claims.user_id()).await?)
}
