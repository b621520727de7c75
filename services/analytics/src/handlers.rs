use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use afrilingua_auth::{Claims, OptionalClaims};
use afrilingua_common::{ApiResponse, AppError, UserRole};
use afrilingua_database::{AuditLog, StudentProgress, Testimonial};

use crate::audit_logs::AuditLogService;
use crate::models::*;
use crate::progress::ProgressService;
use crate::services::{AppState, TestimonialService};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("Analytics Service is healthy".to_string()))
}

pub async fn handler_404() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Endpoint not found".to_string())),
    )
}

// Testimonials
pub async fn create_testimonial(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<CreateTestimonialRequest>,
) -> Created<Testimonial> {
    claims.require_role(&[UserRole::Student])?;
    request.validate()?;
    let testimonial = TestimonialService::new(state.db_pool.clone())
        .create(claims.user_id(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(testimonial))))
}

pub async fn list_testimonials(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Query(query): Query<TestimonialListQuery>,
) -> ApiResult<Vec<Testimonial>> {
    ok(TestimonialService::new(state.db_pool.clone())
        .list(claims.as_ref(), query)
        .await?)
}

pub async fn set_testimonial_approval(
    State(state): State<AppState>,
    claims: Claims,
    Path(testimonial_id): Path<Uuid>,
    Json(request): Json<TestimonialApprovalRequest>,
) -> ApiResult<Testimonial> {
    claims.require_role(&[UserRole::Admin])?;
    ok(TestimonialService::new(state.db_pool.clone())
        .set_approval(testimonial_id, request)
        .await?)
}

// Progress
pub async fn record_progress(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<RecordProgressRequest>,
) -> ApiResult<StudentProgress> {
    claims.require_role(&[UserRole::Student])?;
    request.validate()?;
    ok(ProgressService::new(state.db_pool.clone())
        .record(claims.user_id(), request)
        .await?)
}

pub async fn complete_progress(
    State(state): State<AppState>,
    claims: Claims,
    Path(progress_id): Path<Uuid>,
) -> ApiResult<StudentProgress> {
    claims.require_role(&[UserRole::Student])?;
    ok(ProgressService::new(state.db_pool.clone())
        .complete(claims.user_id(), progress_id)
        .await?)
}

pub async fn list_progress(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<ProgressListQuery>,
) -> ApiResult<Vec<StudentProgress>> {
    ok(ProgressService::new(state.db_pool.clone())
        .list(claims.user_id(), query)
        .await?)
}

pub async fn course_progress(
    State(state): State<AppState>,
    claims: Claims,
    Path(course_id): Path<Uuid>,
) -> ApiResult<CourseProgress> {
    ok(ProgressService::new(state.db_pool.clone())
        .course_summary(claims.user_id(), course_id)
        .await?)
}

// Audit logs
pub async fn list_audit_logs(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Vec<AuditLog>> {
    claims.require_role(&[UserRole::Admin])?;
    ok(AuditLogService::new(state.db_pool.clone()).search(query).await?)
}
