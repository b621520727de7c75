use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use afrilingua_auth::{Claims, ClientInfo, OptionalClaims};
use afrilingua_common::{ApiResponse, AppError, UserRole};
use afrilingua_database::{Course, Lesson};

use crate::models::*;
use crate::services::{AppState, CourseService, Viewer};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("Courses Service is healthy".to_string()))
}

pub async fn handler_404() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Endpoint not found".to_string())),
    )
}

// Courses
pub async fn list_courses(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Query(query): Query<CourseListQuery>,
) -> ApiResult<Vec<CourseSummary>> {
    let viewer = Viewer::from_claims(claims.as_ref());
    ok(CourseService::new(&state).list_courses(viewer, query).await?)
}

pub async fn get_course(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Path(course_id): Path<Uuid>,
) -> ApiResult<CourseDetail> {
    let viewer = Viewer::from_claims(claims.as_ref());
    ok(CourseService::new(&state).get_course(course_id, viewer).await?)
}

pub async fn create_course(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Json(request): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Course>>), AppError> {
    claims.require_role(&[UserRole::Tutor, UserRole::Admin])?;
    request.validate()?;
    let course = CourseService::new(&state)
        .create_course(&claims, request, &client)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(course))))
}

pub async fn update_course(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Path(course_id): Path<Uuid>,
    Json(request): Json<UpdateCourseRequest>,
) -> ApiResult<Course> {
    claims.require_role(&[UserRole::Tutor, UserRole::Admin])?;
    request.validate()?;
    ok(CourseService::new(&state)
        .update_course(&claims, course_id, request, &client)
        .await?)
}

// Lessons
pub async fn list_lessons(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Vec<Lesson>> {
    let viewer = Viewer::from_claims(claims.as_ref());
    ok(CourseService::new(&state).list_lessons(course_id, viewer).await?)
}

pub async fn create_lesson(
    State(state): State<AppState>,
    claims: Claims,
    Path(course_id): Path<Uuid>,
    Json(request): Json<CreateLessonRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Lesson>>), AppError> {
    claims.require_role(&[UserRole::Tutor, UserRole::Admin])?;
    request.validate()?;
    let lesson = CourseService::new(&state)
        .create_lesson(&claims, course_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(lesson))))
}

pub async fn get_lesson(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Path(lesson_id): Path<Uuid>,
) -> ApiResult<Lesson> {
    let viewer = Viewer::from_claims(claims.as_ref());
    ok(CourseService::new(&state).get_lesson(lesson_id, viewer).await?)
}

pub async fn update_lesson(
    State(state): State<AppState>,
    claims: Claims,
    Path(lesson_id): Path<Uuid>,
    Json(request): Json<UpdateLessonRequest>,
) -> ApiResult<Lesson> {
    claims.require_role(&[UserRole::Tutor, UserRole::Admin])?;
    request.validate()?;
    ok(CourseService::new(&state)
        .update_lesson(&claims, lesson_id, request)
        .await?)
}
