use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use afrilingua_auth::{Claims, ClientInfo, OptionalClaims};
use afrilingua_common::{ApiResponse, AppError, ApprovalStatus, MessageResponse, UserRole};

use crate::models::*;
use crate::services::{AccountService, AppState};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

// Health check
pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("Accounts Service is healthy".to_string()))
}

pub async fn handler_404() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Endpoint not found".to_string())),
    )
}

// Registration
pub async fn register_student(
    State(state): State<AppState>,
    Json(request): Json<RegisterStudentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegistrationResponse>>), AppError> {
    request.validate()?;
    let response = AccountService::new(&state).register_student(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

pub async fn register_tutor(
    State(state): State<AppState>,
    Json(request): Json<RegisterTutorRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegistrationResponse>>), AppError> {
    request.validate()?;
    let response = AccountService::new(&state).register_tutor(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

pub async fn register_admin(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<AdminRegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegistrationResponse>>), AppError> {
    claims.require_role(&[UserRole::Admin])?;
    request.validate()?;
    let response = AccountService::new(&state)
        .register_admin(claims.user_id(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

// Login
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    request.validate()?;
    ok(AccountService::new(&state).login(request, &client).await?)
}

pub async fn admin_login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    request.validate()?;
    ok(AccountService::new(&state).admin_login(request, &client).await?)
}

// Email verification and password reset
pub async fn verify_email(
    State(state): State<AppState>,
    Json(request): Json<VerifyEmailRequest>,
) -> ApiResult<MessageResponse> {
    request.validate()?;
    AccountService::new(&state).verify_email(&request.token).await?;
    ok(MessageResponse::new("Email verified successfully."))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> ApiResult<MessageResponse> {
    request.validate()?;
    AccountService::new(&state).resend_verification(&request.email).await?;
    ok(MessageResponse::new("Verification email sent."))
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> ApiResult<MessageResponse> {
    request.validate()?;
    AccountService::new(&state).request_password_reset(&request.email).await?;
    ok(MessageResponse::new("Password reset email sent."))
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> ApiResult<MessageResponse> {
    request.validate()?;
    AccountService::new(&state).confirm_password_reset(request).await?;
    ok(MessageResponse::new("Password has been reset successfully."))
}

pub async fn change_password(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<MessageResponse> {
    request.validate()?;
    AccountService::new(&state)
        .change_password(claims.user_id(), request)
        .await?;
    ok(MessageResponse::new("Password changed successfully."))
}

pub async fn get_current_user(State(state): State<AppState>, claims: Claims) -> ApiResult<MeResponse> {
    ok(AccountService::new(&state).me(claims.user_id()).await?)
}

// Tutors
pub async fn list_tutors(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Query(query): Query<TutorListQuery>,
) -> ApiResult<Vec<TutorProfileResponse>> {
    let is_admin = claims.as_ref().map_or(false, |c| c.is_admin());
    ok(AccountService::new(&state).list_tutors(is_admin, query.status).await?)
}

pub async fn get_tutor(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Path(tutor_id): Path<Uuid>,
) -> ApiResult<TutorProfileResponse> {
    let caller = claims.map(|c| (c.user_id(), c.is_admin()));
    ok(AccountService::new(&state).get_tutor(tutor_id, caller).await?)
}

pub async fn update_my_tutor_profile(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Json(request): Json<UpdateTutorProfileRequest>,
) -> ApiResult<TutorProfileResponse> {
    claims.require_role(&[UserRole::Tutor])?;
    request.validate()?;
    ok(AccountService::new(&state)
        .update_tutor_profile(claims.user_id(), request, &client)
        .await?)
}

pub async fn approve_tutor(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Path(tutor_id): Path<Uuid>,
    body: Option<Json<ApprovalDecisionRequest>>,
) -> ApiResult<TutorProfileResponse> {
    claims.require_role(&[UserRole::Admin])?;
    let notes = body.and_then(|Json(b)| b.notes);
    ok(AccountService::new(&state)
        .decide_tutor(claims.user_id(), tutor_id, ApprovalStatus::Approved, notes, &client)
        .await?)
}

pub async fn reject_tutor(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Path(tutor_id): Path<Uuid>,
    body: Option<Json<ApprovalDecisionRequest>>,
) -> ApiResult<TutorProfileResponse> {
    claims.require_role(&[UserRole::Admin])?;
    let notes = body.and_then(|Json(b)| b.notes);
    ok(AccountService::new(&state)
        .decide_tutor(claims.user_id(), tutor_id, ApprovalStatus::Rejected, notes, &client)
        .await?)
}

// Students
pub async fn get_my_student_profile(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<StudentProfileResponse> {
    claims.require_role(&[UserRole::Student])?;
    ok(AccountService::new(&state).student_profile(claims.user_id()).await?)
}

pub async fn update_my_student_profile(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Json(request): Json<UpdateStudentProfileRequest>,
) -> ApiResult<StudentProfileResponse> {
    claims.require_role(&[UserRole::Student])?;
    request.validate()?;
    ok(AccountService::new(&state)
        .update_student_profile(claims.user_id(), request, &client)
        .await?)
}

pub async fn list_students(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<Vec<StudentProfileResponse>> {
    claims.require_role(&[UserRole::Admin])?;
    ok(AccountService::new(&state).list_students().await?)
}
