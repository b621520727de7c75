use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use afrilingua_auth::{Claims, ClientInfo};
use afrilingua_common::{ApiResponse, AppError, UserRole};
use afrilingua_database::{Subscription, SubscriptionAction};

use crate::models::*;
use crate::scheduling::SlotService;
use crate::services::{AppState, BookingService};
use crate::sessions::SessionService;
use crate::subscriptions::SubscriptionService;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

fn created<T>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

// Health check
pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("Bookings Service is healthy".to_string()))
}

pub async fn handler_404() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Endpoint not found".to_string())),
    )
}

// Availability slots
pub async fn create_slot(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<CreateSlotRequest>,
) -> Created<SlotResponse> {
    claims.require_role(&[UserRole::Tutor])?;
    created(
        SlotService::new(state.db_pool.clone())
            .create_slot(claims.user_id(), request)
            .await?,
    )
}

pub async fn list_slots(
    State(state): State<AppState>,
    _claims: Claims,
    Query(query): Query<SlotListQuery>,
) -> ApiResult<Vec<SlotResponse>> {
    ok(SlotService::new(state.db_pool.clone()).list_slots(query).await?)
}

pub async fn update_slot(
    State(state): State<AppState>,
    claims: Claims,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<UpdateSlotRequest>,
) -> ApiResult<SlotResponse> {
    claims.require_role(&[UserRole::Tutor])?;
    ok(SlotService::new(state.db_pool.clone())
        .update_slot(claims.user_id(), slot_id, request)
        .await?)
}

// Bookings
pub async fn create_booking(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Json(request): Json<CreateBookingRequest>,
) -> Created<BookingDetail> {
    claims.require_role(&[UserRole::Student])?;
    created(
        BookingService::new(&state)
            .create_booking(claims.user_id(), request, &client)
            .await?,
    )
}

pub async fn list_bookings(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<BookingListQuery>,
) -> ApiResult<Vec<BookingDetail>> {
    ok(BookingService::new(&state).list_bookings(&claims, query).await?)
}

pub async fn get_booking(
    State(state): State<AppState>,
    claims: Claims,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<BookingDetail> {
    ok(BookingService::new(&state).get_booking(&claims, booking_id).await?)
}

pub async fn confirm_booking(
    State(state): State<AppState>,
    claims: Claims,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<BookingDetail> {
    claims.require_role(&[UserRole::Tutor])?;
    ok(BookingService::new(&state)
        .confirm_booking(claims.user_id(), booking_id)
        .await?)
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Path(booking_id): Path<Uuid>,
    body: Option<Json<CancelBookingRequest>>,
) -> ApiResult<BookingDetail> {
    claims.require_role(&[UserRole::Student, UserRole::Tutor])?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    request.validate()?;
    ok(BookingService::new(&state)
        .cancel_booking(&claims, booking_id, request, &client)
        .await?)
}

pub async fn reschedule_booking(
    State(state): State<AppState>,
    claims: Claims,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<RescheduleBookingRequest>,
) -> ApiResult<BookingDetail> {
    claims.require_role(&[UserRole::Student, UserRole::Tutor])?;
    request.validate()?;
    ok(BookingService::new(&state)
        .reschedule_booking(&claims, booking_id, request)
        .await?)
}

pub async fn refund_eligibility(
    State(state): State<AppState>,
    claims: Claims,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<RefundEligibility> {
    ok(BookingService::new(&state)
        .refund_eligibility(&claims, booking_id)
        .await?)
}

pub async fn get_classroom(
    State(state): State<AppState>,
    claims: Claims,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<ClassroomResponse> {
    ok(SessionService::new(state.db_pool.clone(), state.config.clone())
        .classroom(&claims, booking_id)
        .await?)
}

// Lesson sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<Vec<SessionResponse>> {
    ok(SessionService::new(state.db_pool.clone(), state.config.clone())
        .list_sessions(&claims)
        .await?)
}

pub async fn get_session(
    State(state): State<AppState>,
    claims: Claims,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionResponse> {
    ok(SessionService::new(state.db_pool.clone(), state.config.clone())
        .get_session(&claims, session_id)
        .await?)
}

pub async fn complete_session(
    State(state): State<AppState>,
    claims: Claims,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionResponse> {
    ok(SessionService::new(state.db_pool.clone(), state.config.clone())
        .complete_session(&claims, session_id)
        .await?)
}

pub async fn auto_confirm_sessions(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<AutoConfirmReport> {
    claims.require_role(&[UserRole::Admin])?;
    ok(SessionService::new(state.db_pool.clone(), state.config.clone())
        .auto_confirm_due()
        .await?)
}

// Subscriptions
pub async fn create_subscription(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Created<Subscription> {
    claims.require_role(&[UserRole::Student])?;
    request.validate()?;
    created(
        SubscriptionService::new(state.db_pool.clone())
            .create(claims.user_id(), request, &state.config.platform.default_currency)
            .await?,
    )
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<Vec<Subscription>> {
    ok(SubscriptionService::new(state.db_pool.clone()).list(&claims).await?)
}

pub async fn get_subscription(
    State(state): State<AppState>,
    claims: Claims,
    Path(subscription_id): Path<Uuid>,
) -> ApiResult<Subscription> {
    ok(SubscriptionService::new(state.db_pool.clone())
        .get(&claims, subscription_id)
        .await?)
}

async fn change_subscription(
    state: AppState,
    claims: Claims,
    subscription_id: Uuid,
    action: SubscriptionAction,
) -> ApiResult<Subscription> {
    ok(SubscriptionService::new(state.db_pool.clone())
        .apply(&claims, subscription_id, action)
        .await?)
}

pub async fn pause_subscription(
    State(state): State<AppState>,
    claims: Claims,
    Path(subscription_id): Path<Uuid>,
) -> ApiResult<Subscription> {
    change_subscription(state, claims, subscription_id, SubscriptionAction::Pause).await
}

pub async fn resume_subscription(
    State(state): State<AppState>,
    claims: Claims,
    Path(subscription_id): Path<Uuid>,
) -> ApiResult<Subscription> {
    change_subscription(state, claims, subscription_id, SubscriptionAction::Resume).await
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    claims: Claims,
    Path(subscription_id): Path<Uuid>,
) -> ApiResult<Subscription> {
    change_subscription(state, claims, subscription_id, SubscriptionAction::Cancel).await
}
