use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use afrilingua_auth::{Claims, ClientInfo};
use afrilingua_common::{ApiResponse, AppError, PaymentProvider, UserRole, WithdrawalStatus};
use afrilingua_database::{validate_amount, Payment, TutorWallet, WalletTransaction, WithdrawalRequest};

use crate::models::*;
use crate::payouts::{WalletService, WithdrawalService};
use crate::services::{AppState, PaymentService};
use crate::webhooks::SIGNATURE_HEADER;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

fn wallets(state: &AppState) -> WalletService {
    WalletService::new(state.db_pool.clone(), &state.config.platform.default_currency)
}

fn withdrawals(state: &AppState) -> WithdrawalService {
    WithdrawalService::new(
        state.db_pool.clone(),
        state.mailer.clone(),
        &state.config.platform.default_currency,
    )
}

// Health check
pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("Payment Service is healthy".to_string()))
}

pub async fn handler_404() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Endpoint not found".to_string())),
    )
}

// Payments
pub async fn create_payment(
    State(state): State<AppState>,
    claims: Claims,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Payment>>), AppError> {
    claims.require_role(&[UserRole::Student])?;
    let payment = PaymentService::new(&state)
        .create_payment(claims.user_id(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(payment))))
}

pub async fn list_payments(State(state): State<AppState>, claims: Claims) -> ApiResult<Vec<Payment>> {
    ok(PaymentService::new(&state).list_payments(&claims).await?)
}

pub async fn get_payment(
    State(state): State<AppState>,
    claims: Claims,
    Path(payment_id): Path<Uuid>,
) -> ApiResult<Payment> {
    ok(PaymentService::new(&state).get_payment(&claims, payment_id).await?)
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Path(payment_id): Path<Uuid>,
    body: Option<Json<ConfirmPaymentRequest>>,
) -> ApiResult<Payment> {
    claims.require_role(&[UserRole::Admin])?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    request.validate()?;
    ok(PaymentService::new(&state)
        .confirm_payment(payment_id, request, &client)
        .await?)
}

// Webhook endpoint (signed, no bearer token)
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(provider): Path<PaymentProvider>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<WebhookAck> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    ok(PaymentService::new(&state)
        .handle_webhook(provider, &body, signature)
        .await?)
}

// Wallets
pub async fn get_my_wallet(State(state): State<AppState>, claims: Claims) -> ApiResult<TutorWallet> {
    claims.require_role(&[UserRole::Tutor])?;
    ok(wallets(&state).wallet_for(claims.user_id()).await?)
}

pub async fn list_wallets(State(state): State<AppState>, claims: Claims) -> ApiResult<Vec<TutorWallet>> {
    claims.require_role(&[UserRole::Admin])?;
    ok(wallets(&state).list_wallets().await?)
}

pub async fn release_wallet(
    State(state): State<AppState>,
    claims: Claims,
    Path(tutor_id): Path<Uuid>,
    Json(request): Json<ReleaseRequest>,
) -> ApiResult<TutorWallet> {
    claims.require_role(&[UserRole::Admin])?;
    validate_amount(request.amount)?;
    ok(wallets(&state)
        .release(claims.user_id(), tutor_id, request.amount)
        .await?)
}

pub async fn list_transactions(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<TransactionQuery>,
) -> ApiResult<Vec<WalletTransaction>> {
    claims.require_role(&[UserRole::Tutor, UserRole::Admin])?;
    ok(wallets(&state).transactions(&claims, query).await?)
}

// Withdrawals
pub async fn create_withdrawal(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WithdrawalRequest>>), AppError> {
    claims.require_role(&[UserRole::Tutor])?;
    let withdrawal = withdrawals(&state)
        .request(claims.user_id(), request, &client)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(withdrawal))))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<Vec<WithdrawalRequest>> {
    ok(withdrawals(&state).list(&claims).await?)
}

async fn decide_withdrawal(
    state: AppState,
    claims: Claims,
    client: ClientInfo,
    withdrawal_id: Uuid,
    next: WithdrawalStatus,
    body: Option<Json<WithdrawalDecisionRequest>>,
) -> ApiResult<WithdrawalRequest> {
    claims.require_role(&[UserRole::Admin])?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    request.validate()?;
    ok(withdrawals(&state)
        .transition(claims.user_id(), withdrawal_id, next, request, &client)
        .await?)
}

pub async fn approve_withdrawal(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Path(withdrawal_id): Path<Uuid>,
    body: Option<Json<WithdrawalDecisionRequest>>,
) -> ApiResult<WithdrawalRequest> {
    decide_withdrawal(state, claims, client, withdrawal_id, WithdrawalStatus::Approved, body).await
}

pub async fn process_withdrawal(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Path(withdrawal_id): Path<Uuid>,
    body: Option<Json<WithdrawalDecisionRequest>>,
) -> ApiResult<WithdrawalRequest> {
    decide_withdrawal(state, claims, client, withdrawal_id, WithdrawalStatus::Processing, body).await
}

pub async fn complete_withdrawal(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Path(withdrawal_id): Path<Uuid>,
    body: Option<Json<WithdrawalDecisionRequest>>,
) -> ApiResult<WithdrawalRequest> {
    decide_withdrawal(state, claims, client, withdrawal_id, WithdrawalStatus::Completed, body).await
}

pub async fn reject_withdrawal(
    State(state): State<AppState>,
    claims: Claims,
    client: ClientInfo,
    Path(withdrawal_id): Path<Uuid>,
    body: Option<Json<WithdrawalDecisionRequest>>,
) -> ApiResult<WithdrawalRequest> {
    decide_withdrawal(state, claims, client, withdrawal_id, WithdrawalStatus::Rejected, body).await
}
