use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Payments
        .route("/payments", get(handlers::list_payments).post(handlers::create_payment))
        .route("/payments/:payment_id", get(handlers::get_payment))
        .route("/payments/:payment_id/confirm", post(handlers::confirm_payment))

        // Webhook endpoints (signature checked, no bearer token)
        .route("/webhooks/:provider", post(handlers::handle_webhook))

        // Wallets and ledger
        .route("/wallet", get(handlers::get_my_wallet))
        .route("/wallets", get(handlers::list_wallets))
        .route("/wallets/:tutor_id/release", post(handlers::release_wallet))
        .route("/transactions", get(handlers::list_transactions))

        // Withdrawals
        .route(
            "/withdrawals",
            get(handlers::list_withdrawals).post(handlers::create_withdrawal),
        )
        .route("/withdrawals/:withdrawal_id/approve", post(handlers::approve_withdrawal))
        .route("/withdrawals/:withdrawal_id/process", post(handlers::process_withdrawal))
        .route("/withdrawals/:withdrawal_id/complete", post(handlers::complete_withdrawal))
        .route("/withdrawals/:withdrawal_id/reject", post(handlers::reject_withdrawal))
}
