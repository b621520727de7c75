use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use afrilingua_auth::Claims;
use afrilingua_common::{AppError, SubscriptionStatus};
use afrilingua_database::{
    subscription_transition, tutor_share, Subscription, SubscriptionAction, TutorProfile,
};

use crate::models::CreateSubscriptionRequest;

const BILLING_PERIOD_DAYS: i64 = 30;

async fn lock_subscription(conn: &mut PgConnection, subscription_id: Uuid) -> Result<Subscription, AppError> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE subscription_id = $1 FOR UPDATE")
        .bind(subscription_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))
}

async fn save_status(
    conn: &mut PgConnection,
    subscription: &Subscription,
    status: SubscriptionStatus,
) -> Result<Subscription, AppError> {
    let now = Utc::now();
    let paused_at = match status {
        SubscriptionStatus::Paused => Some(now),
        SubscriptionStatus::Active => None,
        _ => subscription.paused_at,
    };
    let canceled_at = match status {
        SubscriptionStatus::Canceled => Some(now),
        _ => subscription.canceled_at,
    };

    let updated = sqlx::query_as::<_, Subscription>(
        r#"
        UPDATE subscriptions
        SET status = $2, paused_at = $3, canceled_at = $4, updated_at = $5
        WHERE subscription_id = $1
        RETURNING *
        "#,
    )
    .bind(subscription.subscription_id)
    .bind(status.as_str())
    .bind(paused_at)
    .bind(canceled_at)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(updated)
}

/// Expires the subscription in place when its period has run out.
async fn expire_if_due(conn: &mut PgConnection, subscription: Subscription) -> Result<Subscription, AppError> {
    if !subscription.expiry_due(Utc::now()) {
        return Ok(subscription);
    }
    let next = subscription_transition(subscription.status()?, SubscriptionAction::Expire)?;
    tracing::info!("Subscription {} expired", subscription.subscription_id);
    save_status(conn, &subscription, next).await
}

/// Expires any lapsed subscription between the pair so a new one can take
/// its place.
async fn expire_lapsed_between(
    conn: &mut PgConnection,
    student_id: Uuid,
    tutor_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE subscriptions SET status = 'expired', updated_at = $3
        WHERE student_id = $1 AND tutor_id = $2
          AND status IN ('active', 'paused') AND current_period_end <= $3
        "#,
    )
    .bind(student_id)
    .bind(tutor_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

fn ensure_access(subscription: &Subscription, claims: &Claims) -> Result<(), AppError> {
    let user_id = claims.user_id();
    if claims.is_admin() || subscription.student_id == user_id || subscription.tutor_id == user_id {
        Ok(())
    } else {
        Err(AppError::Authorization("You are not part of this subscription".to_string()))
    }
}

pub struct SubscriptionService {
    db_pool: PgPool,
}

impl SubscriptionService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn create(
        &self,
        student_id: Uuid,
        request: CreateSubscriptionRequest,
        currency: &str,
    ) -> Result<Subscription, AppError> {
        request.validate_price()?;

        let profile = sqlx::query_as::<_, TutorProfile>("SELECT * FROM tutor_profiles WHERE user_id = $1")
            .bind(request.tutor_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Tutor not found".to_string()))?;

        if !profile.is_approved() {
            return Err(AppError::Validation("Tutor is not approved for bookings".to_string()));
        }

        let commission_rate = profile.commission_rate();
        let now = Utc::now();

        let mut tx = self.db_pool.begin().await?;
        if expire_lapsed_between(&mut tx, student_id, request.tutor_id, now).await? > 0 {
            tracing::info!("Expired lapsed subscription of student {} with tutor {}", student_id, request.tutor_id);
        }

        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions
                (subscription_id, student_id, tutor_id, lessons_per_month, price, commission_rate,
                 tutor_share, currency, status, current_period_start, current_period_end,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(request.tutor_id)
        .bind(request.lessons_per_month)
        .bind(request.price)
        .bind(commission_rate)
        .bind(tutor_share(request.price, commission_rate))
        .bind(currency)
        .bind(SubscriptionStatus::Active.as_str())
        .bind(now)
        .bind(now + Duration::days(BILLING_PERIOD_DAYS))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict(
                "You already have an active subscription with this tutor".to_string(),
            ),
            other => other,
        })?;

        tx.commit().await?;

        tracing::info!(
            "Student {} subscribed to tutor {} ({} lessons/month)",
            student_id,
            request.tutor_id,
            request.lessons_per_month
        );
        Ok(subscription)
    }

    pub async fn list(&self, claims: &Claims) -> Result<Vec<Subscription>, AppError> {
        let now = Utc::now();

        // Settle lapsed periods before reporting.
        sqlx::query(
            r#"
            UPDATE subscriptions SET status = 'expired', updated_at = $3
            WHERE status IN ('active', 'paused') AND current_period_end <= $3
              AND ($1 OR student_id = $2 OR tutor_id = $2)
            "#,
        )
        .bind(claims.is_admin())
        .bind(claims.user_id())
        .bind(now)
        .execute(&self.db_pool)
        .await?;

        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT * FROM subscriptions
            WHERE $1 OR student_id = $2 OR tutor_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(claims.is_admin())
        .bind(claims.user_id())
        .fetch_all(&self.db_pool)
        .await?;

        Ok(subscriptions)
    }

    pub async fn get(&self, claims: &Claims, subscription_id: Uuid) -> Result<Subscription, AppError> {
        let mut tx = self.db_pool.begin().await?;
        let subscription = lock_subscription(&mut tx, subscription_id).await?;
        ensure_access(&subscription, claims)?;

        let subscription = expire_if_due(&mut tx, subscription).await?;
        tx.commit().await?;
        Ok(subscription)
    }

    /// Pause, resume or cancel. Only the subscribing student or an admin may
    /// change a subscription.
    pub async fn apply(
        &self,
        claims: &Claims,
        subscription_id: Uuid,
        action: SubscriptionAction,
    ) -> Result<Subscription, AppError> {
        let mut tx = self.db_pool.begin().await?;
        let subscription = lock_subscription(&mut tx, subscription_id).await?;

        if !claims.is_admin() && subscription.student_id != claims.user_id() {
            return Err(AppError::Authorization(
                "Only the subscribing student can change this subscription".to_string(),
            ));
        }

        let subscription = expire_if_due(&mut tx, subscription).await?;
        let next = match subscription_transition(subscription.status()?, action) {
            Ok(next) => next,
            Err(e) => {
                // Keep a lazily applied expiry even though the action failed.
                tx.commit().await?;
                return Err(e);
            }
        };

        let updated = save_status(&mut tx, &subscription, next).await?;
        tx.commit().await?;

        tracing::info!("Subscription {} is now {}", subscription_id, next);
        Ok(updated)
    }
}
