use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use afrilingua_common::AppError;
use afrilingua_database::AvailabilitySlot;

use crate::models::*;

const SLOT_VIEW_SELECT: &str = r#"
    SELECT s.*, u.email AS tutor_email
    FROM availability_slots s
    JOIN users u ON u.user_id = s.tutor_id
"#;

pub(crate) async fn lock_slot(conn: &mut PgConnection, slot_id: Uuid) -> Result<AvailabilitySlot, AppError> {
    sqlx::query_as::<_, AvailabilitySlot>(
        "SELECT * FROM availability_slots WHERE slot_id = $1 FOR UPDATE",
    )
    .bind(slot_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Availability slot not found".to_string()))
}

pub(crate) async fn set_slot_booked(
    conn: &mut PgConnection,
    slot_id: Uuid,
    is_booked: bool,
) -> Result<(), AppError> {
    sqlx::query("UPDATE availability_slots SET is_booked = $2, updated_at = $3 WHERE slot_id = $1")
        .bind(slot_id)
        .bind(is_booked)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Rejects slots that are taken or already started.
pub(crate) fn ensure_bookable(slot: &AvailabilitySlot) -> Result<(), AppError> {
    if slot.is_booked {
        return Err(AppError::Conflict("This slot is already booked".to_string()));
    }
    if !slot.is_bookable(Utc::now()) {
        return Err(AppError::Validation("Cannot book a slot in the past".to_string()));
    }
    Ok(())
}

fn duplicate_window(err: AppError) -> AppError {
    match err {
        AppError::Conflict(_) => {
            AppError::Conflict("A slot with this time window already exists".to_string())
        }
        other => other,
    }
}

pub struct SlotService {
    db_pool: PgPool,
}

impl SlotService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    async fn slot_view(&self, slot_id: Uuid) -> Result<SlotResponse, AppError> {
        let view = sqlx::query_as::<_, SlotView>(&format!("{} WHERE s.slot_id = $1", SLOT_VIEW_SELECT))
            .bind(slot_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Availability slot not found".to_string()))?;
        Ok(view.into())
    }

    pub async fn create_slot(&self, tutor_id: Uuid, request: CreateSlotRequest) -> Result<SlotResponse, AppError> {
        let now = Utc::now();
        validate_window(request.start_time, request.end_time, now)?;

        let slot_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO availability_slots
                (slot_id, tutor_id, start_time, end_time, is_booked, created_at, updated_at)
            VALUES ($1, $2, $3, $4, FALSE, $5, $5)
            "#,
        )
        .bind(slot_id)
        .bind(tutor_id)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .map_err(|e| duplicate_window(e.into()))?;

        tracing::info!("Tutor {} opened slot {} at {}", tutor_id, slot_id, request.start_time);
        self.slot_view(slot_id).await
    }

    pub async fn list_slots(&self, query: SlotListQuery) -> Result<Vec<SlotResponse>, AppError> {
        let only_available = query.available.unwrap_or(false);
        let views = sqlx::query_as::<_, SlotView>(&format!(
            r#"{}
            WHERE ($1::UUID IS NULL OR s.tutor_id = $1)
              AND (NOT $2 OR (NOT s.is_booked AND s.start_time > $3))
            ORDER BY s.start_time ASC
            "#,
            SLOT_VIEW_SELECT
        ))
        .bind(query.tutor_id)
        .bind(only_available)
        .bind(Utc::now())
        .fetch_all(&self.db_pool)
        .await?;

        Ok(views.into_iter().map(SlotResponse::from).collect())
    }

    pub async fn update_slot(
        &self,
        tutor_id: Uuid,
        slot_id: Uuid,
        request: UpdateSlotRequest,
    ) -> Result<SlotResponse, AppError> {
        let mut tx = self.db_pool.begin().await?;
        let slot = lock_slot(&mut tx, slot_id).await?;

        if slot.tutor_id != tutor_id {
            return Err(AppError::Authorization("You can only edit your own slots".to_string()));
        }
        if slot.is_booked {
            return Err(AppError::Conflict("Booked slots cannot be changed".to_string()));
        }

        let start_time = request.start_time.unwrap_or(slot.start_time);
        let end_time = request.end_time.unwrap_or(slot.end_time);
        validate_window(start_time, end_time, Utc::now())?;

        sqlx::query(
            "UPDATE availability_slots SET start_time = $2, end_time = $3, updated_at = $4 WHERE slot_id = $1",
        )
        .bind(slot_id)
        .bind(start_time)
        .bind(end_time)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_window(e.into()))?;

        tx.commit().await?;
        self.slot_view(slot_id).await
    }
}
