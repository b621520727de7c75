use chrono::Utc;
use sqlx::{migrate::Migrate, PgPool};
use uuid::Uuid;

use afrilingua_auth::PasswordService;
use afrilingua_common::{env_string, AppError, UserRole};

pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_all_migrations(&self) -> Result<(), AppError> {
        tracing::info!("Starting database migrations...");

        let migrator = sqlx::migrate!("./migrations");
        migrator
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;

        tracing::info!("All migrations completed successfully");
        Ok(())
    }

    pub async fn check_migration_status(&self) -> Result<MigrationStatus, AppError> {
        let migrator = sqlx::migrate!("./migrations");
        let mut conn = self.pool.acquire().await?;
        conn.ensure_migrations_table()
            .await
            .map_err(|e| AppError::Internal(format!("Migration table unavailable: {}", e)))?;
        let applied = conn
            .list_applied_migrations()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to list migrations: {}", e)))?;

        let total_migrations = migrator.iter().filter(|m| !m.migration_type.is_down_migration()).count();
        let applied_count = applied.len();
        let pending_count = total_migrations.saturating_sub(applied_count);

        Ok(MigrationStatus {
            total: total_migrations,
            applied: applied_count,
            pending: pending_count,
            is_up_to_date: pending_count == 0,
        })
    }

    /// Ensures the default administrator exists. Credentials come from
    /// `ADMIN_EMAIL` / `ADMIN_PASSWORD`.
    pub async fn seed_initial_data(&self) -> Result<(), AppError> {
        let email = env_string("ADMIN_EMAIL", "admin@afrilingua.com");
        let admin_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)",
        )
        .bind(&email)
        .fetch_one(&self.pool)
        .await?;

        if admin_exists {
            tracing::info!("Admin user {} already present", email);
            return Ok(());
        }

        let password = env_string("ADMIN_PASSWORD", "AfriLingua2024!");
        self.create_admin(&email, &password, "Platform", "Admin").await?;
        Ok(())
    }

    /// Creates a verified administrator with a full-permission admin profile.
    pub async fn create_admin(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Uuid, AppError> {
        PasswordService::validate_password_strength(password)?;
        let hashed = PasswordService::hash_password(password)?;
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, hashed_password, first_name, last_name, role,
                               email_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $7)
            "#,
        )
        .bind(user_id)
        .bind(email.trim().to_lowercase())
        .bind(hashed)
        .bind(first_name)
        .bind(last_name)
        .bind(UserRole::Admin.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO admin_profiles (user_id, created_at, updated_at) VALUES ($1, $2, $2)",
        )
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Admin user {} created", email);
        Ok(user_id)
    }
}

#[derive(Debug)]
pub struct MigrationStatus {
    pub total: usize,
    pub applied: usize,
    pub pending: usize,
    pub is_up_to_date: bool,
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Migrations: {}/{} applied, {} pending",
            self.applied, self.total, self.pending
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reports_pending_count() {
        let status = MigrationStatus { total: 6, applied: 4, pending: 2, is_up_to_date: false };
        assert_eq!(status.to_string(), "Migrations: 4/6 applied, 2 pending");
    }
}
