use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use afrilingua_common::AppError;
use afrilingua_database::{Lesson, StudentProgress};

use crate::models::*;

pub struct ProgressService {
    db_pool: PgPool,
}

impl ProgressService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// One row per (student, lesson); repeated visits add to `time_spent`.
    pub async fn record(
        &self,
        student_id: Uuid,
        request: RecordProgressRequest,
    ) -> Result<StudentProgress, AppError> {
        let lesson = sqlx::query_as::<_, Lesson>(
            r#"
            SELECT l.* FROM lessons l
            JOIN courses c ON c.course_id = l.course_id
            WHERE l.lesson_id = $1 AND c.is_published
            "#,
        )
        .bind(request.lesson_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Lesson not found".to_string()))?;

        let now = Utc::now();
        let progress = sqlx::query_as::<_, StudentProgress>(
            r#"
            INSERT INTO student_progress
                (progress_id, student_id, lesson_id, course_id, is_completed, time_spent,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, FALSE, $5, $6, $6)
            ON CONFLICT (student_id, lesson_id) DO UPDATE
            SET time_spent = student_progress.time_spent + EXCLUDED.time_spent,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(lesson.lesson_id)
        .bind(lesson.course_id)
        .bind(request.time_spent)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(progress)
    }

    pub async fn complete(&self, student_id: Uuid, progress_id: Uuid) -> Result<StudentProgress, AppError> {
        let mut tx = self.db_pool.begin().await?;

        let mut progress = sqlx::query_as::<_, StudentProgress>(
            "SELECT * FROM student_progress WHERE progress_id = $1 AND student_id = $2 FOR UPDATE",
        )
        .bind(progress_id)
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Progress record not found".to_string()))?;

        if progress.mark_completed(Utc::now()) {
            sqlx::query(
                r#"
                UPDATE student_progress
                SET is_completed = TRUE, completed_at = $2, updated_at = $2
                WHERE progress_id = $1
                "#,
            )
            .bind(progress_id)
            .bind(progress.completed_at)
            .execute(&mut *tx)
            .await?;
            tracing::info!("Student {} completed lesson {}", student_id, progress.lesson_id);
        }

        tx.commit().await?;
        Ok(progress)
    }

    pub async fn list(&self, student_id: Uuid, query: ProgressListQuery) -> Result<Vec<StudentProgress>, AppError> {
        let records = sqlx::query_as::<_, StudentProgress>(
            r#"
            SELECT * FROM student_progress
            WHERE student_id = $1 AND ($2::UUID IS NULL OR course_id = $2)
            ORDER BY updated_at DESC
            "#,
        )
        .bind(student_id)
        .bind(query.course_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(records)
    }

    pub async fn course_summary(&self, student_id: Uuid, course_id: Uuid) -> Result<CourseProgress, AppError> {
        let total_lessons = sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT (SELECT COUNT(*) FROM lessons WHERE course_id = c.course_id)
            FROM courses c WHERE c.course_id = $1
            "#,
        )
        .bind(course_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?
        .unwrap_or(0);

        let completed_lessons = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM student_progress
            WHERE student_id = $1 AND course_id = $2 AND is_completed
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(CourseProgress::new(course_id, completed_lessons, total_lessons))
    }
}
