use axum::extract::FromRef;
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use afrilingua_auth::{Claims, ClientInfo, JwtService};
use afrilingua_common::{AppError, ApprovalStatus, AuditAction, UserRole};
use afrilingua_database::{
    audit::{self, AuditEntry},
    Course, Lesson,
};

use crate::config::AppConfig;
use crate::models::*;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_service: JwtService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db_pool: PgPool, config: AppConfig) -> Result<Self, AppError> {
        Ok(Self {
            jwt_service: JwtService::new(&config.jwt),
            db_pool,
            config,
        })
    }
}

impl FromRef<AppState> for JwtService {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_service.clone()
    }
}

/// Who is asking. Anonymous callers only ever see published courses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Viewer {
    pub user_id: Option<Uuid>,
    pub is_admin: bool,
}

impl Viewer {
    pub fn from_claims(claims: Option<&Claims>) -> Self {
        match claims {
            Some(claims) => Self {
                user_id: Some(claims.user_id()),
                is_admin: claims.is_admin(),
            },
            None => Self::default(),
        }
    }

    fn can_see(&self, course: &Course) -> bool {
        course.is_published || self.is_admin || self.user_id == Some(course.created_by)
    }
}

fn ensure_owner_or_admin(course: &Course, claims: &Claims) -> Result<(), AppError> {
    if claims.is_admin() || course.created_by == claims.user_id() {
        Ok(())
    } else {
        Err(AppError::Authorization(
            "Only the course owner or an admin can modify this course".to_string(),
        ))
    }
}

pub struct CourseService {
    db_pool: PgPool,
}

impl CourseService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db_pool: state.db_pool.clone(),
        }
    }

    async fn find_course(&self, course_id: Uuid) -> Result<Course, AppError> {
        sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE course_id = $1")
            .bind(course_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
    }

    /// Like `find_course`, but drafts are reported missing to anyone who may
    /// not see them.
    async fn visible_course(&self, course_id: Uuid, viewer: Viewer) -> Result<Course, AppError> {
        let course = self.find_course(course_id).await?;
        if viewer.can_see(&course) {
            Ok(course)
        } else {
            Err(AppError::NotFound("Course not found".to_string()))
        }
    }

    async fn find_lesson(&self, lesson_id: Uuid) -> Result<Lesson, AppError> {
        sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE lesson_id = $1")
            .bind(lesson_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Lesson not found".to_string()))
    }

    async fn lessons_of(&self, course_id: Uuid) -> Result<Vec<Lesson>, AppError> {
        let lessons = sqlx::query_as::<_, Lesson>(
            "SELECT * FROM lessons WHERE course_id = $1 ORDER BY position ASC, created_at ASC",
        )
        .bind(course_id)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(lessons)
    }

    // Courses

    pub async fn list_courses(
        &self,
        viewer: Viewer,
        query: CourseListQuery,
    ) -> Result<Vec<CourseSummary>, AppError> {
        let courses = sqlx::query_as::<_, CourseSummary>(
            r#"
            SELECT c.*,
                   (SELECT COUNT(*) FROM lessons l WHERE l.course_id = c.course_id) AS lesson_count
            FROM courses c
            WHERE ($1::TEXT IS NULL OR c.category = $1)
              AND ($2::UUID IS NULL OR c.created_by = $2)
              AND (c.is_published OR $3 OR c.created_by = $4)
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(query.category.map(|c| c.as_str()))
        .bind(query.created_by)
        .bind(viewer.is_admin)
        .bind(viewer.user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(courses)
    }

    pub async fn get_course(&self, course_id: Uuid, viewer: Viewer) -> Result<CourseDetail, AppError> {
        let course = self.visible_course(course_id, viewer).await?;
        let lessons = self.lessons_of(course_id).await?;

        Ok(CourseDetail {
            course,
            lesson_count: lessons.len(),
            lessons,
        })
    }

    pub async fn create_course(
        &self,
        claims: &Claims,
        request: CreateCourseRequest,
        client: &ClientInfo,
    ) -> Result<Course, AppError> {
        validate_price(Some(request.price))?;

        if claims.role == UserRole::Tutor {
            let approval = sqlx::query_scalar::<_, String>(
                "SELECT approval_status FROM tutor_profiles WHERE user_id = $1",
            )
            .bind(claims.user_id())
            .fetch_optional(&self.db_pool)
            .await?;

            if approval.as_deref() != Some(ApprovalStatus::Approved.as_str()) {
                return Err(AppError::Authorization(
                    "Only approved tutors can create courses".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;

        let course = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses
                (course_id, title, description, category, image_url, created_by, price,
                 is_published, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.title.trim())
        .bind(&request.description)
        .bind(request.category.as_str())
        .bind(&request.image_url)
        .bind(claims.user_id())
        .bind(request.price)
        .bind(request.is_published)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if claims.role == UserRole::Tutor {
            sqlx::query(
                "UPDATE tutor_profiles SET courses_taught = courses_taught + 1, updated_at = $2 WHERE user_id = $1",
            )
            .bind(claims.user_id())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        audit::record(
            &mut *tx,
            &AuditEntry::new(
                Some(claims.user_id()),
                AuditAction::CourseCreated,
                format!("Created course {}", course.title),
            )
            .client(client)
            .metadata(json!({ "course_id": course.course_id })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!("Course {} created by {}", course.course_id, claims.user_id());
        Ok(course)
    }

    pub async fn update_course(
        &self,
        claims: &Claims,
        course_id: Uuid,
        request: UpdateCourseRequest,
        client: &ClientInfo,
    ) -> Result<Course, AppError> {
        validate_price(request.price)?;

        let course = self.find_course(course_id).await?;
        ensure_owner_or_admin(&course, claims)?;

        let mut tx = self.db_pool.begin().await?;

        let updated = sqlx::query_as::<_, Course>(
            r#"
            UPDATE courses SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                image_url = COALESCE($5, image_url),
                price = COALESCE($6, price),
                is_published = COALESCE($7, is_published),
                updated_at = $8
            WHERE course_id = $1
            RETURNING *
            "#,
        )
        .bind(course_id)
        .bind(request.title.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(request.category.map(|c| c.as_str()))
        .bind(&request.image_url)
        .bind(request.price)
        .bind(request.is_published)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(
                Some(claims.user_id()),
                AuditAction::CourseUpdated,
                format!("Updated course {}", updated.title),
            )
            .client(client)
            .metadata(json!({ "course_id": course_id })),
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    // Lessons

    pub async fn list_lessons(&self, course_id: Uuid, viewer: Viewer) -> Result<Vec<Lesson>, AppError> {
        self.visible_course(course_id, viewer).await?;
        self.lessons_of(course_id).await
    }

    pub async fn create_lesson(
        &self,
        claims: &Claims,
        course_id: Uuid,
        request: CreateLessonRequest,
    ) -> Result<Lesson, AppError> {
        let course = self.find_course(course_id).await?;
        ensure_owner_or_admin(&course, claims)?;

        let lesson = sqlx::query_as::<_, Lesson>(
            r#"
            INSERT INTO lessons
                (lesson_id, course_id, title, content, video_url, file_url, duration_minutes,
                 position, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(request.title.trim())
        .bind(&request.content)
        .bind(&request.video_url)
        .bind(&request.file_url)
        .bind(request.duration_minutes)
        .bind(request.order)
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!("Lesson {} added to course {}", lesson.lesson_id, course_id);
        Ok(lesson)
    }

    pub async fn get_lesson(&self, lesson_id: Uuid, viewer: Viewer) -> Result<Lesson, AppError> {
        let lesson = self.find_lesson(lesson_id).await?;
        let course = self.find_course(lesson.course_id).await?;
        if !viewer.can_see(&course) {
            return Err(AppError::NotFound("Lesson not found".to_string()));
        }
        Ok(lesson)
    }

    pub async fn update_lesson(
        &self,
        claims: &Claims,
        lesson_id: Uuid,
        request: UpdateLessonRequest,
    ) -> Result<Lesson, AppError> {
        let lesson = self.find_lesson(lesson_id).await?;
        let course = self.find_course(lesson.course_id).await?;
        ensure_owner_or_admin(&course, claims)?;

        let updated = sqlx::query_as::<_, Lesson>(
            r#"
            UPDATE lessons SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                video_url = COALESCE($4, video_url),
                file_url = COALESCE($5, file_url),
                duration_minutes = COALESCE($6, duration_minutes),
                position = COALESCE($7, position),
                updated_at = $8
            WHERE lesson_id = $1
            RETURNING *
            "#,
        )
        .bind(lesson_id)
        .bind(request.title.as_deref().map(str::trim))
        .bind(&request.content)
        .bind(&request.video_url)
        .bind(&request.file_url)
        .bind(request.duration_minutes)
        .bind(request.order)
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn course(created_by: Uuid, is_published: bool) -> Course {
        let now = Utc::now();
        Course {
            course_id: Uuid::new_v4(),
            title: "Conversational Swahili".to_string(),
            description: "Everyday phrases".to_string(),
            category: "language".to_string(),
            image_url: None,
            created_by,
            price: Decimal::ZERO,
            is_published,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn drafts_are_hidden_from_strangers() {
        let owner = Uuid::new_v4();
        let draft = course(owner, false);

        assert!(!Viewer::default().can_see(&draft));
        assert!(!Viewer { user_id: Some(Uuid::new_v4()), is_admin: false }.can_see(&draft));
        assert!(Viewer { user_id: Some(owner), is_admin: false }.can_see(&draft));
        assert!(Viewer { user_id: None, is_admin: true }.can_see(&draft));
        assert!(Viewer::default().can_see(&course(owner, true)));
    }
}
