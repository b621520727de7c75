use std::collections::HashMap;

use axum::extract::FromRef;
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use afrilingua_auth::{ClientInfo, JwtService, OneTimeToken, PasswordService};
use afrilingua_common::{
    AppError, ApprovalStatus, AuditAction, NotificationCategory, UserRole,
};
use afrilingua_database::{
    audit::{self, AuditEntry},
    notifications::{create_notification, NewNotification},
    AdminProfile, StudentProfile, TutorProfile, User,
};
use afrilingua_mailer::{EmailTemplate, Mailer};

use crate::config::AppConfig;
use crate::models::*;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_service: JwtService,
    pub mailer: Mailer,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db_pool: PgPool, config: AppConfig) -> Result<Self, AppError> {
        Ok(Self {
            jwt_service: JwtService::new(&config.jwt),
            mailer: Mailer::new(&config.email)?,
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

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A one-time token is spent by exactly one conditional update; a racing
/// second use matches no row.
fn token_consumed(rows_affected: u64) -> Result<(), AppError> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid token".to_string()))
    }
}

pub struct AccountService {
    db_pool: PgPool,
    jwt_service: JwtService,
    mailer: Mailer,
    config: AppConfig,
}

impl AccountService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db_pool: state.db_pool.clone(),
            jwt_service: state.jwt_service.clone(),
            mailer: state.mailer.clone(),
            config: state.config.clone(),
        }
    }

    fn verification_ttl(&self) -> Duration {
        Duration::minutes(self.config.platform.email_verification_timeout_minutes)
    }

    fn reset_ttl(&self) -> Duration {
        Duration::minutes(self.config.platform.password_reset_timeout_minutes)
    }

    async fn ensure_email_free(&self, email: &str) -> Result<(), AppError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.db_pool)
            .await?;

        if exists {
            return Err(AppError::Conflict("A user with this email already exists".to_string()));
        }
        Ok(())
    }

    pub async fn find_user(&self, user_id: Uuid) -> Result<User, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(user)
    }

    async fn send_verification_email(&self, user: &User, token: &OneTimeToken) {
        self.mailer
            .dispatch(
                &user.email,
                EmailTemplate::VerifyEmail,
                &json!({
                    "first_name": user.first_name,
                    "verification_link": self.config.verification_link(&token.value),
                    "expires_in_hours": self.config.platform.email_verification_timeout_minutes / 60,
                }),
            )
            .await;
    }

    // Registration

    pub async fn register_student(&self, request: RegisterStudentRequest) -> Result<RegistrationResponse, AppError> {
        PasswordService::validate_new_password(&request.password, &request.password2)?;

        let email = normalize_email(&request.email);
        self.ensure_email_free(&email).await?;

        let hashed_password = PasswordService::hash_password(&request.password)?;
        let token = OneTimeToken::issue(Utc::now());

        let mut tx = self.db_pool.begin().await?;
        let user = insert_user(
            &mut tx,
            &email,
            &hashed_password,
            &request.first_name,
            &request.last_name,
            UserRole::Student,
            Some(&token),
        )
        .await?;

        sqlx::query(
            "INSERT INTO student_profiles (user_id, currency, created_at, updated_at) VALUES ($1, $2, $3, $3)",
        )
        .bind(user.user_id)
        .bind(&self.config.platform.default_currency)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.send_verification_email(&user, &token).await;
        tracing::info!("Student registered: {}", user.email);

        Ok(RegistrationResponse {
            message: "Student registration successful. Please check your email for verification.".to_string(),
            email: user.email,
        })
    }

    pub async fn register_tutor(&self, request: RegisterTutorRequest) -> Result<RegistrationResponse, AppError> {
        PasswordService::validate_new_password(&request.password, &request.password2)?;
        request.validate_rates()?;

        let email = normalize_email(&request.email);
        self.ensure_email_free(&email).await?;

        let hashed_password = PasswordService::hash_password(&request.password)?;
        let token = OneTimeToken::issue(Utc::now());

        let mut tx = self.db_pool.begin().await?;
        let user = insert_user(
            &mut tx,
            &email,
            &hashed_password,
            &request.first_name,
            &request.last_name,
            UserRole::Tutor,
            Some(&token),
        )
        .await?;

        sqlx::query(
            r#"
            INSERT INTO tutor_profiles
                (user_id, bio, skills, languages, hourly_rate, price_per_lesson,
                 cv_url, certificate_url, approval_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            "#,
        )
        .bind(user.user_id)
        .bind(&request.bio)
        .bind(&request.skills)
        .bind(request.languages.as_deref().unwrap_or(""))
        .bind(request.hourly_rate.unwrap_or_default())
        .bind(request.price_per_lesson.unwrap_or_default())
        .bind(&request.cv_url)
        .bind(&request.certificate_url)
        .bind(ApprovalStatus::Pending.as_str())
        .bind(user.created_at)
        .execute(&mut *tx)
        .await?;

        // Every admin gets an in-app approval request.
        let admin_ids = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM users WHERE role = $1")
            .bind(UserRole::Admin.as_str())
            .fetch_all(&mut *tx)
            .await?;
        for admin_id in admin_ids {
            let notification = NewNotification::in_app(
                admin_id,
                NotificationCategory::TutorApproval,
                "New tutor awaiting approval",
                format!("{} ({}) registered as a tutor.", user.full_name(), user.email),
            )
            .with_link(format!("/tutors/{}", user.user_id))
            .with_metadata(json!({ "tutor_id": user.user_id }));
            create_notification(&mut *tx, &notification).await?;
        }
        tx.commit().await?;

        self.send_verification_email(&user, &token).await;
        self.mailer
            .dispatch(
                self.mailer.email.admin_email(),
                EmailTemplate::AdminNotifyTutorSignup,
                &json!({
                    "tutor_name": user.full_name(),
                    "tutor_email": user.email,
                    "skills": request.skills,
                    "languages": request.languages,
                    "review_link": format!(
                        "{}/admin/tutors/{}",
                        self.config.platform.frontend_url.trim_end_matches('/'),
                        user.user_id
                    ),
                }),
            )
            .await;
        tracing::info!("Tutor registered: {}", user.email);

        Ok(RegistrationResponse {
            message: "Tutor registration successful. Please verify your email and wait for admin approval.".to_string(),
            email: user.email,
        })
    }

    pub async fn register_admin(
        &self,
        created_by: Uuid,
        request: AdminRegisterRequest,
    ) -> Result<RegistrationResponse, AppError> {
        PasswordService::validate_password_strength(&request.password)?;

        let email = normalize_email(&request.email);
        self.ensure_email_free(&email).await?;
        let hashed_password = PasswordService::hash_password(&request.password)?;

        let mut tx = self.db_pool.begin().await?;
        let user = insert_user(
            &mut tx,
            &email,
            &hashed_password,
            &request.first_name,
            &request.last_name,
            UserRole::Admin,
            None,
        )
        .await?;
        sqlx::query("UPDATE users SET email_verified = TRUE WHERE user_id = $1")
            .bind(user.user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO admin_profiles (user_id, department, phone_number, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            "#,
        )
        .bind(user.user_id)
        .bind(&request.department)
        .bind(&request.phone_number)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.mailer
            .dispatch(
                &user.email,
                EmailTemplate::AdminWelcome,
                &json!({
                    "first_name": user.first_name,
                    "email": user.email,
                    "login_link": format!("{}/admin/login", self.config.platform.frontend_url.trim_end_matches('/')),
                }),
            )
            .await;
        tracing::info!("Admin {} created by {}", user.email, created_by);

        Ok(RegistrationResponse {
            message: "Admin account created successfully".to_string(),
            email: user.email,
        })
    }

    // Login

    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let invalid = || AppError::Authentication("Invalid credentials".to_string());

        let user = self.find_user_by_email(email).await?.ok_or_else(invalid)?;
        if !user.is_active || !PasswordService::verify_password(password, &user.hashed_password)? {
            return Err(invalid());
        }
        Ok(user)
    }

    async fn issue_login(&self, user: &User, client: &ClientInfo) -> Result<LoginResponse, AppError> {
        let role = user.role()?;
        let (access, expires_at) = self.jwt_service.issue(user.user_id, &user.email, role)?;

        audit::record(
            &self.db_pool,
            &AuditEntry::new(Some(user.user_id), AuditAction::Login, format!("{} logged in", user.email))
                .client(client),
        )
        .await?;

        Ok(LoginResponse {
            access,
            expires_at,
            user: UserInfo::try_from(user)?,
        })
    }

    pub async fn login(&self, request: LoginRequest, client: &ClientInfo) -> Result<LoginResponse, AppError> {
        let user = self.authenticate(&request.email, &request.password).await?;

        if user.role()? == UserRole::Tutor {
            let status = sqlx::query_scalar::<_, String>(
                "SELECT approval_status FROM tutor_profiles WHERE user_id = $1",
            )
            .bind(user.user_id)
            .fetch_optional(&self.db_pool)
            .await?;

            if status.as_deref() != Some(ApprovalStatus::Approved.as_str()) {
                return Err(AppError::Authorization(
                    "Your account is pending admin approval.".to_string(),
                ));
            }
        }

        self.issue_login(&user, client).await
    }

    pub async fn admin_login(&self, request: LoginRequest, client: &ClientInfo) -> Result<LoginResponse, AppError> {
        let user = self.authenticate(&request.email, &request.password).await?;
        if user.role()? != UserRole::Admin {
            return Err(AppError::Authorization("You do not have admin access".to_string()));
        }

        let response = self.issue_login(&user, client).await?;

        self.mailer
            .dispatch(
                &user.email,
                EmailTemplate::AdminLoginAlert,
                &json!({
                    "first_name": user.first_name,
                    "email": user.email,
                    "ip_address": client.ip_address,
                    "login_time": Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                }),
            )
            .await;

        Ok(response)
    }

    // Email verification and password reset

    pub async fn verify_email(&self, token: &str) -> Result<(), AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email_verification_token = $1")
            .bind(token)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::Validation("Invalid token".to_string()))?;

        let issued = user
            .verification_token()
            .ok_or_else(|| AppError::Validation("Invalid token".to_string()))?;
        issued.verify(token, Utc::now(), self.verification_ttl())?;

        let consumed = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, email_verification_token = NULL,
                email_verification_token_created = NULL, updated_at = NOW()
            WHERE user_id = $1 AND email_verification_token = $2
            "#,
        )
        .bind(user.user_id)
        .bind(token)
        .execute(&self.db_pool)
        .await?;
        token_consumed(consumed.rows_affected())?;

        tracing::info!("Email verified for {}", user.email);
        Ok(())
    }

    pub async fn resend_verification(&self, email: &str) -> Result<(), AppError> {
        let user = self
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        if user.email_verified {
            return Err(AppError::Validation("Email is already verified".to_string()));
        }

        let token = OneTimeToken::issue(Utc::now());
        sqlx::query(
            r#"
            UPDATE users
            SET email_verification_token = $2, email_verification_token_created = $3, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user.user_id)
        .bind(&token.value)
        .bind(token.created_at)
        .execute(&self.db_pool)
        .await?;

        self.send_verification_email(&user, &token).await;
        Ok(())
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let user = self
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

        let token = OneTimeToken::issue(Utc::now());
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = $2, password_reset_token_created = $3, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user.user_id)
        .bind(&token.value)
        .bind(token.created_at)
        .execute(&self.db_pool)
        .await?;

        self.mailer
            .dispatch(
                &user.email,
                EmailTemplate::PasswordReset,
                &json!({
                    "first_name": user.first_name,
                    "reset_link": self.config.reset_link(&token.value),
                    "expires_in_minutes": self.config.platform.password_reset_timeout_minutes,
                }),
            )
            .await;
        Ok(())
    }

    pub async fn confirm_password_reset(&self, request: PasswordResetConfirmRequest) -> Result<(), AppError> {
        PasswordService::validate_new_password(&request.password, &request.password2)?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE password_reset_token = $1")
            .bind(&request.token)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::Validation("Invalid token".to_string()))?;

        let issued = user
            .reset_token()
            .ok_or_else(|| AppError::Validation("Invalid token".to_string()))?;
        issued.verify(&request.token, Utc::now(), self.reset_ttl())?;

        let hashed_password = PasswordService::hash_password(&request.password)?;
        let consumed = sqlx::query(
            r#"
            UPDATE users
            SET hashed_password = $2, password_reset_token = NULL,
                password_reset_token_created = NULL, updated_at = NOW()
            WHERE user_id = $1 AND password_reset_token = $3
            "#,
        )
        .bind(user.user_id)
        .bind(hashed_password)
        .bind(&request.token)
        .execute(&self.db_pool)
        .await?;
        token_consumed(consumed.rows_affected())?;

        tracing::info!("Password reset completed for {}", user.email);
        Ok(())
    }

    pub async fn change_password(&self, user_id: Uuid, request: ChangePasswordRequest) -> Result<(), AppError> {
        let user = self.find_user(user_id).await?;
        if !PasswordService::verify_password(&request.old_password, &user.hashed_password)? {
            return Err(AppError::Validation("Old password is incorrect".to_string()));
        }
        PasswordService::validate_new_password(&request.new_password, &request.new_password2)?;

        let hashed_password = PasswordService::hash_password(&request.new_password)?;
        sqlx::query("UPDATE users SET hashed_password = $2, updated_at = NOW() WHERE user_id = $1")
            .bind(user_id)
            .bind(hashed_password)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    pub async fn me(&self, user_id: Uuid) -> Result<MeResponse, AppError> {
        let user = self.find_user(user_id).await?;
        let mut response = MeResponse {
            user: UserInfo::try_from(&user)?,
            tutor_profile: None,
            student_profile: None,
            admin_profile: None,
        };

        match user.role()? {
            UserRole::Tutor => {
                let profile = self.tutor_profile(user_id).await?;
                response.tutor_profile = Some(TutorProfileResponse::new(profile, &user)?);
            }
            UserRole::Student => {
                response.student_profile = sqlx::query_as::<_, StudentProfile>(
                    "SELECT * FROM student_profiles WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_optional(&self.db_pool)
                .await?;
            }
            UserRole::Admin => {
                response.admin_profile = sqlx::query_as::<_, AdminProfile>(
                    "SELECT * FROM admin_profiles WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_optional(&self.db_pool)
                .await?;
            }
        }

        Ok(response)
    }

    // Tutors

    async fn tutor_profile(&self, user_id: Uuid) -> Result<TutorProfile, AppError> {
        sqlx::query_as::<_, TutorProfile>("SELECT * FROM tutor_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Tutor not found".to_string()))
    }

    async fn with_users(&self, profiles: Vec<TutorProfile>) -> Result<Vec<TutorProfileResponse>, AppError> {
        let ids: Vec<Uuid> = profiles.iter().map(|p| p.user_id).collect();
        let users: HashMap<Uuid, User> = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db_pool)
            .await?
            .into_iter()
            .map(|user| (user.user_id, user))
            .collect();

        profiles
            .into_iter()
            .filter_map(|profile| {
                users
                    .get(&profile.user_id)
                    .map(|user| TutorProfileResponse::new(profile, user))
            })
            .collect()
    }

    /// Anonymous callers and non-admins only ever see approved tutors.
    pub async fn list_tutors(
        &self,
        caller_is_admin: bool,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<TutorProfileResponse>, AppError> {
        let status = if caller_is_admin { status } else { Some(ApprovalStatus::Approved) };

        let profiles = sqlx::query_as::<_, TutorProfile>(
            r#"
            SELECT * FROM tutor_profiles
            WHERE ($1::TEXT IS NULL OR approval_status = $1)
            ORDER BY is_featured DESC, rating DESC, created_at DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db_pool)
        .await?;

        self.with_users(profiles).await
    }

    pub async fn get_tutor(&self, tutor_id: Uuid, caller: Option<(Uuid, bool)>) -> Result<TutorProfileResponse, AppError> {
        let profile = self.tutor_profile(tutor_id).await?;
        let privileged = matches!(caller, Some((id, is_admin)) if is_admin || id == tutor_id);
        if !profile.is_approved() && !privileged {
            return Err(AppError::NotFound("Tutor not found".to_string()));
        }

        let user = self.find_user(tutor_id).await?;
        TutorProfileResponse::new(profile, &user)
    }

    pub async fn update_tutor_profile(
        &self,
        tutor_id: Uuid,
        request: UpdateTutorProfileRequest,
        client: &ClientInfo,
    ) -> Result<TutorProfileResponse, AppError> {
        request.validate_rates()?;

        let profile = sqlx::query_as::<_, TutorProfile>(
            r#"
            UPDATE tutor_profiles SET
                bio = COALESCE($2, bio),
                skills = COALESCE($3, skills),
                languages = COALESCE($4, languages),
                price_per_lesson = COALESCE($5, price_per_lesson),
                hourly_rate = COALESCE($6, hourly_rate),
                instant_booking = COALESCE($7, instant_booking),
                cv_url = COALESCE($8, cv_url),
                certificate_url = COALESCE($9, certificate_url),
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(tutor_id)
        .bind(&request.bio)
        .bind(&request.skills)
        .bind(&request.languages)
        .bind(request.price_per_lesson)
        .bind(request.hourly_rate)
        .bind(request.instant_booking)
        .bind(&request.cv_url)
        .bind(&request.certificate_url)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Tutor profile not found".to_string()))?;

        audit::record(
            &self.db_pool,
            &AuditEntry::new(Some(tutor_id), AuditAction::ProfileUpdate, "Tutor profile updated").client(client),
        )
        .await?;

        let user = self.find_user(tutor_id).await?;
        TutorProfileResponse::new(profile, &user)
    }

    pub async fn decide_tutor(
        &self,
        admin_id: Uuid,
        tutor_id: Uuid,
        decision: ApprovalStatus,
        notes: Option<String>,
        client: &ClientInfo,
    ) -> Result<TutorProfileResponse, AppError> {
        let approved = decision == ApprovalStatus::Approved;
        let action = if approved { AuditAction::TutorApproved } else { AuditAction::TutorRejected };
        let user = self.find_user(tutor_id).await?;

        let mut tx = self.db_pool.begin().await?;
        let profile = sqlx::query_as::<_, TutorProfile>(
            "UPDATE tutor_profiles SET approval_status = $2, updated_at = NOW() WHERE user_id = $1 RETURNING *",
        )
        .bind(tutor_id)
        .bind(decision.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Tutor not found".to_string()))?;

        let message = if approved {
            "Your tutor application has been approved. You can now publish availability.".to_string()
        } else {
            "Your tutor application was not approved.".to_string()
        };
        create_notification(
            &mut *tx,
            &NewNotification::in_app(tutor_id, NotificationCategory::TutorApproval, "Tutor application update", message)
                .also_email(),
        )
        .await?;

        audit::record(
            &mut *tx,
            &AuditEntry::new(Some(admin_id), action, format!("Tutor {} {}", user.email, decision))
                .client(client)
                .metadata(json!({ "tutor_id": tutor_id, "notes": notes })),
        )
        .await?;
        tx.commit().await?;

        self.mailer
            .dispatch(
                &user.email,
                EmailTemplate::TutorApprovalDecision,
                &json!({
                    "first_name": user.first_name,
                    "approved": approved,
                    "notes": notes,
                    "dashboard_link": format!("{}/dashboard", self.config.platform.frontend_url.trim_end_matches('/')),
                }),
            )
            .await;

        TutorProfileResponse::new(profile, &user)
    }

    // Students

    pub async fn student_profile(&self, student_id: Uuid) -> Result<StudentProfileResponse, AppError> {
        let user = self.find_user(student_id).await?;
        let profile = sqlx::query_as::<_, StudentProfile>("SELECT * FROM student_profiles WHERE user_id = $1")
            .bind(student_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Student profile not found".to_string()))?;

        Ok(StudentProfileResponse {
            profile,
            user: UserInfo::try_from(&user)?,
        })
    }

    pub async fn update_student_profile(
        &self,
        student_id: Uuid,
        request: UpdateStudentProfileRequest,
        client: &ClientInfo,
    ) -> Result<StudentProfileResponse, AppError> {
        let mut tx = self.db_pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(student_id)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            r#"
            UPDATE student_profiles SET
                bio = COALESCE($2, bio),
                language = COALESCE($3, language),
                country = COALESCE($4, country),
                currency = COALESCE($5, currency),
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(student_id)
        .bind(&request.bio)
        .bind(&request.language)
        .bind(&request.country)
        .bind(request.currency.as_deref().map(str::to_uppercase))
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Student profile not found".to_string()));
        }

        audit::record(
            &mut *tx,
            &AuditEntry::new(Some(student_id), AuditAction::ProfileUpdate, "Student profile updated").client(client),
        )
        .await?;
        tx.commit().await?;

        self.student_profile(student_id).await
    }

    pub async fn list_students(&self) -> Result<Vec<StudentProfileResponse>, AppError> {
        let profiles = sqlx::query_as::<_, StudentProfile>("SELECT * FROM student_profiles ORDER BY created_at DESC")
            .fetch_all(&self.db_pool)
            .await?;
        let ids: Vec<Uuid> = profiles.iter().map(|p| p.user_id).collect();
        let users: HashMap<Uuid, User> = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db_pool)
            .await?
            .into_iter()
            .map(|user| (user.user_id, user))
            .collect();

        profiles
            .into_iter()
            .filter_map(|profile| {
                users.get(&profile.user_id).map(|user| -> Result<_, AppError> {
                    Ok(StudentProfileResponse {
                        user: UserInfo::try_from(user)?,
                        profile,
                    })
                })
            })
            .collect()
    }
}

async fn insert_user(
    conn: &mut sqlx::PgConnection,
    email: &str,
    hashed_password: &str,
    first_name: &str,
    last_name: &str,
    role: UserRole,
    verification: Option<&OneTimeToken>,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users
            (user_id, email, hashed_password, first_name, last_name, role,
             email_verification_token, email_verification_token_created, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(hashed_password)
    .bind(first_name.trim())
    .bind(last_name.trim())
    .bind(role.as_str())
    .bind(verification.map(|t| t.value.as_str()))
    .bind(verification.map(|t| t.created_at))
    .fetch_one(&mut *conn)
    .await?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_compared_case_insensitively() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn a_token_is_spent_only_once() {
        assert!(token_consumed(1).is_ok());
        assert!(matches!(token_consumed(0), Err(AppError::Validation(_))));
    }
}
