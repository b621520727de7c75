use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use afrilingua_common::{AppError, ApprovalStatus, UserRole};
use afrilingua_database::{AdminProfile, StudentProfile, TutorProfile, User};

// Request/Response DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterStudentRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,

    pub password2: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterTutorRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,

    pub password2: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,

    #[validate(length(min = 1))]
    pub bio: String,

    #[validate(length(min = 1))]
    pub skills: String,

    #[validate(length(max = 255))]
    pub languages: Option<String>,

    pub hourly_rate: Option<Decimal>,
    pub price_per_lesson: Option<Decimal>,

    #[validate(url)]
    pub cv_url: Option<String>,

    #[validate(url)]
    pub certificate_url: Option<String>,
}

impl RegisterTutorRequest {
    pub fn validate_rates(&self) -> Result<(), AppError> {
        validate_rates(self.hourly_rate, self.price_per_lesson)
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AdminRegisterRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub department: String,

    #[serde(default)]
    #[validate(length(max = 20))]
    pub phone_number: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub message: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<&User> for UserInfo {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        Ok(Self {
            id: user.user_id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role()?,
            email_verified: user.email_verified,
            created_at: user.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tutor_profile: Option<TutorProfileResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_profile: Option<StudentProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_profile: Option<AdminProfile>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PasswordResetConfirmRequest {
    #[validate(length(min = 1))]
    pub token: String,
    pub password: String,
    pub password2: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub old_password: String,
    pub new_password: String,
    pub new_password2: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TutorProfileResponse {
    #[serde(flatten)]
    pub profile: TutorProfile,
    pub user: UserInfo,
    pub commission_rate: Decimal,
}

impl TutorProfileResponse {
    pub fn new(profile: TutorProfile, user: &User) -> Result<Self, AppError> {
        Ok(Self {
            commission_rate: profile.commission_rate(),
            user: UserInfo::try_from(user)?,
            profile,
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTutorProfileRequest {
    pub bio: Option<String>,
    pub skills: Option<String>,
    #[validate(length(max = 255))]
    pub languages: Option<String>,
    pub price_per_lesson: Option<Decimal>,
    pub hourly_rate: Option<Decimal>,
    pub instant_booking: Option<bool>,
    #[validate(url)]
    pub cv_url: Option<String>,
    #[validate(url)]
    pub certificate_url: Option<String>,
}

impl UpdateTutorProfileRequest {
    pub fn validate_rates(&self) -> Result<(), AppError> {
        validate_rates(self.hourly_rate, self.price_per_lesson)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TutorListQuery {
    pub status: Option<ApprovalStatus>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ApprovalDecisionRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudentProfileResponse {
    #[serde(flatten)]
    pub profile: StudentProfile,
    pub user: UserInfo,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateStudentProfileRequest {
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    pub bio: Option<String>,
    #[validate(length(max = 50))]
    pub language: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    #[validate(length(min = 3, max = 10))]
    pub currency: Option<String>,
}

fn validate_rates(hourly_rate: Option<Decimal>, price_per_lesson: Option<Decimal>) -> Result<(), AppError> {
    for (field, value) in [("hourly_rate", hourly_rate), ("price_per_lesson", price_per_lesson)] {
        if let Some(value) = value {
            afrilingua_database::validate_price(field, value)?;
        }
    }
    Ok(())
}
