use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use afrilingua_auth::OneTimeToken;
use afrilingua_common::*;

/// Rounds a money amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Largest value a `NUMERIC(10,2)` money column holds.
pub fn max_money() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

fn ensure_storable(field: &str, amount: Decimal) -> Result<(), AppError> {
    if round_money(amount) != amount {
        return Err(AppError::Validation(format!(
            "{} cannot have more than two decimal places",
            field
        )));
    }
    if amount.abs() > max_money() {
        return Err(AppError::Validation(format!("{} cannot exceed {}", field, max_money())));
    }
    Ok(())
}

/// A price or rate: zero allowed, whole cents, fits the column.
pub fn validate_price(field: &str, amount: Decimal) -> Result<(), AppError> {
    if amount < Decimal::ZERO {
        return Err(AppError::Validation(format!("{} cannot be negative", field)));
    }
    ensure_storable(field, amount)
}

/// A money movement: strictly positive, whole cents, fits the column.
pub fn validate_amount(amount: Decimal) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation("Amount must be greater than zero".to_string()));
    }
    ensure_storable("Amount", amount)
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub email_verification_token_created: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_token_created: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Result<UserRole, AppError> {
        UserRole::from_str(&self.role)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn verification_token(&self) -> Option<OneTimeToken> {
        OneTimeToken::from_columns(
            self.email_verification_token.clone(),
            self.email_verification_token_created,
        )
    }

    pub fn reset_token(&self) -> Option<OneTimeToken> {
        OneTimeToken::from_columns(
            self.password_reset_token.clone(),
            self.password_reset_token_created,
        )
    }
}

/// Tier boundaries on cumulative hours taught.
pub fn commission_rate_for_hours(hours: Decimal) -> Decimal {
    if hours < Decimal::from(50) {
        Decimal::new(33, 2)
    } else if hours < Decimal::from(100) {
        Decimal::new(28, 2)
    } else if hours < Decimal::from(200) {
        Decimal::new(23, 2)
    } else {
        Decimal::new(18, 2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TutorProfile {
    pub user_id: Uuid,
    pub bio: String,
    pub skills: String,
    pub languages: String,
    pub price_per_lesson: Decimal,
    pub hourly_rate: Decimal,
    pub total_hours_taught: Decimal,
    pub instant_booking: bool,
    pub approval_status: String,
    pub cv_url: Option<String>,
    pub certificate_url: Option<String>,
    pub rating: Decimal,
    pub total_ratings: i32,
    pub courses_taught: i32,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TutorProfile {
    pub fn approval(&self) -> Result<ApprovalStatus, AppError> {
        ApprovalStatus::from_str(&self.approval_status)
    }

    pub fn is_approved(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved.as_str()
    }

    /// Running average after one more rating, as `(rating, total_ratings)`.
    pub fn apply_rating(&self, new_rating: i32) -> (Decimal, i32) {
        let count = self.total_ratings + 1;
        let total = self.rating * Decimal::from(self.total_ratings) + Decimal::from(new_rating);
        (round_money(total / Decimal::from(count)), count)
    }

    pub fn commission_rate(&self) -> Decimal {
        commission_rate_for_hours(self.total_hours_taught)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentProfile {
    pub user_id: Uuid,
    pub bio: String,
    pub language: String,
    pub country: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdminProfile {
    pub user_id: Uuid,
    pub department: String,
    pub phone_number: String,
    pub can_approve_tutors: bool,
    pub can_manage_payments: bool,
    pub can_manage_users: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub image_url: Option<String>,
    pub created_by: Uuid,
    pub price: Decimal,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn is_free(&self) -> bool {
        self.price.is_zero()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lesson {
    pub lesson_id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub content: String,
    pub video_url: Option<String>,
    pub file_url: Option<String>,
    pub duration_minutes: i32,
    #[serde(rename = "order")]
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Bookings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AvailabilitySlot {
    pub slot_id: Uuid,
    pub tutor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_booked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    pub fn is_bookable(&self, now: DateTime<Utc>) -> bool {
        !self.is_booked && self.start_time > now
    }
}

/// Splits `amount` into `(platform_fee, tutor_earnings)`. The fee is rounded
/// to cents and the earnings take the remainder, so the two always sum to
/// `amount`.
pub fn calculate_fees(amount: Decimal, fee_percentage: Decimal) -> (Decimal, Decimal) {
    let fee = round_money(amount * fee_percentage / Decimal::ONE_HUNDRED);
    (fee, amount - fee)
}

/// Latest instant at which a booking on a slot starting at `slot_start` may
/// still be refunded or rescheduled (exclusive).
pub fn refund_cutoff(slot_start: DateTime<Utc>, cutoff_hours: i64) -> DateTime<Utc> {
    slot_start - Duration::hours(cutoff_hours)
}

pub fn can_refund(slot_start: DateTime<Utc>, now: DateTime<Utc>, cutoff_hours: i64) -> bool {
    now < refund_cutoff(slot_start, cutoff_hours)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub booking_id: Uuid,
    pub student_id: Uuid,
    pub tutor_id: Uuid,
    pub course_id: Uuid,
    pub slot_id: Uuid,
    pub status: String,
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub tutor_earnings: Decimal,
    pub currency: String,
    pub meeting_link: Option<String>,
    pub reschedule_reason: Option<String>,
    pub refund_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn status(&self) -> Result<BookingStatus, AppError> {
        BookingStatus::from_str(&self.status)
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.student_id == user_id || self.tutor_id == user_id
    }

    /// Fails with a 400 naming both states when the move is not allowed.
    pub fn ensure_transition(&self, next: BookingStatus) -> Result<(), AppError> {
        let current = self.status()?;
        if current.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "Booking cannot move from {} to {}",
                current, next
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LessonSession {
    pub session_id: Uuid,
    pub booking_id: Uuid,
    pub tutor_id: Uuid,
    pub student_id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub auto_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LessonSession {
    pub fn status(&self) -> Result<LessonStatus, AppError> {
        LessonStatus::from_str(&self.status)
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == LessonStatus::Scheduled.as_str()
    }

    pub fn auto_confirm_due(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        self.is_scheduled() && now > self.scheduled_end + grace
    }

    /// Lesson length in hours, rounded to cents of an hour.
    pub fn duration_hours(&self) -> Decimal {
        let minutes = (self.scheduled_end - self.scheduled_start).num_minutes().max(0);
        round_money(Decimal::from(minutes) / Decimal::from(60))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VirtualClassroom {
    pub classroom_id: Uuid,
    pub booking_id: Uuid,
    pub room_name: String,
    pub join_url: String,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VirtualClassroom {
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.opens_at <= now && now <= self.closes_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAction {
    Pause,
    Resume,
    Cancel,
    Expire,
}

/// Next status for `action`, or a 400 when the subscription is not in a
/// state that allows it.
pub fn subscription_transition(
    current: SubscriptionStatus,
    action: SubscriptionAction,
) -> Result<SubscriptionStatus, AppError> {
    use SubscriptionAction::*;
    use SubscriptionStatus::*;

    match (current, action) {
        (Active, Pause) => Ok(Paused),
        (Paused, Resume) => Ok(Active),
        (Active | Paused, Cancel) => Ok(Canceled),
        (Active | Paused, Expire) => Ok(Expired),
        (status, action) => Err(AppError::Validation(format!(
            "Cannot {:?} a subscription that is {}",
            action, status
        )
        .to_lowercase())),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub subscription_id: Uuid,
    pub student_id: Uuid,
    pub tutor_id: Uuid,
    pub lessons_per_month: i32,
    pub price: Decimal,
    pub commission_rate: Decimal,
    pub tutor_share: Decimal,
    pub currency: String,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub paused_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn status(&self) -> Result<SubscriptionStatus, AppError> {
        SubscriptionStatus::from_str(&self.status)
    }

    /// Live subscriptions whose billing period has run out.
    pub fn expiry_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status(), Ok(status) if status.is_live()) && now >= self.current_period_end
    }
}

/// Tutor's cut of a subscription price after the platform commission.
pub fn tutor_share(price: Decimal, commission_rate: Decimal) -> Decimal {
    round_money(price * (Decimal::ONE - commission_rate))
}

// ---------------------------------------------------------------------------
// Payments and wallets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub transaction_id: Option<String>,
    pub payment_intent_id: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn status(&self) -> Result<PaymentStatus, AppError> {
        PaymentStatus::from_str(&self.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TutorWallet {
    pub wallet_id: Uuid,
    pub tutor_id: Uuid,
    pub available_balance: Decimal,
    pub pending_balance: Decimal,
    pub total_earned: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TutorWallet {
    pub fn empty(tutor_id: Uuid, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            wallet_id: Uuid::new_v4(),
            tutor_id,
            available_balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            total_earned: Decimal::ZERO,
            currency: currency.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_earnings(&mut self, amount: Decimal, pending: bool) -> Result<(), AppError> {
        validate_amount(amount)?;
        if pending {
            self.pending_balance += amount;
        } else {
            self.available_balance += amount;
        }
        self.total_earned += amount;
        Ok(())
    }

    pub fn release_pending(&mut self, amount: Decimal) -> Result<(), AppError> {
        validate_amount(amount)?;
        if self.pending_balance < amount {
            return Err(AppError::InsufficientFunds(format!(
                "Pending balance {} is less than {}",
                self.pending_balance, amount
            )));
        }
        self.pending_balance -= amount;
        self.available_balance += amount;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), AppError> {
        validate_amount(amount)?;
        if self.available_balance < amount {
            return Err(AppError::InsufficientFunds(format!(
                "Available balance {} is less than {}",
                self.available_balance, amount
            )));
        }
        self.available_balance -= amount;
        Ok(())
    }

    /// Takes refunded earnings back, from pending first and then from
    /// available when the tutor was already paid out early.
    pub fn reverse_pending(&mut self, amount: Decimal) -> Result<(), AppError> {
        validate_amount(amount)?;
        if self.pending_balance + self.available_balance < amount {
            return Err(AppError::InsufficientFunds(format!(
                "Wallet holds less than the {} being refunded",
                amount
            )));
        }
        let from_pending = amount.min(self.pending_balance);
        self.pending_balance -= from_pending;
        self.available_balance -= amount - from_pending;
        self.total_earned -= amount;
        Ok(())
    }

    pub fn credit_available(&mut self, amount: Decimal) -> Result<(), AppError> {
        validate_amount(amount)?;
        self.available_balance += amount;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WalletTransaction {
    pub transaction_id: Uuid,
    pub wallet_id: Uuid,
    pub tutor_id: Uuid,
    pub entry_type: String,
    pub amount: Decimal,
    pub available_after: Decimal,
    pub pending_after: Decimal,
    pub reference_id: Option<Uuid>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WithdrawalRequest {
    pub withdrawal_id: Uuid,
    pub tutor_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub payout_method: String,
    pub payout_details: serde_json::Value,
    pub admin_notes: Option<String>,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WithdrawalRequest {
    pub fn status(&self) -> Result<WithdrawalStatus, AppError> {
        WithdrawalStatus::from_str(&self.status)
    }
}

// ---------------------------------------------------------------------------
// Messaging and notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub conversation_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub category: String,
    pub is_read: bool,
    pub link: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Returns whether anything changed; `read_at` keeps its first value.
    pub fn mark_as_read(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_read {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(now);
        true
    }
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Testimonial {
    pub testimonial_id: Uuid,
    pub student_id: Uuid,
    pub tutor_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub rating: i32,
    pub comment: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentProgress {
    pub progress_id: Uuid,
    pub student_id: Uuid,
    pub lesson_id: Uuid,
    pub course_id: Uuid,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_spent: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentProgress {
    /// Returns whether anything changed; `completed_at` keeps its first value.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_completed {
            return false;
        }
        self.is_completed = true;
        self.completed_at = Some(now);
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub log_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub description: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tutor_profile(rating: Decimal, total_ratings: i32, hours: Decimal) -> TutorProfile {
        let now = Utc::now();
        TutorProfile {
            user_id: Uuid::new_v4(),
            bio: String::new(),
            skills: "Yoruba".into(),
            languages: "English".into(),
            price_per_lesson: dec!(20),
            hourly_rate: dec!(25),
            total_hours_taught: hours,
            instant_booking: false,
            approval_status: "approved".into(),
            cv_url: None,
            certificate_url: None,
            rating,
            total_ratings,
            courses_taught: 0,
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn rating_is_a_running_average() {
        let profile = tutor_profile(dec!(4), 1, Decimal::ZERO);
        assert_eq!(profile.apply_rating(5), (dec!(4.5), 2));

        let fresh = tutor_profile(Decimal::ZERO, 0, Decimal::ZERO);
        assert_eq!(fresh.apply_rating(3), (dec!(3), 1));
    }

    #[test]
    fn commission_steps_down_with_hours() {
        assert_eq!(commission_rate_for_hours(dec!(0)), dec!(0.33));
        assert_eq!(commission_rate_for_hours(dec!(49.99)), dec!(0.33));
        assert_eq!(commission_rate_for_hours(dec!(50)), dec!(0.28));
        assert_eq!(commission_rate_for_hours(dec!(60)), dec!(0.28));
        assert_eq!(commission_rate_for_hours(dec!(150)), dec!(0.23));
        assert_eq!(commission_rate_for_hours(dec!(250)), dec!(0.18));
        assert_eq!(tutor_profile(dec!(0), 0, dec!(100)).commission_rate(), dec!(0.23));
    }

    #[test]
    fn fees_split_amount_exactly() {
        assert_eq!(calculate_fees(dec!(100.00), dec!(15)), (dec!(15.00), dec!(85.00)));

        let (fee, earnings) = calculate_fees(dec!(33.33), dec!(15));
        assert_eq!(fee, dec!(5.00));
        assert_eq!(fee + earnings, dec!(33.33));
    }

    #[test]
    fn refund_window_closes_at_cutoff() {
        let start = at("2024-06-10T15:00:00Z");
        assert!(can_refund(start, at("2024-06-09T14:59:59Z"), 24));
        assert!(!can_refund(start, at("2024-06-09T15:00:00Z"), 24));
        assert!(!can_refund(start, at("2024-06-10T16:00:00Z"), 24));
    }

    #[test]
    fn slot_duration_in_minutes() {
        let now = Utc::now();
        let slot = AvailabilitySlot {
            slot_id: Uuid::new_v4(),
            tutor_id: Uuid::new_v4(),
            start_time: at("2024-06-10T15:00:00Z"),
            end_time: at("2024-06-10T16:30:00Z"),
            is_booked: false,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(slot.duration_minutes(), 90);
        assert!(!slot.is_bookable(at("2024-06-10T15:00:00Z")));
        assert!(slot.is_bookable(at("2024-06-10T14:00:00Z")));
    }

    #[test]
    fn auto_confirm_waits_for_grace_period() {
        let now = Utc::now();
        let session = LessonSession {
            session_id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            tutor_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            scheduled_start: at("2024-06-10T15:00:00Z"),
            scheduled_end: at("2024-06-10T16:00:00Z"),
            status: "scheduled".into(),
            completed_at: None,
            auto_confirmed: false,
            created_at: now,
            updated_at: now,
        };
        let grace = Duration::hours(48);

        assert!(!session.auto_confirm_due(at("2024-06-12T16:00:00Z"), grace));
        assert!(session.auto_confirm_due(at("2024-06-12T16:00:01Z"), grace));
        assert_eq!(session.duration_hours(), dec!(1));

        let done = LessonSession { status: "completed".into(), ..session };
        assert!(!done.auto_confirm_due(at("2024-07-01T00:00:00Z"), grace));
    }

    #[test]
    fn subscription_pause_resume_cancel() {
        use SubscriptionAction::*;
        use SubscriptionStatus::*;

        assert_eq!(subscription_transition(Active, Pause).unwrap(), Paused);
        assert_eq!(subscription_transition(Paused, Resume).unwrap(), Active);
        assert_eq!(subscription_transition(Paused, Cancel).unwrap(), Canceled);
        assert_eq!(subscription_transition(Active, Expire).unwrap(), Expired);

        assert!(subscription_transition(Active, Resume).is_err());
        assert!(subscription_transition(Canceled, Resume).is_err());
        assert!(subscription_transition(Expired, Cancel).is_err());
    }

    #[test]
    fn subscription_tutor_share_after_commission() {
        assert_eq!(tutor_share(dec!(100), dec!(0.28)), dec!(72.00));
        assert_eq!(tutor_share(dec!(49.99), dec!(0.33)), dec!(33.49));
    }

    #[test]
    fn withdraw_requires_available_balance() {
        let mut wallet = TutorWallet::empty(Uuid::new_v4(), "USD");
        wallet.add_earnings(dec!(80), true).unwrap();

        assert!(matches!(wallet.withdraw(dec!(10)), Err(AppError::InsufficientFunds(_))));

        wallet.release_pending(dec!(50)).unwrap();
        assert_eq!(wallet.available_balance, dec!(50));
        assert_eq!(wallet.pending_balance, dec!(30));

        wallet.withdraw(dec!(50)).unwrap();
        assert_eq!(wallet.available_balance, dec!(0));
        assert_eq!(wallet.total_earned, dec!(80));
    }

    #[test]
    fn sub_cent_withdrawals_are_refused() {
        let mut wallet = TutorWallet::empty(Uuid::new_v4(), "USD");
        wallet.add_earnings(dec!(0.01), false).unwrap();

        for _ in 0..5 {
            assert!(matches!(wallet.withdraw(dec!(0.005)), Err(AppError::Validation(_))));
        }
        assert_eq!(wallet.available_balance, dec!(0.01));

        wallet.withdraw(dec!(0.010)).unwrap();
        assert_eq!(wallet.available_balance, dec!(0));
    }

    #[test]
    fn money_inputs_fit_the_column() {
        assert!(validate_amount(dec!(12.34)).is_ok());
        assert!(validate_amount(dec!(12.345)).is_err());
        assert!(validate_amount(dec!(99999999.99)).is_ok());
        assert!(validate_amount(dec!(100000000)).is_err());

        assert!(validate_price("price", dec!(0)).is_ok());
        assert!(validate_price("price", dec!(-1)).is_err());
        assert!(validate_price("price", dec!(9.999)).is_err());
    }

    #[test]
    fn release_cannot_exceed_pending() {
        let mut wallet = TutorWallet::empty(Uuid::new_v4(), "USD");
        wallet.add_earnings(dec!(20), true).unwrap();
        assert!(matches!(
            wallet.release_pending(dec!(20.01)),
            Err(AppError::InsufficientFunds(_))
        ));
        assert!(wallet.release_pending(dec!(0)).is_err());
    }

    #[test]
    fn refund_reversal_drains_pending_first() {
        let mut wallet = TutorWallet::empty(Uuid::new_v4(), "USD");
        wallet.add_earnings(dec!(30), true).unwrap();
        wallet.add_earnings(dec!(20), false).unwrap();

        wallet.reverse_pending(dec!(40)).unwrap();
        assert_eq!(wallet.pending_balance, dec!(0));
        assert_eq!(wallet.available_balance, dec!(10));
        assert_eq!(wallet.total_earned, dec!(10));

        assert!(wallet.reverse_pending(dec!(11)).is_err());
    }

    #[test]
    fn notification_read_at_is_set_once() {
        let mut notification = Notification {
            notification_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Hi".into(),
            message: "Hello".into(),
            notification_type: "in_app".into(),
            category: "general".into(),
            is_read: false,
            link: None,
            metadata: None,
            created_at: Utc::now(),
            read_at: None,
        };
        let first = at("2024-06-10T10:00:00Z");

        assert!(notification.mark_as_read(first));
        assert!(!notification.mark_as_read(at("2024-06-11T10:00:00Z")));
        assert_eq!(notification.read_at, Some(first));
    }

    #[test]
    fn progress_completion_is_idempotent() {
        let now = Utc::now();
        let mut progress = StudentProgress {
            progress_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            lesson_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            is_completed: false,
            completed_at: None,
            time_spent: 0,
            created_at: now,
            updated_at: now,
        };
        let first = at("2024-06-10T10:00:00Z");

        assert!(progress.mark_completed(first));
        assert!(!progress.mark_completed(now));
        assert_eq!(progress.completed_at, Some(first));
    }
}
