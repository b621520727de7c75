use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Declares a snake_case enum that is stored as TEXT in Postgres.
///
/// Rows keep the raw string; services convert with `FromStr` / `as_str`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::AppError::Validation(format!(
                        "Unknown {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(UserRole {
    Student => "student",
    Tutor => "tutor",
    Admin => "admin",
});

text_enum!(
    /// Admin gate in front of a tutor becoming bookable.
    ApprovalStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

text_enum!(CourseCategory {
    Mathematics => "mathematics",
    Science => "science",
    Language => "language",
    Programming => "programming",
    Business => "business",
    Arts => "arts",
    Music => "music",
    Other => "other",
});

text_enum!(BookingStatus {
    Pending => "pending",
    Paid => "paid",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

impl BookingStatus {
    /// Forward path is pending → paid → confirmed → completed; cancelled and
    /// refunded are terminal off-ramps.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Paid, Confirmed)
                | (Confirmed, Completed)
                | (Pending, Cancelled)
                | (Paid, Refunded)
                | (Confirmed, Refunded)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Refunded
        )
    }

    /// Whether money has been collected for the booking.
    pub fn is_paid(&self) -> bool {
        matches!(self, BookingStatus::Paid | BookingStatus::Confirmed)
    }
}

text_enum!(LessonStatus {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

text_enum!(SubscriptionStatus {
    Active => "active",
    Paused => "paused",
    Canceled => "canceled",
    Expired => "expired",
});

impl SubscriptionStatus {
    /// Active and paused subscriptions occupy the (student, tutor) slot.
    pub fn is_live(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Paused)
    }
}

text_enum!(PaymentProvider {
    Stripe => "stripe",
    PayPal => "paypal",
    Wise => "wise",
});

text_enum!(PaymentStatus {
    Pending => "pending",
    Processing => "processing",
    Succeeded => "succeeded",
    Failed => "failed",
    Refunded => "refunded",
});

text_enum!(WithdrawalStatus {
    Pending => "pending",
    Approved => "approved",
    Processing => "processing",
    Completed => "completed",
    Rejected => "rejected",
});

impl WithdrawalStatus {
    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        use WithdrawalStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Approved, Processing)
                | (Processing, Completed)
                | (Pending, Rejected)
                | (Approved, Rejected)
        )
    }
}

text_enum!(PayoutMethod {
    PayPal => "paypal",
    Wise => "wise",
    BankTransfer => "bank_transfer",
});

text_enum!(
    /// Kind of a wallet ledger entry.
    LedgerEntryType {
        Earning => "earning",
        Release => "release",
        Withdrawal => "withdrawal",
        WithdrawalReversal => "withdrawal_reversal",
        Refund => "refund",
    }
);

text_enum!(NotificationType {
    Email => "email",
    InApp => "in_app",
    Both => "both",
});

text_enum!(NotificationCategory {
    TutorApproval => "tutor_approval",
    Booking => "booking",
    Payment => "payment",
    Message => "message",
    Withdrawal => "withdrawal",
    Lesson => "lesson",
    Reminder => "reminder",
    General => "general",
});

text_enum!(AuditAction {
    Login => "login",
    Logout => "logout",
    ProfileUpdate => "profile_update",
    BookingCreated => "booking_created",
    BookingCancelled => "booking_cancelled",
    PaymentMade => "payment_made",
    WithdrawalRequested => "withdrawal_requested",
    WithdrawalProcessed => "withdrawal_processed",
    CourseCreated => "course_created",
    CourseUpdated => "course_updated",
    TutorApproved => "tutor_approved",
    TutorRejected => "tutor_rejected",
});

// Common response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Plain acknowledgement payload for endpoints that only report an outcome.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn booking_forward_path_is_linear() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Paid));
        assert!(BookingStatus::Paid.can_transition_to(BookingStatus::Confirmed));
        assert!(BookingStatus::Confirmed.can_transition_to(BookingStatus::Completed));

        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::Confirmed));
        assert!(!BookingStatus::Completed.can_transition_to(BookingStatus::Refunded));
        assert!(!BookingStatus::Cancelled.can_transition_to(BookingStatus::Pending));
    }

    #[test]
    fn only_collected_bookings_are_refunded() {
        assert!(BookingStatus::Paid.can_transition_to(BookingStatus::Refunded));
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::Refunded));
        assert!(!BookingStatus::Paid.can_transition_to(BookingStatus::Cancelled));
    }

    #[test]
    fn withdrawal_rejection_only_before_processing() {
        assert!(WithdrawalStatus::Approved.can_transition_to(WithdrawalStatus::Rejected));
        assert!(!WithdrawalStatus::Processing.can_transition_to(WithdrawalStatus::Rejected));
        assert!(!WithdrawalStatus::Completed.can_transition_to(WithdrawalStatus::Rejected));
    }

    #[test]
    fn text_enums_parse_their_column_values() {
        assert_eq!(UserRole::from_str("tutor").unwrap(), UserRole::Tutor);
        assert_eq!(PayoutMethod::BankTransfer.as_str(), "bank_transfer");
        assert!(SubscriptionStatus::from_str("cancelled").is_err());
    }

    #[test]
    fn enums_serialize_snake_case() {
        let json = serde_json::to_string(&NotificationType::InApp).unwrap();
        assert_eq!(json, "\"in_app\"");

        let provider: PaymentProvider = serde_json::from_str("\"paypal\"").unwrap();
        assert_eq!(provider, PaymentProvider::PayPal);
    }
}
