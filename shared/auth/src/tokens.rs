//! Single-use tokens for email verification and password reset.
//!
//! A token is an opaque random string plus the instant it was issued. It
//! verifies when the candidate matches exactly and `now <= created_at + ttl`.
//! Callers clear both columns once a verification succeeds.

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};

use afrilingua_common::AppError;

const TOKEN_LENGTH: usize = 48;

pub fn generate_token_value() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCheck {
    Valid,
    Mismatch,
    Expired,
}

#[derive(Debug, Clone)]
pub struct OneTimeToken {
    pub value: String,
    pub created_at: DateTime<Utc>,
}

impl OneTimeToken {
    pub fn issue(now: DateTime<Utc>) -> Self {
        Self {
            value: generate_token_value(),
            created_at: now,
        }
    }

    /// Rebuilds a token from its nullable columns. Either column missing means
    /// there is no outstanding token.
    pub fn from_columns(value: Option<String>, created_at: Option<DateTime<Utc>>) -> Option<Self> {
        match (value, created_at) {
            (Some(value), Some(created_at)) => Some(Self { value, created_at }),
            _ => None,
        }
    }

    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.created_at + ttl
    }

    pub fn check(&self, candidate: &str, now: DateTime<Utc>, ttl: Duration) -> TokenCheck {
        if self.value != candidate {
            return TokenCheck::Mismatch;
        }
        if now > self.expires_at(ttl) {
            return TokenCheck::Expired;
        }
        TokenCheck::Valid
    }

    pub fn verify(&self, candidate: &str, now: DateTime<Utc>, ttl: Duration) -> Result<(), AppError> {
        match self.check(candidate, now, ttl) {
            TokenCheck::Valid => Ok(()),
            TokenCheck::Mismatch => Err(AppError::Validation("Invalid token".to_string())),
            TokenCheck::Expired => Err(AppError::Validation("Token has expired".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued_at_noon() -> OneTimeToken {
        let created_at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        OneTimeToken { value: "abc123".to_string(), created_at }
    }

    #[test]
    fn generated_values_are_long_and_distinct() {
        let a = generate_token_value();
        let b = generate_token_value();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert_ne!(a, b);
    }

    #[test]
    fn valid_up_to_and_including_expiry_instant() {
        let token = issued_at_noon();
        let ttl = Duration::minutes(60);
        let expiry = token.created_at + ttl;

        assert_eq!(token.check("abc123", token.created_at, ttl), TokenCheck::Valid);
        assert_eq!(token.check("abc123", expiry, ttl), TokenCheck::Valid);
        assert_eq!(
            token.check("abc123", expiry + Duration::seconds(1), ttl),
            TokenCheck::Expired
        );
    }

    #[test]
    fn wrong_value_never_verifies() {
        let token = issued_at_noon();
        assert_eq!(
            token.check("abc124", token.created_at, Duration::days(1)),
            TokenCheck::Mismatch
        );
        assert!(token.verify("", token.created_at, Duration::days(1)).is_err());
    }

    #[test]
    fn missing_column_means_no_token() {
        assert!(OneTimeToken::from_columns(Some("x".into()), None).is_none());
        assert!(OneTimeToken::from_columns(None, Some(Utc::now())).is_none());
        assert!(OneTimeToken::from_columns(Some("x".into()), Some(Utc::now())).is_some());
    }
}
