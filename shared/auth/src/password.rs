use bcrypt::{hash, verify, DEFAULT_COST};
use afrilingua_common::AppError;

pub struct PasswordService;

impl PasswordService {
    pub fn hash_password(password: &str) -> Result<String, AppError> {
        hash(password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
        verify(password, hash)
            .map_err(|e| AppError::Internal(format!("Failed to verify password: {}", e)))
    }

    /// Checks the confirmation field before the strength rules so the caller
    /// sees the mismatch first.
    pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), AppError> {
        if password != confirmation {
            return Err(AppError::Validation("Password fields didn't match".to_string()));
        }
        Self::validate_password_strength(password)
    }

    pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
        if password.len() < 8 {
            return Err(AppError::Validation("Password must be at least 8 characters long".to_string()));
        }

        if password.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::Validation("Password cannot be entirely numeric".to_string()));
        }

        let has_uppercase = password.chars().any(|c| c.is_uppercase());
        let has_lowercase = password.chars().any(|c| c.is_lowercase());
        let has_digit = password.chars().any(|c| c.is_numeric());

        if !has_uppercase {
            return Err(AppError::Validation("Password must contain at least one uppercase letter".to_string()));
        }

        if !has_lowercase {
            return Err(AppError::Validation("Password must contain at least one lowercase letter".to_string()));
        }

        if !has_digit {
            return Err(AppError::Validation("Password must contain at least one digit".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hashed = PasswordService::hash_password("Lingua2024").unwrap();
        assert!(PasswordService::verify_password("Lingua2024", &hashed).unwrap());
        assert!(!PasswordService::verify_password("lingua2024", &hashed).unwrap());
    }

    #[test]
    fn weak_passwords_are_rejected() {
        assert!(PasswordService::validate_password_strength("Sh0rt").is_err());
        assert!(PasswordService::validate_password_strength("12345678").is_err());
        assert!(PasswordService::validate_password_strength("alllowercase1").is_err());
        assert!(PasswordService::validate_password_strength("Acceptable1").is_ok());
    }

    #[test]
    fn mismatch_is_reported_before_strength() {
        let err = PasswordService::validate_new_password("weak", "other").unwrap_err();
        assert_eq!(err.public_message(), "Password fields didn't match");
    }
}
