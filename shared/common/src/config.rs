use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Reads an environment variable, falling back to `default` when it is unset
/// or does not parse.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

pub fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_string("DATABASE_HOST", "localhost"),
            port: env_or("DATABASE_PORT", 5432),
            username: env_string("DATABASE_USERNAME", "afrilingua_user"),
            password: env_string("DATABASE_PASSWORD", "afrilingua_password"),
            database: env_string("DATABASE_NAME", "afrilingua"),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: u64,
    pub issuer: String,
}

impl JwtConfig {
    pub fn from_env() -> Self {
        Self {
            secret: env_string("JWT_SECRET", "dev-secret-key-change-in-production"),
            expiration_hours: env_or("JWT_EXPIRATION_HOURS", 24),
            issuer: env_string("JWT_ISSUER", "afrilingua"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// `port_var` is the service specific port variable, e.g. `ACCOUNTS_PORT`.
    pub fn from_env(port_var: &str, default_port: u16) -> Self {
        Self {
            host: env_string("SERVER_HOST", "0.0.0.0"),
            port: env_or(port_var, default_port),
            cors_origins: env_string("CORS_ORIGINS", "http://localhost:3000")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// Business constants shared by every service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    pub platform_fee_percentage: Decimal,
    pub booking_refund_cutoff_hours: i64,
    pub email_verification_timeout_minutes: i64,
    pub password_reset_timeout_minutes: i64,
    pub lesson_auto_confirm_grace_hours: i64,
    pub classroom_base_url: String,
    pub classroom_early_join_minutes: i64,
    pub frontend_url: String,
    pub default_currency: String,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            platform_fee_percentage: Decimal::new(15, 0),
            booking_refund_cutoff_hours: 24,
            email_verification_timeout_minutes: 1440,
            password_reset_timeout_minutes: 60,
            lesson_auto_confirm_grace_hours: 48,
            classroom_base_url: "https://meet.afrilingua.com".to_string(),
            classroom_early_join_minutes: 10,
            frontend_url: "http://localhost:3000".to_string(),
            default_currency: "USD".to_string(),
        }
    }
}

impl PlatformSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            platform_fee_percentage: env_or(
                "PLATFORM_FEE_PERCENTAGE",
                defaults.platform_fee_percentage,
            ),
            booking_refund_cutoff_hours: env_or(
                "BOOKING_REFUND_CUTOFF_HOURS",
                defaults.booking_refund_cutoff_hours,
            ),
            email_verification_timeout_minutes: env_or(
                "EMAIL_VERIFICATION_TIMEOUT_MINUTES",
                defaults.email_verification_timeout_minutes,
            ),
            password_reset_timeout_minutes: env_or(
                "PASSWORD_RESET_TIMEOUT_MINUTES",
                defaults.password_reset_timeout_minutes,
            ),
            lesson_auto_confirm_grace_hours: env_or(
                "LESSON_AUTO_CONFIRM_GRACE_HOURS",
                defaults.lesson_auto_confirm_grace_hours,
            ),
            classroom_base_url: env_string("CLASSROOM_BASE_URL", &defaults.classroom_base_url),
            classroom_early_join_minutes: env_or(
                "CLASSROOM_EARLY_JOIN_MINUTES",
                defaults.classroom_early_join_minutes,
            ),
            frontend_url: env_string("FRONTEND_URL", &defaults.frontend_url),
            default_currency: env_string("DEFAULT_CURRENCY", &defaults.default_currency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_string_is_postgres_url() {
        let config = DatabaseConfig {
            host: "db".into(),
            port: 5433,
            username: "u".into(),
            password: "p".into(),
            database: "afrilingua".into(),
            max_connections: 5,
        };
        assert_eq!(config.connection_string(), "postgresql://u:p@db:5433/afrilingua");
    }

    #[test]
    fn unparsable_values_fall_back_to_default() {
        std::env::set_var("AFRILINGUA_TEST_BAD_PORT", "not-a-number");
        assert_eq!(env_or("AFRILINGUA_TEST_BAD_PORT", 8080u16), 8080);
        std::env::remove_var("AFRILINGUA_TEST_BAD_PORT");
    }

    #[test]
    fn default_fee_is_fifteen_percent() {
        assert_eq!(PlatformSettings::default().platform_fee_percentage, Decimal::new(15, 0));
    }
}
