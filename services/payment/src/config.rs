use serde::{Deserialize, Serialize};

use afrilingua_common::{env_string, DatabaseConfig, JwtConfig, PlatformSettings, ServerConfig};
use afrilingua_mailer::EmailConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub platform: PlatformSettings,
    pub email: EmailConfig,
    pub payment: PaymentServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentServiceConfig {
    /// Shared secret providers sign webhook bodies with.
    pub webhook_secret: String,
}

impl PaymentServiceConfig {
    pub fn from_env() -> Self {
        Self {
            webhook_secret: env_string("PAYMENT_WEBHOOK_SECRET", "dev-webhook-secret"),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env("PAYMENT_PORT", 8004),
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env(),
            platform: PlatformSettings::from_env(),
            email: EmailConfig::from_env(),
            payment: PaymentServiceConfig::from_env(),
        }
    }
}
