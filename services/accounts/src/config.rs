use serde::{Deserialize, Serialize};

use afrilingua_common::{DatabaseConfig, JwtConfig, PlatformSettings, ServerConfig};
use afrilingua_mailer::EmailConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub platform: PlatformSettings,
    pub email: EmailConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env("ACCOUNTS_PORT", 8001),
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env(),
            platform: PlatformSettings::from_env(),
            email: EmailConfig::from_env(),
        }
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/verify-email/{}/", self.platform.frontend_url.trim_end_matches('/'), token)
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/reset-password/{}/", self.platform.frontend_url.trim_end_matches('/'), token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_point_at_frontend() {
        let mut config = AppConfig::from_env();
        config.platform.frontend_url = "https://app.afrilingua.com/".to_string();
        assert_eq!(
            config.verification_link("tok"),
            "https://app.afrilingua.com/verify-email/tok/"
        );
        assert_eq!(
            config.reset_link("tok"),
            "https://app.afrilingua.com/reset-password/tok/"
        );
    }
}
