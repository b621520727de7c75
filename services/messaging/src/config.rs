use serde::{Deserialize, Serialize};
use uuid::Uuid;

use afrilingua_common::{DatabaseConfig, JwtConfig, PlatformSettings, ServerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub platform: PlatformSettings,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env("MESSAGING_PORT", 8005),
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env(),
            platform: PlatformSettings::from_env(),
        }
    }

    pub fn conversation_link(&self, conversation_id: Uuid) -> String {
        format!(
            "{}/messages/{}",
            self.platform.frontend_url.trim_end_matches('/'),
            conversation_id
        )
    }
}
