use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

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
            server: ServerConfig::from_env("BOOKINGS_PORT", 8003),
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env(),
            platform: PlatformSettings::from_env(),
            email: EmailConfig::from_env(),
        }
    }

    pub fn auto_confirm_grace(&self) -> Duration {
        Duration::hours(self.platform.lesson_auto_confirm_grace_hours)
    }

    pub fn early_join(&self) -> Duration {
        Duration::minutes(self.platform.classroom_early_join_minutes)
    }

    pub fn classroom_url(&self, room_name: &str) -> String {
        format!("{}/{}", self.platform.classroom_base_url.trim_end_matches('/'), room_name)
    }

    pub fn booking_link(&self, booking_id: Uuid) -> String {
        format!("{}/bookings/{}/", self.platform.frontend_url.trim_end_matches('/'), booking_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classroom_url_joins_base_and_room() {
        let mut config = AppConfig::from_env();
        config.platform.classroom_base_url = "https://meet.example.com/".to_string();
        assert_eq!(config.classroom_url("room-1"), "https://meet.example.com/room-1");
    }
}
