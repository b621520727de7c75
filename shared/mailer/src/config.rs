use serde::{Deserialize, Serialize};

use afrilingua_common::{env_or, env_string};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
    /// Inbox that receives staff alerts such as new tutor signups.
    pub admin_email: String,
}

impl EmailConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: env_or("EMAIL_ENABLED", false),
            smtp_host: env_string("SMTP_HOST", "localhost"),
            smtp_port: env_or("SMTP_PORT", 587),
            smtp_username: env_string("SMTP_USERNAME", ""),
            smtp_password: env_string("SMTP_PASSWORD", ""),
            from_email: env_string("FROM_EMAIL", "noreply@afrilingua.com"),
            from_name: env_string("FROM_NAME", "AfriLingua"),
            admin_email: env_string("ADMIN_EMAIL", "admin@afrilingua.com"),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: "noreply@afrilingua.com".to_string(),
            from_name: "AfriLingua".to_string(),
            admin_email: "admin@afrilingua.com".to_string(),
        }
    }
}
