use lettre::{
    message::{Mailbox, Message, MultiPart},
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use serde::Serialize;

use afrilingua_common::AppError;

use crate::config::EmailConfig;
use crate::templates::{EmailTemplate, RenderedEmail, TemplateEngine};

#[derive(Clone)]
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Result<Self, AppError> {
        if !config.enabled {
            return Ok(Self {
                transport: AsyncSmtpTransport::<Tokio1Executor>::unencrypted_localhost(),
                config: config.clone(),
            });
        }

        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::Email(format!("SMTP relay error: {}", e)))?
            .port(config.smtp_port)
            .credentials(creds)
            .pool_config(PoolConfig::new().max_size(10))
            .build();

        Ok(Self {
            transport,
            config: config.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn admin_email(&self) -> &str {
        &self.config.admin_email
    }

    pub async fn send(&self, to: &str, email: &RenderedEmail) -> Result<(), AppError> {
        if !self.config.enabled {
            tracing::info!("Email service disabled, skipping '{}' to: {}", email.subject, to);
            return Ok(());
        }

        let from_mailbox: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| AppError::Email(format!("Invalid from address: {}", e)))?;

        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| AppError::Email(format!("Invalid to address: {}", e)))?;

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(email.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| AppError::Email(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(format!("Failed to send email: {}", e)))?;

        tracing::info!("Email sent successfully to: {}", to);
        Ok(())
    }
}

/// Templates plus transport, the pair every service hands its handlers.
#[derive(Clone)]
pub struct Mailer {
    pub email: EmailService,
    pub templates: TemplateEngine,
}

impl Mailer {
    pub fn new(config: &EmailConfig) -> Result<Self, AppError> {
        Ok(Self {
            email: EmailService::new(config)?,
            templates: TemplateEngine::new()?,
        })
    }

    pub async fn send_template<T: Serialize>(
        &self,
        to: &str,
        template: EmailTemplate,
        context: &T,
    ) -> Result<(), AppError> {
        let rendered = self.templates.render(template, context)?;
        self.email.send(to, &rendered).await
    }

    /// Sends without failing the caller. Delivery problems are logged; the
    /// request that triggered the email has already succeeded.
    pub async fn dispatch<T: Serialize>(&self, to: &str, template: EmailTemplate, context: &T) {
        if let Err(e) = self.send_template(to, template, context).await {
            tracing::warn!("Failed to send {} email to {}: {}", template.name(), to, e);
        }
    }
}
