//! Transactional email templates.
//!
//! Each template is an HTML body, a plain-text body and a subject line, all
//! rendered from the same JSON context. `year` is added to every context.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use handlebars::{no_escape, Handlebars};
use serde::Serialize;
use serde_json::Value;

use afrilingua_common::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    VerifyEmail,
    PasswordReset,
    AdminNotifyTutorSignup,
    AdminWelcome,
    AdminLoginAlert,
    TutorApprovalDecision,
    BookingConfirmed,
    WithdrawalUpdate,
}

impl EmailTemplate {
    pub const ALL: [EmailTemplate; 8] = [
        EmailTemplate::VerifyEmail,
        EmailTemplate::PasswordReset,
        EmailTemplate::AdminNotifyTutorSignup,
        EmailTemplate::AdminWelcome,
        EmailTemplate::AdminLoginAlert,
        EmailTemplate::TutorApprovalDecision,
        EmailTemplate::BookingConfirmed,
        EmailTemplate::WithdrawalUpdate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EmailTemplate::VerifyEmail => "verify_email",
            EmailTemplate::PasswordReset => "password_reset",
            EmailTemplate::AdminNotifyTutorSignup => "admin_notify_tutor_signup",
            EmailTemplate::AdminWelcome => "admin_welcome",
            EmailTemplate::AdminLoginAlert => "admin_login_alert",
            EmailTemplate::TutorApprovalDecision => "tutor_approval_decision",
            EmailTemplate::BookingConfirmed => "booking_confirmed",
            EmailTemplate::WithdrawalUpdate => "withdrawal_update",
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            EmailTemplate::VerifyEmail => "Verify your AfriLingua account",
            EmailTemplate::PasswordReset => "AfriLingua Password Reset Request",
            EmailTemplate::AdminNotifyTutorSignup => "New Tutor Registration - AfriLingua",
            EmailTemplate::AdminWelcome => "Welcome to AfriLingua Admin Console",
            EmailTemplate::AdminLoginAlert => "AfriLingua Admin Login Alert",
            EmailTemplate::TutorApprovalDecision => {
                "Your AfriLingua tutor application was {{#if approved}}approved{{else}}not approved{{/if}}"
            }
            EmailTemplate::BookingConfirmed => "Your lesson for {{course_title}} is confirmed",
            EmailTemplate::WithdrawalUpdate => "Your AfriLingua withdrawal is {{status}}",
        }
    }

    fn sources(&self) -> (&'static str, &'static str) {
        match self {
            EmailTemplate::VerifyEmail => (
                include_str!("../templates/verify_email.html.hbs"),
                include_str!("../templates/verify_email.txt.hbs"),
            ),
            EmailTemplate::PasswordReset => (
                include_str!("../templates/password_reset.html.hbs"),
                include_str!("../templates/password_reset.txt.hbs"),
            ),
            EmailTemplate::AdminNotifyTutorSignup => (
                include_str!("../templates/admin_notify_tutor_signup.html.hbs"),
                include_str!("../templates/admin_notify_tutor_signup.txt.hbs"),
            ),
            EmailTemplate::AdminWelcome => (
                include_str!("../templates/admin_welcome.html.hbs"),
                include_str!("../templates/admin_welcome.txt.hbs"),
            ),
            EmailTemplate::AdminLoginAlert => (
                include_str!("../templates/admin_login_alert.html.hbs"),
                include_str!("../templates/admin_login_alert.txt.hbs"),
            ),
            EmailTemplate::TutorApprovalDecision => (
                include_str!("../templates/tutor_approval_decision.html.hbs"),
                include_str!("../templates/tutor_approval_decision.txt.hbs"),
            ),
            EmailTemplate::BookingConfirmed => (
                include_str!("../templates/booking_confirmed.html.hbs"),
                include_str!("../templates/booking_confirmed.txt.hbs"),
            ),
            EmailTemplate::WithdrawalUpdate => (
                include_str!("../templates/withdrawal_update.html.hbs"),
                include_str!("../templates/withdrawal_update.txt.hbs"),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Clone)]
pub struct TemplateEngine {
    html: Arc<Handlebars<'static>>,
    text: Arc<Handlebars<'static>>,
}

fn registration_error(e: handlebars::TemplateError) -> AppError {
    AppError::Internal(format!("Template registration error: {}", e))
}

impl TemplateEngine {
    pub fn new() -> Result<Self, AppError> {
        let mut html = Handlebars::new();
        html.register_partial("header", include_str!("../templates/partial_header.html.hbs"))
            .map_err(registration_error)?;
        html.register_partial("footer", include_str!("../templates/partial_footer.html.hbs"))
            .map_err(registration_error)?;

        // Plain text bodies and subjects must not be HTML-escaped.
        let mut text = Handlebars::new();
        text.register_escape_fn(no_escape);

        for template in EmailTemplate::ALL {
            let (html_source, text_source) = template.sources();
            html.register_template_string(template.name(), html_source)
                .map_err(registration_error)?;
            text.register_template_string(template.name(), text_source)
                .map_err(registration_error)?;
            text.register_template_string(&subject_key(template), template.subject())
                .map_err(registration_error)?;
        }

        Ok(Self {
            html: Arc::new(html),
            text: Arc::new(text),
        })
    }

    pub fn render<T: Serialize>(
        &self,
        template: EmailTemplate,
        context: &T,
    ) -> Result<RenderedEmail, AppError> {
        let mut context = serde_json::to_value(context)
            .map_err(|e| AppError::Internal(format!("Template context error: {}", e)))?;
        if let Value::Object(map) = &mut context {
            map.insert("year".to_string(), Value::from(Utc::now().year()));
        }

        let render = |registry: &Handlebars<'static>, name: &str| {
            registry
                .render(name, &context)
                .map_err(|e| AppError::Internal(format!("Template rendering error: {}", e)))
        };

        Ok(RenderedEmail {
            subject: render(&self.text, &subject_key(template))?.trim().to_string(),
            html: render(&self.html, template.name())?,
            text: render(&self.text, template.name())?,
        })
    }
}

fn subject_key(template: EmailTemplate) -> String {
    format!("{}.subject", template.name())
}
