//! Mail Dispatch
//!
//! Renders embedded message templates and relays them over SMTP with a small
//! bounded retry loop. Registration talks to the `Mailer` trait so tests can
//! substitute `StaticMailer`.

use std::fmt::Display;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use log::{debug, info, warn};
use serde_json::Value;
use tera::{Context, Tera};
use thiserror::Error;

use crate::config::MailConfig;

/// Delivery attempts per message
pub const MAX_RETRIES: u32 = 3;

/// Template sent on registration; expects `username` and `activation_url`
pub const USER_INVITATION_TEMPLATE: &str = "user_invitation";

/// Status reported when sandbox mode suppresses delivery
pub const SANDBOX_STATUS: u16 = 200;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("invalid address: {0}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("failed to send email after {attempts} attempts: {reason}")]
    Delivery { attempts: u32, reason: String },

    #[error("mail relay answered with status {0}")]
    Rejected(u16),

    #[error("mail transport misconfigured: {0}")]
    Configuration(String),
}

/// Outbound mail collaborator
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Render `template` with `vars` and deliver it; returns the relay status
    async fn send(
        &self,
        template: &str,
        recipient_name: &str,
        recipient_email: &str,
        vars: &Value,
        sandbox: bool,
    ) -> Result<u16, MailError>;
}

/// Whether a relay status means the message was accepted
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Rendered subject and bodies of one message
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Embedded message templates
pub struct MailTemplates {
    tera: Tera,
}

impl MailTemplates {
    pub fn new() -> Result<Self, MailError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("user_invitation.subject", INVITATION_SUBJECT),
            ("user_invitation.txt", INVITATION_TEXT),
            ("user_invitation.html", INVITATION_HTML),
        ])?;
        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, vars: &Value) -> Result<RenderedMessage, MailError> {
        let context = Context::from_value(vars.clone())?;
        let render = |part: &str| self.tera.render(&format!("{}.{}", template, part), &context);

        Ok(RenderedMessage {
            subject: render("subject")?.trim().to_string(),
            text: render("txt")?,
            html: render("html")?,
        })
    }
}

const INVITATION_SUBJECT: &str = "Finish registration with {{ app_name | default(value=\"Social Identity\") }}";

const INVITATION_TEXT: &str = r#"
Hi {{ username }},

Thanks for signing up. To activate your account, open the link below:

{{ activation_url }}

If you did not sign up you can safely ignore this email.
"#;

const INVITATION_HTML: &str = r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Finish your registration</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto;">
    <p>Hi {{ username }},</p>
    <p>Thanks for signing up. To activate your account, follow the link below:</p>
    <p><a href="{{ activation_url }}">{{ activation_url }}</a></p>
    <p>If you did not sign up you can safely ignore this email.</p>
</body>
</html>
"#;

/// Run `attempt` up to `MAX_RETRIES` times, sleeping `backoff * n` after the
/// n-th failure
pub(crate) async fn send_with_retries<T, E, F, Fut>(
    recipient: &str,
    backoff: Duration,
    mut attempt: F,
) -> Result<T, MailError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut last_error = String::new();

    for i in 0..MAX_RETRIES {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    "Failed to send email to {}, attempt {} of {}: {}",
                    recipient,
                    i + 1,
                    MAX_RETRIES,
                    e
                );
                last_error = e.to_string();
                if i + 1 < MAX_RETRIES {
                    tokio::time::sleep(backoff * (i + 1)).await;
                }
            }
        }
    }

    Err(MailError::Delivery {
        attempts: MAX_RETRIES,
        reason: last_error,
    })
}

/// SMTP relay mailer
///
/// Without a transport the mailer is log-only: it still renders every
/// message but can only honour sandboxed sends.
pub struct SmtpMailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    templates: MailTemplates,
    from_email: String,
    from_name: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| MailError::Configuration(format!("Failed to configure SMTP relay: {}", e)))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport: Some(transport),
            templates: MailTemplates::new()?,
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }

    /// Mailer with no relay, for development without SMTP
    pub fn log_only(from_name: &str) -> Result<Self, MailError> {
        Ok(Self {
            transport: None,
            templates: MailTemplates::new()?,
            from_email: "noreply@localhost".to_string(),
            from_name: from_name.to_string(),
        })
    }

    fn build_message(
        &self,
        recipient_name: &str,
        recipient_email: &str,
        rendered: RenderedMessage,
    ) -> Result<Message, MailError> {
        // Display names are free text, so only the addresses are parsed
        let from_address: Address = self
            .from_email
            .parse()
            .map_err(|e| MailError::Address(format!("from address: {}", e)))?;
        let to_address: Address = recipient_email
            .parse()
            .map_err(|e| MailError::Address(format!("recipient: {}", e)))?;
        let from = Mailbox::new(Some(self.from_name.clone()), from_address);
        let to = Mailbox::new(Some(recipient_name.to_string()), to_address);

        Message::builder()
            .from(from)
            .to(to)
            .subject(rendered.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(rendered.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(rendered.html),
                    ),
            )
            .map_err(|e| MailError::Message(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        template: &str,
        recipient_name: &str,
        recipient_email: &str,
        vars: &Value,
        sandbox: bool,
    ) -> Result<u16, MailError> {
        let mut vars = vars.clone();
        if let Value::Object(map) = &mut vars {
            map.entry("app_name")
                .or_insert_with(|| Value::String(self.from_name.clone()));
        }

        let rendered = self.templates.render(template, &vars)?;
        let message = self.build_message(recipient_name, recipient_email, rendered)?;

        if sandbox {
            debug!(
                "Sandbox mode: {} message for {} rendered, not relayed",
                template, recipient_email
            );
            return Ok(SANDBOX_STATUS);
        }

        let transport = self.transport.as_ref().ok_or_else(|| {
            MailError::Configuration("no SMTP relay configured".to_string())
        })?;

        let response = send_with_retries(recipient_email, Duration::from_secs(1), || {
            transport.send(message.clone())
        })
        .await?;

        let status = response.code().to_string().parse().unwrap_or(0);
        info!("Email sent to {} with status code {}", recipient_email, status);
        Ok(status)
    }
}

/// Message captured by `StaticMailer`
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub template: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub vars: Value,
    pub sandbox: bool,
}

#[derive(Debug, Clone)]
enum StaticOutcome {
    Status(u16),
    Fail(String),
}

/// Mailer double answering every send with a fixed outcome
pub struct StaticMailer {
    outcome: StaticOutcome,
    sent: Mutex<Vec<SentMessage>>,
}

impl StaticMailer {
    /// Accept every message with status 200
    pub fn accepting() -> Self {
        Self::with_status(200)
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            outcome: StaticOutcome::Status(status),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Fail every send with a delivery error
    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: StaticOutcome::Fail(reason.to_string()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Messages handed to this mailer, in order
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for StaticMailer {
    async fn send(
        &self,
        template: &str,
        recipient_name: &str,
        recipient_email: &str,
        vars: &Value,
        sandbox: bool,
    ) -> Result<u16, MailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMessage {
                template: template.to_string(),
                recipient_name: recipient_name.to_string(),
                recipient_email: recipient_email.to_string(),
                vars: vars.clone(),
                sandbox,
            });
        }

        match &self.outcome {
            StaticOutcome::Status(status) => Ok(*status),
            StaticOutcome::Fail(reason) => Err(MailError::Delivery {
                attempts: MAX_RETRIES,
                reason: reason.clone(),
            }),
        }
    }
}
