//! Outbound email for visitor complaints.
//!
//! Uses the SMTP settings from the main config file. When SMTP is not
//! configured the service logs and drops the message instead of failing the
//! request.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::EmailConfig;

/// A complaint submitted through the public form
#[derive(Debug, Clone)]
pub struct Complaint {
    pub subject: Option<String>,
    pub message: String,
    pub contact: Option<String>,
}

/// Service for forwarding complaints over SMTP
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured and enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Forward a complaint to the configured mailbox
    pub async fn send_complaint(&self, complaint: &Complaint) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!("Email not configured, dropping complaint notification");
            return Ok(());
        }

        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;
        let to_address = self
            .config
            .complaints_to
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Complaints mailbox not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = to_address.parse()?;

        let subject = match &complaint.subject {
            Some(subject) if !subject.trim().is_empty() => {
                format!("Жалоба: {}", subject.trim())
            }
            _ => "Жалоба с сайта".to_string(),
        };

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(render_complaint_body(complaint))?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!("Complaint email sent");
        Ok(())
    }
}

fn render_complaint_body(complaint: &Complaint) -> String {
    let mut body = String::new();
    body.push_str("Новая жалоба с сайта\n\n");
    body.push_str(&complaint.message);
    body.push('\n');
    if let Some(contact) = &complaint.contact {
        if !contact.trim().is_empty() {
            body.push_str("\nКонтакт для ответа: ");
            body.push_str(contact.trim());
            body.push('\n');
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_service_is_disabled() {
        let service = EmailService::new(EmailConfig::default());
        assert!(!service.is_enabled());
    }

    #[tokio::test]
    async fn unconfigured_send_is_a_noop() {
        let service = EmailService::new(EmailConfig::default());
        let result = service
            .send_complaint(&Complaint {
                subject: None,
                message: "Текст жалобы".to_string(),
                contact: None,
            })
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn complaint_body_includes_contact_when_present() {
        let body = render_complaint_body(&Complaint {
            subject: Some("subject".to_string()),
            message: "Текст".to_string(),
            contact: Some(" user@example.com ".to_string()),
        });
        assert!(body.contains("Текст"));
        assert!(body.contains("user@example.com"));

        let body = render_complaint_body(&Complaint {
            subject: None,
            message: "Текст".to_string(),
            contact: Some("   ".to_string()),
        });
        assert!(!body.contains("Контакт"));
    }
}
