//! Email delivery for magic login links.
//!
//! Delivery is best-effort: issuance commits the token before the email goes
//! out, and a failed or timed-out send is reported as a [`Delivery`] value for
//! the caller to log rather than an error that aborts the request.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

use crate::{config::Config, errors::Error};

/// Outcome of an attempted send
#[derive(Debug)]
pub enum Delivery {
    Delivered,
    Failed(String),
}

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    send_timeout: std::time::Duration,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            crate::config::EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                // Use SMTP transport
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            crate::config::EmailTransportConfig::File { path } => {
                // Use file transport for development/testing
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                let file_transport = AsyncFileTransport::<Tokio1Executor>::new(emails_dir);
                EmailTransport::File(file_transport)
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            send_timeout: config.auth.magic_link.send_timeout,
        })
    }

    /// Send the one-time login link to `to_email`.
    ///
    /// The send is bounded by the configured timeout so a stalled SMTP
    /// connection cannot hold the issuance request open.
    pub async fn send_login_email(&self, to_email: &str, login_link: &str) -> Delivery {
        let subject = "Your sign-in link";
        let body = self.create_login_body(login_link);

        match tokio::time::timeout(self.send_timeout, self.send_email(to_email, subject, &body)).await {
            Ok(Ok(())) => Delivery::Delivered,
            Ok(Err(e)) => Delivery::Failed(format!("{e:#}")),
            Err(_) => Delivery::Failed(format!("send timed out after {:?}", self.send_timeout)),
        }
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let to = to_email.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }

    fn create_login_body(&self, login_link: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Sign in</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Sign in to the SOP library</h2>

        <p>Hello,</p>

        <p>We received a request to sign in with this email address. If you didn't make this request, you can safely ignore this email.</p>

        <p>To sign in, click the link below:</p>

        <p><a href="{login_link}">Sign in</a></p>

        <p>Or copy and paste this link into your browser:</p>
        <p>{login_link}</p>

        <p>This link can be used once and expires shortly for security reasons.</p>

        <div class="footer">
            <p>If you're having trouble with the button above, copy and paste the URL into your web browser.</p>
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;

    #[tokio::test]
    async fn test_email_service_creation() {
        let config = create_test_config();
        let email_service = EmailService::new(&config);
        assert!(email_service.is_ok());
    }

    #[tokio::test]
    async fn test_login_email_body() {
        let config = create_test_config();
        let email_service = EmailService::new(&config).unwrap();

        let body = email_service.create_login_body("https://example.com/auth/verify?token=abc123");

        assert!(body.contains("https://example.com/auth/verify?token=abc123"));
        assert!(body.contains("Sign in"));
    }

    #[tokio::test]
    async fn test_file_transport_delivery() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config();
        config.email.transport = crate::config::EmailTransportConfig::File {
            path: temp_dir.path().to_string_lossy().to_string(),
        };
        let email_service = EmailService::new(&config).unwrap();

        let delivery = email_service
            .send_login_email("user@example.com", "https://example.com/auth/verify?token=abc123")
            .await;
        assert!(matches!(delivery, Delivery::Delivered));

        // The transport wrote the message into the directory
        let written = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert!(written > 0);
    }
}
