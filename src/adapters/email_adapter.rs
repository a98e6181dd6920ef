//! SMTP email notifier.

use crate::domain::config_validation::email_enabled;
use crate::domain::error::YenesisError;
use crate::ports::config_port::ConfigPort;
use crate::ports::notifier_port::{Notification, NotifierPort};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::fs;
use std::path::Path;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

fn email_err(reason: impl ToString) -> YenesisError {
    YenesisError::Notification {
        channel: "email".into(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender: String,
    pub password: String,
    pub recipients: Vec<String>,
}

impl EmailSettings {
    /// `None` when email is disabled. The password normally comes from
    /// `YENESIS_EMAIL_PASSWORD`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Option<Self>, YenesisError> {
        if !email_enabled(config) {
            return Ok(None);
        }
        let sender = config
            .get_string("email", "sender")
            .ok_or_else(|| YenesisError::ConfigMissing {
                section: "email".into(),
                key: "sender".into(),
            })?;
        let port = config.get_int("email", "smtp_port", DEFAULT_SMTP_PORT as i64);
        let smtp_port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| YenesisError::ConfigInvalid {
                section: "email".into(),
                key: "smtp_port".into(),
                reason: format!("{} is not a valid TCP port", port),
            })?;
        Ok(Some(Self {
            smtp_host: config
                .get_string("email", "smtp_host")
                .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            smtp_port,
            password: config.get_string("email", "password").unwrap_or_default(),
            recipients: config.get_list("email", "recipients"),
            sender,
        }))
    }
}

fn content_type_for(path: &Path) -> ContentType {
    let guess = match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => "text/csv",
        Some("txt") | Some("log") => "text/plain",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    };
    ContentType::parse(guess).unwrap_or(ContentType::TEXT_PLAIN)
}

/// Plain-text body plus readable attachments. Unreadable files are logged
/// and left out.
pub fn build_message(settings: &EmailSettings, notification: &Notification) -> Result<Message, YenesisError> {
    let from: Mailbox = settings.sender.parse().map_err(email_err)?;
    let mut builder = Message::builder().from(from).subject(notification.subject.clone());
    for recipient in &settings.recipients {
        builder = builder.to(recipient.parse().map_err(email_err)?);
    }

    let mut body = MultiPart::mixed().singlepart(SinglePart::plain(notification.body.clone()));
    for path in &notification.attachments {
        match fs::read(path) {
            Ok(bytes) => {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "attachment".to_string());
                body = body.singlepart(Attachment::new(filename).body(bytes, content_type_for(path)));
            }
            Err(e) => tracing::warn!("Failed to attach {}: {}", path.display(), e),
        }
    }

    builder.multipart(body).map_err(email_err)
}

pub struct EmailAdapter {
    settings: EmailSettings,
}

impl EmailAdapter {
    pub fn new(settings: EmailSettings) -> Self {
        Self { settings }
    }

    fn transport(&self) -> Result<SmtpTransport, YenesisError> {
        let creds = Credentials::new(self.settings.sender.clone(), self.settings.password.clone());
        Ok(SmtpTransport::starttls_relay(&self.settings.smtp_host)
            .map_err(email_err)?
            .port(self.settings.smtp_port)
            .credentials(creds)
            .build())
    }
}

impl NotifierPort for EmailAdapter {
    fn send(&self, notification: &Notification) -> Result<(), YenesisError> {
        if self.settings.recipients.is_empty() {
            return Err(email_err("no recipients configured"));
        }
        let message = build_message(&self.settings, notification)?;
        self.transport()?.send(&message).map_err(email_err)?;
        tracing::info!(
            "Email '{}' sent to {}",
            notification.subject,
            self.settings.recipients.join(", ")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use std::io::Write;

    fn settings() -> EmailSettings {
        EmailSettings {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            sender: "bot@example.com".into(),
            password: "secret".into(),
            recipients: vec!["me@example.com".into(), "you@example.com".into()],
        }
    }

    #[test]
    fn disabled_without_host() {
        assert!(EmailSettings::from_config(&FileConfigAdapter::empty()).unwrap().is_none());
    }

    #[test]
    fn settings_from_config() {
        let config = FileConfigAdapter::from_string(
            "[email]\nsmtp_host = smtp.example.com\nsender = bot@example.com\nrecipients = a@x.com, b@x.com\n",
        )
        .unwrap()
        .with_overrides([("YENESIS_EMAIL_PASSWORD".to_string(), "pw".to_string())]);
        let s = EmailSettings::from_config(&config).unwrap().unwrap();
        assert_eq!(s.smtp_port, 587);
        assert_eq!(s.password, "pw");
        assert_eq!(s.recipients, vec!["a@x.com", "b@x.com"]);
    }

    #[test]
    fn out_of_range_port_rejected() {
        for port in ["65623", "0", "-25"] {
            let config = FileConfigAdapter::from_string(&format!(
                "[email]\nsmtp_host = smtp.example.com\nsender = bot@example.com\nsmtp_port = {}\n",
                port
            ))
            .unwrap();
            let err = EmailSettings::from_config(&config).unwrap_err();
            assert!(matches!(err, YenesisError::ConfigInvalid { ref key, .. } if key == "smtp_port"), "{}", port);
        }
    }

    #[test]
    fn message_with_attachment() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "ticker,score").unwrap();
        let notification = Notification::new("Daily report", "See attached")
            .with_attachment(file.path())
            .with_attachment("/nonexistent/report.csv");

        let message = build_message(&settings(), &notification).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Daily report"));
        assert!(raw.contains("me@example.com"));
        assert!(raw.contains("text/csv"));
        assert!(!raw.contains("nonexistent"));
    }

    #[test]
    fn bad_sender_is_notification_error() {
        let mut s = settings();
        s.sender = "not an address".into();
        let err = build_message(&s, &Notification::new("x", "y")).unwrap_err();
        assert!(matches!(err, YenesisError::Notification { channel, .. } if channel == "email"));
    }
}
