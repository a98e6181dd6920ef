//! Fan-out over every configured notification channel.

use crate::adapters::email_adapter::{EmailAdapter, EmailSettings};
use crate::adapters::telegram_adapter::TelegramAdapter;
use crate::domain::error::YenesisError;
use crate::ports::config_port::ConfigPort;
use crate::ports::notifier_port::{Notification, NotifierPort};

#[derive(Default)]
pub struct MultiNotifier {
    channels: Vec<Box<dyn NotifierPort>>,
}

impl MultiNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: Box<dyn NotifierPort>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Email and Telegram, each only when enabled.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, YenesisError> {
        let mut notifier = Self::new();
        if let Some(settings) = EmailSettings::from_config(config)? {
            notifier = notifier.with_channel(Box::new(EmailAdapter::new(settings)));
        }
        if let Some(telegram) = TelegramAdapter::from_config(config)? {
            notifier = notifier.with_channel(Box::new(telegram));
        }
        if notifier.is_empty() {
            tracing::info!("No notification channels enabled");
        }
        Ok(notifier)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl NotifierPort for MultiNotifier {
    /// Every channel is attempted; the first failure is returned after all
    /// have run.
    fn send(&self, notification: &Notification) -> Result<(), YenesisError> {
        let mut first_err = None;
        for channel in &self.channels {
            if let Err(e) = channel.send(notification) {
                tracing::error!("Notification '{}' failed: {}", notification.subject, e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
