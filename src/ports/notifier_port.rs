//! Outbound notification port.

use crate::domain::error::YenesisError;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
    /// Markdown text for chat channels. When unset they render subject and body.
    pub chat_text: Option<String>,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            attachments: Vec::new(),
            chat_text: None,
        }
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }

    pub fn with_chat_text(mut self, text: impl Into<String>) -> Self {
        self.chat_text = Some(text.into());
        self
    }
}

pub trait NotifierPort {
    fn send(&self, notification: &Notification) -> Result<(), YenesisError>;
}
