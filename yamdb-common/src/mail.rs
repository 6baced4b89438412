//! Outgoing mail
//!
//! Confirmation codes are the only mail the service sends. Delivery goes
//! through the [`Mailer`] trait so the backend can be picked from
//! configuration: log it, drop it into an outbox directory, or keep it in
//! memory for tests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::config::{MailBackendKind, MailConfig};
use crate::{Error, Result};

/// A plain-text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    /// Render as an RFC 5322 style text blob
    pub fn to_rfc822(&self) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\n\r\n{}\r\n",
            self.from,
            self.to,
            self.subject,
            Utc::now().to_rfc2822(),
            self.body
        )
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<()>;
}

/// Writes every message to the log
#[derive(Debug, Default, Clone)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            "Outgoing mail:\n{}",
            message.body
        );
        Ok(())
    }
}

/// Stores each message as a `.eml` file in an outbox directory
#[derive(Debug, Clone)]
pub struct FileMailer {
    outbox: PathBuf,
}

impl FileMailer {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        Self {
            outbox: outbox.into(),
        }
    }

    pub fn outbox(&self) -> &PathBuf {
        &self.outbox
    }
}

#[async_trait]
impl Mailer for FileMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        tokio::fs::create_dir_all(&self.outbox).await?;

        let file_name = format!(
            "{}-{}.eml",
            Utc::now().format("%Y%m%d-%H%M%S"),
            Uuid::new_v4()
        );
        let path = self.outbox.join(file_name);
        tokio::fs::write(&path, message.to_rfc822()).await?;

        info!(to = %message.to, path = %path.display(), "Mail written to outbox");
        Ok(())
    }
}

/// Keeps messages in memory; clones share the same mailbox
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<MailMessage>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, oldest first
    pub fn sent(&self) -> Vec<MailMessage> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Most recent message addressed to `to`
    pub fn last_to(&self, to: &str) -> Option<MailMessage> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| Error::Mail("In-memory mailbox is poisoned".to_string()))?
            .push(message.clone());
        Ok(())
    }
}

/// Build the configured backend
///
/// `outbox_dir` is only used by the file backend.
pub fn from_config(config: &MailConfig, outbox_dir: PathBuf) -> Arc<dyn Mailer> {
    match config.backend {
        MailBackendKind::Console => Arc::new(ConsoleMailer),
        MailBackendKind::File => Arc::new(FileMailer::new(outbox_dir)),
    }
}
