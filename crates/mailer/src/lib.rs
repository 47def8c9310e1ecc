// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jobrun-mailer: the SMTP boundary.
//!
//! Jobs submit mail through a trusted relay (`localhost` by default) over
//! plain SMTP; the relay handles onward delivery, authentication, and TLS.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

/// One outgoing plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: Vec<String>,
    pub from: String,
    pub subject: String,
    pub body: String,
}

/// Errors from composing or submitting a message.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("message build error: {0}")]
    Message(String),
    #[error("smtp error: {0}")]
    Smtp(String),
}

/// Sends emails on behalf of a job run.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Relay-backed mailer using plain SMTP submission.
pub struct SmtpMailer {
    relay: String,
    port: u16,
}

impl SmtpMailer {
    /// Standard SMTP submission port for an unauthenticated local relay.
    pub const DEFAULT_PORT: u16 = 25;

    pub fn new(relay: impl Into<String>) -> Self {
        Self {
            relay: relay.into(),
            port: Self::DEFAULT_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let message = build_message(email)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.relay)
            .port(self.port)
            .build();
        transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| MailError::Smtp(e.to_string()))
    }
}

/// Build a lettre message from an [`Email`].
fn build_message(email: &Email) -> Result<Message, MailError> {
    let from: Mailbox = email
        .from
        .parse()
        .map_err(|_| MailError::InvalidAddress(email.from.clone()))?;

    let mut builder = Message::builder().from(from).subject(email.subject.clone());
    for addr in &email.to {
        let to: Mailbox = addr
            .parse()
            .map_err(|_| MailError::InvalidAddress(addr.clone()))?;
        builder = builder.to(to);
    }

    builder
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| MailError::Message(e.to_string()))
}

/// Capture-only mailer for tests: records every message, optionally failing
/// each send to exercise error paths.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeMailer {
    outbox: parking_lot::Mutex<Vec<Email>>,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeMailer {
    pub fn new() -> Self {
        Self {
            outbox: parking_lot::Mutex::new(Vec::new()),
            failing: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Make every subsequent send fail with an smtp error.
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Snapshot of every message sent so far.
    pub fn sent(&self) -> Vec<Email> {
        self.outbox.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MailError::Smtp("relay refused connection".to_string()));
        }
        self.outbox.lock().push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
