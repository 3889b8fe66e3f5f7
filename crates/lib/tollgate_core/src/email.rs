//! Outbound email abstraction.
//!
//! The lifecycle service only needs "send this body to this address and
//! report success or failure". Transport details belong to the `EmailSender`
//! implementation. The default sender logs the envelope instead of
//! delivering. Bodies carry live tokens and are never logged.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// Message carrying the sign-up confirmation link.
    pub fn confirmation(to: &str, link_base: &str, token: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Confirm your email".to_string(),
            body: format!("Confirm your email address: {link_base}{token}"),
        }
    }

    /// Message carrying the password reset link.
    pub fn password_reset(to: &str, link_base: &str, token: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            body: format!("Reset your password: {link_base}{token}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

/// Email delivery capability.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or report why it could not be delivered.
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Sender that logs recipient and subject instead of delivering.
#[derive(Clone, Debug, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        info!(to = %message.to, subject = %message.subject, "email send stub");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::subscriber::DefaultGuard;

    use super::*;

    /// Log output captured from a thread-local subscriber.
    #[derive(Clone, Default)]
    pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        /// Capture every event on this thread, down to `trace`, until the
        /// guard drops.
        pub(crate) fn install() -> (Self, DefaultGuard) {
            let logs = Self::default();
            let writer = logs.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(tracing::Level::TRACE)
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .finish();
            let guard = tracing::subscriber::set_default(subscriber);
            (logs, guard)
        }

        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn confirmation_embeds_link() {
        let msg = EmailMessage::confirmation("ann@example.com", "https://app/verify/", "tok123");
        assert_eq!(msg.to, "ann@example.com");
        assert!(msg.body.contains("https://app/verify/tok123"));
    }

    #[test]
    fn reset_embeds_link() {
        let msg = EmailMessage::password_reset("ann@example.com", "https://app/reset/", "tok456");
        assert!(msg.body.ends_with("https://app/reset/tok456"));
    }

    #[tokio::test]
    async fn log_sender_keeps_token_out_of_logs() {
        let (logs, _guard) = CapturedLogs::install();
        let msg = EmailMessage::password_reset("ann@example.com", "https://app/reset/", "tok-9f3a7c");
        assert!(LogEmailSender.send(&msg).await.is_ok());

        let out = logs.contents();
        assert!(out.contains("ann@example.com"));
        assert!(out.contains("Reset your password"));
        assert!(!out.contains("tok-9f3a7c"));
    }
}
