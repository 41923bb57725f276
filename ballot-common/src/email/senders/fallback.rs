use async_trait::async_trait;

use crate::email::{EmailError, EmailMessage, SendEmail};

/// Tries an ordered list of transports until one accepts the message.
/// Each transport reports a typed outcome; a transport failure is logged
/// and the next transport in line gets the message. Only when every
/// transport has refused does the send fail, with the last error.
pub struct FallbackSender {
    transports: Vec<Box<dyn SendEmail>>,
}

impl FallbackSender {
    pub fn new(transports: Vec<Box<dyn SendEmail>>) -> Self {
        Self { transports }
    }
}

#[async_trait]
impl SendEmail for FallbackSender {
    async fn send<'a>(&self, message: EmailMessage<'a>) -> Result<(), EmailError> {
        let mut last_failure = EmailError::FailedToSend(String::from(
            "No email transports are configured",
        ));

        for (position, transport) in self.transports.iter().enumerate() {
            match transport.send(message.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::warn!("Email transport {position} failed to send: {e}");
                    last_failure = e;
                }
            }
        }

        Err(last_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use lettre::message::Mailbox;

    struct ScriptedSender {
        succeeds: bool,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SendEmail for ScriptedSender {
        async fn send<'a>(&self, _message: EmailMessage<'a>) -> Result<(), EmailError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.succeeds {
                Ok(())
            } else {
                Err(EmailError::FailedToSend(String::from("scripted failure")))
            }
        }
    }

    fn test_message() -> EmailMessage<'static> {
        let mailbox: Mailbox = "Ballot <no-reply@ballot.example>".parse().unwrap();

        EmailMessage {
            body: String::from("<html></html>"),
            subject: "Your one-time passcode",
            from: mailbox.clone(),
            reply_to: mailbox,
            destination: "admin@ballot.example",
            is_html: true,
        }
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary_calls = Arc::new(AtomicU32::new(0));
        let fallback_calls = Arc::new(AtomicU32::new(0));

        let sender = FallbackSender::new(vec![
            Box::new(ScriptedSender {
                succeeds: true,
                calls: Arc::clone(&primary_calls),
            }),
            Box::new(ScriptedSender {
                succeeds: true,
                calls: Arc::clone(&fallback_calls),
            }),
        ]);

        assert!(sender.send(test_message()).await.is_ok());
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_falls_through_in_order() {
        let primary_calls = Arc::new(AtomicU32::new(0));
        let fallback_calls = Arc::new(AtomicU32::new(0));

        let sender = FallbackSender::new(vec![
            Box::new(ScriptedSender {
                succeeds: false,
                calls: Arc::clone(&primary_calls),
            }),
            Box::new(ScriptedSender {
                succeeds: true,
                calls: Arc::clone(&fallback_calls),
            }),
        ]);

        assert!(sender.send(test_message()).await.is_ok());
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_transports_failing_fails_the_send() {
        let calls = Arc::new(AtomicU32::new(0));

        let sender = FallbackSender::new(vec![
            Box::new(ScriptedSender {
                succeeds: false,
                calls: Arc::clone(&calls),
            }),
            Box::new(ScriptedSender {
                succeeds: false,
                calls: Arc::clone(&calls),
            }),
        ]);

        assert!(sender.send(test_message()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_transport_list_fails() {
        let sender = FallbackSender::new(Vec::new());

        assert!(sender.send(test_message()).await.is_err());
    }
}
