use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use crate::email::{EmailError, EmailMessage, SendEmail};

pub struct SmtpSender {
    smtp_thread_pool: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpSender {
    pub fn with_credentials(
        smtp_username: &str,
        smtp_key: &str,
        smtp_address: &str,
        max_connections: u32,
        idle_timeout: Duration,
    ) -> Result<Self, EmailError> {
        let smtp_thread_pool = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_address)
            .map_err(|e| EmailError::RelayConnectionFailed(e.to_string()))?
            .credentials(Credentials::new(
                String::from(smtp_username),
                String::from(smtp_key),
            ))
            .pool_config(
                PoolConfig::new()
                    .max_size(max_connections)
                    .idle_timeout(idle_timeout),
            )
            .build();

        Ok(Self { smtp_thread_pool })
    }

    pub async fn test_connection(&self) -> Result<bool, EmailError> {
        self.smtp_thread_pool
            .test_connection()
            .await
            .map_err(|e| EmailError::RelayConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl SendEmail for SmtpSender {
    async fn send<'a>(&self, message: EmailMessage<'a>) -> Result<(), EmailError> {
        let destination = message
            .destination
            .parse()
            .map_err(|_| EmailError::InvalidDestination(String::from(message.destination)))?;

        let content_type = if message.is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        let email = Message::builder()
            .from(message.from)
            .reply_to(message.reply_to)
            .to(destination)
            .subject(message.subject)
            .header(content_type)
            .body(message.body)
            .map_err(|e| EmailError::FailedToSend(e.to_string()))?;

        self.smtp_thread_pool
            .send(email)
            .await
            .map_err(|e| EmailError::FailedToSend(e.to_string()))?;

        Ok(())
    }
}
