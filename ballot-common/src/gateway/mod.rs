use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::threadrand::SecureRng;

pub const REFERENCE_LENGTH: usize = 20;

/// Generates the idempotency key shared between a local payment record
/// and the gateway's transaction.
pub fn generate_reference() -> String {
    SecureRng
        .sample_iter(&Alphanumeric)
        .take(REFERENCE_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Debug)]
pub enum GatewayError {
    Unreachable(String),
    Rejected(String),
    InvalidResponse(String),
}

impl std::error::Error for GatewayError {}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Unreachable(e) => {
                write!(f, "GatewayError: Gateway unreachable: {e}")
            }
            GatewayError::Rejected(e) => write!(f, "GatewayError: Request rejected: {e}"),
            GatewayError::InvalidResponse(e) => {
                write!(f, "GatewayError: Invalid response: {e}")
            }
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() {
            GatewayError::Unreachable(error.to_string())
        } else {
            GatewayError::InvalidResponse(error.to_string())
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    Success,
    Failed,
    Abandoned,
    Pending,
}

impl TransactionStatus {
    fn from_gateway(status: &str) -> Self {
        match status {
            "success" => TransactionStatus::Success,
            "failed" => TransactionStatus::Failed,
            "abandoned" => TransactionStatus::Abandoned,
            _ => TransactionStatus::Pending,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == TransactionStatus::Success
    }
}

#[derive(Clone, Debug)]
pub struct CheckoutSession {
    pub authorization_url: String,
    pub reference: String,
}

#[derive(Clone, Debug)]
pub struct VerifiedTransaction {
    pub status: TransactionStatus,
    pub amount: i64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize_transaction(
        &self,
        reference: &str,
        amount: i64,
        email: &str,
    ) -> Result<CheckoutSession, GatewayError>;

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, GatewayError>;
}

pub type GatewayClient = Arc<Box<dyn PaymentGateway>>;

#[derive(Serialize)]
struct InitializeTransactionBody<'a> {
    reference: &'a str,
    amount: i64,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
}

#[derive(Deserialize)]
struct GatewayResponse<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Deserialize)]
struct InitializeTransactionData {
    authorization_url: String,
    reference: String,
}

#[derive(Deserialize)]
struct VerifyTransactionData {
    status: String,
    amount: i64,
}

/// Client for the Paystack REST API. Every request carries a bounded
/// timeout; an unresponsive gateway surfaces as `GatewayError::Unreachable`
/// rather than a hung request.
pub struct PaystackClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    callback_url: Option<String>,
}

impl PaystackClient {
    pub fn new(
        base_url: &str,
        secret_key: &str,
        callback_url: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: String::from(base_url.trim_end_matches('/')),
            secret_key: String::from(secret_key),
            callback_url,
        })
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize_transaction(
        &self,
        reference: &str,
        amount: i64,
        email: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        let body = InitializeTransactionBody {
            reference,
            amount,
            email,
            callback_url: self.callback_url.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "Gateway returned {}",
                response.status(),
            )));
        }

        let response = response
            .json::<GatewayResponse<InitializeTransactionData>>()
            .await?;

        if !response.status {
            return Err(GatewayError::Rejected(response.message));
        }

        let data = response
            .data
            .ok_or_else(|| GatewayError::InvalidResponse(String::from("Response had no data")))?;

        Ok(CheckoutSession {
            authorization_url: data.authorization_url,
            reference: data.reference,
        })
    }

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, GatewayError> {
        let response = self
            .client
            .get(format!(
                "{}/transaction/verify/{}",
                self.base_url, reference,
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "Gateway returned {}",
                response.status(),
            )));
        }

        let response = response
            .json::<GatewayResponse<VerifyTransactionData>>()
            .await?;

        if !response.status {
            return Err(GatewayError::Rejected(response.message));
        }

        let data = response
            .data
            .ok_or_else(|| GatewayError::InvalidResponse(String::from("Response had no data")))?;

        Ok(VerifiedTransaction {
            status: TransactionStatus::from_gateway(&data.status),
            amount: data.amount,
        })
    }
}

/// Gateway double used when payments are disabled (local development)
/// and in tests. Remembers every initialized reference and reports each
/// one as successfully charged, as many times as it is asked.
#[derive(Default)]
pub struct MockGateway {
    transactions: Mutex<HashMap<String, i64>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initialize_transaction(
        &self,
        reference: &str,
        amount: i64,
        _email: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        self.transactions
            .lock()
            .expect("Mock gateway lock was poisoned")
            .insert(String::from(reference), amount);

        Ok(CheckoutSession {
            authorization_url: format!("https://checkout.invalid/{reference}"),
            reference: String::from(reference),
        })
    }

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, GatewayError> {
        let amount = self
            .transactions
            .lock()
            .expect("Mock gateway lock was poisoned")
            .get(reference)
            .copied();

        match amount {
            Some(amount) => Ok(VerifiedTransaction {
                status: TransactionStatus::Success,
                amount,
            }),
            None => Err(GatewayError::Rejected(String::from(
                "No transaction with that reference",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_reference() {
        let reference = generate_reference();

        assert_eq!(reference.len(), REFERENCE_LENGTH);
        assert!(reference.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(reference, generate_reference());
    }

    #[test]
    fn test_transaction_status_parsing() {
        assert_eq!(
            TransactionStatus::from_gateway("success"),
            TransactionStatus::Success,
        );
        assert_eq!(
            TransactionStatus::from_gateway("failed"),
            TransactionStatus::Failed,
        );
        assert_eq!(
            TransactionStatus::from_gateway("abandoned"),
            TransactionStatus::Abandoned,
        );
        assert_eq!(
            TransactionStatus::from_gateway("ongoing"),
            TransactionStatus::Pending,
        );
        assert!(TransactionStatus::Success.is_success());
        assert!(!TransactionStatus::Abandoned.is_success());
    }

    #[tokio::test]
    async fn test_mock_gateway_repeated_verification_is_stable() {
        let gateway = MockGateway::new();
        let reference = generate_reference();

        gateway
            .initialize_transaction(&reference, 500, "voter@example.com")
            .await
            .unwrap();

        // A webhook and a client poll may both verify the same reference;
        // the gateway's answer must not change between them
        let first = gateway.verify_transaction(&reference).await.unwrap();
        let second = gateway.verify_transaction(&reference).await.unwrap();

        assert_eq!(first.status, TransactionStatus::Success);
        assert_eq!(second.status, TransactionStatus::Success);
        assert_eq!(first.amount, 500);
        assert_eq!(second.amount, 500);
    }

    #[tokio::test]
    async fn test_mock_gateway_rejects_unknown_reference() {
        let gateway = MockGateway::new();

        assert!(gateway.verify_transaction("missing").await.is_err());
    }
}
