//! Payment Gateway Adapter.
//!
//! The rest of the crate talks to the mobile wallet provider only through
//! [`PaymentGateway`], so neither the booking flow nor reconciliation ever
//! sees the provider's wire format.

pub mod client;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::fmt;
use thiserror::Error;

pub use client::{GatewayConfig, WalletGatewayClient};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway authentication failed: {0}")]
    Auth(String),
    #[error("Gateway rejected request: {0}")]
    Request(String),
    #[error("Gateway call timed out")]
    Timeout,
    #[error("Circuit breaker open: {0}")]
    CircuitOpen(String),
    #[error("HTTP request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Invalid response from gateway: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::Transport(err)
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Short-lived bearer credential. Debug output never shows the token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(****)")
    }
}

#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub amount: BigDecimal,
    pub invoice: String,
    pub callback_url: String,
}

/// Hosted checkout session returned by `create_payment`.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub redirect_url: String,
    pub payment_reference: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub completed: bool,
    pub transaction_id: Option<String>,
    pub raw: serde_json::Value,
}

/// Token, create and execute operations of the provider's checkout protocol.
///
/// Implementations make a single attempt per call; retry policy belongs to
/// callers (and this service has none).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn acquire_token(&self) -> GatewayResult<AccessToken>;

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
        token: &AccessToken,
    ) -> GatewayResult<CheckoutSession>;

    async fn execute_payment(
        &self,
        payment_reference: &str,
        token: &AccessToken,
    ) -> GatewayResult<ExecutionResult>;
}
