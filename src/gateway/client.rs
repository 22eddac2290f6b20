use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::{
    AccessToken, CheckoutSession, CreatePaymentRequest, ExecutionResult, GatewayError,
    GatewayResult, PaymentGateway,
};

const TOKEN_PATH: &str = "/tokenized/checkout/token/grant";
const CREATE_PATH: &str = "/tokenized/checkout/create";
const EXECUTE_PATH: &str = "/tokenized/checkout/execute";
const CHECKOUT_MODE: &str = "0011";
const CURRENCY: &str = "BDT";
const INTENT_SALE: &str = "sale";
const SUCCESS_STATUS_CODE: &str = "0000";

/// Credentials and endpoint for the wallet provider.
#[derive(Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub app_key: String,
    pub app_secret: String,
    pub merchant_number: String,
    pub timeout: Duration,
}

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

/// HTTP client for the wallet provider's tokenized checkout API.
#[derive(Clone)]
pub struct WalletGatewayClient {
    client: Client,
    config: GatewayConfig,
    circuit_breaker: Breaker,
}

impl WalletGatewayClient {
    /// Creates a client whose every call is bounded by `config.timeout`.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        Self::with_circuit_breaker(config, 5, 30)
    }

    /// Creates a client with custom circuit breaker configuration
    pub fn with_circuit_breaker(
        config: GatewayConfig,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> GatewayResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Ok(WalletGatewayClient {
            client,
            config,
            circuit_breaker,
        })
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized_headers(&self, token: &AccessToken) -> GatewayResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::AUTHORIZATION, header_value(token.as_str())?);
        headers.insert(
            HeaderName::from_static("x-app-key"),
            header_value(&self.config.app_key)?,
        );
        Ok(headers)
    }

    /// POSTs JSON through the circuit breaker. Non-2xx statuses become the
    /// error produced by `on_status`.
    async fn post_json(
        &self,
        path: &str,
        headers: HeaderMap,
        body: Value,
        on_status: fn(String) -> GatewayError,
    ) -> GatewayResult<Value> {
        let url = self.endpoint(path);
        let client = self.client.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).headers(headers).json(&body).send().await?;

                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(on_status(format!("HTTP {}: {}", status.as_u16(), text)));
                }

                Ok::<Value, GatewayError>(response.json::<Value>().await?)
            })
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen(
                "payment gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

fn header_value(value: &str) -> GatewayResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| GatewayError::Auth("credential contains invalid header characters".to_string()))
}

fn string_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn provider_message(raw: &Value) -> String {
    string_field(raw, "statusMessage")
        .or_else(|| string_field(raw, "errorMessage"))
        .unwrap_or("no message")
        .to_string()
}

/// The provider reports completion either through `transactionStatus` or
/// through the generic success status code.
pub fn is_completed(raw: &Value) -> bool {
    let status_completed = string_field(raw, "transactionStatus")
        .map(|status| status.eq_ignore_ascii_case("completed"))
        .unwrap_or(false);

    status_completed || string_field(raw, "statusCode") == Some(SUCCESS_STATUS_CODE)
}

#[async_trait]
impl PaymentGateway for WalletGatewayClient {
    async fn acquire_token(&self) -> GatewayResult<AccessToken> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("username"),
            header_value(&self.config.username)?,
        );
        headers.insert(
            HeaderName::from_static("password"),
            header_value(&self.config.password)?,
        );

        let body = json!({
            "app_key": self.config.app_key,
            "app_secret": self.config.app_secret,
        });

        let raw = self
            .post_json(TOKEN_PATH, headers, body, GatewayError::Auth)
            .await?;

        string_field(&raw, "id_token")
            .map(AccessToken::new)
            .ok_or_else(|| GatewayError::Auth(provider_message(&raw)))
    }

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
        token: &AccessToken,
    ) -> GatewayResult<CheckoutSession> {
        let body = json!({
            "mode": CHECKOUT_MODE,
            "payerReference": self.config.merchant_number,
            "callbackURL": request.callback_url,
            "amount": request.amount.with_scale(2).to_string(),
            "currency": CURRENCY,
            "intent": INTENT_SALE,
            "merchantInvoiceNumber": request.invoice,
        });

        let raw = self
            .post_json(
                CREATE_PATH,
                self.authorized_headers(token)?,
                body,
                GatewayError::Request,
            )
            .await?;

        let redirect_url = string_field(&raw, "bkashURL")
            .or_else(|| string_field(&raw, "redirectURL"))
            .map(str::to_string);
        let payment_reference = string_field(&raw, "paymentID").map(str::to_string);

        match (redirect_url, payment_reference) {
            (Some(redirect_url), Some(payment_reference)) => Ok(CheckoutSession {
                redirect_url,
                payment_reference,
                raw,
            }),
            _ => Err(GatewayError::Request(format!(
                "no usable redirect URL for invoice {}: {}",
                request.invoice,
                provider_message(&raw)
            ))),
        }
    }

    async fn execute_payment(
        &self,
        payment_reference: &str,
        token: &AccessToken,
    ) -> GatewayResult<ExecutionResult> {
        let raw = self
            .post_json(
                EXECUTE_PATH,
                self.authorized_headers(token)?,
                json!({ "paymentID": payment_reference }),
                GatewayError::Request,
            )
            .await?;

        Ok(ExecutionResult {
            completed: is_completed(&raw),
            transaction_id: string_field(&raw, "trxID").map(str::to_string),
            raw,
        })
    }
}
