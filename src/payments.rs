//! Payments: intents tied to a job, and the webhook that settles the job afterwards
//!
//! Webhook deliveries can be duplicated, reordered or retried. Settling a job is idempotent, so
//! all of that is harmless.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hmac::Hmac;
use hmac::Mac;
use reqwest::Client;
use serde::Deserialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::PaymentsConfig;
use crate::deliveries;
use crate::deliveries::Deliveries;
use crate::jobs::Job;
use crate::jobs::OrderStatus;
use crate::storage::Storage;

/// Maximum age of a signed webhook, in seconds
pub const SIGNATURE_TOLERANCE: i64 = 300;

/// Metadata key holding the job ID on an intent
const ORDER_ID: &str = "order_id";

type HmacSha256 = Hmac<Sha256>;

/// Failures talking to the payment provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Payment provider unreachable: {0}")]
    Request(String),

    #[error("Payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Payment errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid job ID `{0}`")]
    InvalidJobId(String),

    #[error("Job is {0} and can not be paid")]
    JobNotPayable(&'static str),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Invalid signature: {0}")]
    InvalidSignature(&'static str),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Settling the job failed, the provider should deliver the event again
    #[error("Could not settle job: {0}")]
    Transition(#[source] deliveries::Error),

    #[error(transparent)]
    Deliveries(#[from] deliveries::Error),
}

/// Result type for payment operations
pub type Result<T> = core::result::Result<T, Error>;

/// Values to request a payment intent
pub struct IntentRequest<'a> {
    pub job_id: &'a Uuid,
    pub amount: i64,
    pub currency: &'a str,

    /// Same request, same key, the provider returns the existing intent
    pub idempotency_key: &'a str,
}

/// A created payment intent
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Creates payment intents at a payment provider
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_payment_intent(
        &self,
        request: &IntentRequest<'_>,
    ) -> core::result::Result<PaymentIntent, ProviderError>;
}

/// Stripe, talked to over its form encoded REST API
pub struct Stripe {
    client: Client,
    api_base: Url,
    secret_key: String,
}

#[derive(Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Deserialize)]
struct StripeError {
    #[serde(default)]
    message: String,
}

impl Stripe {
    /// Create the client from configuration
    ///
    /// # Errors
    ///
    /// Will return `Err` when the HTTP client can not be built
    pub fn new(config: &PaymentsConfig) -> core::result::Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentProvider for Stripe {
    async fn create_payment_intent(
        &self,
        request: &IntentRequest<'_>,
    ) -> core::result::Result<PaymentIntent, ProviderError> {
        let url = self
            .api_base
            .join("v1/payment_intents")
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        let job_id = request.job_id.to_string();
        let amount = request.amount.to_string();

        let form = [
            ("amount", amount.as_str()),
            ("currency", request.currency),
            ("automatic_payment_methods[enabled]", "true"),
            ("metadata[order_id]", job_id.as_str()),
        ];

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", request.idempotency_key)
            .form(&form)
            .send()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<StripeErrorResponse>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_default();

            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<PaymentIntent>()
            .await
            .map_err(|err| ProviderError::Request(format!("Unreadable response: {err}")))
    }
}

/// What a webhook event did
#[derive(Debug)]
pub enum WebhookOutcome {
    /// Payment succeeded, the job is closed
    Fulfilled(Job),

    /// Payment was cancelled, and so is the job
    Cancelled(Job),

    /// Nothing to do, with the reason
    Ignored(String),
}

#[derive(Deserialize)]
struct Event {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Deserialize)]
struct EventObject {
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Payment reconciliation
#[derive(Clone)]
pub struct Payments<S: Storage> {
    deliveries: Deliveries<S>,
    provider: Arc<dyn PaymentProvider>,
    webhook_secret: String,
}

impl<S: Storage> Payments<S> {
    pub fn new(
        deliveries: Deliveries<S>,
        provider: Arc<dyn PaymentProvider>,
        webhook_secret: String,
    ) -> Self {
        Self {
            deliveries,
            provider,
            webhook_secret,
        }
    }

    /// Create a payment intent for an open job, returns the client secret
    pub async fn create_payment_intent(
        &self,
        job_id: &str,
        amount: i64,
        currency: &str,
    ) -> Result<String> {
        let id = Uuid::parse_str(job_id).map_err(|_| Error::InvalidJobId(job_id.to_string()))?;

        let job = self.deliveries.get_job(&id).await?;

        if job.order_status != OrderStatus::Open {
            return Err(Error::JobNotPayable(job.order_status.label()));
        }

        let idempotency_key = idempotency_key(&id, amount, currency);

        let intent = self
            .provider
            .create_payment_intent(&IntentRequest {
                job_id: &id,
                amount,
                currency,
                idempotency_key: &idempotency_key,
            })
            .await
            .inspect_err(|err| tracing::error!("Could not create payment intent for job {id}: {err}"))?;

        tracing::info!("Created payment intent {} for job {id}", intent.id);

        Ok(intent.client_secret)
    }

    /// Verify and apply a webhook event
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome> {
        let header = signature_header.ok_or(Error::InvalidSignature("missing header"))?;

        verify_signature(
            payload,
            header,
            &self.webhook_secret,
            Utc::now().timestamp(),
        )?;

        let event = serde_json::from_slice::<Event>(payload)
            .map_err(|err| Error::InvalidPayload(err.to_string()))?;

        let new_status = match event.kind.as_str() {
            "payment_intent.succeeded" => OrderStatus::Closed,
            "payment_intent.canceled" => OrderStatus::Cancelled,
            kind => {
                tracing::debug!("Ignoring webhook event `{kind}`");
                return Ok(WebhookOutcome::Ignored(format!("unhandled event `{kind}`")));
            }
        };

        let data = serde_json::from_value::<EventData>(event.data)
            .map_err(|err| Error::InvalidPayload(err.to_string()))?;

        let Some(order_id) = data.object.metadata.get(ORDER_ID) else {
            tracing::warn!("Webhook event `{}` without an order ID", event.kind);
            return Ok(WebhookOutcome::Ignored(String::from("missing order ID")));
        };

        let Ok(job_id) = Uuid::parse_str(order_id) else {
            tracing::warn!("Webhook event `{}` with invalid order ID `{order_id}`", event.kind);
            return Ok(WebhookOutcome::Ignored(format!("invalid order ID `{order_id}`")));
        };

        match self.deliveries.update_job_order_status(&job_id, new_status).await {
            Ok(job) if new_status == OrderStatus::Closed => Ok(WebhookOutcome::Fulfilled(job)),
            Ok(job) => Ok(WebhookOutcome::Cancelled(job)),
            Err(deliveries::Error::NotFound) => {
                tracing::warn!("Webhook event `{}` for unknown job {job_id}", event.kind);
                Ok(WebhookOutcome::Ignored(format!("unknown job {job_id}")))
            }
            Err(err) => {
                tracing::error!("Could not settle job {job_id} after `{}`: {err}", event.kind);
                Err(Error::Transition(err))
            }
        }
    }
}

/// Deterministic key for an intent request
pub fn idempotency_key(job_id: &Uuid, amount: i64, currency: &str) -> String {
    let digest = Sha256::digest(format!("{job_id}:{amount}:{currency}"));

    format!("payment-intent-{}", hex::encode(digest))
}

/// Check a `t=<timestamp>,v1=<hex>` signature header
///
/// The signature is an HMAC-SHA256 over `<timestamp>.<payload>`. Any of multiple `v1` entries may
/// match.
///
/// # Errors
///
/// Will return `Err(Error::InvalidSignature)` when the header is malformed, too old, or no
/// signature matches
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => {
                if let Ok(signature) = hex::decode(value) {
                    signatures.push(signature);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(Error::InvalidSignature("missing timestamp"))?;

    if signatures.is_empty() {
        return Err(Error::InvalidSignature("missing signature"));
    }

    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE.unsigned_abs() {
        return Err(Error::InvalidSignature("timestamp outside of tolerance"));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::InvalidSignature("unusable secret"))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    // constant time comparison
    if signatures
        .iter()
        .any(|signature| mac.clone().verify_slice(signature).is_ok())
    {
        Ok(())
    } else {
        Err(Error::InvalidSignature("no matching signature"))
    }
}

/// Build a signature header the way the provider does
#[cfg(test)]
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
