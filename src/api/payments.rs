//! Payment provider endpoints

use axum::Extension;
use axum::body::Bytes;
use axum::http::HeaderMap;
use serde::Serialize;

use crate::config::PaymentsConfig;
use crate::payments::Payments;
use crate::payments::WebhookOutcome;
use crate::storage::Storage;

use super::Error;
use super::Success;

/// Header holding the webhook signature
const SIGNATURE_HEADER: &str = "Stripe-Signature";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    publishable_key: String,
}

/// Public configuration for the payment form of clients
///
/// Response:
/// ```json
/// { "data": { "publishableKey": "pk_test_123" } }
/// ```
pub async fn config(
    Extension(payments_config): Extension<PaymentsConfig>,
) -> Success<ConfigResponse> {
    Success::ok(ConfigResponse {
        publishable_key: payments_config.publishable_key,
    })
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    received: bool,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// Receive events of the payment provider
///
/// A bad signature is rejected with `400`, failing to settle the job with `500` so the provider
/// delivers the event again. Everything else is acknowledged.
pub async fn webhook<S: Storage>(
    Extension(payments): Extension<Payments<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Success<WebhookResponse>, Error> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = payments
        .handle_webhook(&body, signature)
        .await
        .inspect_err(|err| tracing::warn!("Webhook rejected: {err}"))?;

    let response = match outcome {
        WebhookOutcome::Fulfilled(job) => {
            tracing::info!("Payment received for job {}", job.id);
            WebhookResponse {
                received: true,
                outcome: "fulfilled",
                reason: None,
            }
        }
        WebhookOutcome::Cancelled(job) => {
            tracing::info!("Payment cancelled for job {}", job.id);
            WebhookResponse {
                received: true,
                outcome: "cancelled",
                reason: None,
            }
        }
        WebhookOutcome::Ignored(reason) => WebhookResponse {
            received: true,
            outcome: "ignored",
            reason: Some(reason),
        },
    };

    Ok(Success::ok(response))
}
