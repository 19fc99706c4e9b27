//! The root!
//!
//! Public pages outside of the API: a greeting and the tracking page of a job

use axum::Extension;
use serde::Serialize;

use crate::api::Error;
use crate::api::PathParameters;
use crate::api::Success;
use crate::deliveries::Deliveries;
use crate::storage::Storage;

/// The greeting
pub async fn root() -> &'static str {
    "Portal Deliveries"
}

/// Public progress of a job
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingResponse {
    short_id: String,
    status: &'static str,
    order_status: &'static str,
}

/// Track a job by its short ID, no account needed
///
/// Request:
/// ```sh
/// curl -v http://localhost:8080/track/AMBP1DDI
/// ```
///
/// Response:
/// ```json
/// { "data": { "shortId": "AMBP1DDI", "status": "Parcel collected", "orderStatus": "closed" } }
/// ```
pub async fn track<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    PathParameters(short_id): PathParameters<String>,
) -> Result<Success<TrackingResponse>, Error> {
    tracing::debug!("Tracking job {short_id}");

    let job = deliveries.get_job_by_short_id(&short_id).await?;

    Ok(Success::ok(TrackingResponse {
        short_id: job.short_id,
        status: job.status.label(),
        order_status: job.order_status.label(),
    }))
}
