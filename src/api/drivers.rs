//! Courier presence and the jobs of couriers

use axum::Extension;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::deliveries::Deliveries;
use crate::drivers::DriverLocation;
use crate::drivers::DriverState;
use crate::location::Point;
use crate::storage::Storage;
use crate::users::Role;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::jobs::JobResponse;

/// List the jobs assigned to the current courier
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:8080/api/drivers/me/jobs
/// ```
pub async fn my_jobs<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<JobResponse>>, Error> {
    current_user.role.is_allowed(Role::Courier)?;

    let jobs = deliveries.get_driver_jobs(current_user.id).await?;

    Ok(Success::ok(JobResponse::from_job_multiple(jobs)))
}

/// List the jobs assigned to any courier, admins only
pub async fn jobs<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(courier_id): PathParameters<i64>,
) -> Result<Success<Vec<JobResponse>>, Error> {
    current_user.role.is_allowed(Role::Admin)?;

    let jobs = deliveries.get_driver_jobs(courier_id).await?;

    Ok(Success::ok(JobResponse::from_job_multiple(jobs)))
}

#[derive(Debug, Deserialize)]
pub struct LocationForm {
    /// `latitude,longitude`
    coordinates: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    courier_id: i64,
    coordinates: String,
    updated_at: DateTime<Utc>,
}

impl LocationResponse {
    fn from_driver_location(location: DriverLocation) -> Self {
        Self {
            courier_id: location.courier_id,
            coordinates: location.coordinates,
            updated_at: location.updated_at,
        }
    }
}

/// Report the location of the current courier
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "coordinates": "51.556324,-0.080866" }' \
///     http://localhost:8080/api/drivers/location
/// ```
pub async fn location<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<LocationForm>,
) -> Result<Success<LocationResponse>, Error> {
    current_user.role.is_allowed(Role::Courier)?;

    let point = form
        .coordinates
        .parse::<Point>()
        .map_err(Error::bad_request)?;

    let location = storage
        .save_driver_location(current_user.id, &point.to_string())
        .await?;

    tracing::debug!("Courier {} is at {point}", current_user.id);

    Ok(Success::ok(LocationResponse::from_driver_location(location)))
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    active: bool,
}

/// Mark the current courier as active or inactive
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "active": true }' \
///     http://localhost:8080/api/drivers/status
/// ```
pub async fn status<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<StatusForm>,
) -> Result<Success<DriverState>, Error> {
    current_user.role.is_allowed(Role::Courier)?;

    let state = storage
        .save_driver_state(current_user.id, form.active)
        .await?;

    tracing::info!(
        "Courier {} is now {}",
        current_user.id,
        if state.active { "active" } else { "inactive" }
    );

    Ok(Success::ok(state))
}
