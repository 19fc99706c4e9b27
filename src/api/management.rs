//! Overview and dispatching for admins

use axum::Extension;
use serde::Deserialize;

use crate::deliveries::Deliveries;
use crate::drivers::DriverState;
use crate::storage::Storage;
use crate::users::Role;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::Success;
use super::jobs::JobResponse;
use super::parse_job_id;
use super::users::fetch_user;

/// List all jobs, newest first
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:8080/api/management/jobs
/// ```
pub async fn jobs<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<JobResponse>>, Error> {
    current_user.role.is_allowed(Role::Admin)?;

    let jobs = deliveries.get_all_jobs().await?;

    Ok(Success::ok(JobResponse::from_job_multiple(jobs)))
}

/// List the active flag of all couriers
pub async fn driver_states<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<DriverState>>, Error> {
    current_user.role.is_allowed(Role::Admin)?;

    let states = storage.find_all_driver_states().await?;

    Ok(Success::ok(states))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignForm {
    courier_id: i64,
}

/// Assign a job to a courier
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "courierId": 3 }' \
///     http://localhost:8080/api/management/jobs/<uuid>/assign
/// ```
pub async fn assign<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
    Form(form): Form<AssignForm>,
) -> Result<Success<JobResponse>, Error> {
    current_user.role.is_allowed(Role::Admin)?;

    let job_id = parse_job_id(&job_id)?;

    let courier = fetch_user(&storage, form.courier_id).await?;

    if !courier.is_courier() {
        return Err(Error::bad_request("User is not a courier"));
    }

    let job = deliveries.assign_worker(&job_id, courier.id).await?;

    Ok(Success::ok(JobResponse::from_job(job)))
}
