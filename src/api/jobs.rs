//! Job API management

use axum::Extension;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::config::PaymentsConfig;
use crate::deliveries::Deliveries;
use crate::deliveries::NewJob;
use crate::jobs::Address;
use crate::jobs::DeliveryStatus;
use crate::jobs::Job;
use crate::jobs::OrderStatus;
use crate::payments::Payments;
use crate::storage::Storage;
use crate::users::Role;
use crate::users::User;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::PathParameters;
use super::QueryParameters;
use super::Success;
use super::parse_job_id;

/// The job response information
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: Uuid,
    pub short_id: String,
    pub tracking_url: String,
    pub creator: i64,
    pub worker: Option<i64>,
    pub status: DeliveryStatus,
    pub status_label: &'static str,
    pub order_status: OrderStatus,
    pub order_status_label: &'static str,
    pub origin: Address,
    pub destination: Address,
    pub worker_notes: String,
    pub created_at: DateTime<Utc>,
    pub last_time_modified: DateTime<Utc>,
}

impl JobResponse {
    /// Create a job response from a [`Job`](Job)
    pub fn from_job(job: Job) -> Self {
        Self {
            id: job.id,
            short_id: job.short_id,
            tracking_url: job.tracking_url,
            creator: job.creator,
            worker: job.worker,
            status: job.status,
            status_label: job.status.label(),
            order_status: job.order_status,
            order_status_label: job.order_status.label(),
            origin: job.origin,
            destination: job.destination,
            worker_notes: job.worker_notes,
            created_at: job.created_at,
            last_time_modified: job.last_time_modified,
        }
    }

    /// Create job responses from multiple [`Job`](Job)s
    pub fn from_job_multiple(jobs: Vec<Job>) -> Vec<Self> {
        jobs.into_iter().map(Self::from_job).collect()
    }
}

/// Create job form
///
/// Statuses are not part of it, anything extra in the body is ignored
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobForm {
    origin: Address,
    destination: Address,
}

/// Request a delivery
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "origin": { "firstName": "Ada", "firstLineAddress": "1 High Street", "city": "London", "postcode": "E14 9ED" },
///           "destination": { "firstName": "Bob", "firstLineAddress": "2 Low Road", "city": "London", "postcode": "N16 8RP" } }' \
///     http://localhost:8080/api/jobs
/// ```
///
/// Response
/// ```json
/// { "data": { "id": "<uuid>", "shortId": "AMBP1DDI", "status": "pending", "orderStatus": "open", ... } }
/// ```
pub async fn create<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    Form(form): Form<CreateJobForm>,
) -> Result<Success<JobResponse>, Error> {
    current_user.role.is_allowed(Role::Customer)?;

    let job = deliveries
        .create_job(&NewJob {
            creator: current_user.id,
            origin: &form.origin,
            destination: &form.destination,
        })
        .await?;

    Ok(Success::created(JobResponse::from_job(job)))
}

/// List the jobs requested by the current user
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:8080/api/jobs
/// ```
pub async fn list<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
) -> Result<Success<Vec<JobResponse>>, Error> {
    let jobs = deliveries.get_user_jobs(current_user.id).await?;

    Ok(Success::ok(JobResponse::from_job_multiple(jobs)))
}

/// Get a single job
///
/// Visible to admins, the user that requested it, and couriers
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:8080/api/jobs/<uuid>
/// ```
pub async fn single<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
) -> Result<Success<JobResponse>, Error> {
    let job = fetch_visible_job(&deliveries, &current_user, &job_id).await?;

    Ok(Success::ok(JobResponse::from_job(job)))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: &'static str,
}

/// Get the delivery status label of a job
///
/// Response:
/// ```json
/// { "data": { "status": "On route to pick up location" } }
/// ```
pub async fn status<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
) -> Result<Success<StatusResponse>, Error> {
    let job = fetch_visible_job(&deliveries, &current_user, &job_id).await?;

    let status = deliveries.get_job_status(&job.id).await?;

    Ok(Success::ok(StatusResponse { status }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusResponse {
    order_status: &'static str,
}

/// Get the order status label of a job
///
/// Response:
/// ```json
/// { "data": { "orderStatus": "open" } }
/// ```
pub async fn order_status<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
) -> Result<Success<OrderStatusResponse>, Error> {
    let job = fetch_visible_job(&deliveries, &current_user, &job_id).await?;

    let order_status = deliveries.get_job_order_status(&job.id).await?;

    Ok(Success::ok(OrderStatusResponse { order_status }))
}

/// Contact details of the courier on a job
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverResponse {
    driver_id: i64,
    name: String,
    email: String,
    phone_number: String,
}

/// Get the courier assigned to a job
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:8080/api/jobs/<uuid>/driver
/// ```
///
/// Response:
/// ```json
/// { "data": { "driverId": 3, "name": "Carl", "email": "carl@example.com", "phoneNumber": "07700900003" } }
/// ```
pub async fn driver<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
) -> Result<Success<DriverResponse>, Error> {
    let job = fetch_visible_job(&deliveries, &current_user, &job_id).await?;

    let worker = job
        .worker
        .ok_or_else(|| Error::not_found("No courier assigned"))?;

    let courier = storage
        .find_single_user_by_id(worker)
        .await?
        .ok_or_else(|| Error::not_found("Courier not found"))?;

    Ok(Success::ok(DriverResponse {
        driver_id: courier.id,
        name: courier.name,
        email: courier.email,
        phone_number: courier.phone_number,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaQuery {
    driver_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EtaResponse {
    seconds: i64,
}

/// Estimate how long the courier needs to reach the current target of the job
///
/// The courier is the `driverId` query parameter, the assigned courier, or the current user when
/// that is a courier, in that order
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:8080/api/jobs/<uuid>/eta?driverId=3
/// ```
///
/// Response:
/// ```json
/// { "data": { "seconds": 1200 } }
/// ```
pub async fn eta<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
    QueryParameters(query): QueryParameters<EtaQuery>,
) -> Result<Success<EtaResponse>, Error> {
    let job = fetch_visible_job(&deliveries, &current_user, &job_id).await?;

    let driver_id = query
        .driver_id
        .or(job.worker)
        .or_else(|| current_user.is_courier().then_some(current_user.id))
        .ok_or_else(|| Error::bad_request("No courier to estimate for"))?;

    let seconds = deliveries
        .get_estimated_job_journey_duration(&job.id, driver_id)
        .await?;

    Ok(Success::ok(EtaResponse { seconds }))
}

/// Close a job manually, admins and the user that requested it
///
/// Closing a closed job again is fine
///
/// Request:
/// ```sh
/// curl -v -XPOST -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:8080/api/jobs/<uuid>/close
/// ```
pub async fn close<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
) -> Result<Success<JobResponse>, Error> {
    update_order_status(&deliveries, &current_user, &job_id, OrderStatus::Closed).await
}

/// Cancel a job, admins and the user that requested it
pub async fn cancel<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
) -> Result<Success<JobResponse>, Error> {
    update_order_status(&deliveries, &current_user, &job_id, OrderStatus::Cancelled).await
}

async fn update_order_status<S: Storage>(
    deliveries: &Deliveries<S>,
    current_user: &User,
    job_id: &str,
    new: OrderStatus,
) -> Result<Success<JobResponse>, Error> {
    let job = fetch_owned_job(deliveries, current_user, job_id).await?;

    let job = deliveries.update_job_order_status(&job.id, new).await?;

    Ok(Success::ok(JobResponse::from_job(job)))
}

/// Courier is on the way to the pickup address
///
/// The first courier to move an unassigned job claims it
///
/// Request:
/// ```sh
/// curl -v -XPOST -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:8080/api/jobs/<uuid>/on-route-to-pick-up
/// ```
pub async fn on_route_to_pick_up<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
) -> Result<Success<JobResponse>, Error> {
    progress(&deliveries, &current_user, &job_id, DeliveryStatus::EnRouteToPickup).await
}

/// Courier has the parcel
pub async fn parcel_collected<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
) -> Result<Success<JobResponse>, Error> {
    progress(&deliveries, &current_user, &job_id, DeliveryStatus::ParcelCollected).await
}

/// Courier is on the way to the drop-off address
pub async fn on_route_to_drop_off<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
) -> Result<Success<JobResponse>, Error> {
    progress(&deliveries, &current_user, &job_id, DeliveryStatus::EnRouteToDropoff).await
}

/// Parcel is delivered
pub async fn complete<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
) -> Result<Success<JobResponse>, Error> {
    progress(&deliveries, &current_user, &job_id, DeliveryStatus::Complete).await
}

async fn progress<S: Storage>(
    deliveries: &Deliveries<S>,
    current_user: &User,
    job_id: &str,
    new: DeliveryStatus,
) -> Result<Success<JobResponse>, Error> {
    current_user.role.is_allowed(Role::Courier)?;

    let job = fetch_job(deliveries, job_id).await?;

    let job = if current_user.is_courier() {
        if job.worker.is_some_and(|worker| worker != current_user.id) {
            return Err(Error::forbidden("Job is assigned to another courier"));
        }

        deliveries
            .update_job_status_for_courier(&job.id, new, current_user.id)
            .await?
    } else {
        deliveries.update_job_status(&job.id, new).await?
    };

    Ok(Success::ok(JobResponse::from_job(job)))
}

#[derive(Debug, Deserialize)]
pub struct WorkerNotesForm {
    notes: String,
}

/// Replace the notes of the assigned courier
///
/// Request:
/// ```sh
/// curl -v -XPUT -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "notes": "Left with the neighbour" }' \
///     http://localhost:8080/api/jobs/<uuid>/worker-notes
/// ```
pub async fn worker_notes<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
    Form(form): Form<WorkerNotesForm>,
) -> Result<Success<JobResponse>, Error> {
    current_user.role.is_allowed(Role::Courier)?;

    let job = fetch_job(&deliveries, &job_id).await?;

    if current_user.is_courier() && job.worker != Some(current_user.id) {
        return Err(Error::forbidden("Job is not assigned to you"));
    }

    let job = deliveries.update_worker_notes(&job.id, &form.notes).await?;

    Ok(Success::ok(JobResponse::from_job(job)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    client_secret: String,
}

/// Start paying for a job
///
/// Request:
/// ```sh
/// curl -v -XPOST -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:8080/api/jobs/<uuid>/payment-intent
/// ```
///
/// Response:
/// ```json
/// { "data": { "clientSecret": "pi_123_secret_456" } }
/// ```
pub async fn payment_intent<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    Extension(payments): Extension<Payments<S>>,
    Extension(payments_config): Extension<PaymentsConfig>,
    current_user: CurrentUser<S>,
    PathParameters(job_id): PathParameters<String>,
) -> Result<Success<PaymentIntentResponse>, Error> {
    fetch_owned_job(&deliveries, &current_user, &job_id).await?;

    let client_secret = payments
        .create_payment_intent(&job_id, payments_config.amount, &payments_config.currency)
        .await?;

    Ok(Success::created(PaymentIntentResponse { client_secret }))
}

/// Fetch a job by its ID from the path
async fn fetch_job<S: Storage>(deliveries: &Deliveries<S>, job_id: &str) -> Result<Job, Error> {
    let job_id = parse_job_id(job_id)?;

    Ok(deliveries.get_job(&job_id).await?)
}

/// Fetch a job the current user is allowed to see
async fn fetch_visible_job<S: Storage>(
    deliveries: &Deliveries<S>,
    current_user: &User,
    job_id: &str,
) -> Result<Job, Error> {
    let job = fetch_job(deliveries, job_id).await?;

    if current_user.role == Role::Admin || current_user.is_courier() || job.creator == current_user.id {
        Ok(job)
    } else {
        Err(Error::forbidden("Not allowed to access"))
    }
}

/// Fetch a job the current user requested, admins can access all jobs
async fn fetch_owned_job<S: Storage>(
    deliveries: &Deliveries<S>,
    current_user: &User,
    job_id: &str,
) -> Result<Job, Error> {
    let job = fetch_job(deliveries, job_id).await?;

    if current_user.role == Role::Admin || job.creator == current_user.id {
        Ok(job)
    } else {
        Err(Error::forbidden("Not allowed to access"))
    }
}
