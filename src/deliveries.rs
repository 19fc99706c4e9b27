//! Job lifecycle
//!
//! Every transition is a single conditional write in storage, so two requests racing on the same
//! job can never both win.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::jobs::Address;
use crate::jobs::DeliveryStatus;
use crate::jobs::Job;
use crate::jobs::OrderStatus;
use crate::jobs::short_id;
use crate::location::Point;
use crate::location::RouteError;
use crate::location::TravelTime;
use crate::postcodes::Postcodes;
use crate::storage;
use crate::storage::CreateJobValues;
use crate::storage::Storage;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("Job not found")]
    NotFound,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Can not move job from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Job is {0}, there is no journey to estimate")]
    NoActiveLeg(&'static str),

    #[error("Missing coordinates for the {0}")]
    MissingCoordinates(&'static str),

    #[error(transparent)]
    RouteUnavailable(#[from] RouteError),

    #[error(transparent)]
    Storage(#[from] storage::Error),
}

/// Result type for lifecycle operations
pub type Result<T> = core::result::Result<T, Error>;

/// Values to request a new job
///
/// Anything else a caller sends, like a status, is ignored
pub struct NewJob<'a> {
    pub creator: i64,
    pub origin: &'a Address,
    pub destination: &'a Address,
}

/// The job lifecycle engine
#[derive(Clone)]
pub struct Deliveries<S: Storage> {
    storage: S,
    postcodes: Arc<Postcodes>,
    travel_time: Arc<dyn TravelTime>,
    tracking_base_url: Url,
}

impl<S: Storage> Deliveries<S> {
    pub fn new(
        storage: S,
        postcodes: Arc<Postcodes>,
        travel_time: Arc<dyn TravelTime>,
        tracking_base_url: Url,
    ) -> Self {
        Self {
            storage,
            postcodes,
            travel_time,
            tracking_base_url,
        }
    }

    pub fn postcodes(&self) -> &Postcodes {
        &self.postcodes
    }

    /// Create a job, pending and open
    pub async fn create_job(&self, new_job: &NewJob<'_>) -> Result<Job> {
        new_job
            .origin
            .validate("origin")
            .and_then(|()| new_job.destination.validate("destination"))
            .map_err(Error::InvalidInput)?;

        let id = Uuid::new_v4();
        let short_id = short_id(&id);
        let tracking_url = self.tracking_url(&short_id);

        let values = CreateJobValues {
            id: &id,
            short_id: &short_id,
            tracking_url: &tracking_url,
            creator: new_job.creator,
            origin: new_job.origin,
            destination: new_job.destination,
            created_at: Utc::now(),
        };

        self.storage.create_job(&values).await?;

        let job = self.storage.find_single_job_by_id(&id).await?.ok_or_else(|| {
            storage::Error::Connection(format!("Job {id} is missing right after creation"))
        })?;

        tracing::info!("Created job {} ({}) for user {}", job.id, job.short_id, job.creator);

        Ok(job)
    }

    fn tracking_url(&self, short_id: &str) -> String {
        self.tracking_base_url
            .join(&format!("track/{short_id}"))
            .map_or_else(
                |_| format!("{}track/{short_id}", self.tracking_base_url),
                String::from,
            )
    }

    pub async fn get_job(&self, id: &Uuid) -> Result<Job> {
        self.storage
            .find_single_job_by_id(id)
            .await?
            .ok_or(Error::NotFound)
    }

    pub async fn get_job_by_short_id(&self, short_id: &str) -> Result<Job> {
        self.storage
            .find_single_job_by_short_id(short_id)
            .await?
            .ok_or(Error::NotFound)
    }

    /// Label of the delivery status
    pub async fn get_job_status(&self, id: &Uuid) -> Result<&'static str> {
        Ok(self.get_job(id).await?.status.label())
    }

    /// Label of the order status
    pub async fn get_job_order_status(&self, id: &Uuid) -> Result<&'static str> {
        Ok(self.get_job(id).await?.order_status.label())
    }

    /// Jobs requested by a user, empty when there are none
    pub async fn get_user_jobs(&self, creator: i64) -> Result<Vec<Job>> {
        Ok(self.storage.find_all_jobs_by_creator(creator).await?)
    }

    /// Jobs assigned to a courier, empty when there are none
    pub async fn get_driver_jobs(&self, worker: i64) -> Result<Vec<Job>> {
        Ok(self.storage.find_all_jobs_by_worker(worker).await?)
    }

    pub async fn get_all_jobs(&self) -> Result<Vec<Job>> {
        Ok(self.storage.find_all_jobs().await?)
    }

    /// Advance the delivery status by exactly one stage
    pub async fn update_job_status(&self, id: &Uuid, new: DeliveryStatus) -> Result<Job> {
        self.advance_job(id, new, None).await
    }

    /// Advance the delivery status on behalf of a courier
    ///
    /// An unassigned job is claimed for the courier in the same write, a rejected step leaves
    /// the job unassigned
    pub async fn update_job_status_for_courier(
        &self,
        id: &Uuid,
        new: DeliveryStatus,
        courier_id: i64,
    ) -> Result<Job> {
        self.advance_job(id, new, Some(courier_id)).await
    }

    async fn advance_job(
        &self,
        id: &Uuid,
        new: DeliveryStatus,
        courier_id: Option<i64>,
    ) -> Result<Job> {
        let job = self.get_job(id).await?;

        if job.order_status == OrderStatus::Cancelled || !job.status.can_advance_to(new) {
            return Err(invalid_transition(
                &job,
                job.status.label(),
                new.label(),
            ));
        }

        if let Some(err) = courier_id.and_then(|courier_id| other_courier(&job, courier_id)) {
            return Err(err);
        }

        match self
            .storage
            .update_job_status(id, job.status, new, courier_id)
            .await?
        {
            Some(job) => {
                tracing::info!("Job {} is now `{}`", job.id, job.status.label());
                Ok(job)
            }
            None => {
                // someone else changed the job in the meantime
                let job = self.get_job(id).await?;

                if let Some(err) = courier_id.and_then(|courier_id| other_courier(&job, courier_id))
                {
                    return Err(err);
                }

                let from = if job.order_status == OrderStatus::Cancelled {
                    job.order_status.label()
                } else {
                    job.status.label()
                };

                Err(invalid_transition(&job, from, new.label()))
            }
        }
    }

    /// Close or cancel an open job
    ///
    /// Setting the status the job already has succeeds without a write, so repeated payment
    /// events are harmless.
    pub async fn update_job_order_status(&self, id: &Uuid, new: OrderStatus) -> Result<Job> {
        let job = self.get_job(id).await?;

        if job.order_status == new {
            tracing::debug!("Job {} is already `{}`", job.id, new.label());
            return Ok(job);
        }

        if !job.order_status.can_transition_to(new) {
            return Err(invalid_transition(
                &job,
                job.order_status.label(),
                new.label(),
            ));
        }

        match self
            .storage
            .update_job_order_status(id, job.order_status, new)
            .await?
        {
            Some(job) => {
                tracing::info!("Order of job {} is now `{}`", job.id, job.order_status.label());
                Ok(job)
            }
            None => {
                let job = self.get_job(id).await?;

                if job.order_status == new {
                    Ok(job)
                } else {
                    Err(invalid_transition(
                        &job,
                        job.order_status.label(),
                        new.label(),
                    ))
                }
            }
        }
    }

    /// Give the job to a courier
    ///
    /// Claiming a job twice by the same courier is fine, taking it from another courier is not.
    pub async fn assign_worker(&self, id: &Uuid, courier_id: i64) -> Result<Job> {
        if let Some(job) = self.storage.assign_job_worker(id, courier_id).await? {
            tracing::info!("Job {} is assigned to courier {courier_id}", job.id);
            return Ok(job);
        }

        let job = self.get_job(id).await?;

        let from = match job.worker {
            Some(worker) => format!("courier {worker}"),
            None => String::from(job.order_status.label()),
        };

        Err(Error::InvalidTransition {
            from,
            to: format!("courier {courier_id}"),
        })
    }

    pub async fn update_worker_notes(&self, id: &Uuid, notes: &str) -> Result<Job> {
        self.storage
            .update_worker_notes(id, notes)
            .await?
            .ok_or(Error::NotFound)
    }

    /// Seconds for the courier to reach the side of the job they are heading to
    pub async fn get_estimated_job_journey_duration(
        &self,
        job_id: &Uuid,
        driver_id: i64,
    ) -> Result<i64> {
        let job = self.get_job(job_id).await?;

        let leg = job
            .status
            .leg()
            .ok_or(Error::NoActiveLeg(job.status.label()))?;

        let address = job.address_for(leg);

        let target = match address.coordinates() {
            Some((latitude, longitude)) => Point::new(latitude, longitude),
            None => self
                .postcodes
                .lookup(&address.postcode)
                .ok_or(Error::MissingCoordinates("journey target"))?,
        };

        let driver = self
            .storage
            .find_driver_location(driver_id)
            .await?
            .and_then(|location| location.coordinates.parse::<Point>().ok())
            .ok_or(Error::MissingCoordinates("driver"))?;

        let seconds = self.travel_time.duration(&driver, &target).await?;

        tracing::debug!("Courier {driver_id} is {seconds} seconds away for job {job_id}");

        Ok(seconds)
    }
}

/// Error when the job belongs to another courier
fn other_courier(job: &Job, courier_id: i64) -> Option<Error> {
    job.worker
        .filter(|worker| *worker != courier_id)
        .map(|worker| Error::InvalidTransition {
            from: format!("courier {worker}"),
            to: format!("courier {courier_id}"),
        })
}

fn invalid_transition(job: &Job, from: &str, to: &str) -> Error {
    tracing::debug!("Rejected transition of job {} from `{from}` to `{to}`", job.id);

    Error::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}
