//! Memory storage
//!
//! Will be destroyed on system shutdown

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::drivers::DriverLocation;
use crate::drivers::DriverState;
use crate::jobs::DeliveryStatus;
use crate::jobs::Job;
use crate::jobs::OrderStatus;
use crate::users::ApiKey;
use crate::users::User;

use super::ChangePasswordValues;
use super::CreateJobValues;
use super::CreateUserValues;
use super::Error;
use super::Result;
use super::Storage;

/// An in-memory storage
///
/// Will be destroyed on system shutdown
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// All users in storage
    users: Arc<Mutex<HashMap<i64, User>>>,

    /// API keys by user ID
    api_keys: Arc<Mutex<HashMap<i64, ApiKey>>>,

    /// Driver locations by courier ID
    driver_locations: Arc<Mutex<HashMap<i64, DriverLocation>>>,

    /// Driver states by courier ID
    driver_states: Arc<Mutex<HashMap<i64, DriverState>>>,

    /// All jobs in storage
    jobs: Arc<Mutex<HashMap<Uuid, Job>>>,
}

impl Memory {
    /// Create a new empty Memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `update` to a job when `condition` holds
    async fn update_job_if<C, U>(&self, id: &Uuid, condition: C, update: U) -> Option<Job>
    where
        C: FnOnce(&Job) -> bool + Send,
        U: FnOnce(&mut Job) + Send,
    {
        let mut jobs = self.jobs.lock().await;

        let job = jobs.get_mut(id)?;

        if !condition(job) {
            return None;
        }

        update(job);
        job.last_time_modified = Utc::now();

        Some(job.clone())
    }

    async fn find_jobs_by<F>(&self, filter: F) -> Vec<Job>
    where
        F: Fn(&Job) -> bool + Send,
    {
        let mut jobs = self
            .jobs
            .lock()
            .await
            .values()
            .filter(|job| filter(job))
            .cloned()
            .collect::<Vec<Job>>();

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        jobs
    }
}

#[async_trait]
impl Storage for Memory {
    async fn find_any_single_user(&self) -> Result<Option<User>> {
        Ok(self.users.lock().await.values().next().cloned())
    }

    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_single_user_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let mut users = self.users.lock().await;

        if users.values().any(|user| user.email == values.email) {
            return Err(Error::Duplicate(format!("email {}", values.email)));
        }

        let user = User {
            id: users.keys().max().map_or(1, |id| id + 1),
            session_id: *values.session_id,
            email: values.email.to_string(),
            name: values.name.to_string(),
            phone_number: values.phone_number.to_string(),
            hashed_password: values.hashed_password.to_string(),
            role: values.role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn change_password(&self, user: &User, values: &ChangePasswordValues) -> Result<User> {
        self.users
            .lock()
            .await
            .get_mut(&user.id)
            .map(|user| {
                user.session_id = *values.session_id;
                user.hashed_password = values.hashed_password.to_string();
                user.updated_at = Utc::now();

                user.clone()
            })
            .ok_or_else(|| Error::Connection(format!("User {} vanished", user.id)))
    }

    async fn upsert_api_key(&self, user: &User, hashed_key: &str) -> Result<ApiKey> {
        let api_key = ApiKey {
            user_id: user.id,
            hashed_key: hashed_key.to_string(),
            last_modified_at: Utc::now(),
        };

        self.api_keys
            .lock()
            .await
            .insert(user.id, api_key.clone());

        Ok(api_key)
    }

    async fn find_api_key(&self, user: &User) -> Result<Option<ApiKey>> {
        Ok(self.api_keys.lock().await.get(&user.id).cloned())
    }

    async fn save_driver_location(&self, courier_id: i64, coordinates: &str) -> Result<DriverLocation> {
        let location = DriverLocation {
            courier_id,
            coordinates: coordinates.to_string(),
            updated_at: Utc::now(),
        };

        self.driver_locations
            .lock()
            .await
            .insert(courier_id, location.clone());

        Ok(location)
    }

    async fn find_driver_location(&self, courier_id: i64) -> Result<Option<DriverLocation>> {
        Ok(self.driver_locations.lock().await.get(&courier_id).cloned())
    }

    async fn save_driver_state(&self, courier_id: i64, active: bool) -> Result<DriverState> {
        let state = DriverState {
            courier_id,
            active,
            updated_at: Utc::now(),
        };

        self.driver_states
            .lock()
            .await
            .insert(courier_id, state.clone());

        Ok(state)
    }

    async fn find_all_driver_states(&self) -> Result<Vec<DriverState>> {
        let mut states = self
            .driver_states
            .lock()
            .await
            .values()
            .cloned()
            .collect::<Vec<DriverState>>();

        states.sort_by_key(|state| state.courier_id);

        Ok(states)
    }

    async fn create_job(&self, values: &CreateJobValues) -> Result<()> {
        let mut jobs = self.jobs.lock().await;

        if jobs.contains_key(values.id) {
            return Err(Error::Duplicate(format!("job {}", values.id)));
        }

        let job = Job {
            id: *values.id,
            short_id: values.short_id.to_string(),
            tracking_url: values.tracking_url.to_string(),
            creator: values.creator,
            worker: None,
            status: DeliveryStatus::Pending,
            order_status: OrderStatus::Open,
            origin: values.origin.clone(),
            destination: values.destination.clone(),
            worker_notes: String::new(),
            created_at: values.created_at,
            last_time_modified: values.created_at,
        };

        jobs.insert(job.id, job);

        Ok(())
    }

    async fn find_single_job_by_id(&self, id: &Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.lock().await.get(id).cloned())
    }

    async fn find_single_job_by_short_id(&self, short_id: &str) -> Result<Option<Job>> {
        Ok(self
            .jobs
            .lock()
            .await
            .values()
            .find(|job| job.short_id == short_id)
            .cloned())
    }

    async fn find_all_jobs(&self) -> Result<Vec<Job>> {
        Ok(self.find_jobs_by(|_| true).await)
    }

    async fn find_all_jobs_by_creator(&self, creator: i64) -> Result<Vec<Job>> {
        Ok(self.find_jobs_by(|job| job.creator == creator).await)
    }

    async fn find_all_jobs_by_worker(&self, worker: i64) -> Result<Vec<Job>> {
        Ok(self.find_jobs_by(|job| job.worker == Some(worker)).await)
    }

    async fn update_job_status(
        &self,
        id: &Uuid,
        expected: DeliveryStatus,
        new: DeliveryStatus,
        worker: Option<i64>,
    ) -> Result<Option<Job>> {
        Ok(self
            .update_job_if(
                id,
                |job| {
                    job.status == expected
                        && job.order_status != OrderStatus::Cancelled
                        && worker.is_none_or(|worker| {
                            job.worker.is_none_or(|current| current == worker)
                        })
                },
                |job| {
                    job.status = new;
                    if worker.is_some() {
                        job.worker = worker;
                    }
                },
            )
            .await)
    }

    async fn update_job_order_status(
        &self,
        id: &Uuid,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<Option<Job>> {
        Ok(self
            .update_job_if(
                id,
                |job| job.order_status == expected,
                |job| job.order_status = new,
            )
            .await)
    }

    async fn assign_job_worker(&self, id: &Uuid, worker: i64) -> Result<Option<Job>> {
        Ok(self
            .update_job_if(
                id,
                |job| {
                    job.order_status != OrderStatus::Cancelled
                        && job.worker.is_none_or(|current| current == worker)
                },
                |job| job.worker = Some(worker),
            )
            .await)
    }

    async fn update_worker_notes(&self, id: &Uuid, notes: &str) -> Result<Option<Job>> {
        Ok(self
            .update_job_if(id, |_| true, |job| job.worker_notes = notes.to_string())
            .await)
    }
}
