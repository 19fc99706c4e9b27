//! All things related to the storage of users, drivers and jobs

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::drivers::DriverLocation;
use crate::drivers::DriverState;
use crate::jobs::Address;
use crate::jobs::DeliveryStatus;
use crate::jobs::Job;
use crate::jobs::OrderStatus;
use crate::users::ApiKey;
use crate::users::Role;
use crate::users::User;

pub use memory::Memory;
pub use postgres::Postgres;

mod memory;
mod postgres;

/// Storage errors
#[derive(Debug, Error)]
pub enum Error {
    /// A connection error with the storage
    #[error("Connection error: {0}")]
    Connection(String),

    /// A unique value is already taken
    #[error("Duplicate value: {0}")]
    Duplicate(String),

    /// A stored value can not be mapped to the domain
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result type for all storage interactions
pub type Result<T> = core::result::Result<T, Error>;

/// Values to create a User
pub struct CreateUserValues<'a> {
    /// The initial session ID for the user
    pub session_id: &'a Uuid,

    /// The role of the user
    pub role: Role,

    /// Unique email address, used to log in
    pub email: &'a str,

    pub name: &'a str,

    pub phone_number: &'a str,

    /// The hashed password
    pub hashed_password: &'a str,
}

/// Values to change a password of a user
pub struct ChangePasswordValues<'a> {
    /// New session ID to invalidate current tokens
    pub session_id: &'a Uuid,

    /// The new hashed password
    pub hashed_password: &'a str,
}

/// Values to create a Job
///
/// The statuses are not part of it, every job starts pending and open
pub struct CreateJobValues<'a> {
    pub id: &'a Uuid,
    pub short_id: &'a str,
    pub tracking_url: &'a str,

    /// The user requesting the delivery
    pub creator: i64,

    pub origin: &'a Address,
    pub destination: &'a Address,
    pub created_at: DateTime<Utc>,
}

/// Storage with all supported operations
///
/// Job updates are conditional writes, they return `None` when the job does not exist or no
/// longer matches the expected state.
#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    /// Find any single user
    async fn find_any_single_user(&self) -> Result<Option<User>>;

    /// Finds a single user by its email address
    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Finds a single user by its ID
    async fn find_single_user_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Create a single user
    ///
    /// Fails with `Error::Duplicate` when the email is taken
    async fn create_user(&self, values: &CreateUserValues) -> Result<User>;

    /// Change the password of a user
    async fn change_password(&self, user: &User, values: &ChangePasswordValues) -> Result<User>;

    /// Store the API key of a user, replacing any previous key
    async fn upsert_api_key(&self, user: &User, hashed_key: &str) -> Result<ApiKey>;

    /// Find the API key of a user
    async fn find_api_key(&self, user: &User) -> Result<Option<ApiKey>>;

    /// Store the last known location of a courier
    async fn save_driver_location(&self, courier_id: i64, coordinates: &str) -> Result<DriverLocation>;

    /// Find the last known location of a courier
    async fn find_driver_location(&self, courier_id: i64) -> Result<Option<DriverLocation>>;

    /// Store whether a courier is active
    async fn save_driver_state(&self, courier_id: i64, active: bool) -> Result<DriverState>;

    /// Find the active flag of all couriers that ever reported one
    async fn find_all_driver_states(&self) -> Result<Vec<DriverState>>;

    /// Create a job
    async fn create_job(&self, values: &CreateJobValues) -> Result<()>;

    /// Find a single job by ID
    async fn find_single_job_by_id(&self, id: &Uuid) -> Result<Option<Job>>;

    /// Find a single job by its short ID
    async fn find_single_job_by_short_id(&self, short_id: &str) -> Result<Option<Job>>;

    /// Find all jobs, newest first
    async fn find_all_jobs(&self) -> Result<Vec<Job>>;

    /// Find all jobs requested by a user, newest first
    async fn find_all_jobs_by_creator(&self, creator: i64) -> Result<Vec<Job>>;

    /// Find all jobs assigned to a courier, newest first
    async fn find_all_jobs_by_worker(&self, worker: i64) -> Result<Vec<Job>>;

    /// Set the delivery status, only when it is still `expected` and the job is not cancelled
    ///
    /// With a `worker`, the job is claimed for that courier in the same write, which only
    /// succeeds when the job has no courier yet or already has this one
    async fn update_job_status(
        &self,
        id: &Uuid,
        expected: DeliveryStatus,
        new: DeliveryStatus,
        worker: Option<i64>,
    ) -> Result<Option<Job>>;

    /// Set the order status, only when it is still `expected`
    async fn update_job_order_status(
        &self,
        id: &Uuid,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<Option<Job>>;

    /// Assign a courier, only when the job has no courier yet or already has this one
    ///
    /// Cancelled jobs are never assigned
    async fn assign_job_worker(&self, id: &Uuid, worker: i64) -> Result<Option<Job>>;

    /// Replace the notes of the courier
    async fn update_worker_notes(&self, id: &Uuid, notes: &str) -> Result<Option<Job>>;
}
