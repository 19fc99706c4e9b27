//! Postgres storage

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::FromRow;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
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

use super::ChangePasswordValues;
use super::CreateJobValues;
use super::CreateUserValues;
use super::Error;
use super::Result;
use super::Storage;

/// Migrator to run migrations on startup
static MIGRATOR: Migrator = sqlx::migrate!();

const USER_COLUMNS: &str = r"
    id,
    session_id,
    email,
    name,
    phone_number,
    hashed_password,
    role,
    created_at,
    updated_at
";

const JOB_COLUMNS: &str = r"
    id,
    short_id,
    tracking_url,
    creator,
    worker,
    status,
    order_status,
    origin,
    destination,
    worker_notes,
    created_at,
    last_time_modified
";

/// Postgres type for user role
#[derive(PartialEq, Debug, sqlx::Type)]
#[sqlx(type_name = "user_role_type")]
#[sqlx(rename_all = "kebab-case")]
enum UserRoleType {
    Admin,
    Customer,
    Courier,
}

impl UserRoleType {
    /// Create user role type from role
    fn from_role(role: Role) -> Self {
        match role {
            Role::Admin => UserRoleType::Admin,
            Role::Customer => UserRoleType::Customer,
            Role::Courier => UserRoleType::Courier,
        }
    }

    /// Create role from user role type
    fn to_role(&self) -> Role {
        match self {
            UserRoleType::Admin => Role::Admin,
            UserRoleType::Customer => Role::Customer,
            UserRoleType::Courier => Role::Courier,
        }
    }
}

/// Postgres storage
#[derive(Clone)]
pub struct Postgres {
    /// Pool of connections
    connection_pool: PgPool,
}

impl Postgres {
    /// Create Postgres storage
    ///
    /// Migrations will be run
    ///
    /// # Errors
    ///
    /// Will return `Err` when the database can not be reached or migrations fail
    pub async fn new(database_url: &str) -> Result<Self> {
        let connection_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
            .map_err(connection_error)?;

        Self::new_with_pool(connection_pool).await
    }

    /// Create Postgres storage with existing pool
    ///
    /// Migrations will be run
    ///
    /// # Errors
    ///
    /// Will return `Err` when migrations fail
    pub async fn new_with_pool(connection_pool: PgPool) -> Result<Self> {
        MIGRATOR
            .run(&connection_pool)
            .await
            .map_err(|err| Error::Connection(format!("Migrations could not run: {err}")))?;

        Ok(Self { connection_pool })
    }
}

/// Postgres version of user
#[derive(FromRow)]
struct PostgresUser {
    id: i64,
    session_id: Uuid,
    email: String,
    name: String,
    phone_number: String,
    hashed_password: String,
    role: UserRoleType,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// Create user from postgres version
    fn from_postgres_user(user: PostgresUser) -> Self {
        Self {
            id: user.id,
            session_id: user.session_id,
            email: user.email,
            name: user.name,
            phone_number: user.phone_number,
            hashed_password: user.hashed_password,
            role: user.role.to_role(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }

    /// Maybe create user from postgres version
    fn from_postgres_user_optional(user: Option<PostgresUser>) -> Option<Self> {
        user.map(Self::from_postgres_user)
    }
}

/// Postgres version of a job
///
/// Statuses are kept as their codes, unknown codes are rejected on conversion
#[derive(FromRow)]
struct PostgresJob {
    id: Uuid,
    short_id: String,
    tracking_url: String,
    creator: i64,
    worker: Option<i64>,
    status: i16,
    order_status: i16,
    origin: Json<Address>,
    destination: Json<Address>,
    worker_notes: String,
    created_at: DateTime<Utc>,
    last_time_modified: DateTime<Utc>,
}

impl Job {
    /// Create job from postgres version
    fn from_postgres_job(job: PostgresJob) -> Result<Self> {
        let status = DeliveryStatus::from_code(job.status).ok_or_else(|| {
            Error::Corrupt(format!("Job {} has unknown status code {}", job.id, job.status))
        })?;

        let order_status = OrderStatus::from_code(job.order_status).ok_or_else(|| {
            Error::Corrupt(format!(
                "Job {} has unknown order status code {}",
                job.id, job.order_status
            ))
        })?;

        Ok(Self {
            id: job.id,
            short_id: job.short_id,
            tracking_url: job.tracking_url,
            creator: job.creator,
            worker: job.worker,
            status,
            order_status,
            origin: job.origin.0,
            destination: job.destination.0,
            worker_notes: job.worker_notes,
            created_at: job.created_at,
            last_time_modified: job.last_time_modified,
        })
    }

    /// Maybe create job from postgres version
    fn from_postgres_job_optional(job: Option<PostgresJob>) -> Result<Option<Self>> {
        job.map(Self::from_postgres_job).transpose()
    }

    /// Create multiple jobs from postgres version
    fn from_postgres_job_multiple(jobs: Vec<PostgresJob>) -> Result<Vec<Self>> {
        jobs.into_iter().map(Self::from_postgres_job).collect()
    }
}

#[derive(FromRow)]
struct PostgresApiKey {
    user_id: i64,
    hashed_key: String,
    last_modified_at: DateTime<Utc>,
}

impl From<PostgresApiKey> for ApiKey {
    fn from(api_key: PostgresApiKey) -> Self {
        Self {
            user_id: api_key.user_id,
            hashed_key: api_key.hashed_key,
            last_modified_at: api_key.last_modified_at,
        }
    }
}

#[derive(FromRow)]
struct PostgresDriverLocation {
    courier_id: i64,
    coordinates: String,
    updated_at: DateTime<Utc>,
}

impl From<PostgresDriverLocation> for DriverLocation {
    fn from(location: PostgresDriverLocation) -> Self {
        Self {
            courier_id: location.courier_id,
            coordinates: location.coordinates,
            updated_at: location.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PostgresDriverState {
    courier_id: i64,
    active: bool,
    updated_at: DateTime<Utc>,
}

impl From<PostgresDriverState> for DriverState {
    fn from(state: PostgresDriverState) -> Self {
        Self {
            courier_id: state.courier_id,
            active: state.active,
            updated_at: state.updated_at,
        }
    }
}

impl Postgres {
    async fn fetch_optional_job(&self, query: &str, bind: &Uuid) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, PostgresJob>(query)
            .bind(bind)
            .fetch_optional(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        Job::from_postgres_job_optional(job)
    }

    async fn fetch_jobs(&self, query: &str, bind: Option<i64>) -> Result<Vec<Job>> {
        let mut query = sqlx::query_as::<_, PostgresJob>(query);

        if let Some(bind) = bind {
            query = query.bind(bind);
        }

        let jobs = query
            .fetch_all(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        Job::from_postgres_job_multiple(jobs)
    }
}

#[async_trait]
impl Storage for Postgres {
    async fn find_any_single_user(&self) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users LIMIT 1"
        ))
        .fetch_optional(&self.connection_pool)
        .await
        .map(User::from_postgres_user_optional)
        .map_err(connection_error)?;

        Ok(user)
    }

    async fn find_single_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.connection_pool)
        .await
        .map(User::from_postgres_user_optional)
        .map_err(connection_error)?;

        Ok(user)
    }

    async fn find_single_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
        .map(User::from_postgres_user_optional)
        .map_err(connection_error)?;

        Ok(user)
    }

    async fn create_user(&self, values: &CreateUserValues) -> Result<User> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            r"
            INSERT INTO users (session_id, email, name, phone_number, hashed_password, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(values.session_id)
        .bind(values.email)
        .bind(values.name)
        .bind(values.phone_number)
        .bind(values.hashed_password)
        .bind(UserRoleType::from_role(values.role))
        .fetch_one(&self.connection_pool)
        .await
        .map(User::from_postgres_user)
        .map_err(|err| duplicate_or_connection_error(err, values.email))?;

        Ok(user)
    }

    async fn change_password(&self, user: &User, values: &ChangePasswordValues) -> Result<User> {
        let user = sqlx::query_as::<_, PostgresUser>(&format!(
            r"
            UPDATE users
            SET
                session_id = $2,
                hashed_password = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.id)
        .bind(values.session_id)
        .bind(values.hashed_password)
        .fetch_one(&self.connection_pool)
        .await
        .map(User::from_postgres_user)
        .map_err(connection_error)?;

        Ok(user)
    }

    async fn upsert_api_key(&self, user: &User, hashed_key: &str) -> Result<ApiKey> {
        let api_key = sqlx::query_as::<_, PostgresApiKey>(
            r"
            INSERT INTO api_keys (user_id, hashed_key, last_modified_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET
                hashed_key = EXCLUDED.hashed_key,
                last_modified_at = EXCLUDED.last_modified_at
            RETURNING user_id, hashed_key, last_modified_at
            ",
        )
        .bind(user.id)
        .bind(hashed_key)
        .fetch_one(&self.connection_pool)
        .await
        .map(ApiKey::from)
        .map_err(connection_error)?;

        Ok(api_key)
    }

    async fn find_api_key(&self, user: &User) -> Result<Option<ApiKey>> {
        let api_key = sqlx::query_as::<_, PostgresApiKey>(
            r"
            SELECT user_id, hashed_key, last_modified_at
            FROM api_keys
            WHERE user_id = $1
            ",
        )
        .bind(user.id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(api_key.map(ApiKey::from))
    }

    async fn save_driver_location(&self, courier_id: i64, coordinates: &str) -> Result<DriverLocation> {
        let location = sqlx::query_as::<_, PostgresDriverLocation>(
            r"
            INSERT INTO driver_locations (courier_id, coordinates, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (courier_id) DO UPDATE
            SET
                coordinates = EXCLUDED.coordinates,
                updated_at = EXCLUDED.updated_at
            RETURNING courier_id, coordinates, updated_at
            ",
        )
        .bind(courier_id)
        .bind(coordinates)
        .fetch_one(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(location.into())
    }

    async fn find_driver_location(&self, courier_id: i64) -> Result<Option<DriverLocation>> {
        let location = sqlx::query_as::<_, PostgresDriverLocation>(
            r"
            SELECT courier_id, coordinates, updated_at
            FROM driver_locations
            WHERE courier_id = $1
            ",
        )
        .bind(courier_id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(location.map(DriverLocation::from))
    }

    async fn save_driver_state(&self, courier_id: i64, active: bool) -> Result<DriverState> {
        let state = sqlx::query_as::<_, PostgresDriverState>(
            r"
            INSERT INTO driver_states (courier_id, active, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (courier_id) DO UPDATE
            SET
                active = EXCLUDED.active,
                updated_at = EXCLUDED.updated_at
            RETURNING courier_id, active, updated_at
            ",
        )
        .bind(courier_id)
        .bind(active)
        .fetch_one(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(state.into())
    }

    async fn find_all_driver_states(&self) -> Result<Vec<DriverState>> {
        let states = sqlx::query_as::<_, PostgresDriverState>(
            r"
            SELECT courier_id, active, updated_at
            FROM driver_states
            ORDER BY courier_id
            ",
        )
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(states.into_iter().map(DriverState::from).collect())
    }

    async fn create_job(&self, values: &CreateJobValues) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO jobs (
                id,
                short_id,
                tracking_url,
                creator,
                status,
                order_status,
                origin,
                destination,
                created_at,
                last_time_modified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ",
        )
        .bind(values.id)
        .bind(values.short_id)
        .bind(values.tracking_url)
        .bind(values.creator)
        .bind(DeliveryStatus::Pending.code())
        .bind(OrderStatus::Open.code())
        .bind(Json(values.origin))
        .bind(Json(values.destination))
        .bind(values.created_at)
        .execute(&self.connection_pool)
        .await
        .map_err(|err| duplicate_or_connection_error(err, values.short_id))?;

        Ok(())
    }

    async fn find_single_job_by_id(&self, id: &Uuid) -> Result<Option<Job>> {
        self.fetch_optional_job(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"), id)
            .await
    }

    async fn find_single_job_by_short_id(&self, short_id: &str) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, PostgresJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE short_id = $1"
        ))
        .bind(short_id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Job::from_postgres_job_optional(job)
    }

    async fn find_all_jobs(&self) -> Result<Vec<Job>> {
        self.fetch_jobs(
            &format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC"),
            None,
        )
        .await
    }

    async fn find_all_jobs_by_creator(&self, creator: i64) -> Result<Vec<Job>> {
        self.fetch_jobs(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE creator = $1 ORDER BY created_at DESC"),
            Some(creator),
        )
        .await
    }

    async fn find_all_jobs_by_worker(&self, worker: i64) -> Result<Vec<Job>> {
        self.fetch_jobs(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE worker = $1 ORDER BY created_at DESC"),
            Some(worker),
        )
        .await
    }

    async fn update_job_status(
        &self,
        id: &Uuid,
        expected: DeliveryStatus,
        new: DeliveryStatus,
        worker: Option<i64>,
    ) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, PostgresJob>(&format!(
            r"
            UPDATE jobs
            SET
                status = $3,
                worker = COALESCE($4::BIGINT, worker),
                last_time_modified = NOW()
            WHERE id = $1
                AND status = $2
                AND order_status <> $5
                AND ($4::BIGINT IS NULL OR worker IS NULL OR worker = $4::BIGINT)
            RETURNING {JOB_COLUMNS}
            "
        ))
        .bind(id)
        .bind(expected.code())
        .bind(new.code())
        .bind(worker)
        .bind(OrderStatus::Cancelled.code())
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Job::from_postgres_job_optional(job)
    }

    async fn update_job_order_status(
        &self,
        id: &Uuid,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, PostgresJob>(&format!(
            r"
            UPDATE jobs
            SET
                order_status = $3,
                last_time_modified = NOW()
            WHERE id = $1
                AND order_status = $2
            RETURNING {JOB_COLUMNS}
            "
        ))
        .bind(id)
        .bind(expected.code())
        .bind(new.code())
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Job::from_postgres_job_optional(job)
    }

    async fn assign_job_worker(&self, id: &Uuid, worker: i64) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, PostgresJob>(&format!(
            r"
            UPDATE jobs
            SET
                worker = $2,
                last_time_modified = NOW()
            WHERE id = $1
                AND order_status <> $3
                AND (worker IS NULL OR worker = $2)
            RETURNING {JOB_COLUMNS}
            "
        ))
        .bind(id)
        .bind(worker)
        .bind(OrderStatus::Cancelled.code())
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Job::from_postgres_job_optional(job)
    }

    async fn update_worker_notes(&self, id: &Uuid, notes: &str) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, PostgresJob>(&format!(
            r"
            UPDATE jobs
            SET
                worker_notes = $2,
                last_time_modified = NOW()
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "
        ))
        .bind(id)
        .bind(notes)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Job::from_postgres_job_optional(job)
    }
}

/// Convert `SQLx` to storage connection error
fn connection_error<E>(err: E) -> Error
where
    E: std::error::Error,
{
    Error::Connection(err.to_string())
}

/// Unique violations become `Error::Duplicate`, everything else a connection error
fn duplicate_or_connection_error(err: sqlx::Error, value: &str) -> Error {
    match &err {
        sqlx::Error::Database(database_error) if database_error.is_unique_violation() => {
            Error::Duplicate(value.to_string())
        }
        _ => connection_error(err),
    }
}
