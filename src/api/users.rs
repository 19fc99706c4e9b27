//! User API management

use std::ops::Deref;

use axum::Extension;
use axum::http::HeaderMap;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::deliveries::Deliveries;
use crate::jobs::looks_like_email;
use crate::password::generate;
use crate::password::generate_api_key;
use crate::password::hash;
use crate::password::verify;
use crate::storage::ChangePasswordValues;
use crate::storage::CreateUserValues;
use crate::storage::Storage;
use crate::users::Role;
use crate::users::User;

use super::CurrentUser;
use super::Error;
use super::Form;
use super::JwtKeys;
use super::PathParameters;
use super::Success;
use super::current_user::Token;
use super::current_user::generate_token;
use super::jobs::JobResponse;

/// Header carrying an API key
const API_KEY_HEADER: &str = "API-Key";

/// Shortest accepted password
const MIN_PASSWORD_LENGTH: usize = 8;

/// The user response information
///
/// A subset of all the information, ready to be serialized for the outside world
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub phone_number: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,

    /// The password, if generated
    // Password should only be added when newly generated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserResponse {
    /// Create a user response from a [`User`](User)
    fn from_user(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            phone_number: user.phone_number,
            role: user.role,
            created_at: user.created_at,
            password: None,
        }
    }

    /// Add a password to the user response
    ///
    /// This is explicit extra action to take, to make sure this is really what you want to do
    fn set_password(&mut self, password: &str) {
        self.password = Some(password.to_string());
    }
}

/// Login form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    email: String,
    password: String,
}

/// Get a token for a user "session"
///
/// The token can then be used to access the rest of the API routes by using it in the
/// `Authorization` header
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "email": "admin@localhost", "password": "verysecret" }' \
///     http://localhost:8080/api/users/token
/// ```
///
/// Response
/// ```json
/// { "data": { "token_type": "Bearer", "expires_in": 3600, "access_token": "some token" } }
/// ```
pub async fn token<S: Storage>(
    Extension(jwt_keys): Extension<JwtKeys>,
    Extension(storage): Extension<S>,
    Form(form): Form<LoginForm>,
) -> Result<Success<Token>, Error> {
    let user = storage.find_single_user_by_email(&form.email).await?;

    if let Some(user) = user {
        if verify(&user.hashed_password, &form.password) {
            let token = generate_token(&jwt_keys, &user)?;

            Ok(Success::ok(token))
        } else {
            Err(Error::bad_request("Invalid user"))
        }
    } else {
        Err(Error::bad_request("Invalid user"))
    }
}

/// Get the current user
///
/// Request:
/// ```sh
/// curl -v -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:8080/api/users/me
/// ```
///
/// Response:
/// ```json
/// { "data": { "id": 1, "email": "admin@localhost", "role": "admin", ... } }
/// ```
pub async fn me<S: Storage>(current_user: CurrentUser<S>) -> Success<UserResponse> {
    Success::ok(UserResponse::from_user(current_user.deref().clone()))
}

/// Register user form
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    email: String,
    name: String,
    #[serde(default)]
    phone_number: String,
    /// Optional password of the new user
    ///
    /// When not provided a new password will be generated and returned in the response, this will
    /// be the only time the password is visible -- make sure to capture it.
    password: Option<String>,
}

/// Register a customer
///
/// Request:
/// ```sh
/// curl -v -H 'Content-Type: application/json' \
///     -d '{ "email": "ada@example.com", "name": "Ada", "password": "verysecret" }' \
///     http://localhost:8080/api/users/register/customer
/// ```
///
/// Response
/// ```json
/// { "data": { "id": 2, "email": "ada@example.com", "role": "customer", ... } }
/// ```
pub async fn register_customer<S: Storage>(
    Extension(storage): Extension<S>,
    Form(form): Form<RegisterForm>,
) -> Result<Success<UserResponse>, Error> {
    register(&storage, form, Role::Customer).await
}

/// Register a courier
///
/// Same as [`register_customer`], with the courier role
pub async fn register_courier<S: Storage>(
    Extension(storage): Extension<S>,
    Form(form): Form<RegisterForm>,
) -> Result<Success<UserResponse>, Error> {
    register(&storage, form, Role::Courier).await
}

/// Register another admin, only admins can do this
pub async fn register_admin<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<RegisterForm>,
) -> Result<Success<UserResponse>, Error> {
    current_user.role.is_allowed(Role::Admin)?;

    register(&storage, form, Role::Admin).await
}

async fn register<S: Storage>(
    storage: &S,
    form: RegisterForm,
    role: Role,
) -> Result<Success<UserResponse>, Error> {
    let email = form.email.trim().to_lowercase();

    if !looks_like_email(&email) {
        return Err(Error::bad_request("Invalid email address"));
    }

    if form.name.trim().is_empty() {
        return Err(Error::bad_request("Name is required"));
    }

    if storage.find_single_user_by_email(&email).await?.is_some() {
        return Err(Error::bad_request("User already exists"));
    }

    let (is_generated, password) = if let Some(password) = form.password {
        check_password(&password)?;
        (false, password)
    } else {
        (true, generate())
    };

    let hashed_password = hash(&password).map_err(Error::internal_server_error)?;

    let values = CreateUserValues {
        session_id: &Uuid::new_v4(),
        role,
        email: &email,
        name: form.name.trim(),
        phone_number: form.phone_number.trim(),
        hashed_password: &hashed_password,
    };

    let user = storage.create_user(&values).await?;

    tracing::info!("Registered {:?} {} with ID {}", user.role, user.email, user.id);

    let mut response = UserResponse::from_user(user);

    // only add the generated password, its the only time the password is known to anybody
    if is_generated {
        response.set_password(&password);
    }

    Ok(Success::created(response))
}

fn check_password(password: &str) -> Result<(), Error> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        Err(Error::bad_request(format!(
            "Password needs at least {MIN_PASSWORD_LENGTH} characters"
        )))
    } else {
        Ok(())
    }
}

/// Change password form
///
/// New password is optional
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordForm {
    /// Current password for verification
    current_password: String,
    /// New (optional) password
    ///
    /// When not provided a new password will be generated, the new token is the only thing
    /// returned, so provide one unless you like resetting
    password: Option<String>,
}

/// Change the password of the current user
///
/// Changing your password will invalidate your current access token
///
/// Request:
/// ```sh
/// curl -v -XPUT -H 'Content-Type: application/json' \
///     -H 'Authorization: Bearer tokentokentoken' \
///     -d '{ "currentPassword": "verysecret", "password": "veryverysecret" }' \
///     http://localhost:8080/api/users/me/password
/// ```
///
/// Response
/// ```json
/// { "data": { "token_type": "Bearer", "expires_in": 3600, "access_token": "some token" } }
/// ```
pub async fn change_password<S: Storage>(
    Extension(jwt_keys): Extension<JwtKeys>,
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    Form(form): Form<ChangePasswordForm>,
) -> Result<Success<Token>, Error> {
    let user = current_user.deref();

    if !verify(&user.hashed_password, &form.current_password) {
        return Err(Error::bad_request("Invalid password"));
    }

    let password = match form.password {
        Some(password) => {
            check_password(&password)?;
            password
        }
        None => generate(),
    };

    let hashed_password = hash(&password).map_err(Error::internal_server_error)?;

    let values = ChangePasswordValues {
        session_id: &Uuid::new_v4(),
        hashed_password: &hashed_password,
    };

    let updated_user = storage.change_password(user, &values).await?;

    tracing::info!("User {} changed their password", updated_user.id);

    let token = generate_token(&jwt_keys, &updated_user)?;

    Ok(Success::ok(token))
}

/// A freshly issued API key
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    api_key: String,
    last_modified_at: DateTime<Utc>,
}

/// Issue a new API key for the current user
///
/// Any previous key stops working. The key is only shown in this response.
///
/// Request:
/// ```sh
/// curl -v -XPOST -H 'Authorization: Bearer tokentokentoken' \
///     http://localhost:8080/api/users/me/api-key
/// ```
///
/// Response
/// ```json
/// { "data": { "apiKey": "3f2c...", "lastModifiedAt": "2024-01-01T00:00:00Z" } }
/// ```
pub async fn create_api_key<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
) -> Result<Success<ApiKeyResponse>, Error> {
    let key = generate_api_key();
    let hashed_key = hash(&key).map_err(Error::internal_server_error)?;

    let api_key = storage.upsert_api_key(&current_user, &hashed_key).await?;

    tracing::info!("Issued a new API key for user {}", current_user.id);

    Ok(Success::created(ApiKeyResponse {
        api_key: key,
        last_modified_at: api_key.last_modified_at,
    }))
}

#[derive(Debug, Serialize)]
pub struct ApiKeyVerification {
    valid: bool,
}

/// Check the `API-Key` header against the key of the current user
///
/// Request:
/// ```sh
/// curl -v -XPOST -H 'Authorization: Bearer tokentokentoken' \
///     -H 'API-Key: 3f2c...' \
///     http://localhost:8080/api/users/me/api-key/verify
/// ```
pub async fn verify_api_key<S: Storage>(
    Extension(storage): Extension<S>,
    current_user: CurrentUser<S>,
    headers: HeaderMap,
) -> Result<Success<ApiKeyVerification>, Error> {
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::bad_request("Missing `API-Key` header"))?;

    let api_key = storage
        .find_api_key(&current_user)
        .await?
        .ok_or_else(|| Error::forbidden("Invalid API key"))?;

    if verify(&api_key.hashed_key, key) {
        Ok(Success::ok(ApiKeyVerification { valid: true }))
    } else {
        Err(Error::forbidden("Invalid API key"))
    }
}

/// List the jobs requested by a user, admins only
pub async fn jobs<S: Storage>(
    Extension(storage): Extension<S>,
    Extension(deliveries): Extension<Deliveries<S>>,
    current_user: CurrentUser<S>,
    PathParameters(user_id): PathParameters<i64>,
) -> Result<Success<Vec<JobResponse>>, Error> {
    current_user.role.is_allowed(Role::Admin)?;

    fetch_user(&storage, user_id).await?;

    let jobs = deliveries.get_user_jobs(user_id).await?;

    Ok(Success::ok(JobResponse::from_job_multiple(jobs)))
}

/// Fetch a user from storage
pub(super) async fn fetch_user<S: Storage>(storage: &S, user_id: i64) -> Result<User, Error> {
    storage
        .find_single_user_by_id(user_id)
        .await?
        .map_or_else(|| Err(Error::not_found("User not found")), Ok)
}
