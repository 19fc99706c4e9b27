//! API response helpers

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;

use crate::deliveries;
use crate::payments;
use crate::storage;
use crate::users::Role;

/// Hold data for a successful API interaction
pub struct Success<V>
where
    V: Serialize,
{
    status_code: StatusCode,
    data: Option<V>,
}

impl<V> Success<V>
where
    V: Serialize,
{
    pub fn ok(data: V) -> Self {
        Self {
            status_code: StatusCode::OK,
            data: Some(data),
        }
    }

    pub fn created(data: V) -> Self {
        Self {
            status_code: StatusCode::CREATED,
            data: Some(data),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status_code: StatusCode::NO_CONTENT,
            data: None,
        }
    }
}

#[derive(Serialize)]
struct DataWrapper<D>
where
    D: Serialize,
{
    data: D,
}

impl<V> IntoResponse for Success<V>
where
    V: Serialize,
{
    fn into_response(self) -> Response {
        if let Some(data) = self.data {
            (self.status_code, Json(DataWrapper { data })).into_response()
        } else {
            self.status_code.into_response()
        }
    }
}

/// Hold data for a failed API interaction
#[derive(Debug)]
pub struct Error {
    status_code: StatusCode,
    message: String,
    description: Option<String>,
}

impl Error {
    fn new<M>(status_code: StatusCode, message: M) -> Self
    where
        M: ToString,
    {
        Self {
            status_code,
            message: message.to_string(),
            description: None,
        }
    }

    pub fn bad_request<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable_entity<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal_server_error<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_gateway<M>(message: M) -> Self
    where
        M: ToString,
    {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    #[must_use]
    pub fn with_description<M>(&self, description: M) -> Self
    where
        M: ToString,
    {
        Self {
            status_code: self.status_code,
            message: self.message.clone(),
            description: Some(description.to_string()),
        }
    }

    #[cfg(test)]
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

#[derive(Serialize)]
struct ErrorWrapper<D>
where
    D: Serialize,
{
    error: D,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<D>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            tracing::error!("{}: {:?}", self.message, self.description);
        }

        (
            self.status_code,
            Json(ErrorWrapper {
                error: self.message,
                description: self.description,
            }),
        )
            .into_response()
    }
}

impl From<storage::Error> for Error {
    fn from(err: storage::Error) -> Self {
        match err {
            storage::Error::Duplicate(_) => Error::bad_request("Already exists"),
            err => Error::internal_server_error("Storage error").with_description(err),
        }
    }
}

impl From<deliveries::Error> for Error {
    fn from(err: deliveries::Error) -> Self {
        use deliveries::Error as E;

        match err {
            E::NotFound => Error::not_found("Job not found"),
            E::InvalidInput(message) => Error::bad_request(message),
            err @ E::InvalidTransition { .. } => Error::conflict("Invalid transition").with_description(err),
            err @ E::NoActiveLeg(_) => Error::conflict("No active journey").with_description(err),
            err @ E::MissingCoordinates(_) => {
                Error::unprocessable_entity("Missing coordinates").with_description(err)
            }
            E::RouteUnavailable(err) => Error::bad_gateway("Route unavailable").with_description(err),
            E::Storage(err) => err.into(),
        }
    }
}

impl From<payments::Error> for Error {
    fn from(err: payments::Error) -> Self {
        use payments::Error as E;

        match err {
            err @ E::InvalidJobId(_) => Error::bad_request(err),
            err @ E::JobNotPayable(_) => Error::conflict(err),
            E::Provider(err) => Error::bad_gateway("Payment provider error").with_description(err),
            err @ E::InvalidSignature(_) => Error::bad_request(err),
            err @ E::InvalidPayload(_) => Error::bad_request(err),
            E::Transition(err) => {
                Error::internal_server_error("Could not settle job").with_description(err)
            }
            E::Deliveries(err) => err.into(),
        }
    }
}

impl Role {
    /// Admins are allowed everything, anybody else only what their own role allows
    pub fn is_allowed(self, target_role: Role) -> Result<(), Error> {
        if self == Role::Admin || self == target_role {
            Ok(())
        } else {
            Err(Error::forbidden("Not allowed to access"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_allowed() {
        assert!(Role::Admin.is_allowed(Role::Admin).is_ok());
        assert!(Role::Admin.is_allowed(Role::Courier).is_ok());
        assert!(Role::Courier.is_allowed(Role::Courier).is_ok());
        assert!(Role::Customer.is_allowed(Role::Customer).is_ok());

        assert!(Role::Courier.is_allowed(Role::Admin).is_err());
        assert!(Role::Customer.is_allowed(Role::Courier).is_err());
        assert!(Role::Courier.is_allowed(Role::Customer).is_err());
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (Error::from(deliveries::Error::NotFound), StatusCode::NOT_FOUND),
            (
                deliveries::Error::InvalidInput(String::from("nope")).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                deliveries::Error::InvalidTransition {
                    from: String::from("Pending"),
                    to: String::from("Job complete"),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (deliveries::Error::NoActiveLeg("Pending").into(), StatusCode::CONFLICT),
            (
                deliveries::Error::MissingCoordinates("driver").into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                deliveries::Error::Storage(storage::Error::Corrupt(String::from("code 9"))).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                payments::Error::InvalidJobId(String::from("nope")).into(),
                StatusCode::BAD_REQUEST,
            ),
            (payments::Error::JobNotPayable("closed").into(), StatusCode::CONFLICT),
            (
                payments::Error::InvalidSignature("missing header").into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                payments::Error::Transition(deliveries::Error::NotFound).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                payments::Error::Deliveries(deliveries::Error::NotFound).into(),
                StatusCode::NOT_FOUND,
            ),
        ];

        for (error, status_code) in cases {
            assert_eq!(error.status_code(), status_code, "{error:?}");
        }
    }
}
