//! All API endpoint setup

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;

use crate::storage::Storage;

pub use current_user::CurrentUser;
pub use current_user::JwtKeys;
pub use request::Form;
pub use request::PathParameters;
pub use request::QueryParameters;
pub use request::parse_job_id;
pub use response::Error;
pub use response::Success;

mod current_user;
mod drivers;
mod jobs;
mod management;
mod payments;
mod request;
mod response;
mod users;
mod verification;

/// Largest webhook body accepted
const WEBHOOK_BODY_LIMIT: usize = 65_536;

/// Get the Axum router for all API routes
pub fn router<S: Storage>() -> Router {
    let users = Router::new()
        .route("/token", post(users::token::<S>))
        .route("/register/customer", post(users::register_customer::<S>))
        .route("/register/courier", post(users::register_courier::<S>))
        .route("/register/admin", post(users::register_admin::<S>))
        .route("/me", get(users::me::<S>))
        .route("/me/password", put(users::change_password::<S>))
        .route("/me/api-key", post(users::create_api_key::<S>))
        .route("/me/api-key/verify", post(users::verify_api_key::<S>))
        .route("/{user}/jobs", get(users::jobs::<S>));

    let jobs = Router::new()
        .route("/", get(jobs::list::<S>).post(jobs::create::<S>))
        .route("/{job}", get(jobs::single::<S>))
        .route("/{job}/status", get(jobs::status::<S>))
        .route("/{job}/order-status", get(jobs::order_status::<S>))
        .route("/{job}/driver", get(jobs::driver::<S>))
        .route("/{job}/eta", get(jobs::eta::<S>))
        .route("/{job}/close", post(jobs::close::<S>))
        .route("/{job}/cancel", post(jobs::cancel::<S>))
        .route("/{job}/on-route-to-pick-up", post(jobs::on_route_to_pick_up::<S>))
        .route("/{job}/parcel-collected", post(jobs::parcel_collected::<S>))
        .route("/{job}/on-route-to-drop-off", post(jobs::on_route_to_drop_off::<S>))
        .route("/{job}/complete", post(jobs::complete::<S>))
        .route("/{job}/worker-notes", put(jobs::worker_notes::<S>))
        .route("/{job}/payment-intent", post(jobs::payment_intent::<S>));

    let drivers = Router::new()
        .route("/me/jobs", get(drivers::my_jobs::<S>))
        .route("/{courier}/jobs", get(drivers::jobs::<S>))
        .route("/location", post(drivers::location::<S>))
        .route("/status", post(drivers::status::<S>));

    let management = Router::new()
        .route("/jobs", get(management::jobs::<S>))
        .route("/jobs/{job}/assign", post(management::assign::<S>))
        .route("/driver-states", get(management::driver_states::<S>));

    let verify = Router::new().route("/postcode", post(verification::postcode::<S>));

    let payments = Router::new()
        .route("/config", get(payments::config))
        .route(
            "/webhook",
            post(payments::webhook::<S>).layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT)),
        );

    Router::new()
        .nest("/users", users)
        .nest("/jobs", jobs)
        .nest("/drivers", drivers)
        .nest("/management", management)
        .nest("/verify", verify)
        .nest("/payments", payments)
}
