#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
// easier to use when using the functions as callback of foreign functions
#![allow(clippy::needless_pass_by_value)]

use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use axum::Extension;
use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use crate::api::JwtKeys;
use crate::api::router;
use crate::config::Config;
use crate::deliveries::Deliveries;
use crate::location::DistanceMatrix;
use crate::location::TravelTime;
use crate::payments::PaymentProvider;
use crate::payments::Payments;
use crate::payments::Stripe;
use crate::postcodes::Postcodes;
use crate::storage::Memory;
use crate::storage::Postgres;
use crate::storage::Storage;
use crate::users::ensure_initial_user;

mod api;
mod config;
mod deliveries;
mod drivers;
mod graceful_shutdown;
mod jobs;
mod location;
mod password;
mod payments;
mod postcodes;
mod root;
mod storage;
#[cfg(test)]
mod tests;
mod users;
mod utils;

const DEFAULT_RUST_LOG: &str = "portal_deliveries=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    setup_environment();
    setup_tracing();

    let config = Config::from_env()?;

    let postcodes = Postcodes::from_path(&config.postcodes_path).with_context(|| {
        format!("Could not load postcodes from {}", config.postcodes_path.display())
    })?;

    let travel_time: Arc<dyn TravelTime> =
        Arc::new(DistanceMatrix::new(&config.routing).context("Could not setup routing client")?);
    let payment_provider: Arc<dyn PaymentProvider> =
        Arc::new(Stripe::new(&config.payments).context("Could not setup payment client")?);

    let app = if let Some(database_url) = &config.database_url {
        let storage = Postgres::new(database_url).await?;

        setup_app(&config, storage, postcodes, travel_time, payment_provider).await?
    } else {
        tracing::warn!("`DATABASE_URL` is not set, using memory storage");

        setup_app(&config, Memory::new(), postcodes, travel_time, payment_provider).await?
    };

    let listener = tokio::net::TcpListener::bind(config.address).await?;
    tracing::info!("Listening on {}", config.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(graceful_shutdown::handler())
        .await?;

    Ok(())
}

/// Create and setup the app with its dependencies
///
/// # Errors
///
/// Will return `Err` if any of its dependencies fail to load:
/// - Initial user setup
pub async fn setup_app<S: Storage>(
    config: &Config,
    storage: S,
    postcodes: Postcodes,
    travel_time: Arc<dyn TravelTime>,
    payment_provider: Arc<dyn PaymentProvider>,
) -> Result<Router> {
    ensure_initial_user(&storage, &config.initial_admin).await?;

    let deliveries = Deliveries::new(
        storage.clone(),
        Arc::new(postcodes),
        travel_time,
        config.tracking_base_url.clone(),
    );

    let payments = Payments::new(
        deliveries.clone(),
        payment_provider,
        config.payments.webhook_secret.clone(),
    );

    Ok(create_router(config, storage, deliveries, payments))
}

/// Create the router for the deliveries service
fn create_router<S: Storage>(
    config: &Config,
    storage: S,
    deliveries: Deliveries<S>,
    payments: Payments<S>,
) -> Router {
    let jwt_keys = JwtKeys::new(config.jwt_secret.as_bytes());

    Router::new()
        .route("/", get(root::root))
        .route("/track/{short_id}", get(root::track::<S>))
        .nest("/api", router::<S>())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(storage))
        .layer(Extension(jwt_keys))
        .layer(Extension(deliveries))
        .layer(Extension(payments))
        .layer(Extension(config.payments.clone()))
}

fn setup_environment() {
    dotenvy::dotenv().ok();
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;

    registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.into()),
        ))
        .with(fmt::layer())
        .init();
}
