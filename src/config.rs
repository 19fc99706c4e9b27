//! Configuration, read from the environment
//!
//! Empty variables count as not set

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use url::Url;

use crate::password::generate;
use crate::utils::env_var;
use crate::utils::env_var_or_else;
use crate::utils::env_var_parsed_or;

const DEFAULT_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_POSTCODES_PATH: &str = "data/london_postcodes.csv";
const DEFAULT_TRACKING_BASE_URL: &str = "http://localhost:8080/";
const DEFAULT_ROUTING_BASE_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/";

/// All configuration of the service
#[derive(Clone, Debug)]
pub struct Config {
    /// Address to listen on
    pub address: SocketAddr,

    /// Postgres connection string, the memory storage is used without it
    pub database_url: Option<String>,

    /// Secret for signing JWT tokens
    pub jwt_secret: String,

    /// Admin created on an empty user store
    pub initial_admin: InitialAdmin,

    /// CSV file with `postcode,latitude,longitude` rows
    pub postcodes_path: PathBuf,

    /// Base URL of the public tracking page
    pub tracking_base_url: Url,

    /// Travel time provider
    pub routing: RoutingConfig,

    /// Payment provider
    pub payments: PaymentsConfig,
}

/// Credentials of the first admin
#[derive(Clone, Debug)]
pub struct InitialAdmin {
    pub email: String,
    pub password: String,
}

/// Travel time provider configuration
#[derive(Clone, Debug)]
pub struct RoutingConfig {
    pub base_url: Url,
    pub api_key: String,
    pub timeout: Duration,

    /// Total attempts per lookup, including the first one
    pub max_attempts: u32,
}

/// Payment provider configuration
#[derive(Clone, Debug)]
pub struct PaymentsConfig {
    pub api_base: Url,
    pub secret_key: String,
    pub publishable_key: String,
    pub webhook_secret: String,
    pub timeout: Duration,

    /// Price of a job in the smallest currency unit
    pub amount: i64,
    pub currency: String,
}

impl Config {
    /// Read the configuration from the environment
    ///
    /// # Errors
    ///
    /// Will return `Err` when a variable is set to something unparsable
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            address: address_from_env()?,
            database_url: env_var("DATABASE_URL"),
            jwt_secret: env_var_or_else("JWT_SECRET", || {
                let jwt_secret = generate();
                tracing::info!("`JWT_SECRET` is not set, generating temporary one: {jwt_secret}");
                jwt_secret
            }),
            initial_admin: InitialAdmin {
                email: env_var_or_else("INITIAL_EMAIL", || {
                    let email = String::from("admin@localhost");
                    tracing::info!("`INITIAL_EMAIL` is not set, using: {email}");
                    email
                }),
                password: env_var_or_else("INITIAL_PASSWORD", || {
                    let password = generate();
                    tracing::info!("`INITIAL_PASSWORD` is not set, generating new one: {password}");
                    password
                }),
            },
            postcodes_path: PathBuf::from(env_var_or_else("POSTCODES_PATH", || {
                String::from(DEFAULT_POSTCODES_PATH)
            })),
            tracking_base_url: url_from_env("TRACKING_BASE_URL", DEFAULT_TRACKING_BASE_URL)?,
            routing: RoutingConfig {
                base_url: url_from_env("ROUTING_BASE_URL", DEFAULT_ROUTING_BASE_URL)?,
                api_key: env_var_or_else("ROUTING_API_KEY", || {
                    tracing::warn!("`ROUTING_API_KEY` is not set, journey estimates will fail");
                    String::new()
                }),
                timeout: Duration::from_secs(env_var_parsed_or("ROUTING_TIMEOUT_SECS", 10)?),
                max_attempts: env_var_parsed_or("ROUTING_MAX_ATTEMPTS", 3)?,
            },
            payments: PaymentsConfig {
                api_base: url_from_env("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE)?,
                secret_key: env_var_or_else("STRIPE_SECRET_KEY", || {
                    tracing::warn!("`STRIPE_SECRET_KEY` is not set, payments will fail");
                    String::new()
                }),
                publishable_key: env_var_or_else("STRIPE_PUBLISHABLE_KEY", String::new),
                webhook_secret: env_var_or_else("STRIPE_WEBHOOK_SECRET", || {
                    tracing::warn!("`STRIPE_WEBHOOK_SECRET` is not set, webhooks are rejected");
                    generate()
                }),
                timeout: Duration::from_secs(env_var_parsed_or("PAYMENT_TIMEOUT_SECS", 15)?),
                amount: env_var_parsed_or("PAYMENT_AMOUNT", 850)?,
                currency: env_var_or_else("PAYMENT_CURRENCY", || String::from("gbp")),
            },
        })
    }
}

fn address_from_env() -> Result<SocketAddr> {
    let mut address = env_var_or_else("ADDRESS", || String::from(DEFAULT_ADDRESS))
        .parse::<SocketAddr>()
        .context("Invalid `ADDRESS`")?;

    // optional override of just the port
    if let Some(port) = env_var("PORT") {
        address.set_port(port.parse::<u16>().context("Invalid `PORT`")?);
    }

    Ok(address)
}

fn url_from_env(var_name: &'static str, default: &str) -> Result<Url> {
    let value = env_var_or_else(var_name, || default.to_string());

    Url::parse(&value).with_context(|| format!("Invalid `{var_name}`: {value}"))
}
