use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use http_body_util::BodyExt;
use serde_json::Value;
use serde_json::json;
use tower::Service;
use url::Url;
use uuid::Uuid;

use crate::config::Config;
use crate::config::InitialAdmin;
use crate::config::PaymentsConfig;
use crate::config::RoutingConfig;
use crate::location::Point;
use crate::location::RouteError;
use crate::location::TravelTime;
use crate::payments::IntentRequest;
use crate::payments::PaymentIntent;
use crate::payments::PaymentProvider;
use crate::payments::ProviderError;
use crate::payments::sign;
use crate::postcodes::Postcodes;
use crate::setup_app;
use crate::storage::Memory;

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub const TRAVEL_SECONDS: i64 = 1200;

pub const PASSWORD: &str = "verysecret";

/// Error response
#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    pub error: String,
    pub description: Option<String>,
}

/// Travel time that never leaves the test, remembers what was asked
#[derive(Debug, Default)]
pub struct FakeTravelTime {
    pub calls: Mutex<Vec<(Point, Point)>>,
}

#[async_trait]
impl TravelTime for FakeTravelTime {
    async fn duration(&self, from: &Point, to: &Point) -> Result<i64, RouteError> {
        self.calls.lock().unwrap().push((from.clone(), to.clone()));

        Ok(TRAVEL_SECONDS)
    }
}

/// Intent request as seen by the fake provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedIntent {
    pub job_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub idempotency_key: String,
}

#[derive(Debug, Default)]
pub struct FakePaymentProvider {
    pub requests: Mutex<Vec<RecordedIntent>>,
}

#[async_trait]
impl PaymentProvider for FakePaymentProvider {
    async fn create_payment_intent(
        &self,
        request: &IntentRequest<'_>,
    ) -> Result<PaymentIntent, ProviderError> {
        self.requests.lock().unwrap().push(RecordedIntent {
            job_id: *request.job_id,
            amount: request.amount,
            currency: request.currency.to_string(),
            idempotency_key: request.idempotency_key.to_string(),
        });

        Ok(PaymentIntent {
            id: format!("pi_{}", request.job_id.simple()),
            client_secret: format!("pi_{}_secret_test", request.job_id.simple()),
        })
    }
}

/// The app with handles to its fakes
pub struct TestApp {
    pub router: Router,
    pub travel_time: Arc<FakeTravelTime>,
    pub payment_provider: Arc<FakePaymentProvider>,
}

fn test_config() -> Config {
    Config {
        address: "127.0.0.1:0".parse().unwrap(),
        database_url: None,
        jwt_secret: String::from("verysecret"),
        initial_admin: InitialAdmin {
            email: String::from("admin@localhost"),
            password: String::from(PASSWORD),
        },
        postcodes_path: concat!(env!("CARGO_MANIFEST_DIR"), "/data/london_postcodes.csv").into(),
        tracking_base_url: Url::parse("http://localhost:8080/").unwrap(),
        routing: RoutingConfig {
            base_url: Url::parse("http://localhost:9/distancematrix").unwrap(),
            api_key: String::from("routing-key"),
            timeout: Duration::from_secs(1),
            max_attempts: 1,
        },
        payments: PaymentsConfig {
            api_base: Url::parse("http://localhost:9/").unwrap(),
            secret_key: String::from("sk_test"),
            publishable_key: String::from("pk_test_123"),
            webhook_secret: String::from(WEBHOOK_SECRET),
            timeout: Duration::from_secs(1),
            amount: 1500,
            currency: String::from("gbp"),
        },
    }
}

/// Setup the deliveries app on memory storage with fake providers
pub async fn setup_test_app_with_fakes() -> TestApp {
    let config = test_config();
    let postcodes = Postcodes::from_path(&config.postcodes_path).unwrap();

    let travel_time = Arc::new(FakeTravelTime::default());
    let payment_provider = Arc::new(FakePaymentProvider::default());

    let router = setup_app(
        &config,
        Memory::new(),
        postcodes,
        travel_time.clone(),
        payment_provider.clone(),
    )
    .await
    .unwrap();

    TestApp {
        router,
        travel_time,
        payment_provider,
    }
}

pub async fn setup_test_app() -> Router {
    setup_test_app_with_fakes().await.router
}

/// Send a request, the response body is parsed as JSON when possible
pub async fn send(
    app: &mut Router,
    method: Method,
    uri: &str,
    access_token: Option<&str>,
    payload: Option<&Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(access_token) = access_token {
        builder = builder.header(AUTHORIZATION, access_token);
    }

    let body = if let Some(payload) = payload {
        builder = builder.header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
        Body::from(serde_json::to_vec(payload).unwrap())
    } else {
        Body::empty()
    };

    call(app, builder.body(body).unwrap()).await
}

/// Send a request with a raw body, optionally without content type
pub async fn send_raw(
    app: &mut Router,
    uri: &str,
    access_token: Option<&str>,
    body: &str,
    with_content_type: bool,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(Method::POST).uri(uri);

    if let Some(access_token) = access_token {
        builder = builder.header(AUTHORIZATION, access_token);
    }

    if with_content_type {
        builder = builder.header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
    }

    call(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

pub async fn call(app: &mut Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&body[..]).unwrap()
    };

    (status_code, value)
}

pub async fn get(app: &mut Router, uri: &str, access_token: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, Some(access_token), None).await
}

pub async fn post(
    app: &mut Router,
    uri: &str,
    access_token: &str,
    payload: Option<&Value>,
) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(access_token), payload).await
}

/// Plain text version of a GET request
pub async fn root(app: &mut Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await.unwrap();
    let status_code = response.status();

    let body = response.into_body().collect().await.unwrap().to_bytes();

    (status_code, String::from_utf8_lossy(&body[..]).to_string())
}

pub async fn maybe_login(app: &mut Router, email: &str, password: &str) -> (StatusCode, Value) {
    let payload = json!({ "email": email, "password": password });

    send(app, Method::POST, "/api/users/token", None, Some(&payload)).await
}

pub async fn login_with_password(app: &mut Router, email: &str, password: &str) -> String {
    let (status_code, body) = maybe_login(app, email, password).await;

    assert_eq!(StatusCode::OK, status_code, "{body}");

    get_access_token(&body)
}

/// Access token of the initial admin
pub async fn login(app: &mut Router) -> String {
    login_with_password(app, "admin@localhost", PASSWORD).await
}

pub async fn maybe_register(
    app: &mut Router,
    role: &str,
    payload: &Value,
    access_token: Option<&str>,
) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/api/users/register/{role}"),
        access_token,
        Some(payload),
    )
    .await
}

/// Register a user with a known password, returns its ID and access token
pub async fn register_and_login(app: &mut Router, role: &str, email: &str) -> (i64, String) {
    let payload = json!({ "email": email, "name": "Test User", "password": PASSWORD });

    let (status_code, body) = maybe_register(app, role, &payload, None).await;
    assert_eq!(StatusCode::CREATED, status_code, "{body}");

    let id = body["data"]["id"].as_i64().unwrap();
    let access_token = login_with_password(app, email, PASSWORD).await;

    (id, access_token)
}

pub async fn customer(app: &mut Router, email: &str) -> (i64, String) {
    register_and_login(app, "customer", email).await
}

pub async fn courier(app: &mut Router, email: &str) -> (i64, String) {
    register_and_login(app, "courier", email).await
}

/// Job between two served postcodes
pub fn job_payload() -> Value {
    json!({
        "origin": {
            "firstName": "Ada",
            "phoneNumber": "07700900001",
            "firstLineAddress": "1 High Street",
            "city": "London",
            "postcode": "E14 9ED"
        },
        "destination": {
            "firstName": "Bob",
            "phoneNumber": "07700900002",
            "firstLineAddress": "2 Low Road",
            "city": "London",
            "postcode": "N16 8RP"
        }
    })
}

pub async fn maybe_create_job(
    app: &mut Router,
    access_token: &str,
    payload: &Value,
) -> (StatusCode, Value) {
    post(app, "/api/jobs", access_token, Some(payload)).await
}

/// Create a job, returns its data
pub async fn create_job(app: &mut Router, access_token: &str) -> Value {
    let (status_code, body) = maybe_create_job(app, access_token, &job_payload()).await;

    assert_eq!(StatusCode::CREATED, status_code, "{body}");

    body["data"].clone()
}

/// Move a job to a new delivery status, like `parcel-collected`
pub async fn progress(
    app: &mut Router,
    access_token: &str,
    job_id: &str,
    step: &str,
) -> (StatusCode, Value) {
    post(app, &format!("/api/jobs/{job_id}/{step}"), access_token, None).await
}

/// Deliver a signed webhook event
pub async fn webhook(app: &mut Router, payload: &Value, secret: &str) -> (StatusCode, Value) {
    let body = serde_json::to_vec(payload).unwrap();
    let signature = sign(&body, secret, chrono::Utc::now().timestamp());

    webhook_with_signature(app, body, Some(&signature)).await
}

pub async fn webhook_with_signature(
    app: &mut Router,
    body: Vec<u8>,
    signature: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/payments/webhook")
        .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());

    if let Some(signature) = signature {
        builder = builder.header("Stripe-Signature", signature);
    }

    call(app, builder.body(Body::from(body)).unwrap()).await
}

/// Payment event as the provider sends it
pub fn payment_event(kind: &str, job_id: Option<&str>) -> Value {
    let metadata = job_id.map_or_else(|| json!({}), |job_id| json!({ "order_id": job_id }));

    json!({
        "id": "evt_test",
        "type": kind,
        "data": {
            "object": {
                "id": "pi_test",
                "object": "payment_intent",
                "metadata": metadata
            }
        }
    })
}

pub fn get_error(body: &Value) -> Error {
    Error {
        error: body["error"].as_str().map(ToString::to_string).unwrap(),
        description: body
            .get("description")
            .and_then(Value::as_str)
            .map(ToString::to_string),
    }
}

fn get_access_token(body: &Value) -> String {
    body["data"]["access_token"]
        .as_str()
        .map(|access_token| format!("Bearer {access_token}"))
        .unwrap()
}
