use axum::http::StatusCode;
use serde_json::json;

use crate::tests::helper;

#[tokio::test]
async fn test_create_job() {
    let mut app = helper::setup_test_app().await;

    let (customer_id, customer) = helper::customer(&mut app, "ada@example.com").await;

    // status fields in the request are ignored
    let mut payload = helper::job_payload();
    payload["status"] = json!("complete");
    payload["orderStatus"] = json!("closed");

    let (status_code, body) = helper::maybe_create_job(&mut app, &customer, &payload).await;
    assert_eq!(StatusCode::CREATED, status_code);

    let job = &body["data"];
    assert_eq!(customer_id, job["creator"].as_i64().unwrap());
    assert!(job["worker"].is_null());
    assert_eq!("pending", job["status"]);
    assert_eq!("Pending", job["statusLabel"]);
    assert_eq!("open", job["orderStatus"]);
    assert_eq!("open", job["orderStatusLabel"]);
    assert_eq!("E14 9ED", job["origin"]["postcode"]);
    assert_eq!("Bob", job["destination"]["firstName"]);
    assert!(job["shortId"].as_str().unwrap().len() >= 8);

    let job_id = job["id"].as_str().unwrap();

    let (status_code, body) =
        helper::get(&mut app, &format!("/api/jobs/{job_id}"), &customer).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(job_id, body["data"]["id"]);

    let (status_code, body) =
        helper::get(&mut app, &format!("/api/jobs/{job_id}/status"), &customer).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!("Pending", body["data"]["status"]);

    let (status_code, body) =
        helper::get(&mut app, &format!("/api/jobs/{job_id}/order-status"), &customer).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!("open", body["data"]["orderStatus"]);

    let (status_code, body) =
        helper::get(&mut app, &format!("/api/jobs/{job_id}/driver"), &customer).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!("No courier assigned", helper::get_error(&body).error);
}

#[tokio::test]
async fn test_create_job_invalid() {
    let mut app = helper::setup_test_app().await;

    let (_, customer) = helper::customer(&mut app, "ada@example.com").await;

    let mut payload = helper::job_payload();
    payload["origin"]["firstName"] = json!("");
    let (status_code, body) = helper::maybe_create_job(&mut app, &customer, &payload).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!("The origin first name is required", helper::get_error(&body).error);

    let mut payload = helper::job_payload();
    payload["destination"]["city"] = json!("L0nd0n");
    let (status_code, body) = helper::maybe_create_job(&mut app, &customer, &payload).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(
        "The destination city can only contain letters",
        helper::get_error(&body).error
    );

    // nothing was stored
    let (_, body) = helper::get(&mut app, "/api/jobs", &customer).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_job_courier() {
    let mut app = helper::setup_test_app().await;

    let (_, courier) = helper::courier(&mut app, "carl@example.com").await;

    let (status_code, _) =
        helper::maybe_create_job(&mut app, &courier, &helper::job_payload()).await;
    assert_eq!(StatusCode::FORBIDDEN, status_code);
}

#[tokio::test]
async fn test_list_jobs() {
    let mut app = helper::setup_test_app().await;

    let (_, ada) = helper::customer(&mut app, "ada@example.com").await;
    let (_, eve) = helper::customer(&mut app, "eve@example.com").await;

    let first = helper::create_job(&mut app, &ada).await;
    let second = helper::create_job(&mut app, &ada).await;
    helper::create_job(&mut app, &eve).await;

    let (status_code, body) = helper::get(&mut app, "/api/jobs", &ada).await;
    assert_eq!(StatusCode::OK, status_code);

    let jobs = body["data"].as_array().unwrap();
    assert_eq!(2, jobs.len());

    let ids: Vec<_> = jobs.iter().map(|job| job["id"].clone()).collect();
    assert!(ids.contains(&first["id"]));
    assert!(ids.contains(&second["id"]));
}

#[tokio::test]
async fn test_job_visibility() {
    let mut app = helper::setup_test_app().await;

    let (_, ada) = helper::customer(&mut app, "ada@example.com").await;
    let (_, eve) = helper::customer(&mut app, "eve@example.com").await;
    let (_, courier) = helper::courier(&mut app, "carl@example.com").await;
    let admin = helper::login(&mut app).await;

    let job = helper::create_job(&mut app, &ada).await;
    let uri = format!("/api/jobs/{}", job["id"].as_str().unwrap());

    let (status_code, _) = helper::get(&mut app, &uri, &eve).await;
    assert_eq!(StatusCode::FORBIDDEN, status_code);

    let (status_code, _) = helper::get(&mut app, &uri, &courier).await;
    assert_eq!(StatusCode::OK, status_code);

    let (status_code, _) = helper::get(&mut app, &uri, &admin).await;
    assert_eq!(StatusCode::OK, status_code);

    let (status_code, body) = helper::get(&mut app, "/api/jobs/not-a-job", &admin).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!("Invalid job ID", helper::get_error(&body).error);

    let (status_code, _) = helper::get(
        &mut app,
        "/api/jobs/6ba7b810-9dad-11d1-80b4-00c04fd430c8",
        &admin,
    )
    .await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
}

#[tokio::test]
async fn test_close_job() {
    let mut app = helper::setup_test_app().await;

    let (_, ada) = helper::customer(&mut app, "ada@example.com").await;
    let (_, eve) = helper::customer(&mut app, "eve@example.com").await;

    let job = helper::create_job(&mut app, &ada).await;
    let uri = format!("/api/jobs/{}/close", job["id"].as_str().unwrap());

    let (status_code, _) = helper::post(&mut app, &uri, &eve, None).await;
    assert_eq!(StatusCode::FORBIDDEN, status_code);

    let (status_code, body) = helper::post(&mut app, &uri, &ada, None).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!("closed", body["data"]["orderStatus"]);

    // closing again is fine
    let (status_code, body) = helper::post(&mut app, &uri, &ada, None).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!("closed", body["data"]["orderStatus"]);

    // a closed job stays closed
    let uri = format!("/api/jobs/{}/cancel", job["id"].as_str().unwrap());
    let (status_code, body) = helper::post(&mut app, &uri, &ada, None).await;
    assert_eq!(StatusCode::CONFLICT, status_code);
    assert_eq!("Invalid transition", helper::get_error(&body).error);
}

#[tokio::test]
async fn test_cancel_job() {
    let mut app = helper::setup_test_app().await;

    let (_, ada) = helper::customer(&mut app, "ada@example.com").await;
    let (_, courier) = helper::courier(&mut app, "carl@example.com").await;
    let admin = helper::login(&mut app).await;

    let job = helper::create_job(&mut app, &ada).await;
    let job_id = job["id"].as_str().unwrap();

    let (status_code, body) =
        helper::post(&mut app, &format!("/api/jobs/{job_id}/cancel"), &admin, None).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!("cancelled", body["data"]["orderStatus"]);

    // no more deliveries for a cancelled job
    let (status_code, _) = helper::progress(&mut app, &courier, job_id, "on-route-to-pick-up").await;
    assert_eq!(StatusCode::CONFLICT, status_code);

    let (_, body) = helper::get(&mut app, &format!("/api/jobs/{job_id}"), &ada).await;
    assert_eq!("pending", body["data"]["status"]);
    assert_eq!("cancelled", body["data"]["orderStatus"]);
}
