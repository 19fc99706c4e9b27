use axum::http::StatusCode;
use serde_json::json;

use crate::tests::helper;

#[tokio::test]
async fn test_assign() {
    let mut app = helper::setup_test_app().await;

    let (customer_id, customer) = helper::customer(&mut app, "ada@example.com").await;
    let (carl_id, carl) = helper::courier(&mut app, "carl@example.com").await;
    let (dina_id, _) = helper::courier(&mut app, "dina@example.com").await;
    let admin = helper::login(&mut app).await;

    let job = helper::create_job(&mut app, &customer).await;
    let job_id = job["id"].as_str().unwrap();
    let uri = format!("/api/management/jobs/{job_id}/assign");

    let (status_code, _) =
        helper::post(&mut app, &uri, &carl, Some(&json!({ "courierId": carl_id }))).await;
    assert_eq!(StatusCode::FORBIDDEN, status_code);

    let (status_code, body) =
        helper::post(&mut app, &uri, &admin, Some(&json!({ "courierId": customer_id }))).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!("User is not a courier", helper::get_error(&body).error);

    let (status_code, _) =
        helper::post(&mut app, &uri, &admin, Some(&json!({ "courierId": 999 }))).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);

    let (status_code, body) =
        helper::post(&mut app, &uri, &admin, Some(&json!({ "courierId": carl_id }))).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(carl_id, body["data"]["worker"].as_i64().unwrap());

    // assigning the same courier again is fine, another one is not
    let (status_code, _) =
        helper::post(&mut app, &uri, &admin, Some(&json!({ "courierId": carl_id }))).await;
    assert_eq!(StatusCode::OK, status_code);

    let (status_code, _) =
        helper::post(&mut app, &uri, &admin, Some(&json!({ "courierId": dina_id }))).await;
    assert_eq!(StatusCode::CONFLICT, status_code);

    let (status_code, _) = helper::progress(&mut app, &carl, job_id, "on-route-to-pick-up").await;
    assert_eq!(StatusCode::OK, status_code);
}

#[tokio::test]
async fn test_all_jobs() {
    let mut app = helper::setup_test_app().await;

    let (_, ada) = helper::customer(&mut app, "ada@example.com").await;
    let (_, eve) = helper::customer(&mut app, "eve@example.com").await;
    let admin = helper::login(&mut app).await;

    helper::create_job(&mut app, &ada).await;
    helper::create_job(&mut app, &eve).await;

    let (status_code, _) = helper::get(&mut app, "/api/management/jobs", &ada).await;
    assert_eq!(StatusCode::FORBIDDEN, status_code);

    let (status_code, body) = helper::get(&mut app, "/api/management/jobs", &admin).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(2, body["data"].as_array().unwrap().len());
}

#[tokio::test]
async fn test_driver_states() {
    let mut app = helper::setup_test_app().await;

    let (carl_id, carl) = helper::courier(&mut app, "carl@example.com").await;
    let (dina_id, dina) = helper::courier(&mut app, "dina@example.com").await;
    let admin = helper::login(&mut app).await;

    helper::post(&mut app, "/api/drivers/status", &carl, Some(&json!({ "active": true }))).await;
    helper::post(&mut app, "/api/drivers/status", &dina, Some(&json!({ "active": false }))).await;

    let (status_code, _) = helper::get(&mut app, "/api/management/driver-states", &carl).await;
    assert_eq!(StatusCode::FORBIDDEN, status_code);

    let (status_code, body) =
        helper::get(&mut app, "/api/management/driver-states", &admin).await;
    assert_eq!(StatusCode::OK, status_code);

    let states = body["data"].as_array().unwrap();
    assert_eq!(2, states.len());

    let active = |courier_id: i64| {
        states
            .iter()
            .find(|state| state["courierId"].as_i64() == Some(courier_id))
            .map(|state| state["active"].clone())
            .unwrap()
    };
    assert_eq!(json!(true), active(carl_id));
    assert_eq!(json!(false), active(dina_id));
}
