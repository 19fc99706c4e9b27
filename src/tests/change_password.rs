use axum::http::Method;
use axum::http::StatusCode;
use serde_json::json;

use crate::tests::helper;

#[tokio::test]
async fn test_change_password() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::login(&mut app).await;

    // wrong current password
    let payload = json!({ "currentPassword": "nope", "password": "veryverysecret" });
    let (status_code, body) = helper::send(
        &mut app,
        Method::PUT,
        "/api/users/me/password",
        Some(&access_token),
        Some(&payload),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!("Invalid password", helper::get_error(&body).error);

    // too short
    let payload = json!({ "currentPassword": "verysecret", "password": "short" });
    let (status_code, _) = helper::send(
        &mut app,
        Method::PUT,
        "/api/users/me/password",
        Some(&access_token),
        Some(&payload),
    )
    .await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);

    let payload = json!({ "currentPassword": "verysecret", "password": "veryverysecret" });
    let (status_code, body) = helper::send(
        &mut app,
        Method::PUT,
        "/api/users/me/password",
        Some(&access_token),
        Some(&payload),
    )
    .await;
    assert_eq!(StatusCode::OK, status_code);
    let new_access_token = format!("Bearer {}", body["data"]["access_token"].as_str().unwrap());

    // the old session is gone
    let (status_code, _) = helper::get(&mut app, "/api/users/me", &access_token).await;
    assert_eq!(StatusCode::FORBIDDEN, status_code);

    let (status_code, _) = helper::get(&mut app, "/api/users/me", &new_access_token).await;
    assert_eq!(StatusCode::OK, status_code);

    let (status_code, _) = helper::maybe_login(&mut app, "admin@localhost", "verysecret").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);

    helper::login_with_password(&mut app, "admin@localhost", "veryverysecret").await;
}
