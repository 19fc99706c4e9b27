use axum::http::StatusCode;

use crate::tests::helper;

#[tokio::test]
async fn test_login() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::login(&mut app).await;
    assert!(access_token.len() > 10);
}

#[tokio::test]
async fn test_login_invalid() {
    let mut app = helper::setup_test_app().await;

    let (status_code, body) = helper::maybe_login(&mut app, "admin@localhost", "nope").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!("Invalid user", helper::get_error(&body).error);

    let (status_code, body) = helper::maybe_login(&mut app, "nobody@localhost", "verysecret").await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!("Invalid user", helper::get_error(&body).error);
}

#[tokio::test]
async fn test_me_without_token() {
    let mut app = helper::setup_test_app().await;

    let (status_code, _) =
        helper::send(&mut app, axum::http::Method::GET, "/api/users/me", None, None).await;
    assert_eq!(StatusCode::FORBIDDEN, status_code);

    let (status_code, _) = helper::get(&mut app, "/api/users/me", "Bearer nope").await;
    assert_eq!(StatusCode::FORBIDDEN, status_code);
}
