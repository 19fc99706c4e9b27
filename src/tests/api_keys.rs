use axum::body::Body;
use axum::http::Method;
use axum::http::Request;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;

use crate::tests::helper;

async fn verify(
    app: &mut axum::Router,
    access_token: &str,
    api_key: Option<&str>,
) -> StatusCode {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/users/me/api-key/verify")
        .header(AUTHORIZATION, access_token);

    if let Some(api_key) = api_key {
        builder = builder.header("API-Key", api_key);
    }

    let (status_code, _) = helper::call(app, builder.body(Body::empty()).unwrap()).await;

    status_code
}

#[tokio::test]
async fn test_api_key() {
    let mut app = helper::setup_test_app().await;

    let (_, access_token) = helper::customer(&mut app, "ada@example.com").await;

    // nothing issued yet
    assert_eq!(
        StatusCode::FORBIDDEN,
        verify(&mut app, &access_token, Some("nope")).await
    );

    let (status_code, body) =
        helper::post(&mut app, "/api/users/me/api-key", &access_token, None).await;
    assert_eq!(StatusCode::CREATED, status_code);
    let first_key = body["data"]["apiKey"].as_str().unwrap().to_string();
    assert_eq!(32, first_key.len());
    assert!(body["data"]["lastModifiedAt"].is_string());

    assert_eq!(
        StatusCode::OK,
        verify(&mut app, &access_token, Some(&first_key)).await
    );
    assert_eq!(
        StatusCode::BAD_REQUEST,
        verify(&mut app, &access_token, None).await
    );

    // a new key replaces the old one
    let (_, body) = helper::post(&mut app, "/api/users/me/api-key", &access_token, None).await;
    let second_key = body["data"]["apiKey"].as_str().unwrap().to_string();
    assert_ne!(first_key, second_key);

    assert_eq!(
        StatusCode::FORBIDDEN,
        verify(&mut app, &access_token, Some(&first_key)).await
    );
    assert_eq!(
        StatusCode::OK,
        verify(&mut app, &access_token, Some(&second_key)).await
    );
}
