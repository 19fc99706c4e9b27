use axum::http::StatusCode;

use crate::tests::helper;

#[tokio::test]
async fn test_invalid_json() {
    let mut app = helper::setup_test_app().await;

    let access_token = helper::login(&mut app).await;

    // missing data
    let body = r"{}";
    let (status_code, error) =
        helper::send_raw(&mut app, "/api/jobs", Some(&access_token), body, true).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    let error = helper::get_error(&error);
    assert_eq!("Data error".to_string(), error.error);
    assert_eq!(
        Some("Failed to deserialize the JSON body into the target type".to_string()),
        error.description
    );

    // syntax error
    let body = r#"{"}"#;
    let (status_code, error) =
        helper::send_raw(&mut app, "/api/jobs", Some(&access_token), body, true).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    let error = helper::get_error(&error);
    assert_eq!("JSON syntax error".to_string(), error.error);
    assert_eq!(
        Some("EOF while parsing a string at line 1 column 3".to_string()),
        error.description
    );

    // syntax error
    let body = r#"{"foo":{"bar":}}"#;
    let (status_code, error) =
        helper::send_raw(&mut app, "/api/jobs", Some(&access_token), body, true).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    let error = helper::get_error(&error);
    assert_eq!("JSON syntax error".to_string(), error.error);
    assert_eq!(
        Some("foo: expected value at line 1 column 15".to_string()),
        error.description
    );

    // missing content type
    let body = r"{}";
    let (status_code, error) =
        helper::send_raw(&mut app, "/api/jobs", Some(&access_token), body, false).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(
        "Missing `application/json` content type".to_string(),
        helper::get_error(&error).error
    );
}
