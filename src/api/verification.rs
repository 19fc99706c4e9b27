//! Input verification helpers for clients

use axum::Extension;
use serde::Deserialize;
use serde::Serialize;

use crate::deliveries::Deliveries;
use crate::storage::Storage;

use super::Error;
use super::QueryParameters;
use super::Success;

#[derive(Debug, Deserialize)]
pub struct PostcodeQuery {
    #[serde(default)]
    postcode: String,
}

#[derive(Debug, Serialize)]
pub struct PostcodeResponse {
    postcode: String,
    latitude: String,
    longitude: String,
}

/// Check whether a postcode is in the served area
///
/// Request:
/// ```sh
/// curl -v -XPOST 'http://localhost:8080/api/verify/postcode?postcode=E14%209ED'
/// ```
///
/// Response:
/// ```json
/// { "data": { "postcode": "E14 9ED", "latitude": "51.503608", "longitude": "-0.018363" } }
/// ```
pub async fn postcode<S: Storage>(
    Extension(deliveries): Extension<Deliveries<S>>,
    QueryParameters(query): QueryParameters<PostcodeQuery>,
) -> Result<Success<PostcodeResponse>, Error> {
    let point = deliveries
        .postcodes()
        .lookup(&query.postcode)
        .ok_or_else(|| Error::not_found("Unknown postcode"))?;

    Ok(Success::ok(PostcodeResponse {
        postcode: query.postcode,
        latitude: point.latitude,
        longitude: point.longitude,
    }))
}
