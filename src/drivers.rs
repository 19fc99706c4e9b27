//! Courier presence: whether they are active and where they were last seen

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

/// Active flag of a courier
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverState {
    pub courier_id: i64,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Last reported location of a courier
///
/// Coordinates are stored as a single `lat,lon` string
#[derive(Clone, Debug)]
pub struct DriverLocation {
    pub courier_id: i64,
    pub coordinates: String,
    pub updated_at: DateTime<Utc>,
}
