//! Delivery jobs and their two status axes
//!
//! The delivery status follows the parcel, the order status follows the payment. Both are stored
//! as small integer codes.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Progress of the parcel
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryStatus {
    Pending,
    EnRouteToPickup,
    ParcelCollected,
    EnRouteToDropoff,
    Complete,
}

/// Which side of the job a courier is travelling to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Leg {
    Origin,
    Destination,
}

impl DeliveryStatus {
    /// Stored code
    pub fn code(self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::EnRouteToPickup => 1,
            Self::ParcelCollected => 2,
            Self::EnRouteToDropoff => 3,
            Self::Complete => 4,
        }
    }

    /// Status from a stored code
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::EnRouteToPickup),
            2 => Some(Self::ParcelCollected),
            3 => Some(Self::EnRouteToDropoff),
            4 => Some(Self::Complete),
            _ => None,
        }
    }

    /// Human readable label
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::EnRouteToPickup => "On route to pick up location",
            Self::ParcelCollected => "Parcel collected",
            Self::EnRouteToDropoff => "On route to drop off location",
            Self::Complete => "Job complete",
        }
    }

    /// The only status this one may advance to
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::EnRouteToPickup),
            Self::EnRouteToPickup => Some(Self::ParcelCollected),
            Self::ParcelCollected => Some(Self::EnRouteToDropoff),
            Self::EnRouteToDropoff => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    /// Delivery progress never skips a stage and never goes back
    pub fn can_advance_to(self, new: Self) -> bool {
        self.next() == Some(new)
    }

    /// The journey leg a courier is on, if any
    pub fn leg(self) -> Option<Leg> {
        match self {
            Self::EnRouteToPickup => Some(Leg::Origin),
            Self::EnRouteToDropoff => Some(Leg::Destination),
            Self::Pending | Self::ParcelCollected | Self::Complete => None,
        }
    }
}

/// Commercial state of a job
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Open,
    Cancelled,
    Closed,
}

impl OrderStatus {
    /// Stored code
    pub fn code(self) -> i16 {
        match self {
            Self::Open => 0,
            Self::Cancelled => 1,
            Self::Closed => 2,
        }
    }

    /// Status from a stored code
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Open),
            1 => Some(Self::Cancelled),
            2 => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Cancelled => "cancelled",
            Self::Closed => "closed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Closed)
    }

    /// Only an open order can be closed or cancelled
    ///
    /// Staying on the same status is not a transition, callers treat it as a no-op.
    pub fn can_transition_to(self, new: Self) -> bool {
        !self.is_terminal() && new.is_terminal()
    }
}

/// Pickup or drop-off details of a job
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub company_name: String,
    pub first_name: String,
    pub second_name: String,
    pub phone_number: String,
    pub email_address: String,
    pub first_line_address: String,
    pub second_line_address: String,
    pub third_line_address: String,
    pub town: String,
    pub city: String,
    pub postcode: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: String,
}

impl Address {
    /// Check the intake rules, returns the first problem found
    ///
    /// `side` ends up in the message, e.g. `origin`
    pub fn validate(&self, side: &str) -> Result<(), String> {
        if self.first_name.trim().is_empty() {
            return Err(format!("The {side} first name is required"));
        }

        if !is_alphabetic(&self.first_name) {
            return Err(format!("The {side} first name can only contain letters"));
        }

        if !self.second_name.is_empty() && !is_alphabetic(&self.second_name) {
            return Err(format!("The {side} second name can only contain letters"));
        }

        if self.first_line_address.trim().is_empty() {
            return Err(format!("The {side} first line of the address is required"));
        }

        if !self.town.is_empty() && !is_alphabetic(&self.town) {
            return Err(format!("The {side} town can only contain letters"));
        }

        if self.city.trim().is_empty() {
            return Err(format!("The {side} city is required"));
        }

        if !is_alphabetic(&self.city) {
            return Err(format!("The {side} city can only contain letters"));
        }

        if self.postcode.trim().is_empty() {
            return Err(format!("The {side} postcode is required"));
        }

        if !self
            .postcode
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ')
        {
            return Err(format!("The {side} postcode can only contain letters and digits"));
        }

        if !self.email_address.is_empty() && !looks_like_email(&self.email_address) {
            return Err(format!("The {side} email address is invalid"));
        }

        Ok(())
    }

    /// Stored coordinates, only when both are set
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

fn is_alphabetic(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_alphabetic() || c == ' ' || c == '-' || c == '\'')
}

pub(crate) fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[derive(Clone, Debug)]
pub struct Job {
    pub id: Uuid,
    pub short_id: String,
    pub tracking_url: String,
    pub creator: i64,
    pub worker: Option<i64>,
    pub status: DeliveryStatus,
    pub order_status: OrderStatus,
    pub origin: Address,
    pub destination: Address,
    pub worker_notes: String,
    pub created_at: DateTime<Utc>,
    pub last_time_modified: DateTime<Utc>,
}

impl Job {
    /// Address the current journey leg leads to
    pub fn address_for(&self, leg: Leg) -> &Address {
        match leg {
            Leg::Origin => &self.origin,
            Leg::Destination => &self.destination,
        }
    }
}

/// Short, URL safe identifier of a job
///
/// Encodes the last 6 bytes of the UUID, `9`, `-` and `_` are escaped so the result only contains
/// letters and digits.
pub fn short_id(id: &Uuid) -> String {
    let node = &id.as_bytes()[10..];

    let mut short_id = String::with_capacity(12);

    for c in URL_SAFE_NO_PAD.encode(node).chars() {
        match c {
            '9' => short_id.push_str("99"),
            '-' => short_id.push_str("90"),
            '_' => short_id.push_str("91"),
            c => short_id.push(c),
        }
    }

    short_id
}
