//! Users, their roles and API keys

use anyhow::Result;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::config::InitialAdmin;
use crate::password::hash;
use crate::storage::CreateUserValues;
use crate::storage::Storage;

/// User roles
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Manage everything
    Admin,
    /// Request deliveries
    Customer,
    /// Carry out deliveries
    Courier,
}

#[derive(Clone, Debug)]
pub struct User {
    pub id: i64,
    pub session_id: Uuid,
    pub email: String,
    pub name: String,
    pub phone_number: String,
    pub hashed_password: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_courier(&self) -> bool {
        self.role == Role::Courier
    }
}

/// Hashed API key of a user
///
/// Only one key is live per user, issuing a new one overwrites the old one
#[derive(Clone, Debug)]
pub struct ApiKey {
    pub user_id: i64,
    pub hashed_key: String,
    pub last_modified_at: DateTime<Utc>,
}

/// Create the initial admin when the store has no users at all
pub async fn ensure_initial_user<S: Storage>(storage: &S, initial_admin: &InitialAdmin) -> Result<()> {
    let user = storage.find_any_single_user().await?;

    if user.is_none() {
        let hashed_password = hash(&initial_admin.password)?;

        let values = CreateUserValues {
            session_id: &Uuid::new_v4(),
            role: Role::Admin,
            email: &initial_admin.email,
            name: "Administrator",
            phone_number: "",
            hashed_password: &hashed_password,
        };

        let user = storage.create_user(&values).await?;

        tracing::info!("Created initial admin {} with ID {}", user.email, user.id);
    }

    Ok(())
}
