//! Pet model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered pet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pet {
    /// Short public identifier encoded in the QR link
    pub id: String,
    /// Owning account
    pub owner_id: i64,
    pub name: String,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub description: Option<String>,
    pub owner_name: Option<String>,
    /// Address notified when a finder reports the pet
    pub owner_email: String,
    pub owner_phone: Option<String>,
    pub photo_url: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    /// Found pets no longer have a public profile
    pub found: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pet {
    /// Whether the account may manage this pet
    pub fn is_owned_by(&self, account_id: i64) -> bool {
        self.owner_id == account_id
    }
}

/// Generate a pet identifier: 8 uppercase hex characters (e.g. "K7M2P9Q4")
pub fn generate_pet_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// Input for registering a pet
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePetInput {
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    /// Defaults to the registering account's e-mail
    #[serde(default)]
    pub owner_email: Option<String>,
    #[serde(default)]
    pub owner_phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Input for editing a pet profile; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePetInput {
    pub name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub description: Option<String>,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub owner_phone: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
}
