//! Pet service
//!
//! Pet registry business rules. Every mutation goes through an ownership
//! check: the owner or an administrator may manage a pet, anyone else gets
//! `Forbidden`. The public profile only exposes pets that are still lost.

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::db::repositories::{HealthRecordRepository, PetRepository};
use crate::models::{
    generate_pet_id, Account, CreateHealthRecordInput, CreatePetInput, HealthRecord, Pet,
    UpdatePetInput,
};

const MAX_NAME_LENGTH: usize = 100;

/// Error types for pet service operations
#[derive(Debug, thiserror::Error)]
pub enum PetServiceError {
    #[error("Pet not found: {0}")]
    NotFound(String),

    #[error("You do not have access to this pet")]
    Forbidden,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// What a finder sees after scanning the QR code
#[derive(Debug, Clone, Serialize)]
pub struct PublicPetProfile {
    pub id: String,
    pub name: String,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub city: Option<String>,
    pub owner_name: Option<String>,
    /// The owner can be reached by phone (SMS / WhatsApp)
    pub has_phone: bool,
    /// The owner can be reached by e-mail
    pub has_email: bool,
}

impl From<&Pet> for PublicPetProfile {
    fn from(pet: &Pet) -> Self {
        Self {
            id: pet.id.clone(),
            name: pet.name.clone(),
            species: pet.species.clone(),
            breed: pet.breed.clone(),
            description: pet.description.clone(),
            photo_url: pet.photo_url.clone(),
            city: pet.city.clone(),
            owner_name: pet.owner_name.clone(),
            has_phone: pet.owner_phone.as_deref().is_some_and(|p| !p.trim().is_empty()),
            has_email: !pet.owner_email.trim().is_empty(),
        }
    }
}

/// Pet registry service
pub struct PetService {
    pets: Arc<dyn PetRepository>,
    health: Arc<dyn HealthRecordRepository>,
}

impl PetService {
    pub fn new(pets: Arc<dyn PetRepository>, health: Arc<dyn HealthRecordRepository>) -> Self {
        Self { pets, health }
    }

    /// Register a pet owned by `owner`
    pub async fn create(&self, owner: &Account, input: CreatePetInput) -> Result<Pet, PetServiceError> {
        let name = validate_name(&input.name)?;
        let owner_email = non_empty(input.owner_email).unwrap_or_else(|| owner.email.clone());
        let now = Utc::now();

        let pet = Pet {
            id: generate_pet_id(),
            owner_id: owner.id,
            name,
            species: non_empty(input.species),
            breed: non_empty(input.breed),
            description: non_empty(input.description),
            owner_name: non_empty(input.owner_name),
            owner_email,
            owner_phone: non_empty(input.owner_phone),
            photo_url: None,
            city: non_empty(input.city),
            address: non_empty(input.address),
            found: false,
            created_at: now,
            updated_at: now,
        };

        let pet = self.pets.create(&pet).await?;
        tracing::info!(pet_id = %pet.id, owner = %owner.email, "Pet registered");
        Ok(pet)
    }

    /// Pets owned by `owner`
    pub async fn list_for(&self, owner: &Account) -> Result<Vec<Pet>, PetServiceError> {
        Ok(self.pets.list_by_owner(owner.id).await?)
    }

    /// Every pet (administrators)
    pub async fn list_all(&self) -> Result<Vec<Pet>, PetServiceError> {
        Ok(self.pets.list_all().await?)
    }

    /// Get a pet the actor may manage
    pub async fn get(&self, actor: &Account, id: &str) -> Result<Pet, PetServiceError> {
        let pet = self
            .pets
            .get_by_id(id)
            .await
            .context("Failed to load pet")?
            .ok_or_else(|| PetServiceError::NotFound(id.to_string()))?;

        if !(actor.is_admin || pet.is_owned_by(actor.id)) {
            return Err(PetServiceError::Forbidden);
        }
        Ok(pet)
    }

    /// Apply a partial update
    pub async fn update(
        &self,
        actor: &Account,
        id: &str,
        input: UpdatePetInput,
    ) -> Result<Pet, PetServiceError> {
        let mut pet = self.get(actor, id).await?;

        if let Some(name) = input.name {
            pet.name = validate_name(&name)?;
        }
        if let Some(email) = input.owner_email {
            pet.owner_email = non_empty(Some(email)).ok_or_else(|| {
                PetServiceError::ValidationError("Owner email cannot be empty".to_string())
            })?;
        }
        merge(&mut pet.species, input.species);
        merge(&mut pet.breed, input.breed);
        merge(&mut pet.description, input.description);
        merge(&mut pet.owner_name, input.owner_name);
        merge(&mut pet.owner_phone, input.owner_phone);
        merge(&mut pet.city, input.city);
        merge(&mut pet.address, input.address);

        Ok(self.pets.update(&pet).await?)
    }

    /// Mark a pet found (hides its public profile) or lost again
    pub async fn set_found(&self, actor: &Account, id: &str, found: bool) -> Result<Pet, PetServiceError> {
        let mut pet = self.get(actor, id).await?;
        self.pets.set_found(id, found).await?;
        pet.found = found;
        tracing::info!(pet_id = %id, found, "Pet status changed");
        Ok(pet)
    }

    /// Record a new photo location for a pet
    pub async fn set_photo(&self, actor: &Account, id: &str, photo_url: &str) -> Result<Pet, PetServiceError> {
        let mut pet = self.get(actor, id).await?;
        self.pets.set_photo_url(id, photo_url).await?;
        pet.photo_url = Some(photo_url.to_string());
        Ok(pet)
    }

    /// Delete a pet and its health history. Returns the removed record so the
    /// caller can release its stored photo.
    pub async fn delete(&self, actor: &Account, id: &str) -> Result<Pet, PetServiceError> {
        let pet = self.get(actor, id).await?;
        self.pets.delete(id).await?;
        tracing::info!(pet_id = %id, actor = %actor.email, "Pet deleted");
        Ok(pet)
    }

    /// Public profile of a lost pet. Found or unknown pets are `NotFound`.
    pub async fn public_profile(&self, id: &str) -> Result<PublicPetProfile, PetServiceError> {
        let pet = self.lost_pet(id).await?;
        Ok(PublicPetProfile::from(&pet))
    }

    /// A pet that is still lost, for the finder flow
    pub async fn lost_pet(&self, id: &str) -> Result<Pet, PetServiceError> {
        match self.pets.get_by_id(id).await? {
            Some(pet) if !pet.found => Ok(pet),
            _ => Err(PetServiceError::NotFound(id.to_string())),
        }
    }

    /// Health history of a pet
    pub async fn list_health(&self, actor: &Account, id: &str) -> Result<Vec<HealthRecord>, PetServiceError> {
        self.get(actor, id).await?;
        Ok(self.health.list_by_pet(id).await?)
    }

    /// Add a vaccination or deworming record
    pub async fn add_health(
        &self,
        actor: &Account,
        id: &str,
        input: CreateHealthRecordInput,
    ) -> Result<HealthRecord, PetServiceError> {
        self.get(actor, id).await?;

        if input.name.trim().is_empty() {
            return Err(PetServiceError::ValidationError(
                "Record name cannot be empty".to_string(),
            ));
        }
        if input.next_due_on.is_some_and(|due| due < input.administered_on) {
            return Err(PetServiceError::ValidationError(
                "Next due date cannot be before the administration date".to_string(),
            ));
        }

        Ok(self.health.create(id, &input).await?)
    }

    /// Remove a health record
    pub async fn delete_health(&self, actor: &Account, id: &str, record_id: i64) -> Result<(), PetServiceError> {
        self.get(actor, id).await?;
        if !self.health.delete(id, record_id).await? {
            return Err(PetServiceError::NotFound(format!("health record {}", record_id)));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, PetServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PetServiceError::ValidationError(
            "Pet name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(PetServiceError::ValidationError(format!(
            "Pet name cannot exceed {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

/// Trimmed value, `None` when blank
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Present-but-blank clears the field; absent leaves it unchanged
fn merge(field: &mut Option<String>, update: Option<String>) {
    if update.is_some() {
        *field = non_empty(update);
    }
}
