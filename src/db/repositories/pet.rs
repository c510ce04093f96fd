//! Pet repository
//!
//! Database operations for registered pets.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Pet;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Pet record store
#[async_trait]
pub trait PetRepository: Send + Sync {
    /// Insert a pet with its pre-generated id
    async fn create(&self, pet: &Pet) -> Result<Pet>;

    /// Get pet by id
    async fn get_by_id(&self, id: &str) -> Result<Option<Pet>>;

    /// List pets owned by an account, newest first
    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Pet>>;

    /// List every pet, newest first
    async fn list_all(&self) -> Result<Vec<Pet>>;

    /// Persist editable profile fields
    async fn update(&self, pet: &Pet) -> Result<Pet>;

    /// Mark a pet found or lost. Returns false when the pet does not exist.
    async fn set_found(&self, id: &str, found: bool) -> Result<bool>;

    /// Point the pet at a newly uploaded photo
    async fn set_photo_url(&self, id: &str, photo_url: &str) -> Result<bool>;

    /// Delete a pet (health records cascade). Returns false when it did not exist.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// SQLx-based pet repository (SQLite and MySQL)
pub struct SqlxPetRepository {
    pool: DynDatabasePool,
}

impl SqlxPetRepository {
    /// Create a new SQLx pet repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PetRepository> {
        Arc::new(Self::new(pool))
    }

    fn sqlite(&self) -> Result<&SqlitePool> {
        self.pool.as_sqlite().context("SQLite pool not available")
    }

    fn mysql(&self) -> Result<&MySqlPool> {
        self.pool.as_mysql().context("MySQL pool not available")
    }
}

#[async_trait]
impl PetRepository for SqlxPetRepository {
    async fn create(&self, pet: &Pet) -> Result<Pet> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_pet_sqlite(self.sqlite()?, pet).await,
            DatabaseDriver::Mysql => create_pet_mysql(self.mysql()?, pet).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Pet>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_pet_by_id_sqlite(self.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_pet_by_id_mysql(self.mysql()?, id).await,
        }
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Pet>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_pets_sqlite(self.sqlite()?, Some(owner_id)).await,
            DatabaseDriver::Mysql => list_pets_mysql(self.mysql()?, Some(owner_id)).await,
        }
    }

    async fn list_all(&self) -> Result<Vec<Pet>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_pets_sqlite(self.sqlite()?, None).await,
            DatabaseDriver::Mysql => list_pets_mysql(self.mysql()?, None).await,
        }
    }

    async fn update(&self, pet: &Pet) -> Result<Pet> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_pet_sqlite(self.sqlite()?, pet).await,
            DatabaseDriver::Mysql => update_pet_mysql(self.mysql()?, pet).await,
        }
    }

    async fn set_found(&self, id: &str, found: bool) -> Result<bool> {
        let now = Utc::now();
        let query = "UPDATE pets SET found = ?, updated_at = ? WHERE id = ?";
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(found)
                .bind(now)
                .bind(id)
                .execute(self.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(found)
                .bind(now)
                .bind(id)
                .execute(self.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        };
        Ok(result.context("Failed to update found status")? > 0)
    }

    async fn set_photo_url(&self, id: &str, photo_url: &str) -> Result<bool> {
        let now = Utc::now();
        let query = "UPDATE pets SET photo_url = ?, updated_at = ? WHERE id = ?";
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(photo_url)
                .bind(now)
                .bind(id)
                .execute(self.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(photo_url)
                .bind(now)
                .bind(id)
                .execute(self.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        };
        Ok(result.context("Failed to update photo")? > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let query = "DELETE FROM pets WHERE id = ?";
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(id)
                .execute(self.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(id)
                .execute(self.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        };
        Ok(result.context("Failed to delete pet")? > 0)
    }
}

const PET_COLUMNS: &str = "id, owner_id, name, species, breed, description, owner_name, \
    owner_email, owner_phone, photo_url, city, address, found, created_at, updated_at";

const INSERT_PET: &str = r#"
    INSERT INTO pets (id, owner_id, name, species, breed, description, owner_name,
                      owner_email, owner_phone, photo_url, city, address, found,
                      created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_PET: &str = r#"
    UPDATE pets
    SET name = ?, species = ?, breed = ?, description = ?, owner_name = ?,
        owner_email = ?, owner_phone = ?, city = ?, address = ?, updated_at = ?
    WHERE id = ?
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_pet_sqlite(pool: &SqlitePool, pet: &Pet) -> Result<Pet> {
    let now = Utc::now();

    sqlx::query(INSERT_PET)
        .bind(&pet.id)
        .bind(pet.owner_id)
        .bind(&pet.name)
        .bind(&pet.species)
        .bind(&pet.breed)
        .bind(&pet.description)
        .bind(&pet.owner_name)
        .bind(&pet.owner_email)
        .bind(&pet.owner_phone)
        .bind(&pet.photo_url)
        .bind(&pet.city)
        .bind(&pet.address)
        .bind(pet.found)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create pet")?;

    Ok(Pet {
        created_at: now,
        updated_at: now,
        ..pet.clone()
    })
}

async fn get_pet_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Pet>> {
    let row = sqlx::query(&format!("SELECT {} FROM pets WHERE id = ?", PET_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get pet by ID")?;

    row.as_ref().map(row_to_pet_sqlite).transpose()
}

async fn list_pets_sqlite(pool: &SqlitePool, owner_id: Option<i64>) -> Result<Vec<Pet>> {
    let rows = match owner_id {
        Some(owner_id) => sqlx::query(&format!(
            "SELECT {} FROM pets WHERE owner_id = ? ORDER BY created_at DESC, id ASC",
            PET_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await,
        None => sqlx::query(&format!(
            "SELECT {} FROM pets ORDER BY created_at DESC, id ASC",
            PET_COLUMNS
        ))
        .fetch_all(pool)
        .await,
    }
    .context("Failed to list pets")?;

    rows.iter().map(row_to_pet_sqlite).collect()
}

async fn update_pet_sqlite(pool: &SqlitePool, pet: &Pet) -> Result<Pet> {
    sqlx::query(UPDATE_PET)
        .bind(&pet.name)
        .bind(&pet.species)
        .bind(&pet.breed)
        .bind(&pet.description)
        .bind(&pet.owner_name)
        .bind(&pet.owner_email)
        .bind(&pet.owner_phone)
        .bind(&pet.city)
        .bind(&pet.address)
        .bind(Utc::now())
        .bind(&pet.id)
        .execute(pool)
        .await
        .context("Failed to update pet")?;

    get_pet_by_id_sqlite(pool, &pet.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Pet not found after update"))
}

fn row_to_pet_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Pet> {
    Ok(Pet {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        species: row.try_get("species")?,
        breed: row.try_get("breed")?,
        description: row.try_get("description")?,
        owner_name: row.try_get("owner_name")?,
        owner_email: row.try_get("owner_email")?,
        owner_phone: row.try_get("owner_phone")?,
        photo_url: row.try_get("photo_url")?,
        city: row.try_get("city")?,
        address: row.try_get("address")?,
        found: row.try_get("found")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_pet_mysql(pool: &MySqlPool, pet: &Pet) -> Result<Pet> {
    let now = Utc::now();

    sqlx::query(INSERT_PET)
        .bind(&pet.id)
        .bind(pet.owner_id)
        .bind(&pet.name)
        .bind(&pet.species)
        .bind(&pet.breed)
        .bind(&pet.description)
        .bind(&pet.owner_name)
        .bind(&pet.owner_email)
        .bind(&pet.owner_phone)
        .bind(&pet.photo_url)
        .bind(&pet.city)
        .bind(&pet.address)
        .bind(pet.found)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create pet")?;

    Ok(Pet {
        created_at: now,
        updated_at: now,
        ..pet.clone()
    })
}

async fn get_pet_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Pet>> {
    let row = sqlx::query(&format!("SELECT {} FROM pets WHERE id = ?", PET_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get pet by ID")?;

    row.as_ref().map(row_to_pet_mysql).transpose()
}

async fn list_pets_mysql(pool: &MySqlPool, owner_id: Option<i64>) -> Result<Vec<Pet>> {
    let rows = match owner_id {
        Some(owner_id) => sqlx::query(&format!(
            "SELECT {} FROM pets WHERE owner_id = ? ORDER BY created_at DESC, id ASC",
            PET_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await,
        None => sqlx::query(&format!(
            "SELECT {} FROM pets ORDER BY created_at DESC, id ASC",
            PET_COLUMNS
        ))
        .fetch_all(pool)
        .await,
    }
    .context("Failed to list pets")?;

    rows.iter().map(row_to_pet_mysql).collect()
}

async fn update_pet_mysql(pool: &MySqlPool, pet: &Pet) -> Result<Pet> {
    sqlx::query(UPDATE_PET)
        .bind(&pet.name)
        .bind(&pet.species)
        .bind(&pet.breed)
        .bind(&pet.description)
        .bind(&pet.owner_name)
        .bind(&pet.owner_email)
        .bind(&pet.owner_phone)
        .bind(&pet.city)
        .bind(&pet.address)
        .bind(Utc::now())
        .bind(&pet.id)
        .execute(pool)
        .await
        .context("Failed to update pet")?;

    get_pet_by_id_mysql(pool, &pet.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Pet not found after update"))
}

fn row_to_pet_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Pet> {
    Ok(Pet {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        species: row.try_get("species")?,
        breed: row.try_get("breed")?,
        description: row.try_get("description")?,
        owner_name: row.try_get("owner_name")?,
        owner_email: row.try_get("owner_email")?,
        owner_phone: row.try_get("owner_phone")?,
        photo_url: row.try_get("photo_url")?,
        city: row.try_get("city")?,
        address: row.try_get("address")?,
        found: row.try_get("found")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{AccountRepository, SqlxAccountRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{generate_pet_id, Account};

    async fn setup() -> (SqlxPetRepository, SqlxAccountRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let accounts = SqlxAccountRepository::new(pool.clone());
        let owner = accounts
            .create(&Account::new("owner@x.com".to_string(), "hash".to_string(), false))
            .await
            .expect("Failed to create owner");
        (SqlxPetRepository::new(pool), accounts, owner.id)
    }

    fn sample_pet(owner_id: i64, name: &str) -> Pet {
        let now = Utc::now();
        Pet {
            id: generate_pet_id(),
            owner_id,
            name: name.to_string(),
            species: Some("dog".to_string()),
            breed: None,
            description: None,
            owner_name: Some("Ana".to_string()),
            owner_email: "owner@x.com".to_string(),
            owner_phone: Some("+34 600 000 000".to_string()),
            photo_url: None,
            city: Some("Madrid".to_string()),
            address: None,
            found: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_pet() {
        let (repo, _, owner_id) = setup().await;
        let pet = repo.create(&sample_pet(owner_id, "Rex")).await.unwrap();

        let found = repo.get_by_id(&pet.id).await.unwrap().expect("Pet not found");
        assert_eq!(found.name, "Rex");
        assert_eq!(found.owner_id, owner_id);
        assert_eq!(found.owner_phone.as_deref(), Some("+34 600 000 000"));
        assert!(!found.found);
    }

    #[tokio::test]
    async fn test_get_unknown_pet() {
        let (repo, _, _) = setup().await;
        assert!(repo.get_by_id("NOPE0000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_pet() {
        let (repo, _, owner_id) = setup().await;
        let mut pet = repo.create(&sample_pet(owner_id, "Rex")).await.unwrap();

        pet.name = "Max".to_string();
        pet.breed = Some("Beagle".to_string());
        let updated = repo.update(&pet).await.unwrap();

        assert_eq!(updated.name, "Max");
        assert_eq!(updated.breed.as_deref(), Some("Beagle"));
    }

    #[tokio::test]
    async fn test_found_and_photo() {
        let (repo, _, owner_id) = setup().await;
        let pet = repo.create(&sample_pet(owner_id, "Rex")).await.unwrap();

        assert!(repo.set_found(&pet.id, true).await.unwrap());
        assert!(repo.set_photo_url(&pet.id, "/uploads/rex.jpg").await.unwrap());
        assert!(!repo.set_found("NOPE0000", true).await.unwrap());

        let found = repo.get_by_id(&pet.id).await.unwrap().unwrap();
        assert!(found.found);
        assert_eq!(found.photo_url.as_deref(), Some("/uploads/rex.jpg"));
    }

    #[tokio::test]
    async fn test_list_by_owner_and_all() {
        let (repo, accounts, owner_id) = setup().await;
        let other = accounts
            .create(&Account::new("other@x.com".to_string(), "hash".to_string(), false))
            .await
            .unwrap();

        repo.create(&sample_pet(owner_id, "Rex")).await.unwrap();
        repo.create(&sample_pet(owner_id, "Luna")).await.unwrap();
        repo.create(&sample_pet(other.id, "Milo")).await.unwrap();

        assert_eq!(repo.list_by_owner(owner_id).await.unwrap().len(), 2);
        assert_eq!(repo.list_by_owner(other.id).await.unwrap().len(), 1);
        assert_eq!(repo.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_owner_cascades() {
        let (repo, accounts, owner_id) = setup().await;
        let pet = repo.create(&sample_pet(owner_id, "Rex")).await.unwrap();

        accounts.delete("owner@x.com").await.unwrap();
        assert!(repo.get_by_id(&pet.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_pet() {
        let (repo, _, owner_id) = setup().await;
        let pet = repo.create(&sample_pet(owner_id, "Rex")).await.unwrap();

        assert!(repo.delete(&pet.id).await.unwrap());
        assert!(!repo.delete(&pet.id).await.unwrap());
    }
}
