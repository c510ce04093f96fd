//! Data models
//!
//! Domain entities shared by repositories, services and API handlers.

pub mod account;
pub mod client_session;
pub mod health_record;
pub mod pet;

pub use account::{Account, CreateAccountInput};
pub use client_session::ClientSession;
pub use health_record::{CreateHealthRecordInput, HealthRecord, HealthRecordKind};
pub use pet::{generate_pet_id, CreatePetInput, Pet, UpdatePetInput};
