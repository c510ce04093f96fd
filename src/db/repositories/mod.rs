//! Database repositories
//!
//! One trait per entity with a SQLx implementation covering both backends.

pub mod account;
pub mod health_record;
pub mod pet;

pub use account::{AccountRepository, SqlxAccountRepository};
pub use health_record::{HealthRecordRepository, SqlxHealthRecordRepository};
pub use pet::{PetRepository, SqlxPetRepository};
