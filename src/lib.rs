//! PetBeacon - A lost-pet registry
//!
//! Owners register pets, print QR tags pointing at a public profile, and get
//! notified when a finder reports a sighting. Account access goes through a
//! single-session guard with an idle timeout.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
