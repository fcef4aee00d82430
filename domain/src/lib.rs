//! This module re-exports various items from the `entity_api` crate.
//!
//! The purpose of this re-export is to ensure that consumers of the `domain` crate do not need to
//! directly depend on the `entity_api` crate. By re-exporting these items, we provide a clear and
//! consistent interface for working with the entities within the domain layer, while the
//! underlying implementation details remain in the `entity_api` crate.
pub use entity_api::mutate::{IntoUpdateMap, UpdateMap};

// Re-exports from `entity` crate via `entity_api`
pub use entity_api::{profiles, sex, users, Id};

pub mod emails;
pub mod error;
pub mod form;
pub mod oauth;
pub mod password_reset;
pub mod profile;
pub mod registration;
pub mod user;

pub mod gateway;
