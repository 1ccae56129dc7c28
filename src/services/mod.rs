//! Upload pipeline and the collaborators it talks to.

pub mod auth;
pub mod key_deriver;
pub mod metadata_store;
pub mod settings;
pub mod upload_service;
pub mod validation;
