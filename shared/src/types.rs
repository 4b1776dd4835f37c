//! Common types for the shared crate
//!
//! Utility types used across the platform

/// Timestamp type (Unix milliseconds)
pub type Timestamp = i64;

/// Opaque entity id (UUID v4 string)
pub type EntityId = String;

/// Generate a fresh entity id
pub fn new_entity_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}

/// Generate an unguessable hex token of `bytes` random bytes
///
/// Used for invitation tokens and supplier submission tokens.
pub fn generate_token(bytes: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}
