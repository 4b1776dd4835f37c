//! File/object storage collaborator contract

use super::CollaboratorError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Accepts a buffer plus content type and returns a retrievable URL
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<String, CollaboratorError>;
}

/// In-process file store for tests and local runs
#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(url).map(|(b, _)| b.clone())
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<String, CollaboratorError> {
        let url = format!("https://files.example/{}", shared::types::new_entity_id());
        self.objects
            .lock()
            .insert(url.clone(), (bytes.to_vec(), content_type.to_string()));
        Ok(url)
    }
}
