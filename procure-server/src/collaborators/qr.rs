//! QR rendering collaborator contract
//!
//! Given an invitation link, returns a renderable image payload.
//! The core treats the payload as opaque.

use super::CollaboratorError;
use async_trait::async_trait;
use base64::Engine;

/// Renders a link into an image payload (e.g. a data URL)
#[async_trait]
pub trait QrRenderer: Send + Sync {
    async fn render(&self, link: &str) -> Result<String, CollaboratorError>;
}

/// In-process renderer producing a base64 data-URL stand-in
#[derive(Debug, Default)]
pub struct InlineQrRenderer;

#[async_trait]
impl QrRenderer for InlineQrRenderer {
    async fn render(&self, link: &str) -> Result<String, CollaboratorError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(link.as_bytes());
        Ok(format!("data:image/png;base64,{}", encoded))
    }
}
