use async_trait::async_trait;
use serde_json::Value;

/// Delivery seam back to the chat surface. `aux` is the opaque routing
/// token carried unchanged from ingestion; only the frontend knows how
/// to interpret it.
#[async_trait]
pub trait Frontend: Send + Sync {
    /// Renders one text block, with at most one media attachment, to the
    /// conversation identified by `aux`.
    async fn egest(&self, text: &str, media: Option<&str>, aux: &Value) -> Result<(), String>;
}
