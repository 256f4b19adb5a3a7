pub mod client;
pub mod config;
pub mod errors;

use crate::utils::cancel::CancellationToken;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback invoked with the byte length of each streamed chunk. `Arc` so it
/// can be cloned into concurrently processed files.
pub type ChunkCallback = Arc<dyn Fn(usize) + Send + Sync>;

/// A single chat request: the file being refactored plus the instruction.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub file_path: String,
    pub file_content: String,
    pub instruction: String,
    pub temperature: f32,
}

/// Outcome of one model call. `RateLimited` is a distinguished sentinel, not
/// an error: it triggers the interactive fallback. `Cancelled` is silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOutcome {
    Content(String),
    RateLimited,
    Cancelled,
    Failed(String),
}

/// Collaborator seam for the external model. The engine only ever talks to
/// this trait; tests substitute stubs.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn send(
        &self,
        request: ModelRequest,
        cancel: &CancellationToken,
        on_chunk: Option<ChunkCallback>,
    ) -> ModelOutcome;
}
