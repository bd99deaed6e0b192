//! EchoAgent - streams the rendered prompt back in fixed-size chunks.
//!
//! Useful for wiring checks and demos: the output makes it obvious what
//! prompt a ray or fusion actually received, without any provider involved.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use prism_core::error::Result;
use prism_core::job::{GenerationAgent, JobEvent, JobHandle, JobRequest};

/// Agent that echoes the prompt it was given.
pub struct EchoAgent {
    chunk_size: usize,
}

impl EchoAgent {
    /// Creates an agent that streams in chunks of 16 characters.
    pub fn new() -> Self {
        Self { chunk_size: 16 }
    }

    /// Overrides the chunk size (in characters, at least 1).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl Default for EchoAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationAgent for EchoAgent {
    async fn start(&self, request: JobRequest) -> Result<JobHandle> {
        let text = request.prompt.render();
        let chunk_size = self.chunk_size;
        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let chars: Vec<char> = text.chars().collect();
            for chunk in chars.chunks(chunk_size) {
                if token.is_cancelled() {
                    return;
                }
                let fragment: String = chunk.iter().collect();
                if tx.send(JobEvent::Delta(fragment)).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(JobEvent::Done).await;
        });

        Ok(JobHandle::new(rx, cancel))
    }
}
