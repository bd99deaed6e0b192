//! Generation job adapter contract.
//!
//! Providers (HTTP APIs, local CLIs, test doubles) are opaque to the engine:
//! a [`GenerationAgent`] takes a model id plus a prompt context and returns a
//! [`JobHandle`] that streams incremental [`JobEvent`]s and can be cancelled.
//! The engine never looks inside a provider; it only reacts to the events the
//! handle yields.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::message::ConversationMessage;

/// One event in a generation job's ordered output stream.
///
/// Every job emits zero or more `Delta` events followed by exactly one
/// terminal event (`Done` or `Error`), unless it is cancelled first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// An incremental content fragment.
    Delta(String),
    /// The job failed; the provider's message is carried verbatim.
    Error(String),
    /// The job completed successfully.
    Done,
}

/// The prompt material sent to a generation job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    /// Shared conversation prefix (the session's input history).
    pub history: Vec<ConversationMessage>,
    /// Task-specific instructions appended after the history. For rays this
    /// is empty; for fusions it is the rendered merge prompt.
    pub instructions: Option<String>,
}

impl PromptContext {
    /// Creates a context from a conversation history alone.
    pub fn from_history(history: Vec<ConversationMessage>) -> Self {
        Self {
            history,
            instructions: None,
        }
    }

    /// Renders the context into a single prompt string.
    ///
    /// Reference agents use this directly; real provider adapters are free to
    /// map `history` onto structured message APIs instead.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = self
            .history
            .iter()
            .map(|m| m.content.clone())
            .collect();
        if let Some(instructions) = &self.instructions {
            parts.push(instructions.clone());
        }
        parts.join("\n\n")
    }
}

/// A request to start one generation job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// The provider-specific model identifier.
    pub model_id: String,
    /// The prompt material.
    pub prompt: PromptContext,
}

/// Handle to one in-flight generation job.
///
/// Owns the receiving half of the event stream plus the cancellation token
/// the producing task observes. Dropping the handle does not cancel the job;
/// cancellation is always explicit so that upstream resources are released
/// deterministically.
#[derive(Debug)]
pub struct JobHandle {
    events: mpsc::Receiver<JobEvent>,
    cancel: CancellationToken,
}

impl JobHandle {
    /// Creates a handle from an event receiver and its cancellation token.
    pub fn new(events: mpsc::Receiver<JobEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Requests cancellation of the underlying job.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Awaits the next event, or `None` once the producer has closed the
    /// stream (after a terminal event or cancellation).
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }
}

/// The provider seam: anything that can run one streaming generation job.
///
/// Implementations live outside the engine (see `prism-interaction` for
/// reference agents). `start` must return promptly; the actual generation
/// runs in a task the implementation spawns, reporting back through the
/// handle's event channel. Implementations must stop producing promptly once
/// the handle's cancellation token fires.
#[async_trait]
pub trait GenerationAgent: Send + Sync {
    /// Starts a generation job and returns its streaming handle.
    async fn start(&self, request: JobRequest) -> Result<JobHandle>;
}
