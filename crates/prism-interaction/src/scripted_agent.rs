//! ScriptedAgent - deterministic streaming agent for tests and simulations.
//!
//! Each model id maps to a script of steps (emit a delta, pause, fail) that
//! is replayed over the job's event channel from a spawned task. Pacing makes
//! race windows reproducible: a `Pause` keeps a job "generating" long enough
//! for a test to interleave stops, resizes, or merge requests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use prism_core::error::Result;
use prism_core::job::{GenerationAgent, JobEvent, JobHandle, JobRequest};

/// One step of a scripted generation.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit a content fragment.
    Delta(String),
    /// Wait before the next step.
    Pause(Duration),
    /// Fail the job with the given provider message. Terminal.
    Fail(String),
}

/// An ordered list of steps, replayed once per job. Unless a `Fail` step
/// ends the script, the job finishes with `Done`.
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<ScriptStep>,
}

impl Script {
    /// Creates an empty script (a job that immediately completes).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a script that emits `content` as a single delta.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new().delta(content)
    }

    /// Appends a delta step.
    pub fn delta(mut self, text: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Delta(text.into()));
        self
    }

    /// Appends a pause step.
    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push(ScriptStep::Pause(duration));
        self
    }

    /// Appends a failing terminal step.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Fail(message.into()));
        self
    }
}

/// Agent that replays a configured script per model id.
///
/// Models without a script fall back to a configurable default.
pub struct ScriptedAgent {
    scripts: HashMap<String, Script>,
    fallback: Script,
}

impl ScriptedAgent {
    /// Creates an agent whose fallback script emits a fixed line.
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            fallback: Script::text("scripted response"),
        }
    }

    /// Binds a script to a model id.
    pub fn with_script(mut self, model_id: impl Into<String>, script: Script) -> Self {
        self.scripts.insert(model_id.into(), script);
        self
    }

    /// Replaces the fallback script used for unconfigured models.
    pub fn with_fallback(mut self, script: Script) -> Self {
        self.fallback = script;
        self
    }
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationAgent for ScriptedAgent {
    async fn start(&self, request: JobRequest) -> Result<JobHandle> {
        let script = self
            .scripts
            .get(&request.model_id)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());
        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tracing::debug!(model_id = %request.model_id, "scripted job started");

        tokio::spawn(async move {
            for step in script.steps {
                if token.is_cancelled() {
                    return;
                }
                match step {
                    ScriptStep::Delta(text) => {
                        if tx.send(JobEvent::Delta(text)).await.is_err() {
                            return;
                        }
                    }
                    ScriptStep::Pause(duration) => {
                        tokio::select! {
                            _ = token.cancelled() => return,
                            _ = tokio::time::sleep(duration) => {}
                        }
                    }
                    ScriptStep::Fail(message) => {
                        let _ = tx.send(JobEvent::Error(message)).await;
                        return;
                    }
                }
            }
            let _ = tx.send(JobEvent::Done).await;
        });

        Ok(JobHandle::new(rx, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::job::PromptContext;

    fn request(model_id: &str) -> JobRequest {
        JobRequest {
            model_id: model_id.to_string(),
            prompt: PromptContext::default(),
        }
    }

    #[tokio::test]
    async fn test_script_replays_in_order_then_done() {
        let agent = ScriptedAgent::new()
            .with_script("m", Script::new().delta("a").delta("b"));
        let mut handle = agent.start(request("m")).await.unwrap();

        assert_eq!(handle.next_event().await, Some(JobEvent::Delta("a".into())));
        assert_eq!(handle.next_event().await, Some(JobEvent::Delta("b".into())));
        assert_eq!(handle.next_event().await, Some(JobEvent::Done));
        assert_eq!(handle.next_event().await, None);
    }

    #[tokio::test]
    async fn test_fail_step_is_terminal() {
        let agent = ScriptedAgent::new()
            .with_script("m", Script::new().delta("partial").fail("quota exceeded"));
        let mut handle = agent.start(request("m")).await.unwrap();

        assert_eq!(
            handle.next_event().await,
            Some(JobEvent::Delta("partial".into()))
        );
        assert_eq!(
            handle.next_event().await,
            Some(JobEvent::Error("quota exceeded".into()))
        );
        assert_eq!(handle.next_event().await, None);
    }

    #[tokio::test]
    async fn test_unconfigured_model_uses_fallback() {
        let agent = ScriptedAgent::new().with_fallback(Script::text("fallback"));
        let mut handle = agent.start(request("unknown")).await.unwrap();
        assert_eq!(
            handle.next_event().await,
            Some(JobEvent::Delta("fallback".into()))
        );
    }

    #[tokio::test]
    async fn test_cancellation_ends_a_paused_script() {
        let agent = ScriptedAgent::new().with_script(
            "m",
            Script::new()
                .delta("before")
                .pause(Duration::from_secs(60))
                .delta("after"),
        );
        let mut handle = agent.start(request("m")).await.unwrap();
        assert_eq!(
            handle.next_event().await,
            Some(JobEvent::Delta("before".into()))
        );

        handle.cancel();
        assert_eq!(handle.next_event().await, None, "no events after cancel");
    }
}
