//! Ray domain model.
//!
//! Contains the `Ray` entity and its lifecycle state machine. Transitions are
//! driven exclusively by the scatter controller; adapter events carry the run
//! stamp of the generation they belong to, so events from a cancelled or
//! superseded run are inert.

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::message::OutputMessage;

/// Lifecycle state of a ray.
///
/// `Idle -> Generating -> Done | Error | Stopped`; any terminal state can
/// re-enter `Generating` through a restart, which clears prior output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RayState {
    /// Created but not started.
    Idle,
    /// A generation job is active and streaming into the output.
    Generating,
    /// The job completed successfully.
    Done,
    /// The job failed; the error text is set on the ray.
    Error,
    /// The user cancelled the job before completion.
    Stopped,
}

impl RayState {
    /// Returns true for `Done`, `Error`, and `Stopped`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Stopped)
    }
}

/// One scatter candidate: a single generation bound to one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ray {
    /// Unique ray identifier (UUID format).
    pub id: String,
    /// Bound model id. `None` means "use the session default".
    pub model_id: Option<String>,
    /// Accumulated output, append-only while generating.
    pub output: OutputMessage,
    /// Current lifecycle state.
    pub state: RayState,
    /// Provider error message, set when `state` is `Error`.
    pub error: Option<String>,
    /// Run stamp, incremented on every (re)start. Adapter events carrying a
    /// stale stamp are dropped.
    #[serde(skip)]
    pub(crate) run: u64,
    /// Cancellation token of the active job while generating.
    #[serde(skip)]
    pub(crate) cancel: Option<CancellationToken>,
}

impl Ray {
    /// Creates a new idle ray.
    pub fn new(model_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            model_id,
            output: OutputMessage::new(),
            state: RayState::Idle,
            error: None,
            run: 0,
            cancel: None,
        }
    }

    /// Returns true if this ray's output is usable as fusion input:
    /// terminal, not stopped, with a non-empty output.
    pub fn is_ready(&self) -> bool {
        self.state.is_terminal() && self.state != RayState::Stopped && !self.output.is_empty()
    }

    /// Returns true if a job is currently streaming into this ray.
    pub fn is_generating(&self) -> bool {
        self.state == RayState::Generating
    }

    /// Marks the ray generating for a fresh run, clearing any prior output
    /// and error. Returns the new run stamp.
    pub(crate) fn begin_run(&mut self, cancel: CancellationToken) -> u64 {
        self.run += 1;
        self.output.clear();
        self.error = None;
        self.state = RayState::Generating;
        self.cancel = Some(cancel);
        self.run
    }

    /// Appends a content delta if the stamp matches the active run.
    /// Returns true if applied.
    pub(crate) fn apply_delta(&mut self, run: u64, fragment: &str) -> bool {
        if run != self.run || self.state != RayState::Generating {
            return false;
        }
        self.output.append(fragment);
        true
    }

    /// Transitions to `Done` if the stamp matches. Returns true if applied.
    pub(crate) fn complete(&mut self, run: u64) -> bool {
        if run != self.run || self.state != RayState::Generating {
            return false;
        }
        self.state = RayState::Done;
        self.cancel = None;
        true
    }

    /// Transitions to `Error` if the stamp matches. Returns true if applied.
    pub(crate) fn fail(&mut self, run: u64, message: &str) -> bool {
        if run != self.run || self.state != RayState::Generating {
            return false;
        }
        self.state = RayState::Error;
        self.error = Some(message.to_string());
        self.cancel = None;
        true
    }

    /// Cancels the active job and transitions to `Stopped`.
    ///
    /// The state flips synchronously so a final chunk already in flight can
    /// never turn a stop into `Done`; the stale run stamp drops it.
    pub(crate) fn stop(&mut self) -> bool {
        if self.state != RayState::Generating {
            return false;
        }
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.state = RayState::Stopped;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ray_is_idle() {
        let ray = Ray::new(Some("model-a".to_string()));
        assert_eq!(ray.state, RayState::Idle);
        assert!(!ray.is_ready());
        assert!(ray.output.is_empty());
    }

    #[test]
    fn test_full_run_reaches_done() {
        let mut ray = Ray::new(None);
        let run = ray.begin_run(CancellationToken::new());
        assert!(ray.apply_delta(run, "hello "));
        assert!(ray.apply_delta(run, "world"));
        assert!(ray.complete(run));

        assert_eq!(ray.state, RayState::Done);
        assert_eq!(ray.output.text(), "hello world");
        assert!(ray.is_ready());
    }

    #[test]
    fn test_stale_events_are_dropped_after_restart() {
        let mut ray = Ray::new(None);
        let old_run = ray.begin_run(CancellationToken::new());
        assert!(ray.apply_delta(old_run, "first run"));

        let new_run = ray.begin_run(CancellationToken::new());
        assert!(!ray.apply_delta(old_run, "late chunk"));
        assert!(!ray.complete(old_run));
        assert_eq!(ray.state, RayState::Generating);

        assert!(ray.complete(new_run));
        assert_eq!(ray.output.text(), "");
    }

    #[test]
    fn test_stop_wins_over_in_flight_done() {
        let mut ray = Ray::new(None);
        let run = ray.begin_run(CancellationToken::new());
        ray.apply_delta(run, "partial");
        assert!(ray.stop());
        assert_eq!(ray.state, RayState::Stopped);

        // The terminal event that was already in flight must not flip the
        // state to Done.
        assert!(!ray.complete(run));
        assert_eq!(ray.state, RayState::Stopped);
        assert!(!ray.is_ready());
    }

    #[test]
    fn test_errored_ray_with_partial_output_is_ready() {
        let mut ray = Ray::new(None);
        let run = ray.begin_run(CancellationToken::new());
        ray.apply_delta(run, "partial answer");
        assert!(ray.fail(run, "connection reset"));

        assert_eq!(ray.state, RayState::Error);
        assert_eq!(ray.error.as_deref(), Some("connection reset"));
        assert!(ray.is_ready());
    }

    #[test]
    fn test_done_with_empty_output_is_not_ready() {
        let mut ray = Ray::new(None);
        let run = ray.begin_run(CancellationToken::new());
        assert!(ray.complete(run));
        assert!(!ray.is_ready());
    }

    #[test]
    fn test_restart_clears_output_and_error() {
        let mut ray = Ray::new(None);
        let run = ray.begin_run(CancellationToken::new());
        ray.apply_delta(run, "partial");
        ray.fail(run, "boom");

        ray.begin_run(CancellationToken::new());
        assert_eq!(ray.state, RayState::Generating);
        assert!(ray.output.is_empty());
        assert!(ray.error.is_none());
    }
}
