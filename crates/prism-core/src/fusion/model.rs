//! Fusion domain model.

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::message::OutputMessage;
use crate::ray::Ray;

/// Lifecycle state of a fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FusionState {
    /// Created; instructions may still be edited.
    Editable,
    /// The merge job is active and streaming into the output.
    Fusing,
    /// The merge completed with a usable output.
    Done,
    /// The merge failed; the error text is set on the fusion.
    Error,
    /// The user cancelled the merge before completion.
    Stopped,
}

impl FusionState {
    /// Returns true for `Done`, `Error`, and `Stopped`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Stopped)
    }
}

/// A frozen copy of one ray's output, taken when a fusion run starts.
///
/// Fusions operate on snapshots, not live bindings: later ray mutations never
/// retroactively alter an in-flight or completed fusion's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RayOutputSnapshot {
    /// Id of the source ray at snapshot time.
    pub ray_id: String,
    /// Model the source ray was bound to, if any.
    pub model_id: Option<String>,
    /// The ray's full output text at snapshot time.
    pub text: String,
}

impl RayOutputSnapshot {
    /// Snapshots one ray.
    pub fn of(ray: &Ray) -> Self {
        Self {
            ray_id: ray.id.clone(),
            model_id: ray.model_id.clone(),
            text: ray.output.text(),
        }
    }
}

/// One gather/merge operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fusion {
    /// Unique fusion identifier (UUID format).
    pub id: String,
    /// Id of the merge strategy this fusion uses.
    pub factory_id: String,
    /// Strategy-specific, user-adjustable instructions.
    pub instructions: Option<String>,
    /// Target model the merge job runs on.
    pub model_id: String,
    /// Snapshot of the ray outputs consumed by the most recent run. Empty
    /// until the fusion has been started once.
    pub inputs: Vec<RayOutputSnapshot>,
    /// Accumulated synthesized output.
    pub output: OutputMessage,
    /// Current lifecycle state.
    pub state: FusionState,
    /// Provider error message, set when `state` is `Error`.
    pub error: Option<String>,
    /// Run stamp, incremented on every (re)start.
    #[serde(skip)]
    pub(crate) run: u64,
    /// Cancellation token of the active job while fusing.
    #[serde(skip)]
    pub(crate) cancel: Option<CancellationToken>,
}

impl Fusion {
    /// Creates a new editable fusion bound to a strategy and target model.
    pub fn new(factory_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            factory_id: factory_id.into(),
            instructions: None,
            model_id: model_id.into(),
            inputs: Vec::new(),
            output: OutputMessage::new(),
            state: FusionState::Editable,
            error: None,
            run: 0,
            cancel: None,
        }
    }

    /// Returns true if the merge job is currently active.
    pub fn is_fusing(&self) -> bool {
        self.state == FusionState::Fusing
    }

    /// Returns true if instructions may currently be edited.
    ///
    /// Never while fusing; otherwise whenever the fusion is editable or has
    /// reached a terminal state and can be re-edited before a restart.
    pub fn instructions_editable(&self) -> bool {
        self.state != FusionState::Fusing
    }

    /// Marks the fusion running against the given input snapshot, clearing
    /// prior output and error. Returns the new run stamp.
    pub(crate) fn begin_run(
        &mut self,
        inputs: Vec<RayOutputSnapshot>,
        cancel: CancellationToken,
    ) -> u64 {
        self.run += 1;
        self.inputs = inputs;
        self.output.clear();
        self.error = None;
        self.state = FusionState::Fusing;
        self.cancel = Some(cancel);
        self.run
    }

    /// Appends a content delta if the stamp matches the active run.
    pub(crate) fn apply_delta(&mut self, run: u64, fragment: &str) -> bool {
        if run != self.run || self.state != FusionState::Fusing {
            return false;
        }
        self.output.append(fragment);
        true
    }

    /// Transitions to `Done` if the stamp matches.
    pub(crate) fn complete(&mut self, run: u64) -> bool {
        if run != self.run || self.state != FusionState::Fusing {
            return false;
        }
        self.state = FusionState::Done;
        self.cancel = None;
        true
    }

    /// Transitions to `Error` if the stamp matches.
    pub(crate) fn fail(&mut self, run: u64, message: &str) -> bool {
        if run != self.run || self.state != FusionState::Fusing {
            return false;
        }
        self.state = FusionState::Error;
        self.error = Some(message.to_string());
        self.cancel = None;
        true
    }

    /// Cancels the active job and transitions to `Stopped`.
    pub(crate) fn stop(&mut self) -> bool {
        if self.state != FusionState::Fusing {
            return false;
        }
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.state = FusionState::Stopped;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ray::Ray;

    fn ready_ray(text: &str) -> Ray {
        let mut ray = Ray::new(Some("model-a".to_string()));
        let run = ray.begin_run(CancellationToken::new());
        ray.apply_delta(run, text);
        ray.complete(run);
        ray
    }

    #[test]
    fn test_inputs_are_a_snapshot_not_a_live_binding() {
        let mut ray = ready_ray("candidate one");
        let mut fusion = Fusion::new("synthesize", "model-m");
        let run = fusion.begin_run(
            vec![RayOutputSnapshot::of(&ray)],
            CancellationToken::new(),
        );

        // Mutate the source ray after the snapshot was taken.
        let ray_run = ray.begin_run(CancellationToken::new());
        ray.apply_delta(ray_run, "completely different");
        ray.complete(ray_run);

        assert_eq!(fusion.inputs[0].text, "candidate one");
        assert!(fusion.complete(run));
    }

    #[test]
    fn test_instructions_locked_while_fusing() {
        let mut fusion = Fusion::new("guided", "model-m");
        assert!(fusion.instructions_editable());

        fusion.begin_run(Vec::new(), CancellationToken::new());
        assert!(!fusion.instructions_editable());

        fusion.stop();
        assert!(fusion.instructions_editable());
    }

    #[test]
    fn test_stop_never_reports_error() {
        let mut fusion = Fusion::new("best-of", "model-m");
        let run = fusion.begin_run(Vec::new(), CancellationToken::new());
        fusion.apply_delta(run, "partial merge");
        assert!(fusion.stop());

        assert_eq!(fusion.state, FusionState::Stopped);
        assert!(fusion.error.is_none());
        assert!(!fusion.fail(run, "late provider error"));
        assert_eq!(fusion.state, FusionState::Stopped);
    }

    #[test]
    fn test_restart_keeps_identity_and_refreshes_inputs() {
        let ray = ready_ray("first pass");
        let mut fusion = Fusion::new("synthesize", "model-m");
        let id = fusion.id.clone();

        let run = fusion.begin_run(
            vec![RayOutputSnapshot::of(&ray)],
            CancellationToken::new(),
        );
        fusion.apply_delta(run, "merged");
        fusion.complete(run);

        let ray2 = ready_ray("second pass");
        fusion.begin_run(
            vec![RayOutputSnapshot::of(&ray), RayOutputSnapshot::of(&ray2)],
            CancellationToken::new(),
        );

        assert_eq!(fusion.id, id);
        assert_eq!(fusion.state, FusionState::Fusing);
        assert_eq!(fusion.inputs.len(), 2);
        assert!(fusion.output.is_empty());
    }
}
