//! Fusion factory module.
//!
//! A fusion factory is one pluggable merge strategy. The engine never
//! branches on strategy identity: it looks a factory up by id, asks it for
//! its capabilities, and asks it to build the merge job spec from the current
//! ready-ray snapshots. Adding a strategy means registering a new factory,
//! not touching the controllers.

mod builtin;
mod registry;

pub use builtin::{BestOfFactory, GuidedMergeFactory, SynthesizeFactory};
pub use registry::FactoryRegistry;

use serde::{Deserialize, Serialize};

use crate::fusion::RayOutputSnapshot;
use crate::job::PromptContext;

/// Capability flags a strategy declares about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryCapabilities {
    /// Whether per-run user-editable instructions are meaningful.
    pub editable_instructions: bool,
    /// Whether the strategy may be started automatically (auto-merge).
    pub auto_runnable: bool,
}

/// The fully built specification for one merge job.
#[derive(Debug, Clone)]
pub struct FusionJobSpec {
    /// The prompt to send to the target model.
    pub prompt: PromptContext,
    /// The model the strategy suggests when the session has no explicit
    /// target; the session's chosen target model overrides this.
    pub default_model: String,
}

/// One merge strategy.
pub trait FusionFactory: Send + Sync {
    /// Unique strategy id, used for registry lookup and display.
    fn id(&self) -> &str;

    /// The strategy's declared capabilities.
    fn capabilities(&self) -> FactoryCapabilities;

    /// Builds the merge job spec from the ready-ray snapshots, the user's
    /// instructions (ignored by strategies without editable instructions),
    /// and the session's target model.
    fn build_job_spec(
        &self,
        inputs: &[RayOutputSnapshot],
        instructions: Option<&str>,
        target_model: &str,
    ) -> FusionJobSpec;
}

/// Renders candidate outputs into a numbered block shared by the builtin
/// strategies' prompts.
pub(crate) fn render_candidates(inputs: &[RayOutputSnapshot]) -> String {
    inputs
        .iter()
        .enumerate()
        .map(|(i, snapshot)| {
            let model = snapshot.model_id.as_deref().unwrap_or("default");
            format!("--- Candidate {} (model: {}) ---\n{}", i + 1, model, snapshot.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
