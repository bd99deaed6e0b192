//! Builtin merge strategies provided by the engine.
//!
//! Three stock strategies cover the common merge shapes: pick the single best
//! candidate verbatim, synthesize all candidates into one answer, and a
//! guided merge that follows user-provided instructions.

use super::{FactoryCapabilities, FusionFactory, FusionJobSpec, render_candidates};
use crate::fusion::RayOutputSnapshot;
use crate::job::PromptContext;

const DEFAULT_MERGE_MODEL: &str = "default";

/// Picks the single strongest candidate and returns it verbatim.
#[derive(Debug, Default)]
pub struct BestOfFactory;

impl FusionFactory for BestOfFactory {
    fn id(&self) -> &str {
        "best-of"
    }

    fn capabilities(&self) -> FactoryCapabilities {
        FactoryCapabilities {
            editable_instructions: false,
            auto_runnable: true,
        }
    }

    fn build_job_spec(
        &self,
        inputs: &[RayOutputSnapshot],
        _instructions: Option<&str>,
        _target_model: &str,
    ) -> FusionJobSpec {
        let prompt = format!(
            "You are given {} candidate responses to the same request. \
             Select the single best candidate and reproduce it verbatim, \
             without commentary.\n\n{}",
            inputs.len(),
            render_candidates(inputs),
        );
        FusionJobSpec {
            prompt: PromptContext {
                history: Vec::new(),
                instructions: Some(prompt),
            },
            default_model: DEFAULT_MERGE_MODEL.to_string(),
        }
    }
}

/// Merges all candidates into one synthesized answer.
#[derive(Debug, Default)]
pub struct SynthesizeFactory;

impl FusionFactory for SynthesizeFactory {
    fn id(&self) -> &str {
        "synthesize"
    }

    fn capabilities(&self) -> FactoryCapabilities {
        FactoryCapabilities {
            editable_instructions: false,
            auto_runnable: true,
        }
    }

    fn build_job_spec(
        &self,
        inputs: &[RayOutputSnapshot],
        _instructions: Option<&str>,
        _target_model: &str,
    ) -> FusionJobSpec {
        let prompt = format!(
            "You are given {} candidate responses to the same request. \
             Combine their strengths into a single response that is better \
             than any individual candidate. Resolve contradictions in favor \
             of the majority, and do not mention the candidates.\n\n{}",
            inputs.len(),
            render_candidates(inputs),
        );
        FusionJobSpec {
            prompt: PromptContext {
                history: Vec::new(),
                instructions: Some(prompt),
            },
            default_model: DEFAULT_MERGE_MODEL.to_string(),
        }
    }
}

/// Merges candidates following the user's per-run guidance.
#[derive(Debug, Default)]
pub struct GuidedMergeFactory;

impl FusionFactory for GuidedMergeFactory {
    fn id(&self) -> &str {
        "guided"
    }

    fn capabilities(&self) -> FactoryCapabilities {
        FactoryCapabilities {
            editable_instructions: true,
            auto_runnable: false,
        }
    }

    fn build_job_spec(
        &self,
        inputs: &[RayOutputSnapshot],
        instructions: Option<&str>,
        _target_model: &str,
    ) -> FusionJobSpec {
        let guidance = instructions
            .filter(|text| !text.trim().is_empty())
            .unwrap_or("Combine the candidates into the best single response.");
        let prompt = format!(
            "You are given {} candidate responses to the same request. \
             Merge them following this guidance:\n{}\n\n{}",
            inputs.len(),
            guidance,
            render_candidates(inputs),
        );
        FusionJobSpec {
            prompt: PromptContext {
                history: Vec::new(),
                instructions: Some(prompt),
            },
            default_model: DEFAULT_MERGE_MODEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshots() -> Vec<RayOutputSnapshot> {
        vec![
            RayOutputSnapshot {
                ray_id: "r1".to_string(),
                model_id: Some("model-a".to_string()),
                text: "answer one".to_string(),
            },
            RayOutputSnapshot {
                ray_id: "r2".to_string(),
                model_id: None,
                text: "answer two".to_string(),
            },
        ]
    }

    #[test]
    fn test_builtin_capabilities() {
        assert!(BestOfFactory.capabilities().auto_runnable);
        assert!(!BestOfFactory.capabilities().editable_instructions);
        assert!(SynthesizeFactory.capabilities().auto_runnable);
        assert!(GuidedMergeFactory.capabilities().editable_instructions);
        assert!(!GuidedMergeFactory.capabilities().auto_runnable);
    }

    #[test]
    fn test_prompts_embed_every_candidate() {
        let spec = SynthesizeFactory.build_job_spec(&snapshots(), None, "model-m");
        let prompt = spec.prompt.instructions.unwrap();
        assert!(prompt.contains("answer one"));
        assert!(prompt.contains("answer two"));
        assert!(prompt.contains("Candidate 2 (model: default)"));
    }

    #[test]
    fn test_guided_merge_uses_instructions() {
        let spec = GuidedMergeFactory.build_job_spec(
            &snapshots(),
            Some("prefer the shorter answer"),
            "model-m",
        );
        let prompt = spec.prompt.instructions.unwrap();
        assert!(prompt.contains("prefer the shorter answer"));
    }

    #[test]
    fn test_guided_merge_falls_back_on_blank_instructions() {
        let spec = GuidedMergeFactory.build_job_spec(&snapshots(), Some("   "), "model-m");
        let prompt = spec.prompt.instructions.unwrap();
        assert!(prompt.contains("best single response"));
    }
}
