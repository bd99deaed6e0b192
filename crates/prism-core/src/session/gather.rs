//! Gather controller: owns the fusion set and merge eligibility.
//!
//! Tracks the selected strategy and target model, the pending "merge now with
//! partial results?" confirmation, and the once-per-scatter-pass auto-merge
//! guard. Like the scatter controller, every mutation is a synchronous
//! transition applied under the store's write lock.

use crate::fusion::Fusion;
use crate::job::JobEvent;

/// Owns the ordered fusion set and the gather-side session flags.
#[derive(Debug, Default)]
pub struct GatherController {
    fusions: Vec<Fusion>,
    selected_factory_id: Option<String>,
    target_model_id: Option<String>,
    pending_confirmation: bool,
    auto_merge_fired: bool,
}

impl GatherController {
    /// Creates an empty controller with nothing selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the ordered fusion list.
    pub fn fusions(&self) -> &[Fusion] {
        &self.fusions
    }

    /// Currently selected strategy id, if any.
    pub fn selected_factory_id(&self) -> Option<&str> {
        self.selected_factory_id.as_deref()
    }

    /// Currently selected target model, if any.
    pub fn target_model_id(&self) -> Option<&str> {
        self.target_model_id.as_deref()
    }

    /// True while a merge request awaits the user's confirm/deny decision.
    pub fn pending_confirmation(&self) -> bool {
        self.pending_confirmation
    }

    /// True once the auto-merge trigger has fired for the current pass.
    pub fn auto_merge_fired(&self) -> bool {
        self.auto_merge_fired
    }

    /// Merge eligibility: at least two ready rays, a strategy selected, and
    /// a target model selected.
    pub fn can_gather(&self, ready_count: usize) -> bool {
        ready_count >= 2 && self.selected_factory_id.is_some() && self.target_model_id.is_some()
    }

    pub(crate) fn fusion_mut(&mut self, fusion_id: &str) -> Option<&mut Fusion> {
        self.fusions.iter_mut().find(|f| f.id == fusion_id)
    }

    pub(crate) fn set_selection(
        &mut self,
        factory_id: Option<String>,
        target_model_id: Option<String>,
    ) {
        self.selected_factory_id = factory_id;
        self.target_model_id = target_model_id;
    }

    /// Adds a fusion bound to the current selection. Callers check
    /// `can_gather` first; this only fails when nothing is selected.
    pub(crate) fn create_fusion(&mut self) -> Option<String> {
        let factory_id = self.selected_factory_id.clone()?;
        let model_id = self.target_model_id.clone()?;
        let fusion = Fusion::new(factory_id, model_id);
        let id = fusion.id.clone();
        self.fusions.push(fusion);
        Some(id)
    }

    /// Removes one fusion by id, cancelling its job first if fusing.
    pub(crate) fn remove(&mut self, fusion_id: &str) -> bool {
        let Some(index) = self.fusions.iter().position(|f| f.id == fusion_id) else {
            return false;
        };
        self.fusions[index].stop();
        self.fusions.remove(index);
        true
    }

    pub(crate) fn set_pending_confirmation(&mut self, pending: bool) -> bool {
        let changed = self.pending_confirmation != pending;
        self.pending_confirmation = pending;
        changed
    }

    /// Consumes the once-per-pass auto-merge budget. Returns false if it was
    /// already spent.
    pub(crate) fn fire_auto_merge(&mut self) -> bool {
        if self.auto_merge_fired {
            return false;
        }
        self.auto_merge_fired = true;
        true
    }

    /// Re-arms the auto-merge trigger; called when a new scatter pass starts.
    pub(crate) fn rearm_auto_merge(&mut self) {
        self.auto_merge_fired = false;
    }

    /// Applies one adapter event to the addressed fusion. Returns true if
    /// the event was current and changed state.
    pub(crate) fn apply_event(&mut self, fusion_id: &str, run: u64, event: &JobEvent) -> bool {
        let Some(fusion) = self.fusion_mut(fusion_id) else {
            return false;
        };
        match event {
            JobEvent::Delta(fragment) => fusion.apply_delta(run, fragment),
            JobEvent::Done => fusion.complete(run),
            JobEvent::Error(message) => fusion.fail(run, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::FusionState;

    fn selected() -> GatherController {
        let mut controller = GatherController::new();
        controller.set_selection(Some("synthesize".into()), Some("model-m".into()));
        controller
    }

    #[test]
    fn test_can_gather_requires_all_three_conditions() {
        let mut controller = GatherController::new();
        assert!(!controller.can_gather(3), "no selection yet");

        controller.set_selection(Some("synthesize".into()), None);
        assert!(!controller.can_gather(3), "no target model yet");

        controller.set_selection(Some("synthesize".into()), Some("model-m".into()));
        assert!(!controller.can_gather(1), "one ready ray is not enough");
        assert!(controller.can_gather(2));
    }

    #[test]
    fn test_create_fusion_without_selection_is_a_noop() {
        let mut controller = GatherController::new();
        assert!(controller.create_fusion().is_none());
        assert!(controller.fusions().is_empty());
    }

    #[test]
    fn test_create_fusion_binds_current_selection() {
        let mut controller = selected();
        let id = controller.create_fusion().unwrap();
        let fusion = controller.fusion_mut(&id).unwrap();
        assert_eq!(fusion.factory_id, "synthesize");
        assert_eq!(fusion.model_id, "model-m");
        assert_eq!(fusion.state, FusionState::Editable);
    }

    #[test]
    fn test_auto_merge_budget_is_single_shot_until_rearm() {
        let mut controller = selected();
        assert!(controller.fire_auto_merge());
        assert!(!controller.fire_auto_merge());
        assert!(controller.auto_merge_fired());

        controller.rearm_auto_merge();
        assert!(controller.fire_auto_merge());
    }

    #[test]
    fn test_remove_cancels_an_active_fusion() {
        let mut controller = selected();
        let id = controller.create_fusion().unwrap();
        controller
            .fusion_mut(&id)
            .unwrap()
            .begin_run(Vec::new(), tokio_util::sync::CancellationToken::new());

        assert!(controller.remove(&id));
        assert!(controller.fusions().is_empty());
        assert!(!controller.remove(&id));
    }
}
