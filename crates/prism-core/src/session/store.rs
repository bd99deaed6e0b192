//! Session store: the single source of truth for one scatter/gather session.
//!
//! The store composes the scatter and gather controllers behind one write
//! lock. Every public operation is a short synchronous transition under that
//! lock; the only suspension points in the system are the spawned job pumps
//! awaiting adapter events. Each pump feeds its events back through
//! `apply_job_event`, so updates for one ray or fusion are serialized while
//! updates across entities interleave freely.

use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;

use super::event::{AcceptedOutput, AcceptedSource, StoreEvent};
use super::gather::GatherController;
use super::scatter::{ScatterController, StartedRun};
use crate::config::SessionConfig;
use crate::error::{PrismError, Result};
use crate::factory::FactoryRegistry;
use crate::fusion::{Fusion, FusionState};
use crate::job::{GenerationAgent, JobEvent, JobRequest, PromptContext};
use crate::message::ConversationMessage;
use crate::ray::Ray;

/// Callback invoked when the user accepts a ray's or fusion's output.
pub type AcceptCallback = Arc<dyn Fn(AcceptedOutput) + Send + Sync>;

/// Outcome of [`SessionStore::request_create_fusion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FusionRequest {
    /// The fusion was created (and started when the auto-start rules apply).
    Created { fusion_id: String },
    /// Scatter is still running; the request is parked behind a
    /// confirmation ("merge now with partial results?").
    AwaitingConfirmation,
    /// The eligibility gate failed; nothing was created.
    Rejected,
}

struct SessionInner {
    history: Vec<ConversationMessage>,
    scatter: ScatterController,
    gather: GatherController,
}

enum JobTarget {
    Ray { ray_id: String },
    Fusion { fusion_id: String },
}

/// The orchestration store for one session.
///
/// Cloneable handle over shared state; all clones observe and mutate the
/// same session. External collaborators never touch the ray/fusion
/// collections directly, only through the operations here, which makes every
/// mutation a single atomic transition visible to subscribers.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<SessionInner>>,
    agent: Arc<dyn GenerationAgent>,
    registry: Arc<FactoryRegistry>,
    config: SessionConfig,
    events: broadcast::Sender<StoreEvent>,
    on_accept: Arc<RwLock<Option<AcceptCallback>>>,
}

impl SessionStore {
    /// Creates a store with the given agent, strategy registry, and config.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the configuration is invalid.
    pub fn new(
        agent: Arc<dyn GenerationAgent>,
        registry: FactoryRegistry,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(256);
        let scatter = ScatterController::new(config.initial_ray_count, config.max_rays);
        Ok(Self {
            inner: Arc::new(RwLock::new(SessionInner {
                history: Vec::new(),
                scatter,
                gather: GatherController::new(),
            })),
            agent,
            registry: Arc::new(registry),
            config,
            events,
            on_accept: Arc::new(RwLock::new(None)),
        })
    }

    /// Creates a store with the builtin strategies and default config.
    pub fn with_defaults(agent: Arc<dyn GenerationAgent>) -> Self {
        // Unwrap is safe: the default config always validates.
        Self::new(agent, FactoryRegistry::builtin(), SessionConfig::default()).unwrap()
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribes to state-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Sets the callback invoked when an output is accepted.
    pub async fn set_on_accept(&self, callback: AcceptCallback) {
        *self.on_accept.write().await = Some(callback);
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------
    // Input history
    // ------------------------------------------------------------------

    /// Appends a user message to the shared input history.
    pub async fn push_user_input(&self, content: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.history.push(ConversationMessage::user(content));
    }

    /// Snapshot of the shared input history.
    pub async fn history(&self) -> Vec<ConversationMessage> {
        self.inner.read().await.history.clone()
    }

    // ------------------------------------------------------------------
    // Scatter operations
    // ------------------------------------------------------------------

    /// Snapshot of the ordered ray list.
    pub async fn rays(&self) -> Vec<Ray> {
        self.inner.read().await.scatter.rays().to_vec()
    }

    /// Number of rays usable as fusion input.
    pub async fn ready_count(&self) -> usize {
        self.inner.read().await.scatter.ready_count()
    }

    /// True if any ray is currently generating.
    pub async fn any_generating(&self) -> bool {
        self.inner.read().await.scatter.any_generating()
    }

    /// Resizes the ray set to exactly `n`, clamped to the configured
    /// maximum. Existing rays are preserved by index; trailing rays are
    /// removed, cancelling their jobs first.
    pub async fn set_ray_count(&self, n: usize) {
        let mut inner = self.inner.write().await;
        let was_generating = inner.scatter.any_generating();
        let removed = inner.scatter.resize(n);
        let count = inner.scatter.ray_count();
        for ray_id in removed {
            self.emit(StoreEvent::RayRemoved { ray_id });
        }
        tracing::debug!(count, "ray count changed");
        self.emit(StoreEvent::RayCountChanged { count });
        if was_generating && !inner.scatter.any_generating() {
            self.settle_scatter(&mut inner);
        }
    }

    /// Binds a ray to a model (or back to the session default with `None`).
    /// Takes effect on the ray's next run.
    pub async fn set_ray_model(&self, ray_id: &str, model_id: Option<String>) -> bool {
        let mut inner = self.inner.write().await;
        let Some(ray) = inner.scatter.ray_mut(ray_id) else {
            return false;
        };
        ray.model_id = model_id;
        drop(inner);
        self.emit(StoreEvent::RayUpdated {
            ray_id: ray_id.to_string(),
        });
        true
    }

    /// Starts generation for every ray that is not already generating.
    ///
    /// With `restart = false` only idle rays start; with `restart = true`
    /// terminal rays restart too, beginning a new scatter pass and re-arming
    /// the auto-merge trigger. Idempotent while rays are in flight.
    pub async fn start_all(&self, restart: bool) {
        let (started, history) = {
            let mut inner = self.inner.write().await;
            if restart {
                inner.gather.rearm_auto_merge();
            }
            (inner.scatter.begin_runs(restart), inner.history.clone())
        };
        if !started.is_empty() {
            tracing::info!(count = started.len(), restart, "scatter batch started");
        }
        for run in started {
            self.emit(StoreEvent::RayUpdated {
                ray_id: run.ray_id.clone(),
            });
            self.spawn_ray_job(run, history.clone());
        }
    }

    /// Restarts a single ray from a terminal (or idle) state.
    pub async fn restart_ray(&self, ray_id: &str) -> bool {
        let (started, history) = {
            let mut inner = self.inner.write().await;
            let Some(run) = inner.scatter.begin_single_run(ray_id) else {
                return false;
            };
            (run, inner.history.clone())
        };
        self.emit(StoreEvent::RayUpdated {
            ray_id: started.ray_id.clone(),
        });
        self.spawn_ray_job(started, history);
        true
    }

    /// Cancels every generating ray. Safe no-op when nothing is generating.
    pub async fn stop_all(&self) {
        let stopped = {
            let mut inner = self.inner.write().await;
            inner.scatter.stop_all()
        };
        if !stopped.is_empty() {
            tracing::info!(count = stopped.len(), "scatter batch stopped");
        }
        for ray_id in stopped {
            self.emit(StoreEvent::RayUpdated { ray_id });
        }
    }

    /// Removes one ray, cancelling its job first if generating.
    pub async fn remove_ray(&self, ray_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let was_generating = inner.scatter.any_generating();
        if !inner.scatter.remove(ray_id) {
            return false;
        }
        let count = inner.scatter.ray_count();
        self.emit(StoreEvent::RayRemoved {
            ray_id: ray_id.to_string(),
        });
        self.emit(StoreEvent::RayCountChanged { count });
        if was_generating && !inner.scatter.any_generating() {
            self.settle_scatter(&mut inner);
        }
        true
    }

    fn spawn_ray_job(&self, started: StartedRun, history: Vec<ConversationMessage>) {
        let model_id = started
            .model_id
            .or_else(|| self.config.default_model.clone())
            .unwrap_or_else(|| "default".to_string());
        let request = JobRequest {
            model_id,
            prompt: PromptContext::from_history(history),
        };
        let store = self.clone();
        let target = JobTarget::Ray {
            ray_id: started.ray_id,
        };
        tokio::spawn(async move {
            store
                .pump_job(target, started.run, request, started.cancel)
                .await;
        });
    }

    // ------------------------------------------------------------------
    // Gather operations
    // ------------------------------------------------------------------

    /// Snapshot of the ordered fusion list.
    pub async fn fusions(&self) -> Vec<Fusion> {
        self.inner.read().await.gather.fusions().to_vec()
    }

    /// True while a merge request awaits the user's confirm/deny decision.
    pub async fn pending_confirmation(&self) -> bool {
        self.inner.read().await.gather.pending_confirmation()
    }

    /// Selects the merge strategy and target model for new fusions.
    pub async fn set_fusion_selection(
        &self,
        factory_id: Option<String>,
        target_model_id: Option<String>,
    ) {
        if let Some(id) = factory_id.as_deref() {
            if !self.registry.contains(id) {
                tracing::warn!(factory_id = id, "selected fusion factory is not registered");
            }
        }
        let mut inner = self.inner.write().await;
        inner.gather.set_selection(factory_id, target_model_id);
    }

    /// Merge eligibility: at least two ready rays plus a selected strategy
    /// and target model.
    pub async fn can_gather(&self) -> bool {
        let inner = self.inner.read().await;
        let ready = inner.scatter.ready_count();
        inner.gather.can_gather(ready)
            && inner
                .gather
                .selected_factory_id()
                .is_some_and(|id| self.registry.contains(id))
    }

    /// Requests creation of a fusion from the current selection.
    ///
    /// If no ray is generating the fusion is created immediately (and
    /// started when the selected strategy is auto-runnable and auto-start is
    /// enabled). If scatter is still running, a pending confirmation is
    /// raised instead and must be resolved through
    /// [`confirm_pending_fusion`](Self::confirm_pending_fusion) or
    /// [`deny_pending_fusion`](Self::deny_pending_fusion). An ineligible
    /// request is a silent no-op reported as `Rejected`.
    pub async fn request_create_fusion(&self) -> FusionRequest {
        let mut inner = self.inner.write().await;
        let selection_ok = inner
            .gather
            .selected_factory_id()
            .is_some_and(|id| self.registry.contains(id))
            && inner.gather.target_model_id().is_some();
        if !selection_ok {
            return FusionRequest::Rejected;
        }
        if inner.scatter.any_generating() {
            if inner.gather.set_pending_confirmation(true) {
                tracing::debug!("merge requested mid-scatter; awaiting confirmation");
                self.emit(StoreEvent::ConfirmationRequested);
            }
            return FusionRequest::AwaitingConfirmation;
        }
        match self.create_fusion_locked(&mut inner) {
            Some(fusion_id) => FusionRequest::Created { fusion_id },
            None => FusionRequest::Rejected,
        }
    }

    /// Resolves a pending confirmation as "merge now": stops the scatter
    /// batch, then creates the fusion from whatever is ready.
    pub async fn confirm_pending_fusion(&self) -> FusionRequest {
        let mut inner = self.inner.write().await;
        if !inner.gather.set_pending_confirmation(false) {
            return FusionRequest::Rejected;
        }
        self.emit(StoreEvent::ConfirmationCleared);
        let stopped = inner.scatter.stop_all();
        for ray_id in stopped {
            self.emit(StoreEvent::RayUpdated { ray_id });
        }
        match self.create_fusion_locked(&mut inner) {
            Some(fusion_id) => FusionRequest::Created { fusion_id },
            None => FusionRequest::Rejected,
        }
    }

    /// Resolves a pending confirmation as "keep scattering": no fusion is
    /// created and the in-flight rays continue unaffected.
    pub async fn deny_pending_fusion(&self) {
        let mut inner = self.inner.write().await;
        if inner.gather.set_pending_confirmation(false) {
            self.emit(StoreEvent::ConfirmationCleared);
        }
    }

    /// Starts the fusion's merge job, or cancels it if already fusing.
    pub async fn toggle_gathering(&self, fusion_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(fusion) = inner.gather.fusion_mut(fusion_id) else {
            return false;
        };
        if fusion.is_fusing() {
            fusion.stop();
            self.emit(StoreEvent::FusionUpdated {
                fusion_id: fusion_id.to_string(),
            });
            true
        } else {
            self.start_fusion_locked(&mut inner, fusion_id)
        }
    }

    /// Edits a fusion's instructions. Only allowed while the fusion is not
    /// fusing and its strategy declares editable instructions.
    pub async fn set_fusion_instructions(
        &self,
        fusion_id: &str,
        instructions: Option<String>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        let Some(fusion) = inner.gather.fusion_mut(fusion_id) else {
            return false;
        };
        let editable = self
            .registry
            .get(&fusion.factory_id)
            .map(|f| f.capabilities().editable_instructions)
            .unwrap_or(false);
        if !editable || !fusion.instructions_editable() {
            return false;
        }
        fusion.instructions = instructions;
        drop(inner);
        self.emit(StoreEvent::FusionUpdated {
            fusion_id: fusion_id.to_string(),
        });
        true
    }

    /// Removes one fusion, cancelling its job first if fusing.
    pub async fn remove_fusion(&self, fusion_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.gather.remove(fusion_id) {
            return false;
        }
        drop(inner);
        self.emit(StoreEvent::FusionRemoved {
            fusion_id: fusion_id.to_string(),
        });
        true
    }

    /// Creates a fusion from the current selection when `can_gather` holds,
    /// starting it when the auto-start rules apply. Caller holds the lock.
    fn create_fusion_locked(&self, inner: &mut SessionInner) -> Option<String> {
        if !inner.gather.can_gather(inner.scatter.ready_count()) {
            return None;
        }
        let factory = inner
            .gather
            .selected_factory_id()
            .and_then(|id| self.registry.get(id))?;
        let fusion_id = inner.gather.create_fusion()?;
        tracing::info!(fusion_id = %fusion_id, factory_id = factory.id(), "fusion created");
        self.emit(StoreEvent::FusionCreated {
            fusion_id: fusion_id.clone(),
        });
        if self.config.auto_start_on_completion && factory.capabilities().auto_runnable {
            self.start_fusion_locked(inner, &fusion_id);
        }
        Some(fusion_id)
    }

    /// Snapshots the ready rays, builds the merge job from the fusion's
    /// strategy, and spawns its pump. Caller holds the lock.
    fn start_fusion_locked(&self, inner: &mut SessionInner, fusion_id: &str) -> bool {
        let snapshots = inner.scatter.snapshot_ready();
        let Some(fusion) = inner.gather.fusion_mut(fusion_id) else {
            return false;
        };
        if fusion.is_fusing() {
            return false;
        }
        let Some(factory) = self.registry.get(&fusion.factory_id) else {
            fusion.state = FusionState::Error;
            fusion.error =
                Some(PrismError::factory_not_found(fusion.factory_id.as_str()).to_string());
            self.emit(StoreEvent::FusionUpdated {
                fusion_id: fusion_id.to_string(),
            });
            return false;
        };
        let spec = factory.build_job_spec(&snapshots, fusion.instructions.as_deref(), &fusion.model_id);
        let model_id = if fusion.model_id.is_empty() {
            spec.default_model.clone()
        } else {
            fusion.model_id.clone()
        };
        let cancel = CancellationToken::new();
        let run = fusion.begin_run(snapshots, cancel.clone());
        tracing::debug!(fusion_id, run, "fusion run started");
        self.emit(StoreEvent::FusionUpdated {
            fusion_id: fusion_id.to_string(),
        });
        let request = JobRequest {
            model_id,
            prompt: spec.prompt,
        };
        let store = self.clone();
        let target = JobTarget::Fusion {
            fusion_id: fusion_id.to_string(),
        };
        tokio::spawn(async move {
            store.pump_job(target, run, request, cancel).await;
        });
        true
    }

    // ------------------------------------------------------------------
    // Accept / finalize
    // ------------------------------------------------------------------

    /// Exports a ray's output through the accept callback. Read-only: no
    /// ray or fusion state changes.
    pub async fn accept_ray(&self, ray_id: &str) -> bool {
        let payload = {
            let inner = self.inner.read().await;
            inner
                .scatter
                .rays()
                .iter()
                .find(|r| r.id == ray_id)
                .map(|ray| AcceptedOutput {
                    source: AcceptedSource::Ray {
                        ray_id: ray.id.clone(),
                    },
                    text: ray.output.text(),
                })
        };
        self.deliver_accept(payload).await
    }

    /// Exports a fusion's output through the accept callback. Read-only.
    pub async fn accept_fusion(&self, fusion_id: &str) -> bool {
        let payload = {
            let inner = self.inner.read().await;
            inner
                .gather
                .fusions()
                .iter()
                .find(|f| f.id == fusion_id)
                .map(|fusion| AcceptedOutput {
                    source: AcceptedSource::Fusion {
                        fusion_id: fusion.id.clone(),
                    },
                    text: fusion.output.text(),
                })
        };
        self.deliver_accept(payload).await
    }

    async fn deliver_accept(&self, payload: Option<AcceptedOutput>) -> bool {
        let Some(payload) = payload else {
            return false;
        };
        if let Some(callback) = self.on_accept.read().await.as_ref() {
            callback(payload.clone());
        }
        self.emit(StoreEvent::OutputAccepted {
            source: payload.source,
        });
        true
    }

    // ------------------------------------------------------------------
    // Job event pump
    // ------------------------------------------------------------------

    /// Drives one generation job: awaits adapter events and applies them as
    /// serialized state updates until a terminal event, a stale run, or
    /// cancellation ends the stream.
    async fn pump_job(
        self,
        target: JobTarget,
        run: u64,
        request: JobRequest,
        cancel: CancellationToken,
    ) {
        let mut handle = match self.agent.start(request).await {
            Ok(handle) => handle,
            Err(err) => {
                self.apply_job_event(&target, run, JobEvent::Error(err.to_string()))
                    .await;
                return;
            }
        };
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // The entity was already marked Stopped by the operation
                    // that cancelled us; release the upstream job.
                    handle.cancel();
                    return;
                }
                event = handle.next_event() => {
                    match event {
                        Some(event) => {
                            let terminal = !matches!(event, JobEvent::Delta(_));
                            let applied = self.apply_job_event(&target, run, event).await;
                            if !applied {
                                // A stale event means the run was stopped or
                                // superseded; the upstream job must still be
                                // told to release its resources.
                                handle.cancel();
                                return;
                            }
                            if terminal {
                                return;
                            }
                        }
                        None => {
                            let err = PrismError::channel_closed(
                                "stream ended before a terminal event",
                            );
                            self.apply_job_event(&target, run, JobEvent::Error(err.to_string()))
                                .await;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Applies one adapter event under the write lock. Returns false when
    /// the event was stale (superseded run or non-active entity).
    async fn apply_job_event(&self, target: &JobTarget, run: u64, event: JobEvent) -> bool {
        let mut inner = self.inner.write().await;
        match target {
            JobTarget::Ray { ray_id } => {
                let terminal = !matches!(event, JobEvent::Delta(_));
                let applied = inner.scatter.apply_event(ray_id, run, &event);
                if applied {
                    self.emit(StoreEvent::RayUpdated {
                        ray_id: ray_id.clone(),
                    });
                    if terminal && !inner.scatter.any_generating() {
                        self.settle_scatter(&mut inner);
                    }
                }
                applied
            }
            JobTarget::Fusion { fusion_id } => {
                let applied = inner.gather.apply_event(fusion_id, run, &event);
                if applied {
                    self.emit(StoreEvent::FusionUpdated {
                        fusion_id: fusion_id.clone(),
                    });
                }
                applied
            }
        }
    }

    /// Runs once when the last generating ray reaches a terminal state or is
    /// removed: resolves a pending confirmation that became redundant and
    /// fires the auto-merge trigger (at most once per scatter pass).
    fn settle_scatter(&self, inner: &mut SessionInner) {
        let ready_count = inner.scatter.ready_count();
        tracing::debug!(ready_count, "scatter pass settled");
        self.emit(StoreEvent::ScatterSettled { ready_count });

        let had_pending = inner.gather.pending_confirmation();
        if self.config.auto_start_on_completion {
            if had_pending {
                // Completion triggers the auto-merge path directly; the
                // pending confirmation is redundant.
                inner.gather.set_pending_confirmation(false);
                self.emit(StoreEvent::ConfirmationCleared);
            }
            self.try_auto_merge(inner);
        } else if had_pending {
            // Nothing left to stop: the pending request resolves as confirm.
            inner.gather.set_pending_confirmation(false);
            self.emit(StoreEvent::ConfirmationCleared);
            self.create_fusion_locked(inner);
        }
    }

    /// Fires the auto-merge trigger when every condition holds. The
    /// once-per-pass budget is only spent when a fusion is actually created.
    fn try_auto_merge(&self, inner: &mut SessionInner) {
        if inner.gather.auto_merge_fired()
            || inner.scatter.any_generating()
            || inner.scatter.ready_count() < 2
        {
            return;
        }
        let Some(factory) = inner
            .gather
            .selected_factory_id()
            .and_then(|id| self.registry.get(id))
        else {
            return;
        };
        if !factory.capabilities().auto_runnable || inner.gather.target_model_id().is_none() {
            return;
        }
        let Some(fusion_id) = inner.gather.create_fusion() else {
            return;
        };
        inner.gather.fire_auto_merge();
        tracing::info!(fusion_id = %fusion_id, "auto-merge fired");
        self.emit(StoreEvent::FusionCreated {
            fusion_id: fusion_id.clone(),
        });
        self.start_fusion_locked(inner, &fusion_id);
        self.emit(StoreEvent::AutoMergeStarted { fusion_id });
    }
}
