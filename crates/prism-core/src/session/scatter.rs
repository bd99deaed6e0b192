//! Scatter controller: owns the ray set.
//!
//! All mutations here are synchronous transitions over `Vec<Ray>`; the store
//! wraps them in its single write lock and spawns the asynchronous job pumps
//! for the runs this controller marks as started.

use tokio_util::sync::CancellationToken;

use crate::fusion::RayOutputSnapshot;
use crate::job::JobEvent;
use crate::ray::{Ray, RayState};

/// A run the controller has marked as generating; the store spawns the
/// matching job task.
#[derive(Debug)]
pub(crate) struct StartedRun {
    pub ray_id: String,
    pub run: u64,
    pub model_id: Option<String>,
    pub cancel: CancellationToken,
}

/// Owns the ordered ray set and the scatter batch lifecycle.
#[derive(Debug)]
pub struct ScatterController {
    rays: Vec<Ray>,
    max_rays: usize,
}

impl ScatterController {
    /// Creates a controller with `initial` idle rays, bounded by `max_rays`.
    pub fn new(initial: usize, max_rays: usize) -> Self {
        let count = initial.min(max_rays);
        Self {
            rays: (0..count).map(|_| Ray::new(None)).collect(),
            max_rays,
        }
    }

    /// Read access to the ordered ray list.
    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }

    /// Current ray count.
    pub fn ray_count(&self) -> usize {
        self.rays.len()
    }

    /// Number of rays usable as fusion input.
    pub fn ready_count(&self) -> usize {
        self.rays.iter().filter(|r| r.is_ready()).count()
    }

    /// Returns true if any ray is currently generating.
    pub fn any_generating(&self) -> bool {
        self.rays.iter().any(|r| r.is_generating())
    }

    /// Snapshots the outputs of all ready rays, in display order.
    pub fn snapshot_ready(&self) -> Vec<RayOutputSnapshot> {
        self.rays
            .iter()
            .filter(|r| r.is_ready())
            .map(RayOutputSnapshot::of)
            .collect()
    }

    pub(crate) fn ray_mut(&mut self, ray_id: &str) -> Option<&mut Ray> {
        self.rays.iter_mut().find(|r| r.id == ray_id)
    }

    /// Resizes the ray set to exactly `n` (clamped to the configured
    /// maximum), preserving existing rays by index. Trailing rays are
    /// removed highest-index first; a generating ray is cancelled before
    /// removal. Returns the removed ray ids.
    pub(crate) fn resize(&mut self, n: usize) -> Vec<String> {
        let target = n.min(self.max_rays);
        let mut removed = Vec::new();
        while self.rays.len() > target {
            // Unwrap is safe: the loop condition guarantees a last element.
            let mut ray = self.rays.pop().unwrap();
            ray.stop();
            removed.push(ray.id);
        }
        while self.rays.len() < target {
            self.rays.push(Ray::new(None));
        }
        removed
    }

    /// Marks rays as generating for a fresh run and returns the runs the
    /// store must spawn jobs for.
    ///
    /// Idempotent: rays already generating are left untouched, so calling
    /// this twice mid-flight never spawns duplicate jobs. With
    /// `restart = false` only idle rays start; with `restart = true`
    /// terminal rays are restarted as well.
    pub(crate) fn begin_runs(&mut self, restart: bool) -> Vec<StartedRun> {
        let mut started = Vec::new();
        for ray in &mut self.rays {
            if ray.is_generating() {
                continue;
            }
            if !restart && ray.state != RayState::Idle {
                continue;
            }
            let cancel = CancellationToken::new();
            let run = ray.begin_run(cancel.clone());
            started.push(StartedRun {
                ray_id: ray.id.clone(),
                run,
                model_id: ray.model_id.clone(),
                cancel,
            });
        }
        started
    }

    /// Restarts a single ray from any non-generating state.
    pub(crate) fn begin_single_run(&mut self, ray_id: &str) -> Option<StartedRun> {
        let ray = self.ray_mut(ray_id)?;
        if ray.is_generating() {
            return None;
        }
        let cancel = CancellationToken::new();
        let run = ray.begin_run(cancel.clone());
        Some(StartedRun {
            ray_id: ray.id.clone(),
            run,
            model_id: ray.model_id.clone(),
            cancel,
        })
    }

    /// Cancels every generating ray. Safe no-op when nothing is generating.
    /// Returns the ids of the rays that were stopped.
    pub(crate) fn stop_all(&mut self) -> Vec<String> {
        self.rays
            .iter_mut()
            .filter_map(|ray| ray.stop().then(|| ray.id.clone()))
            .collect()
    }

    /// Removes one ray by id, cancelling its job first if generating.
    pub(crate) fn remove(&mut self, ray_id: &str) -> bool {
        let Some(index) = self.rays.iter().position(|r| r.id == ray_id) else {
            return false;
        };
        self.rays[index].stop();
        self.rays.remove(index);
        true
    }

    /// Applies one adapter event to the addressed ray. Returns true if the
    /// event was current and changed state; stale events are dropped.
    pub(crate) fn apply_event(&mut self, ray_id: &str, run: u64, event: &JobEvent) -> bool {
        let Some(ray) = self.ray_mut(ray_id) else {
            return false;
        };
        match event {
            JobEvent::Delta(fragment) => ray.apply_delta(run, fragment),
            JobEvent::Done => ray.complete(run),
            JobEvent::Error(message) => ray.fail(run, message),
        }
    }
}
