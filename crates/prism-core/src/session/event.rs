//! Store notification events.
//!
//! Every mutation the store applies is announced as a `StoreEvent` on a
//! broadcast channel so UI collaborators can re-query the affected entity.
//! Events are notifications, not state carriers: observers read the current
//! snapshot through the store's query surface.

use serde::{Deserialize, Serialize};

/// Identifies which entity an accepted output came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcceptedSource {
    /// A ray's output was accepted.
    Ray { ray_id: String },
    /// A fusion's output was accepted.
    Fusion { fusion_id: String },
}

/// The payload handed to the session's accept callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedOutput {
    /// Which entity was accepted.
    pub source: AcceptedSource,
    /// The full output text at acceptance time.
    pub text: String,
}

/// A state-change notification published by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// The ray set was resized.
    RayCountChanged { count: usize },
    /// A ray's state, output, or binding changed.
    RayUpdated { ray_id: String },
    /// A ray was removed.
    RayRemoved { ray_id: String },
    /// Every ray reached a terminal state.
    ScatterSettled { ready_count: usize },
    /// A fusion was created.
    FusionCreated { fusion_id: String },
    /// A fusion's state, output, or instructions changed.
    FusionUpdated { fusion_id: String },
    /// A fusion was removed.
    FusionRemoved { fusion_id: String },
    /// A merge was requested while scatter is still running; awaiting the
    /// user's confirm/deny decision.
    ConfirmationRequested,
    /// The pending confirmation was resolved or became redundant.
    ConfirmationCleared,
    /// The auto-merge trigger created and started a fusion.
    AutoMergeStarted { fusion_id: String },
    /// An output was accepted and exported through the accept callback.
    OutputAccepted { source: AcceptedSource },
}
