//! Fusion domain module.
//!
//! A fusion is one gather/merge operation: it snapshots the outputs of the
//! currently ready rays, hands them to a merge strategy (a fusion factory),
//! and streams the synthesized result into its own output message.

mod model;

pub use model::{Fusion, FusionState, RayOutputSnapshot};
