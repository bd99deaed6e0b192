//! Session orchestration module.
//!
//! This module contains the orchestration store and its two controllers.
//!
//! # Module Structure
//!
//! - `event`: state-change notifications (`StoreEvent`, `AcceptedOutput`)
//! - `scatter`: the scatter controller owning the ray set
//! - `gather`: the gather controller owning the fusion set and merge flags
//! - `store`: the session store composing both behind one write lock
//!
//! # Usage
//!
//! ```ignore
//! use prism_core::session::{SessionStore, StoreEvent, FusionRequest};
//! ```

mod event;
mod gather;
mod scatter;
mod store;


// Re-export public API
pub use event::{AcceptedOutput, AcceptedSource, StoreEvent};
pub use gather::GatherController;
pub use scatter::ScatterController;
pub use store::{AcceptCallback, FusionRequest, SessionStore};
