//! Prism core: scatter/gather orchestration for parallel LLM generation.
//!
//! A session scatters one user request across N independently streaming
//! generation jobs ("rays"), tracks their lifecycles, and gathers a chosen
//! subset of their outputs into synthesized responses ("fusions") through
//! pluggable merge strategies. The [`session::SessionStore`] is the single
//! source of truth; providers plug in behind the [`job::GenerationAgent`]
//! seam.

pub mod config;
pub mod error;
pub mod factory;
pub mod fusion;
pub mod job;
pub mod message;
pub mod ray;
pub mod session;

// Re-export common types
pub use error::PrismError;
pub use session::SessionStore;
