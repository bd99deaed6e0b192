//! Reference `GenerationAgent` implementations for the Prism engine.
//!
//! Real deployments plug provider adapters (HTTP APIs, local CLIs) in behind
//! `prism_core::job::GenerationAgent`; the agents here cover everything else:
//! [`ScriptedAgent`] replays deterministic per-model scripts for tests and
//! simulations, and [`EchoAgent`] streams the prompt back for wiring checks
//! and demos.

pub mod echo_agent;
pub mod scripted_agent;

pub use echo_agent::EchoAgent;
pub use scripted_agent::{Script, ScriptStep, ScriptedAgent};
