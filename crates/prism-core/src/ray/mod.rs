//! Ray domain module.
//!
//! A ray is one scatter candidate: a single parallel generation bound to one
//! model, with its own lifecycle state and accumulated output.

mod model;

pub use model::{Ray, RayState};
