//! The staged generation pipeline.
//!
//! [`context::PipelineContext`] bundles the external collaborators;
//! [`stage::run_radius`] drives one radius through
//! locate -> fetch -> render; [`rerender`] serves feature/theme/radius
//! changes from cached slot data.

pub mod context;
pub mod progress;
pub mod rerender;
pub mod stage;

#[cfg(test)]
pub(crate) mod testutil;

pub use context::PipelineContext;
pub use stage::{run_radius, StageRole};
