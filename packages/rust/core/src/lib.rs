//! Generation pass orchestration for scubuild.
//!
//! This crate runs the unit grouper over every module of a module table,
//! turning per-module failures into report warnings, and persists the
//! resulting [`GenerationReport`](scubuild_shared::GenerationReport).

pub mod pipeline;
pub mod report;
