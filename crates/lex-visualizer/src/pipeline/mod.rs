//! Pipeline module.
//!
//! This module wires the stages together: load, clean, project, render and
//! export, in that order, for one request at a time.

mod builder;
mod request;

pub use builder::{Pipeline, PipelineBuilder};
pub use request::{PipelineOutput, PipelineRequest};
