//! Application layer: the [`engine::WorkflowEngine`] orchestrates every
//! workflow operation over the domain ports. All operations take the acting
//! user explicitly; nothing reads ambient session state.

pub mod engine;
