//! CLI command implementations.

pub mod checkpoints;
pub mod pull;
