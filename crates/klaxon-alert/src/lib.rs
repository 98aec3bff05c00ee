//! Trigger evaluation engine.
//!
//! [`evaluator`] evaluates single conditions against data points,
//! [`dampening`] accumulates per-cycle outcomes into at most one fire per
//! satisfied policy, and [`engine::AlertEngine`] ties both to the storage
//! services: it keeps a working set of enabled triggers (reloaded through
//! the definitions listener), creates alerts and dispatches actions when a
//! firing cycle completes, and drives the autoresolve mode cycle.

pub mod config;
pub mod dampening;
pub mod engine;
pub mod error;
pub mod evaluator;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use engine::AlertEngine;
pub use error::EvalError;
