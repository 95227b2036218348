//! Sync domain models, engine, and orchestration.

mod engine;
mod model;
mod orchestrator;
mod retry;
mod traits;

pub use engine::*;
pub use model::*;
pub use orchestrator::*;
pub use retry::*;
pub use traits::*;

#[cfg(test)]
mod tests;
