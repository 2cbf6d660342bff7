pub mod config;
mod engine;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod planner;
pub mod rollout;
pub mod selection;
pub mod strategy;
pub mod widening;

#[cfg(test)]
mod tests;
