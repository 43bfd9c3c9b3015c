/// Agent: policy ownership, action selection, episode rollouts
pub mod agent;

/// Solver algorithms: dynamic programming, temporal-difference control,
/// Monte Carlo control
pub mod algo;

/// Implementations of strategies for time-decaying hyperparameters
pub mod decay;

/// Environment contract
pub mod env;

/// Episode traces
pub mod episode;

/// Error types
pub mod error;

/// Testing environments
pub mod gym;

/// Policy representation
pub mod policy;

/// Value and action-value tables
pub mod tables;

mod util;
