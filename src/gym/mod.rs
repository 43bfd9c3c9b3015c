pub mod cliff_walking;
pub mod frozen_lake;
pub mod grid;
pub mod gridworld;
pub mod windy_gridworld;

pub use cliff_walking::CliffWalking;
pub use frozen_lake::FrozenLake;
pub use grid::{GridAction, Pos};
pub use gridworld::Gridworld;
pub use windy_gridworld::WindyGridworld;
