//! # rover_app
//!
//! Simulation wiring shared by the `rover_app` binary and its tests:
//! configuration, the [`SimContext`] that owns one world, the demonstration
//! scene and the fixed-timestep [`TickLoop`].

pub mod config;
pub mod context;
pub mod scene;
pub mod tick;

pub use config::SimConfig;
pub use context::SimContext;
pub use tick::{TickConfig, TickLoop};
