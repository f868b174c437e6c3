//! Fixed-timestep tick loop.
//!
//! Each tick runs every scripted entity through the active processor, then
//! sleeps out the rest of the tick budget. The loop starts the simulation
//! before the first tick and stops it after the last one.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::context::SimContext;

/// Timing for the tick loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
    /// Simulated seconds per tick.
    pub dt: f32,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
            dt: 1.0 / 60.0,
        }
    }
}

impl From<&SimConfig> for TickConfig {
    fn from(config: &SimConfig) -> Self {
        Self {
            tick_rate: config.tick_rate,
            max_ticks: config.max_ticks,
            dt: config.dt,
        }
    }
}

#[derive(Debug)]
pub struct TickLoop {
    tick_id: u64,
    config: TickConfig,
    context: SimContext,
}

impl TickLoop {
    #[must_use]
    pub fn new(config: TickConfig, context: SimContext) -> Self {
        Self {
            tick_id: 0,
            config,
            context,
        }
    }

    /// Ticks completed so far.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    #[must_use]
    pub fn context(&self) -> &SimContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SimContext {
        &mut self.context
    }

    /// Run one tick. The simulation must be running.
    ///
    /// # Errors
    ///
    /// Fails if the processor is not running or a script target is gone.
    pub fn tick(&mut self) -> Result<()> {
        self.tick_id += 1;
        debug!(tick_id = self.tick_id, dt = self.config.dt, "tick start");
        self.context.tick(self.config.dt)
    }

    /// Advance one tick from a paused (or not yet started) simulation and
    /// pause again.
    ///
    /// # Errors
    ///
    /// Fails if the processor cannot start or the tick fails.
    pub fn step(&mut self) -> Result<()> {
        self.tick_id += 1;
        debug!(tick_id = self.tick_id, "single step");
        self.context.step(self.config.dt)
    }

    /// Start the simulation, tick for the configured number of ticks (or
    /// forever), then stop it.
    ///
    /// # Errors
    ///
    /// Fails on a tick rate that is not a positive number, or on the first
    /// start, tick or stop failure. A failed tick still stops the simulation.
    pub fn run(&mut self) -> Result<()> {
        let tick_duration = Duration::try_from_secs_f64(1.0 / self.config.tick_rate)
            .ok()
            .filter(|d| !d.is_zero())
            .with_context(|| format!("invalid tick rate {}", self.config.tick_rate))?;
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );
        self.context.start()?;

        let result = loop {
            let start = Instant::now();

            if let Err(e) = self.tick() {
                break Err(e);
            }

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        };

        self.context.stop()?;
        result
    }
}

#[cfg(test)]
mod tests {
    use rover_component::Entity;
    use rover_math::Transform;
    use rover_processor::ProcessorState;

    use super::*;
    use crate::scene;

    fn tick_loop(max_ticks: u64) -> TickLoop {
        let config = SimConfig {
            tick_rate: 1000.0,
            max_ticks,
            clones: 4,
            robots: 1,
            ..SimConfig::default()
        };
        let mut context = SimContext::new(&config).unwrap();
        scene::build(&mut context, &config).unwrap();
        TickLoop::new(TickConfig::from(&config), context)
    }

    #[test]
    fn test_run_rejects_bad_tick_rate() {
        for tick_rate in [0.0, -1.0, f64::NAN] {
            let mut tick_loop = tick_loop(1);
            tick_loop.config.tick_rate = tick_rate;
            assert!(tick_loop.run().is_err());
            assert_eq!(tick_loop.tick_id(), 0);
            assert_eq!(
                tick_loop.context().processors.processor().state(),
                ProcessorState::Idle
            );
        }
    }

    #[test]
    fn test_tick_requires_started_simulation() {
        let mut tick_loop = tick_loop(1);
        assert!(tick_loop.tick().is_err());
    }

    #[test]
    fn test_run_limited_ticks_then_stops() {
        let mut tick_loop = tick_loop(5);
        tick_loop.run().unwrap();
        assert_eq!(tick_loop.tick_id(), 5);
        let context = tick_loop.context();
        assert_eq!(context.processors.processor().state(), ProcessorState::Stopped);
        assert!(context.factories().iter().all(|f| !f.is_materialized()));
    }

    #[test]
    fn test_step_advances_one_tick_and_pauses() {
        let mut tick_loop = tick_loop(0);
        tick_loop.step().unwrap();
        let clone = Entity::with_clone(0, 1);
        let after_one = *tick_loop.context().data.get::<Transform>(clone).unwrap();
        assert_ne!(after_one, Transform::IDENTITY);
        assert_eq!(
            tick_loop.context().processors.processor().state(),
            ProcessorState::Paused
        );

        tick_loop.step().unwrap();
        assert_eq!(tick_loop.tick_id(), 2);
        assert_ne!(
            *tick_loop.context().data.get::<Transform>(clone).unwrap(),
            after_one
        );

        tick_loop.context_mut().resume().unwrap();
        tick_loop.tick().unwrap();
        tick_loop.context_mut().stop().unwrap();
    }
}
