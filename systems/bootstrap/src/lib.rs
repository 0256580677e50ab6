#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Fixed-timestep driver that wires the grid, simulation and effects together.
//!
//! Within one tick the simulation runs to completion first, then every effect
//! updates, and only then may a renderer read the composed result.

use std::time::Duration;

use matrix_code_core::{Command, ConfigError, EngineConfig, Event};
use matrix_code_grid::CellGrid;
use matrix_code_system_effects::{
    ClearPulse, EffectContext, EffectRegistry, GlitchBars, Lightning, Mosaic, TimeReversal,
};
use matrix_code_system_simulation::{SimulationSystem, TimeScale};

/// Owns every engine component and advances them in lockstep.
#[derive(Debug)]
pub struct Kernel {
    config: EngineConfig,
    grid: CellGrid,
    simulation: SimulationSystem,
    registry: EffectRegistry,
    frame: u64,
    accumulator: Duration,
}

impl Kernel {
    /// Validates the configuration and builds the default effect composition.
    ///
    /// Effects are registered as lightning, glitch bars, mosaic, clear pulse,
    /// then time reversal; earlier effects win when overrides overlap.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let grid = CellGrid::new(config.grid.cell_width, config.grid.cell_height);
        let simulation = SimulationSystem::new(config.seed);
        let mut registry: EffectRegistry = EffectRegistry::new();
        registry.register(Lightning::new(config.seed));
        registry.register(GlitchBars::new(config.seed));
        registry.register(Mosaic::new(config.seed));
        registry.register(ClearPulse::new(config.seed));
        registry.register(TimeReversal::new(simulation.link()));

        tracing::info!(
            seed = config.seed,
            tick_rate = config.tick_rate,
            effects = registry.len(),
            "kernel ready"
        );
        Ok(Self {
            config,
            grid,
            simulation,
            registry,
            frame: 0,
            accumulator: Duration::ZERO,
        })
    }

    /// Resizes the grid to a pixel surface, reporting the new dimensions when they changed.
    pub fn resize(&mut self, width: f32, height: f32, out: &mut Vec<Event>) {
        if self.grid.resize(width, height) {
            out.push(Event::GridResized {
                columns: u32::try_from(self.grid.columns()).unwrap_or(u32::MAX),
                rows: u32::try_from(self.grid.rows()).unwrap_or(u32::MAX),
            });
        }
    }

    /// Applies a driver command.
    pub fn apply(&mut self, command: Command, out: &mut Vec<Event>) {
        match command {
            Command::Resize { width, height } => self.resize(width, height, out),
            Command::TriggerEffect { name } => {
                let _ = self.trigger(&name, out);
            }
            Command::SetTimeScale { value } => {
                if value.is_finite() {
                    self.simulation.time_scale().set(value);
                } else {
                    tracing::warn!(value, "ignoring non-finite time scale");
                }
            }
        }
    }

    /// Triggers a registered effect by name.
    pub fn trigger(&mut self, name: &str, out: &mut Vec<Event>) -> bool {
        let mut ctx = EffectContext {
            grid: &mut self.grid,
            config: &self.config,
            frame: self.frame,
        };
        self.registry.trigger(name, &mut ctx, out)
    }

    /// Accumulates real elapsed time and runs every whole tick it covers.
    ///
    /// A gap longer than `max_frame_delta_ms` collapses into a single tick so a
    /// stalled driver does not fast-forward. Returns the number of ticks run.
    pub fn advance(&mut self, elapsed: Duration, out: &mut Vec<Event>) -> u32 {
        if elapsed > Duration::from_millis(self.config.max_frame_delta_ms) {
            tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "frame gap collapsed");
            self.accumulator = Duration::ZERO;
            self.tick(out);
            return 1;
        }

        let step = self.tick_duration();
        self.accumulator += elapsed;
        let mut ticks = 0;
        while self.accumulator >= step {
            self.accumulator -= step;
            self.tick(out);
            ticks += 1;
        }
        ticks
    }

    /// Runs exactly one fixed tick.
    pub fn tick(&mut self, out: &mut Vec<Event>) {
        self.simulation.update(&mut self.grid, &self.config, self.frame);

        let mut ctx = EffectContext {
            grid: &mut self.grid,
            config: &self.config,
            frame: self.frame,
        };
        self.registry.update(&mut ctx, out);
        self.frame += 1;
    }

    /// Length of one fixed tick.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.config.tick_rate))
            .max(Duration::from_nanos(1))
    }

    /// Replaces the configuration snapshot after validating it.
    ///
    /// Cell metrics are fixed when the kernel is built; a snapshot that changes
    /// them is accepted but the grid keeps the metrics it was built with.
    pub fn set_config(&mut self, config: EngineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if config.grid != self.config.grid {
            tracing::warn!("cell metrics changes take effect on the next kernel");
        }
        self.config = config;
        Ok(())
    }

    /// Shared cell store.
    #[must_use]
    pub const fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// Registered effects in priority order.
    #[must_use]
    pub const fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    /// Stream simulation.
    #[must_use]
    pub const fn simulation(&self) -> &SimulationSystem {
        &self.simulation
    }

    /// Simulation playback rate.
    #[must_use]
    pub const fn time_scale(&self) -> &TimeScale {
        self.simulation.time_scale()
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Current configuration snapshot.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}
