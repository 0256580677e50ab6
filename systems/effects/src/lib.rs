#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Time-boxed overlay effects layered over the cell grid.
//!
//! Each effect is an independent state machine that advances once per tick,
//! reads the grid, and answers per-cell override queries. Effects are
//! registered in an [`EffectRegistry`] whose registration order doubles as
//! override priority. Effects never reallocate the grid; the few that persist
//! glyph mutations write through the grid's cell accessors.

mod glitch;
mod lightning;
mod mosaic;
mod pulse;
mod registry;
mod reversal;

use matrix_code_core::{CellOverride, EngineConfig};
use matrix_code_grid::CellGrid;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

pub use glitch::{GlitchBar, GlitchBars};
pub use lightning::Lightning;
pub use mosaic::{Mosaic, MosaicBlock, MosaicPhase};
pub use pulse::ClearPulse;
pub use registry::EffectRegistry;
pub use reversal::{ReversalPhase, TimeReversal};

/// Mutable state an effect may touch while triggering or updating.
#[derive(Debug)]
pub struct EffectContext<'a> {
    /// Shared cell store.
    pub grid: &'a mut CellGrid,
    /// Configuration snapshot for this tick.
    pub config: &'a EngineConfig,
    /// Tick counter since the session started.
    pub frame: u64,
}

/// Follow-up work an effect asks the registry to perform after every effect has updated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EffectRequest {
    /// Trigger the effect registered under the given name.
    Trigger(String),
}

/// Capability interface shared by every overlay effect.
pub trait Effect {
    /// Name used to trigger the effect.
    fn name(&self) -> &str;

    /// Reports whether the effect is currently running.
    fn is_active(&self) -> bool;

    /// Starts the effect. Returns `false` and stays inactive when it cannot start.
    fn trigger(&mut self, ctx: &mut EffectContext<'_>) -> bool;

    /// Advances the effect by one tick, whether or not it is active.
    fn update(&mut self, ctx: &mut EffectContext<'_>, out: &mut Vec<EffectRequest>);

    /// Per-cell render replacement for this frame, if any.
    fn override_for(&self, index: usize, grid: &CellGrid) -> Option<CellOverride>;

    /// Cells the effect currently overrides, or `None` when it cannot enumerate them.
    fn active_indices(&self, grid: &CellGrid) -> Option<Vec<usize>>;
}

/// Closed set of effects the engine composes.
#[derive(Debug)]
pub enum EffectKind {
    /// Horizontal glitch bars.
    GlitchBars(GlitchBars),
    /// Branching lightning bolt.
    Lightning(Lightning),
    /// Playback-rate meta-effect.
    TimeReversal(TimeReversal),
    /// Layered block mosaic.
    Mosaic(Mosaic),
    /// Expanding clear-pulse ring.
    ClearPulse(ClearPulse),
}

impl EffectKind {
    fn inner(&self) -> &dyn Effect {
        match self {
            Self::GlitchBars(effect) => effect,
            Self::Lightning(effect) => effect,
            Self::TimeReversal(effect) => effect,
            Self::Mosaic(effect) => effect,
            Self::ClearPulse(effect) => effect,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Effect {
        match self {
            Self::GlitchBars(effect) => effect,
            Self::Lightning(effect) => effect,
            Self::TimeReversal(effect) => effect,
            Self::Mosaic(effect) => effect,
            Self::ClearPulse(effect) => effect,
        }
    }
}

impl Effect for EffectKind {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn is_active(&self) -> bool {
        self.inner().is_active()
    }

    fn trigger(&mut self, ctx: &mut EffectContext<'_>) -> bool {
        self.inner_mut().trigger(ctx)
    }

    fn update(&mut self, ctx: &mut EffectContext<'_>, out: &mut Vec<EffectRequest>) {
        self.inner_mut().update(ctx, out);
    }

    fn override_for(&self, index: usize, grid: &CellGrid) -> Option<CellOverride> {
        self.inner().override_for(index, grid)
    }

    fn active_indices(&self, grid: &CellGrid) -> Option<Vec<usize>> {
        self.inner().active_indices(grid)
    }
}

impl From<GlitchBars> for EffectKind {
    fn from(effect: GlitchBars) -> Self {
        Self::GlitchBars(effect)
    }
}

impl From<Lightning> for EffectKind {
    fn from(effect: Lightning) -> Self {
        Self::Lightning(effect)
    }
}

impl From<TimeReversal> for EffectKind {
    fn from(effect: TimeReversal) -> Self {
        Self::TimeReversal(effect)
    }
}

impl From<Mosaic> for EffectKind {
    fn from(effect: Mosaic) -> Self {
        Self::Mosaic(effect)
    }
}

impl From<ClearPulse> for EffectKind {
    fn from(effect: ClearPulse) -> Self {
        Self::ClearPulse(effect)
    }
}

/// Idle-time countdown that fires an effect periodically.
///
/// The first interval is stretched by a random extra of up to half its length
/// so that effects enabled together do not fire in lockstep.
#[derive(Debug, Default)]
pub(crate) struct AutoTimer {
    remaining: Option<u32>,
}

impl AutoTimer {
    /// Counts one tick down; returns `true` on the tick the timer fires.
    pub(crate) fn tick(&mut self, enabled: bool, interval: u32, rng: &mut ChaCha8Rng) -> bool {
        if !enabled {
            self.remaining = None;
            return false;
        }
        let interval = interval.max(1);
        let remaining = self
            .remaining
            .get_or_insert_with(|| interval + rng.gen_range(0..=interval / 2));
        if *remaining <= 1 {
            self.remaining = Some(interval);
            true
        } else {
            *remaining -= 1;
            false
        }
    }
}

pub(crate) fn chance(rng: &mut ChaCha8Rng, probability: f32) -> bool {
    rng.gen::<f32>() < probability
}
