use std::collections::BTreeSet;

use matrix_code_core::{derive_labeled_seed, CellOverride, LightningTuning};
use matrix_code_grid::CellGrid;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{chance, AutoTimer, Effect, EffectContext, EffectRequest};

const NAME: &str = "Lightning";

/// Branching lightning bolt drawn across the full grid width.
///
/// The bolt is a read-only overlay: it only lights cells the simulation has
/// already made visible and never writes into the grid.
#[derive(Debug)]
pub struct Lightning {
    rng: ChaCha8Rng,
    timer: AutoTimer,
    tuning: LightningTuning,
    active: bool,
    remaining: u32,
    flicker: u32,
    dimensions: (usize, usize),
    path: BTreeSet<usize>,
}

impl Lightning {
    /// Creates an idle bolt whose random stream derives from the engine seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(derive_labeled_seed(seed, "effects.lightning")),
            timer: AutoTimer::default(),
            tuning: LightningTuning::default(),
            active: false,
            remaining: 0,
            flicker: 0,
            dimensions: (0, 0),
            path: BTreeSet::new(),
        }
    }

    /// Cell indices touched by the current bolt.
    #[must_use]
    pub const fn path(&self) -> &BTreeSet<usize> {
        &self.path
    }

    fn generate(&mut self, grid: &CellGrid) {
        self.path.clear();
        let (columns, rows) = (grid.columns(), grid.rows());
        self.dimensions = (columns, rows);
        if columns == 0 || rows == 0 {
            return;
        }

        let last_row = rows as i32 - 1;
        let variance = self.tuning.jitter.max(1) as i32;
        let half = (self.tuning.thickness / 2) as i32;
        let mut cy = (rows / 2) as i32 + self.rng.gen_range(-1..=1);

        for x in 0..columns as i32 {
            cy = (cy + self.rng.gen_range(-variance..=variance)).clamp(0, last_row);
            for dy in -half..=half {
                if let Some(index) = grid.index(x, cy + dy) {
                    let _ = self.path.insert(index);
                }
            }

            if chance(&mut self.rng, self.tuning.branch_chance) {
                let length = self.rng.gen_range(0..=self.tuning.branch_max_length);
                self.branch(grid, x, cy, length);
            }
        }
    }

    fn branch(&mut self, grid: &CellGrid, start_x: i32, start_y: i32, length: u32) {
        let direction = if self.rng.gen::<f32>() > 0.2 { 1 } else { -1 };
        let mut cy = start_y;
        for step in 1..length as i32 {
            let cx = start_x + step;
            if cx >= grid.columns() as i32 {
                break;
            }
            if chance(&mut self.rng, self.tuning.branch_rise_chance) {
                cy += direction;
            }
            let Some(index) = grid.index(cx, cy) else {
                break;
            };
            let _ = self.path.insert(index);
        }
    }
}

impl Effect for Lightning {
    fn name(&self) -> &str {
        NAME
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn trigger(&mut self, ctx: &mut EffectContext<'_>) -> bool {
        if self.active {
            return false;
        }
        self.tuning = ctx.config.lightning.clone();
        self.active = true;
        self.remaining = ctx.config.seconds_to_ticks(self.tuning.duration_seconds);
        self.flicker = 0;
        self.generate(ctx.grid);
        tracing::debug!(effect = NAME, cells = self.path.len(), "bolt triggered");
        true
    }

    fn update(&mut self, ctx: &mut EffectContext<'_>, _out: &mut Vec<EffectRequest>) {
        self.tuning = ctx.config.lightning.clone();

        if !self.active {
            let interval = ctx.config.seconds_to_ticks(self.tuning.frequency_seconds);
            if self.timer.tick(self.tuning.auto_trigger, interval, &mut self.rng) {
                let _ = self.trigger(ctx);
            }
            return;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.active = false;
            self.path.clear();
            return;
        }

        self.flicker += 1;
        let resized = self.dimensions != (ctx.grid.columns(), ctx.grid.rows());
        if resized || self.flicker >= self.tuning.flicker_interval.max(1) {
            self.flicker = 0;
            self.generate(ctx.grid);
        }
    }

    fn override_for(&self, index: usize, grid: &CellGrid) -> Option<CellOverride> {
        if !self.active || !self.path.contains(&index) {
            return None;
        }
        if *grid.alphas().get(index)? <= 0.05 {
            return None;
        }

        Some(CellOverride {
            glyph: grid.char_at(index),
            color: self.tuning.color,
            alpha: 1.0,
            glow: self.tuning.glow,
            size: 1.0,
            solid: true,
        })
    }

    fn active_indices(&self, _grid: &CellGrid) -> Option<Vec<usize>> {
        Some(self.path.iter().copied().collect())
    }
}
