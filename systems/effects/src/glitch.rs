use matrix_code_core::{derive_labeled_seed, CellOverride, GlitchTuning, HslStyle};
use matrix_code_grid::CellGrid;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{chance, AutoTimer, Effect, EffectContext, EffectRequest};

const NAME: &str = "GlitchBars";

/// Horizontal band of rows currently glitching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlitchBar {
    /// Top row of the bar.
    pub y: usize,
    /// Rows covered, starting at `y`.
    pub height: usize,
    /// Ticks the bar has existed.
    pub age: u32,
    /// Tick count after which the bar is dropped.
    pub max_age: u32,
}

/// Glitch-bar effect.
///
/// While active, bars appear at random rows and a bounded random sample of
/// cells inside each bar has its glyph rewritten in the grid every tick. The
/// bar rows are also lit through overrides, using the live cell alpha or a
/// floor brightness so that bars stay visible over empty cells.
#[derive(Debug)]
pub struct GlitchBars {
    rng: ChaCha8Rng,
    timer: AutoTimer,
    tuning: GlitchTuning,
    active: bool,
    remaining: u32,
    bars: Vec<GlitchBar>,
    rows: Vec<bool>,
}

impl GlitchBars {
    /// Creates an idle effect whose random stream derives from the engine seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(derive_labeled_seed(seed, "effects.glitch")),
            timer: AutoTimer::default(),
            tuning: GlitchTuning::default(),
            active: false,
            remaining: 0,
            bars: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Bars alive this tick.
    #[must_use]
    pub fn bars(&self) -> &[GlitchBar] {
        &self.bars
    }

    /// Reports whether the row lies inside a live bar.
    #[must_use]
    pub fn row_active(&self, row: usize) -> bool {
        self.rows.get(row).copied().unwrap_or(false)
    }

    /// Ticks left before the effect deactivates.
    #[must_use]
    pub const fn remaining_ticks(&self) -> u32 {
        self.remaining
    }

    fn stop(&mut self) {
        self.active = false;
        self.remaining = 0;
        self.bars.clear();
        self.rows.clear();
        tracing::debug!(effect = NAME, "glitch bars finished");
    }

    fn spawn_bar(&mut self, rows: usize) {
        let min = self.tuning.min_bar_height.max(1) as usize;
        let max = (self.tuning.max_bar_height as usize).max(min);
        let height = self.rng.gen_range(min..=max).min(rows);
        let y = self.rng.gen_range(0..=rows - height);

        let jitter = i64::from(self.tuning.bar_jitter);
        let offset = self.rng.gen_range(-jitter..=jitter);
        let max_age = (i64::from(self.tuning.bar_duration) + offset).max(1);

        self.bars.push(GlitchBar {
            y,
            height,
            age: 0,
            max_age: u32::try_from(max_age).unwrap_or(u32::MAX),
        });
    }

    fn mutate_rows(&mut self, ctx: &mut EffectContext<'_>) {
        let columns = ctx.grid.columns();
        let samples = ((columns as f32 * self.tuning.sample_fraction).floor() as usize).max(1);
        let charset = &ctx.config.charset;

        for row in 0..self.rows.len() {
            if !self.rows[row] {
                continue;
            }
            for _ in 0..samples {
                let index = row * columns + self.rng.gen_range(0..columns);
                if ctx.grid.is_locked(index) {
                    continue;
                }
                let glyph = charset.pick(self.rng.gen());
                if !ctx.grid.set_char(index, glyph) {
                    continue;
                }
                ctx.grid.morphs_mut()[index] = 0.0;
                if self.tuning.randomize_colors {
                    let hue = self.rng.gen_range(0.0..360.0_f32).floor();
                    let _ = ctx.grid.set_style(index, HslStyle::fixed(hue, 90.0, 70.0));
                }
            }
        }
    }
}

impl Effect for GlitchBars {
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
        self.tuning = ctx.config.glitch.clone();
        self.active = true;
        self.remaining = ctx.config.seconds_to_ticks(self.tuning.duration_seconds);
        self.bars.clear();
        self.rows = vec![false; ctx.grid.rows()];
        tracing::debug!(effect = NAME, ticks = self.remaining, "glitch bars triggered");
        true
    }

    fn update(&mut self, ctx: &mut EffectContext<'_>, _out: &mut Vec<EffectRequest>) {
        self.tuning = ctx.config.glitch.clone();

        if !self.active {
            let interval = ctx.config.seconds_to_ticks(self.tuning.frequency_seconds);
            if self.timer.tick(self.tuning.auto_trigger, interval, &mut self.rng) {
                let _ = self.trigger(ctx);
            }
            return;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.stop();
            return;
        }

        let rows = ctx.grid.rows();
        if self.rows.len() != rows {
            self.rows = vec![false; rows];
            self.bars.retain(|bar| bar.y < rows);
        }
        self.rows.fill(false);
        if rows == 0 || ctx.grid.columns() == 0 {
            return;
        }

        if chance(&mut self.rng, self.tuning.intensity) {
            self.spawn_bar(rows);
        }

        self.bars.retain_mut(|bar| {
            bar.age += 1;
            bar.age <= bar.max_age
        });
        for bar in &self.bars {
            let end = (bar.y + bar.height).min(rows);
            self.rows[bar.y..end].fill(true);
        }

        self.mutate_rows(ctx);
    }

    fn override_for(&self, index: usize, grid: &CellGrid) -> Option<CellOverride> {
        if !self.active {
            return None;
        }
        let (_, row) = grid.coords(index)?;
        if !self.row_active(row) {
            return None;
        }

        let cell_alpha = *grid.alphas().get(index)?;
        let alpha = if cell_alpha < 0.1 {
            self.tuning.hole_brightness
        } else {
            cell_alpha
        };
        if alpha < 0.01 {
            return None;
        }

        Some(CellOverride {
            glyph: grid.char_at(index),
            color: self.tuning.color,
            alpha,
            glow: 20.0 * alpha,
            size: 2.0,
            solid: false,
        })
    }

    fn active_indices(&self, grid: &CellGrid) -> Option<Vec<usize>> {
        let columns = grid.columns();
        Some(
            self.rows
                .iter()
                .enumerate()
                .filter(|(row, active)| **active && *row < grid.rows())
                .flat_map(|(row, _)| row * columns..(row + 1) * columns)
                .collect(),
        )
    }
}
