use matrix_code_core::{derive_labeled_seed, CellOverride, ClearPulseTuning, PaletteTuning, Tint};
use matrix_code_grid::CellGrid;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{AutoTimer, Effect, EffectContext, EffectRequest};

const NAME: &str = "ClearPulse";
/// Pixels added to the sweep distance when deriving the per-tick speed.
const SPEED_MARGIN: f32 = 200.0;
/// Pixels the ring travels past the larger screen dimension before it ends.
const OVERSHOOT: f32 = 400.0;
/// Glow of cells on the leading edge.
const EDGE_GLOW: f32 = 30.0;

/// Ring that sweeps outwards from an origin cell and relights every glyph it crosses.
///
/// The ring is a read-only overlay. Its speed is derived from the grid size so
/// that the sweep takes `duration_seconds` regardless of resolution, and the
/// effect ends once the ring has cleared the screen. Empty cells under the ring
/// either stay dark or show a fill glyph rolled when the pulse started.
#[derive(Debug)]
pub struct ClearPulse {
    rng: ChaCha8Rng,
    timer: AutoTimer,
    tuning: ClearPulseTuning,
    palette: PaletteTuning,
    active: bool,
    generation: u64,
    metrics: (f32, f32),
    origin: (usize, usize),
    radius: f32,
    speed: f32,
    reach: f32,
    ratio: f32,
    fills: Vec<char>,
}

impl ClearPulse {
    /// Creates an idle pulse whose random stream derives from the engine seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(derive_labeled_seed(seed, "effects.clear_pulse")),
            timer: AutoTimer::default(),
            tuning: ClearPulseTuning::default(),
            palette: PaletteTuning::default(),
            active: false,
            generation: 0,
            metrics: (0.0, 0.0),
            origin: (0, 0),
            radius: 0.0,
            speed: 0.0,
            reach: 0.0,
            ratio: 1.0,
            fills: Vec::new(),
        }
    }

    /// Cell the ring expands from.
    #[must_use]
    pub const fn origin(&self) -> (usize, usize) {
        self.origin
    }

    /// Outer edge of the ring in pixels.
    #[must_use]
    pub const fn radius(&self) -> f32 {
        self.radius
    }

    /// Pixels the ring grows per tick.
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    fn thickness(&self) -> f32 {
        self.tuning.width * 2.0
    }

    fn pick_origin(&mut self, columns: usize, rows: usize) -> (usize, usize) {
        let centre = (columns / 2, rows / 2);
        if !self.tuning.random_position {
            return centre;
        }

        let x = span(&mut self.rng, columns);
        let y = span(&mut self.rng, rows);
        let (cell_width, cell_height) = self.metrics;
        let near_x = x.abs_diff(centre.0) as f32 * cell_width < self.tuning.width;
        let near_y = y.abs_diff(centre.1) as f32 * cell_height < self.tuning.width;
        if near_x && near_y {
            centre
        } else {
            (x, y)
        }
    }

    fn distance(&self, index: usize, grid: &CellGrid) -> Option<f32> {
        let (x, y) = grid.coords(index)?;
        let (cell_width, cell_height) = self.metrics;
        let dx = (x as f32 * cell_width).floor() - (self.origin.0 as f32 * cell_width).floor();
        let dy = (y as f32 * cell_height).floor() - (self.origin.1 as f32 * cell_height).floor();
        if self.tuning.circular {
            Some(dx.hypot(dy))
        } else {
            Some(dx.abs().max(dy.abs() * self.ratio))
        }
    }

    fn stop(&mut self) {
        self.active = false;
        self.fills.clear();
        tracing::debug!(effect = NAME, radius = self.radius, "pulse finished");
    }
}

impl Effect for ClearPulse {
    fn name(&self) -> &str {
        NAME
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn trigger(&mut self, ctx: &mut EffectContext<'_>) -> bool {
        if self.active || ctx.grid.is_empty() {
            return false;
        }

        self.tuning = ctx.config.clear_pulse.clone();
        self.palette = ctx.config.palette.clone();
        self.generation = ctx.grid.generation();
        self.metrics = ctx.grid.cell_metrics();

        let (columns, rows) = (ctx.grid.columns(), ctx.grid.rows());
        let (cell_width, cell_height) = self.metrics;
        let width = columns as f32 * cell_width;
        let height = rows as f32 * cell_height;
        self.origin = self.pick_origin(columns, rows);
        self.reach = width.max(height);
        self.ratio = if self.tuning.circular || height <= 0.0 {
            1.0
        } else {
            width / height
        };
        let ticks = ctx.config.seconds_to_ticks(self.tuning.duration_seconds);
        self.speed = (self.reach + SPEED_MARGIN) / ticks as f32;
        self.radius = if self.tuning.instant_start {
            self.thickness()
        } else {
            0.0
        };

        self.fills.clear();
        if !self.tuning.preserve_spaces {
            let charset = &ctx.config.charset;
            for _ in 0..ctx.grid.len() {
                self.fills.push(charset.pick(self.rng.gen()));
            }
        }

        self.active = true;
        tracing::debug!(
            effect = NAME,
            origin_x = self.origin.0,
            origin_y = self.origin.1,
            speed = self.speed,
            "pulse triggered"
        );
        true
    }

    fn update(&mut self, ctx: &mut EffectContext<'_>, _out: &mut Vec<EffectRequest>) {
        if !self.active {
            let tuning = &ctx.config.clear_pulse;
            let interval = ctx.config.seconds_to_ticks(tuning.frequency_seconds);
            if self.timer.tick(tuning.auto_trigger, interval, &mut self.rng) {
                let _ = self.trigger(ctx);
            }
            return;
        }

        if ctx.grid.generation() != self.generation {
            self.stop();
            return;
        }

        self.radius += self.speed;
        if self.radius > self.reach + OVERSHOOT {
            self.stop();
        }
    }

    fn override_for(&self, index: usize, grid: &CellGrid) -> Option<CellOverride> {
        if !self.active || grid.generation() != self.generation {
            return None;
        }
        let distance = self.distance(index, grid)?;
        let thickness = self.thickness();
        if distance < self.radius - thickness || distance > self.radius {
            return None;
        }

        let empty = *grid.alphas().get(index)? <= 0.01;
        let glyph = if empty {
            if self.tuning.preserve_spaces {
                return None;
            }
            self.fills.get(index).copied()
        } else {
            grid.char_at(index)
        };

        let behind = ((self.radius - distance) / thickness).clamp(0.0, 1.0);
        let color = if self.tuning.blend {
            mix(self.palette.tracer, self.palette.stream, behind)
        } else {
            self.palette.tracer
        };
        let glow = if self.tuning.use_tracer_glow {
            self.tuning.glow.max(EDGE_GLOW * (1.0 - behind))
        } else {
            0.0
        };

        Some(CellOverride {
            glyph,
            color,
            alpha: 1.0,
            glow,
            size: 1.0,
            solid: false,
        })
    }

    fn active_indices(&self, grid: &CellGrid) -> Option<Vec<usize>> {
        Some(
            (0..grid.len())
                .filter(|index| self.override_for(*index, grid).is_some())
                .collect(),
        )
    }
}

/// Draws a coordinate from the middle 60% of an axis.
fn span(rng: &mut ChaCha8Rng, length: usize) -> usize {
    let low = (length as f32 * 0.2) as usize;
    let high = ((length as f32 * 0.8) as usize).max(low);
    rng.gen_range(low..=high).min(length.saturating_sub(1))
}

fn mix(from: Tint, to: Tint, amount: f32) -> Tint {
    let channel = |a: u8, b: u8| {
        let (a, b) = (f32::from(a), f32::from(b));
        (a + (b - a) * amount).floor().clamp(0.0, 255.0) as u8
    };
    Tint::new(
        channel(from.red, to.red),
        channel(from.green, to.green),
        channel(from.blue, to.blue),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_runs_from_one_tint_to_the_other() {
        let from = Tint::new(200, 0, 100);
        let to = Tint::new(0, 200, 100);
        assert_eq!(mix(from, to, 0.0), from);
        assert_eq!(mix(from, to, 1.0), to);
        assert_eq!(mix(from, to, 0.5), Tint::new(100, 100, 100));
    }

    #[test]
    fn span_stays_inside_the_axis() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for length in 1..12 {
            for _ in 0..20 {
                assert!(span(&mut rng, length) < length);
            }
        }
    }
}
