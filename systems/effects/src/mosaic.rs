use std::collections::BTreeSet;

use matrix_code_core::{
    derive_labeled_seed, CellOverride, LayerConstraint, MosaicSource, MosaicTuning, LAYER_COUNT,
};
use matrix_code_grid::CellGrid;
use matrix_code_system_sequence::{
    Face, GeneratorParams, QuantizedSequenceGenerator, SequenceOp, SequenceStep,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{chance, AutoTimer, Effect, EffectContext, EffectRequest};

const NAME: &str = "Mosaic";
const LINE_GLOW: f32 = 8.0;

/// Lifecycle stage of the mosaic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MosaicPhase {
    /// Not running.
    Idle,
    /// Running growth steps.
    Generating,
    /// Fading the finished mosaic out.
    FadeOut,
}

/// Block placed on a mosaic layer, in logical coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MosaicBlock {
    /// Left logical column; the origin sits at the grid centre.
    pub x: i32,
    /// Top logical row.
    pub y: i32,
    /// Logical columns covered.
    pub width: u32,
    /// Logical rows covered.
    pub height: u32,
    /// Layer the block belongs to.
    pub layer: u8,
    /// Cleared once the fade-out completes.
    pub visible: bool,
}

/// Mapping between grid cells and logical block coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Layout {
    columns: usize,
    rows: usize,
    block_columns: usize,
    block_rows: usize,
    logical_width: usize,
    logical_height: usize,
    pad_x: usize,
    pad_y: usize,
}

impl Layout {
    fn new(grid: &CellGrid, tuning: &MosaicTuning) -> Self {
        let block_columns = tuning.block_columns.max(1) as usize;
        let block_rows = tuning.block_rows.max(1) as usize;
        let logical_width = grid.columns().div_ceil(block_columns);
        let logical_height = grid.rows().div_ceil(block_rows);
        Self {
            columns: grid.columns(),
            rows: grid.rows(),
            block_columns,
            block_rows,
            logical_width,
            logical_height,
            pad_x: (logical_width * block_columns - grid.columns()) / 2,
            pad_y: (logical_height * block_rows - grid.rows()) / 2,
        }
    }

    fn min_x(&self) -> i32 {
        -((self.logical_width / 2) as i32)
    }

    fn min_y(&self) -> i32 {
        -((self.logical_height / 2) as i32)
    }

    /// Logical block covering a grid cell, plus the cell's offset inside that block.
    fn block_of(&self, column: usize, row: usize) -> (i32, i32, usize, usize) {
        let px = column + self.pad_x;
        let py = row + self.pad_y;
        (
            (px / self.block_columns) as i32 + self.min_x(),
            (py / self.block_rows) as i32 + self.min_y(),
            px % self.block_columns,
            py % self.block_rows,
        )
    }
}

/// Dense occupancy of one layer with a centred logical origin.
#[derive(Clone, Debug, Default)]
struct LayerGrid {
    width: usize,
    height: usize,
    min_x: i32,
    min_y: i32,
    cells: Vec<Option<u32>>,
}

impl LayerGrid {
    fn new(layout: &Layout) -> Self {
        Self {
            width: layout.logical_width,
            height: layout.logical_height,
            min_x: layout.min_x(),
            min_y: layout.min_y(),
            cells: vec![None; layout.logical_width * layout.logical_height],
        }
    }

    fn slot(&self, x: i32, y: i32) -> Option<usize> {
        let lx = usize::try_from(x - self.min_x).ok()?;
        let ly = usize::try_from(y - self.min_y).ok()?;
        (lx < self.width && ly < self.height).then(|| ly * self.width + lx)
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        self.slot(x, y).is_some()
    }

    fn occupied(&self, x: i32, y: i32) -> bool {
        self.slot(x, y)
            .and_then(|slot| self.cells[slot])
            .is_some()
    }

    fn fill(&mut self, x: i32, y: i32, step: u32) -> bool {
        match self.slot(x, y) {
            Some(slot) => {
                self.cells[slot] = Some(step);
                true
            }
            None => false,
        }
    }

    /// Occupied columns along a row, in ascending order.
    fn row_span(&self, y: i32) -> Option<(i32, i32)> {
        let mut occupied = (self.min_x..self.min_x + self.width as i32).filter(|x| self.occupied(*x, y));
        let first = occupied.next()?;
        Some((first, occupied.last().unwrap_or(first)))
    }

    fn column_span(&self, x: i32) -> Option<(i32, i32)> {
        let mut occupied =
            (self.min_y..self.min_y + self.height as i32).filter(|y| self.occupied(x, *y));
        let first = occupied.next()?;
        Some((first, occupied.last().unwrap_or(first)))
    }
}

/// Procedural mosaic of stacked block layers grown outwards from the grid centre.
///
/// Layer 0 is the substrate. Higher layers may be constrained to grow only
/// over an existing lower layer. While the mosaic is running, grid cells under
/// layer 0 are locked so the simulation and other effects leave them alone.
/// The mosaic releases those locks itself once the fade completes.
#[derive(Debug)]
pub struct Mosaic {
    rng: ChaCha8Rng,
    timer: AutoTimer,
    generator: QuantizedSequenceGenerator,
    tuning: MosaicTuning,
    phase: MosaicPhase,
    layout: Layout,
    generation: u64,
    layers: Vec<LayerGrid>,
    blocks: Vec<MosaicBlock>,
    lines: BTreeSet<(i32, i32, Face, u8)>,
    held: BTreeSet<usize>,
    script: Vec<SequenceStep>,
    cursor: usize,
    steps: u32,
    elapsed: u32,
    growth_timer: u32,
    fade: f32,
}

impl Mosaic {
    /// Creates an idle mosaic whose random stream derives from the engine seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(derive_labeled_seed(seed, "effects.mosaic")),
            timer: AutoTimer::default(),
            generator: QuantizedSequenceGenerator::default(),
            tuning: MosaicTuning::default(),
            phase: MosaicPhase::Idle,
            layout: Layout::default(),
            generation: 0,
            layers: Vec::new(),
            blocks: Vec::new(),
            lines: BTreeSet::new(),
            held: BTreeSet::new(),
            script: Vec::new(),
            cursor: 0,
            steps: 0,
            elapsed: 0,
            growth_timer: 0,
            fade: 1.0,
        }
    }

    /// Current lifecycle stage.
    #[must_use]
    pub const fn phase(&self) -> MosaicPhase {
        self.phase
    }

    /// Blocks placed since the last trigger.
    #[must_use]
    pub fn blocks(&self) -> &[MosaicBlock] {
        &self.blocks
    }

    /// Growth steps applied since the last trigger, the seeding step included.
    #[must_use]
    pub const fn steps(&self) -> u32 {
        self.steps
    }

    /// Fade multiplier applied to every override.
    #[must_use]
    pub const fn fade(&self) -> f32 {
        self.fade
    }

    /// Reports whether a logical cell is occupied on a layer.
    #[must_use]
    pub fn is_occupied(&self, layer: u8, x: i32, y: i32) -> bool {
        self.layers
            .get(usize::from(layer))
            .is_some_and(|grid| grid.occupied(x, y))
    }

    /// Perimeter lines currently shown, as `(x, y, face, layer)`.
    #[must_use]
    pub const fn lines(&self) -> &BTreeSet<(i32, i32, Face, u8)> {
        &self.lines
    }

    fn add_block(&mut self, x: i32, y: i32, width: u32, height: u32, layer: u8) {
        let Some(grid) = self.layers.get_mut(usize::from(layer)) else {
            return;
        };
        let mut placed = false;
        for dy in 0..height as i32 {
            for dx in 0..width as i32 {
                placed |= grid.fill(x + dx, y + dy, self.steps);
            }
        }
        if placed {
            self.blocks.push(MosaicBlock {
                x,
                y,
                width,
                height,
                layer,
                visible: true,
            });
        }
    }

    fn may_grow(&self, layer: usize, x: i32, y: i32) -> bool {
        let Some(grid) = self.layers.get(layer) else {
            return false;
        };
        if !grid.contains(x, y) || grid.occupied(x, y) {
            return false;
        }
        match self.tuning.layer_constraints.get(layer) {
            Some(LayerConstraint::Above(lower)) => self.is_occupied(*lower, x, y),
            _ => true,
        }
    }

    fn grow_axial(&mut self) {
        for layer in 0..self.layers.len() {
            if chance(&mut self.rng, self.tuning.growth_chance) {
                if let Some((west, east)) = self.layers[layer].row_span(0) {
                    let x = if self.rng.gen::<bool>() { west - 1 } else { east + 1 };
                    if self.may_grow(layer, x, 0) {
                        self.add_block(x, 0, 1, 1, layer as u8);
                    }
                }
            }

            if chance(&mut self.rng, self.tuning.growth_chance) {
                let Some((west, east)) = self.layers[layer].row_span(0) else {
                    continue;
                };
                let column = self.rng.gen_range(west..=east);
                if let Some((north, south)) = self.layers[layer].column_span(column) {
                    let y = if self.rng.gen::<bool>() { north - 1 } else { south + 1 };
                    if self.may_grow(layer, column, y) {
                        self.add_block(column, y, 1, 1, layer as u8);
                    }
                }
            }
        }
    }

    fn apply_step(&mut self, step: &[SequenceOp]) {
        for op in step {
            match *op {
                SequenceOp::Add { x, y, layer } => self.add_block(x, y, 1, 1, layer),
                SequenceOp::AddRect { layer, .. } => {
                    let (min_x, min_y, max_x, max_y) = op.bounds();
                    self.add_block(
                        min_x,
                        min_y,
                        (max_x - min_x + 1) as u32,
                        (max_y - min_y + 1) as u32,
                        layer,
                    );
                }
                SequenceOp::AddLine { x, y, face, layer } => {
                    let _ = self.lines.insert((x, y, face, layer));
                }
                SequenceOp::RemLine { x, y, face, layer } => {
                    let _ = self.lines.remove(&(x, y, face, layer));
                }
            }
        }
    }

    fn grow(&mut self) {
        self.steps += 1;
        match self.tuning.source {
            MosaicSource::Axial => self.grow_axial(),
            MosaicSource::Sequenced => {
                if let Some(step) = self.script.get(self.cursor).cloned() {
                    self.apply_step(&step);
                    self.cursor += 1;
                }
            }
        }
    }

    fn lock_substrate(&mut self, grid: &mut CellGrid) {
        let Some(substrate) = self.layers.first() else {
            return;
        };
        for row in 0..self.layout.rows.min(grid.rows()) {
            for column in 0..self.layout.columns.min(grid.columns()) {
                let (x, y, _, _) = self.layout.block_of(column, row);
                let index = row * grid.columns() + column;
                if substrate.occupied(x, y) && grid.lock(index) {
                    let _ = self.held.insert(index);
                }
            }
        }
    }

    fn release_locks(&mut self, grid: &mut CellGrid) {
        for index in std::mem::take(&mut self.held) {
            let _ = grid.unlock(index);
        }
    }

    fn hide(&mut self) {
        for block in &mut self.blocks {
            block.visible = false;
        }
        self.lines.clear();
        self.phase = MosaicPhase::Idle;
        tracing::debug!(effect = NAME, blocks = self.blocks.len(), "mosaic finished");
    }

    fn top_layer(&self, x: i32, y: i32) -> Option<u8> {
        (0..self.layers.len())
            .rev()
            .find(|layer| self.layers[*layer].occupied(x, y))
            .map(|layer| layer as u8)
    }

    fn on_line(&self, x: i32, y: i32, layer: u8, offset: (usize, usize)) -> bool {
        let (ox, oy) = offset;
        let edges = [
            (oy == 0, Face::North),
            (oy + 1 == self.layout.block_rows, Face::South),
            (ox + 1 == self.layout.block_columns, Face::East),
            (ox == 0, Face::West),
        ];
        edges
            .iter()
            .any(|(on_edge, face)| *on_edge && self.lines.contains(&(x, y, *face, layer)))
    }
}

impl Effect for Mosaic {
    fn name(&self) -> &str {
        NAME
    }

    fn is_active(&self) -> bool {
        self.phase != MosaicPhase::Idle
    }

    fn trigger(&mut self, ctx: &mut EffectContext<'_>) -> bool {
        if self.phase != MosaicPhase::Idle || ctx.grid.is_empty() {
            return false;
        }

        self.tuning = ctx.config.mosaic.clone();
        self.layout = Layout::new(ctx.grid, &self.tuning);
        self.generation = ctx.grid.generation();
        self.layers = (0..LAYER_COUNT).map(|_| LayerGrid::new(&self.layout)).collect();
        self.blocks.clear();
        self.lines.clear();
        self.held.clear();
        self.script.clear();
        self.cursor = 0;
        self.steps = 0;
        self.elapsed = 0;
        self.growth_timer = 0;
        self.fade = 1.0;

        match self.tuning.source {
            MosaicSource::Axial => {
                for layer in 0..LAYER_COUNT as u8 {
                    self.add_block(0, 0, 1, 1, layer);
                }
            }
            MosaicSource::Sequenced => {
                let params = GeneratorParams::from_tuning(&ctx.config.sequence, self.rng.gen());
                self.script = self.generator.generate(
                    self.layout.logical_width as u32,
                    self.layout.logical_height as u32,
                    ctx.config.sequence.steps,
                    &params,
                );
                if let Some(first) = self.script.first().cloned() {
                    self.apply_step(&first);
                    self.cursor = 1;
                }
            }
        }

        self.phase = MosaicPhase::Generating;
        self.lock_substrate(ctx.grid);
        tracing::debug!(
            effect = NAME,
            source = ?self.tuning.source,
            logical_width = self.layout.logical_width,
            logical_height = self.layout.logical_height,
            "mosaic triggered"
        );
        true
    }

    fn update(&mut self, ctx: &mut EffectContext<'_>, _out: &mut Vec<EffectRequest>) {
        if self.phase == MosaicPhase::Idle {
            let tuning = &ctx.config.mosaic;
            let interval = ctx.config.seconds_to_ticks(tuning.frequency_seconds);
            if self.timer.tick(tuning.auto_trigger, interval, &mut self.rng) {
                let _ = self.trigger(ctx);
            }
            return;
        }

        if ctx.grid.generation() != self.generation {
            // Reallocation already dropped every lock.
            self.held.clear();
            self.hide();
            return;
        }

        self.elapsed += 1;
        match self.phase {
            MosaicPhase::Idle => {}
            MosaicPhase::Generating => {
                let interval = (10.0 / self.tuning.speed).round().max(1.0) as u32;
                self.growth_timer += 1;
                if self.growth_timer >= interval {
                    self.growth_timer = 0;
                    self.grow();
                }
                if self.elapsed >= ctx.config.seconds_to_ticks(self.tuning.duration_seconds) {
                    self.phase = MosaicPhase::FadeOut;
                    self.elapsed = 0;
                }
            }
            MosaicPhase::FadeOut => {
                let span = self.tuning.fade_ticks.max(1);
                self.fade = (1.0 - self.elapsed as f32 / span as f32).max(0.0);
                if self.elapsed >= span {
                    self.release_locks(ctx.grid);
                    self.hide();
                    return;
                }
            }
        }

        self.lock_substrate(ctx.grid);
    }

    fn override_for(&self, index: usize, grid: &CellGrid) -> Option<CellOverride> {
        if self.phase == MosaicPhase::Idle || grid.generation() != self.generation {
            return None;
        }
        let (column, row) = grid.coords(index)?;
        let (x, y, ox, oy) = self.layout.block_of(column, row);
        let layer = self.top_layer(x, y)?;

        let glow = if self.on_line(x, y, layer, (ox, oy)) {
            LINE_GLOW
        } else {
            0.0
        };
        Some(CellOverride {
            glyph: grid.char_at(index),
            color: self.tuning.layer_tints[usize::from(layer)],
            alpha: self.tuning.alpha * self.fade,
            glow,
            size: 1.0,
            solid: true,
        })
    }

    fn active_indices(&self, _grid: &CellGrid) -> Option<Vec<usize>> {
        match self.phase {
            MosaicPhase::Idle => Some(Vec::new()),
            MosaicPhase::Generating | MosaicPhase::FadeOut => None,
        }
    }
}
