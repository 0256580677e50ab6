#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Dense structure-of-arrays cell store shared by the simulation and effects.
//!
//! Every per-cell attribute lives in its own vector and all vectors share the
//! length `columns * rows`. The vectors are only reallocated when the derived
//! dimensions change, so an index that is valid for one attribute is valid for
//! every other attribute at the same moment. Sparse colour styles sit next to
//! the dense arrays and are cleared in lockstep with every reallocation.

use std::collections::HashMap;

use matrix_code_core::{CellType, HslStyle, BLANK_GLYPH};

/// Copy of every attribute stored for a single cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellSnapshot {
    /// Stored glyph code unit.
    pub codepoint: u16,
    /// Classification written by the simulation.
    pub cell_type: CellType,
    /// Opacity within `0.0..=1.0`.
    pub alpha: f32,
    /// Alpha lost per tick of age.
    pub decay: f32,
    /// Ticks since the cell was written.
    pub age: i32,
    /// Peak opacity of the stream that wrote the cell.
    pub brightness: f32,
    /// Rotator cross-fade progress within `0.0..=1.0`.
    pub morph: f32,
    /// Palette slot chosen by the writer.
    pub palette: u8,
    /// Font slot chosen by the writer.
    pub font: u8,
    /// Secondary glyph a rotator fades towards, zero when absent.
    pub overlap: u16,
    /// Whether an effect has reserved the cell for this tick.
    pub locked: bool,
}

/// Structure-of-arrays store for all cell attributes.
#[derive(Debug)]
pub struct CellGrid {
    cell_width: f32,
    cell_height: f32,
    columns: usize,
    rows: usize,
    generation: u64,
    codepoints: Vec<u16>,
    cell_types: Vec<CellType>,
    alphas: Vec<f32>,
    decays: Vec<f32>,
    ages: Vec<i32>,
    brightness: Vec<f32>,
    morphs: Vec<f32>,
    palettes: Vec<u8>,
    fonts: Vec<u8>,
    overlaps: Vec<u16>,
    locks: Vec<bool>,
    styles: HashMap<usize, HslStyle>,
}

impl CellGrid {
    /// Creates an empty grid that derives its dimensions from the provided cell metrics.
    #[must_use]
    pub fn new(cell_width: f32, cell_height: f32) -> Self {
        Self {
            cell_width,
            cell_height,
            columns: 0,
            rows: 0,
            generation: 0,
            codepoints: Vec::new(),
            cell_types: Vec::new(),
            alphas: Vec::new(),
            decays: Vec::new(),
            ages: Vec::new(),
            brightness: Vec::new(),
            morphs: Vec::new(),
            palettes: Vec::new(),
            fonts: Vec::new(),
            overlaps: Vec::new(),
            locks: Vec::new(),
            styles: HashMap::new(),
        }
    }

    /// Derives dimensions from a pixel surface and reallocates when they changed.
    ///
    /// Non-finite or non-positive sizes are ignored. Returns `true` only when the
    /// arrays were reallocated; resizing to the same effective dimensions keeps
    /// every array in place.
    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return false;
        }

        let columns = cells_along(width, self.cell_width);
        let rows = cells_along(height, self.cell_height);
        if columns == self.columns && rows == self.rows {
            return false;
        }

        self.reallocate(columns, rows);
        true
    }

    fn reallocate(&mut self, columns: usize, rows: usize) {
        let len = columns.saturating_mul(rows);
        self.columns = columns;
        self.rows = rows;
        self.generation += 1;
        self.codepoints = vec![BLANK_GLYPH; len];
        self.cell_types = vec![CellType::Empty; len];
        self.alphas = vec![0.0; len];
        self.decays = vec![0.0; len];
        self.ages = vec![0; len];
        self.brightness = vec![0.0; len];
        self.morphs = vec![0.0; len];
        self.palettes = vec![0; len];
        self.fonts = vec![0; len];
        self.overlaps = vec![0; len];
        self.locks = vec![false; len];
        self.styles.clear();

        tracing::debug!(
            columns,
            rows,
            generation = self.generation,
            "cell grid reallocated"
        );
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of cells, shared by every per-cell array.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codepoints.len()
    }

    /// Reports whether the grid holds no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codepoints.is_empty()
    }

    /// Counter incremented on every reallocation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Pixel width and height of a single cell.
    #[must_use]
    pub const fn cell_metrics(&self) -> (f32, f32) {
        (self.cell_width, self.cell_height)
    }

    /// Returns `y * columns + x` for in-bounds coordinates and `None` otherwise.
    #[must_use]
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        if x < self.columns && y < self.rows {
            Some(y * self.columns + x)
        } else {
            None
        }
    }

    /// Converts an index back into `(x, y)` coordinates.
    #[must_use]
    pub fn coords(&self, index: usize) -> Option<(usize, usize)> {
        if index < self.len() {
            Some((index % self.columns, index / self.columns))
        } else {
            None
        }
    }

    /// Stores a glyph as a single 16-bit code unit.
    ///
    /// Returns `false` and leaves the cell untouched when the index is out of
    /// range or the glyph lies outside the Basic Multilingual Plane.
    pub fn set_char(&mut self, index: usize, glyph: char) -> bool {
        let Ok(unit) = u16::try_from(u32::from(glyph)) else {
            return false;
        };
        match self.codepoints.get_mut(index) {
            Some(slot) => {
                *slot = unit;
                true
            }
            None => false,
        }
    }

    /// Reads the glyph stored at `index`, or `None` when out of range.
    #[must_use]
    pub fn char_at(&self, index: usize) -> Option<char> {
        self.codepoints
            .get(index)
            .and_then(|unit| char::from_u32(u32::from(*unit)))
    }

    /// Reads the secondary glyph a rotator is fading towards.
    #[must_use]
    pub fn overlap_char(&self, index: usize) -> Option<char> {
        match self.overlaps.get(index) {
            Some(0) | None => None,
            Some(unit) => char::from_u32(u32::from(*unit)),
        }
    }

    /// Captures every attribute of one cell.
    #[must_use]
    pub fn snapshot(&self, index: usize) -> Option<CellSnapshot> {
        if index >= self.len() {
            return None;
        }
        Some(CellSnapshot {
            codepoint: self.codepoints[index],
            cell_type: self.cell_types[index],
            alpha: self.alphas[index],
            decay: self.decays[index],
            age: self.ages[index],
            brightness: self.brightness[index],
            morph: self.morphs[index],
            palette: self.palettes[index],
            font: self.fonts[index],
            overlap: self.overlaps[index],
            locked: self.locks[index],
        })
    }

    /// Resets one cell to blank and drops its sparse style.
    pub fn clear_cell(&mut self, index: usize) {
        if index >= self.len() {
            return;
        }
        self.codepoints[index] = BLANK_GLYPH;
        self.cell_types[index] = CellType::Empty;
        self.alphas[index] = 0.0;
        self.decays[index] = 0.0;
        self.ages[index] = 0;
        self.brightness[index] = 0.0;
        self.morphs[index] = 0.0;
        self.palettes[index] = 0;
        self.fonts[index] = 0;
        self.overlaps[index] = 0;
        let _ = self.styles.remove(&index);
    }

    /// Resets every cell without reallocating.
    pub fn clear(&mut self) {
        self.codepoints.fill(BLANK_GLYPH);
        self.cell_types.fill(CellType::Empty);
        self.alphas.fill(0.0);
        self.decays.fill(0.0);
        self.ages.fill(0);
        self.brightness.fill(0.0);
        self.morphs.fill(0.0);
        self.palettes.fill(0);
        self.fonts.fill(0);
        self.overlaps.fill(0);
        self.locks.fill(false);
        self.styles.clear();
    }

    /// Reserves a cell so the simulation skips it until its owner unlocks it.
    pub fn lock(&mut self, index: usize) -> bool {
        match self.locks.get_mut(index) {
            Some(slot) => {
                *slot = true;
                true
            }
            None => false,
        }
    }

    /// Reports whether a cell is reserved. Out-of-range indices are unlocked.
    #[must_use]
    pub fn is_locked(&self, index: usize) -> bool {
        self.locks.get(index).copied().unwrap_or(false)
    }

    /// Releases a single reserved cell. Returns `false` for out-of-range indices.
    pub fn unlock(&mut self, index: usize) -> bool {
        match self.locks.get_mut(index) {
            Some(slot) => {
                *slot = false;
                true
            }
            None => false,
        }
    }

    /// Releases every lock.
    pub fn clear_locks(&mut self) {
        self.locks.fill(false);
    }

    /// Sparse style recorded for a cell.
    #[must_use]
    pub fn style(&self, index: usize) -> Option<&HslStyle> {
        self.styles.get(&index)
    }

    /// Records a sparse style for an in-range cell.
    pub fn set_style(&mut self, index: usize, style: HslStyle) -> bool {
        if index >= self.len() {
            return false;
        }
        let _ = self.styles.insert(index, style);
        true
    }

    /// Drops the sparse style of a cell, returning it when present.
    pub fn remove_style(&mut self, index: usize) -> Option<HslStyle> {
        self.styles.remove(&index)
    }

    /// Number of cells carrying a sparse style.
    #[must_use]
    pub fn style_count(&self) -> usize {
        self.styles.len()
    }

    /// Iterates every sparse style mutably.
    pub fn styles_mut(&mut self) -> impl Iterator<Item = (usize, &mut HslStyle)> + '_ {
        self.styles.iter_mut().map(|(index, style)| (*index, style))
    }

    /// Glyph code units.
    #[must_use]
    pub fn codepoints(&self) -> &[u16] {
        &self.codepoints
    }

    /// Mutable glyph code units.
    pub fn codepoints_mut(&mut self) -> &mut [u16] {
        &mut self.codepoints
    }

    /// Cell classifications.
    #[must_use]
    pub fn cell_types(&self) -> &[CellType] {
        &self.cell_types
    }

    /// Mutable cell classifications.
    pub fn cell_types_mut(&mut self) -> &mut [CellType] {
        &mut self.cell_types
    }

    /// Cell opacities.
    #[must_use]
    pub fn alphas(&self) -> &[f32] {
        &self.alphas
    }

    /// Mutable cell opacities.
    pub fn alphas_mut(&mut self) -> &mut [f32] {
        &mut self.alphas
    }

    /// Per-tick decay rates.
    #[must_use]
    pub fn decays(&self) -> &[f32] {
        &self.decays
    }

    /// Mutable per-tick decay rates.
    pub fn decays_mut(&mut self) -> &mut [f32] {
        &mut self.decays
    }

    /// Cell ages in ticks.
    #[must_use]
    pub fn ages(&self) -> &[i32] {
        &self.ages
    }

    /// Mutable cell ages in ticks.
    pub fn ages_mut(&mut self) -> &mut [i32] {
        &mut self.ages
    }

    /// Peak brightness of each cell's writer.
    #[must_use]
    pub fn brightness(&self) -> &[f32] {
        &self.brightness
    }

    /// Mutable peak brightness.
    pub fn brightness_mut(&mut self) -> &mut [f32] {
        &mut self.brightness
    }

    /// Rotator cross-fade progress.
    #[must_use]
    pub fn morphs(&self) -> &[f32] {
        &self.morphs
    }

    /// Mutable rotator cross-fade progress.
    pub fn morphs_mut(&mut self) -> &mut [f32] {
        &mut self.morphs
    }

    /// Palette slots.
    #[must_use]
    pub fn palettes(&self) -> &[u8] {
        &self.palettes
    }

    /// Mutable palette slots.
    pub fn palettes_mut(&mut self) -> &mut [u8] {
        &mut self.palettes
    }

    /// Font slots.
    #[must_use]
    pub fn fonts(&self) -> &[u8] {
        &self.fonts
    }

    /// Mutable font slots.
    pub fn fonts_mut(&mut self) -> &mut [u8] {
        &mut self.fonts
    }

    /// Secondary glyph code units, zero when absent.
    #[must_use]
    pub fn overlaps(&self) -> &[u16] {
        &self.overlaps
    }

    /// Mutable secondary glyph code units.
    pub fn overlaps_mut(&mut self) -> &mut [u16] {
        &mut self.overlaps
    }

    /// Lock flags.
    #[must_use]
    pub fn locks(&self) -> &[bool] {
        &self.locks
    }
}

fn cells_along(extent: f32, cell: f32) -> usize {
    if !(cell.is_finite() && cell > 0.0) {
        return 1;
    }
    let count = (extent / cell).floor();
    if count >= 1.0 {
        count as usize
    } else {
        1
    }
}
