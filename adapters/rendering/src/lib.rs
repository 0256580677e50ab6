#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for falling-code adapters.

use anyhow::Result as AnyResult;
use matrix_code_core::{CellType, PaletteTuning, Tint};
use matrix_code_grid::CellGrid;
use matrix_code_system_effects::{Effect, EffectRegistry};
use std::{error::Error, fmt, time::Duration};

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Creates an opaque color from hue in degrees and saturation/lightness in percent.
    #[must_use]
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        Self::from(Tint::from_hsl(hue, saturation, lightness))
    }

    /// Returns the same color with its alpha replaced.
    #[must_use]
    pub const fn with_alpha(self, alpha: f32) -> Self {
        Self { alpha, ..self }
    }

    /// Returns a new color lightened towards white by the provided amount.
    #[must_use]
    pub fn lighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);

        Self {
            red: lighten_channel(self.red, amount),
            green: lighten_channel(self.green, amount),
            blue: lighten_channel(self.blue, amount),
            alpha: self.alpha,
        }
    }

    /// Converts the channels to bytes, dropping alpha.
    #[must_use]
    pub fn to_rgb_u8(self) -> (u8, u8, u8) {
        (
            channel_byte(self.red),
            channel_byte(self.green),
            channel_byte(self.blue),
        )
    }
}

impl From<Tint> for Color {
    fn from(tint: Tint) -> Self {
        Self::from_rgb_u8(tint.red, tint.green, tint.blue)
    }
}

fn lighten_channel(channel: f32, amount: f32) -> f32 {
    channel + (1.0 - channel) * amount
}

fn channel_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Visual attributes of one grid cell for a single frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneCell {
    /// Glyph to draw.
    pub glyph: char,
    /// Glyph color; alpha carries the cell opacity.
    pub color: Color,
    /// Glow radius in cell-relative units.
    pub glow: f32,
    /// Glyph scale multiplier.
    pub size: f32,
    /// Whether the cell background is filled behind the glyph.
    pub solid: bool,
}

impl SceneCell {
    /// Fully transparent blank cell.
    pub const BLANK: Self = Self {
        glyph: ' ',
        color: Color::new(0.0, 0.0, 0.0, 0.0),
        glow: 0.0,
        size: 1.0,
        solid: false,
    };

    /// Reports whether the cell would draw nothing.
    #[must_use]
    pub fn is_invisible(&self) -> bool {
        self.color.alpha <= 0.0 || (self.glyph == ' ' && !self.solid)
    }
}

/// Frame-ready snapshot of the whole grid, stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    /// Number of columns.
    pub columns: usize,
    /// Number of rows.
    pub rows: usize,
    /// Cells in row-major order.
    pub cells: Vec<SceneCell>,
}

impl Scene {
    /// Creates a scene, checking that the cell count matches the dimensions.
    pub fn new(columns: usize, rows: usize, cells: Vec<SceneCell>) -> Result<Self, RenderingError> {
        let expected = columns.saturating_mul(rows);
        if cells.len() != expected {
            return Err(RenderingError::CellCountMismatch {
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self {
            columns,
            rows,
            cells,
        })
    }

    /// Creates a scene with no cells.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            columns: 0,
            rows: 0,
            cells: Vec::new(),
        }
    }

    /// Cell at a column and row, if inside the scene.
    #[must_use]
    pub fn cell(&self, column: usize, row: usize) -> Option<&SceneCell> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        self.cells.get(row * self.columns + column)
    }

    /// Cells of one row.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[SceneCell]> {
        if row >= self.rows {
            return None;
        }
        self.cells.get(row * self.columns..(row + 1) * self.columns)
    }
}

/// Builds the frame for the current grid state.
///
/// Base attributes come from the grid: a sparse style wins over the palette,
/// and the palette is chosen by cell type. An effect override then replaces
/// those attributes for this frame only; the grid itself is never touched.
#[must_use]
pub fn compose_scene<E: Effect>(
    grid: &CellGrid,
    registry: &EffectRegistry<E>,
    palette: &PaletteTuning,
) -> Scene {
    let mut cells: Vec<SceneCell> = (0..grid.len())
        .map(|index| base_cell(grid, index, palette))
        .collect();

    let mut apply = |index: usize| {
        if let (Some(cell), Some(replacement)) =
            (cells.get_mut(index), registry.override_for(index, grid))
        {
            *cell = SceneCell {
                glyph: replacement.glyph.unwrap_or(cell.glyph),
                color: Color::from(replacement.color).with_alpha(replacement.alpha),
                glow: replacement.glow,
                size: replacement.size,
                solid: replacement.solid,
            };
        }
    };
    match registry.active_indices(grid) {
        Some(indices) => indices.into_iter().for_each(&mut apply),
        None => (0..grid.len()).for_each(&mut apply),
    }

    Scene {
        columns: grid.columns(),
        rows: grid.rows(),
        cells,
    }
}

fn base_cell(grid: &CellGrid, index: usize, palette: &PaletteTuning) -> SceneCell {
    let Some(snapshot) = grid.snapshot(index) else {
        return SceneCell::BLANK;
    };
    if snapshot.cell_type == CellType::Empty || snapshot.alpha <= 0.0 {
        return SceneCell::BLANK;
    }

    let faded = if snapshot.cell_type == CellType::Rotator && snapshot.morph >= 0.5 {
        grid.overlap_char(index)
    } else {
        None
    };
    let glyph = faded.or_else(|| grid.char_at(index)).unwrap_or(' ');

    let color = match (grid.style(index), snapshot.cell_type) {
        (Some(style), _) => Color::from(style.to_tint()),
        (None, CellType::Tracer) => Color::from(palette.tracer),
        (None, _) => Color::from(palette.stream),
    };
    let glow = if snapshot.cell_type == CellType::Tracer {
        4.0 * snapshot.alpha
    } else {
        0.0
    };

    SceneCell {
        glyph,
        color: color.with_alpha(snapshot.alpha),
        glow,
        size: 1.0,
        solid: false,
    }
}

/// Presentation descriptor consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title used by the created window or printed banner.
    pub window_title: String,
    /// Solid color used to clear each frame.
    pub clear_color: Color,
    /// Scene content that should be displayed.
    pub scene: Scene,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(window_title: T, clear_color: Color, scene: Scene) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
            clear_color,
            scene,
        }
    }
}

/// Rendering backend capable of presenting falling-code scenes.
pub trait RenderingBackend {
    /// Runs the rendering backend until it is requested to exit.
    ///
    /// The provided `update_scene` closure receives the real time elapsed since
    /// the previous frame and rebuilds the scene before it is drawn.
    fn run<F>(self, presentation: Presentation, update_scene: F) -> AnyResult<()>
    where
        F: FnMut(Duration, &mut Scene) + 'static;
}

/// Errors that can occur when constructing rendering descriptors.
#[derive(Debug, PartialEq, Eq)]
pub enum RenderingError {
    /// The number of cells did not match `columns * rows`.
    CellCountMismatch {
        /// Cell count implied by the dimensions.
        expected: usize,
        /// Cell count provided.
        actual: usize,
    },
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CellCountMismatch { expected, actual } => {
                write!(
                    f,
                    "scene expects {expected} cells but received {actual}"
                )
            }
        }
    }
}

impl Error for RenderingError {}
