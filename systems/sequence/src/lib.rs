#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic compiler of quantized mosaic growth sequences.
//!
//! A sequence is an ordered list of steps; each step is an ordered list of
//! [`SequenceOp`] values positioned on a logical grid whose origin sits at the
//! grid centre. Every placement is confined to the requested grid, so emitted
//! coordinates stay bounded no matter how many steps are generated.

mod generator;
mod packing;

use matrix_code_core::SequenceTuning;
use serde::{Deserialize, Serialize};

pub use generator::QuantizedSequenceGenerator;
pub use packing::{pack, unpack, UnpackError};

/// Side of a logical cell a perimeter line is drawn along.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Face {
    /// Top edge.
    North,
    /// Bottom edge.
    South,
    /// Right edge.
    East,
    /// Left edge.
    West,
}

impl Face {
    /// Compact bit used by the packed representation.
    #[must_use]
    pub const fn mask(self) -> i32 {
        match self {
            Self::North => 1,
            Self::South => 2,
            Self::East => 4,
            Self::West => 8,
        }
    }

    /// Decodes a single-face bit.
    #[must_use]
    pub const fn from_mask(mask: i32) -> Option<Self> {
        match mask {
            1 => Some(Self::North),
            2 => Some(Self::South),
            4 => Some(Self::East),
            8 => Some(Self::West),
            _ => None,
        }
    }
}

/// One mosaic mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceOp {
    /// Adds a single logical block.
    Add {
        /// Column relative to the centre.
        x: i32,
        /// Row relative to the centre.
        y: i32,
        /// Target layer.
        layer: u8,
    },
    /// Adds a rectangle spanning both corners inclusively.
    AddRect {
        /// Left column.
        x1: i32,
        /// Top row.
        y1: i32,
        /// Right column.
        x2: i32,
        /// Bottom row.
        y2: i32,
        /// Target layer.
        layer: u8,
    },
    /// Shows a perimeter line along one face of a block.
    AddLine {
        /// Column relative to the centre.
        x: i32,
        /// Row relative to the centre.
        y: i32,
        /// Edge the line runs along.
        face: Face,
        /// Target layer.
        layer: u8,
    },
    /// Hides a perimeter line previously shown with [`SequenceOp::AddLine`].
    RemLine {
        /// Column relative to the centre.
        x: i32,
        /// Row relative to the centre.
        y: i32,
        /// Edge the line runs along.
        face: Face,
        /// Target layer.
        layer: u8,
    },
}

impl SequenceOp {
    /// Layer the operation applies to.
    #[must_use]
    pub const fn layer(&self) -> u8 {
        match self {
            Self::Add { layer, .. }
            | Self::AddRect { layer, .. }
            | Self::AddLine { layer, .. }
            | Self::RemLine { layer, .. } => *layer,
        }
    }

    /// Inclusive bounding box `(min_x, min_y, max_x, max_y)` touched by the operation.
    #[must_use]
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        match *self {
            Self::Add { x, y, .. } | Self::AddLine { x, y, .. } | Self::RemLine { x, y, .. } => {
                (x, y, x, y)
            }
            Self::AddRect { x1, y1, x2, y2, .. } => (x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)),
        }
    }
}

/// Ordered operations applied together in one growth step.
pub type SequenceStep = Vec<SequenceOp>;

/// Parameters steering a single generation run.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorParams {
    /// Blocks placed per step at the low point of the oscillation.
    pub blocks_per_step: u32,
    /// Blocks placed per step at the peak of the oscillation.
    pub max_blocks_per_step: u32,
    /// Steps a perimeter line stays visible.
    pub inner_line_duration: u32,
    /// Horizontal stretch of the growth footprint.
    pub aspect_ratio: f32,
    /// Smallest block edge in logical cells.
    pub min_block_size: u32,
    /// Largest block edge in logical cells.
    pub max_block_size: u32,
    /// Number of layers populated, starting at layer 0.
    pub layer_count: u8,
    /// Emit every operation on this layer only.
    pub forced_layer: Option<u8>,
    /// Placement attempts before a rectangle falls back to a single block.
    pub attempts_per_block: u32,
    /// Seed for the run's random stream.
    pub seed: u64,
}

impl GeneratorParams {
    /// Builds run parameters from the configuration section and a seed.
    #[must_use]
    pub fn from_tuning(tuning: &SequenceTuning, seed: u64) -> Self {
        Self {
            blocks_per_step: tuning.blocks_per_step,
            max_blocks_per_step: tuning.max_blocks_per_step,
            inner_line_duration: tuning.inner_line_duration,
            aspect_ratio: tuning.aspect_ratio,
            min_block_size: tuning.min_block_size,
            max_block_size: tuning.max_block_size,
            layer_count: tuning.layer_count,
            forced_layer: tuning.forced_layer,
            attempts_per_block: tuning.attempts_per_block,
            seed,
        }
    }
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self::from_tuning(&SequenceTuning::default(), 0)
    }
}
