#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the falling-code engine.
//!
//! This crate defines the vocabulary that connects the cell grid, the pure
//! systems, and the adapters. Drivers submit [`Command`] values describing
//! desired changes, the kernel executes them against the grid and the effect
//! registry, and then broadcasts [`Event`] values describing what happened.
//! Tunable parameters live in the [`EngineConfig`] snapshot which the kernel
//! hands to every system once per tick.

mod config;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use config::{
    ClearPulseTuning, ConfigError, EngineConfig, GlitchTuning, GridTuning, LayerConstraint,
    LightningTuning, MosaicSource, MosaicTuning, PaletteTuning, RainbowTuning, ReversalTuning,
    SequenceTuning, StarPowerTuning, StreamTuning,
};

/// Number of stacking tiers available to the procedural mosaic.
pub const LAYER_COUNT: usize = 4;

/// Code unit written into cells that hold no glyph.
pub const BLANK_GLYPH: u16 = 0x20;

/// Classifies what the simulation last wrote into a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CellType {
    /// Cell holds nothing and renders as blank.
    #[default]
    Empty = 0,
    /// Settled glyph left behind by a passing stream head.
    Trail = 1,
    /// Bright leading glyph that was written by a stream head recently.
    Tracer = 2,
    /// Trail glyph that cross-fades towards a target glyph.
    Rotator = 3,
}

impl CellType {
    /// Reports whether the cell currently holds a glyph.
    #[must_use]
    pub const fn is_filled(self) -> bool {
        !matches!(self, Self::Empty)
    }
}

/// Sparse per-cell colour record overriding the ambient palette.
///
/// Hue is expressed in degrees, saturation and lightness in percent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HslStyle {
    /// Hue angle in degrees within `0.0..360.0`.
    pub hue: f32,
    /// Saturation in percent within `0.0..=100.0`.
    pub saturation: f32,
    /// Lightness in percent within `0.0..=100.0`.
    pub lightness: f32,
    /// Whether the hue keeps travelling around the colour wheel over time.
    pub color_cycle: bool,
    /// Hue degrees advanced per simulated tick while cycling.
    pub cycle_speed: f32,
}

impl HslStyle {
    /// Creates a static style that never cycles.
    #[must_use]
    pub const fn fixed(hue: f32, saturation: f32, lightness: f32) -> Self {
        Self {
            hue,
            saturation,
            lightness,
            color_cycle: false,
            cycle_speed: 0.0,
        }
    }

    /// Advances the hue of a cycling style by `cycle_speed * time_scale` degrees.
    pub fn advance_cycle(&mut self, time_scale: f32) {
        if self.color_cycle {
            self.hue = (self.hue + self.cycle_speed * time_scale).rem_euclid(360.0);
        }
    }

    /// Converts the style into an opaque RGB tint.
    #[must_use]
    pub fn to_tint(&self) -> Tint {
        Tint::from_hsl(self.hue, self.saturation, self.lightness)
    }
}

/// Opaque 8-bit RGB colour used by overrides and palettes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tint {
    /// Red channel.
    pub red: u8,
    /// Green channel.
    pub green: u8,
    /// Blue channel.
    pub blue: u8,
}

impl Tint {
    /// Creates a tint from byte channels.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Converts an HSL triple (degrees, percent, percent) into RGB.
    #[must_use]
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let hue = hue.rem_euclid(360.0) / 360.0;
        let saturation = (saturation / 100.0).clamp(0.0, 1.0);
        let lightness = (lightness / 100.0).clamp(0.0, 1.0);

        if saturation == 0.0 {
            let gray = to_byte(lightness);
            return Self::new(gray, gray, gray);
        }

        let q = if lightness < 0.5 {
            lightness * (1.0 + saturation)
        } else {
            lightness + saturation - lightness * saturation
        };
        let p = 2.0 * lightness - q;

        Self::new(
            to_byte(hue_to_channel(p, q, hue + 1.0 / 3.0)),
            to_byte(hue_to_channel(p, q, hue)),
            to_byte(hue_to_channel(p, q, hue - 1.0 / 3.0)),
        )
    }
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn to_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Transient per-cell render replacement supplied by an effect.
///
/// Overrides supersede the base cell attributes for a single frame and are
/// never written back into the grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellOverride {
    /// Glyph to draw instead of the stored one, when present.
    pub glyph: Option<char>,
    /// Colour to draw the glyph with.
    pub color: Tint,
    /// Opacity within `0.0..=1.0`.
    pub alpha: f32,
    /// Glow radius in cell-relative units.
    pub glow: f32,
    /// Glyph scale multiplier.
    pub size: f32,
    /// Whether the cell background is filled behind the glyph.
    pub solid: bool,
}

/// Ordered set of glyphs the engine draws from when writing cells.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Charset {
    glyphs: Vec<char>,
}

impl Charset {
    /// Creates a charset from the characters of the provided string.
    #[must_use]
    pub fn new(glyphs: &str) -> Self {
        Self {
            glyphs: glyphs.chars().collect(),
        }
    }

    /// Number of glyphs available.
    #[must_use]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Reports whether the charset has no glyphs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Selects the glyph at `roll` wrapped around the charset length.
    ///
    /// Falls back to a blank when the charset is empty.
    #[must_use]
    pub fn pick(&self, roll: usize) -> char {
        if self.glyphs.is_empty() {
            return ' ';
        }
        self.glyphs[roll % self.glyphs.len()]
    }

    /// Iterates the glyphs in order.
    pub fn glyphs(&self) -> impl Iterator<Item = char> + '_ {
        self.glyphs.iter().copied()
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::new("ﾊﾐﾋｰｳｼﾅﾓﾆｻﾜﾂｵﾘｱﾎﾃﾏｹﾒｴｶｷﾑﾕﾗｾﾈｽﾀﾇﾍ012345789Z:.=*+-<>¦|")
    }
}

impl From<String> for Charset {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<Charset> for String {
    fn from(value: Charset) -> Self {
        value.glyphs.into_iter().collect()
    }
}

/// Commands that express every mutation a driver may request from the kernel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Informs the kernel that the drawable surface changed size.
    Resize {
        /// Surface width in pixels.
        width: f32,
        /// Surface height in pixels.
        height: f32,
    },
    /// Requests that the named effect start.
    TriggerEffect {
        /// Registered name of the effect.
        name: String,
    },
    /// Overrides the simulation playback rate.
    SetTimeScale {
        /// New multiplier; zero pauses and negative values rewind.
        value: f32,
    },
}

/// Events broadcast by the kernel after applying commands or advancing ticks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Announces that the grid reallocated to new dimensions.
    GridResized {
        /// Number of columns after the resize.
        columns: u32,
        /// Number of rows after the resize.
        rows: u32,
    },
    /// Reports that an effect became active.
    EffectStarted {
        /// Registered name of the effect.
        name: String,
    },
    /// Reports that an active effect completed and went idle.
    EffectFinished {
        /// Registered name of the effect.
        name: String,
    },
    /// Reports that a trigger request was refused.
    TriggerRejected {
        /// Name that was requested.
        name: String,
    },
}

/// Derives an independent RNG seed for the component identified by `label`.
///
/// The first eight bytes of `SHA-256(base_seed || label)` are interpreted as a
/// little-endian integer so every component owns an uncorrelated stream while
/// the whole session stays reproducible from one base seed.
#[must_use]
pub fn derive_labeled_seed(base_seed: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base_seed.to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
