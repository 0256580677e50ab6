//! Configuration snapshot consumed by the engine each tick.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Charset, Tint, LAYER_COUNT};

/// Aggregated tuning knobs controlling every adjustable aspect of the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed simulation ticks per second.
    pub tick_rate: f32,
    /// Base seed from which every component derives its own random stream.
    pub seed: u64,
    /// Longest real-time gap, in milliseconds, the driver will catch up on.
    /// Larger gaps collapse into a single tick.
    pub max_frame_delta_ms: u64,
    /// Glyphs written by streams and glitch mutations.
    pub charset: Charset,
    /// Pixel metrics used to derive grid dimensions.
    pub grid: GridTuning,
    /// Ambient colours used when no style or override applies.
    pub palette: PaletteTuning,
    /// Stream spawning, motion and decay.
    pub streams: StreamTuning,
    /// Glitch-bar effect.
    pub glitch: GlitchTuning,
    /// Lightning-bolt effect.
    pub lightning: LightningTuning,
    /// Expanding clear-pulse ring.
    pub clear_pulse: ClearPulseTuning,
    /// Time-reversal meta-effect.
    pub reversal: ReversalTuning,
    /// Procedural mosaic effect.
    pub mosaic: MosaicTuning,
    /// Quantized sequence generator feeding the mosaic.
    pub sequence: SequenceTuning,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            seed: 0x6d61_7472_6978,
            max_frame_delta_ms: 500,
            charset: Charset::default(),
            grid: GridTuning::default(),
            palette: PaletteTuning::default(),
            streams: StreamTuning::default(),
            glitch: GlitchTuning::default(),
            lightning: LightningTuning::default(),
            clear_pulse: ClearPulseTuning::default(),
            reversal: ReversalTuning::default(),
            mosaic: MosaicTuning::default(),
            sequence: SequenceTuning::default(),
        }
    }
}

impl EngineConfig {
    /// Converts a duration in seconds into whole ticks at the configured rate.
    ///
    /// Always yields at least one tick.
    #[must_use]
    pub fn seconds_to_ticks(&self, seconds: f32) -> u32 {
        let ticks = (seconds * self.tick_rate).round();
        if ticks.is_finite() && ticks >= 1.0 {
            ticks as u32
        } else {
            1
        }
    }

    /// Checks that every parameter lies within its meaningful range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_rate.is_finite() && self.tick_rate > 0.0) {
            return Err(ConfigError::InvalidTickRate(self.tick_rate));
        }
        if self.charset.is_empty() {
            return Err(ConfigError::EmptyCharset);
        }
        if let Some(glyph) = self.charset.glyphs().find(|glyph| u32::from(*glyph) > 0xFFFF) {
            return Err(ConfigError::UnsupportedGlyph(glyph));
        }

        let grid = &self.grid;
        if !(positive(grid.cell_width) && positive(grid.cell_height)) {
            return Err(ConfigError::InvalidCellMetrics {
                width: grid.cell_width,
                height: grid.cell_height,
            });
        }

        let streams = &self.streams;
        probability("streams.spawn_chance", streams.spawn_chance)?;
        probability("streams.rotator_chance", streams.rotator_chance)?;
        probability("streams.glyph_flicker_chance", streams.glyph_flicker_chance)?;
        probability("streams.star_power_chance", streams.star_power_chance)?;
        probability("streams.rainbow_chance", streams.rainbow_chance)?;
        probability(
            "streams.star_power_chance + streams.rainbow_chance",
            streams.star_power_chance + streams.rainbow_chance,
        )?;
        non_positive("streams.spawn_interval", streams.spawn_interval)?;
        non_positive("streams.min_speed", streams.min_speed)?;
        ordered("streams.speed", streams.min_speed, streams.max_speed)?;
        ordered(
            "streams.trail_length",
            streams.min_trail_length as f32,
            streams.max_trail_length as f32,
        )?;
        non_positive("streams.min_trail_length", streams.min_trail_length as f32)?;
        ordered(
            "streams.brightness",
            streams.min_brightness,
            streams.max_brightness,
        )?;

        let glitch = &self.glitch;
        probability("glitch.intensity", glitch.intensity)?;
        probability("glitch.sample_fraction", glitch.sample_fraction)?;
        ordered(
            "glitch.bar_height",
            glitch.min_bar_height as f32,
            glitch.max_bar_height as f32,
        )?;

        let lightning = &self.lightning;
        probability("lightning.branch_chance", lightning.branch_chance)?;
        probability("lightning.branch_rise_chance", lightning.branch_rise_chance)?;
        non_positive("lightning.flicker_interval", lightning.flicker_interval as f32)?;

        let pulse = &self.clear_pulse;
        non_positive("clear_pulse.duration_seconds", pulse.duration_seconds)?;
        non_positive("clear_pulse.width", pulse.width)?;

        let reversal = &self.reversal;
        if !(reversal.rewind_speed.is_finite() && reversal.rewind_speed < 0.0) {
            return Err(ConfigError::NonNegativeRewind(reversal.rewind_speed));
        }
        non_positive("reversal.max_ramp_step", reversal.max_ramp_step)?;

        let mosaic = &self.mosaic;
        probability("mosaic.growth_chance", mosaic.growth_chance)?;
        non_positive("mosaic.speed", mosaic.speed)?;
        non_positive("mosaic.block_columns", mosaic.block_columns as f32)?;
        non_positive("mosaic.block_rows", mosaic.block_rows as f32)?;
        for (layer, constraint) in mosaic.layer_constraints.iter().enumerate() {
            if let LayerConstraint::Above(lower) = constraint {
                if usize::from(*lower) >= layer {
                    return Err(ConfigError::LayerOutOfRange { layer: *lower });
                }
            }
        }

        let sequence = &self.sequence;
        ordered(
            "sequence.blocks_per_step",
            sequence.blocks_per_step as f32,
            sequence.max_blocks_per_step as f32,
        )?;
        ordered(
            "sequence.block_size",
            sequence.min_block_size as f32,
            sequence.max_block_size as f32,
        )?;
        non_positive("sequence.min_block_size", sequence.min_block_size as f32)?;
        non_positive("sequence.aspect_ratio", sequence.aspect_ratio)?;
        if sequence.layer_count == 0 || usize::from(sequence.layer_count) > LAYER_COUNT {
            return Err(ConfigError::LayerOutOfRange {
                layer: sequence.layer_count,
            });
        }
        if let Some(layer) = sequence.forced_layer {
            if usize::from(layer) >= LAYER_COUNT {
                return Err(ConfigError::LayerOutOfRange { layer });
            }
        }

        Ok(())
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn probability(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ProbabilityOutOfRange { field, value })
    }
}

fn non_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if positive(value) {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn ordered(field: &'static str, min: f32, max: f32) -> Result<(), ConfigError> {
    if min <= max {
        Ok(())
    } else {
        Err(ConfigError::InvertedRange { field, min, max })
    }
}

/// Errors reported when a configuration snapshot fails validation.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// Tick rate must be a positive finite number.
    #[error("tick_rate must be positive and finite (received {0})")]
    InvalidTickRate(f32),
    /// Cell metrics must be positive finite numbers.
    #[error("cell metrics must be positive and finite (received {width}x{height})")]
    InvalidCellMetrics {
        /// Offending cell width.
        width: f32,
        /// Offending cell height.
        height: f32,
    },
    /// A probability fell outside `0.0..=1.0`.
    #[error("`{field}` must lie within 0.0..=1.0 (received {value})")]
    ProbabilityOutOfRange {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Value that failed validation.
        value: f32,
    },
    /// A minimum exceeded its matching maximum.
    #[error("`{field}` range is inverted ({min} > {max})")]
    InvertedRange {
        /// Dotted path of the offending range.
        field: &'static str,
        /// Lower bound provided.
        min: f32,
        /// Upper bound provided.
        max: f32,
    },
    /// A quantity that must be positive was zero or negative.
    #[error("`{field}` must be positive (received {value})")]
    NonPositive {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Value that failed validation.
        value: f32,
    },
    /// A layer reference fell outside the available layers.
    #[error("layer {layer} is not valid here (layers 0..{count})", count = LAYER_COUNT)]
    LayerOutOfRange {
        /// Offending layer index or count.
        layer: u8,
    },
    /// The rewind rate must run backwards.
    #[error("reversal.rewind_speed must be negative (received {0})")]
    NonNegativeRewind(f32),
    /// The charset contained no glyphs.
    #[error("charset must contain at least one glyph")]
    EmptyCharset,
    /// The charset contained a glyph that does not fit a 16-bit cell.
    #[error("glyph {0:?} lies outside the Basic Multilingual Plane")]
    UnsupportedGlyph(char),
}

/// Pixel metrics of a single grid cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridTuning {
    /// Width of one cell in pixels.
    pub cell_width: f32,
    /// Height of one cell in pixels.
    pub cell_height: f32,
}

impl Default for GridTuning {
    fn default() -> Self {
        Self {
            cell_width: 16.0,
            cell_height: 20.0,
        }
    }
}

/// Ambient colours applied to cells without a style or override.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteTuning {
    /// Colour of settled trail glyphs.
    pub stream: Tint,
    /// Colour of leading tracer glyphs.
    pub tracer: Tint,
}

impl Default for PaletteTuning {
    fn default() -> Self {
        Self {
            stream: Tint::new(0x00, 0xff, 0x41),
            tracer: Tint::new(0xdd, 0xff, 0xe6),
        }
    }
}

/// Stream spawning, motion and decay parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamTuning {
    /// Simulated ticks between spawn rounds.
    pub spawn_interval: f32,
    /// Columns drawn per spawn round.
    pub streams_per_spawn: u32,
    /// Probability that a drawn column actually receives a stream.
    pub spawn_chance: f32,
    /// Rows the newest stream in a column must have travelled before another may start there.
    pub min_gap: u32,
    /// Mean head speed in rows per tick.
    pub speed_mean: f32,
    /// Standard deviation of the head speed draw.
    pub speed_deviation: f32,
    /// Slowest permitted head speed.
    pub min_speed: f32,
    /// Fastest permitted head speed.
    pub max_speed: f32,
    /// Shortest trail length in rows.
    pub min_trail_length: u32,
    /// Longest trail length in rows.
    pub max_trail_length: u32,
    /// Dimmest stream brightness.
    pub min_brightness: f32,
    /// Brightest stream brightness.
    pub max_brightness: f32,
    /// Ticks a freshly written glyph stays a tracer before settling into the trail.
    pub tracer_hold: u32,
    /// Probability that a written cell becomes a rotator.
    pub rotator_chance: f32,
    /// Ticks a rotator takes to cross-fade into its target glyph.
    pub rotator_crossfade: u32,
    /// Per-tick probability that a trail glyph is swapped for scroll flicker.
    pub glyph_flicker_chance: f32,
    /// Probability that a new stream uses the star-power mode.
    pub star_power_chance: f32,
    /// Probability that a new stream uses the rainbow mode.
    pub rainbow_chance: f32,
    /// Star-power colouring.
    pub star_power: StarPowerTuning,
    /// Rainbow colouring.
    pub rainbow: RainbowTuning,
}

impl Default for StreamTuning {
    fn default() -> Self {
        Self {
            spawn_interval: 4.0,
            streams_per_spawn: 3,
            spawn_chance: 0.6,
            min_gap: 8,
            speed_mean: 0.45,
            speed_deviation: 0.12,
            min_speed: 0.15,
            max_speed: 1.2,
            min_trail_length: 8,
            max_trail_length: 28,
            min_brightness: 0.65,
            max_brightness: 1.0,
            tracer_hold: 6,
            rotator_chance: 0.08,
            rotator_crossfade: 12,
            glyph_flicker_chance: 0.01,
            star_power_chance: 0.05,
            rainbow_chance: 0.05,
            star_power: StarPowerTuning::default(),
            rainbow: RainbowTuning::default(),
        }
    }
}

/// Star-power stream colouring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarPowerTuning {
    /// Saturation in percent.
    pub saturation: f32,
    /// Lightness in percent.
    pub lightness: f32,
    /// Derive a travelling hue from frame and column instead of the stream's base hue.
    pub glyph_rainbow: bool,
    /// Keep rotating the hue over time.
    pub color_cycle: bool,
    /// Hue degrees per tick while cycling.
    pub cycle_speed: f32,
}

impl Default for StarPowerTuning {
    fn default() -> Self {
        Self {
            saturation: 100.0,
            lightness: 50.0,
            glyph_rainbow: false,
            color_cycle: true,
            cycle_speed: 2.0,
        }
    }
}

/// Rainbow stream colouring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainbowTuning {
    /// Lightness in percent.
    pub lightness: f32,
}

impl Default for RainbowTuning {
    fn default() -> Self {
        Self { lightness: 50.0 }
    }
}

/// Glitch-bar effect parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlitchTuning {
    /// Fire automatically on a timer while idle.
    pub auto_trigger: bool,
    /// Seconds between automatic firings.
    pub frequency_seconds: f32,
    /// Seconds the effect stays active once triggered.
    pub duration_seconds: f32,
    /// Per-tick probability of spawning a new bar.
    pub intensity: f32,
    /// Shortest bar height in rows.
    pub min_bar_height: u32,
    /// Tallest bar height in rows.
    pub max_bar_height: u32,
    /// Nominal bar lifetime in ticks.
    pub bar_duration: u32,
    /// Maximum random deviation applied to each bar lifetime.
    pub bar_jitter: u32,
    /// Fraction of a row's width mutated per tick inside a bar.
    pub sample_fraction: f32,
    /// Give mutated cells a random hue.
    pub randomize_colors: bool,
    /// Alpha floor used for bar cells over blank grid cells.
    pub hole_brightness: f32,
    /// Colour of glyphs drawn inside bars.
    pub color: Tint,
}

impl Default for GlitchTuning {
    fn default() -> Self {
        Self {
            auto_trigger: false,
            frequency_seconds: 20.0,
            duration_seconds: 2.0,
            intensity: 0.3,
            min_bar_height: 1,
            max_bar_height: 4,
            bar_duration: 20,
            bar_jitter: 10,
            sample_fraction: 0.05,
            randomize_colors: true,
            hole_brightness: 0.3,
            color: Tint::new(0xdd, 0xff, 0xe6),
        }
    }
}

/// Lightning-bolt effect parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightningTuning {
    /// Fire automatically on a timer while idle.
    pub auto_trigger: bool,
    /// Seconds between automatic firings.
    pub frequency_seconds: f32,
    /// Seconds the bolt stays lit.
    pub duration_seconds: f32,
    /// Ticks between wholesale bolt regenerations.
    pub flicker_interval: u32,
    /// Bolt thickness in rows.
    pub thickness: u32,
    /// Largest vertical displacement per column.
    pub jitter: u32,
    /// Per-column probability of spawning a branch.
    pub branch_chance: f32,
    /// Longest branch in columns.
    pub branch_max_length: u32,
    /// Per-step probability that a branch moves one row away from the bolt.
    pub branch_rise_chance: f32,
    /// Glow radius of lit cells.
    pub glow: f32,
    /// Colour of lit cells.
    pub color: Tint,
}

impl Default for LightningTuning {
    fn default() -> Self {
        Self {
            auto_trigger: false,
            frequency_seconds: 30.0,
            duration_seconds: 0.8,
            flicker_interval: 3,
            thickness: 3,
            jitter: 1,
            branch_chance: 0.06,
            branch_max_length: 50,
            branch_rise_chance: 1.0 / 3.0,
            glow: 12.0,
            color: Tint::new(0xbe, 0xe6, 0xff),
        }
    }
}

/// Clear-pulse ring parameters.
///
/// Distances are measured in pixels from cell origins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearPulseTuning {
    /// Fire automatically on a timer while idle.
    pub auto_trigger: bool,
    /// Seconds between automatic firings.
    pub frequency_seconds: f32,
    /// Seconds the ring takes to sweep the larger screen dimension.
    pub duration_seconds: f32,
    /// Half the ring thickness.
    pub width: f32,
    /// Start somewhere in the middle 60% of the grid instead of the centre.
    pub random_position: bool,
    /// Start with the ring already fully formed.
    pub instant_start: bool,
    /// Expand as a circle; otherwise a rectangle matching the screen aspect.
    pub circular: bool,
    /// Leave empty cells dark instead of filling them with a glyph.
    pub preserve_spaces: bool,
    /// Fade from the tracer colour at the leading edge to the stream colour behind it.
    pub blend: bool,
    /// Give ring cells a glow that is strongest at the leading edge.
    pub use_tracer_glow: bool,
    /// Glow floor applied across the whole ring when glow is enabled.
    pub glow: f32,
}

impl Default for ClearPulseTuning {
    fn default() -> Self {
        Self {
            auto_trigger: false,
            frequency_seconds: 235.0,
            duration_seconds: 0.7,
            width: 190.0,
            random_position: true,
            instant_start: false,
            circular: false,
            preserve_spaces: true,
            blend: false,
            use_tracer_glow: true,
            glow: 10.0,
        }
    }
}

/// Time-reversal meta-effect parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReversalTuning {
    /// Ticks spent easing the time scale from 1 to 0.
    pub slowdown_ticks: u32,
    /// Ticks the simulation stays frozen.
    pub stop_ticks: u32,
    /// Ticks of linear ramp before the rewind rate is reached.
    pub rewind_ramp_ticks: u32,
    /// Total ticks of the rewind phase, ramp included.
    pub rewind_ticks: u32,
    /// Negative playback rate held while rewinding.
    pub rewind_speed: f32,
    /// Largest change of the time scale permitted in one tick.
    pub max_ramp_step: f32,
    /// Effect triggered at the start of the reset phase; empty disables the handoff.
    pub handoff: String,
}

impl Default for ReversalTuning {
    fn default() -> Self {
        Self {
            slowdown_ticks: 120,
            stop_ticks: 60,
            rewind_ramp_ticks: 60,
            rewind_ticks: 180,
            rewind_speed: -2.0,
            max_ramp_step: 0.05,
            handoff: "ClearPulse".to_owned(),
        }
    }
}

/// Where the mosaic's growth steps come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MosaicSource {
    /// Per-layer west/east and north/south frontier extension.
    #[default]
    Axial,
    /// Playback of a generated quantized sequence.
    Sequenced,
}

/// Growth gate applied to a mosaic layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerConstraint {
    /// Layer may grow anywhere inside the logical grid.
    Free,
    /// Layer may only grow where the given lower layer is already present.
    Above(u8),
}

/// Procedural mosaic effect parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicTuning {
    /// Fire automatically on a timer while idle.
    pub auto_trigger: bool,
    /// Seconds between automatic firings.
    pub frequency_seconds: f32,
    /// Seconds spent growing before the fade begins.
    pub duration_seconds: f32,
    /// Growth speed; a step runs every `max(1, round(10 / speed))` ticks.
    pub speed: f32,
    /// Ticks spent fading out.
    pub fade_ticks: u32,
    /// Probability that a layer extends along an axis in one step.
    pub growth_chance: f32,
    /// Grid columns covered by one logical block.
    pub block_columns: u32,
    /// Grid rows covered by one logical block.
    pub block_rows: u32,
    /// Growth gate for each layer, indexed by layer.
    pub layer_constraints: [LayerConstraint; 4],
    /// Tint of each layer, indexed by layer.
    pub layer_tints: [Tint; 4],
    /// Peak opacity of mosaic cells.
    pub alpha: f32,
    /// Growth source.
    pub source: MosaicSource,
}

impl Default for MosaicTuning {
    fn default() -> Self {
        Self {
            auto_trigger: false,
            frequency_seconds: 45.0,
            duration_seconds: 5.0,
            speed: 1.0,
            fade_ticks: 60,
            growth_chance: 0.66,
            block_columns: 4,
            block_rows: 2,
            layer_constraints: [
                LayerConstraint::Free,
                LayerConstraint::Above(0),
                LayerConstraint::Above(1),
                LayerConstraint::Above(2),
            ],
            layer_tints: [
                Tint::new(0x0b, 0x3d, 0x1a),
                Tint::new(0x1f, 0x7a, 0x36),
                Tint::new(0x4c, 0xc2, 0x6b),
                Tint::new(0xb5, 0xff, 0xc9),
            ],
            alpha: 0.85,
            source: MosaicSource::Axial,
        }
    }
}

/// Quantized sequence generator parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceTuning {
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
    /// Number of layers the generator may populate.
    pub layer_count: u8,
    /// Force every operation onto this layer.
    pub forced_layer: Option<u8>,
    /// Placement attempts before a block is abandoned.
    pub attempts_per_block: u32,
    /// Steps generated for one mosaic run.
    pub steps: u32,
}

impl Default for SequenceTuning {
    fn default() -> Self {
        Self {
            blocks_per_step: 3,
            max_blocks_per_step: 12,
            inner_line_duration: 6,
            aspect_ratio: 1.6,
            min_block_size: 1,
            max_block_size: 3,
            layer_count: 4,
            forced_layer: None,
            attempts_per_block: 20,
            steps: 64,
        }
    }
}
