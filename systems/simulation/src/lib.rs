#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Falling-stream simulation that writes base cell attributes into the grid.
//!
//! The system advances every stream under a shared [`TimeScale`]. Cell ages
//! follow a simulated clock that runs backwards when the scale is negative, and
//! cell alpha and type are always re-derived from age, so rewinding replays the
//! trail fade in reverse instead of undoing a mutation log.

mod stream_mode;
mod time_scale;

use matrix_code_core::{
    derive_labeled_seed, CellType, Charset, EngineConfig, StreamTuning, BLANK_GLYPH,
};
use matrix_code_grid::CellGrid;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

pub use stream_mode::StreamMode;
pub use time_scale::{TimeScale, TimeScaleLink};

/// Scales with a smaller magnitude pause the simulation.
pub const PAUSE_THRESHOLD: f32 = 0.01;

/// Upper bound on spawn rounds run in a single tick; any larger backlog is dropped.
pub const MAX_SPAWN_ROUNDS_PER_TICK: u32 = 16;

const AGE_CAP: i32 = 1 << 20;
const RNG_LABEL: &str = "simulation.streams";

/// Lifecycle of a single stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamPhase {
    /// Created above the grid; no row written yet.
    Spawning,
    /// Head is inside the grid writing glyphs.
    Falling,
    /// Head has left the grid while the trail fades.
    Decaying,
    /// Trail has fully faded; the stream is about to be dropped.
    Dead,
}

/// One falling column-run with a head and a decaying trail.
#[derive(Clone, Debug, PartialEq)]
pub struct Stream {
    column: usize,
    head: f32,
    speed: f32,
    trail_length: u32,
    brightness: f32,
    base_hue: Option<f32>,
    mode: StreamMode,
    phase: StreamPhase,
}

impl Stream {
    /// Creates a stream positioned one row above the grid.
    #[must_use]
    pub fn new(
        column: usize,
        speed: f32,
        trail_length: u32,
        brightness: f32,
        mode: StreamMode,
    ) -> Self {
        Self {
            column,
            head: -1.0,
            speed,
            trail_length: trail_length.max(1),
            brightness,
            base_hue: None,
            mode,
            phase: StreamPhase::Spawning,
        }
    }

    /// Column the stream occupies.
    #[must_use]
    pub const fn column(&self) -> usize {
        self.column
    }

    /// Fractional head row.
    #[must_use]
    pub const fn head(&self) -> f32 {
        self.head
    }

    /// Rows travelled per tick at unit time scale.
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    /// Rows behind the head that remain visible.
    #[must_use]
    pub const fn trail_length(&self) -> u32 {
        self.trail_length
    }

    /// Peak opacity of glyphs written by this stream.
    #[must_use]
    pub const fn brightness(&self) -> f32 {
        self.brightness
    }

    /// Persistent hue assigned at spawn by colourful modes.
    #[must_use]
    pub const fn base_hue(&self) -> Option<f32> {
        self.base_hue
    }

    /// Colouring strategy.
    #[must_use]
    pub const fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Reports whether the stream still takes part in the simulation.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase != StreamPhase::Dead
    }

    /// Alpha lost per tick of age by glyphs this stream writes.
    #[must_use]
    pub fn decay_rate(&self) -> f32 {
        self.speed / self.trail_length as f32
    }

    fn refresh_phase(&mut self, rows: usize) {
        let rows = rows as f32;
        self.phase = if self.head < 0.0 {
            StreamPhase::Spawning
        } else if self.head < rows {
            StreamPhase::Falling
        } else if self.head < rows + self.trail_length as f32 {
            StreamPhase::Decaying
        } else {
            StreamPhase::Dead
        };
    }
}

/// Owns stream lifecycles and writes their output into a [`CellGrid`].
#[derive(Debug)]
pub struct SimulationSystem {
    streams: Vec<Stream>,
    time_scale: TimeScale,
    rng: ChaCha8Rng,
    clock: f32,
    spawn_accumulator: f32,
    column_order: Vec<usize>,
    grid_generation: Option<u64>,
}

impl SimulationSystem {
    /// Creates a simulation whose random stream derives from `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            streams: Vec::new(),
            time_scale: TimeScale::default(),
            rng: ChaCha8Rng::seed_from_u64(derive_labeled_seed(seed, RNG_LABEL)),
            clock: 0.0,
            spawn_accumulator: 0.0,
            column_order: Vec::new(),
            grid_generation: None,
        }
    }

    /// Shared playback multiplier.
    #[must_use]
    pub const fn time_scale(&self) -> &TimeScale {
        &self.time_scale
    }

    /// Non-owning handle effects use to drive the playback multiplier.
    #[must_use]
    pub fn link(&self) -> TimeScaleLink {
        self.time_scale.link()
    }

    /// Streams currently alive, in write order.
    #[must_use]
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    /// Adds a stream, running its mode's spawn hook first.
    pub fn insert_stream(&mut self, mut stream: Stream) {
        stream.mode.spawn(&mut stream, &mut self.rng);
        self.streams.push(stream);
    }

    /// Advances the simulation by one tick scaled by the current time scale.
    pub fn update(&mut self, grid: &mut CellGrid, config: &EngineConfig, frame: u64) {
        match self.grid_generation {
            Some(generation) if generation != grid.generation() => {
                if !self.streams.is_empty() {
                    tracing::debug!(
                        dropped = self.streams.len(),
                        "grid reallocated, dropping streams"
                    );
                }
                self.streams.clear();
            }
            _ => {}
        }
        self.grid_generation = Some(grid.generation());

        let scale = self.time_scale.get();
        if !scale.is_finite() || scale.abs() < PAUSE_THRESHOLD || grid.is_empty() {
            return;
        }

        let tuning = &config.streams;
        self.clock += scale;
        let steps = self.clock.trunc();
        self.clock -= steps;
        if steps != 0.0 {
            age_cells(grid, steps as i32, tuning.tracer_hold);
        }

        if scale > 0.0 {
            self.run_spawn_rounds(grid, tuning, scale);
        }
        self.advance_streams(grid, config, scale, frame);
        if scale > 0.0 {
            self.animate_cells(grid, config, scale);
        }
        for (_, style) in grid.styles_mut() {
            style.advance_cycle(scale);
        }

        self.streams.retain(Stream::is_active);
    }

    fn run_spawn_rounds(&mut self, grid: &CellGrid, tuning: &StreamTuning, scale: f32) {
        let interval = tuning.spawn_interval.max(PAUSE_THRESHOLD);
        self.spawn_accumulator += scale;
        let mut rounds = 0;
        while self.spawn_accumulator >= interval {
            if rounds == MAX_SPAWN_ROUNDS_PER_TICK {
                tracing::debug!(backlog = self.spawn_accumulator, "dropping spawn backlog");
                self.spawn_accumulator %= interval;
                break;
            }
            self.spawn_accumulator -= interval;
            self.spawn_round(grid, tuning);
            rounds += 1;
        }
    }

    fn spawn_round(&mut self, grid: &CellGrid, tuning: &StreamTuning) {
        self.column_order.clear();
        self.column_order.extend(0..grid.columns());
        self.column_order.shuffle(&mut self.rng);

        let mut drawn = 0;
        for position in 0..self.column_order.len() {
            if drawn >= tuning.streams_per_spawn {
                break;
            }
            let column = self.column_order[position];
            if !self.column_is_free(column, tuning.min_gap) {
                continue;
            }
            drawn += 1;
            if !chance(&mut self.rng, tuning.spawn_chance) {
                continue;
            }
            let stream = self.roll_stream(column, tuning);
            self.insert_stream(stream);
        }
    }

    fn column_is_free(&self, column: usize, min_gap: u32) -> bool {
        !self
            .streams
            .iter()
            .any(|stream| stream.column == column && stream.head < min_gap as f32)
    }

    fn roll_stream(&mut self, column: usize, tuning: &StreamTuning) -> Stream {
        let speed = match Normal::new(tuning.speed_mean, tuning.speed_deviation) {
            Ok(normal) if tuning.speed_deviation > 0.0 => normal.sample(&mut self.rng),
            _ => tuning.speed_mean,
        };
        let speed = speed.clamp(tuning.min_speed, tuning.max_speed.max(tuning.min_speed));
        let trail_length = self.rng.gen_range(
            tuning.min_trail_length..=tuning.max_trail_length.max(tuning.min_trail_length),
        );
        let brightness = self.rng.gen_range(
            tuning.min_brightness..=tuning.max_brightness.max(tuning.min_brightness),
        );

        let roll: f32 = self.rng.gen();
        let mode = if roll < tuning.star_power_chance {
            StreamMode::StarPower
        } else if roll < tuning.star_power_chance + tuning.rainbow_chance {
            StreamMode::Rainbow
        } else {
            StreamMode::Standard
        };

        Stream::new(column, speed, trail_length, brightness, mode)
    }

    fn advance_streams(
        &mut self,
        grid: &mut CellGrid,
        config: &EngineConfig,
        scale: f32,
        frame: u64,
    ) {
        let rows = grid.rows();
        let mut streams = std::mem::take(&mut self.streams);

        for stream in &mut streams {
            let start = stream.head;
            let delta = stream.speed * scale;
            stream.head = start + delta;

            if delta > 0.0 {
                let first = start.floor() as i64 + 1;
                let last = stream.head.floor() as i64;
                for row in first.max(0)..=last.min(rows as i64 - 1) {
                    let crossed_at = ((row as f32 - start) / delta).clamp(0.0, 1.0);
                    let age = ((1.0 - crossed_at) * scale).floor() as i32;
                    self.write_cell(grid, stream, row as usize, age, config, frame);
                }
            } else if delta < 0.0 {
                let first = (stream.head.floor() as i64 + 1).max(0);
                let last = (start.floor() as i64).min(rows as i64 - 1);
                for row in first..=last {
                    if let Some(index) = grid.index(stream.column as i32, row as i32) {
                        if !grid.is_locked(index) {
                            grid.clear_cell(index);
                        }
                    }
                }
            }

            let was_written = stream.phase != StreamPhase::Spawning;
            stream.refresh_phase(rows);
            if scale < 0.0 && was_written && stream.head < 0.0 {
                stream.phase = StreamPhase::Dead;
            }
        }

        self.streams = streams;
    }

    fn write_cell(
        &mut self,
        grid: &mut CellGrid,
        stream: &Stream,
        row: usize,
        age: i32,
        config: &EngineConfig,
        frame: u64,
    ) {
        let Some(index) = grid.index(stream.column as i32, row as i32) else {
            return;
        };
        if grid.is_locked(index) {
            return;
        }

        let tuning = &config.streams;
        let glyph = pick_glyph(&config.charset, &mut self.rng);
        let _ = grid.set_char(index, glyph);
        let overlap = if chance(&mut self.rng, tuning.rotator_chance) {
            glyph_unit(pick_glyph(&config.charset, &mut self.rng))
        } else {
            0
        };

        grid.overlaps_mut()[index] = overlap;
        grid.morphs_mut()[index] = 0.0;
        grid.brightness_mut()[index] = stream.brightness;
        grid.decays_mut()[index] = stream.decay_rate();
        grid.ages_mut()[index] = age.max(0);
        settle_cell(grid, index, tuning.tracer_hold);

        match stream.mode.style(stream, frame, tuning) {
            Some(style) => {
                let _ = grid.set_style(index, style);
            }
            None => {
                let _ = grid.remove_style(index);
            }
        }
    }

    fn animate_cells(&mut self, grid: &mut CellGrid, config: &EngineConfig, scale: f32) {
        let tuning = &config.streams;
        let morph_step = scale / tuning.rotator_crossfade.max(1) as f32;

        for index in 0..grid.len() {
            if grid.is_locked(index) {
                continue;
            }
            match grid.cell_types()[index] {
                CellType::Rotator => {
                    let progress = grid.morphs()[index] + morph_step;
                    if progress >= 1.0 {
                        let target = grid.overlaps()[index];
                        grid.codepoints_mut()[index] = target;
                        grid.overlaps_mut()[index] =
                            glyph_unit(pick_glyph(&config.charset, &mut self.rng));
                        grid.morphs_mut()[index] = 0.0;
                    } else {
                        grid.morphs_mut()[index] = progress;
                    }
                }
                CellType::Trail => {
                    if chance(&mut self.rng, tuning.glyph_flicker_chance) {
                        let glyph = pick_glyph(&config.charset, &mut self.rng);
                        let _ = grid.set_char(index, glyph);
                    }
                }
                CellType::Empty | CellType::Tracer => {}
            }
        }
    }
}

fn age_cells(grid: &mut CellGrid, steps: i32, tracer_hold: u32) {
    for index in 0..grid.len() {
        if grid.cell_types()[index] == CellType::Empty || grid.is_locked(index) {
            continue;
        }
        let age = grid.ages()[index].saturating_add(steps).min(AGE_CAP);
        if age < 0 {
            grid.clear_cell(index);
            continue;
        }
        grid.ages_mut()[index] = age;
        settle_cell(grid, index, tracer_hold);
    }
}

/// Re-derives type and alpha of a written cell from its age.
fn settle_cell(grid: &mut CellGrid, index: usize, tracer_hold: u32) {
    let age = grid.ages()[index];
    let cell_type = if age < tracer_hold as i32 {
        CellType::Tracer
    } else if grid.overlaps()[index] != 0 {
        CellType::Rotator
    } else {
        CellType::Trail
    };
    let faded = 1.0 - age as f32 * grid.decays()[index];
    let alpha = (grid.brightness()[index] * faded).clamp(0.0, 1.0);

    grid.cell_types_mut()[index] = cell_type;
    grid.alphas_mut()[index] = alpha;
}

fn pick_glyph(charset: &Charset, rng: &mut ChaCha8Rng) -> char {
    charset.pick(rng.gen_range(0..charset.len().max(1)))
}

fn glyph_unit(glyph: char) -> u16 {
    u16::try_from(u32::from(glyph)).unwrap_or(BLANK_GLYPH)
}

fn chance(rng: &mut ChaCha8Rng, probability: f32) -> bool {
    rng.gen::<f32>() < probability
}
