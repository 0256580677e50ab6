use std::collections::BTreeMap;

use matrix_code_core::LAYER_COUNT;
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{Face, GeneratorParams, SequenceOp, SequenceStep};

/// Steps in one full oscillation of the blocks-per-step count.
const OSCILLATION_PERIOD: f64 = 16.0;
/// Earliest and latest delay, in steps, before perimeter lines appear.
const LINE_DELAY: (u32, u32) = (3, 4);

/// Compiles bounded, replayable mosaic growth sequences.
#[derive(Debug, Default)]
pub struct QuantizedSequenceGenerator {
    frontier: Vec<(i32, i32)>,
    weights: Vec<f64>,
}

impl QuantizedSequenceGenerator {
    /// Generates at most `steps` steps of growth on a `width x height` logical grid.
    ///
    /// Identical arguments always produce identical output. Generation ends
    /// early once every layer has filled the grid.
    pub fn generate(
        &mut self,
        width: u32,
        height: u32,
        steps: u32,
        params: &GeneratorParams,
    ) -> Vec<SequenceStep> {
        let Some(mut field) = Field::new(width, height) else {
            return Vec::new();
        };
        if steps == 0 {
            return Vec::new();
        }

        let layers: Vec<u8> = match params.forced_layer {
            Some(layer) => vec![layer.min(LAYER_COUNT as u8 - 1)],
            None => (0..params.layer_count.clamp(1, LAYER_COUNT as u8)).collect(),
        };
        let constrained = params.forced_layer.is_none();
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut scheduled: BTreeMap<u32, SequenceStep> = BTreeMap::new();
        let mut sequence = Vec::with_capacity(steps as usize);

        let mut seed_step = Vec::with_capacity(layers.len());
        for &layer in &layers {
            field.mark(layer, 0, 0);
            seed_step.push(SequenceOp::Add { x: 0, y: 0, layer });
        }
        sequence.push(seed_step);

        for step in 1..steps {
            let mut ops = scheduled.remove(&step).unwrap_or_default();
            let target = blocks_for_step(step, params);
            let mut placed = 0;

            for _ in 0..target {
                let layer = layers[rng.gen_range(0..layers.len())];
                let constraint = constraint_for(layer, constrained);
                let Some(placement) =
                    self.place_block(&mut field, layer, constraint, params, &mut rng)
                else {
                    continue;
                };
                placed += 1;
                ops.push(placement.op);
                if placement.overwrote {
                    schedule_perimeter(
                        &mut scheduled,
                        &placement,
                        step,
                        steps,
                        params,
                        &mut rng,
                    );
                }
            }

            if placed == 0 {
                match self.force_expansion(&mut field, &layers, constrained, params) {
                    Some(op) => ops.push(op),
                    None => {
                        if !ops.is_empty() {
                            sequence.push(ops);
                        }
                        tracing::debug!(
                            step,
                            requested = steps,
                            "mosaic grid saturated, ending sequence early"
                        );
                        break;
                    }
                }
            }

            sequence.push(ops);
        }

        sequence
    }

    fn place_block(
        &mut self,
        field: &mut Field,
        layer: u8,
        constraint: Option<u8>,
        params: &GeneratorParams,
        rng: &mut ChaCha8Rng,
    ) -> Option<Placement> {
        self.collect_frontier(field, layer, constraint, params.aspect_ratio);
        if self.frontier.is_empty() {
            return None;
        }
        let picker = WeightedIndex::new(&self.weights).ok()?;
        let (fx, fy) = self.frontier[picker.sample(rng)];

        let min_size = params.min_block_size.max(1);
        let max_size = params.max_block_size.max(min_size);
        for _ in 0..params.attempts_per_block.max(1) {
            let rows = rng.gen_range(min_size..=max_size).min(field.height as u32) as i32;
            let stretched = (rows as f32 * params.aspect_ratio.max(0.0)).round() as u32;
            let columns = stretched.clamp(min_size, max_size).min(field.width as u32) as i32;

            let x1 = (fx - rng.gen_range(0..columns)).clamp(field.min_x(), field.max_x() - columns + 1);
            let y1 = (fy - rng.gen_range(0..rows)).clamp(field.min_y(), field.max_y() - rows + 1);
            let x2 = x1 + columns - 1;
            let y2 = y1 + rows - 1;

            if let Some(lower) = constraint {
                if !field.covers(lower, x1, y1, x2, y2) {
                    continue;
                }
            }

            let overwrote = field.any_occupied(layer, x1, y1, x2, y2);
            field.mark_rect(layer, x1, y1, x2, y2);
            let op = if x1 == x2 && y1 == y2 {
                SequenceOp::Add { x: x1, y: y1, layer }
            } else {
                SequenceOp::AddRect {
                    x1,
                    y1,
                    x2,
                    y2,
                    layer,
                }
            };
            return Some(Placement {
                op,
                overwrote,
                rect: (x1, y1, x2, y2),
            });
        }

        field.mark(layer, fx, fy);
        Some(Placement {
            op: SequenceOp::Add {
                x: fx,
                y: fy,
                layer,
            },
            overwrote: false,
            rect: (fx, fy, fx, fy),
        })
    }

    fn force_expansion(
        &mut self,
        field: &mut Field,
        layers: &[u8],
        constrained: bool,
        params: &GeneratorParams,
    ) -> Option<SequenceOp> {
        for &layer in layers {
            let constraint = constraint_for(layer, constrained);
            self.collect_frontier(field, layer, constraint, params.aspect_ratio);
            let best = self
                .weights
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, f64)>, (index, weight)| match best {
                    Some((_, top)) if top >= *weight => best,
                    _ => Some((index, *weight)),
                });
            if let Some((index, _)) = best {
                let (x, y) = self.frontier[index];
                field.mark(layer, x, y);
                return Some(SequenceOp::Add { x, y, layer });
            }
        }
        None
    }

    /// Gathers empty cells adjacent to the layer, weighted towards the centre.
    fn collect_frontier(&mut self, field: &Field, layer: u8, constraint: Option<u8>, aspect: f32) {
        self.frontier.clear();
        self.weights.clear();
        let aspect = f64::from(aspect.max(f32::EPSILON));

        for y in field.min_y()..=field.max_y() {
            for x in field.min_x()..=field.max_x() {
                if field.occupied(layer, x, y) {
                    continue;
                }
                if let Some(lower) = constraint {
                    if !field.occupied(lower, x, y) {
                        continue;
                    }
                }
                let touches = field.occupied(layer, x - 1, y)
                    || field.occupied(layer, x + 1, y)
                    || field.occupied(layer, x, y - 1)
                    || field.occupied(layer, x, y + 1);
                if !touches {
                    continue;
                }
                let distance = (f64::from(x).abs() / aspect).max(f64::from(y).abs());
                self.frontier.push((x, y));
                self.weights.push((100.0 / (distance + 1.0)).powi(3));
            }
        }
    }
}

struct Placement {
    op: SequenceOp,
    overwrote: bool,
    rect: (i32, i32, i32, i32),
}

fn constraint_for(layer: u8, constrained: bool) -> Option<u8> {
    if constrained && layer > 0 {
        Some(layer - 1)
    } else {
        None
    }
}

fn blocks_for_step(step: u32, params: &GeneratorParams) -> u32 {
    let low = params.blocks_per_step;
    let high = params.max_blocks_per_step.max(low);
    let phase = f64::from(step) * std::f64::consts::TAU / OSCILLATION_PERIOD;
    let swing = 0.5 - 0.5 * phase.cos();
    low + (f64::from(high - low) * swing).round() as u32
}

fn schedule_perimeter(
    scheduled: &mut BTreeMap<u32, SequenceStep>,
    placement: &Placement,
    step: u32,
    steps: u32,
    params: &GeneratorParams,
    rng: &mut ChaCha8Rng,
) {
    let (x1, y1, x2, y2) = placement.rect;
    let layer = placement.op.layer();
    let on = step + rng.gen_range(LINE_DELAY.0..=LINE_DELAY.1);
    let off = on + params.inner_line_duration.max(1);

    let mut lines = Vec::new();
    for x in x1..=x2 {
        lines.push((x, y1, Face::North));
        lines.push((x, y2, Face::South));
    }
    for y in y1..=y2 {
        lines.push((x1, y, Face::West));
        lines.push((x2, y, Face::East));
    }

    for (x, y, face) in lines {
        if on < steps {
            scheduled
                .entry(on)
                .or_default()
                .push(SequenceOp::AddLine { x, y, face, layer });
            if off < steps {
                scheduled
                    .entry(off)
                    .or_default()
                    .push(SequenceOp::RemLine { x, y, face, layer });
            }
        }
    }
}

/// Dense per-layer occupancy with a centred logical origin.
struct Field {
    width: i32,
    height: i32,
    origin_x: i32,
    origin_y: i32,
    layers: Vec<Vec<bool>>,
}

impl Field {
    fn new(width: u32, height: u32) -> Option<Self> {
        let width = i32::try_from(width).ok().filter(|w| *w > 0)?;
        let height = i32::try_from(height).ok().filter(|h| *h > 0)?;
        let cells = usize::try_from(width).ok()? * usize::try_from(height).ok()?;
        Some(Self {
            width,
            height,
            origin_x: width / 2,
            origin_y: height / 2,
            layers: vec![vec![false; cells]; LAYER_COUNT],
        })
    }

    fn min_x(&self) -> i32 {
        -self.origin_x
    }

    fn max_x(&self) -> i32 {
        self.width - self.origin_x - 1
    }

    fn min_y(&self) -> i32 {
        -self.origin_y
    }

    fn max_y(&self) -> i32 {
        self.height - self.origin_y - 1
    }

    fn slot(&self, x: i32, y: i32) -> Option<usize> {
        let column = x + self.origin_x;
        let row = y + self.origin_y;
        if (0..self.width).contains(&column) && (0..self.height).contains(&row) {
            usize::try_from(row * self.width + column).ok()
        } else {
            None
        }
    }

    fn occupied(&self, layer: u8, x: i32, y: i32) -> bool {
        match (self.layers.get(usize::from(layer)), self.slot(x, y)) {
            (Some(cells), Some(slot)) => cells[slot],
            _ => false,
        }
    }

    fn mark(&mut self, layer: u8, x: i32, y: i32) {
        if let Some(slot) = self.slot(x, y) {
            if let Some(cells) = self.layers.get_mut(usize::from(layer)) {
                cells[slot] = true;
            }
        }
    }

    fn mark_rect(&mut self, layer: u8, x1: i32, y1: i32, x2: i32, y2: i32) {
        for y in y1..=y2 {
            for x in x1..=x2 {
                self.mark(layer, x, y);
            }
        }
    }

    fn covers(&self, layer: u8, x1: i32, y1: i32, x2: i32, y2: i32) -> bool {
        (y1..=y2).all(|y| (x1..=x2).all(|x| self.occupied(layer, x, y)))
    }

    fn any_occupied(&self, layer: u8, x1: i32, y1: i32, x2: i32, y2: i32) -> bool {
        (y1..=y2).any(|y| (x1..=x2).any(|x| self.occupied(layer, x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::{blocks_for_step, Field};
    use crate::GeneratorParams;

    #[test]
    fn block_count_oscillates_between_bounds() {
        let params = GeneratorParams::default();
        let counts: Vec<u32> = (0..32).map(|step| blocks_for_step(step, &params)).collect();
        assert_eq!(counts[0], params.blocks_per_step);
        assert_eq!(counts[8], params.max_blocks_per_step);
        assert!(counts
            .iter()
            .all(|count| (params.blocks_per_step..=params.max_blocks_per_step).contains(count)));
    }

    #[test]
    fn field_origin_sits_at_grid_centre() {
        let field = Field::new(5, 4).expect("non-empty field");
        assert_eq!((field.min_x(), field.max_x()), (-2, 2));
        assert_eq!((field.min_y(), field.max_y()), (-2, 1));
        assert!(field.slot(-3, 0).is_none());
        assert_eq!(field.slot(0, 0), Some(2 * 5 + 2));
    }
}
