use std::collections::HashSet;

use matrix_code_system_sequence::{
    pack, unpack, GeneratorParams, QuantizedSequenceGenerator, SequenceOp, SequenceStep,
    UnpackError,
};
use proptest::prelude::*;

fn generate(width: u32, height: u32, steps: u32, params: &GeneratorParams) -> Vec<SequenceStep> {
    QuantizedSequenceGenerator::default().generate(width, height, steps, params)
}

fn seeded(seed: u64) -> GeneratorParams {
    GeneratorParams {
        seed,
        ..GeneratorParams::default()
    }
}

#[test]
fn identical_inputs_replay_identically() {
    let params = seeded(42);
    assert_eq!(generate(24, 16, 80, &params), generate(24, 16, 80, &params));
}

#[test]
fn seed_changes_the_sequence() {
    assert_ne!(
        generate(24, 16, 40, &seeded(1)),
        generate(24, 16, 40, &seeded(2))
    );
}

#[test]
fn first_step_seeds_every_layer_at_the_origin() {
    let params = seeded(7);
    let sequence = generate(20, 20, 10, &params);
    let expected: Vec<SequenceOp> = (0..params.layer_count)
        .map(|layer| SequenceOp::Add { x: 0, y: 0, layer })
        .collect();
    assert_eq!(sequence[0], expected);
}

#[test]
fn zero_steps_or_empty_grid_yield_nothing() {
    let params = seeded(3);
    assert!(generate(10, 10, 0, &params).is_empty());
    assert!(generate(0, 10, 10, &params).is_empty());
    assert!(generate(10, 0, 10, &params).is_empty());
}

#[test]
fn large_grid_produces_every_requested_step() {
    let sequence = generate(64, 48, 30, &seeded(11));
    assert_eq!(sequence.len(), 30);
}

#[test]
fn saturated_grid_ends_early() {
    let params = GeneratorParams {
        forced_layer: Some(0),
        ..seeded(5)
    };
    let sequence = generate(4, 4, 200, &params);
    assert!(
        sequence.len() < 200,
        "a 4x4 grid must saturate long before 200 steps"
    );
}

#[test]
fn forced_layer_confines_every_operation() {
    let params = GeneratorParams {
        forced_layer: Some(2),
        ..seeded(9)
    };
    let sequence = generate(30, 20, 60, &params);
    assert!(sequence.iter().flatten().all(|op| op.layer() == 2));
    assert!(sequence.iter().flatten().count() > 60, "growth happened");
}

#[test]
fn higher_layers_only_cover_their_lower_layer() {
    let sequence = generate(24, 18, 120, &seeded(13));
    let mut occupied: Vec<HashSet<(i32, i32)>> = vec![HashSet::new(); 4];

    for op in sequence.iter().flatten() {
        let cells: Vec<(i32, i32)> = match *op {
            SequenceOp::Add { x, y, .. } => vec![(x, y)],
            SequenceOp::AddRect { x1, y1, x2, y2, .. } => (y1..=y2)
                .flat_map(|y| (x1..=x2).map(move |x| (x, y)))
                .collect(),
            SequenceOp::AddLine { .. } | SequenceOp::RemLine { .. } => continue,
        };
        let layer = usize::from(op.layer());
        if layer > 0 && !(op == &SequenceOp::Add { x: 0, y: 0, layer: op.layer() }) {
            for cell in &cells {
                assert!(
                    occupied[layer - 1].contains(cell),
                    "layer {layer} grew over {cell:?} before layer {} reached it",
                    layer - 1
                );
            }
        }
        occupied[layer].extend(cells);
    }
}

#[test]
fn every_removed_line_was_added_earlier() {
    let sequence = generate(32, 24, 150, &seeded(21));
    let mut shown = HashSet::new();
    for op in sequence.iter().flatten() {
        match *op {
            SequenceOp::AddLine { x, y, face, layer } => {
                let _ = shown.insert((x, y, face, layer));
            }
            SequenceOp::RemLine { x, y, face, layer } => {
                assert!(shown.contains(&(x, y, face, layer)), "{op:?} had no AddLine");
            }
            _ => {}
        }
    }
}

#[test]
fn packed_records_rebuild_the_same_steps() {
    let sequence = generate(20, 14, 40, &seeded(17));
    let rebuilt = unpack(&pack(&sequence)).expect("packed output must unpack");
    assert_eq!(rebuilt, sequence);
}

#[test]
fn unknown_op_codes_are_reported() {
    assert_eq!(
        unpack(&[vec![1, 0, 0, 0], vec![9, 1, 2]]),
        Err(UnpackError::UnknownOpCode { step: 1, code: 9 })
    );
    assert_eq!(
        unpack(&[vec![3, 0, 0, 1]]),
        Err(UnpackError::Truncated { step: 0 })
    );
    assert_eq!(
        unpack(&[vec![4, 0, 0, 3, 0]]),
        Err(UnpackError::InvalidFace { step: 0, mask: 3 })
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn output_length_and_coordinates_stay_bounded(
        width in 1u32..40,
        height in 1u32..40,
        steps in 0u32..160,
        seed in any::<u64>(),
        layer in prop::option::of(0u8..4),
    ) {
        let params = GeneratorParams { forced_layer: layer, ..seeded(seed) };
        let sequence = generate(width, height, steps, &params);
        prop_assert!(sequence.len() <= steps as usize);

        let (w, h) = (width as i32, height as i32);
        let (min_x, max_x) = (-(w / 2), w - w / 2 - 1);
        let (min_y, max_y) = (-(h / 2), h - h / 2 - 1);
        for op in sequence.iter().flatten() {
            let (x1, y1, x2, y2) = op.bounds();
            prop_assert!(x1 >= min_x && x2 <= max_x, "{:?} escaped {}x{}", op, width, height);
            prop_assert!(y1 >= min_y && y2 <= max_y, "{:?} escaped {}x{}", op, width, height);
        }
    }
}
