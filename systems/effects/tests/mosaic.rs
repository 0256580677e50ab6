use matrix_code_core::{EngineConfig, LayerConstraint, MosaicSource, LAYER_COUNT};
use matrix_code_grid::CellGrid;
use matrix_code_system_effects::{Effect, EffectContext, Mosaic, MosaicPhase};

fn grid(columns: usize, rows: usize) -> CellGrid {
    let mut grid = CellGrid::new(10.0, 10.0);
    assert!(grid.resize(columns as f32 * 10.0, rows as f32 * 10.0));
    grid
}

fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.mosaic.speed = 10.0;
    config.mosaic.growth_chance = 1.0;
    config.mosaic.duration_seconds = 1.0;
    config.mosaic.fade_ticks = 10;
    config
}

fn trigger(mosaic: &mut Mosaic, grid: &mut CellGrid, config: &EngineConfig) -> bool {
    let mut ctx = EffectContext {
        grid,
        config,
        frame: 0,
    };
    mosaic.trigger(&mut ctx)
}

fn step(mosaic: &mut Mosaic, grid: &mut CellGrid, config: &EngineConfig, ticks: u32) {
    let mut requests = Vec::new();
    for frame in 0..ticks {
        let mut ctx = EffectContext {
            grid: &mut *grid,
            config,
            frame: u64::from(frame),
        };
        mosaic.update(&mut ctx, &mut requests);
    }
}

fn centre(grid: &CellGrid) -> usize {
    grid.index(grid.columns() as i32 / 2, grid.rows() as i32 / 2)
        .expect("centre is on the grid")
}

#[test]
fn empty_grid_refuses_to_start() {
    let config = fast_config();
    let mut grid = CellGrid::new(10.0, 10.0);
    let mut mosaic = Mosaic::new(1);

    assert!(!trigger(&mut mosaic, &mut grid, &config));
    assert_eq!(mosaic.phase(), MosaicPhase::Idle);
}

#[test]
fn trigger_seeds_every_layer_at_the_origin() {
    let config = fast_config();
    let mut grid = grid(40, 24);
    let mut mosaic = Mosaic::new(2);

    assert!(trigger(&mut mosaic, &mut grid, &config));
    assert_eq!(mosaic.phase(), MosaicPhase::Generating);
    assert_eq!(mosaic.blocks().len(), LAYER_COUNT);
    for layer in 0..LAYER_COUNT as u8 {
        assert!(mosaic.is_occupied(layer, 0, 0), "layer {layer} seeded");
    }
    assert!(mosaic.active_indices(&grid).is_none());
    assert!(!trigger(&mut mosaic, &mut grid, &config), "already running");
}

#[test]
fn higher_layers_only_grow_over_their_constraint_layer() {
    let config = fast_config();
    let mut grid = grid(80, 40);
    let mut mosaic = Mosaic::new(3);
    assert!(trigger(&mut mosaic, &mut grid, &config));

    step(&mut mosaic, &mut grid, &config, 40);
    assert!(mosaic.blocks().len() > LAYER_COUNT, "growth happened");

    for block in mosaic.blocks() {
        if let LayerConstraint::Above(lower) = config.mosaic.layer_constraints[usize::from(block.layer)] {
            assert!(
                mosaic.is_occupied(lower, block.x, block.y),
                "{block:?} grew outside layer {lower}"
            );
        }
    }
}

#[test]
fn free_layers_grow_without_a_substrate() {
    let mut config = fast_config();
    config.mosaic.layer_constraints = [LayerConstraint::Free; 4];
    let mut grid = grid(80, 40);
    let mut mosaic = Mosaic::new(4);
    assert!(trigger(&mut mosaic, &mut grid, &config));

    step(&mut mosaic, &mut grid, &config, 40);
    assert!(mosaic.blocks().iter().any(|block| block.layer == 3 && (block.x, block.y) != (0, 0)));
}

#[test]
fn substrate_cells_are_locked_while_running() {
    let config = fast_config();
    let mut grid = grid(40, 24);
    let mut mosaic = Mosaic::new(5);
    assert!(trigger(&mut mosaic, &mut grid, &config));

    let centre = centre(&grid);
    assert!(grid.is_locked(centre));

    grid.clear_locks();
    step(&mut mosaic, &mut grid, &config, 1);
    assert!(grid.is_locked(centre), "locks are renewed every tick");

    step(&mut mosaic, &mut grid, &config, 3);
    assert!(grid.is_locked(centre), "locks persist between ticks");
}

#[test]
fn override_uses_the_top_most_layer_tint() {
    let config = fast_config();
    let mut grid = grid(40, 24);
    let mut mosaic = Mosaic::new(6);
    assert!(trigger(&mut mosaic, &mut grid, &config));

    let centre = centre(&grid);
    let cell = mosaic.override_for(centre, &grid).expect("origin is covered");
    assert_eq!(cell.color, config.mosaic.layer_tints[3]);
    assert!((cell.alpha - config.mosaic.alpha).abs() < f32::EPSILON);
    assert!(cell.solid);

    let corner = grid.index(0, 0).expect("corner is on the grid");
    assert!(mosaic.override_for(corner, &grid).is_none());
}

#[test]
fn lifecycle_grows_then_fades_then_hides() {
    let config = fast_config();
    let mut grid = grid(40, 24);
    let mut mosaic = Mosaic::new(7);
    assert!(trigger(&mut mosaic, &mut grid, &config));

    let generating = config.seconds_to_ticks(config.mosaic.duration_seconds);
    step(&mut mosaic, &mut grid, &config, generating);
    assert_eq!(mosaic.phase(), MosaicPhase::FadeOut);

    step(&mut mosaic, &mut grid, &config, 5);
    assert!(mosaic.fade() < 1.0 && mosaic.fade() > 0.0);
    let centre = centre(&grid);
    let faded = mosaic.override_for(centre, &grid).expect("still covered");
    assert!(faded.alpha < config.mosaic.alpha);
    assert!(grid.is_locked(centre), "substrate stays locked while fading");

    step(&mut mosaic, &mut grid, &config, 5);
    assert_eq!(mosaic.phase(), MosaicPhase::Idle);
    assert!(mosaic.blocks().iter().all(|block| !block.visible));
    assert!(mosaic.override_for(centre, &grid).is_none());
    assert_eq!(mosaic.active_indices(&grid), Some(Vec::new()));
    assert!(
        grid.locks().iter().all(|locked| !locked),
        "finished mosaic releases its substrate"
    );
}

#[test]
fn resize_abandons_a_running_mosaic() {
    let config = fast_config();
    let mut grid = grid(40, 24);
    let mut mosaic = Mosaic::new(8);
    assert!(trigger(&mut mosaic, &mut grid, &config));

    assert!(grid.resize(500.0, 300.0));
    step(&mut mosaic, &mut grid, &config, 1);
    assert_eq!(mosaic.phase(), MosaicPhase::Idle);
    assert!(mosaic.blocks().iter().all(|block| !block.visible));
}

#[test]
fn sequenced_source_plays_back_generated_steps() {
    let mut config = fast_config();
    config.mosaic.source = MosaicSource::Sequenced;
    let mut grid = grid(80, 40);
    let mut mosaic = Mosaic::new(9);
    assert!(trigger(&mut mosaic, &mut grid, &config));

    for layer in 0..config.sequence.layer_count {
        assert!(mosaic.is_occupied(layer, 0, 0), "step zero seeds layer {layer}");
    }
    let seeded = mosaic.blocks().len();

    step(&mut mosaic, &mut grid, &config, 20);
    assert!(mosaic.steps() >= 20);
    assert!(mosaic.blocks().len() > seeded, "playback added blocks");
}

#[test]
fn identical_seeds_grow_identical_mosaics() {
    let config = fast_config();
    let grow = || {
        let mut grid = grid(60, 30);
        let mut mosaic = Mosaic::new(10);
        assert!(trigger(&mut mosaic, &mut grid, &config));
        step(&mut mosaic, &mut grid, &config, 30);
        mosaic.blocks().to_vec()
    };
    assert_eq!(grow(), grow());
}
