use matrix_code_core::{CellType, EngineConfig};
use matrix_code_grid::CellGrid;
use matrix_code_system_simulation::{SimulationSystem, Stream, StreamMode, StreamPhase};

fn quiet_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.streams.spawn_chance = 0.0;
    config.streams.rotator_chance = 0.0;
    config.streams.glyph_flicker_chance = 0.0;
    config
}

fn grid(columns: usize, rows: usize) -> CellGrid {
    let mut grid = CellGrid::new(10.0, 10.0);
    assert!(grid.resize(columns as f32 * 10.0, rows as f32 * 10.0));
    grid
}

fn column_types(grid: &CellGrid, column: i32) -> Vec<CellType> {
    (0..grid.rows() as i32)
        .map(|row| {
            let index = grid.index(column, row).expect("in bounds");
            grid.cell_types()[index]
        })
        .collect()
}

#[test]
fn spawning_fills_the_grid_over_time() {
    let mut config = EngineConfig::default();
    config.streams.spawn_chance = 1.0;
    let mut grid = grid(20, 15);
    let mut simulation = SimulationSystem::new(11);

    for frame in 0..120 {
        simulation.update(&mut grid, &config, frame);
    }

    assert!(!simulation.streams().is_empty(), "streams should be alive");
    let filled = grid.cell_types().iter().filter(|t| t.is_filled()).count();
    assert!(filled > 20, "expected a populated grid, found {filled} cells");
}

#[test]
fn fast_forward_substeps_write_every_crossed_row() {
    let config = quiet_config();
    let mut grid = grid(4, 30);
    let mut simulation = SimulationSystem::new(3);
    simulation.insert_stream(Stream::new(1, 1.0, 200, 1.0, StreamMode::Standard));
    simulation.time_scale().set(3.0);

    for frame in 0..5 {
        simulation.update(&mut grid, &config, frame);
    }

    let head = simulation.streams()[0].head();
    assert_eq!(head, 14.0);
    let types = column_types(&grid, 1);
    for (row, cell_type) in types.iter().enumerate().take(15) {
        assert!(cell_type.is_filled(), "row {row} was skipped");
    }
    assert!(!types[15].is_filled(), "rows ahead of the head stay empty");
}

#[test]
fn trail_alpha_falls_off_behind_the_head() {
    let config = quiet_config();
    let mut grid = grid(2, 20);
    let mut simulation = SimulationSystem::new(5);
    simulation.insert_stream(Stream::new(0, 1.0, 10, 1.0, StreamMode::Standard));

    for frame in 0..10 {
        simulation.update(&mut grid, &config, frame);
    }

    let alphas: Vec<f32> = (0..10)
        .map(|row| grid.alphas()[grid.index(0, row).expect("in bounds")])
        .collect();
    for pair in alphas.windows(2) {
        assert!(pair[0] < pair[1], "alpha must rise towards the head: {alphas:?}");
    }
    assert_eq!(grid.cell_types()[grid.index(0, 9).expect("head")], CellType::Tracer);
    assert_eq!(grid.cell_types()[grid.index(0, 0).expect("tail")], CellType::Trail);
}

#[test]
fn rewinding_rebrightens_trail_and_clears_unwritten_rows() {
    let config = quiet_config();
    let mut grid = grid(2, 20);
    let mut simulation = SimulationSystem::new(5);
    simulation.insert_stream(Stream::new(0, 1.0, 10, 1.0, StreamMode::Standard));

    for frame in 0..10 {
        simulation.update(&mut grid, &config, frame);
    }
    let tail = grid.index(0, 0).expect("tail");
    let head = grid.index(0, 9).expect("head");
    let faded = grid.alphas()[tail];

    simulation.time_scale().set(-1.0);
    simulation.update(&mut grid, &config, 10);

    assert!(grid.alphas()[tail] > faded, "rewind must re-brighten the tail");
    assert_eq!(grid.cell_types()[head], CellType::Empty);
    assert_eq!(simulation.streams()[0].head(), 8.0);

    for frame in 11..25 {
        simulation.update(&mut grid, &config, frame);
    }
    assert!(simulation.streams().is_empty(), "stream dies above row 0");
    assert!(column_types(&grid, 0).iter().all(|t| !t.is_filled()));
}

#[test]
fn paused_simulation_leaves_grid_and_locks_untouched() {
    let config = quiet_config();
    let mut grid = grid(3, 10);
    let mut simulation = SimulationSystem::new(9);
    simulation.insert_stream(Stream::new(2, 0.7, 6, 1.0, StreamMode::Standard));
    for frame in 0..6 {
        simulation.update(&mut grid, &config, frame);
    }

    let before: Vec<_> = (0..grid.len()).map(|i| grid.snapshot(i)).collect();
    simulation.time_scale().set(0.0);
    assert!(grid.lock(0));
    simulation.update(&mut grid, &config, 6);

    assert!(grid.is_locked(0), "locks belong to whoever set them");
    let after: Vec<_> = (0..grid.len()).map(|i| grid.snapshot(i)).collect();
    assert_eq!(before, after);
}

#[test]
fn locked_cells_are_skipped_until_their_owner_unlocks_them() {
    let config = quiet_config();
    let mut grid = grid(3, 10);
    let mut simulation = SimulationSystem::new(1);
    simulation.insert_stream(Stream::new(0, 1.0, 6, 1.0, StreamMode::Standard));

    let reserved = grid.index(0, 0).expect("in bounds");
    assert!(grid.lock(reserved));
    simulation.update(&mut grid, &config, 0);

    assert_eq!(grid.cell_types()[reserved], CellType::Empty);
    assert!(grid.is_locked(reserved));

    simulation.update(&mut grid, &config, 1);
    assert_eq!(
        grid.cell_types()[reserved],
        CellType::Empty,
        "lock holds across ticks"
    );

    assert!(grid.unlock(reserved));
    let mut fresh = SimulationSystem::new(1);
    fresh.insert_stream(Stream::new(0, 1.0, 6, 1.0, StreamMode::Standard));
    fresh.update(&mut grid, &config, 2);
    assert_eq!(grid.cell_types()[reserved], CellType::Tracer);
}

#[test]
fn huge_time_scale_caps_spawn_rounds_and_drops_the_backlog() {
    let mut config = EngineConfig::default();
    config.streams.spawn_chance = 1.0;
    config.streams.spawn_interval = 4.0;
    let mut grid = grid(20, 15);
    let mut simulation = SimulationSystem::new(6);

    simulation.time_scale().set(1.0e12);
    simulation.update(&mut grid, &config, 0);

    simulation.time_scale().set(1.0);
    for frame in 1..4 {
        simulation.update(&mut grid, &config, frame);
        assert!(
            simulation.streams().is_empty(),
            "no backlog should spill into frame {frame}"
        );
    }
    simulation.update(&mut grid, &config, 4);
    assert!(!simulation.streams().is_empty(), "regular cadence resumes");
}

#[test]
fn stream_is_dropped_after_trail_fades() {
    let config = quiet_config();
    let mut grid = grid(1, 10);
    let mut simulation = SimulationSystem::new(2);
    simulation.insert_stream(Stream::new(0, 1.0, 5, 1.0, StreamMode::Standard));

    for frame in 0..12 {
        simulation.update(&mut grid, &config, frame);
    }
    assert_eq!(simulation.streams()[0].phase(), StreamPhase::Decaying);

    for frame in 12..20 {
        simulation.update(&mut grid, &config, frame);
    }
    assert!(simulation.streams().is_empty());
    assert!(
        grid.alphas().iter().all(|alpha| *alpha == 0.0),
        "every glyph has faded"
    );
}

#[test]
fn most_recent_writer_wins_shared_cells() {
    let config = quiet_config();
    let mut grid = grid(1, 10);
    let mut simulation = SimulationSystem::new(4);
    simulation.insert_stream(Stream::new(0, 1.0, 8, 1.0, StreamMode::Rainbow));
    simulation.insert_stream(Stream::new(0, 1.0, 8, 0.5, StreamMode::Standard));

    simulation.update(&mut grid, &config, 0);

    let index = grid.index(0, 0).expect("in bounds");
    assert!(grid.style(index).is_none(), "later standard stream replaced the style");
    assert_eq!(grid.brightness()[index], 0.5);
}

#[test]
fn reallocating_the_grid_drops_streams() {
    let config = quiet_config();
    let mut grid = grid(4, 4);
    let mut simulation = SimulationSystem::new(8);
    simulation.insert_stream(Stream::new(3, 0.5, 4, 1.0, StreamMode::Standard));
    simulation.update(&mut grid, &config, 0);
    assert_eq!(simulation.streams().len(), 1);

    assert!(grid.resize(20.0, 20.0));
    simulation.update(&mut grid, &config, 1);
    assert!(simulation.streams().is_empty());
}
