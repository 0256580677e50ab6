use matrix_code_core::{CellType, HslStyle};
use matrix_code_grid::CellGrid;
use proptest::prelude::*;

fn sized_grid(width: f32, height: f32) -> CellGrid {
    let mut grid = CellGrid::new(10.0, 20.0);
    assert!(grid.resize(width, height), "first resize must allocate");
    grid
}

fn all_lengths(grid: &CellGrid) -> [usize; 11] {
    [
        grid.codepoints().len(),
        grid.cell_types().len(),
        grid.alphas().len(),
        grid.decays().len(),
        grid.ages().len(),
        grid.brightness().len(),
        grid.morphs().len(),
        grid.palettes().len(),
        grid.fonts().len(),
        grid.overlaps().len(),
        grid.locks().len(),
    ]
}

#[test]
fn dimensions_derive_from_cell_metrics() {
    let grid = sized_grid(105.0, 99.0);
    assert_eq!(grid.columns(), 10);
    assert_eq!(grid.rows(), 4);
    assert_eq!(grid.len(), 40);
}

#[test]
fn resize_to_same_effective_size_keeps_arrays_in_place() {
    let mut grid = sized_grid(100.0, 100.0);
    let before = grid.codepoints().as_ptr();
    assert!(grid.set_char(3, 'Z'));

    assert!(!grid.resize(109.0, 119.0), "same cols/rows must not reallocate");
    assert_eq!(grid.generation(), 1);
    assert_eq!(grid.codepoints().as_ptr(), before);
    assert_eq!(grid.char_at(3), Some('Z'));
}

#[test]
fn reallocation_clears_sparse_styles() {
    let mut grid = sized_grid(100.0, 100.0);
    assert!(grid.set_style(4, HslStyle::fixed(120.0, 100.0, 50.0)));
    assert!(!grid.resize(100.0, 100.0));
    assert_eq!(grid.style_count(), 1, "no-op resize keeps styles");

    assert!(grid.resize(200.0, 100.0));
    assert_eq!(grid.style_count(), 0, "reallocation must drop styles");
    assert!(grid.style(4).is_none());
}

#[test]
fn clear_cell_resets_attributes_and_style() {
    let mut grid = sized_grid(100.0, 100.0);
    let index = grid.index(2, 3).expect("in bounds");
    assert!(grid.set_char(index, 'ｱ'));
    grid.cell_types_mut()[index] = CellType::Tracer;
    grid.alphas_mut()[index] = 0.9;
    grid.ages_mut()[index] = 12;
    assert!(grid.set_style(index, HslStyle::fixed(10.0, 90.0, 70.0)));

    grid.clear_cell(index);

    let cell = grid.snapshot(index).expect("snapshot");
    assert_eq!(grid.char_at(index), Some(' '));
    assert_eq!(cell.cell_type, CellType::Empty);
    assert_eq!(cell.alpha, 0.0);
    assert_eq!(cell.age, 0);
    assert!(grid.style(index).is_none());
}

#[test]
fn locks_clear_together() {
    let mut grid = sized_grid(50.0, 40.0);
    assert!(grid.lock(0));
    assert!(grid.lock(7));
    assert!(!grid.lock(grid.len()));
    assert!(grid.is_locked(7));

    grid.clear_locks();

    assert!(!grid.is_locked(0));
    assert!(!grid.is_locked(7));
    assert!(!grid.is_locked(usize::MAX));
}

#[test]
fn unlock_releases_only_the_named_cell() {
    let mut grid = sized_grid(50.0, 40.0);
    assert!(grid.lock(2));
    assert!(grid.lock(3));

    assert!(grid.unlock(2));
    assert!(!grid.unlock(grid.len()));

    assert!(!grid.is_locked(2));
    assert!(grid.is_locked(3), "neighbouring lock should survive");
}

#[test]
fn coords_invert_index() {
    let grid = sized_grid(80.0, 60.0);
    let index = grid.index(5, 2).expect("in bounds");
    assert_eq!(grid.coords(index), Some((5, 2)));
    assert_eq!(grid.coords(grid.len()), None);
}

proptest! {
    #[test]
    fn every_array_matches_cell_count(width in 1.0f32..4000.0, height in 1.0f32..4000.0) {
        let mut grid = CellGrid::new(10.0, 20.0);
        let _ = grid.resize(width, height);
        let expected = grid.columns() * grid.rows();
        for len in all_lengths(&grid) {
            prop_assert_eq!(len, expected);
        }
        let generation = grid.generation();
        prop_assert!(!grid.resize(width, height));
        prop_assert_eq!(grid.generation(), generation);
    }

    #[test]
    fn index_matches_row_major_layout(
        columns in 1usize..64,
        rows in 1usize..64,
        x in -8i32..72,
        y in -8i32..72,
    ) {
        let grid = sized_grid(columns as f32 * 10.0, rows as f32 * 20.0);
        let in_bounds = x >= 0 && y >= 0 && (x as usize) < columns && (y as usize) < rows;
        if in_bounds {
            prop_assert_eq!(grid.index(x, y), Some(y as usize * columns + x as usize));
        } else {
            prop_assert_eq!(grid.index(x, y), None);
        }
    }

    #[test]
    fn stored_glyph_reads_back(glyph in any::<char>().prop_filter("BMP only", |c| u32::from(*c) <= 0xFFFF)) {
        let mut grid = sized_grid(40.0, 40.0);
        prop_assert!(grid.set_char(1, glyph));
        prop_assert_eq!(grid.char_at(1), Some(glyph));
    }
}
