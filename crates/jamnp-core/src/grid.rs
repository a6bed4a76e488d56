//! Square grid topology over the active validator set.

use crate::ids::ValidatorIndex;

/// Row/column position of a validator within the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPosition {
    pub row: usize,
    pub col: usize,
}

/// Row-major placement of `V` validators (sorted ascending by index) with
/// `cols = floor(sqrt(V))`, `rows = ceil(V/cols)`.
#[derive(Debug, Clone)]
pub struct ValidatorGrid {
    cols: usize,
    rows: usize,
    /// Sorted validator indices, position `i` is the i-th placed validator.
    ordered: Vec<ValidatorIndex>,
}

impl ValidatorGrid {
    /// Build a grid from an unsorted slice of validator indices.
    pub fn new(indices: &[ValidatorIndex]) -> Self {
        let mut ordered = indices.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let v = ordered.len().max(1);
        let cols = (v as f64).sqrt().floor() as usize;
        let cols = cols.max(1);
        let rows = (v + cols - 1) / cols;

        Self { cols, rows, ordered }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Position of `validator` in the grid, if it is a member.
    pub fn position(&self, validator: ValidatorIndex) -> Option<GridPosition> {
        let i = self.ordered.iter().position(|&v| v == validator)?;
        Some(GridPosition { row: i / self.cols, col: i % self.cols })
    }

    /// All other validators sharing `validator`'s row or column.
    pub fn neighbours(&self, validator: ValidatorIndex) -> Vec<ValidatorIndex> {
        let Some(pos) = self.position(validator) else {
            return Vec::new();
        };

        self.ordered
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| {
                if v == validator {
                    return None;
                }
                let other = GridPosition { row: i / self.cols, col: i % self.cols };
                if other.row == pos.row || other.col == pos.col {
                    Some(v)
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_grid_for_v_equals_6() {
        let grid = ValidatorGrid::new(&[0, 1, 2, 3, 4, 5]);
        assert_eq!(grid.cols(), 2);
        assert_eq!(grid.rows(), 3);

        let expected = [(0, 0, 0), (1, 0, 1), (2, 1, 0), (3, 1, 1), (4, 2, 0), (5, 2, 1)];
        for (idx, row, col) in expected {
            let pos = grid.position(idx).unwrap();
            assert_eq!((pos.row, pos.col), (row, col), "validator {idx}");
        }

        let mut neighbours = grid.neighbours(2);
        neighbours.sort_unstable();
        assert_eq!(neighbours, vec![0, 3, 4]);
    }

    #[test]
    fn grid_consistency_over_v_in_1_to_1024() {
        for v in 1..=1024usize {
            let indices: Vec<ValidatorIndex> = (0..v as u16).collect();
            let grid = ValidatorGrid::new(&indices);

            let expected_cols = (v as f64).sqrt().floor() as usize;
            assert_eq!(grid.cols(), expected_cols.max(1));
            assert_eq!(grid.rows(), (v + grid.cols() - 1) / grid.cols());

            let mut seen = std::collections::HashSet::new();
            for &idx in &indices {
                let pos = grid.position(idx).unwrap();
                assert!(seen.insert((pos.row, pos.col)), "duplicate cell for v={v}");
            }

            let full_rows = v / grid.cols();
            if full_rows > 0 && v % grid.cols() == 0 {
                let last_full_row_validator = indices[grid.cols() - 1];
                let expected_count = (grid.rows() - 1) + (grid.cols() - 1);
                assert_eq!(
                    grid.neighbours(last_full_row_validator).len(),
                    expected_count,
                    "v={v}"
                );
            }
        }
    }

    #[test]
    fn non_member_has_no_neighbours() {
        let grid = ValidatorGrid::new(&[0, 1, 2]);
        assert!(grid.neighbours(99).is_empty());
        assert!(grid.position(99).is_none());
    }
}
