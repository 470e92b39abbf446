//! Pairwise boundary proximity between calibration pieces.

use jigsaw_core::{min_distance, Board, BoardError, PieceId};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::params::AdjacencyParams;

/// Sampled boundary of one piece plus its axis-aligned extent.
pub(crate) struct SampledBoundary {
    pub id: PieceId,
    pub points: Vec<Point2<f32>>,
    min: Point2<f32>,
    max: Point2<f32>,
}

impl SampledBoundary {
    /// Lower bound on the distance between two sample sets.
    fn box_gap(&self, other: &SampledBoundary) -> f32 {
        let dx = (other.min.x - self.max.x).max(self.min.x - other.max.x).max(0.0);
        let dy = (other.min.y - self.max.y).max(self.min.y - other.max.y).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    /// Whether the two sample sets come closer than `tau`.
    pub fn within(&self, other: &SampledBoundary, tau: f32) -> bool {
        if self.box_gap(other) >= tau {
            return false;
        }
        min_distance(&self.points, &other.points).is_some_and(|d| d < tau)
    }
}

pub(crate) fn sample_boundaries(
    board: &Board,
    samples: usize,
) -> Result<Vec<SampledBoundary>, BoardError> {
    board
        .ids()
        .into_iter()
        .map(|id| {
            let points = board.boundary_samples(id, samples)?;
            let mut min = Point2::new(f32::INFINITY, f32::INFINITY);
            let mut max = Point2::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
            for p in &points {
                min = Point2::new(min.x.min(p.x), min.y.min(p.y));
                max = Point2::new(max.x.max(p.x), max.y.max(p.y));
            }
            Ok(SampledBoundary {
                id,
                points,
                min,
                max,
            })
        })
        .collect()
}

/// Symmetric boolean matrix over a frozen list of piece ids; the diagonal is true.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairMatrix {
    ids: Vec<PieceId>,
    cells: Vec<Vec<bool>>,
}

impl PairMatrix {
    pub(crate) fn build<F>(boundaries: &[SampledBoundary], mut related: F) -> Self
    where
        F: FnMut(&SampledBoundary, &SampledBoundary) -> bool,
    {
        let n = boundaries.len();
        let mut cells = vec![vec![false; n]; n];
        for i in 0..n {
            cells[i][i] = true;
            for j in i + 1..n {
                if related(&boundaries[i], &boundaries[j]) {
                    cells[i][j] = true;
                    cells[j][i] = true;
                }
            }
        }
        Self {
            ids: boundaries.iter().map(|b| b.id).collect(),
            cells,
        }
    }

    /// Piece ids in row/column order.
    pub fn ids(&self) -> &[PieceId] {
        &self.ids
    }

    pub fn rows(&self) -> &[Vec<bool>] {
        &self.cells
    }

    pub fn index_of(&self, id: PieceId) -> Option<usize> {
        self.ids.iter().position(|&x| x == id)
    }

    pub fn get(&self, a: PieceId, b: PieceId) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(i), Some(j)) => self.cells[i][j],
            _ => false,
        }
    }

    /// Related pieces of `id`, excluding itself.
    pub fn neighbours(&self, id: PieceId) -> Vec<PieceId> {
        let Some(i) = self.index_of(id) else {
            return Vec::new();
        };
        self.cells[i]
            .iter()
            .enumerate()
            .filter(|&(j, &on)| on && j != i)
            .map(|(j, _)| self.ids[j])
            .collect()
    }

    /// Number of unordered related pairs.
    pub fn pair_count(&self) -> usize {
        let n = self.ids.len();
        (0..n)
            .map(|i| (i + 1..n).filter(|&j| self.cells[i][j]).count())
            .sum()
    }
}

/// Adjacency computed once from a calibration board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdjacencyInfo {
    pub params: AdjacencyParams,
    pub matrix: PairMatrix,
}

impl AdjacencyInfo {
    pub fn compute(board: &Board, params: &AdjacencyParams) -> Result<Self, BoardError> {
        let boundaries = sample_boundaries(board, params.boundary_samples)?;
        let matrix = PairMatrix::build(&boundaries, |a, b| a.within(b, params.tau_adj));
        log::info!(
            "adjacency: {} pieces, {} adjacent pairs (tau_adj = {})",
            boundaries.len(),
            matrix.pair_count(),
            params.tau_adj
        );
        Ok(Self {
            params: params.clone(),
            matrix,
        })
    }

    pub fn is_adjacent(&self, a: PieceId, b: PieceId) -> bool {
        self.matrix.get(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jigsaw_core::{BinaryMask, Piece, PieceKind, PieceTemplate};
    use std::sync::Arc;

    fn row_of_squares(xs: &[f32]) -> Board {
        let mask = BinaryMask {
            width: 10,
            height: 10,
            data: vec![true; 100],
        };
        let t = Arc::new(
            PieceTemplate::from_parts(PieceKind::Template, mask, vec![[0, 0, 0]; 100])
                .expect("square"),
        );
        let mut board = Board::new();
        for &x in xs {
            board.add_piece(Piece::new(t.clone(), Point2::new(x, 0.0)));
        }
        board
    }

    #[test]
    fn matrix_is_symmetric_with_true_diagonal() {
        let board = row_of_squares(&[0.0, 12.0, 24.0, 100.0]);
        let params = AdjacencyParams {
            tau_adj: 5.0,
            ..AdjacencyParams::default()
        };
        let info = AdjacencyInfo::compute(&board, &params).expect("board");
        let rows = info.matrix.rows();
        for i in 0..rows.len() {
            assert!(rows[i][i]);
            for j in 0..rows.len() {
                assert_eq!(rows[i][j], rows[j][i]);
            }
        }
        assert!(info.is_adjacent(0, 1));
        assert!(info.is_adjacent(1, 2));
        assert!(!info.is_adjacent(0, 2));
        assert!(!info.is_adjacent(2, 3));
        assert_eq!(info.matrix.neighbours(1), vec![0, 2]);
        assert_eq!(info.matrix.pair_count(), 2);
    }

    #[test]
    fn box_gap_never_exceeds_true_distance() {
        let board = row_of_squares(&[0.0, 30.0]);
        let b = sample_boundaries(&board, 200).expect("board");
        let d = min_distance(&b[0].points, &b[1].points).expect("points");
        assert!(b[0].box_gap(&b[1]) <= d);
        assert!(!b[0].within(&b[1], 20.0));
        assert!(b[0].within(&b[1], 22.0));
    }
}
