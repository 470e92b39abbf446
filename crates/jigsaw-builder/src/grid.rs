//! Interlocking and integer grid coordinates for grid-cut puzzles.
//!
//! Coordinates follow a single convention: origin at the top-left piece,
//! rows grow downward and columns grow rightward.

use std::collections::{BTreeMap, VecDeque};

use jigsaw_core::{min_distance, Board, PieceId};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::adjacency::{sample_boundaries, PairMatrix, SampledBoundary};
use crate::error::BuildError;
use crate::params::GridParams;

/// Integer grid cell of a piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridCoord {
    pub row: i32,
    pub col: i32,
}

impl GridCoord {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    fn step(self, dir: NeighborDirection) -> Self {
        let (dr, dc) = match dir {
            NeighborDirection::Right => (0, 1),
            NeighborDirection::Left => (0, -1),
            NeighborDirection::Up => (-1, 0),
            NeighborDirection::Down => (1, 0),
        };
        GridCoord::new(self.row + dr, self.col + dc)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

fn direction_quadrant(vec_to_neighbor: &Vector2<f32>) -> NeighborDirection {
    if vec_to_neighbor.x.abs() > vec_to_neighbor.y.abs() {
        if vec_to_neighbor.x >= 0.0 {
            NeighborDirection::Right
        } else {
            NeighborDirection::Left
        }
    } else if vec_to_neighbor.y >= 0.0 {
        NeighborDirection::Down
    } else {
        NeighborDirection::Up
    }
}

/// Share of `a`'s samples lying within `tau` of any sample of `b`.
fn contact_fraction(a: &SampledBoundary, b: &SampledBoundary, tau: f32) -> f32 {
    if a.points.is_empty() {
        return 0.0;
    }
    let near = a
        .points
        .iter()
        .filter(|p| min_distance(std::slice::from_ref(*p), &b.points).is_some_and(|d| d < tau))
        .count();
    near as f32 / a.points.len() as f32
}

/// Interlock matrix and grid coordinates computed once from a calibration board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridInfo {
    pub params: GridParams,
    pub interlock: PairMatrix,
    coords: BTreeMap<PieceId, GridCoord>,
    rows: usize,
    cols: usize,
}

impl GridInfo {
    pub fn compute(board: &Board, params: &GridParams, samples: usize) -> Result<Self, BuildError> {
        let boundaries = sample_boundaries(board, samples)?;
        let interlock = PairMatrix::build(&boundaries, |a, b| {
            a.within(b, params.tau_interlock)
                && contact_fraction(a, b, params.tau_interlock)
                    .max(contact_fraction(b, a, params.tau_interlock))
                    >= params.min_contact_fraction
        });

        let centroids: BTreeMap<PieceId, Point2<f32>> =
            board.iter().map(|p| (p.id(), p.centroid())).collect();
        let coords = propagate(board, &interlock, &centroids)?;

        let rows = coords.values().map(|c| c.row + 1).max().unwrap_or(0) as usize;
        let cols = coords.values().map(|c| c.col + 1).max().unwrap_or(0) as usize;
        log::info!(
            "grid: {} pieces, {} interlocking pairs, {}x{} cells",
            board.len(),
            interlock.pair_count(),
            rows,
            cols
        );
        Ok(Self {
            params: params.clone(),
            interlock,
            coords,
            rows,
            cols,
        })
    }

    pub fn is_interlocked(&self, a: PieceId, b: PieceId) -> bool {
        self.interlock.get(a, b)
    }

    pub fn coord(&self, id: PieceId) -> Option<GridCoord> {
        self.coords.get(&id).copied()
    }

    pub fn coords(&self) -> &BTreeMap<PieceId, GridCoord> {
        &self.coords
    }

    pub fn piece_at(&self, row: i32, col: i32) -> Option<PieceId> {
        let cell = GridCoord::new(row, col);
        self.coords
            .iter()
            .find(|(_, c)| **c == cell)
            .map(|(id, _)| *id)
    }

    /// `(rows, cols)` spanned by the coordinates.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Piece ids in row-major cell order.
    pub fn row_major_ids(&self) -> Vec<PieceId> {
        let mut ids: Vec<(GridCoord, PieceId)> =
            self.coords.iter().map(|(id, c)| (*c, *id)).collect();
        ids.sort();
        ids.into_iter().map(|(_, id)| id).collect()
    }
}

/// Median absolute offset along one axis over interlocking pairs in that direction.
fn pitch(
    interlock: &PairMatrix,
    centroids: &BTreeMap<PieceId, Point2<f32>>,
    horizontal: bool,
) -> Option<f32> {
    let ids = interlock.ids();
    let mut steps = Vec::new();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            if !interlock.get(a, b) {
                continue;
            }
            let (Some(ca), Some(cb)) = (centroids.get(&a), centroids.get(&b)) else {
                continue;
            };
            let d = cb - ca;
            let dir = direction_quadrant(&d);
            let is_horizontal = matches!(dir, NeighborDirection::Left | NeighborDirection::Right);
            if is_horizontal == horizontal {
                steps.push(if horizontal { d.x.abs() } else { d.y.abs() });
            }
        }
    }
    if steps.is_empty() {
        return None;
    }
    steps.sort_by(f32::total_cmp);
    Some(steps[steps.len() / 2])
}

fn propagate(
    board: &Board,
    interlock: &PairMatrix,
    centroids: &BTreeMap<PieceId, Point2<f32>>,
) -> Result<BTreeMap<PieceId, GridCoord>, BuildError> {
    let mean_size = {
        let n = board.len().max(1) as f32;
        board.iter().fold(Vector2::zeros(), |acc, p| acc + p.size()) / n
    };
    let pitch_x = pitch(interlock, centroids, true).unwrap_or(mean_size.x).max(1.0);
    let pitch_y = pitch(interlock, centroids, false).unwrap_or(mean_size.y).max(1.0);

    let mut coords: BTreeMap<PieceId, GridCoord> = BTreeMap::new();
    let mut anchor: Option<(Point2<f32>, GridCoord)> = None;
    let mut queue = VecDeque::new();

    for start in interlock.ids().iter().copied() {
        if coords.contains_key(&start) {
            continue;
        }
        let Some(&c_start) = centroids.get(&start) else {
            continue;
        };
        // Disconnected components are placed relative to the first one by pitch.
        let seed = match anchor {
            None => {
                anchor = Some((c_start, GridCoord::new(0, 0)));
                GridCoord::new(0, 0)
            }
            Some((c0, g0)) => GridCoord::new(
                g0.row + ((c_start.y - c0.y) / pitch_y).round() as i32,
                g0.col + ((c_start.x - c0.x) / pitch_x).round() as i32,
            ),
        };
        coords.insert(start, seed);
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            let here = coords[&node];
            let Some(&c_node) = centroids.get(&node) else {
                continue;
            };
            for neighbor in interlock.neighbours(node) {
                let Some(&c_nb) = centroids.get(&neighbor) else {
                    continue;
                };
                let proposed = here.step(direction_quadrant(&(c_nb - c_node)));
                match coords.get(&neighbor) {
                    Some(&existing) if existing != proposed => {
                        return Err(BuildError::GridInconsistency {
                            piece: neighbor,
                            existing,
                            proposed,
                        });
                    }
                    Some(_) => {}
                    None => {
                        coords.insert(neighbor, proposed);
                        queue.push_back(neighbor);
                    }
                }
            }
        }
    }

    let min_row = coords.values().map(|c| c.row).min().unwrap_or(0);
    let min_col = coords.values().map(|c| c.col).min().unwrap_or(0);
    let mut occupied: BTreeMap<GridCoord, PieceId> = BTreeMap::new();
    for (&id, c) in coords.iter_mut() {
        *c = GridCoord::new(c.row - min_row, c.col - min_col);
        if let Some(&first) = occupied.get(c) {
            return Err(BuildError::GridCellOccupied {
                cell: *c,
                first,
                second: id,
            });
        }
        occupied.insert(*c, id);
    }
    Ok(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jigsaw_core::{BinaryMask, Piece, PieceKind, PieceTemplate};
    use std::sync::Arc;

    fn square(side: usize) -> Arc<PieceTemplate> {
        let mask = BinaryMask {
            width: side,
            height: side,
            data: vec![true; side * side],
        };
        Arc::new(
            PieceTemplate::from_parts(PieceKind::Template, mask, vec![[0, 0, 0]; side * side])
                .expect("square"),
        )
    }

    fn board_at(cells: &[(f32, f32)]) -> Board {
        let t = square(10);
        let mut board = Board::new();
        for &(x, y) in cells {
            board.add_piece(Piece::new(t.clone(), Point2::new(x, y)));
        }
        board
    }

    #[test]
    fn quadrant_prefers_dominant_axis() {
        assert_eq!(
            direction_quadrant(&Vector2::new(5.0, 1.0)),
            NeighborDirection::Right
        );
        assert_eq!(
            direction_quadrant(&Vector2::new(1.0, -5.0)),
            NeighborDirection::Up
        );
    }

    #[test]
    fn two_by_two_grid_gets_row_major_coordinates() {
        // Inserted out of order; coordinates come from geometry.
        let board = board_at(&[(11.0, 11.0), (0.0, 0.0), (11.0, 0.0), (0.0, 11.0)]);
        let info = GridInfo::compute(&board, &GridParams::default(), 200).expect("grid");
        assert_eq!(info.coord(1), Some(GridCoord::new(0, 0)));
        assert_eq!(info.coord(2), Some(GridCoord::new(0, 1)));
        assert_eq!(info.coord(3), Some(GridCoord::new(1, 0)));
        assert_eq!(info.coord(0), Some(GridCoord::new(1, 1)));
        assert_eq!(info.dimensions(), (2, 2));
        assert_eq!(info.piece_at(1, 0), Some(3));
        assert_eq!(info.row_major_ids(), vec![1, 2, 3, 0]);
        assert!(info.is_interlocked(1, 2));
        assert!(!info.is_interlocked(1, 0));
    }

    #[test]
    fn disconnected_piece_is_seeded_by_pitch() {
        // Third piece sits one cell right of a gap.
        let board = board_at(&[(0.0, 0.0), (11.0, 0.0), (33.0, 0.0)]);
        let info = GridInfo::compute(&board, &GridParams::default(), 200).expect("grid");
        assert_eq!(info.coord(0), Some(GridCoord::new(0, 0)));
        assert_eq!(info.coord(1), Some(GridCoord::new(0, 1)));
        assert_eq!(info.coord(2), Some(GridCoord::new(0, 3)));
    }

    #[test]
    fn overlapping_pieces_conflict() {
        // Piece 2 lies right of 0 and directly below 1, while 1 lies right of 0.
        let big = square(10);
        let mut board = Board::new();
        board.add_piece(Piece::new(big.clone(), Point2::new(0.0, 0.0)));
        board.add_piece(Piece::new(big.clone(), Point2::new(11.0, 0.0)));
        board.add_piece(Piece::new(big, Point2::new(12.0, 4.0)));
        let err = GridInfo::compute(&board, &GridParams::default(), 200).unwrap_err();
        assert_eq!(
            err,
            BuildError::GridInconsistency {
                piece: 2,
                existing: GridCoord::new(0, 1),
                proposed: GridCoord::new(1, 1),
            }
        );
    }
}
