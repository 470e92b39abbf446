//! Id-indexed piece collections with spatial queries.

use std::collections::BTreeMap;

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::contour::stride_sample;
use crate::image::RgbImage;
use crate::piece::{Piece, PieceId};

/// Boundary points sampled per piece by [`Board::test_adjacent`].
pub const DEFAULT_BOUNDARY_SAMPLES: usize = 200;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error("board has no pieces")]
    Empty,
    #[error("canvas is {got:?} but board extents need {needed:?}")]
    CanvasTooSmall { needed: [usize; 2], got: [usize; 2] },
    #[error("no piece with id {0}")]
    UnknownPiece(PieceId),
    #[error("piece id {0} appears more than once")]
    DuplicateId(PieceId),
    #[error("piece id {0} leaves no room for the next id")]
    IdOverflow(PieceId),
    #[error("index {index} is out of range for a board of {len} pieces")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Axis-aligned box `min .. max` in board coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point2<f32>,
    pub max: Point2<f32>,
}

impl BoundingBox {
    #[inline]
    pub fn extents(&self) -> Vector2<f32> {
        self.max - self.min
    }

    pub fn contains(&self, p: Point2<f32>) -> bool {
        p.x >= self.min.x && p.y >= self.min.y && p.x <= self.max.x && p.y <= self.max.y
    }
}

/// Ordered collection of pieces with a board-owned, monotonic id counter.
#[derive(Clone, Debug, Default)]
pub struct Board {
    pieces: Vec<Piece>,
    next_id: PieceId,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a board from pieces that already carry ids (e.g. a persisted
    /// calibration). The counter resumes after the largest id.
    pub fn restore(pieces: Vec<(PieceId, Piece)>) -> Result<Self, BoardError> {
        let mut board = Board::new();
        for (id, mut piece) in pieces {
            if board.contains(id) {
                return Err(BoardError::DuplicateId(id));
            }
            let after = id.checked_add(1).ok_or(BoardError::IdOverflow(id))?;
            piece.set_id(id);
            board.next_id = board.next_id.max(after);
            board.pieces.push(piece);
        }
        Ok(board)
    }

    /// Insert a piece, assigning it the next id. Returns that id.
    pub fn add_piece(&mut self, mut piece: Piece) -> PieceId {
        let id = self.next_id;
        self.next_id += 1;
        piece.set_id(id);
        self.pieces.push(piece);
        id
    }

    /// Remove the piece with `id`, returning it. Absent ids are a no-op.
    pub fn remove_piece(&mut self, id: PieceId) -> Option<Piece> {
        let pos = self.pieces.iter().position(|p| p.id() == id)?;
        Some(self.pieces.remove(pos))
    }

    /// Drop every piece and reset the id counter.
    pub fn clear(&mut self) {
        self.pieces.clear();
        self.next_id = 0;
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.pieces.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Id the next inserted piece will receive.
    #[inline]
    pub fn next_id(&self) -> PieceId {
        self.next_id
    }

    pub fn contains(&self, id: PieceId) -> bool {
        self.pieces.iter().any(|p| p.id() == id)
    }

    pub fn get(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.id() == id)
    }

    pub fn get_mut(&mut self, id: PieceId) -> Option<&mut Piece> {
        self.pieces.iter_mut().find(|p| p.id() == id)
    }

    /// Piece at insertion position `index`.
    pub fn at(&self, index: usize) -> Option<&Piece> {
        self.pieces.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Piece> {
        self.pieces.iter()
    }

    pub fn ids(&self) -> Vec<PieceId> {
        self.pieces.iter().map(Piece::id).collect()
    }

    /// Componentwise `min(location) .. max(location + size)`.
    pub fn bounding_box(&self) -> Result<BoundingBox, BoardError> {
        let first = self.pieces.first().ok_or(BoardError::Empty)?;
        let mut min = first.location();
        let mut max = first.location() + first.size();
        for p in &self.pieces[1..] {
            let lo = p.location();
            let hi = lo + p.size();
            min = Point2::new(min.x.min(lo.x), min.y.min(lo.y));
            max = Point2::new(max.x.max(hi.x), max.y.max(hi.y));
        }
        Ok(BoundingBox { min, max })
    }

    pub fn extents(&self) -> Result<Vector2<f32>, BoardError> {
        Ok(self.bounding_box()?.extents())
    }

    pub fn piece_locations(&self) -> BTreeMap<PieceId, Point2<f32>> {
        self.pieces.iter().map(|p| (p.id(), p.location())).collect()
    }

    /// New board holding the pieces at the given insertion positions, in that
    /// order. Ids and templates are kept.
    ///
    /// Templates are shared with `self` but each pose is copied: moving or
    /// rotating a piece on the subset leaves this board unchanged.
    pub fn subset(&self, indices: &[usize]) -> Result<Board, BoardError> {
        let mut pieces = Vec::with_capacity(indices.len());
        for &i in indices {
            let piece = self.pieces.get(i).ok_or(BoardError::IndexOutOfRange {
                index: i,
                len: self.pieces.len(),
            })?;
            pieces.push((piece.id(), piece.clone()));
        }
        Board::restore(pieces)
    }

    /// New board holding the pieces with the given ids, in that order.
    ///
    /// As with [`Board::subset`], pose changes on the result do not reach `self`.
    pub fn select(&self, ids: &[PieceId]) -> Result<Board, BoardError> {
        let mut pieces = Vec::with_capacity(ids.len());
        for &id in ids {
            let piece = self.get(id).ok_or(BoardError::UnknownPiece(id))?;
            pieces.push((id, piece.clone()));
        }
        Board::restore(pieces)
    }

    /// Evenly strided boundary points of piece `id` in board coordinates.
    pub fn boundary_samples(
        &self,
        id: PieceId,
        count: usize,
    ) -> Result<Vec<Point2<f32>>, BoardError> {
        let piece = self.get(id).ok_or(BoardError::UnknownPiece(id))?;
        Ok(stride_sample(&piece.board_contour(), count))
    }

    /// Whether the sampled boundaries of pieces `a` and `b` come closer than `tau`.
    pub fn test_adjacent(&self, a: PieceId, b: PieceId, tau: f32) -> Result<bool, BoardError> {
        self.test_adjacent_with(a, b, tau, DEFAULT_BOUNDARY_SAMPLES)
    }

    /// [`test_adjacent`](Self::test_adjacent) with an explicit sample count.
    ///
    /// Sampling can miss the closest boundary stretch of long contours, so
    /// small counts may under-report adjacency.
    pub fn test_adjacent_with(
        &self,
        a: PieceId,
        b: PieceId,
        tau: f32,
        samples: usize,
    ) -> Result<bool, BoardError> {
        let pa = self.boundary_samples(a, samples)?;
        let pb = self.boundary_samples(b, samples)?;
        Ok(min_distance(&pa, &pb).is_some_and(|d| d < tau))
    }

    /// Piece whose centroid is nearest `point`.
    pub fn closest_piece(&self, point: Point2<f32>) -> Option<&Piece> {
        self.pieces.iter().min_by(|a, b| {
            let da = (a.centroid() - point).norm_squared();
            let db = (b.centroid() - point).norm_squared();
            da.total_cmp(&db)
        })
    }

    /// Pieces whose centroid lies within `radius` of `point`, in board order.
    pub fn pieces_within(&self, point: Point2<f32>, radius: f32) -> Vec<&Piece> {
        let r2 = radius * radius;
        self.pieces
            .iter()
            .filter(|p| (p.centroid() - point).norm_squared() <= r2)
            .collect()
    }

    /// Composite every piece into `canvas` at `location - bounding_box.min`.
    pub fn stamp_into(&self, canvas: &mut RgbImage) -> Result<(), BoardError> {
        let bbox = self.bounding_box()?;
        let needed = canvas_size(bbox.extents());
        if canvas.width < needed[0] || canvas.height < needed[1] {
            return Err(BoardError::CanvasTooSmall {
                needed,
                got: [canvas.width, canvas.height],
            });
        }
        for piece in &self.pieces {
            piece.stamp(canvas, bbox.min);
        }
        Ok(())
    }

    /// Render onto a black canvas exactly as large as the board extents.
    pub fn to_image(&self) -> Result<RgbImage, BoardError> {
        let [w, h] = canvas_size(self.extents()?);
        let mut canvas = RgbImage::new(w, h);
        self.stamp_into(&mut canvas)?;
        Ok(canvas)
    }
}

impl<'a> IntoIterator for &'a Board {
    type Item = &'a Piece;
    type IntoIter = std::slice::Iter<'a, Piece>;

    fn into_iter(self) -> Self::IntoIter {
        self.pieces.iter()
    }
}

fn canvas_size(extents: Vector2<f32>) -> [usize; 2] {
    [
        extents.x.ceil().max(0.0) as usize,
        extents.y.ceil().max(0.0) as usize,
    ]
}

/// Smallest pairwise distance between two point sets.
pub fn min_distance(a: &[Point2<f32>], b: &[Point2<f32>]) -> Option<f32> {
    let mut best: Option<f32> = None;
    for p in a {
        for q in b {
            let d = (p - q).norm_squared();
            if best.is_none_or(|bd| d < bd) {
                best = Some(d);
            }
        }
    }
    best.map(f32::sqrt)
}
