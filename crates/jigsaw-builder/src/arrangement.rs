//! Calibration layout plus optionally attached adjacency and grid structure.

use jigsaw_core::{wrap_degrees, BinaryMask, Board, Piece, PieceId, RgbImage};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::adjacency::AdjacencyInfo;
use crate::error::BuildError;
use crate::grid::GridInfo;
use crate::params::{ArrangementParams, BuildParams};
use crate::segment::{suppress_duplicates, ImageProcessor, LayerSegmenter, Region, Segmenter};

/// How much structure a builder derives from the calibration board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuildLevel {
    /// Board and placement tolerances only.
    #[default]
    Arrangement,
    /// Plus the adjacency matrix.
    Adjacent,
    /// Plus interlocking and grid coordinates.
    Gridded,
}

/// A calibrated solution layout.
///
/// Adjacency and grid structure are computed once at construction and are not
/// refreshed if the board is later changed through [`Arrangement::solution_mut`].
#[derive(Clone, Debug)]
pub struct Arrangement {
    solution: Board,
    params: ArrangementParams,
    adjacency: Option<AdjacencyInfo>,
    grid: Option<GridInfo>,
}

impl Arrangement {
    pub fn new(solution: Board, params: ArrangementParams) -> Self {
        Self {
            solution,
            params,
            adjacency: None,
            grid: None,
        }
    }

    /// Arrangement with the adjacency matrix attached.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(pieces = solution.len()))
    )]
    pub fn adjacent(solution: Board, params: &BuildParams) -> Result<Self, BuildError> {
        let adjacency = AdjacencyInfo::compute(&solution, &params.adjacency)?;
        Ok(Self {
            adjacency: Some(adjacency),
            ..Self::new(solution, params.arrangement.clone())
        })
    }

    /// Arrangement with adjacency, interlocking and grid coordinates attached.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(pieces = solution.len()))
    )]
    pub fn gridded(solution: Board, params: &BuildParams) -> Result<Self, BuildError> {
        let samples = params.adjacency.boundary_samples;
        let mut grid = GridInfo::compute(&solution, &params.grid, samples)?;
        let solution = if params.grid.reorder {
            let reordered = renumber(&solution, &grid.row_major_ids())?;
            grid = GridInfo::compute(&reordered, &params.grid, samples)?;
            reordered
        } else {
            solution
        };
        let adjacency = AdjacencyInfo::compute(&solution, &params.adjacency)?;
        Ok(Self {
            solution,
            params: params.arrangement.clone(),
            adjacency: Some(adjacency),
            grid: Some(grid),
        })
    }

    pub fn build(
        solution: Board,
        params: &BuildParams,
        level: BuildLevel,
    ) -> Result<Self, BuildError> {
        match level {
            BuildLevel::Arrangement => Ok(Self::new(solution, params.arrangement.clone())),
            BuildLevel::Adjacent => Self::adjacent(solution, params),
            BuildLevel::Gridded => Self::gridded(solution, params),
        }
    }

    /// Turn segmented regions into pieces on a fresh board and build on it.
    pub fn from_regions(
        regions: Vec<Region>,
        params: &BuildParams,
        level: BuildLevel,
    ) -> Result<Self, BuildError> {
        let board = board_from_regions(regions, params)?;
        Self::build(board, params, level)
    }

    /// Segment with the default [`LayerSegmenter`], then build.
    pub fn from_image_and_mask(
        image: &RgbImage,
        mask: &BinaryMask,
        params: &BuildParams,
        level: BuildLevel,
    ) -> Result<Self, BuildError> {
        let segmenter = LayerSegmenter::new(params.area_threshold);
        Self::from_image_and_mask_with(image, mask, &segmenter, params, level)
    }

    pub fn from_image_and_mask_with(
        image: &RgbImage,
        mask: &BinaryMask,
        segmenter: &dyn Segmenter,
        params: &BuildParams,
        level: BuildLevel,
    ) -> Result<Self, BuildError> {
        let regions = segmenter.segment(image, mask)?;
        Self::from_regions(regions, params, level)
    }

    /// Derive the mask with `processor`, then segment and build.
    pub fn from_image_processing(
        image: &RgbImage,
        processor: &dyn ImageProcessor,
        segmenter: Option<&dyn Segmenter>,
        params: &BuildParams,
        level: BuildLevel,
    ) -> Result<Self, BuildError> {
        let mask = processor.process(image);
        match segmenter {
            Some(s) => Self::from_image_and_mask_with(image, &mask, s, params, level),
            None => Self::from_image_and_mask(image, &mask, params, level),
        }
    }

    pub fn level(&self) -> BuildLevel {
        if self.grid.is_some() {
            BuildLevel::Gridded
        } else if self.adjacency.is_some() {
            BuildLevel::Adjacent
        } else {
            BuildLevel::Arrangement
        }
    }

    #[inline]
    pub fn solution(&self) -> &Board {
        &self.solution
    }

    /// Mutable access to the board. Derived structure is not recomputed.
    pub fn solution_mut(&mut self) -> &mut Board {
        &mut self.solution
    }

    pub fn into_solution(self) -> Board {
        self.solution
    }

    #[inline]
    pub fn params(&self) -> &ArrangementParams {
        &self.params
    }

    pub fn adjacency(&self) -> Option<&AdjacencyInfo> {
        self.adjacency.as_ref()
    }

    pub fn grid(&self) -> Option<&GridInfo> {
        self.grid.as_ref()
    }

    pub(crate) fn from_parts(
        solution: Board,
        params: ArrangementParams,
        adjacency: Option<AdjacencyInfo>,
        grid: Option<GridInfo>,
    ) -> Self {
        Self {
            solution,
            params,
            adjacency,
            grid,
        }
    }

    /// Mean location error over `(measured, solution)` id pairs.
    ///
    /// Pairs naming unknown pieces are skipped; `None` if nothing remains.
    pub fn distance_error(&self, measured: &Board, pairs: &[(PieceId, PieceId)]) -> Option<f32> {
        let errors: Vec<f32> = self
            .resolve(measured, pairs)
            .map(|(m, s)| (m.location() - s.location()).norm())
            .collect();
        if errors.is_empty() {
            return None;
        }
        Some(errors.iter().sum::<f32>() / errors.len() as f32)
    }

    /// Number of pairs within both placement tolerances.
    pub fn pieces_in_place(&self, measured: &Board, pairs: &[(PieceId, PieceId)]) -> usize {
        self.resolve(measured, pairs)
            .filter(|(m, s)| {
                (m.location() - s.location()).norm() < self.params.tau_dist
                    && wrap_degrees(m.orientation() - s.orientation()).abs()
                        < self.params.tau_angle_deg
            })
            .count()
    }

    fn resolve<'a>(
        &'a self,
        measured: &'a Board,
        pairs: &'a [(PieceId, PieceId)],
    ) -> impl Iterator<Item = (&'a Piece, &'a Piece)> + 'a {
        pairs
            .iter()
            .filter_map(move |&(m, s)| Some((measured.get(m)?, self.solution.get(s)?)))
    }
}

/// Pieces from regions, after duplicate suppression, inserted in region order.
pub fn board_from_regions(regions: Vec<Region>, params: &BuildParams) -> Result<Board, BuildError> {
    let regions = suppress_duplicates(regions, params.iou_threshold);
    let mut board = Board::new();
    for region in regions {
        let location = Point2::new(region.offset[0] as f32, region.offset[1] as f32);
        let piece =
            Piece::from_mask_and_image(params.piece_kind, &region.mask, &region.patch, location)?;
        board.add_piece(piece);
    }
    log::info!("built board with {} pieces", board.len());
    Ok(board)
}

/// Copy of `board` with fresh ids assigned in `order`.
fn renumber(board: &Board, order: &[PieceId]) -> Result<Board, BuildError> {
    let mut out = Board::new();
    for &id in order {
        let piece = board
            .get(id)
            .ok_or(jigsaw_core::BoardError::UnknownPiece(id))?;
        out.add_piece(piece.clone());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridCoord;
    use crate::params::GridParams;
    use jigsaw_core::PieceKind;

    fn paint(mask: &mut BinaryMask, image: &mut RgbImage, rect: [usize; 4], color: [u8; 3]) {
        for y in rect[1]..rect[3] {
            for x in rect[0]..rect[2] {
                mask.set(x, y, true);
                image.put(x, y, color);
            }
        }
    }

    fn two_by_two() -> (RgbImage, BinaryMask) {
        let mut mask = BinaryMask::new(30, 30);
        let mut image = RgbImage::new(30, 30);
        paint(&mut mask, &mut image, [13, 13, 23, 23], [40, 40, 40]);
        paint(&mut mask, &mut image, [13, 2, 23, 12], [80, 80, 80]);
        paint(&mut mask, &mut image, [2, 2, 12, 12], [120, 120, 120]);
        paint(&mut mask, &mut image, [2, 13, 12, 23], [160, 160, 160]);
        (image, mask)
    }

    #[test]
    fn builds_from_image_and_mask() {
        let (image, mask) = two_by_two();
        let params = BuildParams::default();
        let a = Arrangement::from_image_and_mask(&image, &mask, &params, BuildLevel::Arrangement)
            .expect("build");
        assert_eq!(a.level(), BuildLevel::Arrangement);
        assert_eq!(a.solution().len(), 4);
        // Raster order of the components' first pixels.
        let first = a.solution().get(0).expect("piece 0");
        assert_eq!(first.location(), Point2::new(2.0, 2.0));
        assert!(a.adjacency().is_none() && a.grid().is_none());
    }

    #[test]
    fn gridded_reorder_renumbers_row_major() {
        let (image, mask) = two_by_two();
        let params = BuildParams {
            grid: GridParams {
                reorder: true,
                ..GridParams::default()
            },
            ..BuildParams::default()
        };
        let a = Arrangement::from_image_and_mask(&image, &mask, &params, BuildLevel::Gridded)
            .expect("build");
        let grid = a.grid().expect("grid");
        assert_eq!(grid.coord(0), Some(GridCoord::new(0, 0)));
        assert_eq!(grid.coord(1), Some(GridCoord::new(0, 1)));
        assert_eq!(grid.coord(2), Some(GridCoord::new(1, 0)));
        assert_eq!(grid.coord(3), Some(GridCoord::new(1, 1)));
        assert_eq!(
            a.solution().get(0).expect("piece").location(),
            Point2::new(2.0, 2.0)
        );
        assert!(a.adjacency().expect("adjacency").is_adjacent(0, 3));
    }

    #[test]
    fn placement_scoring() {
        let (image, mask) = two_by_two();
        let a = Arrangement::from_image_and_mask(
            &image,
            &mask,
            &BuildParams::default(),
            BuildLevel::Arrangement,
        )
        .expect("build");
        let mut measured = a.solution().clone();
        measured
            .get_mut(1)
            .expect("piece")
            .translate(nalgebra::Vector2::new(30.0, 40.0));
        let pairs = [(0, 0), (1, 1), (2, 2), (3, 3)];
        let err = a.distance_error(&measured, &pairs).expect("pairs");
        assert!((err - 12.5).abs() < 1e-4);
        assert_eq!(a.pieces_in_place(&measured, &pairs), 3);
        assert_eq!(a.distance_error(&measured, &[(9, 9)]), None);
    }

    #[test]
    fn regular_pieces_from_mask() {
        let (image, mask) = two_by_two();
        let params = BuildParams {
            piece_kind: PieceKind::Regular,
            ..BuildParams::default()
        };
        let a = Arrangement::from_image_and_mask(&image, &mask, &params, BuildLevel::Adjacent)
            .expect("build");
        assert!(a.solution().iter().all(|p| p.template().edges().is_some()));
    }
}
