use jigsaw_core::{PieceKind, DEFAULT_BOUNDARY_SAMPLES};
use serde::{Deserialize, Serialize};

/// Placement tolerances used to decide whether a piece is "in position".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrangementParams {
    /// Largest location error (pixels) still counted as placed.
    pub tau_dist: f32,
    /// Largest orientation error (degrees) still counted as placed.
    pub tau_angle_deg: f32,
}

impl Default for ArrangementParams {
    fn default() -> Self {
        Self {
            tau_dist: 15.0,
            tau_angle_deg: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjacencyParams {
    /// Boundary-to-boundary distance below which two pieces are adjacent.
    pub tau_adj: f32,
    /// Boundary points sampled per piece. Lower counts are faster but may
    /// miss the closest boundary stretch.
    pub boundary_samples: usize,
}

impl Default for AdjacencyParams {
    fn default() -> Self {
        Self {
            tau_adj: 30.0,
            boundary_samples: DEFAULT_BOUNDARY_SAMPLES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    /// Boundary distance for interlocking; much tighter than `tau_adj`.
    pub tau_interlock: f32,
    /// Minimum share of one piece's sampled boundary lying within
    /// `tau_interlock` of the other.
    pub min_contact_fraction: f32,
    /// Reassign ids in row-major grid order after gridding.
    pub reorder: bool,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            tau_interlock: 5.0,
            min_contact_fraction: 0.2,
            reorder: false,
        }
    }
}

/// Everything a builder needs, from segmentation to grid propagation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildParams {
    pub arrangement: ArrangementParams,
    pub adjacency: AdjacencyParams,
    pub grid: GridParams,
    /// Connected components with at most this many pixels are dropped.
    pub area_threshold: usize,
    pub piece_kind: PieceKind,
    /// Regions whose bounding box overlaps an accepted one by more than this
    /// intersection-over-union are discarded as duplicates.
    pub iou_threshold: f32,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            arrangement: ArrangementParams::default(),
            adjacency: AdjacencyParams::default(),
            grid: GridParams::default(),
            area_threshold: 20,
            piece_kind: PieceKind::Template,
            iou_threshold: 0.5,
        }
    }
}
