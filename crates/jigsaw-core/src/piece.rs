//! Puzzle pieces: immutable shape/appearance templates plus a mutable pose.

use crate::contour::{mean_point, trace_outer_contour};
use crate::edge::{split_edges, EdgeDescriptor, DEFAULT_FLAT_TOLERANCE};
use crate::image::{BinaryMask, Rgb, RgbImage};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Board-assigned piece identifier.
pub type PieceId = usize;

/// Shape class of a piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PieceKind {
    /// Free-form shape; only the outer contour is described.
    #[default]
    Template,
    /// Four-sided grid piece with per-side edge descriptors.
    Regular,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PieceError {
    #[error("piece mask has no set pixels")]
    EmptyMask,
    #[error("mask is {mask_w}x{mask_h} but image is {image_w}x{image_h}")]
    SizeMismatch {
        mask_w: usize,
        mask_h: usize,
        image_w: usize,
        image_h: usize,
    },
    #[error("appearance has {got} samples, mask has {expected} pixels")]
    AppearanceMismatch { expected: usize, got: usize },
    #[error("piece contour cannot be split into four edges")]
    NotRegular,
}

/// Shape and appearance of a piece in its own (template) frame.
///
/// Built once from a segmented region and never modified afterwards; boards
/// share templates through `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct PieceTemplate {
    kind: PieceKind,
    mask: BinaryMask,
    contour: Vec<Point2<f32>>,
    coords: Vec<[u32; 2]>,
    appearance: Vec<Rgb>,
    centroid: Point2<f32>,
    edges: Option<Box<[EdgeDescriptor; 4]>>,
}

impl PieceTemplate {
    /// Build a template from a region mask and the image patch under it.
    ///
    /// The mask is cropped to its tight bounding box; the returned offset is
    /// the top-left of that box inside the input mask.
    pub fn from_mask_and_image(
        kind: PieceKind,
        mask: &BinaryMask,
        image: &RgbImage,
    ) -> Result<(Self, [usize; 2]), PieceError> {
        if mask.width != image.width || mask.height != image.height {
            return Err(PieceError::SizeMismatch {
                mask_w: mask.width,
                mask_h: mask.height,
                image_w: image.width,
                image_h: image.height,
            });
        }
        let rect = mask.bounding_rect().ok_or(PieceError::EmptyMask)?;
        let tight = mask.crop(rect);
        let patch = image.crop(rect);

        let mut appearance = Vec::with_capacity(tight.count());
        for y in 0..tight.height {
            for x in 0..tight.width {
                if tight.data[y * tight.width + x] {
                    appearance.push(patch.get(x, y).unwrap_or([0, 0, 0]));
                }
            }
        }

        let template = Self::from_parts(kind, tight, appearance)?;
        Ok((template, [rect[0], rect[1]]))
    }

    /// Rebuild a template from a tight mask and row-major appearance samples.
    pub fn from_parts(
        kind: PieceKind,
        mask: BinaryMask,
        appearance: Vec<Rgb>,
    ) -> Result<Self, PieceError> {
        let mut coords = Vec::with_capacity(appearance.len());
        for y in 0..mask.height {
            for x in 0..mask.width {
                if mask.data[y * mask.width + x] {
                    coords.push([x as u32, y as u32]);
                }
            }
        }
        if coords.is_empty() {
            return Err(PieceError::EmptyMask);
        }
        if coords.len() != appearance.len() {
            return Err(PieceError::AppearanceMismatch {
                expected: coords.len(),
                got: appearance.len(),
            });
        }

        let pixel_points: Vec<Point2<f32>> = coords
            .iter()
            .map(|c| Point2::new(c[0] as f32, c[1] as f32))
            .collect();
        let centroid = mean_point(&pixel_points).ok_or(PieceError::EmptyMask)?;
        let contour = trace_outer_contour(&mask);

        let mut template = Self {
            kind,
            mask,
            contour,
            coords,
            appearance,
            centroid,
            edges: None,
        };

        if kind == PieceKind::Regular {
            let edges = split_edges(
                &template.contour,
                template.mask.width,
                template.mask.height,
                DEFAULT_FLAT_TOLERANCE,
                |p| template.color_at(p.x.round() as i64, p.y.round() as i64),
            )
            .ok_or(PieceError::NotRegular)?;
            template.edges = Some(Box::new(edges));
        }

        Ok(template)
    }

    #[inline]
    pub fn kind(&self) -> PieceKind {
        self.kind
    }

    #[inline]
    pub fn mask(&self) -> &BinaryMask {
        &self.mask
    }

    /// Width and height of the tight mask.
    #[inline]
    pub fn size(&self) -> [usize; 2] {
        [self.mask.width, self.mask.height]
    }

    /// Ordered outer boundary in template coordinates.
    #[inline]
    pub fn contour(&self) -> &[Point2<f32>] {
        &self.contour
    }

    /// Set-pixel coordinates `[x, y]`, row-major.
    #[inline]
    pub fn coords(&self) -> &[[u32; 2]] {
        &self.coords
    }

    /// Colour samples, one per entry of [`coords`](Self::coords).
    #[inline]
    pub fn appearance(&self) -> &[Rgb] {
        &self.appearance
    }

    /// Mean of the set pixels in template coordinates.
    #[inline]
    pub fn centroid(&self) -> Point2<f32> {
        self.centroid
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.coords.len()
    }

    /// Edge descriptors; present only for [`PieceKind::Regular`].
    pub fn edges(&self) -> Option<&[EdgeDescriptor; 4]> {
        self.edges.as_deref()
    }

    /// Colour of the set pixel at `(x, y)`, if any.
    pub fn color_at(&self, x: i64, y: i64) -> Option<Rgb> {
        if x < 0 || y < 0 {
            return None;
        }
        let key = [x as u32, y as u32];
        self.coords
            .binary_search_by(|c| (c[1], c[0]).cmp(&(key[1], key[0])))
            .ok()
            .map(|i| self.appearance[i])
    }
}

/// A piece placed on a board.
///
/// `location` is the top-left of the template in board coordinates and
/// `orientation` (degrees) the rotation applied about the template centroid.
#[derive(Clone, Debug)]
pub struct Piece {
    id: PieceId,
    location: Point2<f32>,
    orientation: f32,
    template: Arc<PieceTemplate>,
}

impl Piece {
    /// New piece at `location`. The id is meaningful only once the piece is on a board.
    pub fn new(template: Arc<PieceTemplate>, location: Point2<f32>) -> Self {
        Self {
            id: 0,
            location,
            orientation: 0.0,
            template,
        }
    }

    /// Build a piece from a region mask and image patch whose top-left sits at `location`.
    pub fn from_mask_and_image(
        kind: PieceKind,
        mask: &BinaryMask,
        image: &RgbImage,
        location: Point2<f32>,
    ) -> Result<Self, PieceError> {
        let (template, offset) = PieceTemplate::from_mask_and_image(kind, mask, image)?;
        let location = location + Vector2::new(offset[0] as f32, offset[1] as f32);
        Ok(Self::new(Arc::new(template), location))
    }

    #[inline]
    pub fn id(&self) -> PieceId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: PieceId) {
        self.id = id;
    }

    #[inline]
    pub fn location(&self) -> Point2<f32> {
        self.location
    }

    pub fn set_location(&mut self, location: Point2<f32>) {
        self.location = location;
    }

    /// Place the piece; with `is_center` the point is taken as the template centre.
    pub fn set_placement(&mut self, point: Point2<f32>, is_center: bool) {
        if is_center {
            let [w, h] = self.template.size();
            self.location = point - Vector2::new((w as f32 / 2.0).ceil(), (h as f32 / 2.0).ceil());
        } else {
            self.location = point;
        }
    }

    pub fn translate(&mut self, delta: Vector2<f32>) {
        self.location += delta;
    }

    /// Applied rotation in degrees.
    #[inline]
    pub fn orientation(&self) -> f32 {
        self.orientation
    }

    pub fn set_orientation(&mut self, degrees: f32) {
        self.orientation = wrap_degrees(degrees);
    }

    pub fn rotate_by(&mut self, degrees: f32) {
        self.set_orientation(self.orientation + degrees);
    }

    #[inline]
    pub fn template(&self) -> &Arc<PieceTemplate> {
        &self.template
    }

    #[inline]
    pub fn kind(&self) -> PieceKind {
        self.template.kind()
    }

    /// Bounding-box size of the template.
    pub fn size(&self) -> Vector2<f32> {
        let [w, h] = self.template.size();
        Vector2::new(w as f32, h as f32)
    }

    /// Template centroid in board coordinates.
    pub fn centroid(&self) -> Point2<f32> {
        self.location + self.template.centroid().coords
    }

    /// Map a template-frame point to board coordinates, applying the orientation.
    pub fn to_board(&self, local: Point2<f32>) -> Point2<f32> {
        let c = self.template.centroid();
        let d = local - c;
        let r = rotate(d, self.orientation);
        self.location + c.coords + r
    }

    /// Outer contour in board coordinates.
    pub fn board_contour(&self) -> Vec<Point2<f32>> {
        self.template
            .contour()
            .iter()
            .map(|p| self.to_board(*p))
            .collect()
    }

    /// Write the piece appearance into `canvas`, shifted by `-offset`.
    ///
    /// Pixels falling outside the canvas are dropped.
    pub fn stamp(&self, canvas: &mut RgbImage, offset: Point2<f32>) {
        for (c, color) in self.template.coords().iter().zip(self.template.appearance()) {
            let p = self.to_board(Point2::new(c[0] as f32, c[1] as f32));
            let x = (p.x - offset.x).round();
            let y = (p.y - offset.y).round();
            if x < 0.0 || y < 0.0 {
                continue;
            }
            canvas.put(x as usize, y as usize, *color);
        }
    }
}

/// Rotate a vector by `degrees` (image coordinates, y down).
pub fn rotate(v: Vector2<f32>, degrees: f32) -> Vector2<f32> {
    let (s, c) = degrees.to_radians().sin_cos();
    Vector2::new(c * v.x - s * v.y, s * v.x + c * v.y)
}

/// Wrap an angle to `(-180, 180]` degrees.
pub fn wrap_degrees(degrees: f32) -> f32 {
    let mut a = degrees.rem_euclid(360.0);
    if a > 180.0 {
        a -= 360.0;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn block(w: usize, h: usize, color: Rgb) -> (BinaryMask, RgbImage) {
        (
            BinaryMask {
                width: w,
                height: h,
                data: vec![true; w * h],
            },
            RgbImage::filled(w, h, color),
        )
    }

    #[test]
    fn template_crops_to_tight_box() {
        let mut mask = BinaryMask::new(8, 8);
        for y in 2..5 {
            for x in 3..7 {
                mask.set(x, y, true);
            }
        }
        let image = RgbImage::filled(8, 8, [10, 20, 30]);
        let piece =
            Piece::from_mask_and_image(PieceKind::Template, &mask, &image, Point2::new(100.0, 50.0))
                .expect("piece");
        assert_eq!(piece.template().size(), [4, 3]);
        assert_eq!(piece.location(), Point2::new(103.0, 52.0));
        assert_eq!(piece.template().appearance().len(), 12);
        assert_eq!(piece.template().color_at(1, 1), Some([10, 20, 30]));
        assert_eq!(piece.template().color_at(9, 1), None);
    }

    #[test]
    fn empty_mask_is_rejected() {
        let mask = BinaryMask::new(4, 4);
        let image = RgbImage::new(4, 4);
        assert_eq!(
            PieceTemplate::from_mask_and_image(PieceKind::Template, &mask, &image).unwrap_err(),
            PieceError::EmptyMask
        );
    }

    #[test]
    fn regular_piece_carries_edges() {
        let (mask, image) = block(10, 10, [200, 0, 0]);
        let (t, _) = PieceTemplate::from_mask_and_image(PieceKind::Regular, &mask, &image)
            .expect("regular");
        let edges = t.edges().expect("edges");
        assert_eq!(edges[0].colors[0], [200.0, 0.0, 0.0]);
    }

    #[test]
    fn orientation_wraps_and_rotates_about_centroid() {
        let (mask, image) = block(5, 5, [1, 1, 1]);
        let mut piece =
            Piece::from_mask_and_image(PieceKind::Template, &mask, &image, Point2::origin())
                .expect("piece");
        piece.set_orientation(270.0);
        assert_relative_eq!(piece.orientation(), -90.0);
        let c = piece.centroid();
        let mapped = piece.to_board(piece.template().centroid());
        assert_relative_eq!(mapped.x, c.x, epsilon = 1e-5);
        assert_relative_eq!(mapped.y, c.y, epsilon = 1e-5);
        // (4, 2) is 2px right of the centroid; -90 degrees sends it 2px up.
        let p = piece.to_board(Point2::new(4.0, 2.0));
        assert_relative_eq!(p.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn center_placement_uses_half_size() {
        let (mask, image) = block(5, 4, [1, 1, 1]);
        let mut piece =
            Piece::from_mask_and_image(PieceKind::Template, &mask, &image, Point2::origin())
                .expect("piece");
        piece.set_placement(Point2::new(10.0, 10.0), true);
        assert_eq!(piece.location(), Point2::new(7.0, 8.0));
    }
}
