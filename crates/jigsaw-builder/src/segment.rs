//! Turning an image plus foreground mask into discrete piece regions.

use std::collections::VecDeque;

use jigsaw_core::{luma, BinaryMask, RgbImage};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SegmentError {
    #[error("image is {image:?} but mask is {mask:?}")]
    SizeMismatch { image: [usize; 2], mask: [usize; 2] },
}

/// One segmented region, cropped to its bounding box.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    /// Region pixels only; other regions sharing the box are cleared.
    pub mask: BinaryMask,
    pub patch: RgbImage,
    /// Top-left of the box in the source image.
    pub offset: [usize; 2],
    /// `[x0, y0, x1, y1)` in the source image.
    pub bbox: [usize; 4],
}

impl Region {
    pub fn area(&self) -> usize {
        self.mask.count()
    }
}

/// External segmentation step: image and foreground mask in, disjoint regions out.
pub trait Segmenter {
    fn segment(&self, image: &RgbImage, mask: &BinaryMask) -> Result<Vec<Region>, SegmentError>;
}

/// Optional pre-processing producing the foreground mask from the image.
pub trait ImageProcessor {
    fn process(&self, image: &RgbImage) -> BinaryMask;
}

/// Labels 8-connected foreground components in raster order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSegmenter {
    /// Components with at most this many pixels are dropped.
    pub area_threshold: usize,
}

impl Default for LayerSegmenter {
    fn default() -> Self {
        Self { area_threshold: 20 }
    }
}

impl LayerSegmenter {
    pub fn new(area_threshold: usize) -> Self {
        Self { area_threshold }
    }
}

impl Segmenter for LayerSegmenter {
    fn segment(&self, image: &RgbImage, mask: &BinaryMask) -> Result<Vec<Region>, SegmentError> {
        if image.width != mask.width || image.height != mask.height {
            return Err(SegmentError::SizeMismatch {
                image: [image.width, image.height],
                mask: [mask.width, mask.height],
            });
        }

        let (w, h) = (mask.width, mask.height);
        let mut labels = vec![0usize; w * h];
        let mut regions = Vec::new();
        let mut next_label = 1usize;
        let mut queue = VecDeque::new();

        for start in 0..w * h {
            if !mask.data[start] || labels[start] != 0 {
                continue;
            }
            let label = next_label;
            next_label += 1;
            labels[start] = label;
            queue.push_back(start);
            let mut pixels = Vec::new();

            while let Some(idx) = queue.pop_front() {
                pixels.push(idx);
                let (x, y) = ((idx % w) as i64, (idx / w) as i64);
                for dy in -1..=1i64 {
                    for dx in -1..=1i64 {
                        let (nx, ny) = (x + dx, y + dy);
                        if !mask.get(nx, ny) {
                            continue;
                        }
                        let n = ny as usize * w + nx as usize;
                        if labels[n] == 0 {
                            labels[n] = label;
                            queue.push_back(n);
                        }
                    }
                }
            }

            if pixels.len() <= self.area_threshold {
                log::debug!(
                    "dropping component of {} px (threshold {})",
                    pixels.len(),
                    self.area_threshold
                );
                continue;
            }
            regions.push(crop_region(image, &pixels, w));
        }

        Ok(regions)
    }
}

fn crop_region(image: &RgbImage, pixels: &[usize], width: usize) -> Region {
    let mut bbox = [usize::MAX, usize::MAX, 0, 0];
    for &idx in pixels {
        let (x, y) = (idx % width, idx / width);
        bbox[0] = bbox[0].min(x);
        bbox[1] = bbox[1].min(y);
        bbox[2] = bbox[2].max(x + 1);
        bbox[3] = bbox[3].max(y + 1);
    }
    let mut mask = BinaryMask::new(bbox[2] - bbox[0], bbox[3] - bbox[1]);
    for &idx in pixels {
        mask.set(idx % width - bbox[0], idx / width - bbox[1], true);
    }
    Region {
        mask,
        patch: image.crop(bbox),
        offset: [bbox[0], bbox[1]],
        bbox,
    }
}

/// Foreground = pixels whose luma is above `level` (or below, with `invert`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdProcessor {
    pub level: f32,
    pub invert: bool,
}

impl Default for ThresholdProcessor {
    fn default() -> Self {
        Self {
            level: 20.0,
            invert: false,
        }
    }
}

impl ImageProcessor for ThresholdProcessor {
    fn process(&self, image: &RgbImage) -> BinaryMask {
        let mut mask = BinaryMask::new(image.width, image.height);
        for y in 0..image.height {
            for x in 0..image.width {
                let Some(c) = image.get(x, y) else { continue };
                let above = luma(c) > self.level;
                mask.set(x, y, above != self.invert);
            }
        }
        mask
    }
}

/// Intersection over union of two `[x0, y0, x1, y1)` boxes.
pub fn bbox_iou(a: [usize; 4], b: [usize; 4]) -> f32 {
    let ix = a[2].min(b[2]).saturating_sub(a[0].max(b[0]));
    let iy = a[3].min(b[3]).saturating_sub(a[1].max(b[1]));
    let inter = (ix * iy) as f32;
    let area = |r: [usize; 4]| ((r[2] - r[0]) * (r[3] - r[1])) as f32;
    let union = area(a) + area(b) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Keep regions in order, dropping any whose box overlaps an already kept one
/// by more than `iou_threshold`.
pub fn suppress_duplicates(regions: Vec<Region>, iou_threshold: f32) -> Vec<Region> {
    let mut kept: Vec<Region> = Vec::with_capacity(regions.len());
    for region in regions {
        if let Some(other) = kept
            .iter()
            .find(|k| bbox_iou(k.bbox, region.bbox) > iou_threshold)
        {
            log::warn!(
                "suppressing region {:?}: overlaps region {:?}",
                region.bbox,
                other.bbox
            );
            continue;
        }
        kept.push(region);
    }
    kept
}
