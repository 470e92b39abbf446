//! Boundary tracing and polyline helpers.

use crate::image::BinaryMask;
use nalgebra::Point2;

/// 8-neighbourhood in clockwise order (image coordinates, y down), starting west.
const RING: [(i64, i64); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

fn ring_index(dx: i64, dy: i64) -> usize {
    RING.iter()
        .position(|&d| d == (dx, dy))
        .unwrap_or(0)
}

/// Trace the outer boundary of the first component of `mask` (raster order).
///
/// Moore-neighbour tracing with 8-connectivity. The returned points are pixel
/// coordinates in traversal order: along the top edge left to right first,
/// then clockwise around the shape. Empty when the mask has no set pixel.
pub fn trace_outer_contour(mask: &BinaryMask) -> Vec<Point2<f32>> {
    let Some(start) = first_set_pixel(mask) else {
        return Vec::new();
    };

    let step = |cur: (i64, i64), back: usize| -> Option<((i64, i64), usize)> {
        for k in 1..=8 {
            let d = (back + k) % 8;
            let nb = (cur.0 + RING[d].0, cur.1 + RING[d].1);
            if mask.get(nb.0, nb.1) {
                let pd = (d + 7) % 8;
                let prev = (cur.0 + RING[pd].0, cur.1 + RING[pd].1);
                let nback = ring_index(prev.0 - nb.0, prev.1 - nb.1);
                return Some((nb, nback));
            }
        }
        None
    };

    let mut pixels = vec![start];
    let mut cur = start;
    // The raster-first pixel always has background to its west.
    let mut back = 0usize;
    let max_steps = 4 * mask.width * mask.height + 16;

    for _ in 0..max_steps {
        let Some((next, nback)) = step(cur, back) else {
            break;
        };
        if cur == start && pixels.len() > 1 && next == pixels[1] {
            break;
        }
        if next != start {
            pixels.push(next);
        }
        cur = next;
        back = nback;
    }

    pixels
        .into_iter()
        .map(|(x, y)| Point2::new(x as f32, y as f32))
        .collect()
}

fn first_set_pixel(mask: &BinaryMask) -> Option<(i64, i64)> {
    let idx = mask.data.iter().position(|&v| v)?;
    Some(((idx % mask.width) as i64, (idx / mask.width) as i64))
}

/// Signed shoelace area of a closed polygon.
pub fn polygon_area(points: &[Point2<f32>]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        acc += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    (acc * 0.5) as f32
}

/// Arithmetic mean of a point set.
pub fn mean_point(points: &[Point2<f32>]) -> Option<Point2<f32>> {
    if points.is_empty() {
        return None;
    }
    let (sx, sy) = points
        .iter()
        .fold((0.0f64, 0.0f64), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
    let n = points.len() as f64;
    Some(Point2::new((sx / n) as f32, (sy / n) as f32))
}

/// Pick `count` points at an even stride; returns all points when there are fewer.
pub fn stride_sample(points: &[Point2<f32>], count: usize) -> Vec<Point2<f32>> {
    if count == 0 || points.len() <= count {
        return points.to_vec();
    }
    (0..count)
        .map(|k| points[k * points.len() / count])
        .collect()
}

/// Resample an open polyline to `count` points equally spaced by arc length.
pub fn resample_polyline(points: &[Point2<f32>], count: usize) -> Vec<Point2<f32>> {
    if points.is_empty() || count == 0 {
        return Vec::new();
    }
    if points.len() == 1 || count == 1 {
        return vec![points[0]; count];
    }

    let mut cumulative = Vec::with_capacity(points.len());
    cumulative.push(0.0f32);
    for w in points.windows(2) {
        let last = *cumulative.last().unwrap_or(&0.0);
        cumulative.push(last + (w[1] - w[0]).norm());
    }
    let total = *cumulative.last().unwrap_or(&0.0);
    if total <= f32::EPSILON {
        return vec![points[0]; count];
    }

    let mut out = Vec::with_capacity(count);
    let mut seg = 0usize;
    for k in 0..count {
        let target = total * k as f32 / (count - 1) as f32;
        while seg + 2 < cumulative.len() && cumulative[seg + 1] < target {
            seg += 1;
        }
        let len = cumulative[seg + 1] - cumulative[seg];
        let t = if len > f32::EPSILON {
            ((target - cumulative[seg]) / len).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let a = points[seg];
        let b = points[seg + 1];
        out.push(a + (b - a) * t);
    }
    out
}

/// Linearly resample a sequence of colour samples to `count` entries.
pub fn resample_colors(samples: &[[f32; 3]], count: usize) -> Vec<[f32; 3]> {
    if samples.is_empty() || count == 0 {
        return Vec::new();
    }
    if samples.len() == 1 || count == 1 {
        return vec![samples[0]; count];
    }
    let scale = (samples.len() - 1) as f32 / (count - 1) as f32;
    (0..count)
        .map(|k| {
            let pos = k as f32 * scale;
            let i = (pos.floor() as usize).min(samples.len() - 2);
            let t = pos - i as f32;
            let a = samples[i];
            let b = samples[i + 1];
            [
                a[0] + (b[0] - a[0]) * t,
                a[1] + (b[1] - a[1]) * t,
                a[2] + (b[2] - a[2]) * t,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square_mask(w: usize, h: usize) -> BinaryMask {
        BinaryMask {
            width: w,
            height: h,
            data: vec![true; w * h],
        }
    }

    #[test]
    fn traces_square_boundary_once() {
        let contour = trace_outer_contour(&square_mask(10, 10));
        // Perimeter pixels of a 10x10 block.
        assert_eq!(contour.len(), 36);
        assert_eq!(contour[0], Point2::new(0.0, 0.0));
        assert_eq!(contour[1], Point2::new(1.0, 0.0));
        assert_relative_eq!(polygon_area(&contour).abs(), 81.0);
    }

    #[test]
    fn traces_degenerate_shapes() {
        assert_eq!(trace_outer_contour(&square_mask(1, 1)).len(), 1);
        assert_eq!(trace_outer_contour(&square_mask(2, 1)).len(), 2);
        assert!(trace_outer_contour(&BinaryMask::new(4, 4)).is_empty());
    }

    #[test]
    fn traversal_goes_clockwise_from_top_left() {
        let contour = trace_outer_contour(&square_mask(4, 3));
        let tr = contour.iter().position(|p| *p == Point2::new(3.0, 0.0));
        let br = contour.iter().position(|p| *p == Point2::new(3.0, 2.0));
        let bl = contour.iter().position(|p| *p == Point2::new(0.0, 2.0));
        assert!(tr < br && br < bl);
    }

    #[test]
    fn resample_polyline_keeps_endpoints() {
        let pts = [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)];
        let out = resample_polyline(&pts, 11);
        assert_eq!(out.len(), 11);
        assert_relative_eq!(out[5].x, 5.0, epsilon = 1e-5);
        assert_relative_eq!(out[10].x, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn stride_sample_caps_count() {
        let pts: Vec<_> = (0..100).map(|i| Point2::new(i as f32, 0.0)).collect();
        assert_eq!(stride_sample(&pts, 10).len(), 10);
        assert_eq!(stride_sample(&pts, 500).len(), 100);
    }
}
