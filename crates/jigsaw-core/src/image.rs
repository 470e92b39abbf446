use serde::{Deserialize, Serialize};

/// One RGB pixel.
pub type Rgb = [u8; 3];

/// Row-major binary mask.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryMask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>, // row-major, len = w*h
}

impl BinaryMask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![false; width * height],
        }
    }

    /// Build a mask from a byte buffer, treating every non-zero byte as set.
    pub fn from_u8(width: usize, height: usize, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != width.checked_mul(height)? {
            return None;
        }
        Some(Self {
            width,
            height,
            data: bytes.iter().map(|&b| b != 0).collect(),
        })
    }

    #[inline]
    pub fn get(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.data[y as usize * self.width + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Tight bounding box of the set pixels as `[x0, y0, x1, y1)` (exclusive max).
    pub fn bounding_rect(&self) -> Option<[usize; 4]> {
        let mut rect: Option<[usize; 4]> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.data[y * self.width + x] {
                    continue;
                }
                rect = Some(match rect {
                    None => [x, y, x + 1, y + 1],
                    Some([x0, y0, x1, y1]) => [x0.min(x), y0.min(y), x1.max(x + 1), y1.max(y + 1)],
                });
            }
        }
        rect
    }

    /// Copy the `[x0, y0, x1, y1)` window into a new mask.
    pub fn crop(&self, rect: [usize; 4]) -> BinaryMask {
        let [x0, y0, x1, y1] = rect;
        let w = x1.saturating_sub(x0);
        let h = y1.saturating_sub(y0);
        let mut out = BinaryMask::new(w, h);
        for y in 0..h {
            for x in 0..w {
                out.data[y * w + x] = self.get((x0 + x) as i64, (y0 + y) as i64);
            }
        }
        out
    }
}

/// Row-major 8-bit RGB image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>, // row-major, len = w*h*3
}

impl RgbImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    /// Image filled with a single colour.
    pub fn filled(width: usize, height: usize, color: Rgb) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        if data.len() != width.checked_mul(height)?.checked_mul(3)? {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 3;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    #[inline]
    pub fn put(&mut self, x: usize, y: usize, color: Rgb) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&color);
    }

    /// Copy the `[x0, y0, x1, y1)` window into a new image.
    pub fn crop(&self, rect: [usize; 4]) -> RgbImage {
        let [x0, y0, x1, y1] = rect;
        let w = x1.saturating_sub(x0);
        let h = y1.saturating_sub(y0);
        let mut out = RgbImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                if let Some(c) = self.get(x0 + x, y0 + y) {
                    out.put(x, y, c);
                }
            }
        }
        out
    }

    /// ITU-R 601 luma of a pixel.
    #[inline]
    pub fn luma(&self, x: usize, y: usize) -> Option<f32> {
        self.get(x, y).map(luma)
    }
}

#[inline]
pub fn luma(c: Rgb) -> f32 {
    0.299 * c[0] as f32 + 0.587 * c[1] as f32 + 0.114 * c[2] as f32
}

/// Euclidean distance between two colours in RGB space.
#[inline]
pub fn color_distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    (dr * dr + dg * dg + db * db).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_rect_is_tight() {
        let mut m = BinaryMask::new(8, 6);
        m.set(2, 1, true);
        m.set(5, 4, true);
        assert_eq!(m.bounding_rect(), Some([2, 1, 6, 5]));
        assert_eq!(BinaryMask::new(3, 3).bounding_rect(), None);
    }

    #[test]
    fn crop_keeps_pixels() {
        let mut img = RgbImage::new(4, 4);
        img.put(2, 3, [1, 2, 3]);
        let c = img.crop([1, 2, 4, 4]);
        assert_eq!(c.width, 3);
        assert_eq!(c.height, 2);
        assert_eq!(c.get(1, 1), Some([1, 2, 3]));
    }
}
