//! Conversions between `image` buffers and the core raster types.

use std::path::Path;

use jigsaw_core::{BinaryMask, RgbImage};

#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Image(#[from] ::image::ImageError),
    #[error("invalid raster dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },
}

pub fn rgb_from_image(img: &::image::RgbImage) -> RgbImage {
    RgbImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

/// Pixels with a gray level above `level` are set.
pub fn mask_from_gray(img: &::image::GrayImage, level: u8) -> BinaryMask {
    BinaryMask {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().iter().map(|&v| v > level).collect(),
    }
}

pub fn rgb_to_image(img: &RgbImage) -> Result<::image::RgbImage, ConvertError> {
    let invalid = || ConvertError::InvalidDimensions {
        width: img.width,
        height: img.height,
    };
    let width = u32::try_from(img.width).map_err(|_| invalid())?;
    let height = u32::try_from(img.height).map_err(|_| invalid())?;
    ::image::RgbImage::from_raw(width, height, img.data.clone()).ok_or_else(invalid)
}

pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage, ConvertError> {
    let img = ::image::open(path)?.to_rgb8();
    Ok(rgb_from_image(&img))
}

pub fn load_mask(path: impl AsRef<Path>, level: u8) -> Result<BinaryMask, ConvertError> {
    let img = ::image::open(path)?.to_luma8();
    Ok(mask_from_gray(&img, level))
}

pub fn save_rgb(img: &RgbImage, path: impl AsRef<Path>) -> Result<(), ConvertError> {
    rgb_to_image(img)?.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_round_trips_through_image_buffer() {
        let mut img = RgbImage::new(3, 2);
        img.put(2, 1, [10, 20, 30]);
        let back = rgb_from_image(&rgb_to_image(&img).unwrap());
        assert_eq!(back, img);
    }

    #[test]
    fn gray_threshold_is_strict() {
        let gray = ::image::GrayImage::from_raw(3, 1, vec![0, 127, 128]).unwrap();
        let mask = mask_from_gray(&gray, 127);
        assert_eq!(mask.data, vec![false, false, true]);
    }
}
