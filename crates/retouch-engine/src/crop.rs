use std::io::Cursor;

use image::ImageFormat;
use retouch_contracts::assets::ImageAsset;
use retouch_contracts::EditError;

/// Rectangle in natural image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersects with an image of the given size; `None` when nothing is left.
    pub fn clamp_to(self, image_width: u32, image_height: u32) -> Option<Self> {
        if self.x >= image_width || self.y >= image_height {
            return None;
        }
        let width = self.width.min(image_width - self.x);
        let height = self.height.min(image_height - self.y);
        (width > 0 && height > 0).then(|| Self::new(self.x, self.y, width, height))
    }
}

/// Renders the cropped region as a new PNG asset.
pub fn crop(asset: &ImageAsset, rect: CropRect) -> Result<ImageAsset, EditError> {
    let decoded = image::load_from_memory(asset.bytes())
        .map_err(|err| EditError::Image(format!("{}: {err}", asset.name())))?;
    let Some(rect) = rect.clamp_to(decoded.width(), decoded.height()) else {
        return Err(EditError::InvalidInput(format!(
            "crop area is outside the {}x{} image",
            decoded.width(),
            decoded.height()
        )));
    };
    let cropped = decoded.crop_imm(rect.x, rect.y, rect.width, rect.height);
    let mut encoded = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
        .map_err(|err| EditError::Image(err.to_string()))?;
    Ok(ImageAsset::new(
        format!("cropped_{}.png", asset.stem()),
        "image/png",
        encoded,
    ))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, RgbImage};
    use retouch_contracts::assets::ImageAsset;
    use retouch_contracts::EditError;

    use super::{crop, CropRect};

    fn png(width: u32, height: u32) -> anyhow::Result<ImageAsset> {
        let mut encoded = Vec::new();
        RgbImage::new(width, height).write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)?;
        Ok(ImageAsset::new("scene.png", "image/png", encoded))
    }

    #[test]
    fn crop_produces_png_of_requested_size() -> anyhow::Result<()> {
        let cropped = crop(&png(40, 30)?, CropRect::new(5, 5, 10, 8))?;
        assert_eq!(cropped.name(), "cropped_scene.png");
        assert_eq!(cropped.dimensions()?, (10, 8));
        Ok(())
    }

    #[test]
    fn crop_clamps_to_image_bounds() -> anyhow::Result<()> {
        let cropped = crop(&png(40, 30)?, CropRect::new(30, 20, 100, 100))?;
        assert_eq!(cropped.dimensions()?, (10, 10));
        Ok(())
    }

    #[test]
    fn crop_rejects_empty_or_outside_rects() -> anyhow::Result<()> {
        let image = png(40, 30)?;
        assert!(matches!(
            crop(&image, CropRect::new(40, 0, 5, 5)),
            Err(EditError::InvalidInput(_))
        ));
        assert!(matches!(
            crop(&image, CropRect::new(0, 0, 0, 5)),
            Err(EditError::InvalidInput(_))
        ));
        Ok(())
    }
}
