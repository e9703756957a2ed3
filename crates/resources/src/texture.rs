//! Decoded RGBA8 images ready for upload.

use std::path::Path;

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8, top row first.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decode an image file into RGBA8.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }
        let image = image::open(path)?.to_rgba8();
        let (width, height) = image.dimensions();
        debug!("Loaded texture {} ({}x{})", path.display(), width, height);
        Ok(Self {
            width,
            height,
            pixels: image.into_raw(),
        })
    }

    /// Decode an in-memory encoded image (PNG, JPEG).
    pub fn from_memory(bytes: &[u8]) -> ResourceResult<Self> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        Ok(Self {
            width,
            height,
            pixels: image.into_raw(),
        })
    }

    /// 1x1 texture of a single color.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
        }
    }

    /// Size of the pixel data in bytes.
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    #[test]
    fn test_solid() {
        let t = TextureData::solid([1, 2, 3, 4]);
        assert_eq!((t.width, t.height), (1, 1));
        assert_eq!(t.pixels, vec![1, 2, 3, 4]);
        assert_eq!(t.byte_len(), 4);
    }

    #[test]
    fn test_from_memory_png() {
        let mut img = RgbaImage::new(2, 3);
        img.put_pixel(1, 2, Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let t = TextureData::from_memory(&bytes).unwrap();
        assert_eq!((t.width, t.height), (2, 3));
        assert_eq!(t.byte_len(), 2 * 3 * 4);
        let last = &t.pixels[t.byte_len() - 4..];
        assert_eq!(last, &[10, 20, 30, 255]);
    }

    #[test]
    fn test_missing_file() {
        let err = TextureData::load(Path::new("no/such/texture.png"));
        assert!(matches!(err, Err(ResourceError::FileNotFound(_))));
    }
}
