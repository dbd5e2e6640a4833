use std::path::Path;

use crate::core::error::{Error, Result};

pub const OPAQUE: u8 = 0xff;

/// RGBA8 image buffer with bounds-checked `[u8; 4]` pixel access.
///
/// Source images are forced fully opaque on load; diff crops keep their
/// stored alpha (zero alpha marks an unchanged pixel, not transparency).
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Raster {
    /// Wrap a raw RGBA8 buffer. The buffer length must be `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(Error::InvalidInput(format!(
                "rgba buffer is {} bytes, {}x{} needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Raster {
            width,
            height,
            data,
        })
    }

    /// Zero-filled raster (every pixel is the (0,0,0,0) sentinel).
    pub fn zeroed(width: u32, height: u32) -> Self {
        Raster {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    /// Decode an image file to RGBA8, keeping the stored alpha channel.
    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path).map_err(|e| Error::read(path, e))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Raster {
            width,
            height,
            data: rgba.into_raw(),
        })
    }

    /// Decode a source image to RGBA8 with every alpha sample forced opaque.
    pub fn load_opaque(path: &Path) -> Result<Self> {
        let mut raster = Self::load(path)?;
        for px in raster.data.chunks_exact_mut(4) {
            px[3] = OPAQUE;
        }
        Ok(raster)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.index(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let i = self.index(x, y);
        self.data[i..i + 4].copy_from_slice(&px);
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Encode to PNG in memory. The byte length is the encoding cost; the
    /// same bytes are what `write_png` puts on disk.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            &self.data,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| {
            Error::InvalidInput(format!(
                "png encode failed for {}x{} raster: {}",
                self.width, self.height, e
            ))
        })?;
        Ok(buf)
    }

    pub fn write_png(&self, path: &Path) -> Result<()> {
        let bytes = self.encode_png()?;
        std::fs::write(path, bytes).map_err(|e| Error::write(path, e))
    }
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Load a set of source images, forcing opaque alpha and verifying that every
/// image shares the dimensions of the first.
pub fn load_sources(paths: &[impl AsRef<Path>]) -> Result<Vec<Raster>> {
    let mut images: Vec<Raster> = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let raster = Raster::load_opaque(path)?;
        if let Some(first) = images.first() {
            if raster.width() != first.width() || raster.height() != first.height() {
                return Err(Error::DimensionMismatch {
                    path: path.to_path_buf(),
                    detail: format!(
                        "{}x{}, expected {}x{}",
                        raster.width(),
                        raster.height(),
                        first.width(),
                        first.height()
                    ),
                });
            }
        }
        images.push(raster);
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_rejects_bad_length() {
        assert!(Raster::from_rgba(2, 2, vec![0u8; 15]).is_err());
        assert!(Raster::from_rgba(2, 2, vec![0u8; 16]).is_ok());
    }

    #[test]
    fn test_pixel_roundtrip() {
        let mut r = Raster::zeroed(3, 2);
        r.set_pixel(2, 1, [1, 2, 3, 4]);
        assert_eq!(r.pixel(2, 1), [1, 2, 3, 4]);
        assert_eq!(r.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_png_roundtrip() {
        let mut r = Raster::zeroed(2, 2);
        r.set_pixel(0, 0, [10, 20, 30, 255]);
        r.set_pixel(1, 1, [40, 50, 60, 255]);
        let bytes = r.encode_png().unwrap();
        assert!(!bytes.is_empty());

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_load_opaque_forces_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translucent.png");

        let mut r = Raster::zeroed(2, 2);
        r.set_pixel(0, 0, [9, 9, 9, 0]);
        r.set_pixel(1, 0, [7, 7, 7, 128]);
        r.write_png(&path).unwrap();

        let opaque = Raster::load_opaque(&path).unwrap();
        assert_eq!(opaque.pixel(0, 0)[3], OPAQUE);
        assert_eq!(opaque.pixel(1, 0)[3], OPAQUE);

        // plain load keeps the stored alpha
        let raw = Raster::load(&path).unwrap();
        assert_eq!(raw.pixel(0, 0)[3], 0);
        assert_eq!(raw.pixel(1, 0)[3], 128);
    }

    #[test]
    fn test_load_sources_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        Raster::zeroed(2, 2).write_png(&a).unwrap();
        Raster::zeroed(3, 2).write_png(&b).unwrap();

        let err = load_sources(&[a, b.clone()]).unwrap_err();
        match err {
            Error::DimensionMismatch { path, .. } => assert_eq!(path, b),
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }
}
