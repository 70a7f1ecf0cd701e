use image::ImageReader;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

// ---------------------------------------------------------------------------
// Decoded image data (display-ready, 0x00RRGGBB per pixel)
// ---------------------------------------------------------------------------

pub struct DecodedImage {
    pub pixels: Vec<u32>,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub format_name: String,
}

impl DecodedImage {
    pub fn mem_size(&self) -> u64 {
        (self.pixels.len() * std::mem::size_of::<u32>()) as u64
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot access '{}': {source}", path.display())]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not decode '{}': {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot allocate {bytes} bytes for '{}'", path.display())]
    Resource { path: PathBuf, bytes: usize },
}

impl LoadError {
    /// Resource errors mean we're out of memory; there is no point continuing.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoadError::Resource { .. })
    }
}

/// Turns a file into something the display can blit.
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedImage, LoadError>;
}

/// Decoder backed by the `image` crate.
pub struct ImageDecoder;

impl Decoder for ImageDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, LoadError> {
        let access = |source: io::Error| LoadError::Access {
            path: path.to_path_buf(),
            source,
        };

        let start = Instant::now();
        let file_size = fs::metadata(path).map_err(access)?.len();
        let reader = ImageReader::open(path)
            .map_err(access)?
            .with_guessed_format()
            .map_err(access)?;
        let format_name = match reader.format() {
            Some(format) => format!("{:?}", format).to_uppercase(),
            None => path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
                .to_uppercase(),
        };
        let img = reader.decode().map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!(
            "Decoded '{}' as {} ({:.1?})",
            path.display(),
            format_name,
            start.elapsed()
        );

        // Only composite onto the checkerboard when the source may carry alpha.
        let blend = img.color().has_alpha();
        let rgba = img.into_rgba8();
        let (width, height) = rgba.dimensions();

        let start = Instant::now();
        let pixels = to_display(path, rgba.as_raw(), width, blend)?;
        log::debug!(
            "Converted '{}' {}x{} (checkered={}) ({:.1?})",
            path.display(),
            width,
            height,
            blend,
            start.elapsed()
        );

        Ok(DecodedImage {
            pixels,
            width,
            height,
            file_size,
            format_name,
        })
    }
}

// ---------------------------------------------------------------------------
// Pixel conversion
// ---------------------------------------------------------------------------

pub const CHECKER_SIZE: u32 = 15;
const CHECKER_LIGHT: (u8, u8, u8) = (0xff, 0xff, 0xff);
const CHECKER_DARK: (u8, u8, u8) = (0xdf, 0xdc, 0xde);

/// Pack RGB into softbuffer u32 format: 0x00RRGGBB.
pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Background color of the checkerboard at (x, y).
pub fn checker(x: u32, y: u32) -> (u8, u8, u8) {
    let right = x % (CHECKER_SIZE * 2) >= CHECKER_SIZE;
    let lower = y % (CHECKER_SIZE * 2) >= CHECKER_SIZE;
    if right == lower { CHECKER_LIGHT } else { CHECKER_DARK }
}

fn over(src: u8, bg: u8, a: u32) -> u8 {
    ((src as u32 * a + bg as u32 * (255 - a)) / 255) as u8
}

fn to_display(path: &Path, rgba: &[u8], width: u32, blend: bool) -> Result<Vec<u32>, LoadError> {
    let len = rgba.len() / 4;
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(len)
        .map_err(|_| LoadError::Resource {
            path: path.to_path_buf(),
            bytes: len * std::mem::size_of::<u32>(),
        })?;

    for (i, px) in rgba.chunks_exact(4).enumerate() {
        let (r, g, b, a) = (px[0], px[1], px[2], px[3] as u32);
        if blend && a < 255 {
            let x = (i % width as usize) as u32;
            let y = (i / width as usize) as u32;
            let (br, bg, bb) = checker(x, y);
            pixels.push(rgb(over(r, br, a), over(g, bg, a), over(b, bb, a)));
        } else {
            pixels.push(rgb(r, g, b));
        }
    }
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vimg-loader-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn checker_alternates_every_fifteen_pixels() {
        assert_eq!(checker(0, 0), CHECKER_LIGHT);
        assert_eq!(checker(14, 14), CHECKER_LIGHT);
        assert_eq!(checker(15, 0), CHECKER_DARK);
        assert_eq!(checker(0, 15), CHECKER_DARK);
        assert_eq!(checker(15, 15), CHECKER_LIGHT);
        assert_eq!(checker(30, 0), CHECKER_LIGHT);
    }

    #[test]
    fn transparent_pixels_show_the_checkerboard() {
        let rgba = [
            10, 20, 30, 255, // opaque
            200, 0, 0, 0, // fully transparent, light square
        ];
        let out = to_display(Path::new("x"), &rgba, 2, true).unwrap();
        assert_eq!(out[0], rgb(10, 20, 30));
        assert_eq!(out[1], rgb(0xff, 0xff, 0xff));
    }

    #[test]
    fn opaque_sources_skip_blending() {
        let rgba = [200, 100, 50, 0];
        let out = to_display(Path::new("x"), &rgba, 1, false).unwrap();
        assert_eq!(out, vec![rgb(200, 100, 50)]);
    }

    #[test]
    fn half_alpha_mixes_with_background() {
        // pixel at x=15 lands on a dark square
        let mut rgba = vec![0u8; 16 * 4];
        rgba[15 * 4..].copy_from_slice(&[0, 0, 0, 128]);
        let out = to_display(Path::new("x"), &rgba, 16, true).unwrap();
        let expected = rgb(
            over(0, CHECKER_DARK.0, 128),
            over(0, CHECKER_DARK.1, 128),
            over(0, CHECKER_DARK.2, 128),
        );
        assert_eq!(out[15], expected);
    }

    #[test]
    fn decodes_png_from_disk() {
        let dir = scratch_dir("png");
        let path = dir.join("red.png");
        RgbaImage::from_pixel(4, 3, Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let img = ImageDecoder.decode(&path).unwrap();
        assert_eq!((img.width, img.height), (4, 3));
        assert_eq!(img.format_name, "PNG");
        assert_eq!(img.pixels.len(), 12);
        assert!(img.pixels.iter().all(|&p| p == rgb(255, 0, 0)));
        assert_eq!(img.mem_size(), 48);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let dir = scratch_dir("garbage");
        let path = dir.join("broken.png");
        fs::write(&path, b"definitely not an image").unwrap();

        let err = ImageDecoder.decode(&path).err().unwrap();
        assert!(matches!(err, LoadError::Decode { .. }), "{err}");
        assert!(!err.is_fatal());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_an_access_error() {
        let err = ImageDecoder
            .decode(Path::new("/nonexistent/vimg/nothing.png"))
            .err()
            .unwrap();
        assert!(matches!(err, LoadError::Access { .. }));
    }
}
