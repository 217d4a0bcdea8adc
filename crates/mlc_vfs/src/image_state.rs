//! Perceptual fingerprints for texture files.
//!
//! Some textures are not worth patching but tolerate being replaced by a
//! visually equivalent file. To find such a file the index stores a 64-bit
//! difference hash for every texture-class entry, and the compiler compares the
//! hash of an unmatched source texture against same-named candidates.

use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Extensions treated as textures.
pub const TEXTURE_EXTENSIONS: &[&str] = &["dds", "png", "tga"];

/// Whether a path has a texture extension (case-insensitive).
pub fn is_texture_path(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| TEXTURE_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)))
        .unwrap_or(false)
}

/// A 64-bit perceptual hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageFingerprint(pub u64);

impl ImageFingerprint {
    /// Similarity in `[0, 1]`: the share of equal bits.
    pub fn similarity(&self, other: &ImageFingerprint) -> f32 {
        1.0 - (self.0 ^ other.0).count_ones() as f32 / 64.0
    }
}

/// Computes perceptual fingerprints from encoded image bytes.
pub trait PerceptualHasher: Send + Sync {
    /// Returns `None` when the bytes cannot be decoded as an image.
    fn fingerprint(&self, data: &[u8]) -> Option<ImageFingerprint>;
}

/// Difference hash (dHash) over a 9×8 grayscale thumbnail.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferenceHasher;

impl PerceptualHasher for DifferenceHasher {
    fn fingerprint(&self, data: &[u8]) -> Option<ImageFingerprint> {
        match image::load_from_memory(data) {
            Ok(image) => Some(difference_hash(&image)),
            Err(e) => {
                tracing::trace!("Cannot decode texture for fingerprinting: {}", e);
                None
            }
        }
    }
}

/// Each bit records whether a pixel is brighter than its right-hand neighbour.
pub fn difference_hash(image: &DynamicImage) -> ImageFingerprint {
    let small = image.resize_exact(9, 8, FilterType::Triangle).to_luma8();
    let mut bits = 0u64;
    for y in 0..8 {
        for x in 0..8 {
            let left = small.get_pixel(x, y)[0];
            let right = small.get_pixel(x + 1, y)[0];
            bits = (bits << 1) | u64::from(left > right);
        }
    }
    ImageFingerprint(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    fn gradient(descending: bool) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(9, 8, |x, _| {
            let v = (x * 25) as u8;
            Luma([if descending { 255 - v } else { v }])
        }))
    }

    #[test]
    fn test_similarity_counts_equal_bits() {
        let a = ImageFingerprint(0);
        assert_eq!(a.similarity(&a), 1.0);
        assert_eq!(a.similarity(&ImageFingerprint(u64::MAX)), 0.0);
        // 5 differing bits
        let b = ImageFingerprint(0b1_1111);
        assert!((a.similarity(&b) - 0.921_875).abs() < f32::EPSILON);
    }

    #[test]
    fn test_difference_hash_direction() {
        assert_eq!(difference_hash(&gradient(false)), ImageFingerprint(0));
        assert_eq!(difference_hash(&gradient(true)), ImageFingerprint(u64::MAX));
    }

    #[test]
    fn test_hasher_decodes_png() {
        let image = gradient(true);
        let mut png = Cursor::new(Vec::new());
        image.write_to(&mut png, ImageFormat::Png).unwrap();

        let fingerprint = DifferenceHasher.fingerprint(png.get_ref()).unwrap();
        assert_eq!(fingerprint, difference_hash(&image));
    }

    #[test]
    fn test_hasher_rejects_garbage() {
        assert!(DifferenceHasher.fingerprint(b"not an image").is_none());
    }

    #[test]
    fn test_is_texture_path() {
        assert!(is_texture_path("textures/rock_n.DDS"));
        assert!(is_texture_path("a.png"));
        assert!(!is_texture_path("meshes/rock.nif"));
        assert!(!is_texture_path("dds"));
    }
}
