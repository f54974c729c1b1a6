//! Content hashing and image normalization for the ingestion pipeline.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use sha2::{Digest, Sha256};

use crate::errors::ServiceError;

/// Hex-encoded SHA-256 of a byte buffer. This is the sole deduplication key
/// for AI analysis: it is always computed over the ORIGINAL uploaded bytes,
/// never the normalized copy, so re-uploads of the same source photo hit the
/// cache even if re-encoding output varies.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Re-encodes an uploaded image as JPEG at the given quality. Fails with an
/// image error when the input is not a decodable image.
pub fn normalize_to_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, ServiceError> {
    let decoded = image::load_from_memory(bytes)?;
    let mut output = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut output, quality);
    decoded.write_with_encoder(encoder)?;
    Ok(output.into_inner())
}

/// Swaps the extension for `.jpg`, preserving the stem.
pub fn jpeg_filename(original: &str) -> String {
    match original.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.jpg"),
        _ => format!("{original}.jpg"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_png() -> Vec<u8> {
        let img = image::RgbImage::from_fn(8, 8, |x, y| {
            image::Rgb([(x * 32) as u8, (y * 32) as u8, 128])
        });
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn content_hash_is_deterministic_sha256() {
        // Known SHA-256 of the empty input
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(content_hash(b"X"), content_hash(b"X"));
        assert_ne!(content_hash(b"X"), content_hash(b"Y"));
    }

    #[test]
    fn normalize_produces_decodable_jpeg() {
        let jpeg = normalize_to_jpeg(&sample_png(), 80).unwrap();
        let format = image::guess_format(&jpeg).unwrap();
        assert_eq!(format, image::ImageFormat::Jpeg);
        assert!(image::load_from_memory(&jpeg).is_ok());
    }

    #[test]
    fn normalize_rejects_non_image_input() {
        assert!(normalize_to_jpeg(b"not an image", 80).is_err());
    }

    #[test]
    fn jpeg_filename_swaps_extension() {
        assert_eq!(jpeg_filename("photo.heic"), "photo.jpg");
        assert_eq!(jpeg_filename("archive.tar.gz"), "archive.tar.jpg");
        assert_eq!(jpeg_filename("noext"), "noext.jpg");
    }
}
