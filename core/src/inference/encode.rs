use crate::inference::capture::CapturedFrame;
use crate::prelude::EncodeError;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// Compresses an RGB8 frame to JPEG at `quality` (clamped to 1..=100).
pub fn encode_jpeg(frame: &CapturedFrame, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let expected = frame.width as usize * frame.height as usize * 3;
    if frame.width == 0 || frame.height == 0 {
        return Err(EncodeError::InvalidFrame("zero-sized frame".into()));
    }
    if frame.pixels.len() != expected {
        return Err(EncodeError::InvalidFrame(format!(
            "expected {} bytes for {}x{} RGB, got {}",
            expected,
            frame.width,
            frame.height,
            frame.pixels.len()
        )));
    }

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100));
    encoder.encode(&frame.pixels, frame.width, frame.height, ExtendedColorType::Rgb8)?;
    Ok(jpeg)
}
