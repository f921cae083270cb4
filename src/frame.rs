use crate::model::Color;
use thiserror::Error;

/// Bytes of framing the feed prepends before the color payload.
pub const HEADER_LEN: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame of {0} bytes is shorter than the frame header")]
    TooShort(usize),
}

/// Decode one binary frame into wire-ordered colors.
///
/// The payload after the header is consecutive 3-byte big-endian 0xRRGGBB
/// values, one per physical LED. A trailing partial triple is ignored.
pub fn decode(bytes: &[u8]) -> Result<Vec<Color>, FrameError> {
    if bytes.len() < HEADER_LEN {
        return Err(FrameError::TooShort(bytes.len()));
    }
    Ok(bytes[HEADER_LEN..]
        .chunks_exact(3)
        .map(|c| ((c[0] as Color) << 16) | ((c[1] as Color) << 8) | c[2] as Color)
        .collect())
}

/// Handshake the feed expects right after connecting.
pub fn subscribe_message() -> String {
    serde_json::json!({ "lv": true }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_colors_after_the_header() {
        let bytes = [0xAB, 0xCD, 0xFF, 0x00, 0x00, 0x00, 0xFF, 0x00];
        assert_eq!(decode(&bytes), Ok(vec![0xFF0000, 0x00FF00]));
    }

    #[test]
    fn header_only_frame_is_empty() {
        assert_eq!(decode(&[0x00, 0x01]), Ok(vec![]));
    }

    #[test]
    fn trailing_partial_triple_is_ignored() {
        let bytes = [0x00, 0x00, 0x12, 0x34, 0x56, 0x78, 0x9A];
        assert_eq!(decode(&bytes), Ok(vec![0x123456]));
    }

    #[test]
    fn too_short_for_header_is_an_error() {
        assert_eq!(decode(&[0x00]), Err(FrameError::TooShort(1)));
    }

    #[test]
    fn subscribe_message_is_the_expected_handshake() {
        assert_eq!(subscribe_message(), "{\"lv\":true}");
    }
}
