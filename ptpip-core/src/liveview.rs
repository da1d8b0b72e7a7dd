//! Live-view frame container
//!
//! The object at the live-view handle is a byte string whose first 16
//! bytes frame a JPEG sub-region: `u32 image_offset`, `u32 image_size`,
//! then 8 reserved bytes. An invalid container means "no frame right
//! now", never an error.

use crate::constants::LIVE_VIEW_HEADER;
use crate::packet::read_u32_le;

/// JPEG Start-Of-Image marker
const SOI: [u8; 2] = [0xFF, 0xD8];

/// Extract the JPEG sub-region from a live-view object payload.
///
/// Returns `None` when the container is too short, the sub-region falls
/// outside the payload, the size is zero, or the sub-region does not
/// start with an SOI marker.
pub fn extract_frame(payload: &[u8]) -> Option<&[u8]> {
    if payload.len() <= LIVE_VIEW_HEADER {
        return None;
    }

    let offset = read_u32_le(payload, 0) as usize;
    let size = read_u32_le(payload, 4) as usize;
    if size == 0 {
        return None;
    }

    let jpeg = payload.get(offset..offset.checked_add(size)?)?;
    if jpeg.len() < 2 || jpeg[..2] != SOI {
        return None;
    }
    Some(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn container(offset: u32, size: u32, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_valid_frame() {
        let payload = container(16, 5, &[0xFF, 0xD8, 0xAA, 0xBB, 0xCC]);
        assert_eq!(extract_frame(&payload), Some(&[0xFF, 0xD8, 0xAA, 0xBB, 0xCC][..]));
    }

    #[test]
    fn test_frame_with_interior_offset() {
        let payload = container(18, 3, &[0x00, 0x00, 0xFF, 0xD8, 0x01, 0x02]);
        assert_eq!(extract_frame(&payload), Some(&[0xFF, 0xD8, 0x01][..]));
    }

    #[test]
    fn test_short_payload_is_absent() {
        assert_eq!(extract_frame(&[]), None);
        assert_eq!(extract_frame(&[0u8; 16]), None);
    }

    #[test]
    fn test_out_of_bounds_region_is_absent() {
        let payload = container(16, 100, &[0xFF, 0xD8, 0x00]);
        assert_eq!(extract_frame(&payload), None);
    }

    #[test]
    fn test_zero_size_is_absent() {
        let payload = container(16, 0, &[0xFF, 0xD8]);
        assert_eq!(extract_frame(&payload), None);
    }

    #[test]
    fn test_missing_soi_is_absent() {
        let payload = container(16, 4, &[0x00, 0xD8, 0xAA, 0xBB]);
        assert_eq!(extract_frame(&payload), None);
    }

    #[test]
    fn test_one_byte_region_is_absent() {
        // too small to hold an SOI marker
        let payload = container(16, 1, &[0xFF]);
        assert_eq!(extract_frame(&payload), None);
    }

    #[test]
    fn test_offset_overflow_is_absent() {
        let payload = container(u32::MAX, 16, &[0xFF, 0xD8, 0x00, 0x00]);
        assert_eq!(extract_frame(&payload), None);
    }
}
