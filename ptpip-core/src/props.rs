//! Sony device property descriptor parsing
//!
//! The payload of `SdioGetAllExtDevicePropInfo` is a concatenation of
//! variable-length descriptor records:
//!
//! ```text
//! ┌───────────┬───────────┬─────────┬────────────┬─────────┬─────────┬───────────┬──────────────┐
//! │ prop_code │ data_type │ get_set │ is_enabled │ default │ current │ form_flag │ form payload │
//! │  2 bytes  │  2 bytes  │ 1 byte  │   1 byte   │  width  │  width  │  1 byte   │   variable   │
//! └───────────┴───────────┴─────────┴────────────┴─────────┴─────────┴───────────┴──────────────┘
//! ```
//!
//! The value width follows from `data_type`: 2/3 one byte, 4/5 two bytes,
//! 6/7 four bytes, anything else four bytes. The form payload is empty
//! (0x00), a min/max/step triple (0x01), or a u16-counted enumeration
//! (0x02). Signed types are stored zero-extended; sign interpretation
//! happens where values are displayed or set.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Parsed state of a single device property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyInfo {
    /// Wire data type code
    pub data_type: u16,

    /// Current value, zero-extended to 32 bits
    pub current_value: u32,

    /// Property accepts SdioControlDevice writes
    pub writable: bool,

    /// Property is enabled in the camera's current mode
    pub enabled: bool,
}

/// All properties reported by one enumeration pass
pub type PropertySnapshot = HashMap<u16, PropertyInfo>;

/// Byte width of a property value for a wire data type
pub fn value_width(data_type: u16) -> usize {
    match data_type {
        2 | 3 => 1,
        4 | 5 => 2,
        _ => 4,
    }
}

/// Whether a wire data type is signed (reinterpreted at display time)
pub fn is_signed(data_type: u16) -> bool {
    matches!(data_type, 3 | 5 | 7)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + n)
            .ok_or(Error::TruncatedDescriptor { offset: self.pos })?;
        self.pos += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Little-endian unsigned value of `width` bytes, zero-extended
    fn value(&mut self, width: usize) -> Result<u32> {
        let b = self.take(width)?;
        let mut v = 0u32;
        for (i, &byte) in b.iter().enumerate() {
            v |= (byte as u32) << (8 * i);
        }
        Ok(v)
    }
}

/// Parse a full property enumeration payload into a snapshot.
///
/// Consumes the entire payload; a record that ends mid-field is a
/// [`Error::TruncatedDescriptor`].
pub fn parse_all(payload: &[u8]) -> Result<PropertySnapshot> {
    let mut cursor = Cursor { buf: payload, pos: 0 };
    let mut snapshot = PropertySnapshot::new();

    while cursor.pos < payload.len() {
        let (code, info) = parse_descriptor(&mut cursor)?;
        snapshot.insert(code, info);
    }

    Ok(snapshot)
}

fn parse_descriptor(cursor: &mut Cursor<'_>) -> Result<(u16, PropertyInfo)> {
    let prop_code = cursor.u16()?;
    let data_type = cursor.u16()?;
    let get_set = cursor.u8()?;
    let is_enabled = cursor.u8()?;

    let width = value_width(data_type);
    cursor.take(width)?; // default value
    let current_value = cursor.value(width)?;

    let form_flag = cursor.u8()?;
    match form_flag {
        0x01 => {
            cursor.take(3 * width)?; // min, max, step
        }
        0x02 => {
            let count = cursor.u16()? as usize;
            cursor.take(count * width)?;
        }
        _ => {}
    }

    Ok((
        prop_code,
        PropertyInfo {
            data_type,
            current_value,
            writable: get_set == 0x01,
            enabled: is_enabled == 0x01,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn descriptor(
        code: u16,
        data_type: u16,
        get_set: u8,
        enabled: u8,
        current: u32,
        form: &[u8],
    ) -> Vec<u8> {
        let width = value_width(data_type);
        let mut out = Vec::new();
        out.extend_from_slice(&code.to_le_bytes());
        out.extend_from_slice(&data_type.to_le_bytes());
        out.push(get_set);
        out.push(enabled);
        out.extend_from_slice(&vec![0u8; width]); // default, skipped
        out.extend_from_slice(&current.to_le_bytes()[..width]);
        out.extend_from_slice(form);
        out
    }

    #[test]
    fn test_parse_one_byte_value() {
        let payload = descriptor(0xD218, 2, 0x00, 0x01, 0x64, &[0x00]);
        let snapshot = parse_all(&payload).unwrap();

        let info = snapshot[&0xD218];
        assert_eq!(info.data_type, 2);
        assert_eq!(info.current_value, 100);
        assert!(!info.writable);
        assert!(info.enabled);
    }

    #[test]
    fn test_parse_two_byte_value_with_enum_form() {
        // enumeration of 3 two-byte values
        let mut form = vec![0x02, 0x03, 0x00];
        form.extend_from_slice(&[0x02, 0x00, 0x04, 0x00, 0x06, 0x00]);
        let payload = descriptor(0x5005, 4, 0x01, 0x01, 0x0004, &form);

        let snapshot = parse_all(&payload).unwrap();
        let info = snapshot[&0x5005];
        assert_eq!(info.data_type, 4);
        assert_eq!(info.current_value, 0x0004);
        assert!(info.writable);
    }

    #[test]
    fn test_parse_four_byte_value_with_range_form() {
        // min/max/step, three 4-byte values
        let mut form = vec![0x01];
        form.extend_from_slice(&[0u8; 12]);
        let payload = descriptor(0xD21E, 6, 0x01, 0x01, 0x00FF_FFFF, &form);

        let snapshot = parse_all(&payload).unwrap();
        assert_eq!(snapshot[&0xD21E].current_value, 0x00FF_FFFF);
    }

    #[test]
    fn test_unknown_data_type_treated_as_four_bytes() {
        let payload = descriptor(0xD2DD, 0x000A, 0x01, 0x01, 0x0001_0003, &[0x00]);

        let snapshot = parse_all(&payload).unwrap();
        assert_eq!(snapshot[&0xD2DD].current_value, 0x0001_0003);
    }

    #[test]
    fn test_signed_value_zero_extended() {
        // -700 as i32, stored as its unsigned bit pattern
        let raw = (-700i32) as u32;
        let payload = descriptor(0x5010, 7, 0x01, 0x01, raw, &[0x00]);

        let snapshot = parse_all(&payload).unwrap();
        let info = snapshot[&0x5010];
        assert_eq!(info.current_value, raw);
        assert!(is_signed(info.data_type));
        assert_eq!(info.current_value as i32, -700);
    }

    #[test]
    fn test_parse_concatenated_records_consumes_exactly() {
        let mut payload = descriptor(0xD21D, 2, 0x00, 0x01, 0x01, &[0x00]);
        payload.extend(descriptor(0x500A, 4, 0x01, 0x01, 0x8004, &[0x00]));
        payload.extend(descriptor(0x5010, 7, 0x01, 0x00, 700, &[0x00]));

        let snapshot = parse_all(&payload).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[&0xD21D].current_value, 0x01);
        assert_eq!(snapshot[&0x500A].current_value, 0x8004);
        assert!(!snapshot[&0x5010].enabled);
    }

    #[test]
    fn test_empty_payload() {
        assert!(parse_all(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_record_is_error() {
        let full = descriptor(0x5005, 4, 0x01, 0x01, 0x0004, &[0x00]);
        let result = parse_all(&full[..full.len() - 2]);

        assert!(matches!(result, Err(Error::TruncatedDescriptor { .. })));
    }

    #[test]
    fn test_truncated_enum_form_is_error() {
        // announces 4 entries but carries only 1
        let mut form = vec![0x02, 0x04, 0x00];
        form.extend_from_slice(&[0x02, 0x00]);
        let payload = descriptor(0x5005, 4, 0x01, 0x01, 0x0004, &form);

        assert!(matches!(
            parse_all(&payload),
            Err(Error::TruncatedDescriptor { .. })
        ));
    }

    #[test]
    fn test_value_width_table() {
        assert_eq!(value_width(2), 1);
        assert_eq!(value_width(3), 1);
        assert_eq!(value_width(4), 2);
        assert_eq!(value_width(5), 2);
        assert_eq!(value_width(6), 4);
        assert_eq!(value_width(7), 4);
        assert_eq!(value_width(0xFFFF), 4);
    }
}
