//! Camera value encoding and formatting
//!
//! Maps between the textual values accepted by the device API and the
//! integers written to Sony device properties, plus the inverse
//! formatting used when rendering a settings snapshot.

use crate::error::{Error, Result};

/// ISO value written for "auto"
pub const ISO_AUTO: u32 = 0x00FF_FFFF;

/// MovieRecord value starting a recording
pub const RECORD_START: u16 = 0x0002;

/// MovieRecord value stopping a recording
pub const RECORD_STOP: u16 = 0x0001;

/// Zoom drive value that halts the zoom motor
pub const ZOOM_HALT: u32 = 0;

/// Shutter speeds accepted by [`encode_shutter`]
const SHUTTER_SPEEDS: &[(&str, u16, u16)] = &[
    ("1/24", 1, 24),
    ("1/30", 1, 30),
    ("1/48", 1, 48),
    ("1/50", 1, 50),
    ("1/60", 1, 60),
    ("1/100", 1, 100),
    ("1/120", 1, 120),
    ("1/250", 1, 250),
    ("1/500", 1, 500),
    ("1/1000", 1, 1000),
];

const WHITE_BALANCE: &[(&str, u16)] = &[
    ("auto", 0x0002),
    ("daylight", 0x0004),
    ("shade", 0x8011),
    ("cloudy", 0x8010),
    ("tungsten", 0x0006),
    ("fluorescent", 0x0001),
    ("flash", 0x0007),
    ("custom", 0x8020),
];

const FOCUS_MODES: &[(&str, u16)] = &[
    ("mf", 0x0001),
    ("af-s", 0x0002),
    ("af-c", 0x8004),
    ("dmf", 0x8005),
];

/// Zoom motor direction
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ZoomDirection {
    /// Tele (zoom in)
    In,
    /// Wide (zoom out)
    Out,
}

impl std::str::FromStr for ZoomDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("in") {
            Ok(Self::In)
        } else if s.eq_ignore_ascii_case("out") {
            Ok(Self::Out)
        } else {
            Err(Error::InvalidArgument(format!(
                "zoom direction must be \"in\" or \"out\", got {s:?}"
            )))
        }
    }
}

/// Encode an ISO string: `auto` (case-insensitive) or a decimal integer
pub fn encode_iso(value: &str) -> Result<u32> {
    if value.eq_ignore_ascii_case("auto") {
        return Ok(ISO_AUTO);
    }
    value
        .parse::<u32>()
        .map_err(|_| Error::InvalidArgument(format!("invalid ISO value {value:?}")))
}

/// Render an ISO property value
pub fn format_iso(raw: u32) -> String {
    if raw == ISO_AUTO {
        "Auto".to_string()
    } else {
        raw.to_string()
    }
}

/// Encode a shutter speed from the supported ratio set
pub fn encode_shutter(value: &str) -> Result<u32> {
    SHUTTER_SPEEDS
        .iter()
        .find(|(text, _, _)| *text == value)
        .map(|&(_, num, den)| ((num as u32) << 16) | den as u32)
        .ok_or_else(|| Error::InvalidArgument(format!("unsupported shutter speed {value:?}")))
}

/// Render a packed shutter speed value
pub fn format_shutter(raw: u32) -> String {
    let num = raw >> 16;
    let den = raw & 0xFFFF;
    if den == 0 {
        format!("{num}\"")
    } else if num == 1 {
        format!("1/{den}")
    } else {
        format!("{num}/{den}")
    }
}

/// Encode an aperture string (`f/N`, `fN` or bare `N`) as hundredths
pub fn encode_aperture(value: &str) -> Result<u16> {
    let digits = value
        .strip_prefix("f/")
        .or_else(|| value.strip_prefix("F/"))
        .or_else(|| value.strip_prefix('f'))
        .or_else(|| value.strip_prefix('F'))
        .unwrap_or(value);

    let n: f64 = digits
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("invalid aperture {value:?}")))?;
    if !n.is_finite() || n <= 0.0 || n > 600.0 {
        return Err(Error::InvalidArgument(format!("invalid aperture {value:?}")));
    }
    Ok((n * 100.0).round() as u16)
}

/// Render an aperture property value
pub fn format_aperture(raw: u32) -> String {
    if raw == 0 {
        "--".to_string()
    } else {
        format!("f/{:.1}", raw as f64 / 100.0)
    }
}

/// Encode an exposure bias in EV as thousandths, two's complement
pub fn encode_exposure_bias(ev: f64) -> Result<u32> {
    if !ev.is_finite() || !(-3.0..=3.0).contains(&ev) {
        return Err(Error::InvalidArgument(format!(
            "exposure bias {ev} outside [-3.0, +3.0] EV"
        )));
    }
    Ok(((ev * 1000.0).round() as i32) as u32)
}

/// Decode an exposure bias property value back to EV
pub fn decode_exposure_bias(raw: u32) -> f64 {
    raw as i32 as f64 / 1000.0
}

/// Render an exposure bias with explicit sign, e.g. `+0.7`
pub fn format_exposure(raw: u32) -> String {
    format!("{:+.1}", decode_exposure_bias(raw))
}

/// Encode a white balance name (case-insensitive)
pub fn encode_white_balance(value: &str) -> Result<u16> {
    WHITE_BALANCE
        .iter()
        .find(|(name, _)| value.eq_ignore_ascii_case(name))
        .map(|&(_, code)| code)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown white balance {value:?}")))
}

/// Render a white balance property value
pub fn format_white_balance(raw: u32) -> String {
    match raw {
        0x0002 => "Auto".to_string(),
        0x0004 => "Daylight".to_string(),
        0x8011 => "Shade".to_string(),
        0x8010 => "Cloudy".to_string(),
        0x0006 => "Tungsten".to_string(),
        0x0001 => "Fluorescent".to_string(),
        0x0007 => "Flash".to_string(),
        0x8020 => "Custom".to_string(),
        other => format!("0x{other:04X}"),
    }
}

/// Encode a focus mode name (case-insensitive)
pub fn encode_focus_mode(value: &str) -> Result<u16> {
    FOCUS_MODES
        .iter()
        .find(|(name, _)| value.eq_ignore_ascii_case(name))
        .map(|&(_, code)| code)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown focus mode {value:?}")))
}

/// Render a focus mode property value
pub fn format_focus_mode(raw: u32) -> String {
    match raw {
        0x0001 => "MF".to_string(),
        0x0002 => "AF-S".to_string(),
        0x8004 => "AF-C".to_string(),
        0x8005 => "DMF".to_string(),
        other => format!("0x{other:04X}"),
    }
}

/// Encode a zoom drive value: direction in the high 16 bits, speed 1..=7
/// in the low
pub fn encode_zoom(direction: ZoomDirection, speed: u8) -> Result<u32> {
    if !(1..=7).contains(&speed) {
        return Err(Error::InvalidArgument(format!(
            "zoom speed must be 1..=7, got {speed}"
        )));
    }
    let dir = match direction {
        ZoomDirection::In => 0x0001u32,
        ZoomDirection::Out => 0x0002u32,
    };
    Ok((dir << 16) | speed as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_iso_auto_case_insensitive() {
        assert_eq!(encode_iso("auto").unwrap(), ISO_AUTO);
        assert_eq!(encode_iso("AUTO").unwrap(), ISO_AUTO);
        assert_eq!(encode_iso("Auto").unwrap(), ISO_AUTO);
    }

    #[test]
    fn test_iso_decimal() {
        assert_eq!(encode_iso("800").unwrap(), 800);
        assert_eq!(encode_iso("102400").unwrap(), 102_400);
        assert!(encode_iso("-100").is_err());
        assert!(encode_iso("8oo").is_err());
        assert!(encode_iso("").is_err());
    }

    #[test]
    fn test_iso_formatting() {
        assert_eq!(format_iso(ISO_AUTO), "Auto");
        assert_eq!(format_iso(800), "800");
    }

    #[test]
    fn test_shutter_round_trip() {
        for (text, _, _) in SHUTTER_SPEEDS {
            let raw = encode_shutter(text).unwrap();
            assert_eq!(&format_shutter(raw), text);
        }
    }

    #[test]
    fn test_shutter_packing() {
        assert_eq!(encode_shutter("1/50").unwrap(), (1 << 16) | 50);
        assert!(encode_shutter("1/3").is_err());
        assert!(encode_shutter("fast").is_err());
    }

    #[test]
    fn test_shutter_formatting_whole_seconds() {
        // denominator 0 renders as whole seconds
        assert_eq!(format_shutter(2 << 16), "2\"");
        assert_eq!(format_shutter((3 << 16) | 2), "3/2");
    }

    #[test]
    fn test_aperture_encodings() {
        assert_eq!(encode_aperture("f/5.6").unwrap(), 560);
        assert_eq!(encode_aperture("f5.6").unwrap(), 560);
        assert_eq!(encode_aperture("5.6").unwrap(), 560);
        assert_eq!(encode_aperture("F/11").unwrap(), 1100);
        assert_eq!(encode_aperture("1.8").unwrap(), 180);
        assert!(encode_aperture("f/").is_err());
        assert!(encode_aperture("wide").is_err());
        assert!(encode_aperture("-2").is_err());
        assert!(encode_aperture("0").is_err());
    }

    #[test]
    fn test_aperture_formatting() {
        assert_eq!(format_aperture(560), "f/5.6");
        assert_eq!(format_aperture(180), "f/1.8");
        assert_eq!(format_aperture(1100), "f/11.0");
        assert_eq!(format_aperture(0), "--");
    }

    #[test]
    fn test_exposure_bias_round_trip() {
        let mut ev = -3.0f64;
        while ev <= 3.0 {
            let raw = encode_exposure_bias(ev).unwrap();
            assert!((decode_exposure_bias(raw) - ev).abs() <= 0.001, "ev={ev}");
            ev += 0.1;
        }
    }

    #[test]
    fn test_exposure_bias_twos_complement() {
        assert_eq!(encode_exposure_bias(-0.7).unwrap(), (-700i32) as u32);
        assert_eq!(
            encode_exposure_bias(-0.7).unwrap().to_le_bytes(),
            [0x24, 0xFD, 0xFF, 0xFF]
        );
        assert_eq!(encode_exposure_bias(1.3).unwrap(), 1300);
    }

    #[test]
    fn test_exposure_bias_range() {
        assert!(encode_exposure_bias(3.1).is_err());
        assert!(encode_exposure_bias(-3.5).is_err());
        assert!(encode_exposure_bias(f64::NAN).is_err());
        assert!(encode_exposure_bias(3.0).is_ok());
        assert!(encode_exposure_bias(-3.0).is_ok());
    }

    #[test]
    fn test_exposure_formatting() {
        assert_eq!(format_exposure(700), "+0.7");
        assert_eq!(format_exposure((-1300i32) as u32), "-1.3");
        assert_eq!(format_exposure(0), "+0.0");
    }

    #[test]
    fn test_white_balance_codes() {
        assert_eq!(encode_white_balance("daylight").unwrap(), 0x0004);
        assert_eq!(encode_white_balance("Shade").unwrap(), 0x8011);
        assert_eq!(encode_white_balance("CLOUDY").unwrap(), 0x8010);
        assert!(encode_white_balance("underwater").is_err());
    }

    #[test]
    fn test_white_balance_round_trip() {
        for (name, code) in WHITE_BALANCE {
            let rendered = format_white_balance(*code as u32);
            assert_eq!(encode_white_balance(&rendered).unwrap(), *code, "{name}");
        }
    }

    #[test]
    fn test_focus_mode_codes() {
        assert_eq!(encode_focus_mode("MF").unwrap(), 0x0001);
        assert_eq!(encode_focus_mode("af-s").unwrap(), 0x0002);
        assert_eq!(encode_focus_mode("AF-C").unwrap(), 0x8004);
        assert_eq!(encode_focus_mode("dmf").unwrap(), 0x8005);
        assert!(encode_focus_mode("AF-A").is_err());
    }

    #[test]
    fn test_zoom_encoding() {
        assert_eq!(encode_zoom(ZoomDirection::In, 3).unwrap(), 0x0001_0003);
        assert_eq!(encode_zoom(ZoomDirection::Out, 1).unwrap(), 0x0002_0001);
        assert!(encode_zoom(ZoomDirection::In, 0).is_err());
        assert!(encode_zoom(ZoomDirection::In, 8).is_err());
    }

    #[test]
    fn test_zoom_direction_parsing() {
        assert_eq!("in".parse::<ZoomDirection>().unwrap(), ZoomDirection::In);
        assert_eq!("OUT".parse::<ZoomDirection>().unwrap(), ZoomDirection::Out);
        assert!("up".parse::<ZoomDirection>().is_err());
    }
}
