//! Camera settings snapshot

use std::fmt;

/// Rendered snapshot of the exposure-relevant camera state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSettings {
    /// ISO sensitivity, e.g. `"800"` or `"Auto"`
    pub iso: String,

    /// Shutter speed, e.g. `"1/50"` or `"2""`
    pub shutter_speed: String,

    /// Aperture, e.g. `"f/5.6"`, `"--"` when unknown
    pub aperture: String,

    /// White balance mode name
    pub white_balance: String,

    /// Focus mode name
    pub focus_mode: String,

    /// Exposure compensation with explicit sign, e.g. `"+0.7"`
    pub exposure_comp: String,

    /// Battery percentage, -1 when unknown
    pub battery_level: i32,

    /// Whether a movie recording is running
    pub is_recording: bool,
}

impl fmt::Display for CameraSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ISO {} | {} | {} | WB {} | {} | {} EV | battery {}%{}",
            self.iso,
            self.shutter_speed,
            self.aperture,
            self.white_balance,
            self.focus_mode,
            self.exposure_comp,
            self.battery_level,
            if self.is_recording { " | REC" } else { "" },
        )
    }
}
