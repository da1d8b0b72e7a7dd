//! Protocol constants

use std::time::Duration;

/// TCP connect timeout for either channel
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-operation receive timeout on the command channel
pub const READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Keep-alive probe period while the session is ready
pub const KEEPALIVE_PERIOD: Duration = Duration::from_secs(15);

/// Friendly name sent in InitCommandRequest unless overridden
pub const DEFAULT_FRIENDLY_NAME: &str = "ptpip-rs";

/// Reserved object handle whose GetObject payload is the live-view frame
pub const LIVE_VIEW_HANDLE: u32 = 0xFFFF_C002;

/// Byte length of the framing header in front of the live-view JPEG
pub const LIVE_VIEW_HEADER: usize = 16;

/// Target delay between successful live-view fetches (~30 fps)
pub const LIVE_VIEW_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Backoff after a failed live-view fetch
pub const LIVE_VIEW_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Version argument passed to SdioGetExtDeviceInfo during setup
pub const SDIO_EXT_VERSION: u32 = 0x00C8;

/// Sony device property codes
pub mod prop {
    /// ISO sensitivity (0xFFFFFF = Auto)
    pub const ISO: u16 = 0xD21E;

    /// Shutter speed, packed as numerator<<16 | denominator
    pub const SHUTTER_SPEED: u16 = 0xD20D;

    /// F-number in hundredths
    pub const APERTURE: u16 = 0x5007;

    /// White balance mode
    pub const WHITE_BALANCE: u16 = 0x5005;

    /// Focus mode
    pub const FOCUS_MODE: u16 = 0x500A;

    /// Exposure bias in thousandths of an EV, two's complement
    pub const EXPOSURE_BIAS: u16 = 0x5010;

    /// Battery level percentage
    pub const BATTERY_LEVEL: u16 = 0xD218;

    /// Movie recording state (0x01 while recording)
    pub const RECORDING_STATE: u16 = 0xD21D;

    /// Movie record control (write 0x0002 start, 0x0001 stop)
    pub const MOVIE_RECORD: u16 = 0xD2C8;

    /// Power zoom drive, direction<<16 | speed
    pub const ZOOM_DRIVE: u16 = 0xD2DD;
}
