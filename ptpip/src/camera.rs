//! High-level camera interface

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use ptpip_core::constants::{prop, DEFAULT_FRIENDLY_NAME, LIVE_VIEW_HANDLE};
use ptpip_core::values::{self, ZoomDirection};
use ptpip_core::{Opcode, PropertyInfo, PropertySnapshot, PTP_IP_PORT};
use ptpip_types::CameraSettings;

use crate::error::Result;
use crate::session::PtpSession;

/// Sony camera reachable over PTP/IP
///
/// High-level interface for remote control: typed property access,
/// exposure settings, movie recording, power zoom and the live-view
/// preview stream.
///
/// # Examples
///
/// ```no_run
/// use ptpip::Camera;
///
/// #[tokio::main]
/// async fn main() -> ptpip::Result<()> {
///     let mut camera = Camera::new("192.168.122.1");
///
///     camera.connect().await?;
///     println!("{}", camera.get_settings().await?);
///
///     camera.set_iso("800").await?;
///     camera.start_recording().await?;
///
///     camera.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Camera {
    addr: String,
    port: u16,
    session: PtpSession,
}

impl Camera {
    /// Create a camera handle for the given address (port 15740)
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            port: PTP_IP_PORT,
            session: PtpSession::new(DEFAULT_FRIENDLY_NAME.to_string()),
        }
    }

    /// Override the TCP port (the protocol default is 15740)
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the friendly name announced to the camera
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.session.set_friendly_name(name.into());
        self
    }

    /// Set the TCP connect timeout for both channels
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.session.set_connect_timeout(timeout);
        self
    }

    /// Set the per-receive timeout on the command channel
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.session.set_read_timeout(timeout);
        self
    }

    /// Whether the session is ready for operations
    pub fn is_connected(&self) -> bool {
        self.session.is_ready()
    }

    /// Connect and run the handshake, then prime the live-view object
    pub async fn connect(&mut self) -> Result<()> {
        info!("Connecting to {}:{}...", self.addr, self.port);

        let addr = self.addr.clone();
        self.session.connect(&addr, self.port).await?;

        // The camera expects GetObjectInfo on the live-view handle once
        // before the first GetObject.
        self.session
            .operation(Opcode::GetObjectInfo, &[LIVE_VIEW_HANDLE])
            .await?;

        info!("Connected");
        Ok(())
    }

    /// Disconnect and tear the session down. Idempotent.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.session.disconnect().await;
        Ok(())
    }

    // Properties

    /// Enumerate all device properties
    pub async fn get_all_properties(&self) -> Result<PropertySnapshot> {
        self.session.get_all_properties().await
    }

    /// Fetch a single property, `None` when the camera does not report it
    pub async fn get_property(&self, code: u16) -> Result<Option<PropertyInfo>> {
        Ok(self.session.get_all_properties().await?.get(&code).copied())
    }

    /// Write a 16-bit property value
    pub async fn set_property_u16(&self, code: u16, value: u16) -> Result<()> {
        debug!("Setting property 0x{code:04X} = 0x{value:04X}");
        self.session.set_property(code, &value.to_le_bytes()).await
    }

    /// Write a 32-bit property value
    pub async fn set_property_u32(&self, code: u16, value: u32) -> Result<()> {
        debug!("Setting property 0x{code:04X} = 0x{value:08X}");
        self.session.set_property(code, &value.to_le_bytes()).await
    }

    /// Rendered settings snapshot from one enumeration pass
    pub async fn get_settings(&self) -> Result<CameraSettings> {
        let snapshot = self.session.get_all_properties().await?;
        Ok(render_settings(&snapshot))
    }

    /// Property snapshots published as the camera reports changes
    pub fn subscribe(&self) -> watch::Receiver<PropertySnapshot> {
        self.session.subscribe()
    }

    // Exposure controls

    /// Set ISO: `"auto"` or a decimal value such as `"800"`
    pub async fn set_iso(&self, value: &str) -> Result<()> {
        let raw = values::encode_iso(value)?;
        self.set_property_u32(prop::ISO, raw).await
    }

    /// Set shutter speed from the supported ratio set, e.g. `"1/50"`
    pub async fn set_shutter_speed(&self, value: &str) -> Result<()> {
        let raw = values::encode_shutter(value)?;
        self.set_property_u32(prop::SHUTTER_SPEED, raw).await
    }

    /// Set aperture: `"f/5.6"`, `"f5.6"` or `"5.6"`
    pub async fn set_aperture(&self, value: &str) -> Result<()> {
        let raw = values::encode_aperture(value)?;
        self.set_property_u16(prop::APERTURE, raw).await
    }

    /// Set white balance by name, e.g. `"daylight"`
    pub async fn set_white_balance(&self, value: &str) -> Result<()> {
        let raw = values::encode_white_balance(value)?;
        self.set_property_u16(prop::WHITE_BALANCE, raw).await
    }

    /// Set focus mode: `"MF"`, `"AF-S"`, `"AF-C"` or `"DMF"`
    pub async fn set_focus_mode(&self, value: &str) -> Result<()> {
        let raw = values::encode_focus_mode(value)?;
        self.set_property_u16(prop::FOCUS_MODE, raw).await
    }

    /// Set exposure compensation in EV, within [-3.0, +3.0]
    pub async fn set_exposure_compensation(&self, ev: f64) -> Result<()> {
        let raw = values::encode_exposure_bias(ev)?;
        self.set_property_u32(prop::EXPOSURE_BIAS, raw).await
    }

    // Recording and zoom

    /// Start movie recording
    pub async fn start_recording(&self) -> Result<()> {
        info!("Starting recording");
        self.set_property_u16(prop::MOVIE_RECORD, values::RECORD_START)
            .await
    }

    /// Stop movie recording
    pub async fn stop_recording(&self) -> Result<()> {
        info!("Stopping recording");
        self.set_property_u16(prop::MOVIE_RECORD, values::RECORD_STOP)
            .await
    }

    /// Drive the power zoom: direction `"in"` or `"out"`, speed 1..=7
    pub async fn start_zoom(&self, direction: &str, speed: u8) -> Result<()> {
        let direction: ZoomDirection = direction.parse()?;
        let raw = values::encode_zoom(direction, speed)?;
        self.set_property_u32(prop::ZOOM_DRIVE, raw).await
    }

    /// Halt the power zoom
    pub async fn stop_zoom(&self) -> Result<()> {
        self.set_property_u32(prop::ZOOM_DRIVE, values::ZOOM_HALT)
            .await
    }

    // Live view

    /// Fetch one live-view frame as raw JPEG bytes. `None` means the
    /// camera has no frame right now.
    pub async fn get_live_frame(&self) -> Result<Option<Bytes>> {
        self.session.get_live_frame().await
    }

    /// Start the ~30 fps live-view polling loop; frames arrive on the
    /// returned channel
    pub fn start_live_view(&mut self) -> Result<mpsc::Receiver<Bytes>> {
        self.session.start_live_view()
    }

    /// Stop the live-view polling loop
    pub fn stop_live_view(&mut self) {
        self.session.stop_live_view()
    }
}

fn render_settings(snapshot: &PropertySnapshot) -> CameraSettings {
    let value = |code: u16| snapshot.get(&code).map(|p| p.current_value);

    CameraSettings {
        iso: value(prop::ISO)
            .map(values::format_iso)
            .unwrap_or_else(|| "--".into()),
        shutter_speed: value(prop::SHUTTER_SPEED)
            .map(values::format_shutter)
            .unwrap_or_else(|| "--".into()),
        aperture: value(prop::APERTURE)
            .map(values::format_aperture)
            .unwrap_or_else(|| "--".into()),
        white_balance: value(prop::WHITE_BALANCE)
            .map(values::format_white_balance)
            .unwrap_or_else(|| "--".into()),
        focus_mode: value(prop::FOCUS_MODE)
            .map(values::format_focus_mode)
            .unwrap_or_else(|| "--".into()),
        exposure_comp: value(prop::EXPOSURE_BIAS)
            .map(values::format_exposure)
            .unwrap_or_else(|| "--".into()),
        battery_level: value(prop::BATTERY_LEVEL).map(|v| v as i32).unwrap_or(-1),
        is_recording: value(prop::RECORDING_STATE) == Some(0x01),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn info(value: u32) -> PropertyInfo {
        PropertyInfo {
            data_type: 6,
            current_value: value,
            writable: true,
            enabled: true,
        }
    }

    #[test]
    fn test_camera_create() {
        let camera = Camera::new("192.168.122.1");
        assert!(!camera.is_connected());
    }

    #[test]
    fn test_render_settings() {
        let mut snapshot = PropertySnapshot::new();
        snapshot.insert(prop::ISO, info(800));
        snapshot.insert(prop::SHUTTER_SPEED, info((1 << 16) | 50));
        snapshot.insert(prop::APERTURE, info(560));
        snapshot.insert(prop::WHITE_BALANCE, info(0x0004));
        snapshot.insert(prop::FOCUS_MODE, info(0x8004));
        snapshot.insert(prop::EXPOSURE_BIAS, info((-700i32) as u32));
        snapshot.insert(prop::BATTERY_LEVEL, info(82));
        snapshot.insert(prop::RECORDING_STATE, info(0x01));

        let settings = render_settings(&snapshot);
        assert_eq!(settings.iso, "800");
        assert_eq!(settings.shutter_speed, "1/50");
        assert_eq!(settings.aperture, "f/5.6");
        assert_eq!(settings.white_balance, "Daylight");
        assert_eq!(settings.focus_mode, "AF-C");
        assert_eq!(settings.exposure_comp, "-0.7");
        assert_eq!(settings.battery_level, 82);
        assert!(settings.is_recording);
    }

    #[test]
    fn test_render_settings_defaults_when_missing() {
        let settings = render_settings(&PropertySnapshot::new());
        assert_eq!(settings.iso, "--");
        assert_eq!(settings.aperture, "--");
        assert_eq!(settings.battery_level, -1);
        assert!(!settings.is_recording);
    }

    #[test]
    fn test_render_settings_iso_auto() {
        let mut snapshot = PropertySnapshot::new();
        snapshot.insert(prop::ISO, info(0x00FF_FFFF));

        assert_eq!(render_settings(&snapshot).iso, "Auto");
    }
}
