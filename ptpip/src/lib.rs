//! # ptpip
//!
//! Remote control client for Sony mirrorless and cinema cameras over
//! PTP/IP (Picture Transfer Protocol over TCP port 15740, with Sony's
//! SDIO vendor extension).
//!
//! ## Features
//!
//! - Two-channel PTP/IP session handshake and keep-alive
//! - Typed device property access and enumeration
//! - Exposure controls: ISO, shutter speed, aperture, white balance,
//!   focus mode, exposure compensation
//! - Movie recording and power zoom
//! - JPEG live-view streaming at ~30 fps
//!
//! ## Quick Start
//!
//! ```no_run
//! use ptpip::Camera;
//!
//! #[tokio::main]
//! async fn main() -> ptpip::Result<()> {
//!     // Connect to the camera
//!     let mut camera = Camera::new("192.168.122.1");
//!     camera.connect().await?;
//!
//!     // Inspect and change settings
//!     println!("{}", camera.get_settings().await?);
//!     camera.set_iso("800").await?;
//!
//!     // Grab a preview frame
//!     if let Some(jpeg) = camera.get_live_frame().await? {
//!         println!("frame: {} bytes", jpeg.len());
//!     }
//!
//!     camera.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod camera;
pub mod error;
mod session;

// Re-exports
pub use camera::Camera;
pub use error::{Error, Result};

// Re-export protocol types
pub use ptpip_core::values::ZoomDirection;
pub use ptpip_core::{constants, response, Opcode, PacketType, PropertyInfo, PropertySnapshot};
pub use ptpip_core::PTP_IP_PORT;
pub use ptpip_types::CameraSettings;
