//! Type definitions for the PTP/IP camera client

pub mod settings;

pub use settings::CameraSettings;
