//! Transport layer for the PTP/IP camera protocol
//!
//! Provides a framed TCP channel: length-prefixed packets are
//! reassembled from the byte stream regardless of how the kernel chunks
//! them, and outbound writes are serialised per channel.

pub mod error;
pub mod tcp;

pub use error::{Error, Result};
pub use tcp::PtpChannel;
