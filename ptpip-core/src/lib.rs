//! # ptpip-core
//!
//! Core protocol implementation for Sony cameras speaking PTP/IP.
//!
//! This crate provides the low-level protocol primitives:
//! - Packet builders and field readers (all little-endian)
//! - Operation codes and response codes
//! - Property descriptor parsing
//! - Camera value encoding (ISO, shutter, aperture, ...)
//! - Session state tracking

pub mod constants;
pub mod error;
pub mod liveview;
pub mod opcode;
pub mod packet;
pub mod props;
pub mod session;
pub mod values;

pub use error::{Error, Result};
pub use opcode::{response, Opcode};
pub use packet::PacketType;
pub use props::{PropertyInfo, PropertySnapshot};
pub use session::{ConnectionPhase, SessionState};

/// PTP/IP protocol version sent in InitCommandRequest
pub const PROTOCOL_VERSION: u32 = 0x0001_0000;

/// TCP port used by both PTP/IP channels
pub const PTP_IP_PORT: u16 = 15740;

/// Fixed packet header size (total length + packet type)
pub const HEADER_SIZE: usize = 8;
