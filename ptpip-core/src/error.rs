//! Error types for ptpip-core

/// Result type alias for core protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wire value does not name a known packet type
    #[error("Unknown packet type: 0x{0:08X}")]
    UnknownPacketType(u32),

    /// Wire value does not name a known operation code
    #[error("Unknown operation code: 0x{0:04X}")]
    UnknownOpcode(u16),

    /// Session phase transition not permitted
    #[error("Invalid session phase: {0}")]
    InvalidPhase(String),

    /// Property descriptor record ends before its declared fields
    #[error("Truncated property descriptor at offset {offset}")]
    TruncatedDescriptor { offset: usize },

    /// Caller supplied a value outside the accepted set
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
