//! PTP operation codes and response codes
//!
//! Standard PTP operations plus the Sony SDIO vendor extension
//! (0x92xx / 0x9251) used for proprietary device properties.

use std::fmt;

use crate::error::Error;

/// Operation codes used by this client
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    GetDeviceInfo = 0x1001,
    OpenSession = 0x1002,
    GetStorageIds = 0x1004,
    GetObjectInfo = 0x1008,
    GetObject = 0x1009,
    SdioConnect = 0x9201,
    SdioGetExtDeviceInfo = 0x9202,
    SdioControlDevice = 0x9207,
    SdioGetAllExtDevicePropInfo = 0x9209,
    SdioGetExtDeviceProp = 0x9251,
}

impl Opcode {
    /// Wire value of this opcode
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for Opcode {
    type Error = Error;

    fn try_from(v: u16) -> Result<Self, Error> {
        match v {
            0x1001 => Ok(Self::GetDeviceInfo),
            0x1002 => Ok(Self::OpenSession),
            0x1004 => Ok(Self::GetStorageIds),
            0x1008 => Ok(Self::GetObjectInfo),
            0x1009 => Ok(Self::GetObject),
            0x9201 => Ok(Self::SdioConnect),
            0x9202 => Ok(Self::SdioGetExtDeviceInfo),
            0x9207 => Ok(Self::SdioControlDevice),
            0x9209 => Ok(Self::SdioGetAllExtDevicePropInfo),
            0x9251 => Ok(Self::SdioGetExtDeviceProp),
            other => Err(Error::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:04X})", self, self.code())
    }
}

/// PTP response codes
pub mod response {
    pub const OK: u16 = 0x2001;
    pub const GENERAL_ERROR: u16 = 0x2002;
    pub const SESSION_NOT_OPEN: u16 = 0x2003;
    pub const OPERATION_NOT_SUPPORTED: u16 = 0x2005;
    pub const PARAMETER_NOT_SUPPORTED: u16 = 0x2006;
    pub const DEVICE_BUSY: u16 = 0x2019;
    pub const SESSION_ALREADY_OPEN: u16 = 0x201E;

    /// Name of a response code, if known
    pub fn name(code: u16) -> Option<&'static str> {
        match code {
            OK => Some("Ok"),
            GENERAL_ERROR => Some("GeneralError"),
            SESSION_NOT_OPEN => Some("SessionNotOpen"),
            OPERATION_NOT_SUPPORTED => Some("OperationNotSupported"),
            PARAMETER_NOT_SUPPORTED => Some("ParameterNotSupported"),
            DEVICE_BUSY => Some("DeviceBusy"),
            SESSION_ALREADY_OPEN => Some("SessionAlreadyOpen"),
            _ => None,
        }
    }

    /// Render a response code with its name when known, e.g.
    /// `DeviceBusy (0x2019)`
    pub fn describe(code: u16) -> String {
        match name(code) {
            Some(n) => format!("{} (0x{:04X})", n, code),
            None => format!("0x{:04X}", code),
        }
    }
}
