//! High-level error types
//!
//! One observable kind per failure mode. Handshake errors are fatal for
//! the session; operation errors after the session is ready are returned
//! to the caller without tearing anything down, except
//! [`Error::ConnectionLost`], which closes the session.

use ptpip_core::response;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation attempted before the session is ready or after teardown
    #[error("Not connected")]
    NotConnected,

    /// TCP connect failure or connect timeout
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// Handshake stage observed the wrong packet, a truncated packet, or
    /// a bad response code
    #[error("Handshake failed during {stage}: {reason}")]
    HandshakeFailed {
        stage: &'static str,
        reason: String,
    },

    /// Socket error or peer close
    #[error("Connection lost")]
    ConnectionLost,

    /// A receive exceeded its 15-second budget
    #[error("Timed out waiting for the camera")]
    Timeout,

    /// The camera answered with a response code other than Ok
    #[error("Operation failed: {}", describe(.code))]
    OperationFailed { code: u16 },

    /// Caller supplied a value outside the accepted set
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A structural invariant of the wire format did not hold
    #[error("Protocol error: {0}")]
    Protocol(String),
}

fn describe(code: &u16) -> String {
    response::describe(*code)
}

impl Error {
    /// Whether a retry of the same operation might succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::OperationFailed { code } => *code == response::DEVICE_BUSY,
            _ => false,
        }
    }

    /// Whether the session is gone and a new connect is needed
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, Self::ConnectionLost | Self::NotConnected)
    }
}

impl From<ptpip_transport::Error> for Error {
    fn from(e: ptpip_transport::Error) -> Self {
        use ptpip_transport::Error as Transport;
        match &e {
            Transport::ReadTimeout => Self::Timeout,
            Transport::ConnectionClosed | Transport::Io(_) => Self::ConnectionLost,
            Transport::ConnectTimeout | Transport::InvalidAddress(_) | Transport::AlreadyConnected => {
                Self::ConnectFailed(e.to_string())
            }
            Transport::NotConnected => Self::NotConnected,
            Transport::InvalidFrame { .. } => Self::Protocol(e.to_string()),
        }
    }
}

impl From<ptpip_core::Error> for Error {
    fn from(e: ptpip_core::Error) -> Self {
        match e {
            ptpip_core::Error::InvalidArgument(reason) => Self::InvalidArgument(reason),
            other => Self::Protocol(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(Error::Timeout.is_recoverable());
        assert!(Error::OperationFailed { code: response::DEVICE_BUSY }.is_recoverable());
        assert!(!Error::OperationFailed { code: response::GENERAL_ERROR }.is_recoverable());
        assert!(!Error::ConnectionLost.is_recoverable());

        assert!(Error::ConnectionLost.requires_reconnect());
        assert!(!Error::Timeout.requires_reconnect());
    }

    #[test]
    fn test_transport_error_mapping() {
        let e: Error = ptpip_transport::Error::ReadTimeout.into();
        assert!(matches!(e, Error::Timeout));

        let e: Error = ptpip_transport::Error::ConnectionClosed.into();
        assert!(matches!(e, Error::ConnectionLost));

        let e: Error = ptpip_transport::Error::ConnectTimeout.into();
        assert!(matches!(e, Error::ConnectFailed(_)));
    }

    #[test]
    fn test_operation_failed_names_the_code() {
        let e = Error::OperationFailed { code: 0x2019 };
        assert_eq!(e.to_string(), "Operation failed: DeviceBusy (0x2019)");
    }
}
