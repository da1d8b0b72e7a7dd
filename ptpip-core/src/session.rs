//! Session state tracking for PTP/IP
//!
//! A session holds:
//! - The connection id assigned by the camera in InitCommandAck
//! - The client-chosen random 24-bit session id
//! - A monotonically increasing 32-bit transaction counter
//! - A random 16-byte client GUID
//! - The connection phase

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::error::{Error, Result};

/// Connection phase of a PTP/IP session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No sockets open
    Disconnected,

    /// Opening the command TCP socket
    Connecting,

    /// Waiting for InitCommandAck
    InitCommand,

    /// Opening the event socket, waiting for InitEventAck
    InitEvent,

    /// OpenSession issued
    OpeningSession,

    /// Running the SDIO vendor handshake
    SdioSetup,

    /// Operations may be issued, keep-alive armed
    Ready,

    /// Teardown in progress
    Closing,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl ConnectionPhase {
    /// The phase that must be current for `self` to be entered via
    /// [`SessionState::advance`]. `Closing` is reachable from any
    /// connected phase; `Disconnected` is entered through
    /// [`SessionState::reset`].
    fn predecessor(self) -> Option<ConnectionPhase> {
        match self {
            Self::Connecting => Some(Self::Disconnected),
            Self::InitCommand => Some(Self::Connecting),
            Self::InitEvent => Some(Self::InitCommand),
            Self::OpeningSession => Some(Self::InitEvent),
            Self::SdioSetup => Some(Self::OpeningSession),
            Self::Ready => Some(Self::SdioSetup),
            Self::Closing | Self::Disconnected => None,
        }
    }
}

/// Session state manager
///
/// Thread-safe and cheap to clone (`Arc` internally); background tasks
/// hold clones and observe phase changes.
#[derive(Debug, Clone)]
pub struct SessionState {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    phase: parking_lot::RwLock<ConnectionPhase>,
    guid: parking_lot::RwLock<[u8; 16]>,
    connection_id: AtomicU32,
    session_id: AtomicU32,
    transaction: AtomicU32,
}

impl SessionState {
    /// Create a new disconnected session
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                phase: parking_lot::RwLock::new(ConnectionPhase::Disconnected),
                guid: parking_lot::RwLock::new(rand::thread_rng().gen()),
                connection_id: AtomicU32::new(0),
                session_id: AtomicU32::new(0),
                transaction: AtomicU32::new(0),
            }),
        }
    }

    /// Current connection phase
    pub fn phase(&self) -> ConnectionPhase {
        *self.inner.phase.read()
    }

    /// Whether user operations may be issued
    pub fn is_ready(&self) -> bool {
        self.phase() == ConnectionPhase::Ready
    }

    /// Client GUID sent in InitCommandRequest
    pub fn guid(&self) -> [u8; 16] {
        *self.inner.guid.read()
    }

    /// Connection id assigned by the camera
    pub fn connection_id(&self) -> u32 {
        self.inner.connection_id.load(Ordering::Acquire)
    }

    /// Store the connection id from InitCommandAck
    pub fn set_connection_id(&self, id: u32) {
        self.inner.connection_id.store(id, Ordering::Release);
    }

    /// Session id chosen for OpenSession
    pub fn session_id(&self) -> u32 {
        self.inner.session_id.load(Ordering::Acquire)
    }

    /// Choose and store a fresh random non-zero 24-bit session id
    pub fn assign_session_id(&self) -> u32 {
        let id = rand::thread_rng().gen_range(1..=0x00FF_FFFFu32);
        self.inner.session_id.store(id, Ordering::Release);
        id
    }

    /// Next transaction id (pre-increment; the first id is 1).
    ///
    /// Ids increase monotonically for the life of the session and are
    /// never reused.
    pub fn next_transaction_id(&self) -> u32 {
        self.inner.transaction.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Move to the next phase of the handshake ladder.
    ///
    /// Entering `Connecting` regenerates the GUID and zeroes the ids and
    /// the transaction counter for the new session.
    pub fn advance(&self, to: ConnectionPhase) -> Result<()> {
        let mut phase = self.inner.phase.write();

        let allowed = match to.predecessor() {
            Some(from) => *phase == from,
            // Closing is valid from any phase that holds resources
            None => to == ConnectionPhase::Closing && *phase != ConnectionPhase::Disconnected,
        };
        if !allowed {
            return Err(Error::InvalidPhase(format!(
                "cannot move from {} to {}",
                *phase, to
            )));
        }

        if to == ConnectionPhase::Connecting {
            *self.inner.guid.write() = rand::thread_rng().gen();
            self.inner.connection_id.store(0, Ordering::Release);
            self.inner.session_id.store(0, Ordering::Release);
            self.inner.transaction.store(0, Ordering::Release);
        }

        *phase = to;
        Ok(())
    }

    /// Force the session back to `Disconnected`, e.g. after an
    /// unrecoverable failure or at the end of teardown
    pub fn reset(&self) {
        *self.inner.phase.write() = ConnectionPhase::Disconnected;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
