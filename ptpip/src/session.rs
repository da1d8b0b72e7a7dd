//! PTP/IP session state machine
//!
//! The session owns both TCP channels and all mutable protocol state.
//! Command-channel traffic is strictly serial: user operations, the
//! keep-alive probe, the live-view poller and the event-triggered
//! property refresh all go through one `Mutex` around the command
//! channel, so at most one operation is ever in flight. The event
//! channel is read continuously by its own task, which never writes to
//! the command socket; it only enqueues refresh requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use ptpip_core::constants::{
    CONNECT_TIMEOUT, KEEPALIVE_PERIOD, LIVE_VIEW_ERROR_BACKOFF, LIVE_VIEW_FRAME_INTERVAL,
    LIVE_VIEW_HANDLE, READ_TIMEOUT, SDIO_EXT_VERSION,
};
use ptpip_core::packet::{self, read_u32_le, read_u64_le, response_code};
use ptpip_core::{
    liveview, props, response, ConnectionPhase, Opcode, PacketType, PropertySnapshot, SessionState,
};
use ptpip_transport::PtpChannel;

use crate::error::{Error, Result};

type SharedLink = Arc<Mutex<Option<PtpChannel>>>;

/// One PTP/IP session: handshake, operation execution, keep-alive,
/// event handling and live-view polling
pub(crate) struct PtpSession {
    friendly_name: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    state: SessionState,
    cmd: SharedLink,
    snapshot_tx: watch::Sender<PropertySnapshot>,
    tasks: Vec<JoinHandle<()>>,
    live: Option<LiveView>,
}

struct LiveView {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PtpSession {
    pub fn new(friendly_name: String) -> Self {
        let (snapshot_tx, _) = watch::channel(PropertySnapshot::new());
        Self {
            friendly_name,
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
            state: SessionState::new(),
            cmd: Arc::new(Mutex::new(None)),
            snapshot_tx,
            tasks: Vec::new(),
            live: None,
        }
    }

    pub fn set_friendly_name(&mut self, name: String) {
        self.friendly_name = name;
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Property snapshots published by event-triggered refreshes and
    /// explicit enumerations, in order
    pub fn subscribe(&self) -> watch::Receiver<PropertySnapshot> {
        self.snapshot_tx.subscribe()
    }

    // Connection lifecycle

    /// Run the handshake ladder to `Ready`. Any failure resets the
    /// session to `Disconnected`; the state machine does not retry.
    pub async fn connect(&mut self, addr: &str, port: u16) -> Result<()> {
        if self.state.phase() != ConnectionPhase::Disconnected {
            return Err(Error::ConnectFailed("session already connected".into()));
        }

        match self.establish(addr, port).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.teardown().await;
                Err(e)
            }
        }
    }

    async fn establish(&mut self, addr: &str, port: u16) -> Result<()> {
        let state = self.state.clone();
        state.advance(ConnectionPhase::Connecting)?;

        let mut cmd = PtpChannel::new(addr, port, "command")
            .with_connect_timeout(self.connect_timeout)
            .with_read_timeout(self.read_timeout);
        cmd.connect()
            .await
            .map_err(|e| Error::ConnectFailed(e.to_string()))?;

        state.advance(ConnectionPhase::InitCommand)?;
        let init = packet::init_command_request(&state.guid(), &self.friendly_name);
        cmd.send(&init).await.map_err(|e| handshake("init-command", e))?;
        let ack = cmd
            .recv_packet()
            .await
            .map_err(|e| handshake("init-command", e))?;
        if PacketType::of(&ack) != Some(PacketType::InitCommandAck) || ack.len() < 12 {
            return Err(Error::HandshakeFailed {
                stage: "init-command",
                reason: format!("unexpected packet type 0x{:08X}", read_u32_le(&ack, 4)),
            });
        }
        let connection_id = read_u32_le(&ack, 8);
        state.set_connection_id(connection_id);
        debug!(connection_id, "command channel initialised");

        state.advance(ConnectionPhase::InitEvent)?;
        let mut event = PtpChannel::new(addr, port, "event")
            .with_connect_timeout(self.connect_timeout)
            .with_read_timeout(self.read_timeout);
        event.connect().await.map_err(|e| handshake("init-event", e))?;
        event
            .send(&packet::init_event_request(connection_id))
            .await
            .map_err(|e| handshake("init-event", e))?;
        let ack = event
            .recv_packet()
            .await
            .map_err(|e| handshake("init-event", e))?;
        if PacketType::of(&ack) != Some(PacketType::InitEventAck) {
            return Err(Error::HandshakeFailed {
                stage: "init-event",
                reason: format!("unexpected packet type 0x{:08X}", read_u32_le(&ack, 4)),
            });
        }
        debug!("event channel initialised");

        // Event receive loop starts as soon as the event channel is up.
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        self.tasks
            .push(Self::spawn_event_loop(event, state.clone(), refresh_tx));

        state.advance(ConnectionPhase::OpeningSession)?;
        let session_id = state.assign_session_id();
        let resp = Self::run_operation(&mut cmd, &state, Opcode::OpenSession, &[session_id])
            .await
            .map_err(|e| handshake_err("open-session", e))?;
        let code = response_code(&resp);
        if code != response::OK && code != response::SESSION_ALREADY_OPEN {
            return Err(Error::HandshakeFailed {
                stage: "open-session",
                reason: response::describe(code),
            });
        }
        debug!(session_id, "session opened");

        state.advance(ConnectionPhase::SdioSetup)?;
        let setup: [(&'static str, Opcode, &[u32]); 6] = [
            ("get-device-info", Opcode::GetDeviceInfo, &[]),
            ("get-storage-ids", Opcode::GetStorageIds, &[]),
            ("sdio-connect-1", Opcode::SdioConnect, &[1]),
            ("sdio-connect-2", Opcode::SdioConnect, &[2]),
            ("sdio-connect-3", Opcode::SdioConnect, &[3]),
            (
                "sdio-ext-device-info",
                Opcode::SdioGetExtDeviceInfo,
                &[SDIO_EXT_VERSION],
            ),
        ];
        for (stage, op, params) in setup {
            let resp = Self::run_operation(&mut cmd, &state, op, params)
                .await
                .map_err(|e| handshake_err(stage, e))?;
            let code = response_code(&resp);
            if code != response::OK {
                return Err(Error::HandshakeFailed {
                    stage,
                    reason: response::describe(code),
                });
            }
            trace!(stage, "setup step ok");
        }

        *self.cmd.lock().await = Some(cmd);
        state.advance(ConnectionPhase::Ready)?;

        self.tasks
            .push(Self::spawn_keepalive(Arc::clone(&self.cmd), state.clone()));
        self.tasks.push(Self::spawn_refresher(
            refresh_rx,
            Arc::clone(&self.cmd),
            state.clone(),
            self.snapshot_tx.clone(),
        ));

        info!(connection_id, session_id, "session ready");
        Ok(())
    }

    /// Tear the session down: stop the background loops, close the
    /// sockets, return to `Disconnected`. Idempotent.
    pub async fn disconnect(&mut self) {
        if self.state.phase() == ConnectionPhase::Disconnected {
            return;
        }
        let _ = self.state.advance(ConnectionPhase::Closing);
        self.teardown().await;
        info!("disconnected");
    }

    async fn teardown(&mut self) {
        self.stop_live_view();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(mut link) = self.cmd.lock().await.take() {
            link.disconnect().await;
        }
        self.state.reset();
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state.is_ready() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Close the session when an operation observed a dead socket.
    /// Other operation errors leave the session up.
    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(Error::ConnectionLost) = &result {
            warn!("connection lost; session closed");
            self.state.reset();
        }
        result
    }

    // Operations

    /// Run a command-only operation and require an Ok response
    pub async fn operation(&self, op: Opcode, params: &[u32]) -> Result<()> {
        self.ensure_ready()?;
        let mut guard = self.cmd.lock().await;
        let link = guard.as_mut().ok_or(Error::NotConnected)?;
        let result = Self::run_operation(link, &self.state, op, params).await;
        self.observe(result.and_then(|resp| check_ok(&resp)))
    }

    /// Run an operation with an inbound data phase and require an Ok
    /// response; returns the assembled payload
    pub async fn read_operation(&self, op: Opcode, params: &[u32]) -> Result<Bytes> {
        self.ensure_ready()?;
        let mut guard = self.cmd.lock().await;
        let link = guard.as_mut().ok_or(Error::NotConnected)?;
        let result = Self::run_read_operation(link, &self.state, op, params).await;
        self.observe(result)
    }

    /// Write a property value through SdioControlDevice
    pub async fn set_property(&self, code: u16, payload: &[u8]) -> Result<()> {
        self.ensure_ready()?;
        let mut guard = self.cmd.lock().await;
        let link = guard.as_mut().ok_or(Error::NotConnected)?;
        let result = Self::run_write_operation(
            link,
            &self.state,
            Opcode::SdioControlDevice,
            &[code as u32, 0],
            payload,
        )
        .await;
        self.observe(result)
    }

    /// Enumerate all device properties and publish the snapshot
    pub async fn get_all_properties(&self) -> Result<PropertySnapshot> {
        let payload = self
            .read_operation(Opcode::SdioGetAllExtDevicePropInfo, &[])
            .await?;
        let snapshot = props::parse_all(&payload)?;
        let _ = self.snapshot_tx.send(snapshot.clone());
        Ok(snapshot)
    }

    /// Fetch one live-view frame; an invalid container is `None`
    pub async fn get_live_frame(&self) -> Result<Option<Bytes>> {
        let payload = self
            .read_operation(Opcode::GetObject, &[LIVE_VIEW_HANDLE])
            .await?;
        Ok(liveview::extract_frame(&payload).map(Bytes::copy_from_slice))
    }

    /// Send one OperationRequest and hunt for its OperationResponse,
    /// discarding anything else that shows up on the channel
    async fn run_operation(
        link: &mut PtpChannel,
        state: &SessionState,
        op: Opcode,
        params: &[u32],
    ) -> Result<BytesMut> {
        let txn = state.next_transaction_id();
        trace!(%op, txn, ?params, "operation");
        link.send(&packet::operation_request(op.code(), txn, params, false))
            .await?;
        Self::await_response(link).await
    }

    async fn run_write_operation(
        link: &mut PtpChannel,
        state: &SessionState,
        op: Opcode,
        params: &[u32],
        payload: &[u8],
    ) -> Result<()> {
        let txn = state.next_transaction_id();
        trace!(%op, txn, ?params, len = payload.len(), "operation with outbound data");
        link.send(&packet::operation_request(op.code(), txn, params, true))
            .await?;
        link.send(&packet::start_data(txn, payload.len() as u64))
            .await?;
        link.send(&packet::end_data(txn, payload)).await?;
        let resp = Self::await_response(link).await?;
        check_ok(&resp)
    }

    /// Operation with an inbound data phase: payload bytes accumulate
    /// from Data and EndData packets until the OperationResponse
    /// arrives. The size announced by StartData is advisory only.
    async fn run_read_operation(
        link: &mut PtpChannel,
        state: &SessionState,
        op: Opcode,
        params: &[u32],
    ) -> Result<Bytes> {
        let txn = state.next_transaction_id();
        trace!(%op, txn, ?params, "operation with inbound data");
        link.send(&packet::operation_request(op.code(), txn, params, false))
            .await?;

        let mut payload = BytesMut::new();
        loop {
            let pkt = link.recv_packet().await?;
            match PacketType::of(&pkt) {
                Some(PacketType::StartData) => {
                    trace!(announced = read_u64_le(&pkt, 12), "data phase started");
                }
                Some(PacketType::Data) | Some(PacketType::EndData) => {
                    if pkt.len() > 12 {
                        payload.extend_from_slice(&pkt[12..]);
                    }
                }
                Some(PacketType::OperationResponse) => {
                    check_ok(&pkt)?;
                    return Ok(payload.freeze());
                }
                other => trace!(?other, "discarding packet while awaiting data"),
            }
        }
    }

    async fn await_response(link: &mut PtpChannel) -> Result<BytesMut> {
        loop {
            let pkt = link.recv_packet().await?;
            match PacketType::of(&pkt) {
                Some(PacketType::OperationResponse) => return Ok(pkt),
                other => trace!(?other, "discarding packet while awaiting response"),
            }
        }
    }

    // Background loops

    /// Probe the command channel every 15 seconds. Lowest priority: a
    /// busy command channel skips the tick instead of queueing behind it.
    fn spawn_keepalive(cmd: SharedLink, state: SessionState) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(KEEPALIVE_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                if !state.is_ready() {
                    break;
                }
                match cmd.try_lock() {
                    Ok(mut guard) => {
                        let Some(link) = guard.as_mut() else { break };
                        if let Err(e) = link.send(&packet::probe_request()).await {
                            debug!("keep-alive probe failed: {e}");
                            break;
                        }
                        trace!("keep-alive probe sent");
                    }
                    Err(_) => trace!("keep-alive skipped; operation in flight"),
                }
            }
        })
    }

    /// Read the event channel until it closes. Event packets schedule a
    /// property refresh; everything else on this channel is ignored.
    fn spawn_event_loop(
        mut channel: PtpChannel,
        state: SessionState,
        refresh: mpsc::UnboundedSender<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match channel.recv_packet_untimed().await {
                    Ok(pkt) => match PacketType::of(&pkt) {
                        Some(PacketType::Event) => {
                            debug!("camera event; scheduling property refresh");
                            if refresh.send(()).is_err() {
                                break;
                            }
                        }
                        other => trace!(?other, "ignoring event-channel packet"),
                    },
                    Err(e) => {
                        if state.phase() != ConnectionPhase::Closing {
                            debug!("event channel closed: {e}");
                        }
                        break;
                    }
                }
            }
            channel.disconnect().await;
        })
    }

    /// Serve refresh requests enqueued by the event loop on the shared
    /// command-channel executor. Bursts coalesce into one enumeration.
    fn spawn_refresher(
        mut rx: mpsc::UnboundedReceiver<()>,
        cmd: SharedLink,
        state: SessionState,
        snapshot_tx: watch::Sender<PropertySnapshot>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                while rx.try_recv().is_ok() {}
                if !state.is_ready() {
                    continue;
                }
                let mut guard = cmd.lock().await;
                let Some(link) = guard.as_mut() else { continue };
                let result = Self::run_read_operation(
                    link,
                    &state,
                    Opcode::SdioGetAllExtDevicePropInfo,
                    &[],
                )
                .await;
                drop(guard);
                match result {
                    Ok(payload) => match props::parse_all(&payload) {
                        Ok(snapshot) => {
                            let _ = snapshot_tx.send(snapshot);
                        }
                        Err(e) => warn!("bad property payload: {e}"),
                    },
                    Err(e) => {
                        debug!("property refresh failed: {e}");
                        if matches!(e, Error::ConnectionLost) {
                            state.reset();
                            break;
                        }
                    }
                }
            }
        })
    }

    // Live view

    /// Start the live-view polling loop. Frames arrive on the returned
    /// channel in fetch order; a slow consumer loses frames rather than
    /// stalling the poller.
    pub fn start_live_view(&mut self) -> Result<mpsc::Receiver<Bytes>> {
        self.ensure_ready()?;
        self.stop_live_view();

        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(Self::live_view_loop(
            Arc::clone(&self.cmd),
            self.state.clone(),
            Arc::clone(&stop),
            tx,
        ));
        self.live = Some(LiveView { stop, handle });
        Ok(rx)
    }

    pub fn stop_live_view(&mut self) {
        if let Some(live) = self.live.take() {
            live.stop.store(true, Ordering::Release);
            live.handle.abort();
        }
    }

    async fn live_view_loop(
        cmd: SharedLink,
        state: SessionState,
        stop: Arc<AtomicBool>,
        tx: mpsc::Sender<Bytes>,
    ) {
        debug!("live-view polling started");
        loop {
            if stop.load(Ordering::Acquire) || !state.is_ready() || tx.is_closed() {
                break;
            }

            let fetched = {
                let mut guard = cmd.lock().await;
                match guard.as_mut() {
                    None => break,
                    Some(link) => {
                        Self::run_read_operation(link, &state, Opcode::GetObject, &[LIVE_VIEW_HANDLE])
                            .await
                    }
                }
            };

            match fetched {
                Ok(payload) => {
                    if let Some(jpeg) = liveview::extract_frame(&payload) {
                        let _ = tx.try_send(Bytes::copy_from_slice(jpeg));
                    }
                    tokio::time::sleep(LIVE_VIEW_FRAME_INTERVAL).await;
                }
                Err(e) => {
                    if matches!(e, Error::ConnectionLost) {
                        warn!("connection lost during live view; session closed");
                        state.reset();
                        break;
                    }
                    trace!("live-view fetch failed: {e}");
                    tokio::time::sleep(LIVE_VIEW_ERROR_BACKOFF).await;
                }
            }
        }
        debug!("live-view polling stopped");
    }
}

fn check_ok(resp: &[u8]) -> Result<()> {
    let code = response_code(resp);
    if code == response::OK {
        Ok(())
    } else {
        Err(Error::OperationFailed { code })
    }
}

fn handshake(stage: &'static str, e: ptpip_transport::Error) -> Error {
    Error::HandshakeFailed {
        stage,
        reason: e.to_string(),
    }
}

fn handshake_err(stage: &'static str, e: Error) -> Error {
    match e {
        Error::HandshakeFailed { .. } => e,
        other => Error::HandshakeFailed {
            stage,
            reason: other.to_string(),
        },
    }
}
