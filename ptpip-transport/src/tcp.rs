//! Framed TCP channel
//!
//! A PTP/IP session uses two of these: the command channel and the event
//! channel, both connecting to port 15740 on the camera.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

/// Smallest legal frame: 4-byte length plus 4-byte packet type
const MIN_FRAME: usize = 8;

/// A TCP connection carrying length-prefixed PTP/IP packets
pub struct PtpChannel {
    addr: String,
    port: u16,
    label: &'static str,
    socket_addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    acc: BytesMut,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl PtpChannel {
    /// Create a new unconnected channel. `label` names the channel in
    /// logs ("command" or "event").
    pub fn new(addr: impl Into<String>, port: u16, label: &'static str) -> Self {
        Self {
            addr: addr.into(),
            port,
            label,
            socket_addr: None,
            stream: None,
            acc: BytesMut::with_capacity(4096),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(15),
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set per-receive timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.socket_addr {
            return Ok(addr);
        }

        let addr_str = format!("{}:{}", self.addr, self.port);

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?
            .collect();

        let addr = addrs
            .first()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))?;

        self.socket_addr = Some(*addr);
        Ok(*addr)
    }

    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let addr = self.resolve_addr().await?;

        debug!(channel = self.label, "Connecting to {}...", addr);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectTimeout)?
            .map_err(Error::Io)?;

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        debug!(channel = self.label, "Connected to {}", addr);

        self.acc.clear();
        self.stream = Some(stream);
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!(channel = self.label, "Disconnecting from {}...", self.remote_addr());
            let _ = stream.shutdown().await;
        }

        self.acc.clear();
        self.socket_addr = None;
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Send one packet. The write is flushed before returning.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!(
            channel = self.label,
            "Sending {} bytes: {:02X?}",
            data.len(),
            &data[..data.len().min(16)]
        );

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Receive the next whole packet, waiting at most the configured
    /// read timeout from the moment this call starts.
    pub async fn recv_packet(&mut self) -> Result<BytesMut> {
        let budget = self.read_timeout;
        timeout(budget, self.next_frame())
            .await
            .map_err(|_| Error::ReadTimeout)?
    }

    /// Receive the next whole packet with no deadline. Used by the event
    /// channel, which reads continuously.
    pub async fn recv_packet_untimed(&mut self) -> Result<BytesMut> {
        self.next_frame().await
    }

    async fn next_frame(&mut self) -> Result<BytesMut> {
        loop {
            if let Some(frame) = take_frame(&mut self.acc)? {
                trace!(
                    channel = self.label,
                    "Received {} bytes: {:02X?}",
                    frame.len(),
                    &frame[..frame.len().min(16)]
                );
                return Ok(frame);
            }

            let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
            let n = stream.read_buf(&mut self.acc).await.map_err(Error::Io)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    /// Get remote address
    pub fn remote_addr(&self) -> String {
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }
}

/// Detach one complete frame from the front of the accumulator.
///
/// A frame is complete when the accumulator holds at least the four
/// length bytes and the length they announce. Never yields a partial
/// frame.
fn take_frame(acc: &mut BytesMut) -> Result<Option<BytesMut>> {
    if acc.len() < 4 {
        return Ok(None);
    }

    let total = u32::from_le_bytes([acc[0], acc[1], acc[2], acc[3]]) as usize;
    if total < MIN_FRAME {
        return Err(Error::InvalidFrame { len: total as u32 });
    }
    if acc.len() < total {
        return Ok(None);
    }

    Ok(Some(acc.split_to(total)))
}

impl Drop for PtpChannel {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!(channel = self.label, "channel dropped while still connected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::Rng;
    use tokio::net::TcpListener;

    fn frame(packet_type: u32, payload: &[u8]) -> Vec<u8> {
        let total = 8 + payload.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&packet_type.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_take_frame_needs_whole_packet() {
        let f = frame(0x0007, &[1, 2, 3, 4, 5, 6]);
        let mut acc = BytesMut::new();

        for &b in &f[..f.len() - 1] {
            acc.extend_from_slice(&[b]);
            assert!(take_frame(&mut acc).unwrap().is_none());
        }

        acc.extend_from_slice(&f[f.len() - 1..]);
        let got = take_frame(&mut acc).unwrap().unwrap();
        assert_eq!(&got[..], &f[..]);
        assert!(acc.is_empty());
    }

    #[test]
    fn test_take_frame_many_packets_one_read() {
        let frames = vec![
            frame(0x0009, &[0; 12]),
            frame(0x000A, &[0xAB; 40]),
            frame(0x000C, &[0xCD; 7]),
            frame(0x0007, &[0xEF; 8]),
        ];
        let mut acc = BytesMut::new();
        for f in &frames {
            acc.extend_from_slice(f);
        }

        for f in &frames {
            let got = take_frame(&mut acc).unwrap().unwrap();
            assert_eq!(&got[..], &f[..]);
        }
        assert!(take_frame(&mut acc).unwrap().is_none());
    }

    #[test]
    fn test_random_partitioning_preserves_frames() {
        let mut rng = rand::thread_rng();
        let frames: Vec<Vec<u8>> = (0u32..20)
            .map(|i| {
                let len = rng.gen_range(0usize..200);
                frame(0x0006 + (i % 8), &vec![i as u8; len])
            })
            .collect();
        let stream: Vec<u8> = frames.iter().flatten().copied().collect();

        for _ in 0..50 {
            let mut acc = BytesMut::new();
            let mut delivered = Vec::new();
            let mut pos = 0;
            while pos < stream.len() {
                let chunk = rng.gen_range(1..=64.min(stream.len() - pos));
                acc.extend_from_slice(&stream[pos..pos + chunk]);
                pos += chunk;
                while let Some(f) = take_frame(&mut acc).unwrap() {
                    delivered.push(f.to_vec());
                }
            }
            assert_eq!(delivered, frames);
        }
    }

    #[test]
    fn test_undersized_length_prefix_is_rejected() {
        let mut acc = BytesMut::from(&[0x04, 0x00, 0x00, 0x00, 0x01, 0x02][..]);
        assert!(matches!(
            take_frame(&mut acc),
            Err(Error::InvalidFrame { len: 4 })
        ));
    }

    #[tokio::test]
    async fn test_channel_receives_split_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let f1 = frame(0x0002, &[0x34, 0x12, 0x00, 0x00]);
        let f2 = frame(0x0007, &[0x00, 0x00, 0x01, 0x20, 0x01, 0x00, 0x00, 0x00]);
        let (w1, w2) = (f1.clone(), f2.clone());

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut bytes: Vec<u8> = w1;
            bytes.extend_from_slice(&w2);
            // dribble the stream in 3-byte chunks
            for chunk in bytes.chunks(3) {
                sock.write_all(chunk).await.unwrap();
                sock.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });

        let mut channel = PtpChannel::new(addr.ip().to_string(), addr.port(), "command");
        channel.connect().await.unwrap();

        assert_eq!(&channel.recv_packet().await.unwrap()[..], &f1[..]);
        assert_eq!(&channel.recv_packet().await.unwrap()[..], &f2[..]);
        channel.disconnect().await;
    }

    #[tokio::test]
    async fn test_read_timeout_is_distinct_from_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let silent = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(sock);
        });

        let mut channel = PtpChannel::new(addr.ip().to_string(), addr.port(), "command")
            .with_read_timeout(Duration::from_millis(50));
        channel.connect().await.unwrap();

        assert!(matches!(channel.recv_packet().await, Err(Error::ReadTimeout)));
        channel.disconnect().await;
        silent.abort();
    }

    #[tokio::test]
    async fn test_peer_close_surfaces_connection_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            drop(sock);
        });

        let mut channel = PtpChannel::new(addr.ip().to_string(), addr.port(), "event");
        channel.connect().await.unwrap();

        assert!(matches!(
            channel.recv_packet().await,
            Err(Error::ConnectionClosed)
        ));
        channel.disconnect().await;
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // port 1 is almost certainly closed
        let mut channel = PtpChannel::new("127.0.0.1", 1, "command")
            .with_connect_timeout(Duration::from_millis(500));
        assert!(channel.connect().await.is_err());
        assert!(!channel.is_connected());
    }
}
