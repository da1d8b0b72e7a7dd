//! PTP/IP packet encoding and header decoding
//!
//! # Packet structure
//!
//! ```text
//! ┌─────────────┬─────────────┬──────────────────────────┐
//! │  total_len  │ packet_type │         payload          │
//! │   4 bytes   │   4 bytes   │  depends on packet_type  │
//! │  (LE u32)   │  (LE u32)   │                          │
//! └─────────────┴─────────────┴──────────────────────────┘
//! ```
//!
//! `total_len` includes the 8-byte header itself. All multi-byte values
//! are little-endian. Builders return one contiguous buffer sized exactly
//! to the packet; field readers return 0 when the source buffer is too
//! short for the requested field, so truncation is detected by length
//! checks at the call site.

use bytes::{BufMut, BytesMut};

use crate::error::Error;
use crate::{HEADER_SIZE, PROTOCOL_VERSION};

/// PTP/IP packet types
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PacketType {
    InitCommandRequest = 0x0001,
    InitCommandAck = 0x0002,
    InitEventRequest = 0x0003,
    InitEventAck = 0x0004,
    InitFail = 0x0005,
    OperationRequest = 0x0006,
    OperationResponse = 0x0007,
    Event = 0x0008,
    StartData = 0x0009,
    Data = 0x000A,
    Cancel = 0x000B,
    EndData = 0x000C,
    ProbeRequest = 0x000D,
    ProbeResponse = 0x000E,
}

impl TryFrom<u32> for PacketType {
    type Error = Error;

    fn try_from(v: u32) -> Result<Self, Error> {
        match v {
            0x0001 => Ok(Self::InitCommandRequest),
            0x0002 => Ok(Self::InitCommandAck),
            0x0003 => Ok(Self::InitEventRequest),
            0x0004 => Ok(Self::InitEventAck),
            0x0005 => Ok(Self::InitFail),
            0x0006 => Ok(Self::OperationRequest),
            0x0007 => Ok(Self::OperationResponse),
            0x0008 => Ok(Self::Event),
            0x0009 => Ok(Self::StartData),
            0x000A => Ok(Self::Data),
            0x000B => Ok(Self::Cancel),
            0x000C => Ok(Self::EndData),
            0x000D => Ok(Self::ProbeRequest),
            0x000E => Ok(Self::ProbeResponse),
            other => Err(Error::UnknownPacketType(other)),
        }
    }
}

impl PacketType {
    /// Read the packet type field of a framed packet.
    ///
    /// Returns `None` for truncated buffers and for type values this
    /// client does not know; unknown types must be ignorable, not fatal.
    pub fn of(packet: &[u8]) -> Option<PacketType> {
        if packet.len() < HEADER_SIZE {
            return None;
        }
        Self::try_from(read_u32_le(packet, 4)).ok()
    }
}

/// Read a little-endian u16, or 0 if the field does not fit
pub fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    match buf.get(offset..offset + 2) {
        Some(b) => u16::from_le_bytes([b[0], b[1]]),
        None => 0,
    }
}

/// Read a little-endian u32, or 0 if the field does not fit
pub fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    match buf.get(offset..offset + 4) {
        Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        None => 0,
    }
}

/// Read a little-endian u64, or 0 if the field does not fit
pub fn read_u64_le(buf: &[u8], offset: usize) -> u64 {
    match buf.get(offset..offset + 8) {
        Some(b) => u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        None => 0,
    }
}

/// Response code of an OperationResponse packet (u16 at offset 10)
pub fn response_code(packet: &[u8]) -> u16 {
    read_u16_le(packet, 10)
}

fn header(total_len: usize, packet_type: PacketType) -> BytesMut {
    let mut buf = BytesMut::with_capacity(total_len);
    buf.put_u32_le(total_len as u32);
    buf.put_u32_le(packet_type as u32);
    buf
}

/// Build an InitCommandRequest packet.
///
/// Layout: header | 16-byte GUID | UTF-16LE friendly name + NUL | protocol version.
pub fn init_command_request(guid: &[u8; 16], friendly_name: &str) -> BytesMut {
    let name: Vec<u16> = friendly_name.encode_utf16().collect();
    let total = HEADER_SIZE + 16 + (name.len() + 1) * 2 + 4;

    let mut buf = header(total, PacketType::InitCommandRequest);
    buf.put_slice(guid);
    for unit in name {
        buf.put_u16_le(unit);
    }
    buf.put_u16_le(0);
    buf.put_u32_le(PROTOCOL_VERSION);
    buf
}

/// Build an InitEventRequest packet carrying the camera-assigned connection id
pub fn init_event_request(connection_id: u32) -> BytesMut {
    let mut buf = header(12, PacketType::InitEventRequest);
    buf.put_u32_le(connection_id);
    buf
}

/// Build an OperationRequest packet.
///
/// `with_data` selects the data-phase indicator: `false` for a command-only
/// operation (1), `true` when an outbound data phase follows (2).
pub fn operation_request(opcode: u16, transaction_id: u32, params: &[u32], with_data: bool) -> BytesMut {
    let total = HEADER_SIZE + 4 + 2 + 4 + params.len() * 4;

    let mut buf = header(total, PacketType::OperationRequest);
    buf.put_u32_le(if with_data { 2 } else { 1 });
    buf.put_u16_le(opcode);
    buf.put_u32_le(transaction_id);
    for &p in params {
        buf.put_u32_le(p);
    }
    buf
}

/// Build a StartData packet announcing the size of the outbound data phase
pub fn start_data(transaction_id: u32, payload_size: u64) -> BytesMut {
    let mut buf = header(20, PacketType::StartData);
    buf.put_u32_le(transaction_id);
    buf.put_u64_le(payload_size);
    buf
}

/// Build an EndData packet carrying the entire outbound payload
pub fn end_data(transaction_id: u32, payload: &[u8]) -> BytesMut {
    let mut buf = header(HEADER_SIZE + 4 + payload.len(), PacketType::EndData);
    buf.put_u32_le(transaction_id);
    buf.put_slice(payload);
    buf
}

/// Build a ProbeRequest packet (header only)
pub fn probe_request() -> BytesMut {
    header(HEADER_SIZE, PacketType::ProbeRequest)
}
