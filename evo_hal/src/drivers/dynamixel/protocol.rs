//! DYNAMIXEL Protocol 2.0 packet codec.
//!
//! ```text
//! ┌────────────┬────┬────────┬─────────────┬──────────────────┬────────┐
//! │ FF FF FD 00│ ID │ LEN(2) │ INSTRUCTION │ PARAMS (stuffed) │ CRC(2) │
//! └────────────┴────┴────────┴─────────────┴──────────────────┴────────┘
//! ```
//!
//! `LEN` counts instruction, parameters and CRC. Status packets use
//! instruction `0x55` followed by an error byte. Multi-byte fields are
//! little-endian. The CRC is CRC-16/BUYPASS over everything before it.

use crc_any::CRCu16;
use std::io::{self, Read};
use thiserror::Error;

/// Packet header.
pub const HEADER: [u8; 4] = [0xFF, 0xFF, 0xFD, 0x00];

/// Broadcast ID used by sync write and bulk read.
pub const BROADCAST_ID: u8 = 0xFE;

const STATUS: u8 = 0x55;
const STUFFING: u8 = 0xFD;
const MAX_LENGTH: usize = 1024;
const MAX_SYNC_BYTES: usize = 512;

/// Instructions used by the bus driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Instruction {
    /// Presence check; status carries model number and firmware version.
    Ping = 0x01,
    /// Write a control-table range of one device.
    Write = 0x03,
    /// Same range written on many devices in one broadcast, no status.
    SyncWrite = 0x83,
    /// Per-device ranges read in one request, one status per device.
    BulkRead = 0x92,
}

/// Failure to receive a usable status packet.
#[derive(Debug, Error)]
pub enum PacketError {
    /// Nothing (or only part of a packet) arrived before the read timeout.
    #[error("no status packet before timeout")]
    Timeout,

    /// The serial port itself failed.
    #[error("serial I/O failed: {0}")]
    Io(io::Error),

    /// Checksum did not match.
    #[error("CRC mismatch (computed {computed:#06x}, received {received:#06x})")]
    Crc {
        /// CRC over the received bytes.
        computed: u16,
        /// CRC field of the packet.
        received: u16,
    },

    /// Framing was wrong.
    #[error("malformed status packet: {0}")]
    Malformed(&'static str),
}

impl From<io::Error> for PacketError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::UnexpectedEof => {
                Self::Timeout
            }
            _ => Self::Io(e),
        }
    }
}

/// Reply of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPacket {
    /// Replying device.
    pub id: u8,
    /// Error field. Bit 7 is the hardware alert flag.
    pub error: u8,
    /// Unstuffed parameters.
    pub params: Vec<u8>,
}

impl StatusPacket {
    /// True when the device rejected the instruction.
    ///
    /// The hardware alert bit alone does not invalidate returned data.
    pub fn failed(&self) -> bool {
        self.error & 0x7F != 0
    }
}

/// CRC-16/BUYPASS (poly 0x8005, init 0, unreflected).
pub fn crc(bytes: &[u8]) -> u16 {
    let mut crc = CRCu16::crc16buypass();
    crc.digest(bytes);
    crc.get_crc()
}

/// Encode an instruction packet.
pub fn encode(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
    frame(id, instruction as u8, params)
}

/// Encode a status packet, as a device would send it.
#[cfg(test)]
pub(crate) fn encode_status(id: u8, error: u8, params: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(params.len() + 1);
    body.push(error);
    body.extend_from_slice(params);
    frame(id, STATUS, &body)
}

fn frame(id: u8, code: u8, body: &[u8]) -> Vec<u8> {
    let body = stuff(body);
    let length = (body.len() + 3) as u16;

    let mut packet = Vec::with_capacity(HEADER.len() + 4 + body.len() + 2);
    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.extend_from_slice(&length.to_le_bytes());
    packet.push(code);
    packet.extend_from_slice(&body);
    let crc = crc(&packet);
    packet.extend_from_slice(&crc.to_le_bytes());
    packet
}

/// Insert `0xFD` after every `FF FF FD` so the header cannot reappear.
fn stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    for &b in data {
        out.push(b);
        if out.ends_with(&[0xFF, 0xFF, STUFFING]) {
            out.push(STUFFING);
        }
    }
    out
}

fn unstuff(data: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .filter(|&(i, &b)| !(b == STUFFING && i >= 3 && data[i - 3..i] == [0xFF, 0xFF, STUFFING]))
        .map(|(_, &b)| b)
        .collect()
}

/// Read one status packet, skipping noise before the header.
pub fn read_status<R: Read + ?Sized>(port: &mut R) -> Result<StatusPacket, PacketError> {
    let mut window = [0u8; 4];
    let mut skipped = 0usize;
    loop {
        let mut byte = [0u8; 1];
        port.read_exact(&mut byte)?;
        window.rotate_left(1);
        window[3] = byte[0];
        if window == HEADER {
            break;
        }
        skipped += 1;
        if skipped > MAX_SYNC_BYTES {
            return Err(PacketError::Malformed("no header"));
        }
    }

    let mut meta = [0u8; 3];
    port.read_exact(&mut meta)?;
    let length = usize::from(u16::from_le_bytes([meta[1], meta[2]]));
    // status code + error + CRC at minimum
    if !(4..=MAX_LENGTH).contains(&length) {
        return Err(PacketError::Malformed("length out of range"));
    }

    let mut rest = vec![0u8; length];
    port.read_exact(&mut rest)?;
    let (body, tail) = rest.split_at(length - 2);

    let mut covered = Vec::with_capacity(HEADER.len() + meta.len() + body.len());
    covered.extend_from_slice(&HEADER);
    covered.extend_from_slice(&meta);
    covered.extend_from_slice(body);
    let computed = crc(&covered);
    let received = u16::from_le_bytes([tail[0], tail[1]]);
    if computed != received {
        return Err(PacketError::Crc { computed, received });
    }

    let body = unstuff(body);
    if body[0] != STATUS {
        return Err(PacketError::Malformed("not a status packet"));
    }
    Ok(StatusPacket {
        id: meta[0],
        error: body[1],
        params: body[2..].to_vec(),
    })
}

/// Parameters of a bulk read: `(id, address, length)` per device.
pub fn bulk_read_params(entries: impl IntoIterator<Item = (u8, u16, u16)>) -> Vec<u8> {
    let mut params = Vec::new();
    for (id, address, length) in entries {
        params.push(id);
        params.extend_from_slice(&address.to_le_bytes());
        params.extend_from_slice(&length.to_le_bytes());
    }
    params
}

/// Parameters of a 4-byte sync write starting at `address`.
pub fn sync_write_params(address: u16, values: impl IntoIterator<Item = (u8, i32)>) -> Vec<u8> {
    let mut params = Vec::new();
    params.extend_from_slice(&address.to_le_bytes());
    params.extend_from_slice(&4u16.to_le_bytes());
    for (id, value) in values {
        params.push(id);
        params.extend_from_slice(&value.to_le_bytes());
    }
    params
}

/// Parameters of a register write.
pub fn write_params(address: u16, data: &[u8]) -> Vec<u8> {
    let mut params = Vec::with_capacity(2 + data.len());
    params.extend_from_slice(&address.to_le_bytes());
    params.extend_from_slice(data);
    params
}

/// Little-endian signed 32-bit field at the start of `bytes`.
pub fn le_i32(bytes: &[u8]) -> Option<i32> {
    bytes
        .get(..4)
        .and_then(|b| <[u8; 4]>::try_from(b).ok())
        .map(i32::from_le_bytes)
}

/// Little-endian signed 16-bit field at the start of `bytes`.
pub fn le_i16(bytes: &[u8]) -> Option<i16> {
    bytes
        .get(..2)
        .and_then(|b| <[u8; 2]>::try_from(b).ok())
        .map(i16::from_le_bytes)
}
