//! # Frame Protocol
//!
//! Every packet travels in a frame with a 24-byte little-endian header:
//!
//! ```text
//! {I magic=0xdeadbeef}{I length}{I origin}{I padding=0}{I length-20}{I packet type}
//! ```
//!
//! followed by `length - 24` payload bytes. Frames are concatenated back to
//! back on the stream. Decoding is incremental: call [`decode`] with
//! everything received so far, keep the returned remainder, append new bytes
//! and call again. Each packet is returned exactly once.

use bytes::{Buf, BufMut, BytesMut};
use diana_core::Provenance;

use crate::error::{ProtocolError, Result};
use crate::packets::Packet;
use crate::registry::decode_packet;

/// First header word
pub const MAGIC: u32 = 0xdead_beef;

/// Header length in bytes
pub const HEADER_SIZE: usize = 24;

/// Low byte of the magic, the first byte of every frame on the wire
pub const SYNC_BYTE: u8 = 0xef;

/// Largest frame length accepted from the wire
pub const MAX_FRAME_LENGTH: u32 = 1 << 20;

/// The remaining-length field counts from the packet-type word onward
const REMAINING_OFFSET: u32 = 20;

/// Parsed frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub provenance: u32,
    pub padding: u32,
    pub remaining: u32,
    pub packet_type: u32,
}

impl FrameHeader {
    /// Parse and validate the first [`HEADER_SIZE`] bytes of `data`
    ///
    /// # Errors
    /// Magic mismatch, a length outside `HEADER_SIZE..=MAX_FRAME_LENGTH`, an
    /// origin other than `expected`, or a remaining-length that disagrees with
    /// the length.
    pub fn parse(data: &[u8], expected: Provenance) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                needed: HEADER_SIZE,
                available: data.len(),
            });
        }

        let mut header = &data[..HEADER_SIZE];
        let magic = header.get_u32_le();
        if magic != MAGIC {
            return Err(ProtocolError::BadMagic(magic));
        }

        let parsed = Self {
            length: header.get_u32_le(),
            provenance: header.get_u32_le(),
            padding: header.get_u32_le(),
            remaining: header.get_u32_le(),
            packet_type: header.get_u32_le(),
        };

        if (parsed.length as usize) < HEADER_SIZE {
            return Err(ProtocolError::FrameTooShort(parsed.length));
        }
        if parsed.length > MAX_FRAME_LENGTH {
            return Err(ProtocolError::FrameTooLong {
                length: parsed.length,
                max: MAX_FRAME_LENGTH,
            });
        }
        if parsed.provenance != expected.as_u32() {
            return Err(ProtocolError::WrongProvenance {
                expected,
                found: parsed.provenance,
            });
        }
        if parsed.remaining != parsed.length - REMAINING_OFFSET {
            return Err(ProtocolError::InconsistentLength {
                total: parsed.length,
                remaining: parsed.remaining,
            });
        }
        Ok(parsed)
    }

    /// Payload bytes following the header, zero for an undersized length
    pub fn payload_len(&self) -> usize {
        (self.length as usize).saturating_sub(HEADER_SIZE)
    }
}

/// Where the next frame sits in a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NextFrame {
    /// A complete frame occupies `start..end`
    Complete {
        start: usize,
        end: usize,
        header: FrameHeader,
    },
    /// More bytes are needed; everything before `start` is noise
    Incomplete { start: usize },
}

/// Offset of the first byte that holds the magic, or a prefix of it at the
/// end of `buf`
///
/// A [`SYNC_BYTE`] followed by anything other than the rest of the magic is
/// noise and scanning moves past it.
fn frame_start(buf: &[u8]) -> usize {
    let magic = MAGIC.to_le_bytes();
    let mut offset = 0;
    while let Some(found) = buf[offset..].iter().position(|byte| *byte == SYNC_BYTE) {
        let candidate = offset + found;
        let tail = &buf[candidate..];
        let n = tail.len().min(magic.len());
        if tail[..n] == magic[..n] {
            return candidate;
        }
        offset = candidate + 1;
    }
    buf.len()
}

/// Locate the next frame, resynchronising on the magic if needed
pub(crate) fn next_frame(buf: &[u8], expected: Provenance) -> Result<NextFrame> {
    let start = frame_start(buf);
    if start > 0 {
        tracing::warn!("Stream desync: discarding {} bytes before next frame", start);
    }

    let framed = &buf[start..];
    if framed.len() < HEADER_SIZE {
        return Ok(NextFrame::Incomplete { start });
    }

    let header = FrameHeader::parse(framed, expected)?;
    let length = header.length as usize;
    if framed.len() < length {
        return Ok(NextFrame::Incomplete { start });
    }

    Ok(NextFrame::Complete {
        start,
        end: start + length,
        header,
    })
}

/// Decode every complete frame in `buf`
///
/// Returns the packets in stream order and the unconsumed tail, which starts
/// at the first incomplete frame. A structural error in any frame fails the
/// whole call.
pub fn decode(buf: &[u8], provenance: Provenance) -> Result<(Vec<Packet>, &[u8])> {
    let mut packets = Vec::new();
    let mut rest = buf;

    loop {
        match next_frame(rest, provenance)? {
            NextFrame::Complete { start, end, header } => {
                let body = start + HEADER_SIZE;
                let payload = &rest[body..body + header.payload_len()];
                packets.push(decode_packet(header.packet_type, payload)?);
                rest = &rest[end..];
            }
            NextFrame::Incomplete { start } => return Ok((packets, &rest[start..])),
        }
    }
}

/// Encode one packet as a complete frame
pub fn encode(packet: &Packet, provenance: Provenance) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    encode_into(packet, provenance, &mut buf)?;
    Ok(buf)
}

/// Append one framed packet to `buf`
pub fn encode_into(packet: &Packet, provenance: Provenance, buf: &mut BytesMut) -> Result<()> {
    let mut body = BytesMut::new();
    packet.write_body(&mut body)?;

    let length = u32::try_from(HEADER_SIZE + body.len())
        .map_err(|_| ProtocolError::InvalidData(format!("Payload too large: {} bytes", body.len())))?;

    buf.reserve(length as usize);
    buf.put_u32_le(MAGIC);
    buf.put_u32_le(length);
    buf.put_u32_le(provenance.as_u32());
    buf.put_u32_le(0);
    buf.put_u32_le(length - REMAINING_OFFSET);
    buf.put_u32_le(packet.packet_type());
    buf.put_slice(&body);
    Ok(())
}
