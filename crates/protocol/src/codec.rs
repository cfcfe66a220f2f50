//! Tokio codec for frame streams.

use bytes::{Buf, BytesMut};
use diana_core::{DianaError, Provenance};
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, NextFrame, HEADER_SIZE};
use crate::packets::Packet;
use crate::registry::decode_packet;

/// Frame codec for one direction pair of a connection
///
/// `inbound` is the origin every received frame must claim; `outbound` is
/// the origin written on every sent frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    inbound: Provenance,
    outbound: Provenance,
}

impl FrameCodec {
    pub fn new(inbound: Provenance, outbound: Provenance) -> Self {
        Self { inbound, outbound }
    }

    /// Codec for a client talking to a server
    pub fn client() -> Self {
        Self::new(Provenance::Server, Provenance::Client)
    }

    /// Codec for a server talking to a client
    pub fn server() -> Self {
        Self::new(Provenance::Client, Provenance::Server)
    }

    pub fn inbound(&self) -> Provenance {
        self.inbound
    }

    pub fn outbound(&self) -> Provenance {
        self.outbound
    }
}

impl Decoder for FrameCodec {
    type Item = Packet;
    type Error = DianaError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match frame::next_frame(&src[..], self.inbound)? {
            NextFrame::Complete { start, end, header } => {
                src.advance(start);
                let frame = src.split_to(end - start);
                let payload = &frame[HEADER_SIZE..HEADER_SIZE + header.payload_len()];
                let packet = decode_packet(header.packet_type, payload)?;
                Ok(Some(packet))
            }
            NextFrame::Incomplete { start } => {
                src.advance(start);
                Ok(None)
            }
        }
    }
}

impl Encoder<Packet> for FrameCodec {
    type Error = DianaError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        frame::encode_into(&item, self.outbound, dst)?;
        Ok(())
    }
}
