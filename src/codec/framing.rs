//! Splits the unframed TCP byte stream into fixed-size reply frames.
//!
//! The control channel carries frames back to back with no length prefix, so
//! the frame length is derived from the opcode. A frame with an opcode we have
//! no layout for cannot be skipped precisely; the buffered bytes are dropped
//! and decoding resumes with the next read.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::{trace, warn};

use super::Codec;
use crate::messages::{Opcode, Reply, HEADER_LEN, IDENTIFIER_LEN};

/// Stream decoder yielding one [`Reply`] per complete frame.
#[derive(Debug, Clone)]
pub struct ReplyDecoder {
    codec: Codec,
    discarded: u64,
}

impl ReplyDecoder {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            discarded: 0,
        }
    }

    /// Bytes thrown away because they could not be framed or decoded.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl Decoder for ReplyDecoder {
    type Item = Reply;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }

            let raw = u16::from_le_bytes([src[IDENTIFIER_LEN], src[IDENTIFIER_LEN + 1]]);
            let Some(len) = Opcode::from_u16(raw).and_then(|op| self.codec.reply_len(op)) else {
                warn!(
                    opcode = raw,
                    discarded = src.len(),
                    "unknown opcode on control stream, discarding buffered bytes"
                );
                self.discarded += src.len() as u64;
                src.clear();
                return Ok(None);
            };

            if src.len() < len {
                src.reserve(len - src.len());
                return Ok(None);
            }

            let frame = src.split_to(len);
            match self.codec.decode_reply(&frame) {
                Ok(reply) => {
                    trace!(opcode = raw, len, "frame decoded");
                    return Ok(Some(reply));
                }
                Err(err) => {
                    warn!(opcode = raw, error = %err, "dropping malformed frame");
                    self.discarded += len as u64;
                }
            }
        }
    }
}
