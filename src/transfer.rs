//! Chunked file download state machine.
//!
//! The device answers a file request with a sequence of file-data frames. A
//! chunk carrying the continuation marker asks for a follow-up request; the
//! terminal marker ends the transfer. The protocol has no session id, so only
//! one transfer can run at a time (see [`crate::session::correlation`]).

use thiserror::Error;
use tracing::{debug, warn};

use crate::messages::{FileData, FileRequest};
use crate::profile::CompiledProfile;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("unexpected file chunk marker 0x{0:02X}")]
    UnexpectedMarker(u8),
    #[error("connection closed during transfer")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("file chunk received while transfer is {0:?}")]
    NotReceiving(TransferState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Requested,
    Receiving,
    Complete,
    Failed,
}

/// Result of feeding one chunk.
#[derive(Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Send this follow-up request and keep receiving.
    Continue(FileRequest),
    Complete(Vec<u8>),
    Failed(TransferError),
}

#[derive(Debug)]
pub struct FileTransfer {
    filename: String,
    chunk_size: u16,
    continuation_marker: u8,
    terminal_marker: u8,
    state: TransferState,
    buffer: Vec<u8>,
    chunks: usize,
}

impl FileTransfer {
    pub fn new(filename: impl Into<String>, profile: &CompiledProfile) -> Self {
        Self {
            filename: filename.into(),
            chunk_size: profile.chunk_size(),
            continuation_marker: profile.continuation_marker(),
            terminal_marker: profile.terminal_marker(),
            state: TransferState::Idle,
            buffer: Vec::new(),
            chunks: 0,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// The opening request of the transfer.
    pub fn first_request(&mut self) -> FileRequest {
        self.state = TransferState::Requested;
        self.request(true)
    }

    fn request(&self, first: bool) -> FileRequest {
        FileRequest {
            filename: self.filename.clone(),
            first,
            // bounded by MAX_CHUNK_SIZE at profile compile time
            chunk_size: self.chunk_size as i16,
        }
    }

    pub fn on_chunk(&mut self, data: &FileData) -> ChunkOutcome {
        if !matches!(
            self.state,
            TransferState::Requested | TransferState::Receiving
        ) {
            return ChunkOutcome::Failed(TransferError::NotReceiving(self.state));
        }
        if data.filename != self.filename {
            debug!(expected = %self.filename, got = %data.filename, "file chunk names a different file");
        }

        self.buffer.extend_from_slice(&data.chunk);
        self.chunks += 1;

        if data.marker == self.terminal_marker {
            self.state = TransferState::Complete;
            debug!(file = %self.filename, chunks = self.chunks, len = self.buffer.len(), "file transfer complete");
            ChunkOutcome::Complete(std::mem::take(&mut self.buffer))
        } else if data.marker == self.continuation_marker {
            self.state = TransferState::Receiving;
            ChunkOutcome::Continue(self.request(false))
        } else {
            warn!(file = %self.filename, marker = data.marker, "unexpected file chunk marker");
            self.state = TransferState::Failed;
            self.buffer.clear();
            ChunkOutcome::Failed(TransferError::UnexpectedMarker(data.marker))
        }
    }
}
