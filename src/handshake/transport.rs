use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::codec::Decoder;
use tracing::{debug, info, trace, warn};

use super::ControlTransport;
use crate::codec::framing::ReplyDecoder;
use crate::codec::Codec;
use crate::dispatch::Dispatcher;
use crate::session::Session;
use crate::transfer::TransferError;

const READ_CHUNK: usize = 4096;

/// Fire-and-forget datagram path for scene triggers.
#[derive(Debug)]
pub struct DatagramSender {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl DatagramSender {
    pub async fn bind(peer: SocketAddr) -> io::Result<Self> {
        let local = if peer.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(local).await?;
        Ok(Self { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sends one frame. Delivery is not confirmed.
    pub async fn send(&self, frame: &[u8]) -> io::Result<()> {
        let sent = self.socket.send_to(frame, self.peer).await?;
        debug!(peer = %self.peer, len = sent, "datagram sent");
        Ok(())
    }
}

/// Timing knobs of the control stream.
#[derive(Debug, Clone, Copy)]
pub struct LinkOptions {
    pub connect_timeout: Duration,
    pub reconnect_backoff: Duration,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            reconnect_backoff: Duration::from_millis(500),
        }
    }
}

async fn connect(peer: &str, timeout: Duration) -> io::Result<TcpStream> {
    let stream = time::timeout(timeout, TcpStream::connect(peer))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "control stream is not open")
}

/// Write half of the persistent control stream.
///
/// The read half lives in the connection's read loop, which swaps in a fresh
/// writer whenever it reopens the stream. `open` flips to false before the old
/// writer is taken and back to true once the new one is in place.
#[derive(Debug)]
pub struct StreamLink {
    peer: String,
    options: LinkOptions,
    writer: Mutex<Option<OwnedWriteHalf>>,
    open: watch::Sender<bool>,
    running: AtomicBool,
    reconnects: AtomicU64,
}

impl StreamLink {
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Times the read loop reopened the stream.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Writes and flushes one frame.
    ///
    /// While the read loop is reopening the stream the write waits for the new
    /// stream, up to the connect timeout.
    ///
    /// # Errors
    /// `NotConnected` after close, `TimedOut` when the stream is not back in
    /// time.
    pub async fn write_frame(&self, frame: &[u8]) -> io::Result<()> {
        let mut guard = self.writer.lock().await;
        if guard.is_none() {
            drop(guard);
            self.wait_reopened().await?;
            guard = self.writer.lock().await;
        }
        let writer = guard.as_mut().ok_or_else(not_connected)?;
        writer.write_all(frame).await?;
        writer.flush().await?;
        trace!(peer = %self.peer, len = frame.len(), "frame written");
        Ok(())
    }

    async fn wait_reopened(&self) -> io::Result<()> {
        if !self.is_running() {
            return Err(not_connected());
        }
        let mut open = self.open.subscribe();
        debug!(peer = %self.peer, "write waiting for reconnect");
        let waited = time::timeout(
            self.options.connect_timeout,
            open.wait_for(|up| *up || !self.is_running()),
        )
        .await
        .map(|changed| changed.is_ok());
        match waited {
            Ok(true) if self.is_running() => Ok(()),
            Ok(_) => Err(not_connected()),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "control stream was not reopened in time",
            )),
        }
    }

    async fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.open.send_replace(false);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }

    /// Parks writers until `reopen` installs a new stream.
    async fn detach(&self) {
        self.open.send_replace(false);
        self.writer.lock().await.take();
    }

    async fn reopen(&self) -> Option<OwnedReadHalf> {
        let mut attempt: u32 = 0;
        while self.is_running() {
            attempt += 1;
            match connect(&self.peer, self.options.connect_timeout).await {
                Ok(stream) => {
                    let (reader, writer) = stream.into_split();
                    *self.writer.lock().await = Some(writer);
                    self.open.send_replace(true);
                    self.reconnects.fetch_add(1, Ordering::SeqCst);
                    info!(peer = %self.peer, attempt, "control stream reopened");
                    return Some(reader);
                }
                Err(err) => {
                    warn!(peer = %self.peer, attempt, error = %err, "reconnect failed");
                    time::sleep(self.options.reconnect_backoff).await;
                }
            }
        }
        None
    }
}

#[async_trait]
impl ControlTransport for StreamLink {
    async fn send_frame(&self, frame: &[u8]) -> io::Result<()> {
        self.write_frame(frame).await
    }
}

/// An open control stream plus its read loop.
///
/// # Guarantees
/// * The read loop is aborted when the connection is closed or dropped.
/// * Closing fails every outstanding correlation with a closed error.
#[derive(Debug)]
pub struct Connection {
    link: Arc<StreamLink>,
    session: Arc<Session>,
    reader: Option<JoinHandle<()>>,
}

impl Connection {
    /// Connects to `peer` (host:port) and spawns the read loop.
    pub async fn open(
        peer: String,
        options: LinkOptions,
        codec: Codec,
        dispatcher: Dispatcher,
        session: Arc<Session>,
    ) -> io::Result<Self> {
        let stream = connect(&peer, options.connect_timeout).await?;
        let (reader, writer) = stream.into_split();
        info!(peer = %peer, "control stream open");
        let link = Arc::new(StreamLink {
            peer,
            options,
            writer: Mutex::new(Some(writer)),
            open: watch::channel(true).0,
            running: AtomicBool::new(true),
            reconnects: AtomicU64::new(0),
        });
        let handle = tokio::spawn(read_loop(
            link.clone(),
            reader,
            codec,
            dispatcher,
            session.clone(),
        ));
        Ok(Self {
            link,
            session,
            reader: Some(handle),
        })
    }

    pub fn link(&self) -> &Arc<StreamLink> {
        &self.link
    }

    pub async fn close(mut self) {
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        self.link.close().await;
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
        self.session.connection_lost();
        info!(peer = %self.link.peer, "control stream closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.link.running.store(false, Ordering::SeqCst);
        self.link.open.send_replace(false);
        if let Some(handle) = self.reader.take() {
            handle.abort();
            self.session.connection_lost();
        }
    }
}

async fn read_loop(
    link: Arc<StreamLink>,
    mut reader: OwnedReadHalf,
    codec: Codec,
    dispatcher: Dispatcher,
    session: Arc<Session>,
) {
    let mut decoder = ReplyDecoder::new(codec.clone());
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    loop {
        buf.reserve(READ_CHUNK);
        let lost = match reader.read_buf(&mut buf).await {
            Ok(0) => {
                info!(peer = %link.peer, "control stream ended");
                true
            }
            Ok(len) => {
                trace!(peer = %link.peer, len, "bytes received");
                drain(&link, &mut decoder, &mut buf, &codec, &dispatcher, &session).await;
                false
            }
            Err(err) => {
                warn!(peer = %link.peer, error = %err, "control stream read failed");
                true
            }
        };
        if !lost {
            continue;
        }

        link.detach().await;
        session.connection_lost();
        if !link.is_running() {
            break;
        }
        match link.reopen().await {
            Some(next) => {
                reader = next;
                buf.clear();
                decoder = ReplyDecoder::new(codec.clone());
            }
            None => break,
        }
    }
    debug!(peer = %link.peer, "read loop exited");
}

async fn drain(
    link: &StreamLink,
    decoder: &mut ReplyDecoder,
    buf: &mut BytesMut,
    codec: &Codec,
    dispatcher: &Dispatcher,
    session: &Session,
) {
    loop {
        let reply = match decoder.decode(buf) {
            Ok(Some(reply)) => reply,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "frame decoder failed, discarding buffer");
                buf.clear();
                return;
            }
        };
        let Some(next) = dispatcher.dispatch(reply) else {
            continue;
        };
        let written = match codec.encode_request(&next) {
            Ok(frame) => link
                .write_frame(&frame)
                .await
                .map_err(|e| TransferError::Transport(e.to_string())),
            Err(err) => Err(TransferError::Transport(err.to_string())),
        };
        if let Err(err) = written {
            warn!(error = %err, "follow-up request failed");
            session.with_correlations(|c| {
                if let Some(waiter) = c.file.take() {
                    let _ = waiter.tx.send(Err(err));
                }
            });
        }
    }
}
