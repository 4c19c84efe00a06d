use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

use crate::codec::{Codec, CodecError};
use crate::messages::{PollReply, PollRequest, Reply, Request};
use crate::profile::CompiledProfile;

/// A controller that answered the discovery poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub addr: SocketAddr,
    pub reply: PollReply,
}

impl DiscoveredDevice {
    /// Control stream endpoint advertised in the poll reply.
    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr.ip(), self.reply.tcp_port)
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("timeout waiting for replies")]
    Timeout,
}

/// Broadcasts a poll request and gathers poll replies until a deadline.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    local_addr: SocketAddr,
    broadcast_addr: SocketAddr,
    codec: Codec,
    protocol_version: u32,
    timeout: Duration,
}

impl DiscoveryClient {
    pub fn new(
        local_addr: SocketAddr,
        broadcast_addr: SocketAddr,
        profile: &CompiledProfile,
        timeout: Duration,
    ) -> Self {
        Self {
            local_addr,
            broadcast_addr,
            codec: Codec::new(profile),
            protocol_version: profile.protocol_version(),
            timeout,
        }
    }

    /// One entry per responding peer; a later reply from the same peer
    /// replaces the earlier one.
    ///
    /// # Errors
    /// `DiscoveryError::Timeout` when nobody answered before the deadline.
    pub async fn discover(&self) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        let socket = UdpSocket::bind(self.local_addr).await?;
        socket.set_broadcast(true)?;

        let poll = self.codec.encode_request(&Request::Poll(PollRequest {
            protocol_version: self.protocol_version,
        }))?;
        socket.send_to(&poll, self.broadcast_addr).await?;
        debug!(target = %self.broadcast_addr, "discovery poll sent");

        let deadline = Instant::now() + self.timeout;
        let mut devices: Vec<DiscoveredDevice> = Vec::new();
        let mut buffer = [0u8; 2048];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match timeout(remaining, socket.recv_from(&mut buffer)).await {
                Ok(Ok((len, addr))) => match self.codec.decode_reply(&buffer[..len]) {
                    Ok(Reply::Poll(reply)) => {
                        debug!(peer = %addr, name = %reply.name, "controller answered");
                        match devices.iter_mut().find(|d| d.addr == addr) {
                            Some(known) => known.reply = reply,
                            None => devices.push(DiscoveredDevice { addr, reply }),
                        }
                    }
                    Ok(other) => debug!(peer = %addr, opcode = %other.opcode(), "ignoring non-poll reply"),
                    Err(err) => debug!(peer = %addr, error = %err, "ignoring undecodable datagram"),
                },
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => break,
            }
        }

        if devices.is_empty() {
            return Err(DiscoveryError::Timeout);
        }
        Ok(devices)
    }
}
