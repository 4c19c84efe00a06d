//! Salted HMAC login.
//!
//! The client asks for a salt, signs the auth-signing message with
//! HMAC-SHA-256 keyed by `base_secret || password`, and sends the signature in
//! an auth request. Salt and auth replies are matched to their requests by
//! category only (see [`crate::session::correlation`]).

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{Codec, CodecError};
use crate::messages::{AuthRequest, Request, SaltRequest};
use crate::session::{AuthState, AuthStateError, Busy, Session};

pub mod transport;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error(transparent)]
    Busy(#[from] Busy),
    #[error("salt request rejected with status {0}")]
    SaltRejected(u32),
    #[error("authentication failed with result code {0}")]
    AuthFailed(u32),
    #[error("connection closed before the device replied")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<AuthStateError> for HandshakeError {
    fn from(err: AuthStateError) -> Self {
        HandshakeError::Protocol(err.to_string())
    }
}

/// Byte-level write side used by the handshake; the TCP link implements it.
#[async_trait]
pub trait ControlTransport: Send + Sync {
    async fn send_frame(&self, frame: &[u8]) -> io::Result<()>;
}

/// Login and password for the salted handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opaque 64-bit stamp for salt requests and zone queries.
pub fn stamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// HMAC key: the protocol-wide base secret followed by the password.
pub fn signing_key(base_secret: &[u8], password: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(base_secret.len() + password.len());
    key.extend_from_slice(base_secret);
    key.extend_from_slice(password.as_bytes());
    key
}

pub fn sign(key: &[u8], message: &[u8]) -> Result<[u8; 32], HandshakeError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| HandshakeError::Protocol(format!("hmac key: {e}")))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// Drives one salt → auth exchange over a control transport.
pub struct ClientHandshake<'a> {
    pub codec: &'a Codec,
    pub base_secret: &'a [u8],
    pub credentials: &'a Credentials,
    pub session: &'a Arc<Session>,
}

impl ClientHandshake<'_> {
    /// Runs the exchange.
    ///
    /// # Guarantees
    /// * A second salt or auth request while one is outstanding fails with
    ///   [`HandshakeError::Busy`] before any byte is written.
    /// * On success the session is `Authenticated`; a nonzero result code
    ///   leaves it `Failed(code)`; any other error returns it to `Idle`.
    /// * Dropping the future mid-exchange also returns the session to `Idle`,
    ///   so a caller-side timeout does not block the next attempt.
    pub async fn run<T>(&self, transport: &T) -> Result<(), HandshakeError>
    where
        T: ControlTransport + ?Sized,
    {
        let result = self.exchange(transport).await;
        match &result {
            Ok(()) | Err(HandshakeError::AuthFailed(_) | HandshakeError::Busy(_)) => {}
            Err(err) => warn!(error = %err, "handshake aborted"),
        }
        result
    }

    async fn exchange<T>(&self, transport: &T) -> Result<(), HandshakeError>
    where
        T: ControlTransport + ?Sized,
    {
        let (salt_rx, salt_guard) = self.session.arm_salt()?;
        let _progress = self.session.begin_handshake();
        let frame = self
            .codec
            .encode_request(&Request::Salt(SaltRequest { timestamp: stamp() }))?;
        self.session.transition(AuthState::SaltRequested)?;
        transport
            .send_frame(&frame)
            .await
            .map_err(|e| HandshakeError::Transport(e.to_string()))?;
        let salt = salt_rx.await.map_err(|_| HandshakeError::Closed)?;
        drop(salt_guard);

        if salt.status != 0 {
            return Err(HandshakeError::SaltRejected(salt.status));
        }
        self.session.transition(AuthState::SaltReceived)?;
        debug!(stamp = salt.timestamp, "salt received");

        let message =
            self.codec
                .signing_message(salt.timestamp, &self.credentials.login, &salt.salt)?;
        let key = signing_key(self.base_secret, self.credentials.password());
        let signature = sign(&key, &message)?;

        let (auth_rx, _auth_guard) = self.session.arm_auth()?;
        let frame = self.codec.encode_request(&Request::Auth(AuthRequest {
            timestamp: salt.timestamp,
            login: self.credentials.login.clone(),
            salt: salt.salt,
            signature,
        }))?;
        self.session.transition(AuthState::AuthRequested)?;
        transport
            .send_frame(&frame)
            .await
            .map_err(|e| HandshakeError::Transport(e.to_string()))?;
        let reply = auth_rx.await.map_err(|_| HandshakeError::Closed)?;

        if reply.result == 0 {
            self.session.transition(AuthState::Authenticated)?;
            info!(login = %self.credentials.login, "authenticated");
            Ok(())
        } else {
            self.session.transition(AuthState::Failed(reply.result))?;
            warn!(code = reply.result, "authentication rejected");
            Err(HandshakeError::AuthFailed(reply.result))
        }
    }
}
