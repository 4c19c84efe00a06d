use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time;
use tracing::{debug, info};

use crate::codec::{Codec, CodecError};
use crate::config::{ConfigError, ControllerConfig};
use crate::device::{DeviceState, NameTable, NameTableError};
use crate::dispatch::Dispatcher;
use crate::handshake::transport::{Connection, DatagramSender, StreamLink};
use crate::handshake::{stamp, ClientHandshake, Credentials, HandshakeError};
use crate::messages::{
    PollRequest, Request, Rgb, SceneTrigger, TriggerCommand, ZoneQuery, ZoneState,
};
use crate::profile::CompiledProfile;
use crate::session::{AuthState, Busy, Category, Session};
use crate::transfer::{FileTransfer, TransferError};

/// Errors emitted by the controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("file transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("name table error: {0}")]
    NameTable(#[from] NameTableError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Busy(#[from] Busy),
    #[error("controller is not started")]
    NotStarted,
    #[error("zone {0} has no known running scene")]
    UnknownZone(u16),
    #[error("connection closed")]
    Closed,
}

/// High-level client for one lighting controller.
///
/// # Guarantees
/// * The control stream and its read loop live between `start()` and
///   `stop()`; dropping the controller closes them too.
/// * Stream commands authenticate first when credentials are configured and
///   the current connection is not yet authenticated.
/// * At most one salt, auth and file request is outstanding at a time; a
///   second one fails with [`ClientError::Busy`] before anything is written.
#[derive(Debug)]
pub struct Controller {
    config: ControllerConfig,
    profile: CompiledProfile,
    codec: Codec,
    credentials: Option<Credentials>,
    session: Arc<Session>,
    state: Arc<Mutex<DeviceState>>,
    datagram: Option<DatagramSender>,
    connection: Option<Connection>,
    auth_lock: tokio::sync::Mutex<()>,
}

impl Controller {
    /// # Errors
    /// `ClientError::Config` when the host is empty or the profile is invalid.
    pub fn new(config: ControllerConfig) -> Result<Self, ClientError> {
        let profile = config.validate()?;
        let codec = Codec::new(&profile);
        let state = DeviceState::new(String::from_utf8_lossy(&profile.identifier()));
        Ok(Self {
            credentials: config.credentials(),
            config,
            profile,
            codec,
            session: Session::new(),
            state: Arc::new(Mutex::new(state)),
            datagram: None,
            connection: None,
            auth_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Configuration the controller was built from.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// True between `start()` and `stop()`.
    pub fn is_started(&self) -> bool {
        self.connection.is_some()
    }

    /// Opens the datagram sender and the control stream.
    ///
    /// Calling `start` on a started controller is a no-op. If the stream
    /// cannot be opened nothing stays open.
    pub async fn start(&mut self) -> Result<(), ClientError> {
        if self.connection.is_some() {
            return Ok(());
        }
        let udp_peer = resolve(&self.config.udp_peer()).await?;
        let datagram = DatagramSender::bind(udp_peer).await?;
        let dispatcher = Dispatcher::new(self.session.clone(), self.state.clone());
        let connection = Connection::open(
            self.config.tcp_peer(),
            self.config.link_options(),
            self.codec.clone(),
            dispatcher,
            self.session.clone(),
        )
        .await?;
        self.session.reset_auth();
        self.datagram = Some(datagram);
        self.connection = Some(connection);
        info!(host = %self.config.host, "controller started");
        Ok(())
    }

    /// Closes the stream; outstanding requests fail with a closed error.
    pub async fn stop(&mut self) {
        self.datagram = None;
        if let Some(connection) = self.connection.take() {
            connection.close().await;
            info!(host = %self.config.host, "controller stopped");
        }
    }

    /// Poll, fetch the name table, query every known zone, then wait the
    /// settle window for zone replies to arrive.
    pub async fn initialize(&self) -> Result<(), ClientError> {
        self.poll().await?;
        let bytes = self.fetch_file(&self.config.name_table_file).await?;
        let table = NameTable::parse(&bytes)?;
        debug!(
            scenes = table.scenes.len(),
            zones = table.zones.len(),
            "name table loaded"
        );
        self.state.lock().apply_name_table(table);
        self.update().await?;
        time::sleep(self.config.settle()).await;
        Ok(())
    }

    /// Runs the salt/auth handshake unless already authenticated or no
    /// password is configured.
    ///
    /// # Errors
    /// `ClientError::Handshake` with `AuthFailed(code)` on a nonzero result;
    /// the connection stays open.
    pub async fn authenticate(&self) -> Result<(), ClientError> {
        let Some(credentials) = &self.credentials else {
            return Ok(());
        };
        let link = self.link()?;
        let _serial = self.auth_lock.lock().await;
        if self.session.auth_state().is_authenticated() {
            return Ok(());
        }
        ClientHandshake {
            codec: &self.codec,
            base_secret: self.profile.base_secret(),
            credentials,
            session: &self.session,
        }
        .run(&**link)
        .await?;
        Ok(())
    }

    /// Sends a poll; the reply updates the identity fields of the state.
    pub async fn poll(&self) -> Result<(), ClientError> {
        self.send_stream(&Request::Poll(PollRequest {
            protocol_version: self.profile.protocol_version(),
        }))
        .await
    }

    /// Downloads a file over the control stream.
    pub async fn fetch_file(&self, filename: &str) -> Result<Vec<u8>, ClientError> {
        self.authenticate().await?;
        let link = self.link()?;
        let mut transfer = FileTransfer::new(filename, &self.profile);
        let frame = self
            .codec
            .encode_request(&Request::File(transfer.first_request()))?;
        let (rx, _guard) = self.session.arm_file(transfer)?;
        link.write_frame(&frame).await?;
        debug!(file = filename, "file requested");
        match rx.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ClientError::Closed),
        }
    }

    /// Asks for one zone's status; the reply lands in the state mirror.
    pub async fn query_zone(&self, zone_id: u16) -> Result<(), ClientError> {
        self.send_stream(&Request::ZoneQuery(ZoneQuery {
            timestamp: stamp(),
            zone_id,
        }))
        .await
    }

    /// Re-queries every known zone.
    pub async fn update(&self) -> Result<(), ClientError> {
        let zones = self.state.lock().known_zones();
        for zone in zones {
            self.query_zone(zone).await?;
        }
        Ok(())
    }

    /// Starts `scene` on a zone with a UDP trigger.
    pub async fn set_scene(&self, zone_id: u16, scene: u16) -> Result<(), ClientError> {
        self.trigger(zone_id, scene, TriggerCommand::Start, |_| {})
            .await
    }

    /// Sets the dimmer of the scene running on a zone.
    ///
    /// # Errors
    /// `ClientError::UnknownZone` when no running scene is known for the zone.
    pub async fn set_brightness(&self, zone_id: u16, dimmer: u16) -> Result<(), ClientError> {
        let scene = self.running_scene(zone_id)?;
        self.trigger(zone_id, scene, TriggerCommand::SetDimmer, |t| {
            t.dimmer = Some(dimmer)
        })
        .await
    }

    /// Sets the speed of the scene running on a zone.
    pub async fn set_speed(&self, zone_id: u16, speed: u16) -> Result<(), ClientError> {
        let scene = self.running_scene(zone_id)?;
        self.trigger(zone_id, scene, TriggerCommand::SetSpeed, |t| {
            t.speed = Some(speed)
        })
        .await
    }

    /// Sets the colour of the scene running on a zone.
    pub async fn set_rgb(&self, zone_id: u16, color: Rgb) -> Result<(), ClientError> {
        let scene = self.running_scene(zone_id)?;
        self.trigger(zone_id, scene, TriggerCommand::SetColor, |t| {
            t.color = Some(color)
        })
        .await
    }

    /// Snapshot of the device mirror.
    pub fn state(&self) -> DeviceState {
        self.state.lock().clone()
    }

    pub fn zone(&self, zone_id: u16) -> Option<ZoneState> {
        self.state.lock().zone(zone_id).copied()
    }

    pub fn scene_names(&self) -> BTreeMap<u16, String> {
        self.state.lock().scenes.clone()
    }

    pub fn zone_names(&self) -> BTreeMap<u16, String> {
        self.state.lock().zones.clone()
    }

    /// Categories with a request awaiting its reply.
    pub fn pending(&self) -> Vec<Category> {
        self.session.pending().categories()
    }

    /// Authentication progress on the current connection.
    pub fn auth_state(&self) -> AuthState {
        self.session.auth_state()
    }

    fn link(&self) -> Result<&Arc<StreamLink>, ClientError> {
        self.connection
            .as_ref()
            .map(Connection::link)
            .ok_or(ClientError::NotStarted)
    }

    fn running_scene(&self, zone_id: u16) -> Result<u16, ClientError> {
        self.state
            .lock()
            .zone(zone_id)
            .and_then(|zone| zone.running_scene)
            .ok_or(ClientError::UnknownZone(zone_id))
    }

    async fn send_stream(&self, request: &Request) -> Result<(), ClientError> {
        self.authenticate().await?;
        let frame = self.codec.encode_request(request)?;
        self.link()?.write_frame(&frame).await?;
        debug!(opcode = %request.opcode(), "request sent");
        Ok(())
    }

    async fn trigger(
        &self,
        zone_id: u16,
        scene: u16,
        command: TriggerCommand,
        fill: impl FnOnce(&mut SceneTrigger),
    ) -> Result<(), ClientError> {
        let zone_sync_id = u8::try_from(zone_id).map_err(|_| ClientError::UnknownZone(zone_id))?;
        let mut trigger = SceneTrigger {
            scene,
            zone_sync_id,
            command,
            dimmer: None,
            speed: None,
            color: None,
        };
        fill(&mut trigger);

        let datagram = self.datagram.as_ref().ok_or(ClientError::NotStarted)?;
        self.authenticate().await?;
        let frame = self.codec.encode_request(&Request::SceneTrigger(trigger))?;
        datagram.send(&frame).await?;
        debug!(zone = zone_id, scene, ?command, "scene trigger sent");
        Ok(())
    }
}

async fn resolve(peer: &str) -> io::Result<SocketAddr> {
    tokio::net::lookup_host(peer).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address for {peer}"),
        )
    })
}
