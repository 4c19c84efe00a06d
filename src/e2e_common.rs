//! Scriptable stand-in for a lighting controller, shared by the integration
//! suites. Listens on 127.0.0.1 for the control stream and for datagrams.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::codec::Codec;
use crate::config::ControllerConfig;
use crate::messages::{
    AuthReply, FileData, Opcode, PollReply, Reply, Request, SaltReply, ZoneState, ZoneStatus,
    HEADER_LEN,
};
use crate::profile::CompiledProfile;

/// What the fake device answers.
#[derive(Debug, Clone)]
pub struct DeviceScript {
    pub poll: PollReply,
    pub salt: SaltReply,
    pub auth: AuthReply,
    /// File name to its chunks as (marker, bytes), one chunk per request.
    pub files: HashMap<String, Vec<(u8, Vec<u8>)>>,
    pub zones: BTreeMap<u16, ZoneState>,
}

impl DeviceScript {
    /// Device "X", firmware 3, serial 42; salt stamp 7 with a zero salt;
    /// auth result 0; `names.xml` served as `<roo` + `t/>`.
    pub fn reference() -> Self {
        Self {
            poll: PollReply {
                name: "X".into(),
                firmware_version: 3,
                serial: 42,
                state: 0,
                tcp_port: 0,
            },
            salt: SaltReply {
                timestamp: 7,
                status: 0,
                salt: [0; 32],
            },
            auth: AuthReply {
                timestamp: 7,
                result: 0,
            },
            files: HashMap::new(),
            zones: BTreeMap::new(),
        }
        .with_file("names.xml", &[(1, b"<roo"), (0xFF, b"t/>")])
    }

    pub fn with_file(mut self, name: &str, chunks: &[(u8, &[u8])]) -> Self {
        self.files.insert(
            name.to_string(),
            chunks
                .iter()
                .map(|(marker, bytes)| (*marker, bytes.to_vec()))
                .collect(),
        );
        self
    }

    pub fn with_zone(mut self, zone_id: u16, state: ZoneState) -> Self {
        self.zones.insert(zone_id, state);
        self
    }
}

/// Everything the fake device observed.
#[derive(Debug, Clone, Default)]
pub struct DeviceLog {
    pub requests: Vec<Request>,
    pub datagrams: Vec<Request>,
    pub stream_bytes: usize,
    pub connections: usize,
}

pub struct FakeDevice {
    tcp_addr: SocketAddr,
    udp_addr: SocketAddr,
    log: Arc<Mutex<DeviceLog>>,
    hangup: watch::Sender<u64>,
    tasks: Vec<JoinHandle<()>>,
}

impl FakeDevice {
    pub async fn spawn(script: DeviceScript) -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let udp = UdpSocket::bind(("127.0.0.1", 0)).await?;
        let tcp_addr = listener.local_addr()?;
        let udp_addr = udp.local_addr()?;

        let mut script = script;
        script.poll.tcp_port = tcp_addr.port();
        let script = Arc::new(script);
        let codec = Codec::new(&CompiledProfile::default());
        let log = Arc::new(Mutex::new(DeviceLog::default()));
        let (hangup, _) = watch::channel(0u64);

        let accept = tokio::spawn(accept_loop(
            listener,
            codec.clone(),
            script.clone(),
            log.clone(),
            hangup.clone(),
        ));
        let datagrams = tokio::spawn(datagram_loop(udp, codec, script, log.clone()));

        Ok(Self {
            tcp_addr,
            udp_addr,
            log,
            hangup,
            tasks: vec![accept, datagrams],
        })
    }

    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    /// Controller config pointing at this device, logging in as admin/secret.
    pub fn config(&self) -> ControllerConfig {
        ControllerConfig {
            host: "127.0.0.1".into(),
            tcp_port: self.tcp_addr.port(),
            udp_port: self.udp_addr.port(),
            login: Some("admin".into()),
            password: Some("secret".into()),
            settle_ms: 50,
            reconnect_backoff_ms: 20,
            connect_timeout_ms: 1000,
            ..ControllerConfig::default()
        }
    }

    pub fn log(&self) -> DeviceLog {
        self.log.lock().clone()
    }

    /// Closes every open control stream; the listener keeps accepting.
    pub fn hang_up(&self) {
        self.hangup.send_modify(|generation| *generation += 1);
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    codec: Codec,
    script: Arc<DeviceScript>,
    log: Arc<Mutex<DeviceLog>>,
    hangup: watch::Sender<u64>,
) {
    while let Ok((stream, peer)) = listener.accept().await {
        log.lock().connections += 1;
        debug!(%peer, "fake device accepted control stream");
        tokio::spawn(serve_stream(
            stream,
            codec.clone(),
            script.clone(),
            log.clone(),
            hangup.subscribe(),
        ));
    }
}

async fn serve_stream(
    mut stream: TcpStream,
    codec: Codec,
    script: Arc<DeviceScript>,
    log: Arc<Mutex<DeviceLog>>,
    mut hangup: watch::Receiver<u64>,
) {
    let mut buf = BytesMut::with_capacity(1024);
    let mut cursors: HashMap<String, usize> = HashMap::new();
    loop {
        tokio::select! {
            _ = hangup.changed() => return,
            read = stream.read_buf(&mut buf) => match read {
                Ok(0) | Err(_) => return,
                Ok(len) => log.lock().stream_bytes += len,
            },
        }
        while let Some(request) = next_request(&codec, &mut buf) {
            log.lock().requests.push(request.clone());
            for reply in respond(&script, &mut cursors, &request) {
                let Ok(frame) = codec.encode_reply(&reply) else {
                    continue;
                };
                if stream.write_all(&frame).await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn datagram_loop(
    socket: UdpSocket,
    codec: Codec,
    script: Arc<DeviceScript>,
    log: Arc<Mutex<DeviceLog>>,
) {
    let mut buf = [0u8; 2048];
    while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
        let Ok(request) = codec.decode_request(&buf[..len]) else {
            continue;
        };
        log.lock().datagrams.push(request.clone());
        if let Request::Poll(_) = request {
            if let Ok(frame) = codec.encode_reply(&Reply::Poll(script.poll.clone())) {
                let _ = socket.send_to(&frame, peer).await;
            }
        }
    }
}

fn next_request(codec: &Codec, buf: &mut BytesMut) -> Option<Request> {
    loop {
        let (_, raw) = Codec::header(buf).ok()?;
        let Some(opcode) = Opcode::from_u16(raw) else {
            buf.clear();
            return None;
        };
        let len = Codec::request_len(opcode);
        if buf.len() < len {
            return None;
        }
        let frame = buf.split_to(len);
        if let Ok(request) = codec.decode_request(&frame) {
            return Some(request);
        }
        if buf.len() < HEADER_LEN {
            return None;
        }
    }
}

fn respond(
    script: &DeviceScript,
    cursors: &mut HashMap<String, usize>,
    request: &Request,
) -> Vec<Reply> {
    match request {
        Request::Poll(_) => vec![Reply::Poll(script.poll.clone())],
        Request::Salt(_) => vec![Reply::Salt(script.salt.clone())],
        Request::Auth(_) => vec![Reply::Auth(script.auth.clone())],
        Request::File(req) => {
            let Some(chunks) = script.files.get(&req.filename) else {
                return Vec::new();
            };
            let cursor = cursors.entry(req.filename.clone()).or_default();
            if req.first {
                *cursor = 0;
            }
            let Some((marker, bytes)) = chunks.get(*cursor) else {
                return Vec::new();
            };
            *cursor += 1;
            vec![Reply::File(FileData {
                filename: req.filename.clone(),
                marker: *marker,
                chunk: bytes.clone(),
            })]
        }
        Request::ZoneQuery(query) => script
            .zones
            .get(&query.zone_id)
            .map(|state| {
                Reply::ZoneStatus(ZoneStatus {
                    timestamp: query.timestamp,
                    zone_id: query.zone_id,
                    state: *state,
                })
            })
            .into_iter()
            .collect(),
        Request::SceneTrigger(_) => Vec::new(),
    }
}
