//! UDP transport for ECHONET Lite.
//! Binds the local endpoint, sends single-property requests and publishes
//! every decoded inbound frame to subscribers.

use crate::error::{Result, V2hError};
use crate::protocol::{
    self, DecodedMessage, ECHONET_PORT, Eoj, Frame, MULTICAST_ADDR, Property, ServiceCode,
};
use futures_core::stream::Stream;
use log::{debug, error, info, warn};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const RECV_BUFFER_LEN: usize = 1500;
const EVENT_CAPACITY: usize = 64;

/// A decoded frame together with the address it came from.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub remote: SocketAddr,
    pub message: DecodedMessage,
}

/// Settings for binding an [`EchonetClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Local address to bind to
    pub bind_addr: SocketAddr,
    /// Join the ECHONET Lite multicast group on bind
    pub multicast: bool,
    /// Port requests are sent to
    pub device_port: u16,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), ECHONET_PORT),
            multicast: true,
            device_port: ECHONET_PORT,
        }
    }
}

impl ClientOptions {
    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    pub fn with_multicast(mut self, multicast: bool) -> Self {
        self.multicast = multicast;
        self
    }

    pub fn with_device_port(mut self, port: u16) -> Self {
        self.device_port = port;
        self
    }
}

/// ECHONET Lite endpoint speaking as one source object.
///
/// Cloning shares the socket and the receive loop; the loop stops when
/// [`close`](Self::close) is called or every clone is dropped.
#[derive(Clone)]
pub struct EchonetClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    device_port: u16,
    tid: AtomicU16,
    event_tx: broadcast::Sender<Result<Inbound>>,
    cancel_token: CancellationToken,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl EchonetClient {
    /// Bind the local endpoint and start the receive loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(options: ClientOptions) -> Result<Self> {
        let socket = create_socket(&options)?;
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let cancel_token = CancellationToken::new();

        let inner = Arc::new(ClientInner {
            socket: socket.clone(),
            local_addr,
            device_port: options.device_port,
            tid: AtomicU16::new(rand::random()),
            event_tx: event_tx.clone(),
            cancel_token: cancel_token.clone(),
        });

        tokio::spawn(run_receive_loop(socket, event_tx, cancel_token));
        info!("ECHONET Lite endpoint listening on {}", local_addr);

        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Returns a Stream of inbound frames and per-datagram errors.
    ///
    /// Only frames received after subscribing are delivered.
    pub fn stream(&self) -> impl Stream<Item = Result<Inbound>> + Send + 'static {
        let mut rx = self.inner.event_tx.subscribe();
        let cancel_token = self.inner.cancel_token.clone();
        async_stream::stream! {
            loop {
                let received = tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    res = rx.recv() => res,
                };
                match received {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Dropped {} inbound frames (subscriber too slow)", n);
                        continue;
                    }
                }
            }
        }
    }

    /// Send a frame carrying exactly one property operation.
    ///
    /// `edt` of `None` sends an empty property (PDC 0), as for GET. Returns
    /// the transaction ID used.
    pub async fn send_opc1(
        &self,
        target: IpAddr,
        seoj: Eoj,
        deoj: Eoj,
        esv: ServiceCode,
        epc: u8,
        edt: Option<&[u8]>,
    ) -> Result<u16> {
        if self.inner.cancel_token.is_cancelled() {
            return Err(V2hError::Closed);
        }
        let tid = self.next_tid();
        let frame = Frame {
            tid,
            seoj,
            deoj,
            esv: esv.code(),
            props: vec![Property::new(epc, edt.unwrap_or_default())],
        };
        let packed = protocol::pack_frame(&frame)?;
        let addr = SocketAddr::new(target, self.inner.device_port);

        debug!(
            "send {} tid={} {}->{} epc=0x{:02X} edt={} to {}",
            esv,
            tid,
            seoj,
            deoj,
            epc,
            hex::encode(edt.unwrap_or_default()),
            addr
        );
        self.inner.socket.send_to(&packed, addr).await?;
        Ok(tid)
    }

    /// Stops the receive loop; open streams end.
    pub fn close(&self) {
        self.inner.cancel_token.cancel();
    }

    fn next_tid(&self) -> u16 {
        self.inner.tid.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

/// Create and configure the UDP socket.
fn create_socket(options: &ClientOptions) -> Result<UdpSocket> {
    let addr = options.bind_addr;
    debug!("Creating UDP socket on {}...", addr);
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

    if let Err(e) = socket.set_reuse_address(true) {
        warn!("Failed to set reuse_address on {}: {}", addr, e);
    }

    match socket.bind(&SockAddr::from(addr)) {
        Ok(_) => debug!("Successfully bound to {}", addr),
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return Err(V2hError::Io(format!("bind {}: {}", addr, e)));
        }
    }

    if options.multicast {
        let interface = match addr.ip() {
            IpAddr::V4(ip) => ip,
            IpAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
        };
        if let Err(e) = socket.join_multicast_v4(&MULTICAST_ADDR, &interface) {
            warn!("Failed to join multicast group {}: {}", MULTICAST_ADDR, e);
        }
    }

    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

async fn run_receive_loop(
    socket: Arc<UdpSocket>,
    event_tx: broadcast::Sender<Result<Inbound>>,
    cancel_token: CancellationToken,
) {
    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            res = socket.recv_from(&mut buf) => {
                let event = match res {
                    Ok((len, remote)) => {
                        debug!("Received UDP packet from {}: {} bytes", remote, len);
                        protocol::parse_frame(&buf[..len]).map(|frame| Inbound {
                            remote,
                            message: frame.into(),
                        })
                    }
                    Err(e) => Err(e.into()),
                };
                // No subscribers is fine; the frame is simply not observed
                let _ = event_tx.send(event);
            }
        }
    }
    debug!("Receive loop stopped");
}
