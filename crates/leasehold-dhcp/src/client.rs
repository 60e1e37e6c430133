//! DHCP client implementation
//!
//! This module provides the client that acquires one address and keeps it
//! renewed. All protocol work happens on a background task started by
//! [`LeaseClient::start`]; lifecycle changes are reported through the
//! registered bound and expire handlers, which only ever run on that task.

use crate::config::ClientConfig;
use crate::error::{DhcpError, Result};
use crate::packet::{DhcpReply, DhcpRequestBuilder, Lease};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dhcproto::v4::{DhcpOption, MessageType, OptionCode};
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Handler invoked when a lease is granted or renewed
pub type BoundHandler = Box<dyn Fn(&Lease) + Send + Sync>;

/// Handler invoked when a lease expires, or with `None` when acquisition failed
pub type ExpireHandler = Box<dyn Fn(Option<&Lease>) + Send + Sync>;

type SharedBound = Arc<dyn Fn(&Lease) + Send + Sync>;
type SharedExpire = Arc<dyn Fn(Option<&Lease>) + Send + Sync>;

/// Lifecycle interface of a lease-protocol client
///
/// Callers configure the client, register handlers, then `start` it. After
/// `stop` returns no handler is invoked again.
#[async_trait]
pub trait LeaseClient: Send {
    /// Ask the server for an option in the parameter request list
    fn add_param_request(&mut self, code: OptionCode);

    /// Send an extra option with every request
    fn add_option(&mut self, option: DhcpOption);

    /// Register the bound handler
    fn on_bound(&mut self, handler: BoundHandler);

    /// Register the expire handler
    fn on_expire(&mut self, handler: ExpireHandler);

    /// Start acquiring in the background
    fn start(&mut self);

    /// Stop the client and wait until it has fully shut down
    async fn stop(&mut self);
}

/// What the client should do next for its current lease
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No lease, run DISCOVER/REQUEST
    Acquire,
    /// Lease reached T1, ask to extend it
    Renew,
    /// Lease ran out
    Expire,
    /// Nothing to do until the renewal time
    Wait(Duration),
}

/// Decide the next step for `lease` at `now`
pub fn next_step(lease: Option<&Lease>, now: DateTime<Utc>) -> Step {
    match lease {
        None => Step::Acquire,
        Some(lease) if lease.is_expired(now) => Step::Expire,
        Some(lease) if now >= lease.renew => Step::Renew,
        Some(lease) => Step::Wait((lease.renew - now).to_std().unwrap_or(Duration::ZERO)),
    }
}

struct RunningWorker {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// DHCP client
pub struct DhcpClient {
    config: ClientConfig,
    param_requests: Vec<OptionCode>,
    options: Vec<DhcpOption>,
    on_bound: Option<SharedBound>,
    on_expire: Option<SharedExpire>,
    worker: Option<RunningWorker>,
}

impl DhcpClient {
    /// Create a new DHCP client
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            param_requests: Vec::new(),
            options: Vec::new(),
            on_bound: None,
            on_expire: None,
            worker: None,
        }
    }

    /// Whether the background task is running
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|w| !w.join.is_finished())
            .unwrap_or(false)
    }
}

#[async_trait]
impl LeaseClient for DhcpClient {
    fn add_param_request(&mut self, code: OptionCode) {
        if !self.param_requests.contains(&code) {
            self.param_requests.push(code);
        }
    }

    fn add_option(&mut self, option: DhcpOption) {
        self.options.push(option);
    }

    fn on_bound(&mut self, handler: BoundHandler) {
        self.on_bound = Some(Arc::from(handler));
    }

    fn on_expire(&mut self, handler: ExpireHandler) {
        self.on_expire = Some(Arc::from(handler));
    }

    fn start(&mut self) {
        if self.worker.is_some() {
            warn!(iface = %self.config.interface, "DHCP client already started");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = Worker {
            config: self.config.clone(),
            param_requests: self.param_requests.clone(),
            options: self.options.clone(),
            on_bound: self.on_bound.clone(),
            on_expire: self.on_expire.clone(),
            lease: None,
        };

        let join = tokio::spawn(worker.run(shutdown_rx));
        self.worker = Some(RunningWorker {
            shutdown: shutdown_tx,
            join,
        });
    }

    async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        let _ = worker.shutdown.send(true);
        if let Err(e) = worker.join.await {
            error!(error = %e, "DHCP client task ended abnormally");
        }
        debug!(iface = %self.config.interface, "DHCP client stopped");
    }
}

impl std::fmt::Debug for DhcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhcpClient")
            .field("config", &self.config)
            .field("param_requests", &self.param_requests)
            .field("running", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

/// Background task driving one client
struct Worker {
    config: ClientConfig,
    param_requests: Vec<OptionCode>,
    options: Vec<DhcpOption>,
    on_bound: Option<SharedBound>,
    on_expire: Option<SharedExpire>,
    lease: Option<Lease>,
}

impl Worker {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        debug!(
            iface = %self.config.interface,
            mac = %self.config.mac_string(),
            "DHCP client started"
        );

        while !*shutdown.borrow() {
            let delay = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                delay = self.step() => delay,
            };

            if delay.is_zero() {
                continue;
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Run one step of the lease lifecycle and return how long to wait
    async fn step(&mut self) -> Duration {
        match next_step(self.lease.as_ref(), Utc::now()) {
            Step::Acquire => match self.acquire().await {
                Ok(lease) => self.bind(lease),
                Err(e) => {
                    warn!(iface = %self.config.interface, error = %e, "DHCP acquisition failed");
                    self.notify_expire(None);
                    self.config.retry_delay
                }
            },
            Step::Renew => {
                let Some(current) = self.lease.clone() else {
                    return Duration::ZERO;
                };
                match self.renew(&current).await {
                    Ok(lease) => self.bind(lease),
                    Err(DhcpError::Nak { server }) => {
                        info!(addr = %current.fixed_address, %server, "Renewal refused, dropping lease");
                        self.lease = None;
                        self.notify_expire(Some(&current));
                        self.config.retry_delay
                    }
                    Err(e) => {
                        debug!(addr = %current.fixed_address, error = %e, "Renewal attempt failed");
                        self.config.retry_delay.min(current.ttl(Utc::now()))
                    }
                }
            }
            Step::Expire => {
                let expired = self.lease.take();
                self.notify_expire(expired.as_ref());
                self.config.retry_delay
            }
            Step::Wait(delay) => delay,
        }
    }

    /// Record a granted lease and return the wait until its renewal
    ///
    /// Never shorter than `retry_delay`, so a server handing out zero-length
    /// timers cannot drive the client into a tight loop.
    fn bind(&mut self, lease: Lease) -> Duration {
        let wait = (lease.renew - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            .max(self.config.retry_delay);
        if let Some(handler) = &self.on_bound {
            handler(&lease);
        }
        self.lease = Some(lease);
        wait
    }

    fn notify_expire(&self, lease: Option<&Lease>) {
        if let Some(handler) = &self.on_expire {
            handler(lease);
        }
    }

    /// DISCOVER → OFFER → REQUEST → ACK
    async fn acquire(&self) -> Result<Lease> {
        let socket = create_socket(&self.config)?;
        let xid: u32 = rand::random();

        let discover = DhcpRequestBuilder::new(MessageType::Discover, xid, self.config.hw_addr)
            .with_param_requests(self.param_requests.clone())
            .with_options(self.options.clone())
            .with_hostname(self.config.hostname.clone())
            .build_bytes()?;

        debug!(xid, iface = %self.config.interface, "Sending DHCPDISCOVER");
        let offer = self
            .exchange(&socket, &discover, xid, &[MessageType::Offer], "OFFER")
            .await?;

        let server_id = offer
            .server_id
            .ok_or_else(|| DhcpError::ParseError("OFFER without server identifier".to_string()))?;
        debug!(xid, offered = %offer.your_ip, server = %server_id, "Received DHCPOFFER");

        self.request(&socket, xid, offer.your_ip, server_id).await
    }

    /// Extend the current lease
    ///
    /// Claimed addresses are not configured on the host, so the renewal goes
    /// out the same way as the initial REQUEST instead of unicast from ciaddr.
    async fn renew(&self, lease: &Lease) -> Result<Lease> {
        let socket = create_socket(&self.config)?;
        let xid: u32 = rand::random();
        debug!(xid, addr = %lease.fixed_address, "Renewing lease");
        self.request(&socket, xid, lease.fixed_address, lease.server_id)
            .await
    }

    async fn request(
        &self,
        socket: &UdpSocket,
        xid: u32,
        addr: std::net::Ipv4Addr,
        server_id: std::net::Ipv4Addr,
    ) -> Result<Lease> {
        let request = DhcpRequestBuilder::new(MessageType::Request, xid, self.config.hw_addr)
            .with_param_requests(self.param_requests.clone())
            .with_options(self.options.clone())
            .with_requested_ip(addr)
            .with_server_id(server_id)
            .with_hostname(self.config.hostname.clone())
            .build_bytes()?;

        let reply = self
            .exchange(
                socket,
                &request,
                xid,
                &[MessageType::Ack, MessageType::Nak],
                "ACK",
            )
            .await?;

        if reply.message_type == MessageType::Nak {
            return Err(DhcpError::Nak {
                server: server_id.to_string(),
            });
        }

        Lease::from_reply(&reply, Utc::now())
    }

    /// Send `packet` and wait for a reply of one of the `accept` types
    async fn exchange(
        &self,
        socket: &UdpSocket,
        packet: &[u8],
        xid: u32,
        accept: &[MessageType],
        expected: &'static str,
    ) -> Result<DhcpReply> {
        socket
            .send_to(packet, SocketAddr::V4(self.config.server_addr))
            .await?;

        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let mut buf = [0u8; 1500];

        loop {
            let (len, src) =
                match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        return Err(DhcpError::Timeout {
                            expected,
                            timeout: self.config.timeout,
                        })
                    }
                };

            let reply = match DhcpReply::parse(&buf[..len]) {
                Ok(reply) => reply,
                Err(e) => {
                    debug!(%src, error = %e, "Ignoring unparseable packet");
                    continue;
                }
            };

            // Other clients share the port and hardware address
            if !reply.matches(xid, &self.config.hw_addr)
                || !accept.contains(&reply.message_type)
            {
                continue;
            }

            return Ok(reply);
        }
    }
}

/// Create and configure the UDP socket
fn create_socket(config: &ClientConfig) -> Result<UdpSocket> {
    let bind_addr: SocketAddrV4 = config.bind_addr;

    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )
    .map_err(|e| DhcpError::BindFailed {
        addr: bind_addr.into(),
        source: e,
    })?;

    // Every session on the interface binds the client port
    socket.set_reuse_address(true).ok();

    socket.set_broadcast(true).ok();

    if config.bind_device {
        bind_to_device(&socket, &config.interface)?;
    }

    socket
        .bind(&bind_addr.into())
        .map_err(|e| DhcpError::BindFailed {
            addr: bind_addr.into(),
            source: e,
        })?;

    socket.set_nonblocking(true).map_err(|e| DhcpError::BindFailed {
        addr: bind_addr.into(),
        source: e,
    })?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(|e| DhcpError::BindFailed {
        addr: bind_addr.into(),
        source: e,
    })
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn bind_to_device(socket: &socket2::Socket, interface: &str) -> Result<()> {
    socket
        .bind_device(Some(interface.as_bytes()))
        .map_err(|e| DhcpError::BindDeviceFailed {
            interface: interface.to_string(),
            source: e,
        })
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn bind_to_device(_socket: &socket2::Socket, interface: &str) -> Result<()> {
    debug!(iface = %interface, "Device binding unsupported on this platform");
    Ok(())
}
