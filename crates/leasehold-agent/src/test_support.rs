//! Test doubles for interfaces and lease clients

use crate::error::{AgentError, Result};
use crate::interface::{InterfaceHandle, InterfaceSource};
use crate::session::ClientFactory;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use leasehold_dhcp::{BoundHandler, DhcpOption, ExpireHandler, Lease, LeaseClient, OptionCode};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Build an interface handle with a fixed MAC
pub fn iface(name: &str, is_up: bool, is_loopback: bool, addresses: &[IpAddr]) -> InterfaceHandle {
    InterfaceHandle {
        name: name.to_string(),
        index: 1,
        mac: Some([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
        is_up,
        is_loopback,
        addresses: addresses.to_vec(),
    }
}

/// A lease for `addr` granted now and lasting `secs`
pub fn lease_for(addr: Ipv4Addr, secs: i64) -> Lease {
    let now = Utc::now();
    Lease {
        fixed_address: addr,
        server_id: Ipv4Addr::new(10, 0, 0, 1),
        subnet_mask: Some(Ipv4Addr::new(255, 255, 255, 0)),
        routers: vec![Ipv4Addr::new(10, 0, 0, 1)],
        dns_servers: Vec::new(),
        bound: now,
        renew: now + ChronoDuration::seconds(secs / 2),
        expire: now + ChronoDuration::seconds(secs),
    }
}

/// Interface source with a fixed answer
pub struct StaticInterfaces {
    result: std::result::Result<Vec<InterfaceHandle>, String>,
}

impl StaticInterfaces {
    pub fn new(interfaces: Vec<InterfaceHandle>) -> Self {
        Self {
            result: Ok(interfaces),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

impl InterfaceSource for StaticInterfaces {
    fn interfaces(&self) -> Result<Vec<InterfaceHandle>> {
        self.result
            .clone()
            .map_err(AgentError::InterfaceEnumeration)
    }
}

#[derive(Default)]
struct MockState {
    interface: String,
    params: Vec<OptionCode>,
    options: Vec<DhcpOption>,
    bound: Option<BoundHandler>,
    expire: Option<ExpireHandler>,
    starts: usize,
    stops: usize,
}

/// Shared view of a client handed out by [`MockFactory`]
#[derive(Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
}

impl MockClient {
    pub fn interface(&self) -> String {
        self.state.lock().unwrap().interface.clone()
    }

    pub fn param_requests(&self) -> Vec<OptionCode> {
        self.state.lock().unwrap().params.clone()
    }

    pub fn options(&self) -> Vec<DhcpOption> {
        self.state.lock().unwrap().options.clone()
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }

    pub fn requested_ip(&self) -> Option<Ipv4Addr> {
        self.options().into_iter().find_map(|option| match option {
            DhcpOption::RequestedIpAddress(addr) => Some(addr),
            _ => None,
        })
    }

    /// Invoke the registered bound handler
    pub fn fire_bound(&self, lease: &Lease) {
        let state = self.state.lock().unwrap();
        let handler = state.bound.as_ref().expect("bound handler registered");
        handler(lease);
    }

    /// Invoke the registered expire handler
    pub fn fire_expire(&self, lease: Option<&Lease>) {
        let state = self.state.lock().unwrap();
        let handler = state.expire.as_ref().expect("expire handler registered");
        handler(lease);
    }
}

#[async_trait]
impl LeaseClient for MockClient {
    fn add_param_request(&mut self, code: OptionCode) {
        self.state.lock().unwrap().params.push(code);
    }

    fn add_option(&mut self, option: DhcpOption) {
        self.state.lock().unwrap().options.push(option);
    }

    fn on_bound(&mut self, handler: BoundHandler) {
        self.state.lock().unwrap().bound = Some(handler);
    }

    fn on_expire(&mut self, handler: ExpireHandler) {
        self.state.lock().unwrap().expire = Some(handler);
    }

    fn start(&mut self) {
        self.state.lock().unwrap().starts += 1;
    }

    async fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.stops += 1;
        state.bound = None;
        state.expire = None;
    }
}

/// Factory that records every client it creates
#[derive(Clone, Default)]
pub struct MockFactory {
    clients: Arc<Mutex<Vec<MockClient>>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    pub fn clients(&self) -> Vec<MockClient> {
        self.clients.lock().unwrap().clone()
    }

    pub fn client(&self, index: usize) -> MockClient {
        self.clients.lock().unwrap()[index].clone()
    }

    /// First client that requested `addr`
    pub fn client_for(&self, addr: Ipv4Addr) -> MockClient {
        self.clients()
            .into_iter()
            .find(|client| client.requested_ip() == Some(addr))
            .expect("client for address")
    }

    /// Wait until `count` clients have been started
    pub async fn wait_for_starts(&self, count: usize) {
        let started = || {
            self.clients()
                .iter()
                .filter(|client| client.starts() > 0)
                .count()
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            while started() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("clients started in time");
    }
}

impl ClientFactory for MockFactory {
    fn create(&self, interface: &InterfaceHandle) -> Box<dyn LeaseClient> {
        let client = MockClient::default();
        client.state.lock().unwrap().interface = interface.name.clone();
        self.clients.lock().unwrap().push(client.clone());
        Box::new(client)
    }
}
