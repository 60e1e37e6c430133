//! DHCP packet handling
//!
//! This module provides utilities for building client requests and parsing
//! server replies, plus the [`Lease`] record produced from an ACK.

use crate::error::{DhcpError, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dhcproto::v4::{DhcpOption, Flags, Message, MessageType, Opcode, OptionCode};
use dhcproto::{Decodable, Encodable};
use std::net::Ipv4Addr;
use std::time::Duration;

/// A granted address assignment
#[derive(Debug, Clone, PartialEq)]
pub struct Lease {
    /// Address assigned by the server (yiaddr)
    pub fixed_address: Ipv4Addr,

    /// Server that granted the lease (option 54)
    pub server_id: Ipv4Addr,

    /// Subnet mask (option 1)
    pub subnet_mask: Option<Ipv4Addr>,

    /// Routers (option 3)
    pub routers: Vec<Ipv4Addr>,

    /// DNS servers (option 6)
    pub dns_servers: Vec<Ipv4Addr>,

    /// When the ACK was received
    pub bound: DateTime<Utc>,

    /// T1: when to start renewing
    pub renew: DateTime<Utc>,

    /// When the lease runs out
    pub expire: DateTime<Utc>,
}

impl Lease {
    /// Build a lease from an ACK received at `now`
    pub fn from_reply(reply: &DhcpReply, now: DateTime<Utc>) -> Result<Self> {
        let lease_time = reply
            .lease_time
            .ok_or_else(|| DhcpError::ParseError("ACK without lease time".to_string()))?;
        let server_id = reply
            .server_id
            .ok_or_else(|| DhcpError::ParseError("ACK without server identifier".to_string()))?;

        // RFC 2131 4.4.5 default: T1 = 0.5 * lease
        let renewal = reply.renewal_time.unwrap_or(lease_time / 2);

        Ok(Self {
            fixed_address: reply.your_ip,
            server_id,
            subnet_mask: reply.subnet_mask,
            routers: reply.routers.clone(),
            dns_servers: reply.dns_servers.clone(),
            bound: now,
            renew: now + ChronoDuration::seconds(i64::from(renewal)),
            expire: now + ChronoDuration::seconds(i64::from(lease_time)),
        })
    }

    /// Time left until expiry, zero once expired
    pub fn ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expire - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the lease has run out at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expire
    }
}

/// Parsed DHCP reply with extracted information
#[derive(Debug, Clone)]
pub struct DhcpReply {
    /// Original message
    pub message: Message,

    /// Message type (OFFER, ACK, NAK)
    pub message_type: MessageType,

    /// Transaction ID
    pub xid: u32,

    /// Client hardware address echoed by the server
    pub hw_addr: Vec<u8>,

    /// Offered or assigned address (yiaddr)
    pub your_ip: Ipv4Addr,

    /// Server identifier (option 54)
    pub server_id: Option<Ipv4Addr>,

    /// Lease time in seconds (option 51)
    pub lease_time: Option<u32>,

    /// Renewal (T1) time in seconds (option 58)
    pub renewal_time: Option<u32>,

    /// Subnet mask (option 1)
    pub subnet_mask: Option<Ipv4Addr>,

    /// Routers (option 3)
    pub routers: Vec<Ipv4Addr>,

    /// DNS servers (option 6)
    pub dns_servers: Vec<Ipv4Addr>,
}

impl DhcpReply {
    /// Parse a DHCP reply from raw bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let message =
            Message::from_bytes(data).map_err(|e| DhcpError::ParseError(e.to_string()))?;

        if message.opcode() != Opcode::BootReply {
            return Err(DhcpError::ParseError("not a BOOTREPLY".to_string()));
        }

        let opts = message.opts();

        let message_type = opts
            .get(OptionCode::MessageType)
            .and_then(|opt| {
                if let DhcpOption::MessageType(mt) = opt {
                    Some(mt.clone())
                } else {
                    None
                }
            })
            .ok_or_else(|| DhcpError::ParseError("missing message type".to_string()))?;

        let server_id = opts.get(OptionCode::ServerIdentifier).and_then(|opt| {
            if let DhcpOption::ServerIdentifier(ip) = opt {
                Some(*ip)
            } else {
                None
            }
        });

        let lease_time = opts.get(OptionCode::AddressLeaseTime).and_then(|opt| {
            if let DhcpOption::AddressLeaseTime(secs) = opt {
                Some(*secs)
            } else {
                None
            }
        });

        let renewal_time = opts.get(OptionCode::Renewal).and_then(|opt| {
            if let DhcpOption::Renewal(secs) = opt {
                Some(*secs)
            } else {
                None
            }
        });

        let subnet_mask = opts.get(OptionCode::SubnetMask).and_then(|opt| {
            if let DhcpOption::SubnetMask(mask) = opt {
                Some(*mask)
            } else {
                None
            }
        });

        let routers = opts
            .get(OptionCode::Router)
            .and_then(|opt| {
                if let DhcpOption::Router(ips) = opt {
                    Some(ips.clone())
                } else {
                    None
                }
            })
            .unwrap_or_default();

        let dns_servers = opts
            .get(OptionCode::DomainNameServer)
            .and_then(|opt| {
                if let DhcpOption::DomainNameServer(ips) = opt {
                    Some(ips.clone())
                } else {
                    None
                }
            })
            .unwrap_or_default();

        let hw_addr = message.chaddr().iter().take(6).copied().collect();

        Ok(Self {
            xid: message.xid(),
            your_ip: message.yiaddr(),
            hw_addr,
            message_type,
            server_id,
            lease_time,
            renewal_time,
            subnet_mask,
            routers,
            dns_servers,
            message,
        })
    }

    /// Check whether this reply answers our transaction
    pub fn matches(&self, xid: u32, hw_addr: &[u8; 6]) -> bool {
        self.xid == xid && self.hw_addr.as_slice() == hw_addr.as_slice()
    }
}

/// DHCP request builder
pub struct DhcpRequestBuilder {
    message_type: MessageType,
    xid: u32,
    hw_addr: [u8; 6],
    requested_ip: Option<Ipv4Addr>,
    server_id: Option<Ipv4Addr>,
    hostname: Option<String>,
    param_requests: Vec<OptionCode>,
    extra_options: Vec<DhcpOption>,
}

impl DhcpRequestBuilder {
    /// Create a new request builder
    pub fn new(message_type: MessageType, xid: u32, hw_addr: [u8; 6]) -> Self {
        Self {
            message_type,
            xid,
            hw_addr,
            requested_ip: None,
            server_id: None,
            hostname: None,
            param_requests: Vec::new(),
            extra_options: Vec::new(),
        }
    }

    /// Set the requested IP address (option 50)
    pub fn with_requested_ip(mut self, ip: Ipv4Addr) -> Self {
        self.requested_ip = Some(ip);
        self
    }

    /// Set the server identifier (option 54)
    pub fn with_server_id(mut self, ip: Ipv4Addr) -> Self {
        self.server_id = Some(ip);
        self
    }

    /// Set the hostname (option 12)
    pub fn with_hostname(mut self, hostname: Option<String>) -> Self {
        self.hostname = hostname;
        self
    }

    /// Set the parameter request list (option 55)
    pub fn with_param_requests(mut self, codes: Vec<OptionCode>) -> Self {
        self.param_requests = codes;
        self
    }

    /// Add caller-supplied options
    ///
    /// These go in first; options the builder sets itself take precedence.
    pub fn with_options(mut self, options: Vec<DhcpOption>) -> Self {
        self.extra_options = options;
        self
    }

    /// Build the request message
    pub fn build(self) -> Result<Message> {
        let mut request = Message::default();

        request.set_opcode(Opcode::BootRequest);
        request.set_xid(self.xid);
        // Claimed addresses are never configured locally, so replies must
        // come back as broadcasts.
        request.set_flags(Flags::default().set_broadcast());
        request.set_chaddr(&self.hw_addr);

        for option in self.extra_options {
            request.opts_mut().insert(option);
        }

        request
            .opts_mut()
            .insert(DhcpOption::MessageType(self.message_type));

        if !self.param_requests.is_empty() {
            request
                .opts_mut()
                .insert(DhcpOption::ParameterRequestList(self.param_requests));
        }

        if let Some(ip) = self.requested_ip {
            request
                .opts_mut()
                .insert(DhcpOption::RequestedIpAddress(ip));
        }

        if let Some(server) = self.server_id {
            request
                .opts_mut()
                .insert(DhcpOption::ServerIdentifier(server));
        }

        if let Some(hostname) = self.hostname {
            request.opts_mut().insert(DhcpOption::Hostname(hostname));
        }

        Ok(request)
    }

    /// Build and encode the request to bytes
    pub fn build_bytes(self) -> Result<Vec<u8>> {
        let message = self.build()?;
        message
            .to_vec()
            .map_err(|e| DhcpError::EncodeError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HW: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

    fn server_reply(message_type: MessageType, xid: u32, yiaddr: Ipv4Addr) -> Message {
        let mut reply = Message::default();
        reply.set_opcode(Opcode::BootReply);
        reply.set_xid(xid);
        reply.set_yiaddr(yiaddr);
        reply.set_chaddr(&HW);
        reply
            .opts_mut()
            .insert(DhcpOption::MessageType(message_type));
        reply
            .opts_mut()
            .insert(DhcpOption::ServerIdentifier(Ipv4Addr::new(10, 0, 0, 1)));
        reply
    }

    fn encode_message(msg: &Message) -> Vec<u8> {
        msg.to_vec().unwrap()
    }

    #[test]
    fn test_build_discover() {
        let bytes = DhcpRequestBuilder::new(MessageType::Discover, 0x12345678, HW)
            .with_param_requests(vec![OptionCode::SubnetMask, OptionCode::Router])
            .with_options(vec![DhcpOption::RequestedIpAddress(Ipv4Addr::new(
                10, 0, 0, 5,
            ))])
            .with_hostname(Some("edge-01".to_string()))
            .build_bytes()
            .unwrap();

        let message = Message::from_bytes(&bytes).unwrap();
        assert_eq!(message.opcode(), Opcode::BootRequest);
        assert_eq!(message.xid(), 0x12345678);
        assert!(message.flags().broadcast());
        assert_eq!(&message.chaddr()[..6], &HW);
        assert_eq!(
            message.opts().get(OptionCode::MessageType),
            Some(&DhcpOption::MessageType(MessageType::Discover))
        );
        assert_eq!(
            message.opts().get(OptionCode::RequestedIpAddress),
            Some(&DhcpOption::RequestedIpAddress(Ipv4Addr::new(10, 0, 0, 5)))
        );
        assert_eq!(
            message.opts().get(OptionCode::ParameterRequestList),
            Some(&DhcpOption::ParameterRequestList(vec![
                OptionCode::SubnetMask,
                OptionCode::Router
            ]))
        );
        assert_eq!(
            message.opts().get(OptionCode::Hostname),
            Some(&DhcpOption::Hostname("edge-01".to_string()))
        );
    }

    #[test]
    fn test_builder_fields_override_extra_options() {
        let message = DhcpRequestBuilder::new(MessageType::Request, 7, HW)
            .with_options(vec![DhcpOption::RequestedIpAddress(Ipv4Addr::new(
                10, 0, 0, 5,
            ))])
            .with_requested_ip(Ipv4Addr::new(10, 0, 0, 9))
            .with_server_id(Ipv4Addr::new(10, 0, 0, 1))
            .build()
            .unwrap();

        assert_eq!(
            message.opts().get(OptionCode::RequestedIpAddress),
            Some(&DhcpOption::RequestedIpAddress(Ipv4Addr::new(10, 0, 0, 9)))
        );
        assert_eq!(
            message.opts().get(OptionCode::ServerIdentifier),
            Some(&DhcpOption::ServerIdentifier(Ipv4Addr::new(10, 0, 0, 1)))
        );
        assert_eq!(message.ciaddr(), Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn test_parse_ack() {
        let mut ack = server_reply(MessageType::Ack, 0xAABBCCDD, Ipv4Addr::new(10, 0, 0, 5));
        ack.opts_mut().insert(DhcpOption::AddressLeaseTime(3600));
        ack.opts_mut()
            .insert(DhcpOption::SubnetMask(Ipv4Addr::new(255, 255, 255, 0)));
        ack.opts_mut()
            .insert(DhcpOption::Router(vec![Ipv4Addr::new(10, 0, 0, 1)]));
        ack.opts_mut().insert(DhcpOption::DomainNameServer(vec![
            Ipv4Addr::new(1, 1, 1, 1),
            Ipv4Addr::new(8, 8, 8, 8),
        ]));

        let reply = DhcpReply::parse(&encode_message(&ack)).unwrap();

        assert_eq!(reply.message_type, MessageType::Ack);
        assert_eq!(reply.your_ip, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(reply.server_id, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(reply.lease_time, Some(3600));
        assert_eq!(reply.subnet_mask, Some(Ipv4Addr::new(255, 255, 255, 0)));
        assert_eq!(reply.routers, vec![Ipv4Addr::new(10, 0, 0, 1)]);
        assert_eq!(reply.dns_servers.len(), 2);
        assert!(reply.matches(0xAABBCCDD, &HW));
        assert!(!reply.matches(0xAABBCCDE, &HW));
        assert!(!reply.matches(0xAABBCCDD, &[0xff; 6]));
    }

    #[test]
    fn test_parse_rejects_boot_request() {
        let bytes = DhcpRequestBuilder::new(MessageType::Discover, 1, HW)
            .build_bytes()
            .unwrap();
        assert!(matches!(
            DhcpReply::parse(&bytes),
            Err(DhcpError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(DhcpReply::parse(&[0u8; 12]).is_err());
    }

    #[test]
    fn test_lease_from_ack_default_timers() {
        let mut ack = server_reply(MessageType::Ack, 1, Ipv4Addr::new(10, 0, 0, 5));
        ack.opts_mut().insert(DhcpOption::AddressLeaseTime(3600));
        let reply = DhcpReply::parse(&encode_message(&ack)).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let lease = Lease::from_reply(&reply, now).unwrap();

        assert_eq!(lease.fixed_address, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(lease.server_id, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(lease.bound, now);
        assert_eq!(lease.renew, now + ChronoDuration::seconds(1800));
        assert_eq!(lease.expire, now + ChronoDuration::seconds(3600));
        assert_eq!(lease.ttl(now), Duration::from_secs(3600));
        assert!(!lease.is_expired(now));
        assert!(lease.is_expired(lease.expire));
        assert_eq!(lease.ttl(lease.expire + ChronoDuration::seconds(5)), Duration::ZERO);
    }

    #[test]
    fn test_lease_from_ack_explicit_timers() {
        let mut ack = server_reply(MessageType::Ack, 1, Ipv4Addr::new(10, 0, 0, 6));
        ack.opts_mut().insert(DhcpOption::AddressLeaseTime(600));
        ack.opts_mut().insert(DhcpOption::Renewal(100));
        let reply = DhcpReply::parse(&encode_message(&ack)).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let lease = Lease::from_reply(&reply, now).unwrap();

        assert_eq!(lease.renew, now + ChronoDuration::seconds(100));
        assert_eq!(lease.expire, now + ChronoDuration::seconds(600));
    }

    #[test]
    fn test_lease_requires_lease_time() {
        let ack = server_reply(MessageType::Ack, 1, Ipv4Addr::new(10, 0, 0, 5));
        let reply = DhcpReply::parse(&encode_message(&ack)).unwrap();

        assert!(Lease::from_reply(&reply, Utc::now()).is_err());
    }
}
