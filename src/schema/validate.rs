//! Candidate classification
//!
//! Decides whether a raw string reported by a cloud API is a DNS name,
//! a publicly routable IP address, or an address from a reserved range.
//! The reserved tables double as a safety filter: metadata endpoints and
//! internal-only addresses are never reported as externally reachable.

use crate::error::ClassifierError;
use ipnet::{Ipv4Net, Ipv6Net};
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

/// Reserved and private IPv4 blocks
const IPV4_RESERVED_RANGES: &[&str] = &[
    "0.0.0.0/8",       // "this" network, source only
    "10.0.0.0/8",      // private
    "100.64.0.0/10",   // carrier-grade NAT
    "127.0.0.0/8",     // loopback
    "169.254.0.0/16",  // link-local, cloud metadata endpoints
    "172.16.0.0/12",   // private
    "192.0.0.0/24",    // IETF protocol assignments
    "192.0.2.0/24",    // TEST-NET-1
    "192.88.99.0/24",  // 6to4 relay anycast
    "192.168.0.0/16",  // private
    "198.18.0.0/15",   // benchmarking
    "198.51.100.0/24", // TEST-NET-2
    "203.0.113.0/24",  // TEST-NET-3
    "224.0.0.0/4",     // multicast
    "240.0.0.0/4",     // reserved, former class E
];

/// Reserved and private IPv6 blocks
const IPV6_RESERVED_RANGES: &[&str] = &[
    "::1/128",       // loopback
    "64:ff9b::/96",  // NAT64 (RFC 6052)
    "100::/64",      // discard-only (RFC 6666)
    "2001::/32",     // Teredo
    "2001:10::/28",  // deprecated ORCHID
    "2001:20::/28",  // ORCHIDv2
    "2001:db8::/32", // documentation
    "2002::/16",     // 6to4
    "fc00::/7",      // unique local
    "fe80::/10",     // link-local
    "ff00::/8",      // multicast
];

/// Hostname grammar: optional `*.` wildcard label, dot-separated labels of
/// up to 63 word characters or hyphens, optional trailing `.` or `_`.
const DNS_NAME_PATTERN: &str =
    r"^(\*\.)?([a-zA-Z0-9_][a-zA-Z0-9_-]{0,62})(\.[a-zA-Z0-9_][a-zA-Z0-9_-]{0,62})*[._]?$";

const MAX_DNS_NAME_LEN: usize = 255;

/// What a raw candidate string turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    DnsName,
    PublicIp,
    PrivateIp,
    /// Could not be classified; the candidate is dropped
    None,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DnsName => "dns_name",
            Self::PublicIp => "public_ip",
            Self::PrivateIp => "private_ip",
            Self::None => "none",
        }
    }
}

/// Compiled classification tables
#[derive(Debug, Clone)]
pub struct Validator {
    ipv4: Vec<Ipv4Net>,
    ipv6: Vec<Ipv6Net>,
    dns_name: Regex,
}

impl Validator {
    /// Compile the built-in reserved ranges and hostname grammar
    pub fn new() -> Result<Self, ClassifierError> {
        Ok(Self {
            ipv4: parse_ranges(IPV4_RESERVED_RANGES)?,
            ipv6: parse_ranges(IPV6_RESERVED_RANGES)?,
            dns_name: Regex::new(DNS_NAME_PATTERN)?,
        })
    }

    /// Process-wide validator. The tables are immutable after construction.
    pub fn shared() -> &'static Validator {
        static VALIDATOR: OnceLock<Validator> = OnceLock::new();
        VALIDATOR.get_or_init(|| Self::new().expect("built-in classification tables are valid"))
    }

    /// Classify a raw candidate string
    pub fn identify(&self, candidate: &str) -> ResourceKind {
        let item = match split_host_port(candidate) {
            Some((host, port)) if !port.is_empty() => host,
            _ => candidate,
        };

        let parsed = item.parse::<IpAddr>().ok();
        if parsed.is_none() && self.is_dns_name(item) {
            return ResourceKind::DnsName;
        }

        match parsed {
            None => ResourceKind::None,
            Some(IpAddr::V6(addr)) => self.classify_v6(&addr),
            Some(IpAddr::V4(addr)) => self.classify_v4(&addr),
        }
    }

    fn is_dns_name(&self, item: &str) -> bool {
        !item.is_empty() && item.len() <= MAX_DNS_NAME_LEN && self.dns_name.is_match(item)
    }

    fn classify_v4(&self, addr: &Ipv4Addr) -> ResourceKind {
        if self.is_reserved_v4(addr) {
            ResourceKind::PrivateIp
        } else {
            ResourceKind::PublicIp
        }
    }

    fn classify_v6(&self, addr: &Ipv6Addr) -> ResourceKind {
        if self.ipv6.iter().any(|net| net.contains(addr)) {
            return ResourceKind::PrivateIp;
        }
        match addr.to_ipv4_mapped() {
            Some(v4) if self.is_reserved_v4(&v4) => ResourceKind::PrivateIp,
            _ => ResourceKind::PublicIp,
        }
    }

    fn is_reserved_v4(&self, addr: &Ipv4Addr) -> bool {
        self.ipv4.iter().any(|net| net.contains(addr))
    }
}

/// Classify with the process-wide validator
pub fn identify(candidate: &str) -> ResourceKind {
    Validator::shared().identify(candidate)
}

fn parse_ranges<N>(ranges: &[&str]) -> Result<Vec<N>, ClassifierError>
where
    N: std::str::FromStr<Err = ipnet::AddrParseError>,
{
    ranges
        .iter()
        .map(|range| {
            range.parse::<N>().map_err(|source| ClassifierError::Range {
                range: range.to_string(),
                source,
            })
        })
        .collect()
}

/// Split `host:port` or `[v6host]:port`.
///
/// Returns `None` when the string has no port separator or the host part
/// is not a valid host for this grammar (e.g. a bare IPv6 literal).
/// The port may be empty; callers decide whether that counts.
pub(crate) fn split_host_port(s: &str) -> Option<(&str, &str)> {
    let (host, port) = if let Some(rest) = s.strip_prefix('[') {
        let end = rest.find(']')?;
        let host = &rest[..end];
        let port = rest[end + 1..].strip_prefix(':')?;
        (host, port)
    } else {
        let idx = s.rfind(':')?;
        let host = &s[..idx];
        if host.contains(':') {
            return None;
        }
        (host, &s[idx + 1..])
    };

    if host.contains(['[', ']']) || port.contains(['[', ']']) {
        return None;
    }
    Some((host, port))
}
