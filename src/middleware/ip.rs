//! Client identifier resolution for rate limiting.
//!
//! The rate limiter keys on the remote network address. By default that is
//! the TCP peer reported by Axum's `ConnectInfo`, which a client cannot forge.
//!
//! # Reverse Proxies
//!
//! Behind a proxy every request arrives from the proxy's address, so all
//! visitors would share one budget. Configure `TRUSTED_PROXIES` with the
//! proxy's CIDR ranges: when the peer falls inside one of them, the nearest
//! `X-Forwarded-For` hop outside those ranges (then `X-Real-IP`) is used
//! instead.
//!
//! Forwarded headers from any other peer are ignored and logged at debug level,
//! since honoring them would let clients rotate spoofed addresses to dodge the
//! limiter.
//!
//! # The "unknown" Fallback
//!
//! Requests without a peer address (in-process tests, exotic transports) share
//! the [`UNKNOWN_IP`] key and are therefore limited collectively.

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use tracing::{debug, warn};

/// Fallback client key when no peer address is available.
pub const UNKNOWN_IP: &str = "unknown";

// =============================================================================
// Trusted Proxy CIDR Matching
// =============================================================================

/// Parsed CIDR network range for trusted proxy validation.
#[derive(Debug, Clone)]
pub struct CidrRange {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrRange {
    /// Parse a CIDR notation string (e.g., "10.0.0.0/8" or "::1/128").
    ///
    /// A bare address is treated as a single-host range. Returns `None` if the
    /// format is invalid.
    pub fn parse(cidr: &str) -> Option<Self> {
        let cidr = cidr.trim();

        let Some((addr, prefix)) = cidr.split_once('/') else {
            let network: IpAddr = cidr.parse().ok()?;
            return Some(Self {
                prefix_len: max_prefix(&network),
                network,
            });
        };

        let network: IpAddr = addr.parse().ok()?;
        let prefix_len: u8 = prefix.parse().ok()?;

        if prefix_len > max_prefix(&network) {
            return None;
        }

        Some(Self {
            network,
            prefix_len,
        })
    }

    /// Check if an IP address is contained within this CIDR range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (&self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = u32::MAX
                    .checked_shl(32 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                (u32::from(*net) & mask) == (u32::from(*addr) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                (u128::from(*net) & mask) == (u128::from(*addr) & mask)
            }
            _ => false,
        }
    }
}

fn max_prefix(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Proxies whose forwarded-for headers are believed.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxyConfig {
    ranges: Vec<CidrRange>,
}

impl TrustedProxyConfig {
    /// Build from CIDR strings. Invalid entries are logged and skipped.
    pub fn new(cidrs: &[String]) -> Self {
        let ranges = cidrs
            .iter()
            .filter_map(|cidr| {
                let parsed = CidrRange::parse(cidr);
                if parsed.is_none() {
                    warn!(cidr = %cidr, "Invalid CIDR range in TRUSTED_PROXIES, skipping");
                }
                parsed
            })
            .collect();

        Self { ranges }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// Whether `peer` is one of the configured proxies.
    ///
    /// With no ranges configured nothing is trusted.
    pub fn is_trusted(&self, peer: &IpAddr) -> bool {
        self.ranges.iter().any(|range| range.contains(peer))
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// Where a forwarded client address was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forwarded {
    Xff(IpAddr),
    RealIp(IpAddr),
}

impl Forwarded {
    fn ip(self) -> IpAddr {
        match self {
            Self::Xff(ip) | Self::RealIp(ip) => ip,
        }
    }
}

/// Client address reported by a trusted proxy.
///
/// Proxies append the address they received from, so only the right end of
/// `X-Forwarded-For` is trustworthy. The list is walked from the right,
/// skipping our own proxies; the first other hop is the client. Anything a
/// client wrote further left is ignored. A hop that is not an IP address
/// ends the walk with no result.
fn forwarded_ip<B>(req: &Request<B>, trusted_proxies: &TrustedProxyConfig) -> Option<Forwarded> {
    if let Some(value) = req.headers().get("x-forwarded-for")
        && let Ok(value) = value.to_str()
        && !value.trim().is_empty()
    {
        for hop in value.rsplit(',').map(str::trim) {
            let ip: IpAddr = hop.parse().ok()?;
            if !trusted_proxies.is_trusted(&ip) {
                return Some(Forwarded::Xff(ip));
            }
        }
        return None;
    }

    req.headers()
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .map(Forwarded::RealIp)
}

fn has_forwarded_headers<B>(req: &Request<B>) -> bool {
    let headers = req.headers();
    headers.contains_key("x-forwarded-for") || headers.contains_key("x-real-ip")
}

/// Peer address recorded by `into_make_service_with_connect_info`.
pub fn peer_addr<B>(req: &Request<B>) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Resolve the identifier the rate limiter keys on.
///
/// # Resolution Order
///
/// 1. Peer inside a trusted proxy range: the rightmost untrusted
///    `X-Forwarded-For` hop, then `X-Real-IP`, falling back to the peer IP
///    when neither yields an address
/// 2. Otherwise: the peer IP
/// 3. No peer address: [`UNKNOWN_IP`]
///
/// The result is always an IP address or [`UNKNOWN_IP`].
pub fn client_identifier<B>(
    req: &Request<B>,
    trusted_proxies: &TrustedProxyConfig,
) -> Cow<'static, str> {
    let Some(peer) = peer_addr(req) else {
        return Cow::Borrowed(UNKNOWN_IP);
    };
    let peer_ip = peer.ip();

    if !trusted_proxies.is_trusted(&peer_ip) {
        if has_forwarded_headers(req) {
            debug!(peer = %peer_ip, "Ignoring forwarded client address from untrusted peer");
        }
        return Cow::Owned(peer_ip.to_string());
    }

    match forwarded_ip(req, trusted_proxies) {
        Some(forwarded) => Cow::Owned(forwarded.ip().to_string()),
        None => {
            if has_forwarded_headers(req) {
                debug!(peer = %peer_ip, "No usable forwarded client address, keying on proxy");
            }
            Cow::Owned(peer_ip.to_string())
        }
    }
}
