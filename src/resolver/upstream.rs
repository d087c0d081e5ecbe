//! Resolver upstream selection
//!
//! Parses `scheme://[host[:port]]` selectors and builds the matching
//! resolution transport on top of hickory-resolver. Supported schemes are
//! `udp` (the default), `tcp`, `tls` (DNS-over-TLS) and `https`
//! (DNS-over-HTTPS); a selector without a server address falls back to the
//! system's resolution path.

use super::{NameLookup, ResolverError};
use async_trait::async_trait;
use hickory_resolver::config::{
    LookupIpStrategy, NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig,
    ResolverOpts,
};
use hickory_resolver::TokioAsyncResolver;
use std::net::{IpAddr, SocketAddr};

/// Wire protocol used to reach the resolution server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsProtocol {
    Udp,
    Tcp,
    Tls,
    Https,
}

impl DnsProtocol {
    fn default_port(self) -> u16 {
        match self {
            DnsProtocol::Udp | DnsProtocol::Tcp => 53,
            DnsProtocol::Tls => 853,
            DnsProtocol::Https => 443,
        }
    }

    fn wire(self) -> Protocol {
        match self {
            DnsProtocol::Udp => Protocol::Udp,
            DnsProtocol::Tcp => Protocol::Tcp,
            DnsProtocol::Tls => Protocol::Tls,
            DnsProtocol::Https => Protocol::Https,
        }
    }
}

/// A parsed resolver selector.
///
/// The default selector carries no server address and resolves through the
/// system path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    protocol: DnsProtocol,
    server: Option<(String, u16)>,
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            protocol: DnsProtocol::Udp,
            server: None,
        }
    }
}

impl Upstream {
    /// Parse a selector of the form `scheme://[host[:port]]`.
    ///
    /// A bare `host[:port]` is taken as a UDP server; an empty address part
    /// keeps the system resolution path over the selected scheme's default.
    pub fn parse(selector: &str) -> Result<Self, ResolverError> {
        let (scheme, rest) = match selector.split_once("://") {
            Some((scheme, rest)) => (scheme, rest),
            None => ("udp", selector),
        };

        let protocol = match scheme {
            "" | "udp" => DnsProtocol::Udp,
            "tcp" => DnsProtocol::Tcp,
            "tls" => DnsProtocol::Tls,
            "https" => DnsProtocol::Https,
            other => {
                return Err(ResolverError::Selector(
                    selector.to_string(),
                    format!("unknown scheme '{}'", other),
                ))
            }
        };

        if rest.is_empty() {
            return Ok(Self {
                protocol,
                server: None,
            });
        }

        let (host, port) = split_host_port(rest)
            .map_err(|reason| ResolverError::Selector(selector.to_string(), reason))?;
        let port = port.unwrap_or_else(|| protocol.default_port());

        Ok(Self {
            protocol,
            server: Some((host, port)),
        })
    }

    /// Selected wire protocol
    pub fn protocol(&self) -> DnsProtocol {
        self.protocol
    }

    /// Explicit resolution server, if any
    pub fn server(&self) -> Option<(&str, u16)> {
        self.server.as_ref().map(|(host, port)| (host.as_str(), *port))
    }

    /// Build the resolution transport this selector describes.
    ///
    /// A server given as a hostname is bootstrap-resolved through the
    /// system path first; encrypted schemes keep that hostname for
    /// certificate verification.
    pub async fn build(&self) -> Result<UpstreamLookup, ResolverError> {
        let Some((host, port)) = &self.server else {
            let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
            return Ok(UpstreamLookup { resolver });
        };

        let addrs: Vec<IpAddr> = match host.parse::<IpAddr>() {
            Ok(ip) => vec![ip],
            Err(_) => tokio::net::lookup_host((host.as_str(), *port))
                .await?
                .map(|addr| addr.ip())
                .collect(),
        };

        let mut servers = NameServerConfigGroup::new();
        for addr in addrs {
            let mut ns = NameServerConfig::new(SocketAddr::new(addr, *port), self.protocol.wire());
            if matches!(self.protocol, DnsProtocol::Tls | DnsProtocol::Https) {
                ns.tls_dns_name = Some(host.clone());
            }
            servers.push(ns);
        }

        let config = ResolverConfig::from_parts(None, vec![], servers);
        let mut opts = ResolverOpts::default();
        opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

        Ok(UpstreamLookup {
            resolver: TokioAsyncResolver::tokio(config, opts),
        })
    }
}

/// Resolution transport backed by hickory-resolver.
pub struct UpstreamLookup {
    resolver: TokioAsyncResolver,
}

#[async_trait]
impl NameLookup for UpstreamLookup {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolverError> {
        let answer = self.resolver.lookup_ip(host).await?;
        Ok(answer.iter().collect())
    }
}

/// Split `host[:port]`, accepting bracketed and bare IPv6 literals.
pub(crate) fn split_host_port(s: &str) -> Result<(String, Option<u16>), String> {
    if let Some(rest) = s.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| "unclosed '[' in address".to_string())?;
        let port = match after.strip_prefix(':') {
            Some(port) => Some(
                port.parse::<u16>()
                    .map_err(|_| format!("invalid port '{}'", port))?,
            ),
            None if after.is_empty() => None,
            None => return Err(format!("unexpected '{}' after address", after)),
        };
        return Ok((host.to_string(), port));
    }

    match s.rsplit_once(':') {
        // More than one colon means a bare IPv6 literal without a port.
        Some((host, port)) if !host.contains(':') => {
            let port = port
                .parse::<u16>()
                .map_err(|_| format!("invalid port '{}'", port))?;
            Ok((host.to_string(), Some(port)))
        }
        _ => Ok((s.to_string(), None)),
    }
}
