//! Peer state
//!
//! Provides:
//! - the immutable peer identity (public key, optional preshared key)
//! - the endpoint binding, resolved to a working address before use
//! - full and update configuration block emission
//!
//! A peer whose host is a literal address never gets a resolver; only
//! hostname-based peers carry one, and only those are ever refreshed.

use crate::key::Key;
use crate::resolver::{EndpointResolver, NameLookup, ResolverError, Upstream};
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, info};

/// Immutable peer identity.
#[derive(Debug, Clone)]
pub struct PeerIdentity {
    /// Peer public key
    pub public_key: Key,
    /// Optional preshared key
    pub preshared_key: Option<Key>,
}

/// A single tunnel peer and its endpoint binding.
///
/// The bound address is only ever rewritten through [`Peer::refresh`],
/// which the reconciliation loop drives as the binding's single writer.
pub struct Peer {
    identity: PeerIdentity,
    host: String,
    port: u16,
    keepalive: Option<u64>,
    addr: IpAddr,
    resolver: Option<EndpointResolver>,
}

impl Peer {
    /// Bind the peer's endpoint.
    ///
    /// A literal-address host binds immediately and the upstream is never
    /// consulted. A hostname builds the resolution transport and resolves
    /// synchronously, so a returned peer always carries a working address;
    /// a host with no reachable candidate fails construction.
    pub async fn bind(
        identity: PeerIdentity,
        host: impl Into<String>,
        port: u16,
        keepalive: Option<u64>,
        upstream: &Upstream,
    ) -> Result<Self, ResolverError> {
        let host = host.into();
        if let Ok(addr) = host.parse::<IpAddr>() {
            return Ok(Self {
                identity,
                host,
                port,
                keepalive,
                addr,
                resolver: None,
            });
        }

        let lookup: Box<dyn NameLookup> = Box::new(upstream.build().await?);
        Self::bind_resolved(identity, keepalive, EndpointResolver::new(host, port, lookup)).await
    }

    /// Bind a hostname peer over an already-built resolver.
    pub async fn bind_resolved(
        identity: PeerIdentity,
        keepalive: Option<u64>,
        resolver: EndpointResolver,
    ) -> Result<Self, ResolverError> {
        let addr = resolver.resolve().await?;
        debug!("Resolved {} to {}", resolver.host(), addr);
        Ok(Self {
            identity,
            host: resolver.host().to_string(),
            port: resolver.port(),
            keepalive,
            addr,
            resolver: Some(resolver),
        })
    }

    /// Peer identity
    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    /// Configured host, literal or name
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Currently bound endpoint
    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }

    /// Whether the host went through resolution and can be refreshed
    pub fn has_resolver(&self) -> bool {
        self.resolver.is_some()
    }

    /// Peer section of the full device configuration.
    pub fn full_block(&self) -> String {
        let mut conf = format!("public_key={}\n", self.identity.public_key);
        conf.push_str(&format!("endpoint={}\n", self.endpoint()));
        conf.push_str("allowed_ip=0.0.0.0/0\n");
        conf.push_str("allowed_ip=::/0\n");

        if let Some(keepalive) = self.keepalive {
            conf.push_str(&format!("persistent_keepalive_interval={}\n", keepalive));
        }
        if let Some(psk) = &self.identity.preshared_key {
            conf.push_str(&format!("preshared_key={}\n", psk));
        }

        conf
    }

    /// Re-resolve the endpoint and produce an update block when it moved.
    ///
    /// A resolution failure is logged and leaves the binding on its
    /// last-known-good address; an unchanged address produces nothing.
    pub async fn refresh(&mut self) -> Option<String> {
        let resolver = self.resolver.as_ref()?;
        let addr = match resolver.resolve().await {
            Ok(addr) => addr,
            Err(err) => {
                debug!("Resolve peer endpoint: {}", err);
                return None;
            }
        };

        if addr == self.addr {
            return None;
        }
        self.addr = addr;
        info!("Peer endpoint changed to {}", self.endpoint());
        Some(self.update_block())
    }

    fn update_block(&self) -> String {
        format!(
            "public_key={}\nupdate_only=true\nendpoint={}\n",
            self.identity.public_key,
            self.endpoint()
        )
    }
}
