//! Endpoint resolution
//!
//! Provides:
//! - a pluggable name-resolution transport ([`NameLookup`])
//! - upstream selector parsing (UDP, TCP, DNS-over-TLS, DNS-over-HTTPS)
//! - reachability probing and first-usable-candidate selection

mod probe;
mod upstream;

pub use probe::UdpProbe;
pub use upstream::{DnsProtocol, Upstream, UpstreamLookup};

pub(crate) use upstream::split_host_port;

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use tracing::debug;

/// Resolver errors
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Invalid resolver selector '{0}': {1}")]
    Selector(String, String),

    #[error("Lookup failed: {0}")]
    Lookup(#[from] hickory_resolver::error::ResolveError),

    #[error("No reachable address for {0}")]
    NoReachableCandidate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Name-resolution transport: turns a hostname into an ordered set of
/// candidate addresses. Candidate order is preserved by the caller.
#[async_trait]
pub trait NameLookup: Send + Sync {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolverError>;
}

/// Reachability check for a candidate address.
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn probe(&self, addr: SocketAddr) -> std::io::Result<()>;
}

/// Resolves the peer host to the first candidate that answers a probe.
pub struct EndpointResolver {
    host: String,
    port: u16,
    lookup: Box<dyn NameLookup>,
    probe: Box<dyn Reachability>,
}

impl EndpointResolver {
    /// Create a resolver over the given transport, probing with UDP.
    pub fn new(host: impl Into<String>, port: u16, lookup: Box<dyn NameLookup>) -> Self {
        Self {
            host: host.into(),
            port,
            lookup,
            probe: Box::new(UdpProbe),
        }
    }

    /// Replace the reachability probe.
    pub fn with_probe(mut self, probe: Box<dyn Reachability>) -> Self {
        self.probe = probe;
        self
    }

    /// The host this resolver is bound to
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The peer port probed on each candidate
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve the host to a usable address.
    ///
    /// A literal address is returned as-is without consulting the
    /// transport. Otherwise candidates are tried in the order the transport
    /// returned them and the first one that passes the reachability probe
    /// wins. Failure leaves any previously resolved state untouched; the
    /// caller only applies the new address on success.
    pub async fn resolve(&self) -> Result<IpAddr, ResolverError> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let candidates = self.lookup.lookup(&self.host).await?;
        for candidate in candidates {
            let candidate = unmap(candidate);
            match self.probe.probe(SocketAddr::new(candidate, self.port)).await {
                Ok(()) => return Ok(candidate),
                Err(err) => debug!("Probe {}: {}", candidate, err),
            }
        }
        Err(ResolverError::NoReachableCandidate(self.host.clone()))
    }
}

/// Fold IPv4-mapped IPv6 addresses back to plain IPv4; the userspace
/// network stack does not recognize the mapped form.
fn unmap(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => addr,
        },
        v4 => v4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StaticLookup {
        answers: Vec<IpAddr>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NameLookup for StaticLookup {
        async fn lookup(&self, _host: &str) -> Result<Vec<IpAddr>, ResolverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answers.clone())
        }
    }

    struct SelectiveProbe {
        reachable: Vec<IpAddr>,
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Reachability for SelectiveProbe {
        async fn probe(&self, addr: SocketAddr) -> std::io::Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.reachable.contains(&addr.ip()) {
                Ok(())
            } else {
                Err(std::io::Error::other("no route"))
            }
        }
    }

    #[tokio::test]
    async fn test_literal_host_skips_transport() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = EndpointResolver::new(
            "203.0.113.9",
            51820,
            Box::new(StaticLookup {
                answers: vec![],
                calls: calls.clone(),
            }),
        );

        let addr = resolver.resolve().await.unwrap();
        assert_eq!(addr, "203.0.113.9".parse::<IpAddr>().unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_reachable_candidate_wins() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let reachable: IpAddr = "203.0.113.5".parse().unwrap();
        let resolver = EndpointResolver::new(
            "example.test",
            51820,
            Box::new(StaticLookup {
                answers: vec![
                    "2001:db8::1".parse().unwrap(),
                    "2001:db8::2".parse().unwrap(),
                    reachable,
                    "203.0.113.7".parse().unwrap(),
                ],
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        )
        .with_probe(Box::new(SelectiveProbe {
            reachable: vec![reachable, "203.0.113.7".parse().unwrap()],
            attempts: attempts.clone(),
        }));

        let addr = resolver.resolve().await.unwrap();
        assert_eq!(addr, reachable);
        // Two failures plus the winner; the last candidate is never probed.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_mapped_candidates_are_unmapped() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let plain: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5));
        let resolver = EndpointResolver::new(
            "example.test",
            51820,
            Box::new(StaticLookup {
                answers: vec!["::ffff:203.0.113.5".parse().unwrap()],
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        )
        .with_probe(Box::new(SelectiveProbe {
            reachable: vec![plain],
            attempts: attempts.clone(),
        }));

        assert_eq!(resolver.resolve().await.unwrap(), plain);
    }

    #[tokio::test]
    async fn test_no_reachable_candidate() {
        let resolver = EndpointResolver::new(
            "example.test",
            51820,
            Box::new(StaticLookup {
                answers: vec!["2001:db8::1".parse().unwrap()],
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        )
        .with_probe(Box::new(SelectiveProbe {
            reachable: vec![],
            attempts: Arc::new(AtomicUsize::new(0)),
        }));

        match resolver.resolve().await {
            Err(ResolverError::NoReachableCandidate(host)) => assert_eq!(host, "example.test"),
            other => panic!("expected NoReachableCandidate, got {:?}", other.map(|_| ())),
        }
    }
}
