//! Connectionless reachability probe

use super::Reachability;
use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;

/// UDP-connect probe.
///
/// Connecting a UDP socket only checks that a route to the target exists;
/// no datagram is sent, so the probe returns without waiting on the remote
/// end. The socket is closed as soon as the check completes.
pub struct UdpProbe;

#[async_trait]
impl Reachability for UdpProbe {
    async fn probe(&self, addr: SocketAddr) -> std::io::Result<()> {
        let bind: SocketAddr = match addr {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(addr).await
    }
}
