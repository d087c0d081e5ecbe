//! # Veilwire
//!
//! Keeps a single obfuscated tunnel peer configured and reachable when its
//! remote endpoint is named by a hostname rather than a fixed address.
//!
//! ## Features
//!
//! - **Pluggable endpoint resolution** over UDP, TCP, DNS-over-TLS or
//!   DNS-over-HTTPS upstreams
//! - **Reachability selection**: resolved candidates are probed and the
//!   first routable address wins, not just the first answer
//! - **Live reconfiguration**: a background task re-resolves the endpoint
//!   and pushes minimal update blocks to the running device
//! - **Obfuscation parameter validation** before anything reaches the device
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Device Configuration                  │
//! │    (parameter validation, full config assembly)      │
//! ├──────────────────────────┬──────────────────────────┤
//! │        Peer State        │    Reconciliation Loop   │
//! │   (identity, endpoint    │   (periodic re-resolve,  │
//! │   binding, block text)   │   update-block pushes)   │
//! ├──────────────────────────┴──────────────────────────┤
//! │                 Endpoint Resolution                  │
//! │     (resolver upstreams, reachability probing)       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! The tunnel device itself (key exchange, packet crypto, handshake state)
//! is an external collaborator reached through the [`device::ConfigSink`]
//! trait; this crate only produces and pushes its textual configuration.

pub mod config;
pub mod device;
pub mod key;
pub mod obfuscation;
pub mod peer;
pub mod reconcile;
pub mod resolver;

pub use config::Config;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest packet the tunnel device will put on the wire
pub const MAX_PACKET_SIZE: usize = 1280;

/// Handshake initiation message size before padding
pub const HANDSHAKE_INIT_SIZE: usize = 148;

/// Handshake response message size before padding
pub const HANDSHAKE_RESPONSE_SIZE: usize = 92;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Key error: {0}")]
    Key(#[from] key::KeyError),

    #[error("Resolver error: {0}")]
    Resolver(#[from] resolver::ResolverError),

    #[error("Obfuscation error: {0}")]
    Obfuscation(#[from] obfuscation::ObfuscationError),

    #[error("Device error: {0}")]
    Device(#[from] device::DeviceError),

    #[error("Configuration error: {0}")]
    Config(String),
}
