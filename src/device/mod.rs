//! Device configuration interface
//!
//! Provides:
//! - the [`ConfigSink`] trait the live tunnel device implements
//! - full configuration assembly from device-side settings plus the peer block
//! - the startup configure-then-watch entry point

use crate::key::Key;
use crate::obfuscation::ObfuscationParams;
use crate::peer::Peer;
use crate::reconcile::{self, ReconcileHandle};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// Device configuration errors
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Device rejected configuration: {0}")]
    Rejected(String),

    #[error("Invalid obfuscation parameters: {0}")]
    InvalidParams(String),
}

/// Applies configuration text to the live tunnel device.
///
/// The device consumes newline-terminated `key=value` lines and applies a
/// block atomically. An update block references only the fields being
/// changed and must leave all other live session state untouched, so
/// repeated partial applies are safe.
#[async_trait]
pub trait ConfigSink: Send + Sync {
    async fn apply(&self, config: &str) -> Result<(), DeviceError>;
}

/// Device-side configuration: everything ahead of the peer block.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device private key
    pub private_key: Key,
    /// Explicit listen port; the device picks an ephemeral one when unset
    pub listen_port: Option<u16>,
    /// Obfuscation parameter set
    pub obfuscation: ObfuscationParams,
}

impl DeviceConfig {
    /// Assemble the full configuration block for a peer.
    ///
    /// Obfuscation parameters are validated first and every violated rule
    /// is logged; any hard error aborts assembly before a line is produced.
    /// The peer block always comes last.
    pub fn full_config(&self, peer: &Peer) -> Result<String, DeviceError> {
        let report = self.obfuscation.validate();
        for note in report.notes() {
            info!("{}", note);
        }
        if !report.is_ok() {
            for err in report.errors() {
                error!("Obfuscation parameters: {}", err);
            }
            return Err(DeviceError::InvalidParams(report.summary()));
        }

        let mut conf = format!("private_key={}\n", self.private_key);
        if let Some(port) = self.listen_port {
            conf.push_str(&format!("listen_port={}\n", port));
        }
        self.obfuscation.write_lines(&mut conf);
        conf.push_str(&peer.full_block());

        Ok(conf)
    }
}

/// Push the full configuration and start endpoint reconciliation.
///
/// The initial push is fatal on failure. The reconciliation task is only
/// started when the peer actually went through resolution and the interval
/// is nonzero; otherwise there is nothing to keep current and no handle is
/// returned.
pub async fn configure(
    device: &DeviceConfig,
    peer: Peer,
    sink: Arc<dyn ConfigSink>,
    interval: Duration,
) -> Result<Option<ReconcileHandle>, DeviceError> {
    let conf = device.full_config(&peer)?;
    debug!("Device config:\n{}", redact_keys(&conf));
    sink.apply(&conf).await?;

    if peer.has_resolver() && !interval.is_zero() {
        return Ok(Some(reconcile::spawn(peer, sink, interval)));
    }
    Ok(None)
}

/// Key material never goes to the log.
fn redact_keys(conf: &str) -> String {
    conf.lines()
        .map(|line| match line.split_once('=') {
            Some((key, _)) if key == "private_key" || key == "preshared_key" => {
                format!("{}=(redacted)", key)
            }
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
