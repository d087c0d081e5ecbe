//! Obfuscation parameters for the tunnel device
//!
//! Provides:
//! - packet padding sizes and message header identifiers
//! - junk packet settings
//! - startup validation with hard errors and informational notes
//!
//! The parameters change the wire shape of protocol messages to resist
//! traffic fingerprinting; the cryptographic protocol underneath is
//! untouched. With everything at its default the device stays
//! wire-compatible with the unobfuscated baseline protocol.

use crate::{HANDSHAKE_INIT_SIZE, HANDSHAKE_RESPONSE_SIZE, MAX_PACKET_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Obfuscation parameter errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObfuscationError {
    #[error("h1, h2, h3, h4 must all be distinct")]
    DuplicateHeader,

    #[error("s1={0} and s2={1} give initiation and response packets the same wire length")]
    PaddingCollision(u16, u16),

    #[error("junk packet minimum {0} exceeds maximum {1}")]
    JunkRange(u16, u16),

    #[error("padding {name}={value} exceeds the maximum packet size")]
    PaddingTooLarge { name: &'static str, value: u16 },
}

/// Obfuscation parameter set.
///
/// `s1`/`s2` pad the two handshake message types, `h1..h4` replace the four
/// message header identifiers, and the junk settings control decoy packets
/// sent ahead of the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObfuscationParams {
    /// Initiation packet padding in bytes
    pub s1: u16,
    /// Response packet padding in bytes
    pub s2: u16,
    /// Initiation packet header identifier
    pub h1: u32,
    /// Response packet header identifier
    pub h2: u32,
    /// Cookie packet header identifier
    pub h3: u32,
    /// Data packet header identifier
    pub h4: u32,
    /// Number of junk packets sent before the handshake
    pub jc: u8,
    /// Minimum junk packet size
    pub jmin: u16,
    /// Maximum junk packet size
    pub jmax: u16,
}

impl Default for ObfuscationParams {
    fn default() -> Self {
        Self {
            s1: 0,
            s2: 0,
            h1: 1,
            h2: 2,
            h3: 3,
            h4: 4,
            jc: 0,
            jmin: 50,
            jmax: 1000,
        }
    }
}

impl ObfuscationParams {
    /// Whether the headers and padding match the unobfuscated baseline
    /// protocol on the wire.
    pub fn is_baseline(&self) -> bool {
        self.headers() == [1, 2, 3, 4] && self.s1 == 0 && self.s2 == 0
    }

    fn headers(&self) -> [u32; 4] {
        [self.h1, self.h2, self.h3, self.h4]
    }

    /// Check the parameter set.
    ///
    /// Every rule is evaluated even when an earlier one already failed, so
    /// one report carries everything wrong with the set.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        let headers = self.headers();
        let distinct = headers
            .iter()
            .enumerate()
            .all(|(i, h)| headers[i + 1..].iter().all(|other| other != h));
        if !distinct {
            report.errors.push(ObfuscationError::DuplicateHeader);
        }
        if headers != [1, 2, 3, 4] {
            report
                .notes
                .push("custom message header identifiers in use".to_string());
        }

        if usize::from(self.s1) + HANDSHAKE_INIT_SIZE
            == usize::from(self.s2) + HANDSHAKE_RESPONSE_SIZE
        {
            report
                .errors
                .push(ObfuscationError::PaddingCollision(self.s1, self.s2));
        }

        if self.jmin > self.jmax {
            report
                .errors
                .push(ObfuscationError::JunkRange(self.jmin, self.jmax));
        }

        for (name, value) in [("s1", self.s1), ("s2", self.s2)] {
            if usize::from(value) > MAX_PACKET_SIZE {
                report
                    .errors
                    .push(ObfuscationError::PaddingTooLarge { name, value });
            }
        }

        if self.is_baseline() {
            report
                .notes
                .push("configuration is wire-compatible with the baseline protocol".to_string());
        }

        report
    }

    /// Append the interface lines in device order.
    pub(crate) fn write_lines(&self, conf: &mut String) {
        conf.push_str(&format!(
            "h1={}\nh2={}\nh3={}\nh4={}\n",
            self.h1, self.h2, self.h3, self.h4
        ));
        conf.push_str(&format!("s1={}\ns2={}\n", self.s1, self.s2));
        conf.push_str(&format!(
            "jc={}\njmin={}\njmax={}\n",
            self.jc, self.jmin, self.jmax
        ));
    }
}

/// Outcome of parameter validation.
#[derive(Debug, Default)]
pub struct ValidationReport {
    errors: Vec<ObfuscationError>,
    notes: Vec<String>,
}

impl ValidationReport {
    /// No hard errors found
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Hard errors; any of these must abort startup
    pub fn errors(&self) -> &[ObfuscationError] {
        &self.errors
    }

    /// Informational notes worth surfacing in the log
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// All errors joined for a single fatal message
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
