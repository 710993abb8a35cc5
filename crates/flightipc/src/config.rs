// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global configuration: protocol constants and the service directory.
//!
//! # Architecture
//!
//! - **Static**: compile-time constants (table sizes, buffer sizes, defaults)
//! - **Dynamic**: [`ServiceDirectory`], the name -> port / multicast group
//!   mapping every process shares, plus environment overrides
//!
//! # Environment
//!
//! - `FLIGHTIPC_SERVICES`: path of a services file read by [`ServiceDirectory::from_env`]
//! - `FLIGHTIPC_MULTICAST_IF`: IPv4 interface used for multicast membership

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

// =======================================================================
// Command tables
// =======================================================================

/// Number of slots in the legacy single-byte command table.
///
/// Slot 0 is never a legacy command: a leading 0x00 selects the structured
/// format instead.
pub const MAX_NUM_CMDS: usize = 256;

/// Largest datagram read from a command socket.
pub const MAX_IP_PACKET_SIZE: usize = 65_535;

// =======================================================================
// Encoding
// =======================================================================

/// First-attempt buffer size for self-contained struct encodings.
pub const DEFAULT_ENCODE_BUFFER: usize = 256;

/// Extra bytes added to the encoder's reported size on the single retry.
pub const ENCODE_SLACK: usize = 16;

// =======================================================================
// Command-line sender
// =======================================================================

/// Destination used when `-h` is not given.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// How long the sender waits for a response datagram.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Environment variable naming a services file.
pub const SERVICES_ENV: &str = "FLIGHTIPC_SERVICES";

/// Environment variable selecting the multicast membership interface.
pub const MULTICAST_IF_ENV: &str = "FLIGHTIPC_MULTICAST_IF";

/// Interface used to join multicast groups.
///
/// Honors `FLIGHTIPC_MULTICAST_IF`; falls back to `0.0.0.0` (kernel choice).
pub fn multicast_interface() -> Ipv4Addr {
    match std::env::var(MULTICAST_IF_ENV) {
        Ok(var) => match var.parse::<Ipv4Addr>() {
            Ok(addr) => {
                log::debug!("[CFG] Using {} override: {}", MULTICAST_IF_ENV, addr);
                addr
            }
            Err(_) => {
                log::warn!(
                    "[CFG] Invalid {}='{}' -- using UNSPECIFIED",
                    MULTICAST_IF_ENV,
                    var
                );
                Ipv4Addr::UNSPECIFIED
            }
        },
        Err(_) => Ipv4Addr::UNSPECIFIED,
    }
}

/// One named service: its unicast command port and optional multicast group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceEntry {
    /// UDP port of the service's command socket.
    pub port: u16,
    /// Multicast group the service publishes on, if any.
    pub multicast: Option<Ipv4Addr>,
}

/// Service name -> port / multicast group mapping.
///
/// File format, one service per line:
///
/// ```text
/// # name        port   [multicast-group]
/// telemetry     50010  239.192.0.10
/// atom-payload  50020
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServiceDirectory {
    services: HashMap<String, ServiceEntry>,
}

impl ServiceDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the directory named by `FLIGHTIPC_SERVICES`, or an empty one.
    pub fn from_env() -> Result<Self> {
        match std::env::var(SERVICES_ENV) {
            Ok(path) => Self::load(&path),
            Err(_) => Ok(Self::new()),
        }
    }

    /// Parse a services file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::parse(&text))
    }

    /// Parse services text. Malformed lines are logged and skipped.
    pub fn parse(text: &str) -> Self {
        let mut dir = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(name), Some(port)) = (parts.next(), parts.next()) else {
                log::warn!("[CFG] services line {}: missing port", lineno + 1);
                continue;
            };
            let Ok(port) = port.parse::<u16>() else {
                log::warn!("[CFG] services line {}: bad port '{}'", lineno + 1, port);
                continue;
            };
            let multicast = match parts.next() {
                Some(group) => match group.parse::<Ipv4Addr>() {
                    Ok(addr) if addr.is_multicast() => Some(addr),
                    _ => {
                        log::warn!(
                            "[CFG] services line {}: '{}' is not a multicast group",
                            lineno + 1,
                            group
                        );
                        continue;
                    }
                },
                None => None,
            };
            dir.services
                .insert(name.to_string(), ServiceEntry { port, multicast });
        }
        dir
    }

    /// Add or replace a unicast-only service.
    pub fn insert(&mut self, name: impl Into<String>, port: u16) -> &mut Self {
        self.services.insert(
            name.into(),
            ServiceEntry {
                port,
                multicast: None,
            },
        );
        self
    }

    /// Add or replace a service that also publishes on a multicast group.
    pub fn insert_multicast(
        &mut self,
        name: impl Into<String>,
        port: u16,
        group: Ipv4Addr,
    ) -> &mut Self {
        self.services.insert(
            name.into(),
            ServiceEntry {
                port,
                multicast: Some(group),
            },
        );
        self
    }

    /// Look up a service entry.
    pub fn get(&self, name: &str) -> Option<ServiceEntry> {
        self.services.get(name).copied()
    }

    /// Unicast command port of a service.
    pub fn port(&self, name: &str) -> Option<u16> {
        self.get(name).map(|s| s.port)
    }

    /// Multicast (group, port) of a service.
    pub fn multicast(&self, name: &str) -> Result<(Ipv4Addr, u16)> {
        match self.get(name) {
            Some(ServiceEntry {
                port,
                multicast: Some(group),
            }) if port != 0 => Ok((group, port)),
            _ => Err(Error::Resolve(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_services_text() {
        let dir = ServiceDirectory::parse(
            "# comment\n\
             telemetry 50010 239.192.0.10\n\
             atom-payload 50020   # trailing\n\
             broken\n\
             badport abc\n\
             notmcast 50030 10.0.0.1\n",
        );

        assert_eq!(dir.port("atom-payload"), Some(50020));
        assert_eq!(
            dir.multicast("telemetry").unwrap(),
            (Ipv4Addr::new(239, 192, 0, 10), 50010)
        );
        assert!(dir.multicast("atom-payload").is_err());
        assert!(dir.get("broken").is_none());
        assert!(dir.get("badport").is_none());
        assert!(dir.get("notmcast").is_none());
    }

    #[test]
    fn test_load_services_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "adcs 50040 239.192.0.40").unwrap();

        let dir = ServiceDirectory::load(file.path()).unwrap();
        assert_eq!(dir.port("adcs"), Some(50040));
    }

    #[test]
    fn test_builder_inserts_replace() {
        let mut dir = ServiceDirectory::new();
        dir.insert("cmd", 1000).insert("cmd", 2000);
        assert_eq!(dir.port("cmd"), Some(2000));
    }
}
