// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound command routing.
//!
//! Routes each datagram read from a process's command socket to either the
//! structured registry (first byte `0x00`) or the legacy table (first byte is
//! the command id). Malformed or unroutable datagrams are logged and dropped;
//! nothing here replies on the sender's behalf.

use crate::cmd::ipc::{decode_command, encode_response, ResponseHeader, STRUCTURED_SENTINEL};
use crate::cmd::legacy::LegacyCommandTable;
use crate::cmd::registry::CommandRegistry;
use crate::config::MAX_IP_PACKET_SIZE;
use crate::error::Result;
use crate::xdr::{StructValue, TypeRegistry};
use std::io;
use std::net::{SocketAddr, UdpSocket};

// ============================================================================
// Handler Context
// ============================================================================

/// What a structured handler sees besides the decoded command.
pub struct CommandContext<'a> {
    pub socket: &'a UdpSocket,
    pub source: SocketAddr,
    pub types: &'a TypeRegistry,
    pub command: u32,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        socket: &'a UdpSocket,
        source: SocketAddr,
        types: &'a TypeRegistry,
        command: u32,
    ) -> Self {
        Self {
            socket,
            source,
            types,
            command,
        }
    }

    /// Send a response for this command back to its source.
    ///
    /// `body` may be empty (header only), one structure, or several (sent as
    /// an opaque struct array).
    pub fn respond(&self, result: u32, body: &[StructValue]) -> Result<()> {
        let header = ResponseHeader {
            command: self.command,
            result,
        };
        let wire = encode_response(self.types, header, body)?;
        self.socket.send_to(&wire, self.source)?;
        log::debug!(
            "[CMD] response to 0x{:x} ({} bytes, result {}) -> {}",
            self.command,
            wire.len(),
            result,
            self.source
        );
        Ok(())
    }
}

// ============================================================================
// Dispatch Outcome
// ============================================================================

/// What happened to one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Zero-length read.
    Ignored,
    /// Structured handler invoked.
    Structured(u32),
    /// Legacy handler invoked.
    Legacy(u8),
    /// Structured command decoded but nothing registered to handle it.
    Unhandled(u32),
    /// Legacy command marked protected; not executed.
    Protected(u8),
    /// Malformed or out of range.
    Dropped,
}

/// Counters for datagrams seen by a dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub structured: u64,
    pub legacy: u64,
    pub unhandled: u64,
    pub protected: u64,
    pub dropped: u64,
}

impl DispatchStats {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Ignored => {}
            DispatchOutcome::Structured(_) => self.structured += 1,
            DispatchOutcome::Legacy(_) => self.legacy += 1,
            DispatchOutcome::Unhandled(_) => self.unhandled += 1,
            DispatchOutcome::Protected(_) => self.protected += 1,
            DispatchOutcome::Dropped => self.dropped += 1,
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Owns the registries for one process and routes its inbound datagrams.
pub struct CommandDispatcher {
    types: TypeRegistry,
    commands: CommandRegistry,
    legacy: LegacyCommandTable,
    stats: DispatchStats,
    rx_buf: Vec<u8>,
}

impl CommandDispatcher {
    pub fn new(types: TypeRegistry, commands: CommandRegistry, legacy: LegacyCommandTable) -> Self {
        Self {
            types,
            commands,
            legacy,
            stats: DispatchStats::default(),
            rx_buf: vec![0u8; MAX_IP_PACKET_SIZE],
        }
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut CommandRegistry {
        &mut self.commands
    }

    pub fn legacy(&self) -> &LegacyCommandTable {
        &self.legacy
    }

    pub fn legacy_mut(&mut self) -> &mut LegacyCommandTable {
        &mut self.legacy
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Route one datagram received on `socket` from `src`.
    pub fn handle_datagram(&mut self, socket: &UdpSocket, data: &[u8], src: SocketAddr) -> DispatchOutcome {
        let outcome = match data.first() {
            None => DispatchOutcome::Ignored,
            Some(&STRUCTURED_SENTINEL) => self.handle_structured(socket, data, src),
            Some(&cmd) => self.handle_legacy(socket, cmd, &data[1..], src),
        };
        self.stats.record(outcome);
        outcome
    }

    fn handle_structured(&mut self, socket: &UdpSocket, data: &[u8], src: SocketAddr) -> DispatchOutcome {
        let cmd = match decode_command(&self.types, data) {
            Ok(cmd) => cmd,
            Err(e) => {
                log::warn!(
                    "[CMD] failed to decode structured command of length {} from {}: {}",
                    data.len(),
                    src,
                    e
                );
                return DispatchOutcome::Dropped;
            }
        };

        let handler = self
            .commands
            .by_id_mut(cmd.command)
            .and_then(|entry| entry.handler.as_mut());
        match handler {
            Some(handler) => {
                log::debug!("[CMD] received structured command 0x{:x} from {}", cmd.command, src);
                let ctx = CommandContext::new(socket, src, &self.types, cmd.command);
                handler(&ctx, &cmd);
                DispatchOutcome::Structured(cmd.command)
            }
            None => {
                log::debug!("[CMD] no handler for structured command 0x{:x}", cmd.command);
                DispatchOutcome::Unhandled(cmd.command)
            }
        }
    }

    fn handle_legacy(&mut self, socket: &UdpSocket, cmd: u8, payload: &[u8], src: SocketAddr) -> DispatchOutcome {
        let Some(slot) = self.legacy.slot(cmd) else {
            log::warn!("[CMD] legacy command 0x{:02x} outside table of {}", cmd, self.legacy.len());
            return DispatchOutcome::Dropped;
        };

        log::info!(
            "[CMD] received command 0x{:02x} ({} - {})",
            cmd,
            slot.uid,
            slot.group
        );
        if slot.protected {
            log::warn!("[CMD] protected commands are not supported (0x{:02x})", cmd);
            return DispatchOutcome::Protected(cmd);
        }
        (slot.handler)(socket, cmd, payload, src);
        DispatchOutcome::Legacy(cmd)
    }

    /// Drain `socket` after a readable event.
    ///
    /// Reads until the socket would block; zero-length reads are skipped.
    /// Returns the number of datagrams routed.
    pub fn on_readable(&mut self, socket: &UdpSocket) -> io::Result<usize> {
        let mut buf = std::mem::take(&mut self.rx_buf);
        let mut routed = 0;
        let result = loop {
            match socket.recv_from(&mut buf) {
                Ok((0, _)) => continue,
                Ok((len, src)) => {
                    self.handle_datagram(socket, &buf[..len], src);
                    routed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(routed),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        self.rx_buf = buf;
        result
    }
}
