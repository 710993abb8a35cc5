// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # flightipc - Command messaging core for flight software processes
//!
//! Processes on a satellite talk to each other with small UDP datagrams:
//! commands addressed to a named process, responses sent back to the
//! requester, and telemetry published to multicast groups. This crate holds
//! the pieces every such process shares.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flightipc::cmd::{CommandDispatcher, CommandInfo, CommandRegistry, LegacyCommandTable};
//! use flightipc::xdr::{FieldDefinition, FieldKind, StructDefinition, TypeRegistry};
//! use flightipc::Result;
//! use std::net::UdpSocket;
//!
//! const SET_MODE: &[FieldDefinition] =
//!     &[FieldDefinition::new(FieldKind::U32, "value").describe("Operating mode")];
//!
//! fn main() -> Result<()> {
//!     let mut types = TypeRegistry::new();
//!     types.register(StructDefinition::with_fields(0x800, "SetMode", SET_MODE), false);
//!
//!     let mut commands = CommandRegistry::new();
//!     commands.register(
//!         CommandInfo::new(0x41, "setmode", "Change operating mode").params(0x800),
//!         Some(Box::new(|ctx, cmd| {
//!             log::info!("mode change: {:?}", cmd.parameters);
//!             let _ = ctx.respond(flightipc::cmd::RESULT_SUCCESS, &[]);
//!         })),
//!         false,
//!     );
//!
//!     let socket = UdpSocket::bind("0.0.0.0:50010")?;
//!     socket.set_nonblocking(true)?;
//!     let mut dispatcher = CommandDispatcher::new(types, commands, LegacyCommandTable::new());
//!     loop {
//!         dispatcher.on_readable(&socket)?;
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |   sender: argv -> IpcCommand -> datagram, wait, print response      |
//! +---------------------------------------------------------------------+
//! |   cmd: CommandRegistry | LegacyCommandTable | CommandDispatcher     |
//! |        ErrorRegistry   | .cfg loader        | envelope codec        |
//! +---------------------------------------------------------------------+
//! |   xdr: TypeRegistry | field-table codec | struct streams | printer  |
//! +---------------------------------------------------------------------+
//! |   mcast: MulticastManager  --  event: EventRegistry / PollLoop      |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`xdr::TypeRegistry`] | Struct definitions by type id, encode/decode/allocate |
//! | [`cmd::CommandRegistry`] | Structured commands by id and name |
//! | [`cmd::CommandDispatcher`] | Routes inbound datagrams to handlers |
//! | [`mcast::MulticastManager`] | Multicast subscriptions and their sockets |
//! | [`sender::CommandSender`] | Command-line front end |

// Clippy: No blanket suppressions. Fix issues properly or use inline #[allow] with justification.

/// Structured and legacy command handling.
pub mod cmd;
/// Constants, environment and the service directory.
pub mod config;
/// Error and Result types.
pub mod error;
/// Read-interest seam over the hosting event loop.
pub mod event;
/// Multicast subscription management.
pub mod mcast;
/// Command-line sender.
pub mod sender;
/// XDR codec, type registry and structure printing.
pub mod xdr;

pub use config::ServiceDirectory;
pub use error::{Error, Result};
pub use event::{EventRegistry, PollLoop};
pub use mcast::MulticastManager;
pub use sender::CommandSender;
