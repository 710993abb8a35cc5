// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! flightcmd - send a command to a flight software process
//!
//! ```text
//! flightcmd -c setmode value=1
//! flightcmd -h 10.0.0.7 -c telemetry stream=adcs interval=500
//! flightcmd -c capture thermal 3
//! ```
//!
//! Services come from the file named by `FLIGHTIPC_SERVICES`; the target
//! process defaults to `bus` and can be changed with `FLIGHTCMD_DEST`.

mod schema;

use flightipc::cmd::{CommandRegistry, ErrorRegistry};
use flightipc::sender::{
    multicall_help, MulticallInfo, STATUS_HELP, STATUS_RESOLVE_FAILED, STATUS_SEND_FAILED, STATUS_SENT,
    STATUS_USAGE,
};
use flightipc::xdr::TypeRegistry;
use flightipc::{CommandSender, ServiceDirectory};
use std::io::{self, Write};
use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::OnceLock;

const DEST_ENV: &str = "FLIGHTCMD_DEST";
const DEFAULT_DEST: &str = "bus";
const DEFAULT_BUS_PORT: u16 = 50_000;
const PAYLOAD_SERVICE: &str = "payload";
const DEFAULT_PAYLOAD_PORT: u16 = 50_020;

/// Legacy payload command number for an image capture.
const CAPTURE_CMD: u8 = 5;

static SERVICES: OnceLock<ServiceDirectory> = OnceLock::new();

const MULTICALLS: &[MulticallInfo] = &[MulticallInfo {
    func: capture,
    name: "capture",
    param_summary: "<optical|thermal> [count]",
    description: "Trigger a payload image capture",
    detail: "   count -- number of frames, 1 to 255 (default 1)",
}];

/// Sends the payload's legacy capture command: `[cmd, camera, count]`.
fn capture(mc: &MulticallInfo, _program: &str, args: &[String], host: &str, out: &mut dyn Write) -> i32 {
    let camera = match args.first().map(String::as_str) {
        Some("optical") => 0u8,
        Some("thermal") => 1u8,
        _ => return multicall_help(out, mc),
    };
    let count = match args.get(1).map(|c| c.parse::<u8>()) {
        None => 1,
        Some(Ok(n)) if n > 0 => n,
        Some(_) => return multicall_help(out, mc),
    };

    let port = services().port(PAYLOAD_SERVICE).unwrap_or(DEFAULT_PAYLOAD_PORT);
    let dest = match (host, port).to_socket_addrs().map(|mut addrs| addrs.find(|a| a.is_ipv4())) {
        Ok(Some(dest)) => dest,
        _ => {
            log::warn!("[SEND] cannot resolve {}", host);
            return STATUS_RESOLVE_FAILED;
        }
    };
    let sent = UdpSocket::bind("0.0.0.0:0").and_then(|s| s.send_to(&[CAPTURE_CMD, camera, count], dest));
    match sent {
        Ok(_) => {
            log::info!("[SEND] capture camera={} count={} -> {}", camera, count, dest);
            STATUS_SENT
        }
        Err(e) => {
            log::warn!("[SEND] capture to {} failed: {}", dest, e);
            STATUS_SEND_FAILED
        }
    }
}

fn services() -> &'static ServiceDirectory {
    SERVICES.get_or_init(|| {
        let mut dir = ServiceDirectory::from_env().unwrap_or_else(|e| {
            log::warn!("[CFG] services file unreadable, using defaults: {}", e);
            ServiceDirectory::new()
        });
        if dir.port(DEFAULT_DEST).is_none() {
            dir.insert(DEFAULT_DEST, DEFAULT_BUS_PORT);
        }
        if dir.port(PAYLOAD_SERVICE).is_none() {
            dir.insert(PAYLOAD_SERVICE, DEFAULT_PAYLOAD_PORT);
        }
        dir
    })
}

fn main() {
    env_logger::init();

    let mut types = TypeRegistry::new();
    types.register_all(schema::TYPES, false);
    let mut commands = CommandRegistry::new();
    commands.register_all(schema::COMMANDS, false);
    let mut errors = ErrorRegistry::with_defaults();
    errors.register_all(schema::ERRORS);

    let dest = std::env::var(DEST_ENV).unwrap_or_else(|_| DEFAULT_DEST.to_string());
    let sender = CommandSender::new(&types, &commands, &errors, services(), &dest).multicalls(MULTICALLS);

    let args: Vec<String> = std::env::args().collect();
    let stdout = io::stdout();
    let status = sender.run(&args, &mut stdout.lock());
    let code = match status {
        STATUS_USAGE | STATUS_HELP => status,
        other => other.unsigned_abs().min(255) as i32,
    };
    std::process::exit(code);
}
