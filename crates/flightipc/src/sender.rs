// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command-line sender.
//!
//! Turns an argument list into one structured command datagram, sends it to
//! a named process and prints the reply.
//!
//! ```text
//! <program> [-c name | -n number] [-h host] [key=value ...]
//! <program> -c name --help
//! ```
//!
//! The program name (basename of `argv[0]`) acts as an implicit `-c`, so a
//! command can be installed as its own executable link.

use crate::cmd::ipc::{decode_response_header, encode_command, IpcCommand};
use crate::cmd::{CommandEntry, CommandRegistry, ErrorRegistry};
use crate::config::{ServiceDirectory, DEFAULT_HOST, DEFAULT_RESPONSE_TIMEOUT, MAX_IP_PACKET_SIZE};
use crate::error::{Error, Result};
use crate::xdr::{
    iterate_structs, print_structure, FieldDefinition, PrintStyle, StructValue, TypeRegistry,
};
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Status Codes
// ============================================================================

/// Usage summary printed.
pub const STATUS_USAGE: i32 = 1;
/// Command or multicall help printed.
pub const STATUS_HELP: i32 = 2;
/// Command sent and answered (or sent without waiting).
pub const STATUS_SENT: i32 = 0;
/// Destination host or service could not be resolved.
pub const STATUS_RESOLVE_FAILED: i32 = -1;
/// Command parameters are not described by a field table.
pub const STATUS_NOT_FIELD_TABLE: i32 = -2;
/// Parameter block could not be allocated.
pub const STATUS_ALLOCATE_FAILED: i32 = -3;
/// Encoding or sending failed.
pub const STATUS_SEND_FAILED: i32 = -4;
/// No response before the timeout.
pub const STATUS_TIMEOUT: i32 = -5;
/// A reply arrived but its header could not be decoded.
pub const STATUS_BAD_RESPONSE: i32 = -6;

const COLUMN: usize = 24;

// ============================================================================
// Multicall
// ============================================================================

/// Entry point of a multicall command: `(entry, program name, remaining
/// arguments, host, output)`.
pub type MulticallFn = fn(&MulticallInfo, &str, &[String], &str, &mut dyn Write) -> i32;

/// A command with its own argument grammar, bypassing `key=value` parsing.
#[derive(Clone, Copy)]
pub struct MulticallInfo {
    pub func: MulticallFn,
    pub name: &'static str,
    pub param_summary: &'static str,
    pub description: &'static str,
    pub detail: &'static str,
}

impl std::fmt::Debug for MulticallInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MulticallInfo")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Case-insensitive multicall lookup.
pub fn multicall_by_name<'m>(table: &'m [MulticallInfo], name: &str) -> Option<&'m MulticallInfo> {
    table.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}

// ============================================================================
// Help Output
// ============================================================================

fn summary_line(out: &mut dyn Write, name: &str, summary: &str) -> io::Result<()> {
    let summary = if summary.is_empty() { "UNDOCUMENTED" } else { summary };
    writeln!(out, "  \x1b[31m\x1b[1m{:>width$}\x1b[0m -- {}", name, summary, width = COLUMN)
}

/// Print the list of every multicall and structured command.
pub fn usage_summary(
    out: &mut dyn Write,
    program: &str,
    multicalls: &[MulticallInfo],
    commands: &CommandRegistry,
) -> io::Result<()> {
    writeln!(out, "Usage: {} -c <command name>", program)?;
    writeln!(
        out,
        "  Use --help with a command for detailed parameter information.\n"
    )?;
    writeln!(out, "Available commands are:")?;
    for mc in multicalls {
        summary_line(out, mc.name, mc.description)?;
    }
    for entry in commands.iter() {
        summary_line(out, entry.info.name, entry.info.summary)?;
    }
    Ok(())
}

fn scannable_fields(
    types: &TypeRegistry,
    entry: &CommandEntry,
) -> std::result::Result<&'static [FieldDefinition], i32> {
    if !entry.info.has_params() {
        return Ok(&[]);
    }
    match types.get(entry.info.param_type) {
        Some(def) => def.fields().ok_or(STATUS_NOT_FIELD_TABLE),
        None => Err(STATUS_ALLOCATE_FAILED),
    }
}

/// Print usage for one structured command. Returns the CLI status.
pub fn command_help(out: &mut dyn Write, types: &TypeRegistry, entry: &CommandEntry) -> i32 {
    let fields = match scannable_fields(types, entry) {
        Ok(fields) => fields,
        Err(status) => return status,
    };
    let scannable = || fields.iter().filter(|f| f.scannable);

    let mut emit = || -> io::Result<()> {
        write!(out, "{} [-h <destination>]", entry.info.name)?;
        for field in scannable() {
            write!(out, " [{}=<value>]", field.key)?;
        }
        writeln!(out)?;
        writeln!(out, " {}", entry.info.summary)?;
        writeln!(
            out,
            "   destination -- DNS name or IP address of machine to receive the command"
        )?;
        writeln!(out, "   Valid parameter/value pairs are:")?;
        for field in scannable() {
            writeln!(
                out,
                "     {:>width$} -- {}",
                field.key,
                field.description.unwrap_or("UNDOCUMENTED"),
                width = COLUMN
            )?;
        }
        Ok(())
    };
    if let Err(e) = emit() {
        log::debug!("[SEND] help output failed: {}", e);
    }
    STATUS_HELP
}

/// Print usage for one multicall command. Returns the CLI status.
pub fn multicall_help(out: &mut dyn Write, mc: &MulticallInfo) -> i32 {
    let result = writeln!(out, "{} [-h <destination>] {}", mc.name, mc.param_summary)
        .and_then(|_| writeln!(out, "{}\n{}", mc.description, mc.detail));
    if let Err(e) = result {
        log::debug!("[SEND] help output failed: {}", e);
    }
    STATUS_HELP
}

// ============================================================================
// Response Printing
// ============================================================================

/// Print a structured response.
///
/// A non-success result prints `Error: <message>`; otherwise every
/// structure in the trailing stream is printed in human style.
pub fn print_response(
    out: &mut dyn Write,
    types: &TypeRegistry,
    errors: &ErrorRegistry,
    response: &[u8],
) -> Result<()> {
    let (header, used) = decode_response_header(response)?;
    if !header.is_success() {
        writeln!(out, "Error: {}", errors.message(header.result))?;
        return Ok(());
    }

    let body = &response[used..];
    if body.is_empty() {
        return Ok(());
    }

    let walked = iterate_structs(types, body, |type_id, def, payload| {
        if def.is_none() {
            log::warn!("[SEND] response carries unknown struct type 0x{:08x}", type_id);
            return;
        }
        if let Err(e) = print_structure(out, types, type_id, payload, PrintStyle::Human) {
            log::warn!("[SEND] cannot print struct 0x{:08x}: {}", type_id, e);
        }
    });
    if let Err(e) = walked {
        log::warn!("[SEND] malformed response body ({}): {}", e.code(), e);
    }
    Ok(())
}

// ============================================================================
// Sender
// ============================================================================

/// Command-line sender bound to one destination process.
pub struct CommandSender<'a> {
    types: &'a TypeRegistry,
    commands: &'a CommandRegistry,
    errors: &'a ErrorRegistry,
    services: &'a ServiceDirectory,
    dest_service: &'a str,
    multicalls: &'a [MulticallInfo],
    timeout: Duration,
}

impl<'a> CommandSender<'a> {
    pub fn new(
        types: &'a TypeRegistry,
        commands: &'a CommandRegistry,
        errors: &'a ErrorRegistry,
        services: &'a ServiceDirectory,
        dest_service: &'a str,
    ) -> Self {
        Self {
            types,
            commands,
            errors,
            services,
            dest_service,
            multicalls: &[],
            timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Multicall table consulted before the structured registry.
    pub fn multicalls(mut self, multicalls: &'a [MulticallInfo]) -> Self {
        self.multicalls = multicalls;
        self
    }

    /// Response timeout; zero sends without waiting for a reply.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one command line (`args[0]` is the program path). Returns the
    /// process exit status.
    pub fn run(&self, args: &[String], out: &mut dyn Write) -> i32 {
        let program = args
            .first()
            .and_then(|a| Path::new(a).file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("flightcmd");

        let mut command = self.commands.by_name(program);
        let mut multicall = multicall_by_name(self.multicalls, program);
        let mut host = DEFAULT_HOST;

        let mut i = 1;
        while i < args.len() && args[i].starts_with('-') {
            let arg = &args[i];
            let flag = arg.as_bytes().get(1).copied();
            let takes_value = matches!(flag, Some(b'c' | b'h' | b'n'));
            if takes_value && (arg.len() > 2 || i + 1 >= args.len()) {
                return self.usage(program, out);
            }
            match flag {
                Some(b'c') => {
                    i += 1;
                    command = self.commands.by_name(&args[i]);
                    multicall = multicall_by_name(self.multicalls, &args[i]);
                }
                Some(b'h') => {
                    i += 1;
                    host = args[i].as_str();
                }
                Some(b'n') => {
                    i += 1;
                    command = parse_command_number(&args[i]).and_then(|id| self.commands.by_id(id));
                }
                _ => {
                    return match (multicall, command) {
                        (Some(mc), _) => multicall_help(out, mc),
                        (None, Some(entry)) => command_help(out, self.types, entry),
                        (None, None) => self.usage(program, out),
                    };
                }
            }
            i += 1;
        }

        if let Some(mc) = multicall {
            log::debug!("[SEND] delegating to multicall {}", mc.name);
            return (mc.func)(mc, program, &args[i..], host, out);
        }
        let Some(entry) = command else {
            return self.usage(program, out);
        };

        let dest = match self.resolve(host) {
            Ok(dest) => dest,
            Err(e) => {
                log::warn!("[SEND] {}", e);
                return STATUS_RESOLVE_FAILED;
            }
        };

        let parameters = match self.build_parameters(entry, &args[i..]) {
            Ok(parameters) => parameters,
            Err(BuildError::Status(status)) => return status,
            Err(BuildError::Help) => return command_help(out, self.types, entry),
        };

        let cmd = IpcCommand {
            command: entry.info.id,
            parameters,
        };
        let reply = match self.send(&cmd, dest) {
            Ok(reply) => reply,
            Err(Error::Timeout) => {
                log::warn!("[SEND] no response from {} within {:?}", dest, self.timeout);
                return STATUS_TIMEOUT;
            }
            Err(e) => {
                log::warn!("[SEND] command {} to {} failed: {}", entry.info.name, dest, e);
                return STATUS_SEND_FAILED;
            }
        };
        match reply.map(|reply| print_response(out, self.types, self.errors, &reply)) {
            None | Some(Ok(())) => STATUS_SENT,
            Some(Err(e)) => {
                log::warn!("[SEND] unreadable response to {} from {}: {}", entry.info.name, dest, e);
                STATUS_BAD_RESPONSE
            }
        }
    }

    fn usage(&self, program: &str, out: &mut dyn Write) -> i32 {
        if let Err(e) = usage_summary(out, program, self.multicalls, self.commands) {
            log::debug!("[SEND] usage output failed: {}", e);
        }
        STATUS_USAGE
    }

    fn resolve(&self, host: &str) -> Result<SocketAddr> {
        let port = self
            .services
            .port(self.dest_service)
            .ok_or_else(|| Error::Resolve(self.dest_service.to_string()))?;
        let ip = (host, port)
            .to_socket_addrs()
            .map_err(|_| Error::Resolve(host.to_string()))?
            .map(|addr| addr.ip())
            .find(IpAddr::is_ipv4)
            .ok_or_else(|| Error::Resolve(host.to_string()))?;
        let ip = if ip.is_unspecified() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            ip
        };
        Ok(SocketAddr::new(ip, port))
    }

    /// Scan `key=value` pairs into a fresh parameter block.
    ///
    /// No pairs means no parameters are sent, even for commands that accept
    /// some.
    fn build_parameters(
        &self,
        entry: &CommandEntry,
        pairs: &[String],
    ) -> std::result::Result<Option<StructValue>, BuildError> {
        if !entry.info.has_params() {
            return match pairs.is_empty() {
                true => Ok(None),
                false => Err(BuildError::Help),
            };
        }
        let def = self
            .types
            .get(entry.info.param_type)
            .ok_or(BuildError::Status(STATUS_ALLOCATE_FAILED))?;
        let fields = def.fields().ok_or(BuildError::Status(STATUS_NOT_FIELD_TABLE))?;
        let mut block = self
            .types
            .allocate(def.type_id)
            .map_err(|_| BuildError::Status(STATUS_ALLOCATE_FAILED))?;

        for pair in pairs {
            let Some((key, value)) = pair.split_once('=') else {
                log::debug!("[SEND] argument '{}' is not key=value", pair);
                return Err(BuildError::Help);
            };
            let Some(index) = def.field_index(key).filter(|&i| fields[i].scannable) else {
                log::debug!("[SEND] {} has no parameter '{}'", entry.info.name, key);
                return Err(BuildError::Help);
            };
            let field = &fields[index];
            let scanned = field.kind.scan(field.key, value).and_then(|v| block.set(def, index, v));
            if let Err(e) = scanned {
                log::warn!("[SEND] {}", e);
                return Err(BuildError::Help);
            }
        }
        Ok((!pairs.is_empty()).then_some(block))
    }

    /// Send `cmd` and wait for one reply, unless the timeout is zero.
    fn send(&self, cmd: &IpcCommand, dest: SocketAddr) -> Result<Option<Vec<u8>>> {
        let wire = encode_command(self.types, cmd)?;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.send_to(&wire, dest)?;
        log::debug!("[SEND] command 0x{:x} ({} bytes) -> {}", cmd.command, wire.len(), dest);

        if self.timeout.is_zero() {
            return Ok(None);
        }
        socket.set_read_timeout(Some(self.timeout))?;
        let mut buf = vec![0u8; MAX_IP_PACKET_SIZE];
        let len = match socket.recv_from(&mut buf) {
            Ok((len, _)) => len,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Err(Error::Timeout)
            }
            Err(e) => return Err(e.into()),
        };
        buf.truncate(len);
        Ok(Some(buf))
    }
}

/// Command number with C-style radix prefixes: `0x` hex, leading `0` octal.
fn parse_command_number(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        u32::from_str_radix(&text[1..], 8).ok()
    } else {
        text.parse().ok()
    }
}

enum BuildError {
    /// Print command help.
    Help,
    /// Return this status without output.
    Status(i32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::{CommandInfo, ErrorEntry};
    use crate::xdr::{FieldKind, StructDefinition};

    const SETMODE: &[FieldDefinition] = &[
        FieldDefinition::new(FieldKind::U32, "value").describe("Mode number"),
        FieldDefinition::new(FieldKind::String, "note"),
        FieldDefinition::new(FieldKind::U32, "crc").read_only(),
    ];

    fn fixture() -> (TypeRegistry, CommandRegistry, ErrorRegistry) {
        let mut types = TypeRegistry::new();
        types.register(StructDefinition::with_fields(0x800, "SetMode", SETMODE), false);
        let mut commands = CommandRegistry::new();
        commands.register_all(
            &[
                CommandInfo::new(0x41, "setmode", "Change operating mode").params(0x800),
                CommandInfo::new(0x42, "status", ""),
            ],
            false,
        );
        let mut errors = ErrorRegistry::with_defaults();
        errors.register(ErrorEntry::new(77, "BUSY", "Subsystem busy"));
        (types, commands, errors)
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run(list: &[&str]) -> (i32, String) {
        let (types, commands, errors) = fixture();
        let services = ServiceDirectory::new();
        let sender = CommandSender::new(&types, &commands, &errors, &services, "nowhere");
        let mut out = Vec::new();
        let status = sender.run(&args(list), &mut out);
        (status, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_usage_paths() {
        let (status, text) = run(&["/usr/bin/flightcmd"]);
        assert_eq!(status, STATUS_USAGE);
        assert!(text.starts_with("Usage: flightcmd -c <command name>"));
        assert!(text.contains("setmode\x1b[0m -- Change operating mode"));
        assert!(text.contains("status\x1b[0m -- UNDOCUMENTED"));

        assert_eq!(run(&["prog", "-c"]).0, STATUS_USAGE);
        assert_eq!(run(&["prog", "-cfoo", "x"]).0, STATUS_USAGE);
        assert_eq!(run(&["prog", "--"]).0, STATUS_USAGE);
        assert_eq!(run(&["prog", "-c", "nosuch"]).0, STATUS_USAGE);
    }

    #[test]
    fn test_command_help_lists_scannable_fields() {
        let (status, text) = run(&["prog", "-c", "SETMODE", "--help"]);
        assert_eq!(status, STATUS_HELP);
        assert!(text.starts_with("setmode [-h <destination>] [value=<value>] [note=<value>]\n"));
        assert!(text.contains(&format!("     {:>24} -- Mode number\n", "value")));
        assert!(text.contains(&format!("     {:>24} -- UNDOCUMENTED\n", "note")));
        assert!(!text.contains("crc"));
    }

    #[test]
    fn test_program_name_selects_command() {
        let (status, text) = run(&["/opt/bin/setmode", "-x"]);
        assert_eq!(status, STATUS_HELP);
        assert!(text.starts_with("setmode"));
    }

    #[test]
    fn test_numeric_selection() {
        let (status, text) = run(&["prog", "-n", "0x41", "--help"]);
        assert_eq!(status, STATUS_HELP);
        assert!(text.starts_with("setmode"));
    }

    #[test]
    fn test_command_number_radix() {
        assert_eq!(parse_command_number("65"), Some(65));
        assert_eq!(parse_command_number("0x41"), Some(0x41));
        assert_eq!(parse_command_number("010"), Some(8));
        assert_eq!(parse_command_number("0"), Some(0));
        assert_eq!(parse_command_number("09"), None);
        assert_eq!(parse_command_number("-1"), None);

        let (status, text) = run(&["prog", "-n", "0101", "--help"]);
        assert_eq!(status, STATUS_HELP);
        assert!(text.starts_with("setmode"));
    }

    #[test]
    fn test_unknown_service_is_resolve_failure() {
        assert_eq!(run(&["prog", "-c", "setmode", "value=3"]).0, STATUS_RESOLVE_FAILED);
    }

    fn mc_echo(mc: &MulticallInfo, program: &str, rest: &[String], host: &str, out: &mut dyn Write) -> i32 {
        let _ = writeln!(out, "{} {} {} {}", mc.name, program, rest.join(" "), host);
        42
    }

    #[test]
    fn test_multicall_delegates_with_remaining_args() {
        let (types, commands, errors) = fixture();
        let services = ServiceDirectory::new();
        let table = [MulticallInfo {
            func: mc_echo,
            name: "capture",
            param_summary: "<camera>",
            description: "Take a picture",
            detail: "camera is optical or thermal",
        }];
        let sender =
            CommandSender::new(&types, &commands, &errors, &services, "payload").multicalls(&table);

        let mut out = Vec::new();
        let status = sender.run(&args(&["prog", "-h", "10.0.0.9", "-c", "capture", "optical", "x=1"]), &mut out);
        assert_eq!(status, 42);
        assert_eq!(String::from_utf8(out).unwrap(), "capture prog optical x=1 10.0.0.9\n");

        let mut out = Vec::new();
        assert_eq!(sender.run(&args(&["prog", "-c", "capture", "--help"]), &mut out), STATUS_HELP);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "capture [-h <destination>] <camera>\nTake a picture\ncamera is optical or thermal\n"
        );

        let mut out = Vec::new();
        sender.run(&args(&["prog"]), &mut out);
        assert!(String::from_utf8(out).unwrap().contains("capture\x1b[0m -- Take a picture"));
    }

    #[test]
    fn test_print_response_error_and_body() {
        let (types, _, errors) = fixture();
        let header = crate::cmd::ResponseHeader { command: 0x41, result: 77 };
        let wire = crate::cmd::encode_response(&types, header, &[]).unwrap();
        let mut out = Vec::new();
        print_response(&mut out, &types, &errors, &wire).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Error: Subsystem busy\n");

        let header = crate::cmd::ResponseHeader { command: 0x41, result: 0 };
        let body = StructValue::new(
            0x800,
            vec![
                crate::xdr::Value::U32(3),
                crate::xdr::Value::String("ok".into()),
                crate::xdr::Value::U32(0),
            ],
        );
        let wire = crate::cmd::encode_response(&types, header, &[body.clone(), body]).unwrap();
        let mut out = Vec::new();
        print_response(&mut out, &types, &errors, &wire).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "value: 3\nnote: ok\ncrc: 0\nvalue: 3\nnote: ok\ncrc: 0\n"
        );
    }
}
