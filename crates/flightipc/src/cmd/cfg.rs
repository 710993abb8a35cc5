// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Legacy command configuration (`<proc>.cmd.cfg`).
//!
//! ```text
//! # payload process
//! CMD {
//!    PROC payload
//!    NAME OPTICAL_CAPTURE
//!    FUNC optical_capture
//!    NUM  5
//! }
//! ```
//!
//! Keys are case-insensitive. `PROT 1` marks the command protected and
//! `UID`/`GROUP` record the owning subsystem. Records missing `FUNC` or `NUM`
//! are skipped with a warning.

use crate::cmd::legacy::{LegacyCommandTable, LegacyHandler};
use crate::error::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One `CMD { ... }` record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyConfigEntry {
    pub proc_name: String,
    pub name: String,
    pub func: String,
    pub num: u32,
    pub protected: bool,
    pub uid: u32,
    pub group: u32,
}

/// Config file path for a process, relative to `dir`.
pub fn config_path(dir: &Path, proc_name: &str) -> PathBuf {
    dir.join(format!("{}.cmd.cfg", proc_name))
}

fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("");
        for word in line.split_whitespace() {
            let mut rest = word;
            while !rest.is_empty() {
                match rest.find(&['{', '}'][..]) {
                    Some(0) => {
                        tokens.push(&rest[..1]);
                        rest = &rest[1..];
                    }
                    Some(i) => {
                        tokens.push(&rest[..i]);
                        rest = &rest[i..];
                    }
                    None => {
                        tokens.push(rest);
                        rest = "";
                    }
                }
            }
        }
    }
    tokens
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_number(value: &str) -> Option<u32> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Parse configuration text. Never fails: malformed records are skipped.
pub fn parse(text: &str) -> Vec<LegacyConfigEntry> {
    let tokens = tokenize(text);
    let mut entries = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        if !tokens[i].eq_ignore_ascii_case("CMD") || tokens.get(i + 1) != Some(&"{") {
            log::warn!("[CFG] unexpected token '{}' in command config", tokens[i]);
            i += 1;
            continue;
        }
        i += 2;

        let mut entry = LegacyConfigEntry::default();
        let (mut has_func, mut has_num, mut valid) = (false, false, true);
        while i < tokens.len() && tokens[i] != "}" {
            let key = tokens[i];
            let Some(value) = tokens.get(i + 1).filter(|v| **v != "}").map(|v| unquote(v)) else {
                log::warn!("[CFG] key {} has no value", key);
                valid = false;
                i += 1;
                continue;
            };
            i += 2;

            match key.to_ascii_uppercase().as_str() {
                "PROC" => entry.proc_name = value.to_string(),
                "NAME" => entry.name = value.to_string(),
                "FUNC" => {
                    entry.func = value.to_string();
                    has_func = true;
                }
                "NUM" | "PROT" | "UID" | "GROUP" => {
                    let Some(n) = parse_number(value) else {
                        log::warn!("[CFG] {} value '{}' is not a number", key, value);
                        valid = false;
                        continue;
                    };
                    match key.to_ascii_uppercase().as_str() {
                        "NUM" => {
                            entry.num = n;
                            has_num = true;
                        }
                        "PROT" => entry.protected = n == 1,
                        "UID" => entry.uid = n,
                        _ => entry.group = n,
                    }
                }
                _ => log::warn!("[CFG] unknown key {} in CMD record", key),
            }
        }
        // closing brace
        i += 1;

        if valid && has_func && has_num {
            entries.push(entry);
        } else {
            log::warn!("[CFG] skipping incomplete CMD record '{}'", entry.name);
        }
    }
    entries
}

/// Read `<dir>/<proc_name>.cmd.cfg`.
///
/// A missing file is not an error: it is logged and yields no records.
pub fn load(dir: &Path, proc_name: &str) -> Result<Vec<LegacyConfigEntry>> {
    let path = config_path(dir, proc_name);
    match fs::read_to_string(&path) {
        Ok(text) => {
            log::info!("[CFG] {} found config file {}", proc_name, path.display());
            Ok(parse(&text))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("[CFG] no command configuration file found ({})", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Build the legacy table for a process: all slots invalid, then the
/// records from its config file resolved against `symbols`.
pub fn load_legacy_table(
    dir: &Path,
    proc_name: &str,
    symbols: &[(&'static str, LegacyHandler)],
) -> Result<LegacyCommandTable> {
    let entries = load(dir, proc_name)?;
    let mut table = LegacyCommandTable::new();
    table.apply_config(&entries, symbols);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{SocketAddr, UdpSocket};

    fn capture(_: &UdpSocket, _: u8, _: &[u8], _: SocketAddr) {}

    const SAMPLE: &str = r#"
# payload commands
CMD {
   PROC payload
   NAME OPTICAL_CAPTURE
   FUNC capture
   NUM  5
}
CMD{ PROC payload NAME "THERMAL" FUNC thermal NUM 0x06 PROT 1 UID 2 GROUP 3 }
CMD {
   NAME BROKEN
   NUM 7
}
"#;

    #[test]
    fn test_parse_records() {
        let entries = parse(SAMPLE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].func, "capture");
        assert_eq!(entries[0].num, 5);
        assert_eq!(entries[1].name, "THERMAL");
        assert_eq!(entries[1].num, 6);
        assert!(entries[1].protected);
        assert_eq!((entries[1].uid, entries[1].group), (2, 3));
    }

    #[test]
    fn test_bad_number_skips_record() {
        let entries = parse("CMD { FUNC capture NUM five }\nCMD { FUNC capture NUM 9 }");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].num, 9);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path(), "nobody").unwrap().is_empty());
    }

    #[test]
    fn test_load_legacy_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fs::File::create(config_path(dir.path(), "payload")).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let symbols: &[(&'static str, LegacyHandler)] = crate::legacy_handlers![capture];
        let table = load_legacy_table(dir.path(), "payload", symbols).unwrap();
        assert_eq!(table.slot(5).unwrap().name, "capture");
        // "thermal" is not in the symbol table
        assert_eq!(table.slot(6).unwrap().name, "invalid_command");
    }
}
