// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed table of single-byte legacy commands.
//!
//! Slot 0 is never a legacy command: a leading zero byte marks a structured
//! datagram. Every other slot starts at [`invalid_command`] and is replaced
//! by name from a static handler table when the process's `.cmd.cfg` is
//! applied.

use crate::cmd::cfg::LegacyConfigEntry;
use crate::config::MAX_NUM_CMDS;
use std::fmt;
use std::net::{SocketAddr, UdpSocket};

/// Legacy handler: `(socket, command byte, payload, source)`.
pub type LegacyHandler = fn(&UdpSocket, u8, &[u8], SocketAddr);

/// Build a static `(name, handler)` table for [`LegacyCommandTable::apply_config`].
///
/// Each handler is listed under its function name, or under an explicit
/// name with `as`.
///
/// ```
/// use std::net::{SocketAddr, UdpSocket};
///
/// fn capture(_: &UdpSocket, _: u8, _: &[u8], _: SocketAddr) {}
/// fn power_off(_: &UdpSocket, _: u8, _: &[u8], _: SocketAddr) {}
///
/// static HANDLERS: &[(&str, flightipc::cmd::LegacyHandler)] =
///     flightipc::legacy_handlers![capture, power_off as "shutdown"];
/// assert_eq!(HANDLERS[0].0, "capture");
/// assert_eq!(HANDLERS[1].0, "shutdown");
/// ```
#[macro_export]
macro_rules! legacy_handlers {
    (@name $func:ident $name:literal) => {
        $name
    };
    (@name $func:ident) => {
        stringify!($func)
    };
    ($($func:ident $(as $name:literal)?),* $(,)?) => {
        &[$((
            $crate::legacy_handlers!(@name $func $($name)?),
            $func as $crate::cmd::LegacyHandler,
        )),*]
    };
}

/// Default handler for unconfigured slots.
pub fn invalid_command(_socket: &UdpSocket, cmd: u8, _payload: &[u8], src: SocketAddr) {
    log::info!("[CMD] received invalid command 0x{:02x} from {}", cmd, src);
}

/// One legacy command slot.
#[derive(Clone, Copy)]
pub struct LegacySlot {
    pub handler: LegacyHandler,
    /// Symbol name the handler was resolved from.
    pub name: &'static str,
    /// Protected commands are refused; authentication is not implemented.
    pub protected: bool,
    /// Owning subsystem ids, logged on receipt.
    pub uid: u32,
    pub group: u32,
}

impl fmt::Debug for LegacySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacySlot")
            .field("name", &self.name)
            .field("protected", &self.protected)
            .field("uid", &self.uid)
            .field("group", &self.group)
            .finish()
    }
}

impl Default for LegacySlot {
    fn default() -> Self {
        Self {
            handler: invalid_command,
            name: "invalid_command",
            protected: false,
            uid: 0,
            group: 0,
        }
    }
}

/// The fixed-size legacy command table.
#[derive(Debug, Clone)]
pub struct LegacyCommandTable {
    slots: Vec<LegacySlot>,
}

impl Default for LegacyCommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyCommandTable {
    /// Table of [`MAX_NUM_CMDS`] slots, all invalid.
    pub fn new() -> Self {
        Self::with_size(MAX_NUM_CMDS)
    }

    /// Table with `size` slots (at most 256, since ids are one byte).
    pub fn with_size(size: usize) -> Self {
        Self {
            slots: vec![LegacySlot::default(); size.min(256)],
        }
    }

    /// Number of slots, including the reserved slot 0.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot for a command byte. Always `None` for 0.
    pub fn slot(&self, cmd: u8) -> Option<&LegacySlot> {
        if cmd == 0 {
            return None;
        }
        self.slots.get(usize::from(cmd))
    }

    /// Install a handler. Returns false for slot 0 or out-of-range ids.
    pub fn set(&mut self, cmd: u8, name: &'static str, handler: LegacyHandler) -> bool {
        match self.slot_mut(cmd) {
            Some(slot) => {
                slot.handler = handler;
                slot.name = name;
                true
            }
            None => false,
        }
    }

    /// Mark a slot protected (or not).
    pub fn set_protected(&mut self, cmd: u8, protected: bool) -> bool {
        match self.slot_mut(cmd) {
            Some(slot) => {
                slot.protected = protected;
                true
            }
            None => false,
        }
    }

    fn slot_mut(&mut self, cmd: u8) -> Option<&mut LegacySlot> {
        if cmd == 0 {
            return None;
        }
        self.slots.get_mut(usize::from(cmd))
    }

    /// Apply configuration records, resolving each `FUNC` name in `symbols`.
    ///
    /// Unresolvable names and out-of-range numbers are logged and skipped;
    /// the slot keeps its default. Returns the number of slots configured.
    pub fn apply_config(
        &mut self,
        entries: &[LegacyConfigEntry],
        symbols: &[(&'static str, LegacyHandler)],
    ) -> usize {
        let mut applied = 0;
        for entry in entries {
            let Some(&(name, handler)) = symbols.iter().find(|(n, _)| *n == entry.func) else {
                log::warn!(
                    "[CFG] [{} command file] no handler named '{}' for {} [{}]",
                    entry.proc_name,
                    entry.func,
                    entry.name,
                    entry.num
                );
                continue;
            };
            let Some(cmd) = u8::try_from(entry.num).ok().filter(|&c| self.slot(c).is_some())
            else {
                log::warn!(
                    "[CFG] [{} command file] command number {} out of range for {}",
                    entry.proc_name,
                    entry.num,
                    entry.name
                );
                continue;
            };

            if let Some(slot) = self.slot_mut(cmd) {
                slot.handler = handler;
                slot.name = name;
                slot.protected = entry.protected;
                slot.uid = entry.uid;
                slot.group = entry.group;
            }
            log::info!("[CFG] {} registered cmd {} [{}]", entry.proc_name, entry.func, entry.num);
            applied += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &UdpSocket, _: u8, _: &[u8], _: SocketAddr) {}
    fn other(_: &UdpSocket, _: u8, _: &[u8], _: SocketAddr) {}

    static SYMBOLS: &[(&str, LegacyHandler)] = legacy_handlers![noop, other as "alias"];

    fn entry(func: &str, num: u32) -> LegacyConfigEntry {
        LegacyConfigEntry {
            proc_name: "test".into(),
            name: func.to_uppercase(),
            func: func.into(),
            num,
            ..LegacyConfigEntry::default()
        }
    }

    #[test]
    fn test_slot_zero_never_resolves() {
        for size in [0, 1, 2, 16, 256, 1000] {
            let table = LegacyCommandTable::with_size(size);
            assert!(table.slot(0).is_none(), "size {}", size);
        }
        let mut table = LegacyCommandTable::new();
        assert!(!table.set(0, "noop", noop));
        assert!(!table.set_protected(0, true));
    }

    #[test]
    fn test_all_slots_start_invalid() {
        let table = LegacyCommandTable::new();
        assert_eq!(table.len(), MAX_NUM_CMDS);
        for cmd in 1..=255u8 {
            assert_eq!(table.slot(cmd).unwrap().name, "invalid_command");
        }
    }

    #[test]
    fn test_apply_config_resolves_by_name() {
        let mut table = LegacyCommandTable::new();
        let mut protected = entry("alias", 9);
        protected.protected = true;
        protected.uid = 4;

        let applied = table.apply_config(
            &[entry("noop", 5), protected, entry("missing", 6), entry("noop", 300), entry("noop", 0)],
            SYMBOLS,
        );
        assert_eq!(applied, 2);
        assert_eq!(table.slot(5).unwrap().name, "noop");
        assert_eq!(table.slot(6).unwrap().name, "invalid_command");

        let slot = table.slot(9).unwrap();
        assert_eq!(slot.name, "alias");
        assert!(slot.protected);
        assert_eq!(slot.uid, 4);
    }

    #[test]
    fn test_small_table_rejects_high_ids() {
        let mut table = LegacyCommandTable::with_size(8);
        assert!(table.set(7, "noop", noop));
        assert!(!table.set(8, "noop", noop));
        assert_eq!(table.apply_config(&[entry("noop", 8)], SYMBOLS), 0);
    }
}
