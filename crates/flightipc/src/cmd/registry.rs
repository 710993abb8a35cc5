// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structured command registry.

use crate::cmd::dispatch::CommandContext;
use crate::cmd::ipc::{IpcCommand, MAX_COMMAND_ID};
use crate::xdr::VOID_TYPE;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

/// Handler for a structured command. Captured state replaces the opaque
/// per-handler argument.
pub type CommandHandler = Box<dyn FnMut(&CommandContext<'_>, &IpcCommand)>;

/// Static description of a structured command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    /// Command id, `1..=MAX_COMMAND_ID`.
    pub id: u32,
    /// Name used on the command line (case-insensitive).
    pub name: &'static str,
    /// One-line summary for usage output.
    pub summary: &'static str,
    /// Parameter struct type, or [`VOID_TYPE`] for none.
    pub param_type: u32,
}

impl CommandInfo {
    pub const fn new(id: u32, name: &'static str, summary: &'static str) -> Self {
        Self {
            id,
            name,
            summary,
            param_type: VOID_TYPE,
        }
    }

    /// Attach a parameter struct type.
    pub const fn params(mut self, param_type: u32) -> Self {
        self.param_type = param_type;
        self
    }

    /// Whether the command takes a parameter block.
    pub fn has_params(&self) -> bool {
        self.param_type != VOID_TYPE
    }
}

/// One registered command.
pub struct CommandEntry {
    pub info: CommandInfo,
    pub handler: Option<CommandHandler>,
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("info", &self.info)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Commands keyed by id, iterated in id order.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    entries: BTreeMap<u32, CommandEntry>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command.
    ///
    /// Id 0 and ids above [`MAX_COMMAND_ID`] are ignored. An existing id is
    /// kept unless `override_existing` is set, in which case the entry is
    /// replaced in place. A name already used by another id is refused.
    /// Returns whether the new entry was stored.
    pub fn register(
        &mut self,
        info: CommandInfo,
        handler: Option<CommandHandler>,
        override_existing: bool,
    ) -> bool {
        if info.id == 0 || info.id > MAX_COMMAND_ID {
            log::warn!("[CMD] ignoring command '{}' with id 0x{:08x}", info.name, info.id);
            return false;
        }
        if let Some(other) = self.by_name(info.name) {
            if other.info.id != info.id {
                log::warn!(
                    "[CMD] name '{}' already used by command 0x{:x}",
                    info.name,
                    other.info.id
                );
                return false;
            }
        }

        match self.entries.entry(info.id) {
            Entry::Occupied(mut slot) => {
                if !override_existing {
                    log::debug!("[CMD] command 0x{:x} already registered, keeping it", info.id);
                    return false;
                }
                log::debug!("[CMD] command 0x{:x} replaced by '{}'", info.id, info.name);
                slot.insert(CommandEntry { info, handler });
            }
            Entry::Vacant(slot) => {
                log::debug!("[CMD] registered command '{}' [0x{:x}]", info.name, info.id);
                slot.insert(CommandEntry { info, handler });
            }
        }
        true
    }

    /// Register a schema table without handlers.
    pub fn register_all(&mut self, infos: &[CommandInfo], override_existing: bool) {
        for info in infos {
            self.register(*info, None, override_existing);
        }
    }

    /// Attach a handler to a registered command. Returns false if the id is
    /// unknown.
    pub fn set_handler(&mut self, id: u32, handler: CommandHandler) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.handler = Some(handler);
                true
            }
            None => {
                log::warn!("[CMD] no command 0x{:x} to attach a handler to", id);
                false
            }
        }
    }

    pub fn by_id(&self, id: u32) -> Option<&CommandEntry> {
        self.entries.get(&id)
    }

    pub fn by_id_mut(&mut self, id: u32) -> Option<&mut CommandEntry> {
        self.entries.get_mut(&id)
    }

    /// Case-insensitive lookup by name.
    pub fn by_name(&self, name: &str) -> Option<&CommandEntry> {
        self.entries
            .values()
            .find(|e| e.info.name.eq_ignore_ascii_case(name))
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
