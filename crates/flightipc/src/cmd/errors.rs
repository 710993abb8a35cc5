// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Result-code names and descriptions used when printing responses.

use crate::cmd::ipc::{
    RESULT_FAILED, RESULT_INVALID_PARAMETERS, RESULT_SUCCESS, RESULT_UNKNOWN_COMMAND,
    RESULT_UNSUPPORTED,
};
use std::collections::HashMap;

/// One registered result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEntry {
    pub id: u32,
    pub name: &'static str,
    pub description: &'static str,
}

impl ErrorEntry {
    pub const fn new(id: u32, name: &'static str, description: &'static str) -> Self {
        Self {
            id,
            name,
            description,
        }
    }
}

/// Standard IPC result codes.
pub const STANDARD_ERRORS: &[ErrorEntry] = &[
    ErrorEntry::new(RESULT_SUCCESS, "SUCCESS", "Success"),
    ErrorEntry::new(RESULT_UNKNOWN_COMMAND, "UNKNOWN_COMMAND", "Unknown command"),
    ErrorEntry::new(
        RESULT_INVALID_PARAMETERS,
        "INVALID_PARAMETERS",
        "Invalid or missing command parameters",
    ),
    ErrorEntry::new(RESULT_FAILED, "FAILED", "Command failed"),
    ErrorEntry::new(RESULT_UNSUPPORTED, "UNSUPPORTED", "Command not supported"),
];

/// Result codes by id.
#[derive(Debug, Default)]
pub struct ErrorRegistry {
    entries: HashMap<u32, ErrorEntry>,
}

impl ErrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding [`STANDARD_ERRORS`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_all(STANDARD_ERRORS);
        registry
    }

    /// Register a code. An id already present is left untouched.
    pub fn register(&mut self, entry: ErrorEntry) -> bool {
        if self.entries.contains_key(&entry.id) {
            log::debug!("[CMD] error code {} already registered", entry.id);
            return false;
        }
        self.entries.insert(entry.id, entry);
        true
    }

    pub fn register_all(&mut self, entries: &[ErrorEntry]) {
        for entry in entries {
            self.register(*entry);
        }
    }

    pub fn get(&self, id: u32) -> Option<&ErrorEntry> {
        self.entries.get(&id)
    }

    /// Description, else short name, else `""`.
    pub fn message(&self, id: u32) -> &'static str {
        match self.entries.get(&id) {
            Some(e) if !e.description.is_empty() => e.description,
            Some(e) => e.name,
            None => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_fallbacks() {
        let mut errors = ErrorRegistry::with_defaults();
        errors.register(ErrorEntry::new(100, "NO_DESC", ""));

        assert_eq!(errors.message(RESULT_FAILED), "Command failed");
        assert_eq!(errors.message(100), "NO_DESC");
        assert_eq!(errors.message(12345), "");
    }

    #[test]
    fn test_first_registration_wins() {
        let mut errors = ErrorRegistry::new();
        assert!(errors.register(ErrorEntry::new(7, "A", "first")));
        assert!(!errors.register(ErrorEntry::new(7, "B", "second")));
        assert_eq!(errors.get(7).unwrap().name, "A");
    }
}
