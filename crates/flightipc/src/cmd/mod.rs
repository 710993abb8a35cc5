// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command registries, legacy table and inbound dispatch.

pub mod cfg;
pub mod dispatch;
pub mod errors;
pub mod ipc;
pub mod legacy;
pub mod registry;

pub use cfg::{load_legacy_table, LegacyConfigEntry};
pub use dispatch::{CommandContext, CommandDispatcher, DispatchOutcome, DispatchStats};
pub use errors::{ErrorEntry, ErrorRegistry, STANDARD_ERRORS};
pub use ipc::{
    decode_command, decode_response_header, encode_command, encode_response, IpcCommand,
    ResponseHeader, RESULT_FAILED, RESULT_INVALID_PARAMETERS, RESULT_SUCCESS,
    RESULT_UNKNOWN_COMMAND, RESULT_UNSUPPORTED,
};
pub use legacy::{invalid_command, LegacyCommandTable, LegacyHandler, LegacySlot};
pub use registry::{CommandEntry, CommandHandler, CommandInfo, CommandRegistry};
