// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Built-in command schema for the bus controller.

use flightipc::cmd::{CommandInfo, ErrorEntry};
use flightipc::xdr::{FieldDefinition, FieldKind, StructDefinition};

pub const SET_MODE_PARAMS: u32 = 0x0000_1001;
pub const TELEMETRY_PARAMS: u32 = 0x0000_1002;
pub const HEALTH_STATUS: u32 = 0x0000_1003;
pub const POWER_RAIL: u32 = 0x0000_1004;

const SET_MODE_FIELDS: &[FieldDefinition] = &[
    FieldDefinition::new(FieldKind::U32, "value")
        .name("Mode")
        .describe("Operating mode (0 safe, 1 nominal, 2 science)"),
];

const TELEMETRY_FIELDS: &[FieldDefinition] = &[
    FieldDefinition::new(FieldKind::String, "stream").describe("Telemetry stream name"),
    FieldDefinition::new(FieldKind::U32, "interval")
        .unit("ms")
        .describe("Publication interval in milliseconds, 0 disables"),
];

const POWER_RAIL_FIELDS: &[FieldDefinition] = &[
    FieldDefinition::new(FieldKind::String, "rail").name("Rail"),
    FieldDefinition::new(FieldKind::U32, "millivolts")
        .name("Voltage")
        .unit("V")
        .convert(0.0, 1000.0),
    FieldDefinition::new(FieldKind::I32, "milliamps")
        .name("Current")
        .unit("A")
        .convert(0.0, 1000.0),
];

const HEALTH_FIELDS: &[FieldDefinition] = &[
    FieldDefinition::new(FieldKind::U32, "mode").name("Mode"),
    FieldDefinition::new(FieldKind::U64, "uptime").name("Uptime").unit("s"),
    FieldDefinition::new(FieldKind::I32, "board_temp")
        .name("Board Temperature")
        .unit("C")
        .convert(2731.5, 10.0),
    FieldDefinition::new(FieldKind::Struct(POWER_RAIL), "battery").name("Battery"),
];

pub const TYPES: &[StructDefinition] = &[
    StructDefinition::with_fields(SET_MODE_PARAMS, "SetModeParams", SET_MODE_FIELDS),
    StructDefinition::with_fields(TELEMETRY_PARAMS, "TelemetryParams", TELEMETRY_FIELDS),
    StructDefinition::with_fields(POWER_RAIL, "PowerRail", POWER_RAIL_FIELDS),
    StructDefinition::with_fields(HEALTH_STATUS, "HealthStatus", HEALTH_FIELDS),
];

pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo::new(0x0000_0100, "status", "Request a health status report"),
    CommandInfo::new(0x0000_0101, "setmode", "Change the operating mode").params(SET_MODE_PARAMS),
    CommandInfo::new(0x0000_0102, "telemetry", "Set a telemetry stream interval")
        .params(TELEMETRY_PARAMS),
    CommandInfo::new(0x0000_0103, "reboot", ""),
];

pub const ERRORS: &[ErrorEntry] = &[
    ErrorEntry::new(0x100, "MODE_LOCKED", "Mode change refused while a pass is in progress"),
    ErrorEntry::new(0x101, "NO_STREAM", "No telemetry stream with that name"),
];
