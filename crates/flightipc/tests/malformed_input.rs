// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters

//! Random and mutated input must be rejected cleanly, never panic.
//!
//! Uses fixed seeds so failures reproduce.

use flightipc::cmd::{
    decode_command, decode_response_header, encode_command, CommandDispatcher, CommandInfo,
    CommandRegistry, DispatchOutcome, IpcCommand, LegacyCommandTable,
};
use flightipc::xdr::{
    encode_struct_array, iterate_structs, FieldDefinition, FieldKind, StructDefinition,
    StructValue, TypeRegistry, Value,
};
use std::net::UdpSocket;

const INNER: &[FieldDefinition] = &[
    FieldDefinition::new(FieldKind::I64, "epoch"),
    FieldDefinition::new(FieldKind::Bytes, "digest"),
];
const OUTER: &[FieldDefinition] = &[
    FieldDefinition::new(FieldKind::String, "label"),
    FieldDefinition::new(FieldKind::Struct(0x901), "inner"),
    FieldDefinition::new(FieldKind::Union, "extra"),
    FieldDefinition::new(FieldKind::F64, "gain"),
];

fn types() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types.register_all(
        &[
            StructDefinition::with_fields(0x901, "Inner", INNER),
            StructDefinition::with_fields(0x902, "Outer", OUTER),
        ],
        false,
    );
    types
}

fn sample(label: &str) -> StructValue {
    let inner = StructValue::new(0x901, vec![Value::I64(-5), Value::Bytes(vec![1, 2, 3])]);
    StructValue::new(
        0x902,
        vec![
            Value::String(label.to_string()),
            Value::Struct(inner.clone()),
            Value::Union(Some(Box::new(inner))),
            Value::F64(0.5),
        ],
    )
}

fn random_bytes(rng: &mut fastrand::Rng, max: usize) -> Vec<u8> {
    let len = rng.usize(0..=max);
    (0..len).map(|_| rng.u8(..)).collect()
}

#[test]
fn dispatcher_survives_random_datagrams() {
    let mut commands = CommandRegistry::new();
    commands.register(
        CommandInfo::new(0x10, "probe", "").params(0x902),
        Some(Box::new(|_, _| {})),
        false,
    );
    let mut d = CommandDispatcher::new(types(), commands, LegacyCommandTable::with_size(32));
    let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = sock.local_addr().unwrap();

    let mut rng = fastrand::Rng::with_seed(0x5EED_0001);
    for _ in 0..2000 {
        let mut data = random_bytes(&mut rng, 96);
        if rng.bool() && !data.is_empty() {
            data[0] = 0;
        }
        let outcome = d.handle_datagram(&sock, &data, addr);
        if data.is_empty() {
            assert_eq!(outcome, DispatchOutcome::Ignored);
        }
        if data.first().is_some_and(|&b| usize::from(b) >= 32) {
            assert_eq!(outcome, DispatchOutcome::Dropped);
        }
    }
}

#[test]
fn truncated_commands_are_errors() {
    let types = types();
    let wire = encode_command(&types, &IpcCommand::with_parameters(0x10, sample("truncate me"))).unwrap();
    assert!(decode_command(&types, &wire).is_ok());
    for cut in 0..wire.len() {
        assert!(decode_command(&types, &wire[..cut]).is_err(), "cut at {}", cut);
    }
    assert!(decode_response_header(&wire[..7]).is_err());
}

#[test]
fn mutated_struct_streams_never_panic() {
    let types = types();
    let stream = encode_struct_array(&types, &[sample("a"), sample("bb"), sample("ccc")]).unwrap();
    assert_eq!(iterate_structs(&types, &stream, |_, _, _| {}).unwrap(), 3);

    let mut rng = fastrand::Rng::with_seed(0x5EED_0002);
    for _ in 0..2000 {
        let mut mutated = stream.clone();
        for _ in 0..rng.usize(1..4) {
            let at = rng.usize(..mutated.len());
            mutated[at] = rng.u8(..);
        }
        mutated.truncate(rng.usize(0..=mutated.len()));

        let mut visited = 0;
        if let Ok(n) = iterate_structs(&types, &mutated, |_, _, _| visited += 1) {
            assert_eq!(n, visited);
        }
        let _ = types.decode_struct(0x902, &mutated, mutated.len());
    }
}
