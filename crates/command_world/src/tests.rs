//! Tests for the kernel's leaf modules: outcomes, the action table, the
//! pause taxonomy, and the forensic log.

use command_world_proto::envelope::Opcode;

use super::*;

fn noop_spec(opcode: u16, category: ActionCategory) -> ActionSpec<()> {
    ActionSpec {
        opcode: Opcode(opcode),
        name: "noop",
        flags: ActionFlags::NONE,
        category,
        role: ActionRole::Standard,
        handler: Box::new(FnHandler(
            |_: &mut Exec<'_, ()>, _: &CommandRequest, _: ExecFlags| Outcome::empty(),
        )),
    }
}

fn entry(opcode: u16, flags: LogFlags) -> CommandLogEntry {
    CommandLogEntry {
        tile: 66,
        p1: 0xAB,
        p2: 0xCD,
        opcode: Opcode(opcode),
        stamp: SimStamp {
            year: 1950,
            month: 3,
            day: 7,
            date_fract: 0x12,
            tick_skip: 1,
        },
        acting_party: Party::Company(2),
        local_party: Party::Company(1),
        flags,
    }
}

// ============================================================================
// Outcome
// ============================================================================

#[test]
fn outcome_empty_is_zero_cost_success() {
    let outcome = Outcome::empty();
    assert!(outcome.succeeded());
    assert_eq!(outcome.cost(), 0);
    assert_eq!(outcome.failed_with(), None);
}

#[test]
fn outcome_combine_accumulates_cost() {
    let mut total = Outcome::success(ExpenseKind::Construction, 100);
    total.combine(&Outcome::success(ExpenseKind::Construction, -30));
    assert!(total.succeeded());
    assert_eq!(total.cost(), 70);
}

#[test]
fn outcome_combine_first_failure_poisons() {
    let mut total = Outcome::success(ExpenseKind::Construction, 100);
    total.combine(&Outcome::failed(codes::REJECTED));
    total.combine(&Outcome::failed(codes::NO_FUNDS));
    assert!(total.is_failure());
    assert_eq!(total.failed_with(), Some(codes::REJECTED));
    // Cost keeps accumulating even past the failure.
    total.combine(&Outcome::success(ExpenseKind::Construction, 5));
    assert_eq!(total.cost(), 105);
}

#[test]
fn outcome_attach_context_copies_registers() {
    let mut outcome = Outcome::failed(codes::REJECTED);
    let registers = [7u32, 8, 9];
    outcome.attach_context("authority", &registers);
    let context = outcome.context().unwrap();
    assert_eq!(context.source(), "authority");
    assert_eq!(context.registers(), &registers);
}

#[test]
#[should_panic(expected = "error context register overflow")]
fn outcome_attach_context_overflow_is_a_bug() {
    let mut outcome = Outcome::failed(codes::REJECTED);
    outcome.attach_context("authority", &[0u32; MAX_ERROR_REGISTERS + 1]);
}

#[test]
fn outcome_summary_renders_both_verdicts() {
    assert_eq!(
        Outcome::success(ExpenseKind::Construction, 42).summary(None),
        "Success: cost: 42"
    );
    let mut failed = Outcome::failed(codes::NO_FUNDS);
    failed.attach_context("ledger", &[500, 0]);
    assert_eq!(
        failed.summary(Some("cannot build here:")),
        "Failed: cost: 0 cannot build here: error.insufficient_funds (ledger: 500 0)"
    );
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn registry_lookup_misses_on_unbound_opcodes() {
    let registry =
        ActionRegistry::from_specs(vec![noop_spec(2, ActionCategory::OtherManagement)]).unwrap();
    assert!(registry.lookup(Opcode(2)).is_some());
    assert!(registry.lookup(Opcode(0)).is_none());
    assert!(registry.lookup(Opcode(3)).is_none());
    assert_eq!(registry.name(Opcode(2)), "noop");
}

#[test]
fn registry_rejects_duplicate_opcodes() {
    let err = ActionRegistry::from_specs(vec![
        noop_spec(1, ActionCategory::OtherManagement),
        noop_spec(1, ActionCategory::Cheat),
    ])
    .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateOpcode { opcode: Opcode(1) });
}

#[test]
#[should_panic(expected = "no handler bound for opcode")]
fn registry_descriptor_on_unbound_opcode_is_a_bug() {
    let registry = ActionRegistry::<()>::from_specs(vec![]).unwrap();
    registry.descriptor(Opcode(9));
}

#[test]
fn pause_tiers_follow_category_sensitivity() {
    let registry = ActionRegistry::from_specs(vec![
        noop_spec(0, ActionCategory::LandscapeConstruction),
        noop_spec(1, ActionCategory::VehicleManagement),
        noop_spec(2, ActionCategory::ServerSetting),
    ])
    .unwrap();

    // Unpaused: everything runs.
    assert!(registry.allowed_while_paused(Opcode(0), PauseTier::AllActions, false));

    // Construction pause: landscaping blocked, management and server
    // actions still run.
    assert!(!registry.allowed_while_paused(Opcode(0), PauseTier::NoConstruction, false));
    assert!(registry.allowed_while_paused(Opcode(1), PauseTier::NoConstruction, false));
    assert!(registry.allowed_while_paused(Opcode(2), PauseTier::NoConstruction, false));

    // Full pause: only server actions run.
    assert!(!registry.allowed_while_paused(Opcode(1), PauseTier::NoActions, false));
    assert!(registry.allowed_while_paused(Opcode(2), PauseTier::NoActions, false));

    // The editor bypasses the gate entirely.
    assert!(registry.allowed_while_paused(Opcode(0), PauseTier::NoActions, true));
}

#[test]
fn pause_tier_index_roundtrip() {
    for index in 0..4 {
        let tier = PauseTier::from_index(index).unwrap();
        assert!(PauseTier::from_index(index + 1).map_or(true, |next| tier < next));
    }
    assert_eq!(PauseTier::from_index(4), None);
}

// ============================================================================
// Command Log
// ============================================================================

#[test]
fn log_ring_overwrites_oldest_and_keeps_total() {
    let mut log = CommandLog::with_capacity(4);
    for opcode in 0..9u16 {
        log.append(entry(opcode, LogFlags::NONE));
    }
    assert_eq!(log.len(), 4);
    assert_eq!(log.total(), 9);
    let opcodes: Vec<u16> = log.recent(16).map(|entry| entry.opcode.0).collect();
    assert_eq!(opcodes, vec![8, 7, 6, 5]);
}

#[test]
fn log_dump_renders_newest_first_with_flag_letters() {
    let mut log = CommandLog::with_capacity(8);
    log.append(entry(5, LogFlags::NONE));
    log.append(entry(6, LogFlags::FAILED.with(LogFlags::LOCAL)));
    let dump = log.dump(16, 64, |opcode| {
        if opcode == Opcode(6) {
            Some("build_rail")
        } else {
            None
        }
    });
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines[0], "Command log: most recent 2 of 2 total");
    assert!(lines[1].contains("-l----f"));
    assert!(lines[1].contains("build_rail"));
    assert!(lines[1].contains("op:0006"));
    assert!(lines[2].contains("-------"));
    assert!(lines[2].contains("<unbound>"));
    // Tile 66 on a 64-wide map.
    assert!(lines[1].contains("x:   2 y:   1"));
}

#[test]
fn log_dump_limit_caps_rendered_entries() {
    let mut log = CommandLog::with_capacity(8);
    for opcode in 0..5u16 {
        log.append(entry(opcode, LogFlags::NONE));
    }
    let dump = log.dump(2, 64, |_| None);
    assert!(dump.starts_with("Command log: most recent 2 of 5 total"));
    assert_eq!(dump.lines().count(), 3);
}

#[test]
fn log_reset_clears_entries_and_total_together() {
    let mut log = CommandLog::with_capacity(4);
    log.append(entry(1, LogFlags::NONE));
    log.append(entry(2, LogFlags::NONE));
    log.reset();
    assert!(log.is_empty());
    assert_eq!(log.total(), 0);
}

#[test]
fn log_snapshot_roundtrips_through_json() {
    let mut log = CommandLog::with_capacity(4);
    for opcode in 0..6u16 {
        log.append(entry(opcode, LogFlags::ESTIMATE));
    }
    let json = log.snapshot().to_json().unwrap();
    let restored = CommandLog::from_snapshot(CommandLogSnapshot::from_json(&json).unwrap()).unwrap();
    assert_eq!(restored, log);
    assert_eq!(restored.total(), 6);
    assert_eq!(restored.len(), 4);
}

#[test]
fn log_snapshot_rejects_unknown_versions() {
    let mut snapshot = CommandLog::with_capacity(2).snapshot();
    snapshot.version = COMMAND_LOG_VERSION + 1;
    let err = CommandLog::from_snapshot(snapshot).unwrap_err();
    assert!(matches!(err, LogPersistError::UnsupportedVersion { .. }));
}

#[test]
fn log_snapshot_rejects_overflowing_entry_lists() {
    let snapshot = CommandLogSnapshot {
        version: COMMAND_LOG_VERSION,
        capacity: 1,
        total: 2,
        entries: vec![entry(1, LogFlags::NONE), entry(2, LogFlags::NONE)],
    };
    let err = CommandLog::from_snapshot(snapshot).unwrap_err();
    assert!(matches!(
        err,
        LogPersistError::CapacityOverflow {
            entries: 2,
            capacity: 1
        }
    ));
}

#[test]
fn log_flag_letters_cover_every_position() {
    let all = LogFlags::FAILED
        .with(LogFlags::WORLD_GEN)
        .with(LogFlags::TEXT)
        .with(LogFlags::ESTIMATE)
        .with(LogFlags::SEND_ONLY)
        .with(LogFlags::LOCAL)
        .with(LogFlags::BINARY);
    assert_eq!(all.letters(), "blsetgf");
    assert_eq!(LogFlags::NONE.letters(), "-------");
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn dispatcher_config_sanitizes_zero_capacity() {
    let config = DispatcherConfig { log_capacity: 0 }.sanitized();
    assert_eq!(config.log_capacity, DEFAULT_LOG_CAPACITY);
    let config = DispatcherConfig { log_capacity: 16 }.sanitized();
    assert_eq!(config.log_capacity, 16);
}
