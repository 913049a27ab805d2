//! Top-level command pipeline: the externally facing entry point used by
//! the GUI, AI players, and the network receive path.
//!
//! The pipeline runs every command through the mandatory test-then-commit
//! sequence, hands locally issued commands to the replication layer in
//! multiplayer sessions, settles money exactly once per invocation, and
//! records a forensic log entry for every submission.

use command_world_proto::envelope::{CommandEnvelope, Opcode, NO_TILE};
use serde::{Deserialize, Serialize};

use crate::exec::{money_registers, CommandRequest, Exec, ExecFlags, ExecutionContext};
use crate::journal::{CommandLog, CommandLogEntry, LogFlags, DEFAULT_LOG_CAPACITY};
use crate::outcome::{codes, Outcome};
use crate::registry::{ActionFlags, ActionRegistry, ActionRole};
use crate::types::Party;
use crate::world::{CommandTrace, TracePhase, WorldCaps};

// ============================================================================
// Configuration
// ============================================================================

/// Dispatcher construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub log_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl DispatcherConfig {
    /// Clamp out-of-range values to usable defaults.
    pub fn sanitized(self) -> Self {
        Self {
            log_capacity: if self.log_capacity == 0 {
                DEFAULT_LOG_CAPACITY
            } else {
                self.log_capacity
            },
        }
    }
}

// ============================================================================
// Submission Source
// ============================================================================

/// Where an invocation entered the pipeline from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    /// Issued by this process (GUI or AI). `estimate` requests a cost
    /// preview instead of a commit.
    Local { estimate: bool },
    /// Re-delivered by the replication layer. `mine` marks envelopes this
    /// client originally issued.
    Network { mine: bool },
}

impl CommandSource {
    pub fn from_network(self) -> bool {
        matches!(self, CommandSource::Network { .. })
    }

    /// Locally issued, counting own commands echoed back by the server.
    pub fn locally_issued(self) -> bool {
        match self {
            CommandSource::Local { .. } => true,
            CommandSource::Network { mine } => mine,
        }
    }

    pub fn estimate_requested(self) -> bool {
        matches!(self, CommandSource::Local { estimate: true })
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// How the pipeline leaves the acting-party identity once a body run ends.
enum RestorePolicy {
    Restore,
    /// A party-control commit legitimately changed the active party set;
    /// re-seat the local interactive party instead of restoring.
    SeatLocal,
}

/// Where the pipeline body stopped.
enum Staged {
    /// Bailed out before the commit phase, or handed off to replication.
    Done(Outcome),
    /// Both phases ran; post-commit bookkeeping is still pending.
    Committed { test: Outcome, commit: Outcome },
}

/// The command kernel entry point. Owns the action table, the forensic log,
/// and the per-pipeline execution context; all game state stays behind the
/// world type `W`.
pub struct CommandDispatcher<W> {
    registry: ActionRegistry<W>,
    log: CommandLog,
    ctx: ExecutionContext,
    pipeline_active: bool,
}

impl<W> std::fmt::Debug for CommandDispatcher<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("registry", &self.registry)
            .field("log_total", &self.log.total())
            .field("ctx", &self.ctx)
            .finish()
    }
}

impl<W: WorldCaps> CommandDispatcher<W> {
    pub fn new(registry: ActionRegistry<W>) -> Self {
        Self::with_config(registry, DispatcherConfig::default())
    }

    pub fn with_config(registry: ActionRegistry<W>, config: DispatcherConfig) -> Self {
        let config = config.sanitized();
        Self {
            registry,
            log: CommandLog::with_capacity(config.log_capacity),
            ctx: ExecutionContext::new(Party::Spectator),
            pipeline_active: false,
        }
    }

    pub fn registry(&self) -> &ActionRegistry<W> {
        &self.registry
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn acting_party(&self) -> Party {
        self.ctx.acting_party()
    }

    /// Seat the party subsequent commands act on behalf of. The GUI seats
    /// the local company; the network receive path seats the sender.
    pub fn set_acting_party(&mut self, party: Party) {
        self.ctx.set_acting_party(party);
    }

    /// Clears the forensic log and per-pipeline state together. Used at
    /// new-game and world-reset boundaries.
    pub fn reset(&mut self) {
        self.log.reset();
        self.ctx = ExecutionContext::new(Party::Spectator);
    }

    /// Render the most recent log entries with display names resolved
    /// against the action table.
    pub fn dump_log(&self, limit: usize, map_size_x: u32) -> String {
        self.log.dump(limit, map_size_x, |opcode| {
            self.registry.lookup(opcode).map(|descriptor| descriptor.name)
        })
    }

    /// Submit one command. Returns whether the outcome succeeded; a log
    /// entry is appended regardless.
    ///
    /// The callback fires with the outcome and the original parameters once
    /// the invocation actually ran here, so neither estimates nor send-only
    /// submissions reach it; a relayed command triggers it when the envelope
    /// re-enters from the receive path.
    pub fn submit(
        &mut self,
        world: &mut W,
        envelope: &CommandEnvelope,
        source: CommandSource,
        mut callback: Option<&mut dyn FnMut(&Outcome, &CommandRequest)>,
    ) -> bool {
        let opcode = envelope.opcode();
        let send_only = world.is_networked() && !source.from_network();

        // The pause gate consults only the action's category; a rejected
        // command never reaches its descriptor flags or handler.
        let pause_rejected = !self.registry.allowed_while_paused(
            opcode,
            world.pause_allowance(),
            world.editor_active(),
        );
        let estimate_only = !pause_rejected && self.is_estimate_only(world, source, opcode);

        let outcome = if pause_rejected {
            Outcome::failed(codes::PAUSED)
        } else {
            self.submit_internal(world, envelope, source)
        };

        let acting = self.ctx.acting_party();
        let local_interactive = world.local_party().is_company() && acting == world.local_party();
        if outcome.is_failure() {
            // Failures surface only for the user's own local submissions;
            // network-originated and send-only failures stay in the log.
            let mine = source.locally_issued() && local_interactive;
            if estimate_only || (envelope.message().is_some() && mine) {
                world.show_error(envelope.tile, envelope.message(), &outcome);
            }
        } else if estimate_only {
            world.show_estimate(&outcome);
        } else if !send_only
            && outcome.cost() != 0
            && envelope.tile != NO_TILE
            && local_interactive
            && !world.editor_active()
        {
            world.show_cost_effect(envelope.tile, outcome.cost());
        }

        if !pause_rejected && !estimate_only && !send_only {
            if let Some(callback) = callback.as_mut() {
                callback(&outcome, &CommandRequest::from_envelope(envelope));
            }
        }

        let mut flags = LogFlags::NONE;
        if outcome.is_failure() {
            flags = flags.with(LogFlags::FAILED);
        }
        if world.world_gen_active() {
            flags = flags.with(LogFlags::WORLD_GEN);
        }
        if envelope.payload.has_text() {
            flags = flags.with(LogFlags::TEXT);
        }
        if estimate_only {
            flags = flags.with(LogFlags::ESTIMATE);
        }
        if send_only {
            flags = flags.with(LogFlags::SEND_ONLY);
        }
        if source.locally_issued() {
            flags = flags.with(LogFlags::LOCAL);
        }
        if envelope.payload.is_binary() {
            flags = flags.with(LogFlags::BINARY);
        }
        self.log.append(CommandLogEntry {
            tile: envelope.tile,
            p1: envelope.p1,
            p2: envelope.p2,
            opcode,
            stamp: world.clock(),
            acting_party: acting,
            local_party: world.local_party(),
            flags,
        });

        outcome.succeeded()
    }

    /// The test/commit/replicate sequence. Never re-enters itself: the GUI
    /// and the network receive path take turns, and a handler wanting a
    /// sub-command goes through [`Exec::run`] instead.
    pub fn submit_internal(
        &mut self,
        world: &mut W,
        envelope: &CommandEnvelope,
        source: CommandSource,
    ) -> Outcome {
        assert!(!self.pipeline_active, "command pipeline re-entered");
        self.pipeline_active = true;
        self.ctx.reset_additional_cash();

        let backup = self.ctx.acting_party();
        self.ctx.begin_pipeline();
        let (staged, policy) = self.pipeline_body(world, envelope, source);
        self.ctx.end_pipeline();

        // Single restore point; every early return in the body flows
        // through here.
        match policy {
            RestorePolicy::Restore => self.ctx.set_acting_party(backup),
            RestorePolicy::SeatLocal => self.ctx.set_acting_party(world.local_party()),
        }

        let outcome = match staged {
            Staged::Done(outcome) => outcome,
            Staged::Committed { test, commit } => self.finish_commit(world, envelope, test, commit),
        };
        self.pipeline_active = false;
        outcome
    }

    fn is_estimate_only(&self, world: &W, source: CommandSource, opcode: Opcode) -> bool {
        source.estimate_requested()
            && !world.world_gen_active()
            && self.registry.role(opcode) != ActionRole::PauseControl
            && !self.registry.flags(opcode).contains(ActionFlags::NO_EST)
    }

    /// Everything between the acting-party backup and its restoration: the
    /// standing checks, the test run, the replication hand-off, and the
    /// commit run.
    fn pipeline_body(
        &mut self,
        world: &mut W,
        envelope: &CommandEnvelope,
        source: CommandSource,
    ) -> (Staged, RestorePolicy) {
        let opcode = envelope.opcode();
        let estimate_only = self.is_estimate_only(world, source, opcode);
        let descriptor = self.registry.descriptor(opcode);

        // Out-of-bounds targets never reach the handler.
        if envelope.tile != NO_TILE
            && (!world.tile_in_bounds(envelope.tile)
                || (!world.tile_valid(envelope.tile)
                    && !descriptor.flags.contains(ActionFlags::ALL_TILES)))
        {
            return (
                Staged::Done(Outcome::failed(codes::REJECTED)),
                RestorePolicy::Restore,
            );
        }

        // Server-only and spectator-permitted actions run in the spectator
        // context regardless of who submitted them.
        let as_spectator = descriptor.flags.contains(ActionFlags::SERVER)
            || descriptor.flags.contains(ActionFlags::SPECTATOR);
        if as_spectator {
            self.ctx.set_acting_party(Party::Spectator);
        } else {
            let standing = match self.ctx.acting_party() {
                Party::Company(company) => world.company_exists(company),
                Party::Deity => descriptor.flags.contains(ActionFlags::DEITY),
                Party::Spectator => false,
            };
            if !standing {
                return (
                    Staged::Done(Outcome::failed(codes::NO_STANDING)),
                    RestorePolicy::Restore,
                );
            }
        }

        let mut exec_flags = ExecFlags::NONE;
        if descriptor.flags.contains(ActionFlags::NO_WATER) {
            exec_flags = exec_flags.with(ExecFlags::NO_WATER);
        }

        // Text payloads lose their control sequences unless the action is
        // registered as carrying formatting controls.
        let allow_control = descriptor.flags.contains(ActionFlags::STR_CTRL);
        let request = CommandRequest::new(envelope.tile, envelope.p1, envelope.p2)
            .with_payload(envelope.payload.clone().sanitized(allow_control));

        // Test run. Persistent storage and the local-authority evaluation
        // are told a dry run is in progress for its duration.
        world.clear_area_cache();
        world.set_storage_test_mode(true);
        world.set_authority_test_mode(true);
        let test = {
            let mut exec = Exec {
                registry: &self.registry,
                world: &mut *world,
                ctx: &mut self.ctx,
            };
            descriptor.handler.perform(&mut exec, &request, exec_flags)
        };
        world.set_authority_test_mode(false);
        world.set_storage_test_mode(false);

        let mut bailout = None;
        if test.is_failure() || estimate_only {
            bailout = Some(test.clone());
        } else if !descriptor.flags.contains(ActionFlags::NO_TEST)
            && !world.can_afford(self.ctx.acting_party(), test.cost())
        {
            let mut short = test.clone();
            short.make_error(codes::NO_FUNDS);
            short.attach_context("ledger", &money_registers(short.cost()));
            bailout = Some(short);
        }
        if let Some(outcome) = bailout {
            if world.is_networked() || world.world_gen_active() || source.from_network() {
                world.record_trace(CommandTrace::new(
                    TracePhase::TestFailed,
                    world.clock(),
                    self.ctx.acting_party(),
                    envelope,
                ));
            }
            return (Staged::Done(outcome), RestorePolicy::Restore);
        }

        // Locally issued multiplayer commands are queued to the peers
        // instead of executing now; the commit happens when the envelope
        // re-enters from the receive path in its replicated position.
        if world.is_networked() && !world.world_gen_active() && !source.from_network() {
            world.replicate(envelope, self.ctx.acting_party());
            return (Staged::Done(Outcome::empty()), RestorePolicy::Restore);
        }

        world.record_trace(CommandTrace::new(
            TracePhase::Commit,
            world.clock(),
            self.ctx.acting_party(),
            envelope,
        ));

        // Commit run.
        world.clear_area_cache();
        let commit = {
            let mut exec = Exec {
                registry: &self.registry,
                world: &mut *world,
                ctx: &mut self.ctx,
            };
            descriptor
                .handler
                .perform(&mut exec, &request, exec_flags.with(ExecFlags::COMMIT))
        };

        let policy = if descriptor.role == ActionRole::PartyControl {
            RestorePolicy::SeatLocal
        } else {
            RestorePolicy::Restore
        };
        (Staged::Committed { test, commit }, policy)
    }

    /// Post-commit bookkeeping: the consistency check, the commit-time
    /// funds re-check, build-location recording, and the single settlement.
    fn finish_commit(
        &mut self,
        world: &mut W,
        envelope: &CommandEnvelope,
        test: Outcome,
        commit: Outcome,
    ) -> Outcome {
        let opcode = envelope.opcode();
        let flags = self.registry.flags(opcode);

        if !flags.contains(ActionFlags::NO_TEST) {
            // A handler that behaves differently between dry run and commit
            // silently corrupts lockstep determinism; stop hard.
            if test.cost() != commit.cost() || test.succeeded() != commit.succeeded() {
                panic!(
                    "handler '{}' diverged between test and commit: {} vs {}",
                    self.registry.name(opcode),
                    test.summary(None),
                    commit.summary(None),
                );
            }
        } else if commit.is_failure() {
            return commit;
        }

        // The funds re-check fires only when the commit itself charged
        // nothing; actions with a baseline cost settle normally even when
        // more cash was flagged mid-commit.
        let additional = self.ctx.additional_cash_required();
        if additional != 0 && commit.cost() == 0 {
            world.flush_side_effects();
            let mut short = Outcome::failed(codes::NEEDS_CASH);
            short.attach_context("ledger", &money_registers(additional));
            return short;
        }

        if envelope.tile != NO_TILE {
            if let Party::Company(company) = self.ctx.acting_party() {
                if world.company_exists(company) {
                    world.record_build_location(company, envelope.tile);
                }
            }
        }

        world.charge(self.ctx.acting_party(), &commit);
        world.flush_side_effects();
        commit
    }
}
