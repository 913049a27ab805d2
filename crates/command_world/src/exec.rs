//! Low-level executor: runs one handler through its test/commit phases and
//! tracks re-entrancy so money settles exactly once per top-level call.

use command_world_proto::envelope::{CommandEnvelope, CommandPayload, TileIndex, NO_TILE};

use crate::outcome::{codes, Outcome};
use crate::registry::{ActionFlags, ActionRegistry};
use crate::types::{Money, Party};
use crate::world::WorldCaps;
use command_world_proto::envelope::Opcode;

// ============================================================================
// Execution Flags
// ============================================================================

/// Per-invocation phase and bypass flags, as seen by handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecFlags(u8);

impl ExecFlags {
    pub const NONE: ExecFlags = ExecFlags(0);
    /// Commit phase; durable mutation is permitted.
    pub const COMMIT: ExecFlags = ExecFlags(1 << 0);
    /// Pure cost estimate; affordability is not enforced.
    pub const ESTIMATE: ExecFlags = ExecFlags(1 << 1);
    /// Bankruptcy proceedings: skip affordability and settlement.
    pub const BANKRUPT: ExecFlags = ExecFlags(1 << 2);
    /// Water-tile restrictions are waived for this invocation.
    pub const NO_WATER: ExecFlags = ExecFlags(1 << 3);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: ExecFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn with(self, other: ExecFlags) -> ExecFlags {
        ExecFlags(self.0 | other.0)
    }

    pub const fn without(self, other: ExecFlags) -> ExecFlags {
        ExecFlags(self.0 & !other.0)
    }
}

// ============================================================================
// Request
// ============================================================================

/// The handler-facing slice of an invocation envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub tile: TileIndex,
    pub p1: u32,
    pub p2: u32,
    pub payload: CommandPayload,
}

impl CommandRequest {
    pub fn new(tile: TileIndex, p1: u32, p2: u32) -> Self {
        Self {
            tile,
            p1,
            p2,
            payload: CommandPayload::None,
        }
    }

    pub fn with_payload(mut self, payload: CommandPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn from_envelope(envelope: &CommandEnvelope) -> Self {
        Self {
            tile: envelope.tile,
            p1: envelope.p1,
            p2: envelope.p2,
            payload: envelope.payload.clone(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.payload.text()
    }
}

// ============================================================================
// Execution Context
// ============================================================================

/// Mutable per-pipeline state threaded by reference: the re-entrancy depth,
/// the acting party, and the commit-phase additional-cash accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    depth: u32,
    acting_party: Party,
    additional_cash_required: Money,
}

impl ExecutionContext {
    pub fn new(acting_party: Party) -> Self {
        Self {
            depth: 0,
            acting_party,
            additional_cash_required: 0,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn acting_party(&self) -> Party {
        self.acting_party
    }

    pub fn set_acting_party(&mut self, party: Party) {
        self.acting_party = party;
    }

    pub fn additional_cash_required(&self) -> Money {
        self.additional_cash_required
    }

    /// Handlers report mid-commit that the action needs more cash than the
    /// outcome's cost conveys. The pipeline turns this into a dedicated
    /// failure when the commit cost itself is zero.
    pub fn set_additional_cash_required(&mut self, amount: Money) {
        self.additional_cash_required = amount;
    }

    pub(crate) fn reset_additional_cash(&mut self) {
        self.additional_cash_required = 0;
    }

    /// The pipeline holds the depth at 1 around its direct handler calls so
    /// nested sub-commands never settle money themselves.
    pub(crate) fn begin_pipeline(&mut self) {
        debug_assert_eq!(self.depth, 0, "command pipeline entered with live executor depth");
        self.depth = 1;
    }

    pub(crate) fn end_pipeline(&mut self) {
        debug_assert_eq!(self.depth, 1, "executor depth leaked inside the pipeline");
        self.depth = 0;
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Borrowed execution environment handed to handlers. Nested sub-commands
/// go through [`Exec::run`], which re-enters the executor one level deeper.
pub struct Exec<'a, W> {
    pub registry: &'a ActionRegistry<W>,
    pub world: &'a mut W,
    pub ctx: &'a mut ExecutionContext,
}

impl<'a, W: WorldCaps> Exec<'a, W> {
    /// Run one command through the executor. Without [`ExecFlags::COMMIT`]
    /// this is the estimate path and never mutates world state. The opcode
    /// must be bound; unbound opcodes are a programming error.
    pub fn run(&mut self, opcode: Opcode, req: &CommandRequest, flags: ExecFlags) -> Outcome {
        let registry = self.registry;
        let descriptor = registry.descriptor(opcode);

        let mut flags = flags;
        if descriptor.flags.contains(ActionFlags::NO_WATER) {
            flags = flags.with(ExecFlags::NO_WATER);
        }

        // Out-of-bounds targets are rejected before any mutable state is
        // touched, including the depth counter.
        if req.tile != NO_TILE
            && (!self.world.tile_in_bounds(req.tile)
                || (!self.world.tile_valid(req.tile)
                    && !descriptor.flags.contains(ActionFlags::ALL_TILES)))
        {
            return Outcome::failed(codes::REJECTED);
        }

        self.ctx.depth += 1;
        let outermost = self.ctx.depth == 1;

        if outermost || !flags.contains(ExecFlags::COMMIT) {
            if outermost {
                self.world.clear_area_cache();
            }
            self.world.set_authority_test_mode(true);
            let test = descriptor
                .handler
                .perform(self, req, flags.without(ExecFlags::COMMIT));
            self.world.set_authority_test_mode(false);

            if test.is_failure() {
                self.ctx.depth -= 1;
                return test;
            }
            if outermost
                && !flags.contains(ExecFlags::ESTIMATE)
                && !flags.contains(ExecFlags::BANKRUPT)
                && !self.world.can_afford(self.ctx.acting_party, test.cost())
            {
                let mut short = test;
                short.make_error(codes::NO_FUNDS);
                short.attach_context("ledger", &money_registers(short.cost()));
                self.ctx.depth -= 1;
                return short;
            }
            if !flags.contains(ExecFlags::COMMIT) {
                self.ctx.depth -= 1;
                return test;
            }
        }

        if outermost {
            self.world.clear_area_cache();
        }
        let committed = descriptor.handler.perform(self, req, flags);
        self.ctx.depth -= 1;
        if committed.is_failure() {
            return committed;
        }

        if self.ctx.depth == 0 && !flags.contains(ExecFlags::BANKRUPT) {
            self.world.charge(self.ctx.acting_party, &committed);
        }
        committed
    }
}

/// Split a monetary amount into message-formatting registers.
pub fn money_registers(amount: Money) -> [u32; 2] {
    let bits = amount as u64;
    [bits as u32, (bits >> 32) as u32]
}
