//! Capability traits the kernel requires from the surrounding world.
//!
//! The kernel never owns game state. Everything it needs to observe or
//! poke (map bounds, the ledger, the replication layer, dry-run switches,
//! presentation) is expressed as a trait the world type implements.

use command_world_proto::envelope::{CommandEnvelope, MessageId, Opcode, TileIndex};
use serde::{Deserialize, Serialize};

use crate::outcome::Outcome;
use crate::types::{CompanyId, Money, Party, PauseTier, SimStamp};

// ============================================================================
// Observation
// ============================================================================

pub trait WorldView {
    /// Structurally inside the map (the linearized index is in range).
    fn tile_in_bounds(&self, tile: TileIndex) -> bool;
    /// A normal playable tile. Commands flagged for out-of-bounds targets
    /// may act on tiles that are in bounds but not playable.
    fn tile_valid(&self, tile: TileIndex) -> bool;
    /// Map row width, for rendering tile indices as x/y in diagnostics.
    fn map_size_x(&self) -> u32;

    fn is_networked(&self) -> bool;
    fn is_server(&self) -> bool;
    fn world_gen_active(&self) -> bool;
    fn editor_active(&self) -> bool;

    /// Current pause allowance; [`PauseTier::AllActions`] when unpaused.
    fn pause_allowance(&self) -> PauseTier;

    fn local_party(&self) -> Party;
    fn company_exists(&self, company: CompanyId) -> bool;

    /// Simulation clock position, recorded per command log entry.
    fn clock(&self) -> SimStamp;
}

// ============================================================================
// Economy
// ============================================================================

pub trait Ledger {
    fn can_afford(&self, party: Party, cost: Money) -> bool;
    /// Settle a committed outcome's delta against the party's account.
    /// Called at most once per top-level command.
    fn charge(&mut self, party: Party, outcome: &Outcome);
    fn record_build_location(&mut self, company: CompanyId, tile: TileIndex);
}

// ============================================================================
// Replication
// ============================================================================

pub trait Replicator {
    /// Queue a locally issued envelope for the peers. Fire-and-forget; the
    /// envelope re-enters the pipeline from the receive path later.
    fn replicate(&mut self, envelope: &CommandEnvelope, acting_party: Party);
}

// ============================================================================
// Dry-Run Switches
// ============================================================================

pub trait DryRunGate {
    /// Local-authority (town rating) evaluation runs without side effects
    /// while enabled. Nested commands toggle this in matched pairs, so an
    /// implementation sitting under recursive handlers should count
    /// references rather than store the last value.
    fn set_authority_test_mode(&mut self, enabled: bool);
    /// Persistent per-entity storage distinguishes dry runs while enabled.
    fn set_storage_test_mode(&mut self, enabled: bool);
    /// Reset the transient construction-area cache before a handler run.
    fn clear_area_cache(&mut self);
}

pub trait DeferredEffects {
    /// Apply side effects buffered during a command (deferred recomputation
    /// triggered by many small mutations), once per invocation.
    fn flush_side_effects(&mut self);
}

// ============================================================================
// Presentation
// ============================================================================

pub trait Frontend {
    fn show_error(&mut self, tile: TileIndex, message: Option<MessageId>, outcome: &Outcome);
    fn show_estimate(&mut self, outcome: &Outcome);
    /// Floating cost/income animation over the target tile.
    fn show_cost_effect(&mut self, tile: TileIndex, cost: Money);
}

// ============================================================================
// Replay Diagnostics
// ============================================================================

/// Why a trace record was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracePhase {
    /// The command bailed out before commit: test failure, funds short, or
    /// an estimate that goes no further.
    TestFailed,
    /// The command is about to commit.
    Commit,
}

/// Structured desync-diagnostics record. Peers compare these streams to
/// locate the first diverging command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandTrace {
    pub phase: TracePhase,
    pub stamp: SimStamp,
    pub acting_party: Party,
    pub opcode: Opcode,
    pub tile: TileIndex,
    pub p1: u32,
    pub p2: u32,
}

impl CommandTrace {
    pub fn new(
        phase: TracePhase,
        stamp: SimStamp,
        acting_party: Party,
        envelope: &CommandEnvelope,
    ) -> Self {
        Self {
            phase,
            stamp,
            acting_party,
            opcode: envelope.opcode(),
            tile: envelope.tile,
            p1: envelope.p1,
            p2: envelope.p2,
        }
    }
}

pub trait ReplayProbe {
    fn record_trace(&mut self, trace: CommandTrace);
}

// ============================================================================
// Capability Bundle
// ============================================================================

/// Everything the pipeline requires of a world type.
pub trait WorldCaps:
    WorldView + Ledger + Replicator + DryRunGate + DeferredEffects + Frontend + ReplayProbe
{
}

impl<T> WorldCaps for T where
    T: WorldView + Ledger + Replicator + DryRunGate + DeferredEffects + Frontend + ReplayProbe
{
}
