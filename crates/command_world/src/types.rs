//! Core type definitions: parties, money, the simulation clock stamp, and
//! the category/pause taxonomy.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

pub type Money = i64;
pub type CompanyId = u8;

pub use command_world_proto::envelope::{TileIndex, NO_TILE};

// ============================================================================
// Parties
// ============================================================================

/// The identity on whose behalf a command executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Party {
    Company(CompanyId),
    /// No company context; observers and forced administrative execution.
    Spectator,
    /// Non-player actor (scripted scenario logic) with its own permissions.
    Deity,
}

impl Party {
    pub fn company(self) -> Option<CompanyId> {
        match self {
            Party::Company(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_company(self) -> bool {
        matches!(self, Party::Company(_))
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Party::Company(id) => write!(f, "{id}"),
            Party::Spectator => write!(f, "spec"),
            Party::Deity => write!(f, "deity"),
        }
    }
}

// ============================================================================
// Simulation Clock
// ============================================================================

/// Calendar position of one simulation tick, recorded per command for the
/// forensic log. Supplied by the world; the kernel never reads wall clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SimStamp {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    /// Sub-day tick fraction.
    pub date_fract: u16,
    /// Ticks skipped to catch up with real time.
    pub tick_skip: u8,
}

// ============================================================================
// Expense and Action Taxonomy
// ============================================================================

/// Ledger bucket a command's monetary delta is booked under. Must be set on
/// any outcome with a non-zero cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseKind {
    Construction,
    NewVehicles,
    VehicleRunning,
    Property,
    LoanInterest,
    #[default]
    Other,
}

/// Grouping used for the pause-eligibility policy and cost-accounting
/// display. Carries no behavior of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    LandscapeConstruction,
    VehicleConstruction,
    MoneyManagement,
    VehicleManagement,
    RouteManagement,
    OtherManagement,
    CompanySetting,
    ServerSetting,
    Cheat,
}

/// How much may happen while the simulation is paused. Doubles as the
/// active allowance (what the session currently permits) and as the
/// per-category requirement; a command is allowed when its category's tier
/// is at or below the active allowance. An unpaused session reports
/// [`PauseTier::AllActions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseTier {
    NoActions,
    NoConstruction,
    NoLandscaping,
    AllActions,
}

impl PauseTier {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(PauseTier::NoActions),
            1 => Some(PauseTier::NoConstruction),
            2 => Some(PauseTier::NoLandscaping),
            3 => Some(PauseTier::AllActions),
            _ => None,
        }
    }
}
