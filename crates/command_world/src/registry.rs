//! Action registry: the startup-time table mapping opcodes to handlers,
//! behavior flags, and categories.

use std::ops::BitOr;

use command_world_proto::envelope::Opcode;
use serde::{Deserialize, Serialize};

use crate::exec::{CommandRequest, Exec, ExecFlags};
use crate::outcome::Outcome;
use crate::types::{ActionCategory, PauseTier};

// ============================================================================
// Behavior Flags
// ============================================================================

/// Per-action behavior flags. Each is independent and combinable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionFlags(u16);

impl ActionFlags {
    pub const NONE: ActionFlags = ActionFlags(0);
    /// Executable by the non-player deity actor.
    pub const DEITY: ActionFlags = ActionFlags(1 << 0);
    /// Only the server may initiate this action.
    pub const SERVER: ActionFlags = ActionFlags(1 << 1);
    /// Spectators may initiate this action.
    pub const SPECTATOR: ActionFlags = ActionFlags(1 << 2);
    /// Not executable in a fully offline session.
    pub const OFFLINE_FORBIDDEN: ActionFlags = ActionFlags(1 << 3);
    /// Test and commit phases may legitimately diverge in outcome.
    pub const NO_TEST: ActionFlags = ActionFlags(1 << 4);
    /// May target tiles outside the normal playable bounds.
    pub const ALL_TILES: ActionFlags = ActionFlags(1 << 5);
    /// Not gated by water-tile restrictions.
    pub const NO_WATER: ActionFlags = ActionFlags(1 << 6);
    /// Text payload may carry formatting control sequences.
    pub const STR_CTRL: ActionFlags = ActionFlags(1 << 7);
    /// Second parameter carries a network client identifier.
    pub const CLIENT_ID: ActionFlags = ActionFlags(1 << 8);
    /// Exempt from the cost-estimation test run entirely.
    pub const NO_EST: ActionFlags = ActionFlags(1 << 9);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: ActionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: ActionFlags) -> ActionFlags {
        ActionFlags(self.0 | other.0)
    }
}

impl BitOr for ActionFlags {
    type Output = ActionFlags;

    fn bitor(self, other: ActionFlags) -> ActionFlags {
        self.union(other)
    }
}

/// Marks the two actions the pipeline itself is sensitive to, so the kernel
/// never embeds a magic opcode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionRole {
    #[default]
    Standard,
    /// The administrative pause toggle; never demoted to a cost estimate.
    PauseControl,
    /// Changes the active party set; the acting-party backup is discarded
    /// after a committed run instead of restored.
    PartyControl,
}

// ============================================================================
// Handlers
// ============================================================================

/// One action's domain logic. Called twice per commit attempt, test then
/// commit, with [`ExecFlags::COMMIT`] as the only input difference; unless
/// the action carries [`ActionFlags::NO_TEST`] both calls must report the
/// same cost and verdict. The handler must not mutate durable state when
/// the commit bit is clear.
pub trait ActionHandler<W> {
    fn perform(&self, exec: &mut Exec<'_, W>, req: &CommandRequest, flags: ExecFlags) -> Outcome;
}

/// Adapter turning a plain function or closure into an [`ActionHandler`].
pub struct FnHandler<F>(pub F);

impl<W, F> ActionHandler<W> for FnHandler<F>
where
    F: Fn(&mut Exec<'_, W>, &CommandRequest, ExecFlags) -> Outcome,
{
    fn perform(&self, exec: &mut Exec<'_, W>, req: &CommandRequest, flags: ExecFlags) -> Outcome {
        (self.0)(exec, req, flags)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Declarative registration record, one per action.
pub struct ActionSpec<W> {
    pub opcode: Opcode,
    pub name: &'static str,
    pub flags: ActionFlags,
    pub category: ActionCategory,
    pub role: ActionRole,
    pub handler: Box<dyn ActionHandler<W>>,
}

pub struct ActionDescriptor<W> {
    pub name: &'static str,
    pub flags: ActionFlags,
    pub category: ActionCategory,
    pub role: ActionRole,
    pub handler: Box<dyn ActionHandler<W>>,
}

impl<W> std::fmt::Debug for ActionDescriptor<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("category", &self.category)
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateOpcode { opcode: Opcode },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateOpcode { opcode } => {
                write!(f, "duplicate opcode registration: {:#06x}", opcode.0)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Ordered opcode table, built once at startup. Pure lookup; no mutable
/// state after construction.
pub struct ActionRegistry<W> {
    slots: Vec<Option<ActionDescriptor<W>>>,
}

impl<W> std::fmt::Debug for ActionRegistry<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("bound", &self.slots.iter().filter(|slot| slot.is_some()).count())
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl<W> ActionRegistry<W> {
    pub fn from_specs(specs: Vec<ActionSpec<W>>) -> Result<Self, RegistryError> {
        let slot_count = specs
            .iter()
            .map(|spec| usize::from(spec.opcode.0) + 1)
            .max()
            .unwrap_or(0);
        let mut slots = Vec::with_capacity(slot_count);
        slots.resize_with(slot_count, || None);
        for spec in specs {
            let index = usize::from(spec.opcode.0);
            if slots[index].is_some() {
                return Err(RegistryError::DuplicateOpcode {
                    opcode: spec.opcode,
                });
            }
            slots[index] = Some(ActionDescriptor {
                name: spec.name,
                flags: spec.flags,
                category: spec.category,
                role: spec.role,
                handler: spec.handler,
            });
        }
        Ok(Self { slots })
    }

    pub fn lookup(&self, opcode: Opcode) -> Option<&ActionDescriptor<W>> {
        self.slots.get(usize::from(opcode.0))?.as_ref()
    }

    /// Descriptor access for a validated opcode. Calling this with an
    /// unbound opcode is a programming error, not a runtime failure.
    pub fn descriptor(&self, opcode: Opcode) -> &ActionDescriptor<W> {
        match self.lookup(opcode) {
            Some(descriptor) => descriptor,
            None => panic!("no handler bound for opcode {:#06x}", opcode.0),
        }
    }

    pub fn flags(&self, opcode: Opcode) -> ActionFlags {
        self.descriptor(opcode).flags
    }

    pub fn name(&self, opcode: Opcode) -> &'static str {
        self.descriptor(opcode).name
    }

    pub fn category(&self, opcode: Opcode) -> ActionCategory {
        self.descriptor(opcode).category
    }

    pub fn role(&self, opcode: Opcode) -> ActionRole {
        self.descriptor(opcode).role
    }

    /// Pause-eligibility gate. Always permissive in the world editor; an
    /// unpaused session passes [`PauseTier::AllActions`] as the allowance.
    pub fn allowed_while_paused(
        &self,
        opcode: Opcode,
        allowance: PauseTier,
        editor_active: bool,
    ) -> bool {
        if editor_active {
            return true;
        }
        category_pause_tier(self.category(opcode)) <= allowance
    }
}

/// Fixed category → pause-sensitivity lookup.
pub const fn category_pause_tier(category: ActionCategory) -> PauseTier {
    match category {
        ActionCategory::LandscapeConstruction => PauseTier::AllActions,
        ActionCategory::VehicleConstruction | ActionCategory::MoneyManagement => {
            PauseTier::NoLandscaping
        }
        ActionCategory::VehicleManagement
        | ActionCategory::RouteManagement
        | ActionCategory::OtherManagement
        | ActionCategory::CompanySetting => PauseTier::NoConstruction,
        ActionCategory::ServerSetting | ActionCategory::Cheat => PauseTier::NoActions,
    }
}
