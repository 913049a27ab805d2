//! Built-in administrative actions: the pause toggle and company control,
//! the two commands the pipeline itself is sensitive to. They double as the
//! reference pattern for registering domain handlers.

use command_world_proto::envelope::Opcode;

use crate::exec::{CommandRequest, Exec, ExecFlags};
use crate::outcome::{codes, Outcome};
use crate::registry::{ActionFlags, ActionHandler, ActionRole, ActionSpec};
use crate::types::{ActionCategory, CompanyId, PauseTier};
use crate::world::WorldCaps;

pub const PAUSE_OPCODE: Opcode = Opcode(0x0000);
pub const COMPANY_CTRL_OPCODE: Opcode = Opcode(0x0001);

/// Company-control sub-operations, carried in `p1`.
pub const COMPANY_OP_CREATE: u32 = 0;
pub const COMPANY_OP_DELETE: u32 = 1;

// ============================================================================
// Capabilities
// ============================================================================

pub trait PauseSwitch {
    fn set_pause_allowance(&mut self, allowance: PauseTier);
}

pub trait CompanyAdmin {
    fn company_count(&self) -> usize;
    /// Returns the new company's id, or `None` when the roster is full.
    fn create_company(&mut self) -> Option<CompanyId>;
    fn delete_company(&mut self, company: CompanyId) -> bool;
}

// ============================================================================
// Handlers
// ============================================================================

/// Sets the session's pause allowance. `p1` carries the requested tier.
pub struct PauseAction;

impl<W: WorldCaps + PauseSwitch> ActionHandler<W> for PauseAction {
    fn perform(&self, exec: &mut Exec<'_, W>, req: &CommandRequest, flags: ExecFlags) -> Outcome {
        let Some(allowance) = PauseTier::from_index(req.p1) else {
            return Outcome::failed(codes::REJECTED);
        };
        if flags.contains(ExecFlags::COMMIT) {
            exec.world.set_pause_allowance(allowance);
        }
        Outcome::empty()
    }
}

/// Creates or deletes companies. `p1` selects the operation, `p2` names the
/// target company for deletion.
pub struct CompanyCtrlAction;

impl<W: WorldCaps + CompanyAdmin> ActionHandler<W> for CompanyCtrlAction {
    fn perform(&self, exec: &mut Exec<'_, W>, req: &CommandRequest, flags: ExecFlags) -> Outcome {
        match req.p1 {
            COMPANY_OP_CREATE => {
                // Roster exhaustion only shows up at commit time; this
                // action is registered as divergence-permitted.
                if flags.contains(ExecFlags::COMMIT) && exec.world.create_company().is_none() {
                    return Outcome::failed(codes::REJECTED);
                }
                Outcome::empty()
            }
            COMPANY_OP_DELETE => {
                let Ok(company) = CompanyId::try_from(req.p2) else {
                    return Outcome::failed(codes::REJECTED);
                };
                if !exec.world.company_exists(company) {
                    return Outcome::failed(codes::REJECTED);
                }
                // The last company of an offline session stays; deleting it
                // would leave the session with nobody to play.
                if !exec.world.is_networked() && exec.world.company_count() <= 1 {
                    return Outcome::failed(codes::REJECTED);
                }
                if flags.contains(ExecFlags::COMMIT) && !exec.world.delete_company(company) {
                    return Outcome::failed(codes::REJECTED);
                }
                Outcome::empty()
            }
            _ => Outcome::failed(codes::REJECTED),
        }
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Declarative list of the built-in actions, consumed by
/// [`crate::registry::ActionRegistry::from_specs`] at startup.
pub fn default_actions<W>() -> Vec<ActionSpec<W>>
where
    W: WorldCaps + PauseSwitch + CompanyAdmin,
{
    vec![
        ActionSpec {
            opcode: PAUSE_OPCODE,
            name: "pause",
            flags: ActionFlags::SERVER | ActionFlags::NO_EST,
            category: ActionCategory::ServerSetting,
            role: ActionRole::PauseControl,
            handler: Box::new(PauseAction),
        },
        ActionSpec {
            opcode: COMPANY_CTRL_OPCODE,
            name: "company_ctrl",
            flags: ActionFlags::SPECTATOR
                | ActionFlags::CLIENT_ID
                | ActionFlags::NO_TEST
                | ActionFlags::NO_EST,
            category: ActionCategory::ServerSetting,
            role: ActionRole::PartyControl,
            handler: Box::new(CompanyCtrlAction),
        },
    ]
}
