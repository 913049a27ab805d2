//! Deterministic lockstep command kernel: every state-mutating action in
//! the simulated world funnels through one test-then-commit pipeline that
//! produces the same outcome locally and when replayed from a peer, charges
//! the right party exactly once, and leaves a forensic trail for desync
//! diagnosis.

pub mod actions;
pub mod exec;
pub mod journal;
pub mod outcome;
pub mod pipeline;
pub mod registry;
pub mod types;
pub mod world;

pub use command_world_proto::envelope::{CommandEnvelope, CommandPayload, MessageId, Opcode};

pub use outcome::{codes, ErrorCode, ErrorContext, Outcome, MAX_ERROR_REGISTERS};
pub use types::{
    ActionCategory, CompanyId, ExpenseKind, Money, Party, PauseTier, SimStamp, TileIndex, NO_TILE,
};

pub use registry::{
    category_pause_tier, ActionDescriptor, ActionFlags, ActionHandler, ActionRegistry, ActionRole,
    ActionSpec, FnHandler, RegistryError,
};

pub use exec::{money_registers, CommandRequest, Exec, ExecFlags, ExecutionContext};

pub use pipeline::{CommandDispatcher, CommandSource, DispatcherConfig};

pub use journal::{
    CommandLog, CommandLogEntry, CommandLogSnapshot, LogFlags, LogPersistError,
    COMMAND_LOG_VERSION, DEFAULT_LOG_CAPACITY,
};

pub use world::{
    CommandTrace, DeferredEffects, DryRunGate, Frontend, Ledger, ReplayProbe, Replicator,
    TracePhase, WorldCaps, WorldView,
};

pub use actions::{
    default_actions, CompanyAdmin, CompanyCtrlAction, PauseAction, PauseSwitch,
    COMPANY_CTRL_OPCODE, COMPANY_OP_CREATE, COMPANY_OP_DELETE, PAUSE_OPCODE,
};

#[cfg(test)]
mod tests;
