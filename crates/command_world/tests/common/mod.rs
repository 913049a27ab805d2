//! Shared test doubles: a recording world implementing every kernel
//! capability, plus instrumented handlers.

#![allow(dead_code)]

use std::collections::BTreeMap;

use command_world::{
    codes, ActionCategory, ActionFlags, ActionHandler, ActionRole, ActionSpec, CommandEnvelope,
    CommandRequest, CommandTrace, CompanyAdmin, CompanyId, DeferredEffects, DryRunGate, ErrorCode,
    Exec, ExecFlags, ExpenseKind, Frontend, Ledger, MessageId, Money, Opcode, Outcome, Party,
    PauseSwitch, PauseTier, ReplayProbe, Replicator, SimStamp, TileIndex, WorldView,
};

pub const MAP_SIZE_X: u32 = 64;
pub const MAP_TILES: u32 = MAP_SIZE_X * MAP_SIZE_X;
pub const STARTING_BALANCE: Money = 1_000_000;

// ============================================================================
// Recording World
// ============================================================================

/// In-memory world recording every collaborator call the kernel makes.
pub struct TestWorld {
    pub networked: bool,
    pub server: bool,
    pub world_gen: bool,
    pub editor: bool,
    pub pause: PauseTier,
    pub local: Party,
    pub companies: BTreeMap<CompanyId, Money>,
    pub company_limit: usize,
    pub next_company: CompanyId,
    pub void_tiles: Vec<TileIndex>,
    pub clock: SimStamp,

    pub charges: Vec<(Party, Money)>,
    pub build_locations: Vec<(CompanyId, TileIndex)>,
    pub replications: Vec<(CommandEnvelope, Party)>,
    pub traces: Vec<CommandTrace>,
    pub deleted: Vec<CompanyId>,
    pub pause_sets: Vec<PauseTier>,
    pub authority_test_mode: bool,
    pub storage_test_mode: bool,
    pub area_cache_clears: u32,
    pub flushes: u32,
    pub errors_shown: Vec<(TileIndex, Option<MessageId>, Option<ErrorCode>)>,
    pub estimates_shown: Vec<Money>,
    pub cost_effects: Vec<(TileIndex, Money)>,

    pub test_calls: u32,
    pub commit_calls: u32,
    pub seen_acting: Vec<Party>,
    pub seen_text: Vec<String>,
}

impl TestWorld {
    pub fn offline() -> Self {
        let mut companies = BTreeMap::new();
        companies.insert(1, STARTING_BALANCE);
        Self {
            networked: false,
            server: false,
            world_gen: false,
            editor: false,
            pause: PauseTier::AllActions,
            local: Party::Company(1),
            companies,
            company_limit: 8,
            next_company: 2,
            void_tiles: Vec::new(),
            clock: SimStamp {
                year: 1950,
                month: 1,
                day: 1,
                date_fract: 0,
                tick_skip: 0,
            },
            charges: Vec::new(),
            build_locations: Vec::new(),
            replications: Vec::new(),
            traces: Vec::new(),
            deleted: Vec::new(),
            pause_sets: Vec::new(),
            authority_test_mode: false,
            storage_test_mode: false,
            area_cache_clears: 0,
            flushes: 0,
            errors_shown: Vec::new(),
            estimates_shown: Vec::new(),
            cost_effects: Vec::new(),
            test_calls: 0,
            commit_calls: 0,
            seen_acting: Vec::new(),
            seen_text: Vec::new(),
        }
    }

    pub fn multiplayer() -> Self {
        let mut world = Self::offline();
        world.networked = true;
        world
    }

    pub fn balance(&self, company: CompanyId) -> Money {
        self.companies.get(&company).copied().unwrap_or(0)
    }

    pub fn set_balance(&mut self, company: CompanyId, amount: Money) {
        self.companies.insert(company, amount);
    }
}

impl WorldView for TestWorld {
    fn tile_in_bounds(&self, tile: TileIndex) -> bool {
        tile < MAP_TILES
    }

    fn tile_valid(&self, tile: TileIndex) -> bool {
        self.tile_in_bounds(tile) && !self.void_tiles.contains(&tile)
    }

    fn map_size_x(&self) -> u32 {
        MAP_SIZE_X
    }

    fn is_networked(&self) -> bool {
        self.networked
    }

    fn is_server(&self) -> bool {
        self.server
    }

    fn world_gen_active(&self) -> bool {
        self.world_gen
    }

    fn editor_active(&self) -> bool {
        self.editor
    }

    fn pause_allowance(&self) -> PauseTier {
        self.pause
    }

    fn local_party(&self) -> Party {
        self.local
    }

    fn company_exists(&self, company: CompanyId) -> bool {
        self.companies.contains_key(&company)
    }

    fn clock(&self) -> SimStamp {
        self.clock
    }
}

impl Ledger for TestWorld {
    fn can_afford(&self, party: Party, cost: Money) -> bool {
        if cost <= 0 {
            return true;
        }
        match party {
            Party::Company(company) => self.balance(company) >= cost,
            _ => true,
        }
    }

    fn charge(&mut self, party: Party, outcome: &Outcome) {
        self.charges.push((party, outcome.cost()));
        if let Party::Company(company) = party {
            if let Some(balance) = self.companies.get_mut(&company) {
                *balance -= outcome.cost();
            }
        }
    }

    fn record_build_location(&mut self, company: CompanyId, tile: TileIndex) {
        self.build_locations.push((company, tile));
    }
}

impl Replicator for TestWorld {
    fn replicate(&mut self, envelope: &CommandEnvelope, acting_party: Party) {
        self.replications.push((envelope.clone(), acting_party));
    }
}

impl DryRunGate for TestWorld {
    fn set_authority_test_mode(&mut self, enabled: bool) {
        self.authority_test_mode = enabled;
    }

    fn set_storage_test_mode(&mut self, enabled: bool) {
        self.storage_test_mode = enabled;
    }

    fn clear_area_cache(&mut self) {
        self.area_cache_clears += 1;
    }
}

impl DeferredEffects for TestWorld {
    fn flush_side_effects(&mut self) {
        self.flushes += 1;
    }
}

impl Frontend for TestWorld {
    fn show_error(&mut self, tile: TileIndex, message: Option<MessageId>, outcome: &Outcome) {
        self.errors_shown.push((tile, message, outcome.failed_with()));
    }

    fn show_estimate(&mut self, outcome: &Outcome) {
        self.estimates_shown.push(outcome.cost());
    }

    fn show_cost_effect(&mut self, tile: TileIndex, cost: Money) {
        self.cost_effects.push((tile, cost));
    }
}

impl ReplayProbe for TestWorld {
    fn record_trace(&mut self, trace: CommandTrace) {
        self.traces.push(trace);
    }
}

impl PauseSwitch for TestWorld {
    fn set_pause_allowance(&mut self, allowance: PauseTier) {
        self.pause_sets.push(allowance);
        self.pause = allowance;
    }
}

impl CompanyAdmin for TestWorld {
    fn company_count(&self) -> usize {
        self.companies.len()
    }

    fn create_company(&mut self) -> Option<CompanyId> {
        if self.companies.len() >= self.company_limit {
            return None;
        }
        let company = self.next_company;
        self.next_company += 1;
        self.companies.insert(company, STARTING_BALANCE);
        Some(company)
    }

    fn delete_company(&mut self, company: CompanyId) -> bool {
        self.deleted.push(company);
        self.companies.remove(&company).is_some()
    }
}

// ============================================================================
// Instrumented Handlers
// ============================================================================

/// Reports a fixed cost and counts its test and commit invocations.
pub struct CountingAction {
    pub cost: Money,
}

impl ActionHandler<TestWorld> for CountingAction {
    fn perform(
        &self,
        exec: &mut Exec<'_, TestWorld>,
        req: &CommandRequest,
        flags: ExecFlags,
    ) -> Outcome {
        if flags.contains(ExecFlags::COMMIT) {
            exec.world.commit_calls += 1;
        } else {
            exec.world.test_calls += 1;
        }
        exec.world.seen_acting.push(exec.ctx.acting_party());
        if let Some(text) = req.text() {
            exec.world.seen_text.push(text.to_string());
        }
        Outcome::success(ExpenseKind::Construction, self.cost)
    }
}

/// Rejects in both phases, counting invocations.
pub struct RejectingAction;

impl ActionHandler<TestWorld> for RejectingAction {
    fn perform(
        &self,
        exec: &mut Exec<'_, TestWorld>,
        _req: &CommandRequest,
        flags: ExecFlags,
    ) -> Outcome {
        if flags.contains(ExecFlags::COMMIT) {
            exec.world.commit_calls += 1;
        } else {
            exec.world.test_calls += 1;
        }
        Outcome::failed(codes::REJECTED)
    }
}

/// Runs a sub-command through the executor and folds its outcome in.
pub struct NestingAction {
    pub own_cost: Money,
    pub child: Opcode,
}

impl ActionHandler<TestWorld> for NestingAction {
    fn perform(
        &self,
        exec: &mut Exec<'_, TestWorld>,
        req: &CommandRequest,
        flags: ExecFlags,
    ) -> Outcome {
        let mut outcome = Outcome::success(ExpenseKind::Construction, self.own_cost);
        let child_req = CommandRequest::new(req.tile, 0, 0);
        outcome.combine(&exec.run(self.child, &child_req, flags));
        outcome
    }
}

/// Deliberately reports a different cost at commit time.
pub struct DivergentAction;

impl ActionHandler<TestWorld> for DivergentAction {
    fn perform(
        &self,
        _exec: &mut Exec<'_, TestWorld>,
        _req: &CommandRequest,
        flags: ExecFlags,
    ) -> Outcome {
        let cost = if flags.contains(ExecFlags::COMMIT) { 200 } else { 100 };
        Outcome::success(ExpenseKind::Construction, cost)
    }
}

/// Flags a mid-commit cash requirement on top of its reported cost.
pub struct CashHungryAction {
    pub cost: Money,
    pub required: Money,
}

impl ActionHandler<TestWorld> for CashHungryAction {
    fn perform(
        &self,
        exec: &mut Exec<'_, TestWorld>,
        _req: &CommandRequest,
        flags: ExecFlags,
    ) -> Outcome {
        if flags.contains(ExecFlags::COMMIT) {
            exec.ctx.set_additional_cash_required(self.required);
        }
        Outcome::success(ExpenseKind::Construction, self.cost)
    }
}

// ============================================================================
// Action Builders
// ============================================================================

pub fn spec(
    opcode: Opcode,
    name: &'static str,
    category: ActionCategory,
    flags: ActionFlags,
    handler: Box<dyn ActionHandler<TestWorld>>,
) -> ActionSpec<TestWorld> {
    ActionSpec {
        opcode,
        name,
        flags,
        category,
        role: ActionRole::Standard,
        handler,
    }
}

pub fn build_spec(opcode: Opcode, cost: Money) -> ActionSpec<TestWorld> {
    spec(
        opcode,
        "build_thing",
        ActionCategory::LandscapeConstruction,
        ActionFlags::NONE,
        Box::new(CountingAction { cost }),
    )
}
