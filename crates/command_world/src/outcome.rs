//! Command outcome: success or failure, the monetary delta, and optional
//! error classification with formatting context.

use crate::types::{ExpenseKind, Money};

/// Upper bound on extended-error-context registers carried by one outcome.
pub const MAX_ERROR_REGISTERS: usize = 16;

// ============================================================================
// Error Classification
// ============================================================================

/// Opaque error classification identifier. Kernel-issued codes live in
/// [`codes`]; handlers declare their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub &'static str);

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Canonical kernel error classifications.
pub mod codes {
    use super::ErrorCode;

    /// Generic rejection: bad target, bad standing, handler said no without
    /// a richer classification.
    pub const REJECTED: ErrorCode = ErrorCode("error.rejected");
    /// The active pause allowance forbids this command's category.
    pub const PAUSED: ErrorCode = ErrorCode("error.forbidden_while_paused");
    /// The acting party lacks standing for this command.
    pub const NO_STANDING: ErrorCode = ErrorCode("error.no_standing");
    /// The acting party cannot afford the tested cost.
    pub const NO_FUNDS: ErrorCode = ErrorCode("error.insufficient_funds");
    /// The commit phase determined that additional funds are required.
    pub const NEEDS_CASH: ErrorCode = ErrorCode("error.additional_funds_required");
}

/// Owned copy of externally sourced message-formatting registers, taken at
/// attach time so the outcome never borrows a register file that is
/// repopulated on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorContext {
    source: &'static str,
    registers: [u32; MAX_ERROR_REGISTERS],
    len: u8,
}

impl ErrorContext {
    pub fn source(&self) -> &'static str {
        self.source
    }

    pub fn registers(&self) -> &[u32] {
        &self.registers[..usize::from(self.len)]
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of one command invocation. On failure the cost is ignored by all
/// downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    cost: Money,
    success: bool,
    error: Option<ErrorCode>,
    expense: ExpenseKind,
    context: Option<ErrorContext>,
}

impl Default for Outcome {
    fn default() -> Self {
        Self::empty()
    }
}

impl Outcome {
    /// Zero-cost success, the canonical "nothing happened" outcome.
    pub fn empty() -> Self {
        Self {
            cost: 0,
            success: true,
            error: None,
            expense: ExpenseKind::Other,
            context: None,
        }
    }

    pub fn success(expense: ExpenseKind, cost: Money) -> Self {
        Self {
            cost,
            success: true,
            error: None,
            expense,
            context: None,
        }
    }

    pub fn failed(error: ErrorCode) -> Self {
        Self {
            cost: 0,
            success: false,
            error: Some(error),
            expense: ExpenseKind::Other,
            context: None,
        }
    }

    pub fn cost(&self) -> Money {
        self.cost
    }

    pub fn succeeded(&self) -> bool {
        self.success
    }

    pub fn failed_with(&self) -> Option<ErrorCode> {
        if self.success {
            None
        } else {
            self.error
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }

    pub fn expense(&self) -> ExpenseKind {
        self.expense
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        self.context.as_ref()
    }

    pub fn add_cost(&mut self, delta: Money) {
        self.cost += delta;
    }

    /// Demote this outcome to the given failure, keeping the accumulated
    /// cost (which downstream consumers ignore on failure).
    pub fn make_error(&mut self, error: ErrorCode) {
        self.success = false;
        self.error = Some(error);
    }

    /// Fold `other` into this outcome: cost always accumulates, and the
    /// first failure encountered poisons an accumulating success.
    pub fn combine(&mut self, other: &Outcome) {
        self.cost += other.cost;
        if self.success && !other.success {
            self.success = false;
            self.error = other.error;
            self.context = other.context;
        }
    }

    /// Copy up to [`MAX_ERROR_REGISTERS`] message-formatting registers into
    /// the outcome. More than that is a caller bug, not a runtime failure.
    pub fn attach_context(&mut self, source: &'static str, registers: &[u32]) {
        assert!(
            registers.len() <= MAX_ERROR_REGISTERS,
            "error context register overflow: {} > {MAX_ERROR_REGISTERS}",
            registers.len()
        );
        let mut copied = [0u32; MAX_ERROR_REGISTERS];
        copied[..registers.len()].copy_from_slice(registers);
        self.context = Some(ErrorContext {
            source,
            registers: copied,
            len: registers.len() as u8,
        });
    }

    /// One-line diagnostic rendering. The extended context only feeds the
    /// formatting of this call; nothing about it escapes into shared state.
    pub fn summary(&self, prefix: Option<&str>) -> String {
        if self.success {
            return format!("Success: cost: {}", self.cost);
        }
        let mut line = format!("Failed: cost: {}", self.cost);
        if let Some(prefix) = prefix {
            line.push(' ');
            line.push_str(prefix);
        }
        if let Some(error) = self.error {
            line.push(' ');
            line.push_str(error.0);
        }
        if let Some(context) = &self.context {
            line.push_str(&format!(" ({}:", context.source()));
            for register in context.registers() {
                line.push_str(&format!(" {register}"));
            }
            line.push(')');
        }
        line
    }
}
