//! Per-call execution state machine
//!
//! ```text
//! Idle → Connecting → InTransaction → Committing → Done
//!                          │              │
//!                          └──→ Failed ←──┘
//!                                 │
//!                            RollingBack → Done
//! ```
//!
//! - `Idle` is the only initial state, `Done` the only terminal state
//! - `Connecting → Done` covers acquire and begin failures, where no
//!   transaction exists to roll back
//! - No retries: no edge leads back to `Connecting`

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    /// Acquiring a connection and opening the read-only transaction
    Connecting,
    /// Transaction open: timeout set, query running
    InTransaction,
    Committing,
    /// A step after begin failed; rollback is owed
    Failed,
    RollingBack,
    /// Connection released (or release attempted)
    Done,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Idle => "IDLE",
            ExecutionState::Connecting => "CONNECTING",
            ExecutionState::InTransaction => "IN_TRANSACTION",
            ExecutionState::Committing => "COMMITTING",
            ExecutionState::Failed => "FAILED",
            ExecutionState::RollingBack => "ROLLING_BACK",
            ExecutionState::Done => "DONE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionState::Done)
    }

    /// Whether `self → next` is a legal edge
    pub fn can_transition_to(&self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, InTransaction)
                | (Connecting, Done)
                | (InTransaction, Committing)
                | (InTransaction, Failed)
                | (Committing, Done)
                | (Committing, Failed)
                | (Failed, RollingBack)
                | (RollingBack, Done)
        )
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// States visited by one execution, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTrace {
    states: Vec<ExecutionState>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self {
            states: vec![ExecutionState::Idle],
        }
    }

    /// Latest state, `Idle` before the first transition
    pub fn current(&self) -> ExecutionState {
        self.states
            .last()
            .copied()
            .unwrap_or(ExecutionState::Idle)
    }

    /// Record a transition. Illegal edges are a bug in the executor.
    pub(crate) fn advance(&mut self, next: ExecutionState) {
        debug_assert!(
            self.current().can_transition_to(next),
            "illegal execution transition {} -> {}",
            self.current(),
            next
        );
        self.states.push(next);
    }

    pub fn states(&self) -> &[ExecutionState] {
        &self.states
    }

    /// Whether the call went through rollback
    pub fn rolled_back(&self) -> bool {
        self.states.contains(&ExecutionState::RollingBack)
    }

    /// Whether the trace reached `Done`
    pub fn is_complete(&self) -> bool {
        self.current().is_terminal()
    }
}

impl Default for ExecutionTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.states.iter().map(|s| s.as_str()).collect();
        write!(f, "{}", names.join(" -> "))
    }
}
