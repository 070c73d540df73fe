//! Step-gated wizard navigation.
//!
//! Six fixed steps; the user can jump directly to any step they have already
//! reached. Once a result has been computed, the result steps stay reachable
//! even after progress was reset by a configuration change.

use serde::{Deserialize, Serialize};

/// Ordinal of the validation step, where `next()` runs the analysis instead
/// of a plain transition.
pub const VALIDATION_STEP: StepId = StepId::Validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StepId {
    Variables = 1,
    Settings = 2,
    Validation = 3,
    Summary = 4,
    Reasoning = 5,
    FullStatistics = 6,
}

impl StepId {
    pub const ALL: [StepId; 6] = [
        StepId::Variables,
        StepId::Settings,
        StepId::Validation,
        StepId::Summary,
        StepId::Reasoning,
        StepId::FullStatistics,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(n: u8) -> Option<StepId> {
        StepId::ALL.get(n.checked_sub(1)? as usize).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            StepId::Variables => "Variable Selection",
            StepId::Settings => "Settings",
            StepId::Validation => "Validation",
            StepId::Summary => "Summary",
            StepId::Reasoning => "Reasoning",
            StepId::FullStatistics => "Full Statistics",
        }
    }

    /// Step after this one, clamped at the last step.
    pub fn succ(self) -> StepId {
        StepId::from_ordinal(self.ordinal() + 1).unwrap_or(StepId::FullStatistics)
    }

    /// Step before this one, clamped at the first step.
    pub fn pred(self) -> StepId {
        StepId::from_ordinal(self.ordinal().saturating_sub(1)).unwrap_or(StepId::Variables)
    }

    /// Result steps stay reachable once a result exists, even after a reset.
    pub fn is_result_step(self) -> bool {
        self >= StepId::Summary
    }
}

/// Navigation state for one wizard session.
///
/// Invariant: `max_reached >= current`, and `max_reached` only ever moves
/// forward except through `reset()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardStateMachine {
    current: StepId,
    max_reached: StepId,
}

impl Default for WizardStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardStateMachine {
    pub fn new() -> Self {
        Self {
            current: StepId::Variables,
            max_reached: StepId::Variables,
        }
    }

    pub fn current(&self) -> StepId {
        self.current
    }

    pub fn max_reached(&self) -> StepId {
        self.max_reached
    }

    /// Jump directly to `step`. Forbidden jumps are a silent no-op, not an
    /// error: the step header is always clickable in the UI and unreachable
    /// steps simply do nothing. Returns whether the jump happened.
    ///
    /// `has_cached_result` opens the escape hatch to the result steps after
    /// a reset has pulled `max_reached` back below them.
    pub fn go_to(&mut self, step: StepId, has_cached_result: bool) -> bool {
        let reachable = step <= self.max_reached || (has_cached_result && step.is_result_step());
        if !reachable {
            return false;
        }
        self.current = step;
        if step > self.max_reached {
            self.max_reached = step;
        }
        true
    }

    /// Plain forward transition, clamped at the last step. The session layer
    /// intercepts `next()` on the validation step and runs the analysis
    /// instead; this method never does.
    pub fn advance(&mut self) -> bool {
        let next = self.current.succ();
        if next == self.current {
            return false;
        }
        self.current = next;
        if next > self.max_reached {
            self.max_reached = next;
        }
        true
    }

    /// Backward transition, clamped at the first step. Never lowers
    /// `max_reached`.
    pub fn back(&mut self) -> bool {
        let prev = self.current.pred();
        if prev == self.current {
            return false;
        }
        self.current = prev;
        true
    }

    /// Invoked whenever the active dataset or variable selection changes.
    pub fn reset(&mut self) {
        self.current = StepId::Variables;
        self.max_reached = StepId::Variables;
    }
}
