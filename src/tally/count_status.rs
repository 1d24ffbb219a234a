use super::{Result, TallyError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a count stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountState {
    NotStarted,
    Counting,
    CandidateElected,
    SurplusDistribution,
    CandidateExcluded,
    Recount,
    CountComplete,
    Stalemate,
}

impl CountState {
    pub const ALL: [CountState; 8] = [
        CountState::NotStarted,
        CountState::Counting,
        CountState::CandidateElected,
        CountState::SurplusDistribution,
        CountState::CandidateExcluded,
        CountState::Recount,
        CountState::CountComplete,
        CountState::Stalemate,
    ];

    pub fn code(self) -> i64 {
        match self {
            CountState::NotStarted => 0,
            CountState::Counting => 1,
            CountState::CandidateElected => 2,
            CountState::SurplusDistribution => 3,
            CountState::CandidateExcluded => 4,
            CountState::Recount => 5,
            CountState::CountComplete => 6,
            CountState::Stalemate => 7,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|state| state.code() == code)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CountState::CountComplete | CountState::Stalemate)
    }

    /// States in which ballots are being counted.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            CountState::Counting
                | CountState::CandidateElected
                | CountState::SurplusDistribution
                | CountState::CandidateExcluded
        )
    }

    pub fn can_transition_to(self, next: CountState) -> bool {
        use CountState::*;

        match next {
            CountComplete => self.is_active(),
            Stalemate => !self.is_terminal(),
            _ => matches!(
                (self, next),
                (NotStarted, Counting)
                    | (Counting, CandidateElected)
                    | (Counting, SurplusDistribution)
                    | (Counting, CandidateExcluded)
                    | (CandidateElected, Counting)
                    | (CandidateElected, SurplusDistribution)
                    | (SurplusDistribution, Counting)
                    | (CandidateExcluded, Counting)
                    | (CountComplete, Recount)
                    | (Recount, Counting)
            ),
        }
    }
}

impl fmt::Display for CountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Guards the order of the steps of a count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountStatus {
    state: CountState,
}

impl Default for CountStatus {
    fn default() -> Self {
        Self {
            state: CountState::NotStarted,
        }
    }
}

impl CountStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CountState {
        self.state
    }

    /// Whether `code` names one of the states of a count.
    pub fn is_possible_state(code: i64) -> bool {
        CountState::from_code(code).is_some()
    }

    pub fn update(&mut self, next: CountState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(TallyError::illegal(self.state, next));
        }
        tracing::trace!(from = %self.state, to = %next, "count status");
        self.state = next;
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.state = CountState::NotStarted;
    }
}
