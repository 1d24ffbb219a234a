pub mod ballot;
pub mod ballot_box;
pub mod candidate;
pub mod constituency;
pub mod count_status;
pub mod counting;
pub mod rules;
mod surplus;

pub use ballot::{Ballot, CandidateId, MAX_BALLOTS};
pub use ballot_box::BallotBox;
pub use candidate::{Candidate, Outcome};
pub use constituency::Constituency;
pub use count_status::{CountState, CountStatus};
pub use counting::{BallotCounting, DecisiveTie};
pub use rules::{CountingRules, SurplusMethod, TieBreakRule};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TallyError {
    #[error("Invalid ballot: {0}")]
    InvalidBallot(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Illegal transition from {from} to {to}")]
    IllegalStateTransition { from: String, to: String },
    #[error("Index {index} out of range ({len} candidates)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("No continuing candidates remain")]
    NoContinuingCandidates,
    #[error("Count abandoned: {0}")]
    Stalemate(String),
}

impl TallyError {
    pub(crate) fn illegal(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        TallyError::IllegalStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;
