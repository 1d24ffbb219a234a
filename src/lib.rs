//! PR-STV ballot counting for Irish parliamentary elections.
//!
//! [`tally`] holds the count itself: ballots, candidates, the constituency
//! and the [`BallotCounting`] engine that runs the count round by round.
//! [`reports`] turns a completed count into a result sheet.

pub mod reports;
pub mod tally;

pub use reports::{generate_count_report, CountReport, ReportError};
pub use tally::{
    Ballot, BallotBox, BallotCounting, Candidate, CandidateId, Constituency, CountState,
    CountingRules, Outcome, SurplusMethod, TallyError, TieBreakRule,
};
