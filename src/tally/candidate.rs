use super::{CandidateId, Result, TallyError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the count for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Neither elected nor excluded yet.
    Continuing,
    /// Reached the quota on first preferences.
    Winner,
    /// Reached the quota at a later count.
    QuotaWinner,
    /// Deemed elected without the quota once continuing candidates
    /// matched the seats left.
    CompromiseWinner,
    /// Elected after surviving a tie for the last seats.
    TiedWinner,
    /// Still continuing when the last seat was filled.
    Loser,
    /// Excluded during the count.
    EarlyLoser,
    /// Defeated below a quarter of the quota.
    SoreLoser,
    /// Lost a tie for the last seat.
    TiedLoser,
    /// Lost a tie while more than one seat was still open.
    TiedEarlyLoser,
    /// Lost a tie below a quarter of the quota.
    TiedSoreLoser,
}

impl Outcome {
    pub const ALL: [Outcome; 11] = [
        Outcome::Continuing,
        Outcome::Winner,
        Outcome::QuotaWinner,
        Outcome::CompromiseWinner,
        Outcome::TiedWinner,
        Outcome::Loser,
        Outcome::EarlyLoser,
        Outcome::SoreLoser,
        Outcome::TiedLoser,
        Outcome::TiedEarlyLoser,
        Outcome::TiedSoreLoser,
    ];

    pub fn is_winner(self) -> bool {
        matches!(
            self,
            Outcome::Winner | Outcome::QuotaWinner | Outcome::CompromiseWinner | Outcome::TiedWinner
        )
    }

    pub fn is_loser(self) -> bool {
        !self.is_winner() && self != Outcome::Continuing
    }

    pub fn is_tied(self) -> bool {
        matches!(
            self,
            Outcome::TiedWinner
                | Outcome::TiedLoser
                | Outcome::TiedEarlyLoser
                | Outcome::TiedSoreLoser
        )
    }

    pub fn is_terminal(self) -> bool {
        self != Outcome::Continuing
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A registered contestant, with its tally at the current count and the
/// tally recorded at the close of every earlier count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    id: CandidateId,
    name: String,
    votes: u64,
    history: Vec<u64>,
    outcome: Outcome,
    decided_at: Option<u32>,
}

impl Candidate {
    pub fn new(id: CandidateId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            votes: 0,
            history: Vec::new(),
            outcome: Outcome::Continuing,
            decided_at: None,
        }
    }

    pub fn id(&self) -> CandidateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn votes(&self) -> u64 {
        self.votes
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_continuing(&self) -> bool {
        self.outcome == Outcome::Continuing
    }

    /// Tallies at the close of counts 1, 2, ...
    pub fn history(&self) -> &[u64] {
        &self.history
    }

    pub fn votes_at_count(&self, count_number: u32) -> Option<u64> {
        let index = (count_number as usize).checked_sub(1)?;
        self.history.get(index).copied()
    }

    /// Count number at which the candidate was elected or excluded.
    pub fn decided_at(&self) -> Option<u32> {
        self.decided_at
    }

    pub(crate) fn add_votes(&mut self, votes: u64) -> Result<()> {
        if !self.is_continuing() {
            return Err(TallyError::illegal(
                format_args!("{} ({})", self.id, self.outcome),
                format_args!("+{} votes", votes),
            ));
        }
        self.votes += votes;
        Ok(())
    }

    /// Papers leaving through a surplus transfer or an exclusion.
    pub(crate) fn remove_votes(&mut self, votes: u64) {
        self.votes = self.votes.saturating_sub(votes);
    }

    pub(crate) fn set_outcome(&mut self, outcome: Outcome, count_number: u32) -> Result<()> {
        if self.outcome.is_terminal() {
            return Err(TallyError::illegal(self.outcome, outcome));
        }
        if outcome.is_terminal() {
            self.decided_at = Some(count_number);
        }
        self.outcome = outcome;
        Ok(())
    }

    pub(crate) fn record_count(&mut self) {
        self.history.push(self.votes);
    }

    pub(crate) fn reset(&mut self) {
        self.votes = 0;
        self.history.clear();
        self.outcome = Outcome::Continuing;
        self.decided_at = None;
    }
}
