use super::{Result, TallyError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on ballots for one constituency: a five seat constituency
/// holds at most 30,000 people per elected representative.
pub const MAX_BALLOTS: usize = 150_000;

/// Identifier of a registered candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub u32);

impl CandidateId {
    /// Reported by a ballot whose preferences are exhausted.
    pub const NONTRANSFERABLE: CandidateId = CandidateId(0);
    /// Placeholder that never identifies a registered candidate.
    pub const NO_CANDIDATE: CandidateId = CandidateId(u32::MAX);

    /// True unless this is one of the two reserved sentinels.
    pub fn is_candidate(self) -> bool {
        self != Self::NONTRANSFERABLE && self != Self::NO_CANDIDATE
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The ordered preferences from one ballot paper, and the position of the
/// preference the paper currently counts for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BallotPaper")]
pub struct Ballot {
    preferences: Vec<CandidateId>,
    position_in_list: usize,
    /// Count number at which the paper arrived with its current candidate.
    received_at: u32,
}

/// A ballot as read from storage, before its preferences are checked.
#[derive(Deserialize)]
struct BallotPaper {
    preferences: Vec<CandidateId>,
    #[serde(default)]
    position_in_list: usize,
    #[serde(default)]
    received_at: u32,
}

impl TryFrom<BallotPaper> for Ballot {
    type Error = TallyError;

    fn try_from(paper: BallotPaper) -> Result<Self> {
        let ballot = Ballot {
            preferences: paper.preferences,
            position_in_list: paper.position_in_list,
            received_at: paper.received_at,
        };
        ballot.validate()?;
        Ok(ballot)
    }
}

impl Ballot {
    /// An empty ballot paper for use by a voter.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preferences(list: &[CandidateId]) -> Result<Self> {
        let mut ballot = Self::new();
        ballot.load(list)?;
        Ok(ballot)
    }

    /// Load the preferences, first preference first.
    ///
    /// Reloading is allowed until the paper has been transferred for the
    /// first time; after that its preferences are fixed.
    pub fn load(&mut self, list: &[CandidateId]) -> Result<()> {
        if self.position_in_list > 0 {
            return Err(TallyError::InvalidBallot(
                "preferences cannot change once the ballot has been transferred".to_string(),
            ));
        }
        check_preferences(list)?;
        self.preferences = list.to_vec();
        Ok(())
    }

    /// No sentinel entries, and the cursor within the list.
    pub(crate) fn validate(&self) -> Result<()> {
        check_preferences(&self.preferences)?;
        if self.position_in_list > self.preferences.len() {
            return Err(TallyError::InvalidBallot(format!(
                "position {} is past the end of {} preferences",
                self.position_in_list,
                self.preferences.len()
            )));
        }
        Ok(())
    }

    pub fn set_first_preference(&mut self, candidate: CandidateId) -> Result<()> {
        self.load(&[candidate])
    }

    /// The candidate this paper is assigned to, or `NONTRANSFERABLE`.
    pub fn candidate_id(&self) -> CandidateId {
        self.preference(self.position_in_list)
    }

    /// Look ahead `offset` places without moving the paper.
    pub fn next_preference(&self, offset: usize) -> CandidateId {
        self.preference(self.position_in_list + offset)
    }

    /// Move to the next preference. Has no effect once exhausted.
    pub fn transfer(&mut self) {
        if self.position_in_list < self.preferences.len() {
            self.position_in_list += 1;
        }
    }

    pub fn is_assigned_to(&self, candidate: CandidateId) -> bool {
        self.candidate_id() == candidate
    }

    pub fn is_first_preference(&self, candidate: CandidateId) -> bool {
        self.preferences.first() == Some(&candidate)
    }

    pub fn remaining_preferences(&self) -> usize {
        self.preferences.len() - self.position_in_list
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_preferences() == 0
    }

    pub fn number_of_preferences(&self) -> usize {
        self.preferences.len()
    }

    pub fn position_in_list(&self) -> usize {
        self.position_in_list
    }

    pub fn preferences(&self) -> &[CandidateId] {
        &self.preferences
    }

    pub fn received_at(&self) -> u32 {
        self.received_at
    }

    pub(crate) fn mark_received(&mut self, count_number: u32) {
        self.received_at = count_number;
    }

    fn preference(&self, index: usize) -> CandidateId {
        self.preferences
            .get(index)
            .copied()
            .unwrap_or(CandidateId::NONTRANSFERABLE)
    }
}

fn check_preferences(list: &[CandidateId]) -> Result<()> {
    if let Some(bad) = list.iter().find(|id| !id.is_candidate()) {
        return Err(TallyError::InvalidBallot(format!(
            "{} is not a valid candidate identifier",
            bad
        )));
    }
    Ok(())
}
