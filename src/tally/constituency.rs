use super::{Candidate, CandidateId, Result, TallyError};

/// Seats to fill and the candidates standing for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constituency {
    seats_in_election: u32,
    total_seats: u32,
    candidates: Vec<Candidate>,
}

impl Default for Constituency {
    fn default() -> Self {
        Self {
            seats_in_election: 1,
            total_seats: 1,
            candidates: Vec::new(),
        }
    }
}

impl Constituency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seats filled by this election, and the seats the constituency holds
    /// in total. The two differ in a by-election.
    pub fn set_number_of_seats(&mut self, seats_in_election: u32, total_seats: u32) -> Result<()> {
        if seats_in_election < 1 || total_seats < seats_in_election {
            return Err(TallyError::InvalidConfiguration(format!(
                "cannot fill {} of {} seats",
                seats_in_election, total_seats
            )));
        }
        if !self.candidates.is_empty() && self.candidates.len() <= seats_in_election as usize {
            return Err(TallyError::InvalidConfiguration(format!(
                "{} candidates cannot contest {} seats",
                self.candidates.len(),
                seats_in_election
            )));
        }
        self.seats_in_election = seats_in_election;
        self.total_seats = total_seats;
        Ok(())
    }

    /// Register `number` anonymous candidates with identifiers `1..=number`,
    /// replacing any already registered.
    pub fn set_number_of_candidates(&mut self, number: usize) -> Result<()> {
        if number <= self.seats_in_election as usize {
            return Err(TallyError::InvalidConfiguration(format!(
                "{} candidates cannot contest {} seats",
                number, self.seats_in_election
            )));
        }
        self.candidates = (1..=number as u32)
            .map(|id| Candidate::new(CandidateId(id), format!("Candidate {}", id)))
            .collect();
        Ok(())
    }

    pub fn add_candidate(&mut self, name: impl Into<String>) -> CandidateId {
        let id = CandidateId(
            self.candidates
                .iter()
                .map(|candidate| candidate.id().0)
                .max()
                .unwrap_or(0)
                + 1,
        );
        self.candidates.push(Candidate::new(id, name));
        id
    }

    pub fn number_of_seats(&self) -> u32 {
        self.seats_in_election
    }

    pub fn total_seats(&self) -> u32 {
        self.total_seats
    }

    pub fn number_of_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn candidate(&self, index: usize) -> Result<&Candidate> {
        self.candidates
            .get(index)
            .ok_or(TallyError::IndexOutOfRange {
                index,
                len: self.candidates.len(),
            })
    }

    /// Candidates in registration order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn index_of(&self, id: CandidateId) -> Option<usize> {
        self.candidates.iter().position(|candidate| candidate.id() == id)
    }

    /// Droop quota: `floor(valid_poll / (seats + 1)) + 1`.
    pub fn droop_quota(&self, valid_poll: u64) -> u64 {
        valid_poll / (u64::from(self.seats_in_election) + 1) + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.candidates.len() <= self.seats_in_election as usize {
            return Err(TallyError::InvalidConfiguration(format!(
                "{} candidates cannot contest {} seats",
                self.candidates.len(),
                self.seats_in_election
            )));
        }
        Ok(())
    }

    pub(crate) fn candidate_mut(&mut self, index: usize) -> &mut Candidate {
        &mut self.candidates[index]
    }

    pub(crate) fn candidates_mut(&mut self) -> &mut [Candidate] {
        &mut self.candidates
    }
}
