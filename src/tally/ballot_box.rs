use super::{Ballot, CandidateId, Result, TallyError, MAX_BALLOTS};
use itertools::Itertools;
use std::collections::BTreeMap;

/// Every ballot paper cast in a constituency. Duplicates are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BallotBox {
    ballots: Vec<Ballot>,
}

impl BallotBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, ballot: Ballot) -> Result<()> {
        if ballot.number_of_preferences() == 0 {
            return Err(TallyError::InvalidBallot(
                "ballot has no preferences".to_string(),
            ));
        }
        ballot.validate()?;
        if self.ballots.len() >= MAX_BALLOTS {
            return Err(TallyError::InvalidConfiguration(format!(
                "ballot box already holds the maximum of {} ballots",
                MAX_BALLOTS
            )));
        }
        self.ballots.push(ballot);
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.ballots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ballots.is_empty()
    }

    pub fn ballots(&self) -> &[Ballot] {
        &self.ballots
    }

    /// Ballots currently assigned to `candidate`, in the order they were filed.
    pub fn ballots_for(&self, candidate: CandidateId) -> impl Iterator<Item = &Ballot> + '_ {
        self.ballots
            .iter()
            .filter(move |ballot| ballot.is_assigned_to(candidate))
    }

    /// Number of papers held by each candidate, `NONTRANSFERABLE` included.
    pub fn distribution(&self) -> BTreeMap<CandidateId, u64> {
        self.ballots
            .iter()
            .map(Ballot::candidate_id)
            .counts()
            .into_iter()
            .map(|(candidate, papers)| (candidate, papers as u64))
            .collect()
    }

    pub(crate) fn positions_for(&self, candidate: CandidateId) -> Vec<usize> {
        self.ballots
            .iter()
            .positions(|ballot| ballot.is_assigned_to(candidate))
            .collect()
    }

    pub(crate) fn ballot(&self, index: usize) -> &Ballot {
        &self.ballots[index]
    }

    pub(crate) fn ballot_mut(&mut self, index: usize) -> &mut Ballot {
        &mut self.ballots[index]
    }

    /// Drop every ballot the predicate rejects, returning how many went.
    pub(crate) fn retain(&mut self, keep: impl FnMut(&Ballot) -> bool) -> usize {
        let before = self.ballots.len();
        self.ballots.retain(keep);
        before - self.ballots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ballot(raw: &[u32]) -> Ballot {
        let list: Vec<CandidateId> = raw.iter().copied().map(CandidateId).collect();
        Ballot::with_preferences(&list).unwrap()
    }

    #[test]
    fn rejects_empty_ballots() {
        let mut ballot_box = BallotBox::new();
        assert!(matches!(
            ballot_box.accept(Ballot::new()),
            Err(TallyError::InvalidBallot(_))
        ));
        assert!(ballot_box.is_empty());
    }

    #[test]
    fn accepts_duplicates() {
        let mut ballot_box = BallotBox::new();
        ballot_box.accept(ballot(&[1, 2])).unwrap();
        ballot_box.accept(ballot(&[1, 2])).unwrap();
        assert_eq!(ballot_box.size(), 2);
    }

    #[test]
    fn partitions_by_current_candidate() {
        let mut ballot_box = BallotBox::new();
        for raw in [&[1, 2][..], &[2], &[1], &[3, 1]] {
            ballot_box.accept(ballot(raw)).unwrap();
        }
        ballot_box.ballot_mut(2).transfer();

        let distribution = ballot_box.distribution();
        assert_eq!(distribution.get(&CandidateId(1)), Some(&1));
        assert_eq!(distribution.get(&CandidateId(2)), Some(&1));
        assert_eq!(distribution.get(&CandidateId(3)), Some(&1));
        assert_eq!(distribution.get(&CandidateId::NONTRANSFERABLE), Some(&1));

        assert_eq!(ballot_box.ballots_for(CandidateId(1)).count(), 1);
        assert_eq!(ballot_box.positions_for(CandidateId(3)), vec![3]);
    }

    #[test]
    fn full_box_takes_no_more() {
        let mut ballot_box = BallotBox::new();
        let paper = ballot(&[1, 2]);
        for _ in 0..MAX_BALLOTS {
            ballot_box.accept(paper.clone()).unwrap();
        }
        assert_eq!(ballot_box.size(), MAX_BALLOTS);
        assert!(matches!(
            ballot_box.accept(paper),
            Err(TallyError::InvalidConfiguration(_))
        ));
        assert_eq!(ballot_box.size(), MAX_BALLOTS);
    }
}
