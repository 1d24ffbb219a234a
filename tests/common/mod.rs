#![allow(dead_code)]

use itertools::Itertools;
use prstv_count::tally::{
    Ballot, BallotBox, BallotCounting, CandidateId, Constituency, CountingRules, Outcome,
};
use tracing_subscriber::EnvFilter;

/// Route engine events to the test harness. Filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ids(raw: &[u32]) -> Vec<CandidateId> {
    raw.iter().copied().map(CandidateId).collect()
}

pub fn constituency(seats: u32, candidates: usize) -> Constituency {
    let mut constituency = Constituency::new();
    constituency.set_number_of_seats(seats, seats).unwrap();
    constituency.set_number_of_candidates(candidates).unwrap();
    constituency
}

/// A ballot box holding `copies` papers for each preference list.
pub fn ballot_box(ballots: &[(&[u32], usize)]) -> BallotBox {
    let mut ballot_box = BallotBox::new();
    for (preferences, copies) in ballots {
        for _ in 0..*copies {
            ballot_box
                .accept(Ballot::with_preferences(&ids(preferences)).unwrap())
                .unwrap();
        }
    }
    ballot_box
}

/// An engine with ballots loaded and ready for the first count.
pub fn counting(
    seats: u32,
    candidates: usize,
    rules: CountingRules,
    ballots: &[(&[u32], usize)],
) -> BallotCounting {
    init_tracing();
    let mut counting = BallotCounting::new(rules);
    counting.setup(constituency(seats, candidates)).unwrap();
    counting.load(ballot_box(ballots)).unwrap();
    counting
}

pub fn outcome(counting: &BallotCounting, id: u32) -> Outcome {
    counting.candidate(CandidateId(id)).unwrap().outcome()
}

pub fn outcomes(counting: &BallotCounting) -> Vec<Outcome> {
    counting
        .constituency()
        .candidates()
        .iter()
        .map(|candidate| candidate.outcome())
        .collect()
}

/// The multiset of outcomes a count produced, independent of which candidate
/// got which.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    outcomes: Vec<Outcome>,
}

impl Scenario {
    pub fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
        }
    }

    pub fn of(counting: &BallotCounting) -> Self {
        Self::new(outcomes(counting))
    }

    pub fn canonical(&self) -> Vec<Outcome> {
        self.outcomes.iter().copied().sorted().collect()
    }

    pub fn equivalent_to(&self, other: &Scenario) -> bool {
        self.canonical() == other.canonical()
    }

    pub fn number_of_winners(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_winner()).count()
    }

    pub fn number_of_losers(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_loser()).count()
    }

    /// Tied winners and tied losers only ever come together.
    pub fn ties_are_paired(&self) -> bool {
        let tied_winners = self.outcomes.contains(&Outcome::TiedWinner);
        let tied_losers = self
            .outcomes
            .iter()
            .any(|outcome| outcome.is_tied() && outcome.is_loser());
        tied_winners == tied_losers
    }

    /// Distinct scenarios with the given numbers of winners and losers.
    pub fn number_of_scenarios(winners: u32, losers: u32) -> u64 {
        match (winners, losers) {
            (1, 1) => 4,
            (1, _) => 5 * Self::number_of_scenarios(1, losers - 1),
            _ => 4 * Self::number_of_scenarios(winners - 1, losers),
        }
    }

    pub fn total_number_of_scenarios(outcomes: u32) -> u64 {
        (1..outcomes)
            .map(|winners| Self::number_of_scenarios(winners, outcomes - winners))
            .sum()
    }
}
