use super::surplus::apportion;
use super::{
    Ballot, BallotBox, Candidate, CandidateId, Constituency, CountState, CountStatus,
    CountingRules, Outcome, Result, SurplusMethod, TallyError, TieBreakRule,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, info_span, warn};

/// A tie for exclusion that settled who took the last seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisiveTie {
    #[serde(rename = "countNumber")]
    pub count_number: u32,
    pub excluded: CandidateId,
    pub survivors: Vec<CandidateId>,
}

/// Counts the ballots of one constituency.
///
/// The engine owns the candidates, the ballot papers and the count status
/// for the whole count; nothing else mutates them. Typical use:
///
/// ```ignore
/// let mut counting = BallotCounting::new(CountingRules::new(SurplusMethod::LastParcel));
/// counting.setup(constituency)?;
/// counting.load(ballot_box)?;
/// counting.count()?;
/// ```
#[derive(Debug, Clone)]
pub struct BallotCounting {
    rules: CountingRules,
    constituency: Constituency,
    index: HashMap<CandidateId, usize>,
    ballot_box: BallotBox,
    pristine: BallotBox,
    status: CountStatus,
    quota: Option<u64>,
    valid_poll: u64,
    count_number: u32,
    round_number: u32,
    non_transferable: u64,
    non_transferable_history: Vec<u64>,
    elected: Vec<CandidateId>,
    decisive_ties: Vec<DecisiveTie>,
}

impl BallotCounting {
    pub fn new(rules: CountingRules) -> Self {
        Self {
            rules,
            constituency: Constituency::new(),
            index: HashMap::new(),
            ballot_box: BallotBox::new(),
            pristine: BallotBox::new(),
            status: CountStatus::new(),
            quota: None,
            valid_poll: 0,
            count_number: 0,
            round_number: 0,
            non_transferable: 0,
            non_transferable_history: Vec::new(),
            elected: Vec::new(),
            decisive_ties: Vec::new(),
        }
    }

    /// Bind the engine to a constituency and start over.
    pub fn setup(&mut self, mut constituency: Constituency) -> Result<()> {
        constituency.validate()?;
        for candidate in constituency.candidates_mut() {
            candidate.reset();
        }
        self.index = constituency
            .candidates()
            .iter()
            .enumerate()
            .map(|(position, candidate)| (candidate.id(), position))
            .collect();
        if self.index.len() != constituency.number_of_candidates() {
            return Err(TallyError::InvalidConfiguration(
                "candidate identifiers must be unique".to_string(),
            ));
        }

        info!(
            seats = constituency.number_of_seats(),
            candidates = constituency.number_of_candidates(),
            "constituency bound"
        );
        self.constituency = constituency;
        self.ballot_box = BallotBox::new();
        self.pristine = BallotBox::new();
        self.status.reset();
        self.quota = None;
        self.valid_poll = 0;
        self.restart();
        Ok(())
    }

    /// Take the ballot box, discard invalid papers and fix the quota.
    pub fn load(&mut self, mut ballot_box: BallotBox) -> Result<()> {
        let state = self.status.state();
        if state != CountState::NotStarted {
            return Err(TallyError::illegal(state, "load"));
        }
        if self.index.is_empty() {
            return Err(TallyError::InvalidConfiguration(
                "no constituency has been set up".to_string(),
            ));
        }

        let index = &self.index;
        let discarded = ballot_box.retain(|ballot| {
            ballot.number_of_preferences() > 0
                && ballot.position_in_list() == 0
                && index.contains_key(&ballot.candidate_id())
        });
        if discarded > 0 {
            warn!(discarded, "invalid ballots discarded");
        }
        for position in 0..ballot_box.size() {
            ballot_box.ballot_mut(position).mark_received(1);
        }

        self.valid_poll = ballot_box.size() as u64;
        let quota = self.constituency.droop_quota(self.valid_poll);
        self.quota = Some(quota);
        self.pristine = ballot_box.clone();
        self.ballot_box = ballot_box;
        self.status.update(CountState::Counting)?;

        info!(valid_poll = self.valid_poll, quota, "ballots loaded");
        Ok(())
    }

    /// First count: credit every candidate with their first preferences.
    ///
    /// Returns the candidates who reached the quota, highest first. Nobody
    /// is elected until the next round.
    pub fn start_counting(&mut self) -> Result<Vec<CandidateId>> {
        let state = self.status.state();
        if state != CountState::Counting || self.count_number != 0 {
            return Err(TallyError::illegal(state, "first count"));
        }
        let quota = self.require_quota()?;

        let distribution = self.ballot_box.distribution();
        for candidate in self.constituency.candidates_mut() {
            let votes = distribution.get(&candidate.id()).copied().unwrap_or(0);
            candidate.add_votes(votes)?;
        }
        self.increment_count_number();

        let candidates = self.constituency.candidates();
        let reached = self
            .continuing_indices()
            .filter(|&position| candidates[position].votes() >= quota)
            .collect();
        Ok(self
            .highest_first(reached)
            .into_iter()
            .map(|position| candidates[position].id())
            .collect())
    }

    /// Surpluses awaiting transfer, largest first.
    pub fn calculate_surpluses(&self) -> Result<Vec<(CandidateId, u64)>> {
        let quota = self.require_quota()?;
        let candidates = self.constituency.candidates();
        let holders = candidates
            .iter()
            .positions(|candidate| !candidate.outcome().is_loser() && candidate.votes() > quota)
            .collect();
        Ok(self
            .highest_first(holders)
            .into_iter()
            .map(|position| {
                let candidate = &candidates[position];
                (candidate.id(), candidate.votes() - quota)
            })
            .collect())
    }

    /// The continuing candidate to exclude next.
    pub fn find_lowest_candidate(&self) -> Result<CandidateId> {
        let (loser, _) = self.lowest_continuing()?;
        Ok(self.constituency.candidates()[loser].id())
    }

    /// Exclude a continuing candidate and pass each of their papers to the
    /// next continuing preference.
    pub fn eliminate_candidate(&mut self, candidate: CandidateId) -> Result<()> {
        self.require_active("exclusion")?;
        let position = self.position(candidate)?;
        self.exclude(position, None)
    }

    /// Transfer the surplus of an elected candidate.
    pub fn distribute_surplus(&mut self, candidate: CandidateId) -> Result<()> {
        self.require_active("surplus distribution")?;
        let quota = self.require_quota()?;
        let position = self.position(candidate)?;
        let holder = &self.constituency.candidates()[position];
        if !holder.outcome().is_winner() {
            return Err(TallyError::illegal(
                format_args!("{} ({})", candidate, holder.outcome()),
                "surplus distribution",
            ));
        }
        let surplus = holder.votes().saturating_sub(quota);
        if surplus == 0 {
            return Ok(());
        }

        let mut papers = self.ballot_box.positions_for(candidate);
        if self.rules.surplus_method == SurplusMethod::LastParcel {
            let latest = papers
                .iter()
                .map(|&paper| self.ballot_box.ballot(paper).received_at())
                .max()
                .unwrap_or(0);
            papers.retain(|&paper| self.ballot_box.ballot(paper).received_at() == latest);
        }
        let examined = papers.len();

        let mut sub_parcels: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for paper in papers {
            let next = self.next_continuing(self.ballot_box.ballot(paper));
            if next != CandidateId::NONTRANSFERABLE {
                sub_parcels.entry(self.position(next)?).or_default().push(paper);
            }
        }
        let candidates = self.constituency.candidates();
        let sizes: Vec<(CandidateId, u64)> = sub_parcels
            .iter()
            .map(|(&position, parcel)| (candidates[position].id(), parcel.len() as u64))
            .collect();
        let shares = apportion(surplus, &sizes);

        // the papers moved are the last ones filed in each sub-parcel
        let mut moves = Vec::new();
        for ((destination, _), (parcel, share)) in
            sizes.iter().zip(sub_parcels.values().zip(shares))
        {
            let first = parcel.len() - share as usize;
            moves.extend(parcel[first..].iter().map(|&paper| (paper, *destination)));
        }
        let moved = moves.len() as u64;
        self.move_papers(&moves)?;
        self.constituency.candidate_mut(position).remove_votes(surplus);
        self.non_transferable += surplus - moved;

        info!(
            count = self.count_number + 1,
            candidate = %candidate,
            surplus,
            examined,
            moved,
            "surplus distributed"
        );
        Ok(())
    }

    /// Close the current count and record every tally against it.
    pub fn increment_count_number(&mut self) {
        self.count_number += 1;
        for candidate in self.constituency.candidates_mut() {
            candidate.record_count();
        }
        self.non_transferable_history.push(self.non_transferable);
        debug!(
            count = self.count_number,
            tallies = ?self.tallies(),
            non_transferable = self.non_transferable,
            "count closed"
        );
    }

    pub fn get_continuing_candidates(&self) -> usize {
        self.continuing_indices().count()
    }

    pub fn update_count_status(&mut self, next: CountState) -> Result<()> {
        self.status.update(next)
    }

    /// Run one round: elections and surplus transfers until the next
    /// exclusion that leaves more candidates than seats, or the end of the
    /// count. Any failure inside the round abandons the count.
    pub fn next_round(&mut self) -> Result<CountState> {
        let state = self.status.state();
        match state {
            CountState::CountComplete => return Ok(state),
            CountState::Stalemate => {
                return Err(TallyError::Stalemate(
                    "count was already abandoned".to_string(),
                ))
            }
            _ if !state.is_active() => return Err(TallyError::illegal(state, "next round")),
            _ => {}
        }
        if self.count_number == 0 {
            self.start_counting()?;
        }

        self.round_number += 1;
        let span = info_span!("round", number = self.round_number);
        let _entered = span.enter();

        match self.run_round() {
            Ok(state) => Ok(state),
            Err(e) => {
                let reason = match e {
                    TallyError::Stalemate(reason) => reason,
                    other => other.to_string(),
                };
                warn!(%reason, count = self.count_number, "count abandoned");
                self.status.update(CountState::Stalemate)?;
                Err(TallyError::Stalemate(reason))
            }
        }
    }

    /// Run rounds until the count is complete.
    pub fn count(&mut self) -> Result<CountState> {
        loop {
            let state = self.next_round()?;
            if state.is_terminal() {
                return Ok(state);
            }
        }
    }

    /// Start the count again from the papers as they were loaded.
    pub fn recount(&mut self) -> Result<()> {
        self.status.update(CountState::Recount)?;
        for candidate in self.constituency.candidates_mut() {
            candidate.reset();
        }
        self.ballot_box = self.pristine.clone();
        self.restart();
        self.status.update(CountState::Counting)?;
        info!(valid_poll = self.valid_poll, "recount started");
        Ok(())
    }

    pub fn rules(&self) -> &CountingRules {
        &self.rules
    }

    pub fn constituency(&self) -> &Constituency {
        &self.constituency
    }

    pub fn ballot_box(&self) -> &BallotBox {
        &self.ballot_box
    }

    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate> {
        let position = *self.index.get(&id)?;
        self.constituency.candidates().get(position)
    }

    pub fn status(&self) -> CountState {
        self.status.state()
    }

    pub fn quota(&self) -> Option<u64> {
        self.quota
    }

    pub fn valid_poll(&self) -> u64 {
        self.valid_poll
    }

    pub fn count_number(&self) -> u32 {
        self.count_number
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn non_transferable(&self) -> u64 {
        self.non_transferable
    }

    /// Non-transferable papers at the close of counts 1, 2, ...
    pub fn non_transferable_history(&self) -> &[u64] {
        &self.non_transferable_history
    }

    /// Elected candidates in the order they were elected.
    pub fn elected_candidates(&self) -> &[CandidateId] {
        &self.elected
    }

    pub fn decisive_ties(&self) -> &[DecisiveTie] {
        &self.decisive_ties
    }

    pub fn seats_remaining(&self) -> usize {
        (self.constituency.number_of_seats() as usize).saturating_sub(self.elected.len())
    }

    fn run_round(&mut self) -> Result<CountState> {
        loop {
            self.resume_counting()?;
            self.check_invariants()?;
            self.elect_quota_winners()?;

            if self.seats_remaining() == 0 {
                self.close_losers()?;
                return self.complete();
            }
            let continuing = self.get_continuing_candidates();
            let seats = self.seats_remaining();
            if continuing == seats {
                self.elect_remaining()?;
                return self.complete();
            }

            if let Some(&(holder, _)) = self.calculate_surpluses()?.first() {
                self.status.update(CountState::SurplusDistribution)?;
                self.distribute_surplus(holder)?;
                self.increment_count_number();
                continue;
            }

            if continuing > seats {
                self.resume_counting()?;
                let decisive = continuing == seats + 1;
                let (loser, tied) = self.lowest_continuing()?;
                let survivors = if decisive && tied.len() > 1 {
                    Some(tied.into_iter().filter(|&other| other != loser).collect())
                } else {
                    None
                };

                self.status.update(CountState::CandidateExcluded)?;
                self.exclude(loser, survivors)?;
                self.increment_count_number();
                self.status.update(CountState::Counting)?;
                if !decisive {
                    self.check_invariants()?;
                    return Ok(CountState::Counting);
                }
                continue;
            }

            return Err(TallyError::Stalemate(format!(
                "{} continuing candidates for {} seats",
                continuing, seats
            )));
        }
    }

    fn elect_quota_winners(&mut self) -> Result<usize> {
        let quota = self.require_quota()?;
        let candidates = self.constituency.candidates();
        let reached: Vec<usize> = self
            .continuing_indices()
            .filter(|&position| candidates[position].votes() >= quota)
            .collect();
        if reached.is_empty() {
            return Ok(0);
        }

        let mut elected = 0;
        for position in self.highest_first(reached) {
            if self.seats_remaining() == 0 {
                break;
            }
            let outcome = self.winner_outcome(position, true);
            self.elect(position, outcome)?;
            elected += 1;
        }
        self.status.update(CountState::CandidateElected)?;
        Ok(elected)
    }

    fn elect_remaining(&mut self) -> Result<()> {
        let remaining: Vec<usize> = self.continuing_indices().collect();
        for position in self.highest_first(remaining) {
            let outcome = self.winner_outcome(position, false);
            self.elect(position, outcome)?;
        }
        Ok(())
    }

    fn close_losers(&mut self) -> Result<()> {
        let quota = self.require_quota()?;
        let count = self.count_number;
        let remaining: Vec<usize> = self.continuing_indices().collect();
        for position in remaining {
            let candidate = self.constituency.candidate_mut(position);
            let outcome = if below_expenses_threshold(candidate.votes(), quota) {
                Outcome::SoreLoser
            } else {
                Outcome::Loser
            };
            candidate.set_outcome(outcome, count)?;
            info!(
                count,
                candidate = %candidate.id(),
                votes = candidate.votes(),
                %outcome,
                "not elected"
            );
        }
        Ok(())
    }

    fn complete(&mut self) -> Result<CountState> {
        self.check_invariants()?;
        self.status.update(CountState::CountComplete)?;
        info!(
            count = self.count_number,
            elected = ?self.elected,
            non_transferable = self.non_transferable,
            "count complete"
        );
        Ok(CountState::CountComplete)
    }

    fn elect(&mut self, position: usize, outcome: Outcome) -> Result<()> {
        let count = self.count_number;
        let candidate = self.constituency.candidate_mut(position);
        candidate.set_outcome(outcome, count)?;
        info!(
            count,
            candidate = %candidate.id(),
            votes = candidate.votes(),
            %outcome,
            "candidate elected"
        );
        self.elected.push(candidate.id());
        Ok(())
    }

    fn winner_outcome(&self, position: usize, by_quota: bool) -> Outcome {
        let candidate = &self.constituency.candidates()[position];
        let tied = self
            .decisive_ties
            .iter()
            .any(|tie| tie.survivors.contains(&candidate.id()));
        let first_count_quota = match (candidate.votes_at_count(1), self.quota) {
            (Some(votes), Some(quota)) => votes >= quota,
            _ => false,
        };

        if tied {
            Outcome::TiedWinner
        } else if !by_quota {
            Outcome::CompromiseWinner
        } else if first_count_quota {
            Outcome::Winner
        } else {
            Outcome::QuotaWinner
        }
    }

    fn exclude(&mut self, position: usize, survivors: Option<Vec<usize>>) -> Result<()> {
        let quota = self.require_quota()?;
        let count = self.count_number;
        let last_seat = self.seats_remaining() <= 1;
        let candidate = &self.constituency.candidates()[position];
        let (id, votes) = (candidate.id(), candidate.votes());

        let sore = below_expenses_threshold(votes, quota);
        let outcome = match (&survivors, sore) {
            (Some(_), true) => Outcome::TiedSoreLoser,
            (Some(_), false) if last_seat => Outcome::TiedLoser,
            (Some(_), false) => Outcome::TiedEarlyLoser,
            (None, true) => Outcome::SoreLoser,
            (None, false) => Outcome::EarlyLoser,
        };
        self.constituency
            .candidate_mut(position)
            .set_outcome(outcome, count)?;
        info!(count, candidate = %id, votes, %outcome, "candidate excluded");

        if let Some(survivors) = survivors {
            let candidates = self.constituency.candidates();
            self.decisive_ties.push(DecisiveTie {
                count_number: count,
                excluded: id,
                survivors: survivors
                    .into_iter()
                    .map(|other| candidates[other].id())
                    .collect(),
            });
        }

        let moves: Vec<(usize, CandidateId)> = self
            .ballot_box
            .positions_for(id)
            .into_iter()
            .map(|paper| (paper, self.next_continuing(self.ballot_box.ballot(paper))))
            .collect();
        self.move_papers(&moves)?;
        self.constituency
            .candidate_mut(position)
            .remove_votes(moves.len() as u64);
        Ok(())
    }

    /// Move each paper on to `destination`, crediting it there or writing it
    /// off as non-transferable. Papers arrive at the next count.
    fn move_papers(&mut self, moves: &[(usize, CandidateId)]) -> Result<()> {
        let arrival = self.count_number + 1;
        for &(paper, destination) in moves {
            let ballot = self.ballot_box.ballot_mut(paper);
            ballot.transfer();
            while !ballot.is_assigned_to(destination) && !ballot.is_exhausted() {
                ballot.transfer();
            }
            ballot.mark_received(arrival);

            if destination == CandidateId::NONTRANSFERABLE {
                self.non_transferable += 1;
            } else {
                let position = self.position(destination)?;
                self.constituency.candidate_mut(position).add_votes(1)?;
            }
        }
        Ok(())
    }

    fn next_continuing(&self, ballot: &Ballot) -> CandidateId {
        (1..)
            .map(|offset| ballot.next_preference(offset))
            .find(|&next| next == CandidateId::NONTRANSFERABLE || self.is_continuing(next))
            .unwrap_or(CandidateId::NONTRANSFERABLE)
    }

    fn is_continuing(&self, id: CandidateId) -> bool {
        self.candidate(id).map_or(false, Candidate::is_continuing)
    }

    fn continuing_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.constituency
            .candidates()
            .iter()
            .positions(Candidate::is_continuing)
    }

    fn lowest_continuing(&self) -> Result<(usize, Vec<usize>)> {
        let candidates = self.constituency.candidates();
        let lowest = self
            .continuing_indices()
            .map(|position| candidates[position].votes())
            .min()
            .ok_or(TallyError::NoContinuingCandidates)?;
        let tied: Vec<usize> = self
            .continuing_indices()
            .filter(|&position| candidates[position].votes() == lowest)
            .collect();
        let loser = self
            .break_tie(&tied, true)
            .ok_or(TallyError::NoContinuingCandidates)?;
        Ok((loser, tied))
    }

    /// Order by current tally, highest first, breaking ties by the rules.
    fn highest_first(&self, mut positions: Vec<usize>) -> Vec<usize> {
        let candidates = self.constituency.candidates();
        positions.sort_by(|a, b| candidates[*b].votes().cmp(&candidates[*a].votes()));

        let mut ordered = Vec::with_capacity(positions.len());
        for (_, group) in &positions
            .into_iter()
            .group_by(|&position| candidates[position].votes())
        {
            let mut group: Vec<usize> = group.collect();
            while let Some(pick) = self.break_tie(&group, false) {
                group.retain(|&position| position != pick);
                ordered.push(pick);
            }
        }
        ordered
    }

    /// Pick the lowest (for exclusion) or highest (for election) of candidates
    /// with equal tallies.
    fn break_tie(&self, tied: &[usize], lowest: bool) -> Option<usize> {
        let candidates = self.constituency.candidates();
        let mut group = tied.to_vec();

        if self.rules.tie_break == TieBreakRule::PreviousCounts {
            for count in 1..=self.count_number {
                if group.len() <= 1 {
                    break;
                }
                let tally = |position: &usize| {
                    candidates[*position].votes_at_count(count).unwrap_or(0)
                };
                let target = if lowest {
                    group.iter().map(&tally).min()
                } else {
                    group.iter().map(&tally).max()
                };
                if let Some(target) = target {
                    group.retain(|position| tally(position) == target);
                }
            }
        }

        if lowest {
            group.into_iter().max()
        } else {
            group.into_iter().min()
        }
    }

    /// Checks that hold at every round boundary.
    fn check_invariants(&self) -> Result<()> {
        let candidates = self.constituency.candidates();
        let held: u64 = candidates.iter().map(Candidate::votes).sum();
        if held + self.non_transferable != self.valid_poll {
            return Err(TallyError::Stalemate(format!(
                "{} votes held and {} non-transferable do not make up the valid poll of {}",
                held, self.non_transferable, self.valid_poll
            )));
        }

        let distribution = self.ballot_box.distribution();
        for candidate in candidates.iter().filter(|candidate| candidate.is_continuing()) {
            let papers = distribution.get(&candidate.id()).copied().unwrap_or(0);
            if papers != candidate.votes() {
                return Err(TallyError::Stalemate(format!(
                    "{} is credited with {} votes but holds {} papers",
                    candidate.id(),
                    candidate.votes(),
                    papers
                )));
            }
        }

        for candidate in candidates.iter().filter(|candidate| candidate.outcome().is_tied()) {
            let id = candidate.id();
            let matched = if candidate.outcome() == Outcome::TiedWinner {
                self.decisive_ties.iter().any(|tie| tie.survivors.contains(&id))
            } else {
                self.decisive_ties.iter().any(|tie| {
                    tie.excluded == id
                        && tie.survivors.iter().any(|&survivor| {
                            self.candidate(survivor).map_or(false, |other| {
                                matches!(other.outcome(), Outcome::TiedWinner | Outcome::Continuing)
                            })
                        })
                })
            };
            if !matched {
                return Err(TallyError::Stalemate(format!(
                    "{} is a {} without a matching tie",
                    id,
                    candidate.outcome()
                )));
            }
        }
        Ok(())
    }

    fn tallies(&self) -> Vec<(CandidateId, u64)> {
        self.constituency
            .candidates()
            .iter()
            .map(|candidate| (candidate.id(), candidate.votes()))
            .collect()
    }

    fn resume_counting(&mut self) -> Result<()> {
        let state = self.status.state();
        if state != CountState::Counting && state.is_active() {
            self.status.update(CountState::Counting)?;
        }
        Ok(())
    }

    fn require_active(&self, step: &str) -> Result<()> {
        let state = self.status.state();
        if !state.is_active() {
            return Err(TallyError::illegal(state, step));
        }
        Ok(())
    }

    fn require_quota(&self) -> Result<u64> {
        self.quota
            .ok_or_else(|| TallyError::illegal(self.status.state(), "counting"))
    }

    fn position(&self, id: CandidateId) -> Result<usize> {
        self.index.get(&id).copied().ok_or_else(|| {
            TallyError::InvalidConfiguration(format!("{} is not a registered candidate", id))
        })
    }

    fn restart(&mut self) {
        self.count_number = 0;
        self.round_number = 0;
        self.non_transferable = 0;
        self.non_transferable_history.clear();
        self.elected.clear();
        self.decisive_ties.clear();
    }
}

/// Fewer votes than a quarter of the quota.
fn below_expenses_threshold(votes: u64, quota: u64) -> bool {
    votes * 4 < quota
}
