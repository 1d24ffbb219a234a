mod common;

use common::{ballot_box, constituency, init_tracing, outcome};
use prstv_count::tally::{
    BallotCounting, CandidateId, CountState, CountStatus, CountingRules, Outcome, SurplusMethod,
};

/// Four candidates for three seats; the fourth gets no first preferences.
fn three_seats() -> BallotCounting {
    init_tracing();
    let mut counting = BallotCounting::new(CountingRules::new(SurplusMethod::LastParcel));
    counting.setup(constituency(3, 4)).unwrap();
    counting
        .load(ballot_box(&[
            (&[1], 1),
            (&[1, 2], 1),
            (&[2], 1),
            (&[1, 2], 1),
            (&[3], 1),
            (&[1, 2], 1),
        ]))
        .unwrap();
    counting
}

#[test]
fn transfers_from_excluded_candidate() {
    let mut counting = three_seats();
    assert_eq!(counting.quota(), Some(2));

    let reached = counting.start_counting().unwrap();
    assert_eq!(reached, vec![CandidateId(1)]);
    assert_eq!(counting.calculate_surpluses().unwrap(), vec![(CandidateId(1), 2)]);

    let lowest = counting.find_lowest_candidate().unwrap();
    assert_eq!(lowest, CandidateId(4));
    counting.eliminate_candidate(lowest).unwrap();
    counting.increment_count_number();
    counting
        .update_count_status(CountState::CandidateExcluded)
        .unwrap();

    assert_eq!(counting.get_continuing_candidates(), 3);
    assert!(CountStatus::is_possible_state(counting.status().code()));
    assert_eq!(outcome(&counting, 4), Outcome::SoreLoser);
}

#[test]
fn count_finishes_after_manual_exclusion() {
    let mut counting = three_seats();
    counting.start_counting().unwrap();
    let lowest = counting.find_lowest_candidate().unwrap();
    counting.eliminate_candidate(lowest).unwrap();
    counting.increment_count_number();
    counting
        .update_count_status(CountState::CandidateExcluded)
        .unwrap();

    assert_eq!(counting.next_round().unwrap(), CountState::CountComplete);
    assert_eq!(outcome(&counting, 1), Outcome::Winner);
    assert_eq!(outcome(&counting, 2), Outcome::CompromiseWinner);
    assert_eq!(outcome(&counting, 3), Outcome::CompromiseWinner);
    assert_eq!(
        counting.elected_candidates(),
        &[CandidateId(1), CandidateId(2), CandidateId(3)]
    );
}

#[test]
fn full_count_elects_the_same_candidates() {
    let mut counting = three_seats();
    assert_eq!(counting.count().unwrap(), CountState::CountComplete);

    // the surplus puts 2 over the quota before 4 is excluded
    assert_eq!(outcome(&counting, 1), Outcome::Winner);
    assert_eq!(outcome(&counting, 2), Outcome::QuotaWinner);
    assert_eq!(outcome(&counting, 3), Outcome::CompromiseWinner);
    assert_eq!(outcome(&counting, 4), Outcome::SoreLoser);
    assert_eq!(counting.round_number(), 1);
    assert_eq!(counting.non_transferable(), 1);
}
