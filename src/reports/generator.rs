use super::{
    CandidateResult, CountInfo, CountReport, CountSheet, CountSummary, ReportError, ReportResult,
};
use crate::tally::{BallotCounting, CandidateId, CountState};
use std::collections::BTreeMap;

/// Run the count to its end and report on it. Errors raised by the count
/// itself come back as [`ReportError::Tally`].
pub fn count_and_report(counting: &mut BallotCounting) -> ReportResult<CountReport> {
    counting.count()?;
    generate_count_report(counting)
}

/// Generate the report of a completed count
pub fn generate_count_report(counting: &BallotCounting) -> ReportResult<CountReport> {
    if counting.status() != CountState::CountComplete {
        return Err(ReportError::Incomplete(counting.status()));
    }
    let quota = counting.quota().ok_or(ReportError::Incomplete(counting.status()))?;
    let constituency = counting.constituency();
    let rules = counting.rules();

    let info = CountInfo {
        seats: constituency.number_of_seats(),
        total_seats: constituency.total_seats(),
        quota,
        valid_poll: counting.valid_poll(),
        surplus_method: rules.surplus_method,
        tie_break: rules.tie_break,
    };

    let candidates: Vec<CandidateResult> = constituency
        .candidates()
        .iter()
        .map(|candidate| CandidateResult {
            id: candidate.id(),
            name: candidate.name().to_string(),
            outcome: candidate.outcome(),
            votes: candidate.votes(),
            decided_at: candidate.decided_at(),
            history: candidate.history().to_vec(),
        })
        .collect();

    // A candidate decided at count n is shown against that count's sheet.
    let decided_at = |count: u32, winners: bool| -> Vec<CandidateId> {
        candidates
            .iter()
            .filter(|candidate| {
                candidate.decided_at == Some(count) && candidate.outcome.is_winner() == winners
            })
            .map(|candidate| candidate.id)
            .collect()
    };

    let counts: Vec<CountSheet> = (1..=counting.count_number())
        .map(|count| {
            let tally: BTreeMap<CandidateId, u64> = constituency
                .candidates()
                .iter()
                .map(|candidate| (candidate.id(), candidate.votes_at_count(count).unwrap_or(0)))
                .collect();
            CountSheet {
                count,
                tally,
                non_transferable: counting
                    .non_transferable_history()
                    .get(count as usize - 1)
                    .copied()
                    .unwrap_or(0),
                elected: decided_at(count, true),
                excluded: decided_at(count, false),
            }
        })
        .collect();

    let summary = CountSummary {
        elected: counting
            .elected_candidates()
            .iter()
            .filter_map(|id| counting.candidate(*id))
            .map(|candidate| candidate.name().to_string())
            .collect(),
        total_counts: counting.count_number(),
        total_rounds: counting.round_number(),
        non_transferable: counting.non_transferable(),
        decisive_ties: counting.decisive_ties().len(),
    };

    Ok(CountReport {
        info,
        candidates,
        counts,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tally::{
        Ballot, BallotBox, Constituency, CountingRules, Outcome, SurplusMethod, TallyError,
    };

    fn loaded() -> BallotCounting {
        let mut constituency = Constituency::new();
        let walsh = constituency.add_candidate("Walsh");
        let byrne = constituency.add_candidate("Byrne");
        let kelly = constituency.add_candidate("Kelly");

        let mut ballot_box = BallotBox::new();
        for (preferences, copies) in [(vec![walsh], 4), (vec![byrne], 3), (vec![kelly, byrne], 2)] {
            for _ in 0..copies {
                ballot_box
                    .accept(Ballot::with_preferences(&preferences).unwrap())
                    .unwrap();
            }
        }

        let mut counting = BallotCounting::new(CountingRules::new(SurplusMethod::LastParcel));
        counting.setup(constituency).unwrap();
        counting.load(ballot_box).unwrap();
        counting
    }

    fn completed() -> BallotCounting {
        let mut counting = loaded();
        counting.count().unwrap();
        counting
    }

    #[test]
    fn refuses_unfinished_counts() {
        let counting = BallotCounting::new(CountingRules::new(SurplusMethod::Fractional));
        assert!(matches!(
            generate_count_report(&counting),
            Err(ReportError::Incomplete(CountState::NotStarted))
        ));
    }

    #[test]
    fn sheets_follow_the_counts() {
        let report = generate_count_report(&completed()).unwrap();

        assert_eq!(report.info.quota, 5);
        assert_eq!(report.counts.len(), 2);
        assert_eq!(report.counts[0].tally[&CandidateId(3)], 2);
        assert_eq!(report.counts[1].tally[&CandidateId(2)], 5);
        assert_eq!(report.counts[0].excluded, vec![CandidateId(3)]);
        assert_eq!(report.counts[1].elected, vec![CandidateId(2)]);
        assert_eq!(report.counts[1].excluded, vec![CandidateId(1)]);
        assert_eq!(report.summary.elected, vec!["Byrne".to_string()]);
        assert_eq!(report.winners().count(), 1);
        assert_eq!(report.candidates[0].outcome, Outcome::Loser);
    }

    #[test]
    fn counts_then_reports() {
        let mut counting = loaded();
        let report = count_and_report(&mut counting).unwrap();
        assert_eq!(counting.status(), CountState::CountComplete);
        assert_eq!(report, generate_count_report(&completed()).unwrap());
    }

    #[test]
    fn count_failures_surface_as_tally_errors() {
        let mut constituency = Constituency::new();
        constituency.set_number_of_seats(2, 2).unwrap();
        constituency.set_number_of_candidates(3).unwrap();

        let mut ballot_box = BallotBox::new();
        for (first, copies) in [(1u32, 3), (2, 2), (3, 1)] {
            for _ in 0..copies {
                ballot_box
                    .accept(Ballot::with_preferences(&[CandidateId(first)]).unwrap())
                    .unwrap();
            }
        }

        let mut counting = BallotCounting::new(CountingRules::new(SurplusMethod::LastParcel));
        counting.setup(constituency).unwrap();
        counting.load(ballot_box).unwrap();
        counting.start_counting().unwrap();
        counting.eliminate_candidate(CandidateId(3)).unwrap();
        counting.eliminate_candidate(CandidateId(2)).unwrap();

        assert!(matches!(
            count_and_report(&mut counting),
            Err(ReportError::Tally(TallyError::Stalemate(_)))
        ));
        assert_eq!(counting.status(), CountState::Stalemate);
    }

    #[test]
    fn json_round_trip() {
        let report = generate_count_report(&completed()).unwrap();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"surplusMethod\": \"last_parcel\""));
        assert_eq!(CountReport::from_json(&json).unwrap(), report);
    }
}
