use crate::tally::{CandidateId, CountState, Outcome, SurplusMethod, TallyError, TieBreakRule};
use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod generator;

pub use generator::{count_and_report, generate_count_report};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Tally error: {0}")]
    Tally(#[from] TallyError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Count is not complete: {0}")]
    Incomplete(CountState),
}

pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// Full result of a completed count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountReport {
    pub info: CountInfo,
    pub candidates: Vec<CandidateResult>,
    pub counts: Vec<CountSheet>,
    pub summary: CountSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountInfo {
    pub seats: u32,
    #[serde(rename = "totalSeats")]
    pub total_seats: u32,
    pub quota: u64,
    #[serde(rename = "validPoll")]
    pub valid_poll: u64,
    #[serde(rename = "surplusMethod")]
    pub surplus_method: SurplusMethod,
    #[serde(rename = "tieBreak")]
    pub tie_break: TieBreakRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: CandidateId,
    pub name: String,
    pub outcome: Outcome,
    pub votes: u64,
    #[serde(rename = "decidedAt")]
    pub decided_at: Option<u32>,
    /// Tally at the close of each count
    pub history: Vec<u64>,
}

/// One column of the result sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSheet {
    pub count: u32,
    pub tally: BTreeMap<CandidateId, u64>,
    #[serde(rename = "nonTransferable")]
    pub non_transferable: u64,
    pub elected: Vec<CandidateId>,
    pub excluded: Vec<CandidateId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSummary {
    pub elected: Vec<String>,
    #[serde(rename = "totalCounts")]
    pub total_counts: u32,
    #[serde(rename = "totalRounds")]
    pub total_rounds: u32,
    #[serde(rename = "nonTransferable")]
    pub non_transferable: u64,
    #[serde(rename = "decisiveTies")]
    pub decisive_ties: usize,
}

impl CountReport {
    pub fn to_json(&self) -> ReportResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ReportResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn winners(&self) -> impl Iterator<Item = &CandidateResult> + '_ {
        self.candidates
            .iter()
            .filter(|candidate| candidate.outcome.is_winner())
    }

    /// Print the result sheet summary
    pub fn print_summary(&self) {
        println!("\n{}", "🗳️  Count Complete".bright_green().bold());
        println!("{}", "=".repeat(50).bright_green());
        println!(
            "{}: {} of {}",
            "Seats".bright_white().bold(),
            self.info.seats.to_string().bright_yellow(),
            self.info.total_seats.to_string().bright_yellow()
        );
        println!(
            "{}: {}",
            "Valid Poll".bright_white().bold(),
            self.info.valid_poll.to_string().bright_yellow()
        );
        println!(
            "{}: {}",
            "Quota".bright_white().bold(),
            self.info.quota.to_string().bright_yellow()
        );
        println!(
            "{}: {}",
            "Counts".bright_white().bold(),
            self.summary.total_counts.to_string().bright_yellow()
        );

        for candidate in &self.candidates {
            let line = format!(
                "  {:<30} {:>8}  {}",
                candidate.name, candidate.votes, candidate.outcome
            );
            if candidate.outcome.is_winner() {
                println!("{}", line.bright_green().bold());
            } else {
                println!("{}", line.dimmed());
            }
        }
        println!(
            "{}: {}",
            "Non-transferable".bright_white().bold(),
            self.summary.non_transferable.to_string().bright_yellow()
        );
        println!();
    }
}
