// Counting rules that vary between statutory variants of PR-STV.

use super::{Result, TallyError};
use serde::{Deserialize, Serialize};

/// Which of an elected candidate's papers are examined when a surplus is
/// transferred. Both methods move whole papers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurplusMethod {
    /// Only the parcel of papers that brought the candidate over the quota.
    LastParcel,
    /// Every paper the candidate holds, at a transfer value of
    /// `surplus / transferable papers`.
    Fractional,
}

/// How equal tallies are separated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakRule {
    /// The later registered candidate is excluded first and elected last.
    #[default]
    RegistrationOrder,
    /// Compare tallies at the earliest count where they differed, falling
    /// back to registration order.
    PreviousCounts,
}

/// Counting options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountingRules {
    #[serde(rename = "surplusMethod")]
    pub surplus_method: SurplusMethod,
    #[serde(rename = "tieBreak", default)]
    pub tie_break: TieBreakRule,
}

impl CountingRules {
    /// The surplus method has no default and must always be chosen.
    pub fn new(surplus_method: SurplusMethod) -> Self {
        Self {
            surplus_method,
            tie_break: TieBreakRule::default(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreakRule) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TallyError::InvalidConfiguration(format!("counting rules: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rules() {
        let rules = CountingRules::from_json(
            r#"{"surplusMethod": "last_parcel", "tieBreak": "previous_counts"}"#,
        )
        .unwrap();
        let expected = CountingRules::new(SurplusMethod::LastParcel)
            .with_tie_break(TieBreakRule::PreviousCounts);
        assert_eq!(rules, expected);
    }

    #[test]
    fn tie_break_defaults_to_registration_order() {
        let rules = CountingRules::from_json(r#"{"surplusMethod": "fractional"}"#).unwrap();
        assert_eq!(rules.tie_break, TieBreakRule::RegistrationOrder);
        assert_eq!(TieBreakRule::default(), TieBreakRule::RegistrationOrder);
    }

    #[test]
    fn surplus_method_is_required() {
        assert!(matches!(
            CountingRules::from_json(r#"{"tieBreak": "registration_order"}"#),
            Err(TallyError::InvalidConfiguration(_))
        ));
    }
}
