use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;

use crate::error::{PloutosError, Result};
use crate::models::{Condition, MatchType, Transaction};

/// Tolerance for `amount_eq`: half a cent either side.
pub const AMOUNT_EQ_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

fn parse_amount(condition: &Condition) -> Result<Decimal> {
    Decimal::from_str(condition.match_value.trim()).map_err(|_| {
        PloutosError::Configuration(format!(
            "{} expects a number, got '{}'",
            condition.match_type, condition.match_value
        ))
    })
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| PloutosError::Configuration(format!("invalid regex '{pattern}': {e}")))
}

/// A condition with its value parsed once, so it can be run against a whole
/// batch without recompiling regexes or reparsing amounts.
#[derive(Debug, Clone)]
pub enum Matcher {
    Text { match_type: MatchType, value: String },
    Regex(Regex),
    Amount { match_type: MatchType, value: Decimal },
}

impl Matcher {
    pub fn compile(condition: &Condition) -> Result<Self> {
        let matcher = match condition.match_type {
            MatchType::Regex => Matcher::Regex(compile(&condition.match_value)?),
            m if m.is_amount() => Matcher::Amount {
                match_type: m,
                value: parse_amount(condition)?,
            },
            m => Matcher::Text {
                match_type: m,
                value: condition.match_value.to_uppercase(),
            },
        };
        Ok(matcher)
    }

    pub fn match_type(&self) -> MatchType {
        match self {
            Matcher::Text { match_type, .. } | Matcher::Amount { match_type, .. } => *match_type,
            Matcher::Regex(_) => MatchType::Regex,
        }
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        let amount = transaction.amount;
        match self {
            Matcher::Regex(re) => re.is_match(&transaction.description),
            Matcher::Text { match_type, value } => {
                let description = transaction.description.to_uppercase();
                match match_type {
                    MatchType::StartsWith => description.starts_with(value.as_str()),
                    MatchType::Exact => description == *value,
                    _ => description.contains(value.as_str()),
                }
            }
            Matcher::Amount { match_type, value } => match match_type {
                MatchType::AmountGt => amount > *value,
                MatchType::AmountLt => amount < *value,
                MatchType::AmountGte => amount >= *value,
                MatchType::AmountLte => amount <= *value,
                _ => (amount - *value).abs() <= AMOUNT_EQ_TOLERANCE,
            },
        }
    }
}

/// Evaluate a condition, surfacing configuration problems (bad regex,
/// unparsable amount) instead of swallowing them.
pub fn check(condition: &Condition, transaction: &Transaction) -> Result<bool> {
    Ok(Matcher::compile(condition)?.matches(transaction))
}

/// Evaluate a condition. A malformed condition never matches; the problem is
/// logged and evaluation carries on.
pub fn evaluate(condition: &Condition, transaction: &Transaction) -> bool {
    match check(condition, transaction) {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!(
                transaction_id = transaction.id,
                match_type = %condition.match_type,
                "condition skipped: {e}"
            );
            false
        }
    }
}

pub fn validate(condition: &Condition) -> Result<()> {
    if condition.match_value.trim().is_empty() {
        return Err(PloutosError::Configuration(format!(
            "{} condition has an empty value",
            condition.match_type
        )));
    }
    Matcher::compile(condition).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn txn(description: &str, amount: Decimal) -> Transaction {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        Transaction {
            id: 1,
            account_id: 1,
            amount,
            kind: TransactionType::Debit,
            description: description.to_string(),
            date,
            created_at: date.and_hms_opt(9, 0, 0).unwrap(),
            updated_at: date.and_hms_opt(9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_text_matches_ignore_case() {
        let t = txn("CB CARREFOUR MARKET 02/05", dec!(42.00));
        assert!(evaluate(&Condition::new(MatchType::Contains, "carrefour"), &t));
        assert!(evaluate(&Condition::new(MatchType::StartsWith, "cb carre"), &t));
        assert!(!evaluate(&Condition::new(MatchType::StartsWith, "carrefour"), &t));
        assert!(evaluate(&Condition::new(MatchType::Exact, "cb carrefour market 02/05"), &t));
        assert!(!evaluate(&Condition::new(MatchType::Exact, "cb carrefour"), &t));
    }

    #[test]
    fn test_regex_is_case_insensitive() {
        let t = txn("Prlv SEPA Free Mobile", dec!(19.99));
        assert!(evaluate(&Condition::new(MatchType::Regex, r"^prlv sepa (free|sfr)"), &t));
        assert!(!evaluate(&Condition::new(MatchType::Regex, r"orange$"), &t));
    }

    #[test]
    fn test_invalid_regex_is_configuration_error_but_not_fatal() {
        let t = txn("anything", dec!(1));
        let cond = Condition::new(MatchType::Regex, "(unclosed");
        assert!(matches!(check(&cond, &t), Err(PloutosError::Configuration(_))));
        assert!(!evaluate(&cond, &t));
    }

    #[test]
    fn test_amount_comparisons() {
        let t = txn("loyer", dec!(850.00));
        assert!(evaluate(&Condition::new(MatchType::AmountGt, "800"), &t));
        assert!(!evaluate(&Condition::new(MatchType::AmountGt, "850"), &t));
        assert!(evaluate(&Condition::new(MatchType::AmountGte, "850.00"), &t));
        assert!(evaluate(&Condition::new(MatchType::AmountLt, "850.01"), &t));
        assert!(evaluate(&Condition::new(MatchType::AmountLte, "850"), &t));
    }

    #[test]
    fn test_amount_eq_tolerates_half_a_cent() {
        let t = txn("abonnement", dec!(9.99));
        assert!(evaluate(&Condition::new(MatchType::AmountEq, "9.99"), &t));
        assert!(evaluate(&Condition::new(MatchType::AmountEq, "9.995"), &t));
        assert!(!evaluate(&Condition::new(MatchType::AmountEq, "10.00"), &t));
    }

    #[test]
    fn test_malformed_amount_never_matches() {
        let t = txn("abonnement", dec!(9.99));
        let cond = Condition::new(MatchType::AmountGt, "ten euros");
        assert!(matches!(check(&cond, &t), Err(PloutosError::Configuration(_))));
        assert!(!evaluate(&cond, &t));
    }

    #[test]
    fn test_compiled_matcher_is_reusable() {
        let matcher = Matcher::compile(&Condition::new(MatchType::Regex, r"^vir (sepa|inst)")).unwrap();
        assert_eq!(matcher.match_type(), MatchType::Regex);
        assert!(matcher.matches(&txn("VIR SEPA LOYER", dec!(850))));
        assert!(matcher.matches(&txn("vir inst remboursement", dec!(20))));
        assert!(!matcher.matches(&txn("PRLV EDF", dec!(60))));

        let threshold = Matcher::compile(&Condition::new(MatchType::AmountGte, " 100 ")).unwrap();
        assert!(threshold.matches(&txn("x", dec!(100.00))));
        assert!(!threshold.matches(&txn("x", dec!(99.99))));
    }

    #[test]
    fn test_validate() {
        assert!(validate(&Condition::new(MatchType::Contains, "edf")).is_ok());
        assert!(validate(&Condition::new(MatchType::Contains, "  ")).is_err());
        assert!(validate(&Condition::new(MatchType::Regex, "[a-")).is_err());
        assert!(validate(&Condition::new(MatchType::AmountLte, "12,5")).is_err());
        assert!(validate(&Condition::new(MatchType::AmountLte, "12.5")).is_ok());
    }
}
